//! Ride lifecycle: creation, idempotent dedup, async matching, assignment,
//! acceptance and cancellation.
//!
//! Creation is the only entry point that schedules matching, and it does so
//! exactly once per new ride, on a background task the creator never waits
//! for. The matching task has its own error boundary: every failure inside
//! it becomes a `Failed` ride with a descriptive reason, never a propagated
//! error, because there is no caller to propagate to. All other transitions
//! are synchronous and hold the ride's exclusive lock across their
//! read-check-write sequence.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::FareConfig;
use crate::error::{DispatchError, DispatchResult};
use crate::matching::DriverMatcher;
use crate::model::{CreateRideRequest, DriverStatus, Ride, RideStatus};
use crate::notify::NotificationPublisher;
use crate::pricing;
use crate::store::{DriverStore, EntityLocks, RideStore};
use crate::surge::SurgeEstimator;

pub struct RideLifecycle {
    rides: Arc<dyn RideStore>,
    drivers: Arc<dyn DriverStore>,
    matcher: DriverMatcher,
    surge: SurgeEstimator,
    notifier: NotificationPublisher,
    locks: Arc<EntityLocks>,
    fare: FareConfig,
}

impl RideLifecycle {
    pub fn new(
        rides: Arc<dyn RideStore>,
        drivers: Arc<dyn DriverStore>,
        matcher: DriverMatcher,
        surge: SurgeEstimator,
        notifier: NotificationPublisher,
        locks: Arc<EntityLocks>,
        fare: FareConfig,
    ) -> Self {
        Self {
            rides,
            drivers,
            matcher,
            surge,
            notifier,
            locks,
            fare,
        }
    }

    /// Create a ride, or return the existing one for a replayed idempotency
    /// key. A replay performs no surge or fare computation and schedules no
    /// matching. A fresh create schedules exactly one background matching
    /// attempt.
    pub async fn create_ride(self: &Arc<Self>, request: CreateRideRequest) -> DispatchResult<Ride> {
        let idempotency_key = request
            .idempotency_key
            .clone()
            .filter(|key| !key.is_empty())
            .unwrap_or_else(|| format!("ride-{}-{}", request.rider_id, Uuid::new_v4()));

        if let Some(existing) = self.rides.find_by_idempotency_key(&idempotency_key).await? {
            info!(key = %idempotency_key, ride = %existing.id, "duplicate ride request");
            return Ok(existing);
        }

        let surge_multiplier = self.surge.multiplier(&request.region).await;
        let estimated_fare = pricing::estimated_fare(
            &self.fare,
            request.pickup_latitude,
            request.pickup_longitude,
            request.destination_latitude,
            request.destination_longitude,
            surge_multiplier,
        );

        let ride = Ride::new(idempotency_key, &request, surge_multiplier, estimated_fare);
        let ride = self.rides.insert(ride).await?;
        info!(ride = %ride.id, rider = %ride.rider_id, region = %ride.region, "ride created");
        self.notifier.broadcast_ride_update(&ride);

        let this = Arc::clone(self);
        let ride_id = ride.id;
        tokio::spawn(async move {
            this.run_matching(ride_id).await;
        });

        Ok(ride)
    }

    /// Body of the background matching task. Public so callers that manage
    /// their own scheduling (or tests) can drive it directly; never returns
    /// an error.
    pub async fn run_matching(&self, ride_id: Uuid) {
        if let Err(err) = self.match_and_assign(ride_id).await {
            error!(ride = %ride_id, error = %err, "driver matching failed");
            match self
                .fail_ride(ride_id, &format!("Driver matching error: {err}"))
                .await
            {
                Ok(_) => {}
                Err(update_err) => {
                    error!(ride = %ride_id, error = %update_err, "could not record matching failure");
                }
            }
        }
    }

    async fn match_and_assign(&self, ride_id: Uuid) -> DispatchResult<()> {
        info!(ride = %ride_id, "starting driver matching");
        // The Requested -> Searching transition holds the ride lock like any
        // other; a cancellation that lands before this task runs wins, and
        // matching quietly stands down. The lock is released before the
        // (slow) matching query; assign_driver re-takes it and re-checks.
        let ride = {
            let _guard = self.locks.acquire(ride_id).await;
            let mut ride = self
                .rides
                .get(ride_id)
                .await?
                .ok_or(DispatchError::RideNotFound(ride_id))?;
            if ride.status != RideStatus::Requested {
                info!(ride = %ride_id, status = %ride.status, "ride already handled, skipping matching");
                return Ok(());
            }
            ride.status = RideStatus::Searching;
            self.rides.update(ride).await?
        };
        self.notifier.broadcast_ride_update(&ride);

        let best = self
            .matcher
            .find_best_driver(
                ride.pickup_latitude,
                ride.pickup_longitude,
                ride.vehicle_tier,
                &ride.region,
            )
            .await?;

        match best {
            Some(driver) => {
                self.assign_driver(ride_id, driver.id).await?;
                info!(ride = %ride_id, driver = %driver.id, "driver matched");
                Ok(())
            }
            None => {
                warn!(ride = %ride_id, "no driver found");
                let reason = self
                    .matcher
                    .diagnose_no_match(
                        ride.pickup_latitude,
                        ride.pickup_longitude,
                        ride.vehicle_tier,
                        &ride.region,
                    )
                    .await
                    .to_string();
                let failed = self.fail_ride(ride_id, &reason).await?;
                if failed.status == RideStatus::Failed {
                    self.notifier.ride_failed(&failed, &reason);
                }
                Ok(())
            }
        }
    }

    /// Mark a ride `Failed` with a reason. Terminal rides are returned
    /// untouched: a concurrent cancellation (or completion) wins over a late
    /// matching failure.
    async fn fail_ride(&self, ride_id: Uuid, reason: &str) -> DispatchResult<Ride> {
        let _guard = self.locks.acquire(ride_id).await;

        let mut ride = self
            .rides
            .get(ride_id)
            .await?
            .ok_or(DispatchError::RideNotFound(ride_id))?;
        if ride.status.is_terminal() {
            info!(ride = %ride_id, status = %ride.status, "ride already terminal, not recording failure");
            return Ok(ride);
        }
        ride.status = RideStatus::Failed;
        ride.failure_reason = Some(reason.to_string());
        let ride = self.rides.update(ride).await?;
        self.notifier.broadcast_ride_update(&ride);
        Ok(ride)
    }

    /// Reserve a driver for a ride found by matching. Holds the ride lock so
    /// a concurrent retry or cancellation cannot double-assign.
    pub async fn assign_driver(&self, ride_id: Uuid, driver_id: Uuid) -> DispatchResult<Ride> {
        let _guard = self.locks.acquire(ride_id).await;

        let mut ride = self
            .rides
            .get(ride_id)
            .await?
            .ok_or(DispatchError::RideNotFound(ride_id))?;
        if ride.status != RideStatus::Searching {
            return Err(DispatchError::InvalidRideState {
                ride: ride_id,
                status: ride.status,
                action: "assign a driver",
            });
        }

        self.drivers.set_status(driver_id, DriverStatus::Busy).await?;

        ride.driver_id = Some(driver_id);
        ride.status = RideStatus::Matched;
        ride.matched_at = Some(Utc::now());
        let ride = self.rides.update(ride).await?;

        self.notifier.ride_matched(&ride, driver_id);
        self.notifier.broadcast_ride_update(&ride);
        Ok(ride)
    }

    /// Driver confirms the match.
    pub async fn accept_ride(&self, ride_id: Uuid, driver_id: Uuid) -> DispatchResult<Ride> {
        let _guard = self.locks.acquire(ride_id).await;

        let mut ride = self
            .rides
            .get(ride_id)
            .await?
            .ok_or(DispatchError::RideNotFound(ride_id))?;
        if ride.status != RideStatus::Matched {
            return Err(DispatchError::InvalidRideState {
                ride: ride_id,
                status: ride.status,
                action: "accept",
            });
        }
        if ride.driver_id != Some(driver_id) {
            return Err(DispatchError::WrongDriver {
                ride: ride_id,
                driver: driver_id,
            });
        }

        ride.status = RideStatus::Accepted;
        ride.accepted_at = Some(Utc::now());
        let ride = self.rides.update(ride).await?;

        self.drivers
            .set_status(driver_id, DriverStatus::OnRide)
            .await?;

        self.notifier.ride_accepted(&ride);
        self.notifier.broadcast_ride_update(&ride);
        info!(ride = %ride_id, driver = %driver_id, "ride accepted");
        Ok(ride)
    }

    /// Driver reports arrival at the pickup point.
    pub async fn driver_arrived(&self, ride_id: Uuid, driver_id: Uuid) -> DispatchResult<Ride> {
        let _guard = self.locks.acquire(ride_id).await;

        let mut ride = self
            .rides
            .get(ride_id)
            .await?
            .ok_or(DispatchError::RideNotFound(ride_id))?;
        if ride.status != RideStatus::Accepted {
            return Err(DispatchError::InvalidRideState {
                ride: ride_id,
                status: ride.status,
                action: "mark driver arrival",
            });
        }
        if ride.driver_id != Some(driver_id) {
            return Err(DispatchError::WrongDriver {
                ride: ride_id,
                driver: driver_id,
            });
        }

        ride.status = RideStatus::DriverArrived;
        let ride = self.rides.update(ride).await?;

        self.notifier.driver_arrived(&ride);
        self.notifier.broadcast_ride_update(&ride);
        Ok(ride)
    }

    /// Cancel a non-terminal ride, releasing its driver if one was assigned.
    /// Completed and already-cancelled rides cannot be cancelled.
    pub async fn cancel_ride(&self, ride_id: Uuid, reason: &str) -> DispatchResult<Ride> {
        let _guard = self.locks.acquire(ride_id).await;

        let mut ride = self
            .rides
            .get(ride_id)
            .await?
            .ok_or(DispatchError::RideNotFound(ride_id))?;
        if matches!(ride.status, RideStatus::Completed | RideStatus::Cancelled) {
            return Err(DispatchError::InvalidRideState {
                ride: ride_id,
                status: ride.status,
                action: "cancel",
            });
        }

        if let Some(driver_id) = ride.driver_id {
            self.drivers
                .set_status(driver_id, DriverStatus::Available)
                .await?;
        }

        ride.status = RideStatus::Cancelled;
        ride.cancelled_at = Some(Utc::now());
        let ride = self.rides.update(ride).await?;

        info!(ride = %ride_id, reason, "ride cancelled");
        self.notifier.ride_cancelled(&ride, reason);
        self.notifier.broadcast_ride_update(&ride);
        Ok(ride)
    }

    pub async fn ride(&self, ride_id: Uuid) -> DispatchResult<Ride> {
        self.rides
            .get(ride_id)
            .await?
            .ok_or(DispatchError::RideNotFound(ride_id))
    }

    pub async fn rides_by_rider(&self, rider_id: Uuid) -> DispatchResult<Vec<Ride>> {
        self.rides.list_by_rider(rider_id).await
    }

    pub async fn rides_by_driver(&self, driver_id: Uuid) -> DispatchResult<Vec<Ride>> {
        self.rides.list_by_driver(driver_id).await
    }

    /// List rides newest-first, optionally filtered by a status name.
    /// Unknown status names are logged and ignored, returning the
    /// unfiltered listing.
    pub async fn list_rides(&self, status: Option<&str>, limit: usize) -> DispatchResult<Vec<Ride>> {
        let filter = match status {
            Some(raw) if !raw.is_empty() => match RideStatus::parse(raw) {
                Some(parsed) => Some(parsed),
                None => {
                    warn!(status = raw, "ignoring unknown ride status filter");
                    None
                }
            },
            _ => None,
        };

        let mut rides = self.rides.list().await?;
        if let Some(wanted) = filter {
            rides.retain(|ride| ride.status == wanted);
        }
        rides.truncate(limit);
        Ok(rides)
    }
}
