//! Trip lifecycle: start, pause, resume, end.
//!
//! Trip creation happens inside the ride's critical section, and the trip
//! store's uniqueness guarantee makes the one-trip-per-ride invariant
//! atomic with the status check rather than a separate query-then-insert.
//! Ending a trip finalizes the fare from actual distance and active
//! duration, completes the ride and releases the driver.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::config::FareConfig;
use crate::error::{DispatchError, DispatchResult};
use crate::model::{DriverStatus, EndTripRequest, RideStatus, Trip, TripStatus};
use crate::notify::NotificationPublisher;
use crate::pricing;
use crate::store::{DriverStore, EntityLocks, RideStore, TripStore};

pub struct TripLifecycle {
    trips: Arc<dyn TripStore>,
    rides: Arc<dyn RideStore>,
    drivers: Arc<dyn DriverStore>,
    notifier: NotificationPublisher,
    locks: Arc<EntityLocks>,
    fare: FareConfig,
}

impl TripLifecycle {
    pub fn new(
        trips: Arc<dyn TripStore>,
        rides: Arc<dyn RideStore>,
        drivers: Arc<dyn DriverStore>,
        notifier: NotificationPublisher,
        locks: Arc<EntityLocks>,
        fare: FareConfig,
    ) -> Self {
        Self {
            trips,
            rides,
            drivers,
            notifier,
            locks,
            fare,
        }
    }

    /// Begin the trip for an accepted ride. Holds the ride lock; the trip
    /// store rejects a second trip for the same ride atomically.
    pub async fn start_trip(&self, ride_id: Uuid) -> DispatchResult<Trip> {
        let _guard = self.locks.acquire(ride_id).await;

        let mut ride = self
            .rides
            .get(ride_id)
            .await?
            .ok_or(DispatchError::RideNotFound(ride_id))?;
        if !matches!(
            ride.status,
            RideStatus::Accepted | RideStatus::DriverArrived
        ) {
            return Err(DispatchError::InvalidRideState {
                ride: ride_id,
                status: ride.status,
                action: "start a trip",
            });
        }
        let driver_id = ride.driver_id.ok_or(DispatchError::InvalidRideState {
            ride: ride_id,
            status: ride.status,
            action: "start a trip",
        })?;

        let trip = self.trips.insert(Trip::new(&ride, driver_id)).await?;

        ride.status = RideStatus::InProgress;
        ride.started_at = Some(Utc::now());
        let ride = self.rides.update(ride).await?;

        self.notifier.trip_started(&ride);
        self.notifier.broadcast_ride_update(&ride);
        info!(trip = %trip.id, ride = %ride_id, "trip started");
        Ok(trip)
    }

    pub async fn pause_trip(&self, trip_id: Uuid) -> DispatchResult<Trip> {
        let _guard = self.locks.acquire(trip_id).await;

        let mut trip = self
            .trips
            .get(trip_id)
            .await?
            .ok_or(DispatchError::TripNotFound(trip_id))?;
        if trip.status != TripStatus::Started {
            return Err(DispatchError::InvalidTripState {
                trip: trip_id,
                status: trip.status,
                action: "pause",
            });
        }

        trip.status = TripStatus::Paused;
        trip.paused_at = Some(Utc::now());
        let trip = self.trips.update(trip).await?;

        info!(trip = %trip_id, "trip paused");
        Ok(trip)
    }

    /// Resume a paused trip, folding the elapsed pause into the running
    /// paused-duration total.
    pub async fn resume_trip(&self, trip_id: Uuid) -> DispatchResult<Trip> {
        let _guard = self.locks.acquire(trip_id).await;

        let mut trip = self
            .trips
            .get(trip_id)
            .await?
            .ok_or(DispatchError::TripNotFound(trip_id))?;
        if trip.status != TripStatus::Paused {
            return Err(DispatchError::InvalidTripState {
                trip: trip_id,
                status: trip.status,
                action: "resume",
            });
        }

        if let Some(paused_at) = trip.paused_at {
            let paused_seconds = (Utc::now() - paused_at).num_seconds().max(0);
            trip.paused_duration_seconds += paused_seconds;
        }
        trip.paused_at = None;
        trip.status = TripStatus::Resumed;
        let trip = self.trips.update(trip).await?;

        info!(trip = %trip_id, "trip resumed");
        Ok(trip)
    }

    /// End a running trip: record actuals, finalize the fare, complete the
    /// ride and release the driver.
    pub async fn end_trip(&self, request: EndTripRequest) -> DispatchResult<Trip> {
        let _trip_guard = self.locks.acquire(request.trip_id).await;

        let mut trip = self
            .trips
            .get(request.trip_id)
            .await?
            .ok_or(DispatchError::TripNotFound(request.trip_id))?;
        if !matches!(trip.status, TripStatus::Started | TripStatus::Resumed) {
            return Err(DispatchError::InvalidTripState {
                trip: request.trip_id,
                status: trip.status,
                action: "end",
            });
        }

        // Completing the ride is itself a transition; take its lock before
        // touching either record, and require the ride to still be running:
        // a cancellation that landed mid-trip is terminal and must not be
        // overwritten. Lock order is always trip then ride, so this cannot
        // deadlock against ride-first paths (none of which acquire trip
        // locks).
        let _ride_guard = self.locks.acquire(trip.ride_id).await;
        let mut ride = self
            .rides
            .get(trip.ride_id)
            .await?
            .ok_or(DispatchError::RideNotFound(trip.ride_id))?;
        if ride.status != RideStatus::InProgress {
            return Err(DispatchError::InvalidRideState {
                ride: ride.id,
                status: ride.status,
                action: "complete",
            });
        }

        let end_time = Utc::now();
        let total_seconds = (end_time - trip.start_time).num_seconds().max(0);
        let active_seconds = (total_seconds - trip.paused_duration_seconds).max(0);
        let duration_minutes = active_seconds / 60;

        let total_fare = pricing::final_fare(
            &self.fare,
            request.distance_km,
            duration_minutes,
            trip.surge_multiplier,
        );

        trip.status = TripStatus::Ended;
        trip.end_time = Some(end_time);
        trip.end_latitude = Some(request.end_latitude);
        trip.end_longitude = Some(request.end_longitude);
        trip.distance_km = request.distance_km;
        trip.duration_minutes = duration_minutes;
        trip.total_fare = Some(total_fare);
        let trip = self.trips.update(trip).await?;

        ride.status = RideStatus::Completed;
        ride.ended_at = Some(end_time);
        let ride = self.rides.update(ride).await?;

        self.drivers
            .set_status(trip.driver_id, DriverStatus::Available)
            .await?;

        self.notifier.trip_ended(&ride, total_fare);
        self.notifier.broadcast_ride_update(&ride);
        info!(
            trip = %trip.id,
            distance_km = trip.distance_km,
            duration_minutes,
            total_fare,
            "trip ended"
        );
        Ok(trip)
    }

    pub async fn trip(&self, trip_id: Uuid) -> DispatchResult<Trip> {
        self.trips
            .get(trip_id)
            .await?
            .ok_or(DispatchError::TripNotFound(trip_id))
    }

    pub async fn trip_by_ride(&self, ride_id: Uuid) -> DispatchResult<Trip> {
        self.trips
            .find_by_ride(ride_id)
            .await?
            .ok_or(DispatchError::TripNotFoundForRide(ride_id))
    }
}
