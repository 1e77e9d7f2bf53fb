//! In-memory record stores for tests and embedded use.
//!
//! Each store is a `RwLock`-guarded map. `insert` enforces the uniqueness
//! invariants (idempotency keys, one trip per ride) atomically under the
//! write lock; `update` compare-and-swaps on the entity version.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{DispatchError, DispatchResult};
use crate::model::{DriverRecord, DriverStatus, Payment, Ride, RideStatus, Trip, VehicleTier};

use super::{DriverStore, PaymentStore, RideStore, TripStore};

#[derive(Debug, Default)]
pub struct InMemoryRideStore {
    rides: RwLock<HashMap<Uuid, Ride>>,
}

impl InMemoryRideStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(rides: &mut Vec<Ride>) {
    rides.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[async_trait]
impl RideStore for InMemoryRideStore {
    async fn insert(&self, ride: Ride) -> DispatchResult<Ride> {
        let mut rides = self.rides.write().await;
        if rides
            .values()
            .any(|existing| existing.idempotency_key == ride.idempotency_key)
        {
            return Err(DispatchError::DuplicateKey {
                kind: "ride",
                key: ride.idempotency_key,
            });
        }
        rides.insert(ride.id, ride.clone());
        Ok(ride)
    }

    async fn get(&self, id: Uuid) -> DispatchResult<Option<Ride>> {
        Ok(self.rides.read().await.get(&id).cloned())
    }

    async fn find_by_idempotency_key(&self, key: &str) -> DispatchResult<Option<Ride>> {
        Ok(self
            .rides
            .read()
            .await
            .values()
            .find(|ride| ride.idempotency_key == key)
            .cloned())
    }

    async fn update(&self, mut ride: Ride) -> DispatchResult<Ride> {
        let mut rides = self.rides.write().await;
        let stored = rides
            .get(&ride.id)
            .ok_or(DispatchError::RideNotFound(ride.id))?;
        if stored.version != ride.version {
            return Err(DispatchError::VersionConflict {
                kind: "ride",
                id: ride.id,
            });
        }
        ride.version += 1;
        rides.insert(ride.id, ride.clone());
        Ok(ride)
    }

    async fn list(&self) -> DispatchResult<Vec<Ride>> {
        let mut all: Vec<Ride> = self.rides.read().await.values().cloned().collect();
        newest_first(&mut all);
        Ok(all)
    }

    async fn list_by_rider(&self, rider_id: Uuid) -> DispatchResult<Vec<Ride>> {
        let mut matching: Vec<Ride> = self
            .rides
            .read()
            .await
            .values()
            .filter(|ride| ride.rider_id == rider_id)
            .cloned()
            .collect();
        newest_first(&mut matching);
        Ok(matching)
    }

    async fn list_by_driver(&self, driver_id: Uuid) -> DispatchResult<Vec<Ride>> {
        let mut matching: Vec<Ride> = self
            .rides
            .read()
            .await
            .values()
            .filter(|ride| ride.driver_id == Some(driver_id))
            .cloned()
            .collect();
        newest_first(&mut matching);
        Ok(matching)
    }

    async fn count_active_in_region(
        &self,
        region: &str,
        statuses: &[RideStatus],
        since: DateTime<Utc>,
    ) -> DispatchResult<u64> {
        let count = self
            .rides
            .read()
            .await
            .values()
            .filter(|ride| {
                ride.region == region
                    && statuses.contains(&ride.status)
                    && ride.created_at >= since
            })
            .count();
        Ok(count as u64)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTripStore {
    trips: RwLock<HashMap<Uuid, Trip>>,
}

impl InMemoryTripStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TripStore for InMemoryTripStore {
    async fn insert(&self, trip: Trip) -> DispatchResult<Trip> {
        let mut trips = self.trips.write().await;
        if trips.values().any(|existing| existing.ride_id == trip.ride_id) {
            return Err(DispatchError::TripAlreadyStarted(trip.ride_id));
        }
        trips.insert(trip.id, trip.clone());
        Ok(trip)
    }

    async fn get(&self, id: Uuid) -> DispatchResult<Option<Trip>> {
        Ok(self.trips.read().await.get(&id).cloned())
    }

    async fn find_by_ride(&self, ride_id: Uuid) -> DispatchResult<Option<Trip>> {
        Ok(self
            .trips
            .read()
            .await
            .values()
            .find(|trip| trip.ride_id == ride_id)
            .cloned())
    }

    async fn update(&self, mut trip: Trip) -> DispatchResult<Trip> {
        let mut trips = self.trips.write().await;
        let stored = trips
            .get(&trip.id)
            .ok_or(DispatchError::TripNotFound(trip.id))?;
        if stored.version != trip.version {
            return Err(DispatchError::VersionConflict {
                kind: "trip",
                id: trip.id,
            });
        }
        trip.version += 1;
        trips.insert(trip.id, trip.clone());
        Ok(trip)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPaymentStore {
    payments: RwLock<HashMap<Uuid, Payment>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, payment: Payment) -> DispatchResult<Payment> {
        let mut payments = self.payments.write().await;
        if payments
            .values()
            .any(|existing| existing.idempotency_key == payment.idempotency_key)
        {
            return Err(DispatchError::DuplicateKey {
                kind: "payment",
                key: payment.idempotency_key,
            });
        }
        payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn get(&self, id: Uuid) -> DispatchResult<Option<Payment>> {
        Ok(self.payments.read().await.get(&id).cloned())
    }

    async fn find_by_idempotency_key(&self, key: &str) -> DispatchResult<Option<Payment>> {
        Ok(self
            .payments
            .read()
            .await
            .values()
            .find(|payment| payment.idempotency_key == key)
            .cloned())
    }

    async fn find_by_ride(&self, ride_id: Uuid) -> DispatchResult<Option<Payment>> {
        Ok(self
            .payments
            .read()
            .await
            .values()
            .find(|payment| payment.ride_id == ride_id)
            .cloned())
    }

    async fn update(&self, mut payment: Payment) -> DispatchResult<Payment> {
        let mut payments = self.payments.write().await;
        let stored = payments
            .get(&payment.id)
            .ok_or(DispatchError::PaymentNotFound(payment.id))?;
        if stored.version != payment.version {
            return Err(DispatchError::VersionConflict {
                kind: "payment",
                id: payment.id,
            });
        }
        payment.version += 1;
        payments.insert(payment.id, payment.clone());
        Ok(payment)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryDriverStore {
    drivers: RwLock<HashMap<Uuid, DriverRecord>>,
}

impl InMemoryDriverStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DriverStore for InMemoryDriverStore {
    async fn put(&self, driver: DriverRecord) -> DispatchResult<()> {
        self.drivers.write().await.insert(driver.id, driver);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DispatchResult<Option<DriverRecord>> {
        Ok(self.drivers.read().await.get(&id).cloned())
    }

    async fn find_available(
        &self,
        tier: VehicleTier,
        region: &str,
    ) -> DispatchResult<Vec<DriverRecord>> {
        Ok(self
            .drivers
            .read()
            .await
            .values()
            .filter(|driver| {
                driver.status == DriverStatus::Available
                    && driver.vehicle_tier == tier
                    && driver.region == region
            })
            .cloned()
            .collect())
    }

    async fn list_by_tier_and_region(
        &self,
        tier: VehicleTier,
        region: &str,
    ) -> DispatchResult<Vec<DriverRecord>> {
        Ok(self
            .drivers
            .read()
            .await
            .values()
            .filter(|driver| driver.vehicle_tier == tier && driver.region == region)
            .cloned()
            .collect())
    }

    async fn set_status(&self, id: Uuid, status: DriverStatus) -> DispatchResult<()> {
        let mut drivers = self.drivers.write().await;
        let driver = drivers.get_mut(&id).ok_or(DispatchError::DriverNotFound(id))?;
        driver.status = status;
        Ok(())
    }
}
