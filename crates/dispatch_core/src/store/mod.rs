//! Record store contracts for rides, trips, payments and driver availability.
//!
//! The lifecycle managers only see these traits; the in-memory
//! implementations in [`memory`] back the tests and embedded use. Writes go
//! through compare-and-swap on the entity `version` counter, so non-locked
//! read paths cannot silently lose updates. Mutual exclusion for
//! read-check-write transition sequences comes from [`locks::EntityLocks`].

pub mod locks;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DispatchResult;
use crate::model::{DriverRecord, DriverStatus, Payment, Ride, RideStatus, Trip, VehicleTier};

pub use locks::EntityLocks;
pub use memory::{
    InMemoryDriverStore, InMemoryPaymentStore, InMemoryRideStore, InMemoryTripStore,
};

#[async_trait]
pub trait RideStore: Send + Sync {
    /// Insert a new ride. Fails with `DuplicateKey` if the idempotency key
    /// is already taken.
    async fn insert(&self, ride: Ride) -> DispatchResult<Ride>;
    async fn get(&self, id: Uuid) -> DispatchResult<Option<Ride>>;
    async fn find_by_idempotency_key(&self, key: &str) -> DispatchResult<Option<Ride>>;
    /// Compare-and-swap write: fails with `VersionConflict` unless the given
    /// ride's version matches the stored one. The stored version increments.
    async fn update(&self, ride: Ride) -> DispatchResult<Ride>;
    async fn list(&self) -> DispatchResult<Vec<Ride>>;
    /// Rides for a rider, newest first.
    async fn list_by_rider(&self, rider_id: Uuid) -> DispatchResult<Vec<Ride>>;
    /// Rides for a driver, newest first.
    async fn list_by_driver(&self, driver_id: Uuid) -> DispatchResult<Vec<Ride>>;
    /// Count rides in `region` whose status is in `statuses` and that were
    /// created at or after `since`. Feeds the surge estimator.
    async fn count_active_in_region(
        &self,
        region: &str,
        statuses: &[RideStatus],
        since: DateTime<Utc>,
    ) -> DispatchResult<u64>;
}

#[async_trait]
pub trait TripStore: Send + Sync {
    /// Insert a new trip. At most one trip may exist per ride; a second
    /// insert for the same ride fails with `TripAlreadyStarted`. This is the
    /// atomic uniqueness guarantee the ride-lock critical section relies on.
    async fn insert(&self, trip: Trip) -> DispatchResult<Trip>;
    async fn get(&self, id: Uuid) -> DispatchResult<Option<Trip>>;
    async fn find_by_ride(&self, ride_id: Uuid) -> DispatchResult<Option<Trip>>;
    /// Compare-and-swap write, as for rides.
    async fn update(&self, trip: Trip) -> DispatchResult<Trip>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Insert a new payment. Fails with `DuplicateKey` if the idempotency
    /// key is already taken.
    async fn insert(&self, payment: Payment) -> DispatchResult<Payment>;
    async fn get(&self, id: Uuid) -> DispatchResult<Option<Payment>>;
    async fn find_by_idempotency_key(&self, key: &str) -> DispatchResult<Option<Payment>>;
    async fn find_by_ride(&self, ride_id: Uuid) -> DispatchResult<Option<Payment>>;
    /// Compare-and-swap write, as for rides.
    async fn update(&self, payment: Payment) -> DispatchResult<Payment>;
}

#[async_trait]
pub trait DriverStore: Send + Sync {
    /// Insert or replace a driver availability record.
    async fn put(&self, driver: DriverRecord) -> DispatchResult<()>;
    async fn get(&self, id: Uuid) -> DispatchResult<Option<DriverRecord>>;
    /// Drivers with status `Available` matching the tier and region.
    async fn find_available(
        &self,
        tier: VehicleTier,
        region: &str,
    ) -> DispatchResult<Vec<DriverRecord>>;
    /// Drivers of the tier and region regardless of status; feeds the
    /// no-match diagnostics.
    async fn list_by_tier_and_region(
        &self,
        tier: VehicleTier,
        region: &str,
    ) -> DispatchResult<Vec<DriverRecord>>;
    /// Flip a driver's availability status.
    async fn set_status(&self, id: Uuid, status: DriverStatus) -> DispatchResult<()>;
}
