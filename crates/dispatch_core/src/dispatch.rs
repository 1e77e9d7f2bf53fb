//! Wiring for the dispatch core.
//!
//! `DispatchBuilder` assembles the lifecycle managers over a shared lock
//! map and a common set of collaborator implementations, defaulting every
//! store to its in-memory form and the notifier to a no-op sink. Embedders
//! swap in their own store, sink and gateway implementations.

use std::sync::Arc;

use uuid::Uuid;

use crate::config::DispatchConfig;
use crate::error::DispatchResult;
use crate::location::{InMemoryLocationStore, LocationStore};
use crate::matching::{DriverMatcher, NearestDriverRanking};
use crate::model::{DriverRecord, DriverStatus};
use crate::notify::{NotificationPublisher, Notifier, NullNotifier};
use crate::payments::{PaymentGateway, PaymentSettlement};
use crate::rides::RideLifecycle;
use crate::store::{
    DriverStore, EntityLocks, InMemoryDriverStore, InMemoryPaymentStore, InMemoryRideStore,
    InMemoryTripStore, PaymentStore, RideStore, TripStore,
};
use crate::surge::SurgeEstimator;
use crate::trips::TripLifecycle;

/// Assembled dispatch core.
pub struct Dispatch {
    pub rides: Arc<RideLifecycle>,
    pub trips: Arc<TripLifecycle>,
    pub payments: Arc<PaymentSettlement>,
    drivers: Arc<dyn DriverStore>,
    locations: Arc<dyn LocationStore>,
}

impl Dispatch {
    pub fn builder(config: DispatchConfig, gateway: Arc<dyn PaymentGateway>) -> DispatchBuilder {
        DispatchBuilder::new(config, gateway)
    }

    /// Register or replace a driver availability record.
    pub async fn register_driver(&self, driver: DriverRecord) -> DispatchResult<()> {
        self.drivers.put(driver).await
    }

    /// Ingest a driver position report.
    pub async fn report_location(&self, driver_id: Uuid, latitude: f64, longitude: f64) {
        self.locations.set(driver_id, latitude, longitude).await;
    }

    /// Flip a driver's availability. Going offline also drops the cached
    /// location so the driver disappears from matching immediately.
    pub async fn set_driver_status(
        &self,
        driver_id: Uuid,
        status: DriverStatus,
    ) -> DispatchResult<()> {
        self.drivers.set_status(driver_id, status).await?;
        if status == DriverStatus::Offline {
            self.locations.remove(driver_id).await;
        }
        Ok(())
    }

    pub fn driver_store(&self) -> Arc<dyn DriverStore> {
        Arc::clone(&self.drivers)
    }

    pub fn location_store(&self) -> Arc<dyn LocationStore> {
        Arc::clone(&self.locations)
    }
}

pub struct DispatchBuilder {
    config: DispatchConfig,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    rides: Option<Arc<dyn RideStore>>,
    trips: Option<Arc<dyn TripStore>>,
    payments: Option<Arc<dyn PaymentStore>>,
    drivers: Option<Arc<dyn DriverStore>>,
    locations: Option<Arc<dyn LocationStore>>,
}

impl DispatchBuilder {
    pub fn new(config: DispatchConfig, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            config,
            gateway,
            notifier: Arc::new(NullNotifier),
            rides: None,
            trips: None,
            payments: None,
            drivers: None,
            locations: None,
        }
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn ride_store(mut self, store: Arc<dyn RideStore>) -> Self {
        self.rides = Some(store);
        self
    }

    pub fn trip_store(mut self, store: Arc<dyn TripStore>) -> Self {
        self.trips = Some(store);
        self
    }

    pub fn payment_store(mut self, store: Arc<dyn PaymentStore>) -> Self {
        self.payments = Some(store);
        self
    }

    pub fn driver_store(mut self, store: Arc<dyn DriverStore>) -> Self {
        self.drivers = Some(store);
        self
    }

    pub fn location_store(mut self, store: Arc<dyn LocationStore>) -> Self {
        self.locations = Some(store);
        self
    }

    pub fn build(self) -> Dispatch {
        let rides = self
            .rides
            .unwrap_or_else(|| Arc::new(InMemoryRideStore::new()));
        let trips = self
            .trips
            .unwrap_or_else(|| Arc::new(InMemoryTripStore::new()));
        let payments = self
            .payments
            .unwrap_or_else(|| Arc::new(InMemoryPaymentStore::new()));
        let drivers = self
            .drivers
            .unwrap_or_else(|| Arc::new(InMemoryDriverStore::new()));
        let locations = self
            .locations
            .unwrap_or_else(|| Arc::new(InMemoryLocationStore::new(&self.config.location)));

        let locks = Arc::new(EntityLocks::new());
        let publisher = NotificationPublisher::new(self.notifier);

        let matcher = DriverMatcher::new(
            Arc::clone(&drivers),
            Arc::clone(&locations),
            Box::new(NearestDriverRanking),
            self.config.matching.clone(),
        );
        let surge = SurgeEstimator::new(Arc::clone(&rides), self.config.surge.clone());

        let ride_lifecycle = Arc::new(RideLifecycle::new(
            Arc::clone(&rides),
            Arc::clone(&drivers),
            matcher,
            surge,
            publisher.clone(),
            Arc::clone(&locks),
            self.config.fare.clone(),
        ));
        let trip_lifecycle = Arc::new(TripLifecycle::new(
            Arc::clone(&trips),
            Arc::clone(&rides),
            Arc::clone(&drivers),
            publisher.clone(),
            Arc::clone(&locks),
            self.config.fare.clone(),
        ));
        let payment_settlement = Arc::new(PaymentSettlement::new(
            Arc::clone(&payments),
            Arc::clone(&rides),
            Arc::clone(&trips),
            self.gateway,
            publisher,
            locks,
            self.config.payment.clone(),
        ));

        Dispatch {
            rides: ride_lifecycle,
            trips: trip_lifecycle,
            payments: payment_settlement,
            drivers,
            locations,
        }
    }
}
