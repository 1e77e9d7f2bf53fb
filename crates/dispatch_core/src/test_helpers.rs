//! Shared fixtures for unit and integration tests.
//!
//! Enabled through the `test-helpers` feature so integration tests and
//! downstream consumers can reuse the stub gateway, recording sink and
//! fixture builders without copy-pasting them.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use uuid::Uuid;

use crate::config::DispatchConfig;
use crate::dispatch::Dispatch;
use crate::model::{
    CreateRideRequest, DriverRecord, DriverStatus, Payment, PaymentMethod, PaymentRequest,
    VehicleTier,
};
use crate::notify::Notifier;
use crate::payments::PaymentGateway;

/// Downtown San Francisco, the default test region's anchor point.
pub const PICKUP_LAT: f64 = 37.7749;
pub const PICKUP_LON: f64 = -122.4194;
pub const DROPOFF_LAT: f64 = 37.8044;
pub const DROPOFF_LON: f64 = -122.2712;
pub const TEST_REGION: &str = "san-francisco";

enum GatewayMode {
    Fixed(bool),
    Flaky(f64),
}

/// Scriptable payment gateway. Outcomes are popped from a queue first and
/// fall back to the configured mode once it runs dry; every call is
/// counted, and an optional delay simulates a slow provider.
pub struct StubGateway {
    queued: Mutex<VecDeque<bool>>,
    mode: GatewayMode,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubGateway {
    pub fn approving() -> Self {
        Self::with_mode(GatewayMode::Fixed(true))
    }

    pub fn declining() -> Self {
        Self::with_mode(GatewayMode::Fixed(false))
    }

    /// Approves each charge independently with probability `approval_rate`.
    pub fn flaky(approval_rate: f64) -> Self {
        Self::with_mode(GatewayMode::Flaky(approval_rate))
    }

    fn with_mode(mode: GatewayMode) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            mode,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue explicit outcomes consumed before the fallback mode applies.
    pub fn script(self, outcomes: &[bool]) -> Self {
        if let Ok(mut queued) = self.queued.lock() {
            queued.extend(outcomes.iter().copied());
        }
        self
    }

    /// Make every charge take `delay` before resolving.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn charge(&self, _payment: &Payment) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.queued.lock().ok().and_then(|mut q| q.pop_front());
        match scripted {
            Some(outcome) => outcome,
            None => match self.mode {
                GatewayMode::Fixed(outcome) => outcome,
                GatewayMode::Flaky(rate) => rand::thread_rng().gen_bool(rate),
            },
        }
    }
}

/// Sink that records every published event for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(String, Value)>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<(String, Value)> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Event types published to the given subject, in order.
    pub fn event_types_for(&self, subject: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|(s, _)| s == subject)
            .filter_map(|(_, payload)| {
                payload
                    .get("event_type")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn publish(&self, subject: &str, payload: Value) {
        if let Ok(mut events) = self.events.lock() {
            events.push((subject.to_string(), payload));
        }
    }
}

pub fn driver(tier: VehicleTier, rating: f64) -> DriverRecord {
    DriverRecord {
        id: Uuid::new_v4(),
        name: "Test Driver".to_string(),
        phone_number: "+15550100".to_string(),
        vehicle_number: "TEST-0001".to_string(),
        status: DriverStatus::Available,
        vehicle_tier: tier,
        region: TEST_REGION.to_string(),
        rating,
    }
}

pub fn ride_request(rider_id: Uuid) -> CreateRideRequest {
    CreateRideRequest {
        rider_id,
        pickup_latitude: PICKUP_LAT,
        pickup_longitude: PICKUP_LON,
        pickup_address: "1 Market St".to_string(),
        destination_latitude: DROPOFF_LAT,
        destination_longitude: DROPOFF_LON,
        destination_address: "1 Broadway".to_string(),
        vehicle_tier: VehicleTier::Economy,
        payment_method: PaymentMethod::Card,
        region: TEST_REGION.to_string(),
        idempotency_key: None,
    }
}

pub fn payment_request(ride_id: Uuid, trip_id: Uuid, amount: f64) -> PaymentRequest {
    PaymentRequest {
        ride_id,
        trip_id,
        amount,
        payment_method: PaymentMethod::Card,
        idempotency_key: None,
    }
}

/// A fully wired dispatch core over in-memory stores, with handles to the
/// stub gateway and recording sink for assertions.
pub struct TestDispatch {
    pub dispatch: Dispatch,
    pub gateway: Arc<StubGateway>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn build_dispatch(config: DispatchConfig, gateway: StubGateway) -> TestDispatch {
    let gateway = Arc::new(gateway);
    let notifier = Arc::new(RecordingNotifier::default());
    let dispatch = Dispatch::builder(
        config,
        Arc::clone(&gateway) as Arc<dyn PaymentGateway>,
    )
    .notifier(Arc::clone(&notifier) as Arc<dyn Notifier>)
    .build();
    TestDispatch {
        dispatch,
        gateway,
        notifier,
    }
}

/// Register a driver with a fresh location at the pickup anchor.
pub async fn seed_driver(harness: &TestDispatch, tier: VehicleTier, rating: f64) -> Uuid {
    let record = driver(tier, rating);
    let id = record.id;
    harness
        .dispatch
        .register_driver(record)
        .await
        .expect("register driver");
    harness.dispatch.report_location(id, PICKUP_LAT, PICKUP_LON).await;
    id
}
