//! Best-effort notification fan-out.
//!
//! The core only needs a "publish fact to subject" capability; delivery,
//! ordering and persistence are the sink's concern. Publication never
//! blocks or fails a state transition: sink errors are for the sink
//! implementation to log, and payload serialization problems are logged
//! here and dropped.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::model::{Payment, Ride};

/// Fire-and-forget event sink. Implementations must not block the caller.
pub trait Notifier: Send + Sync {
    fn publish(&self, subject: &str, payload: Value);
}

/// Sink that drops everything. Useful when embedding without a broker.
#[derive(Debug, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn publish(&self, _subject: &str, _payload: Value) {}
}

/// Builds and publishes the lifecycle events riders and drivers receive.
#[derive(Clone)]
pub struct NotificationPublisher {
    sink: Arc<dyn Notifier>,
}

impl NotificationPublisher {
    pub fn new(sink: Arc<dyn Notifier>) -> Self {
        Self { sink }
    }

    fn envelope(event_type: &str, data: Value) -> Value {
        json!({
            "event_type": event_type,
            "data": data,
            "timestamp": Utc::now().timestamp_millis(),
        })
    }

    pub fn notify_rider(&self, rider_id: Uuid, event_type: &str, data: Value) {
        self.sink
            .publish(&format!("rider.{rider_id}"), Self::envelope(event_type, data));
        debug!(rider = %rider_id, event_type, "rider notified");
    }

    pub fn notify_driver(&self, driver_id: Uuid, event_type: &str, data: Value) {
        self.sink.publish(
            &format!("driver.{driver_id}"),
            Self::envelope(event_type, data),
        );
        debug!(driver = %driver_id, event_type, "driver notified");
    }

    /// Broadcast the full ride to the shared updates subject.
    pub fn broadcast_ride_update(&self, ride: &Ride) {
        match serde_json::to_value(ride) {
            Ok(payload) => self.sink.publish("rides.updates", payload),
            Err(err) => warn!(ride = %ride.id, error = %err, "could not serialize ride update"),
        }
    }

    pub fn ride_matched(&self, ride: &Ride, driver_id: Uuid) {
        self.notify_rider(
            ride.rider_id,
            "RIDE_MATCHED",
            json!({
                "ride_id": ride.id,
                "driver_id": driver_id,
                "message": "Driver found! They are on their way.",
            }),
        );
        self.notify_driver(
            driver_id,
            "NEW_RIDE_REQUEST",
            json!({
                "ride_id": ride.id,
                "pickup_address": ride.pickup_address,
                "pickup_latitude": ride.pickup_latitude,
                "pickup_longitude": ride.pickup_longitude,
            }),
        );
    }

    pub fn ride_accepted(&self, ride: &Ride) {
        self.notify_rider(
            ride.rider_id,
            "RIDE_ACCEPTED",
            json!({
                "ride_id": ride.id,
                "message": "Driver accepted your ride!",
            }),
        );
    }

    pub fn driver_arrived(&self, ride: &Ride) {
        self.notify_rider(
            ride.rider_id,
            "DRIVER_ARRIVED",
            json!({
                "ride_id": ride.id,
                "message": "Your driver has arrived.",
            }),
        );
    }

    pub fn ride_failed(&self, ride: &Ride, reason: &str) {
        self.notify_rider(
            ride.rider_id,
            "RIDE_FAILED",
            json!({
                "ride_id": ride.id,
                "reason": reason,
            }),
        );
    }

    pub fn ride_cancelled(&self, ride: &Ride, reason: &str) {
        self.notify_rider(
            ride.rider_id,
            "RIDE_CANCELLED",
            json!({
                "ride_id": ride.id,
                "reason": reason,
            }),
        );
        if let Some(driver_id) = ride.driver_id {
            self.notify_driver(
                driver_id,
                "RIDE_CANCELLED",
                json!({
                    "ride_id": ride.id,
                    "reason": reason,
                }),
            );
        }
    }

    pub fn trip_started(&self, ride: &Ride) {
        self.notify_rider(
            ride.rider_id,
            "TRIP_STARTED",
            json!({
                "ride_id": ride.id,
                "message": "Your trip has started!",
            }),
        );
        if let Some(driver_id) = ride.driver_id {
            self.notify_driver(
                driver_id,
                "TRIP_STARTED",
                json!({
                    "ride_id": ride.id,
                    "message": "Trip started successfully!",
                }),
            );
        }
    }

    pub fn trip_ended(&self, ride: &Ride, fare: f64) {
        self.notify_rider(
            ride.rider_id,
            "TRIP_ENDED",
            json!({
                "ride_id": ride.id,
                "fare": fare,
                "message": format!("Trip completed! Total fare: {fare}"),
            }),
        );
        if let Some(driver_id) = ride.driver_id {
            self.notify_driver(
                driver_id,
                "TRIP_ENDED",
                json!({
                    "ride_id": ride.id,
                    "fare": fare,
                    "message": "Trip completed successfully!",
                }),
            );
        }
    }

    pub fn payment_succeeded(&self, payment: &Payment) {
        self.notify_rider(
            payment.rider_id,
            "PAYMENT_SUCCESS",
            json!({
                "ride_id": payment.ride_id,
                "payment_id": payment.id,
                "amount": payment.amount,
                "transaction_id": payment.transaction_id,
                "message": format!("Payment successful! Amount: {}", payment.amount),
            }),
        );
        self.notify_driver(
            payment.driver_id,
            "PAYMENT_RECEIVED",
            json!({
                "ride_id": payment.ride_id,
                "payment_id": payment.id,
                "amount": payment.amount,
                "message": "Payment received for completed ride",
            }),
        );
    }

    pub fn payment_failed(&self, payment: &Payment) {
        self.notify_rider(
            payment.rider_id,
            "PAYMENT_FAILED",
            json!({
                "ride_id": payment.ride_id,
                "payment_id": payment.id,
                "amount": payment.amount,
                "reason": payment.failure_reason,
                "message": "Payment failed. Please try again.",
            }),
        );
    }
}
