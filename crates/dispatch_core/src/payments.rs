//! Idempotent payment settlement with bounded, explicit retries.
//!
//! A payment is created at most once per idempotency key; replays return
//! the stored record without touching the gateway. The gateway itself is an
//! opaque, latency-bearing boolean outcome, bounded by a timeout (an
//! elapsed timeout counts as a decline — the charge outcome, not its
//! cancellation, decides payment status). Retries never happen
//! automatically and are capped at a configured attempt count; past the cap
//! a retry is a hard domain-rule violation and the gateway is not invoked.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::PaymentConfig;
use crate::error::{DispatchError, DispatchResult};
use crate::model::{Payment, PaymentRequest, PaymentStatus};
use crate::notify::NotificationPublisher;
use crate::store::{EntityLocks, PaymentStore, RideStore, TripStore};

/// External payment service provider. Implementations may be slow; callers
/// bound every charge with the configured timeout.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// `true` when the charge was approved.
    async fn charge(&self, payment: &Payment) -> bool;
}

pub struct PaymentSettlement {
    payments: Arc<dyn PaymentStore>,
    rides: Arc<dyn RideStore>,
    trips: Arc<dyn TripStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: NotificationPublisher,
    locks: Arc<EntityLocks>,
    config: PaymentConfig,
}

impl PaymentSettlement {
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        rides: Arc<dyn RideStore>,
        trips: Arc<dyn TripStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: NotificationPublisher,
        locks: Arc<EntityLocks>,
        config: PaymentConfig,
    ) -> Self {
        Self {
            payments,
            rides,
            trips,
            gateway,
            notifier,
            locks,
            config,
        }
    }

    /// Create and settle a payment, or replay the stored outcome for a
    /// known idempotency key. The default key is deterministic in the ride
    /// and trip, so client retries without an explicit key still dedupe.
    pub async fn process(&self, request: PaymentRequest) -> DispatchResult<Payment> {
        let idempotency_key = request
            .idempotency_key
            .clone()
            .filter(|key| !key.is_empty())
            .unwrap_or_else(|| format!("payment-{}-{}", request.ride_id, request.trip_id));

        if let Some(existing) = self
            .payments
            .find_by_idempotency_key(&idempotency_key)
            .await?
        {
            info!(key = %idempotency_key, payment = %existing.id, "duplicate payment request");
            return Ok(existing);
        }

        let ride = self
            .rides
            .get(request.ride_id)
            .await?
            .ok_or(DispatchError::RideNotFound(request.ride_id))?;
        self.trips
            .get(request.trip_id)
            .await?
            .ok_or(DispatchError::TripNotFound(request.trip_id))?;
        let driver_id = ride.driver_id.ok_or(DispatchError::InvalidRideState {
            ride: ride.id,
            status: ride.status,
            action: "settle payment",
        })?;

        let payment = Payment::new(idempotency_key, &request, ride.rider_id, driver_id);
        let payment = match self.payments.insert(payment).await {
            Ok(payment) => payment,
            // Lost a race with a concurrent request for the same key; the
            // winner's record is authoritative and the gateway is not
            // called again.
            Err(DispatchError::DuplicateKey { key, .. }) => {
                let existing = self
                    .payments
                    .find_by_idempotency_key(&key)
                    .await?
                    .ok_or(DispatchError::PaymentNotFoundForRide(request.ride_id))?;
                info!(key = %key, payment = %existing.id, "concurrent duplicate payment request");
                return Ok(existing);
            }
            Err(err) => return Err(err),
        };

        self.charge_and_record(payment).await
    }

    /// Explicitly retry a failed payment. A successful payment is returned
    /// unchanged; past the retry cap the call fails without touching the
    /// gateway.
    pub async fn retry(&self, payment_id: Uuid) -> DispatchResult<Payment> {
        let _guard = self.locks.acquire(payment_id).await;

        let mut payment = self
            .payments
            .get(payment_id)
            .await?
            .ok_or(DispatchError::PaymentNotFound(payment_id))?;

        if payment.status == PaymentStatus::Success {
            warn!(payment = %payment_id, "payment already successful, skipping retry");
            return Ok(payment);
        }
        if payment.retry_count >= self.config.max_retries {
            return Err(DispatchError::RetryExhausted(payment_id));
        }

        payment.retry_count += 1;
        payment.status = PaymentStatus::Processing;
        let payment = self.payments.update(payment).await?;

        self.charge_and_record(payment).await
    }

    pub async fn payment_by_ride(&self, ride_id: Uuid) -> DispatchResult<Payment> {
        self.payments
            .find_by_ride(ride_id)
            .await?
            .ok_or(DispatchError::PaymentNotFoundForRide(ride_id))
    }

    async fn charge_with_timeout(&self, payment: &Payment) -> bool {
        match tokio::time::timeout(self.config.gateway_timeout, self.gateway.charge(payment)).await
        {
            Ok(approved) => approved,
            Err(_) => {
                warn!(payment = %payment.id, "payment gateway timed out");
                false
            }
        }
    }

    async fn charge_and_record(&self, mut payment: Payment) -> DispatchResult<Payment> {
        let approved = self.charge_with_timeout(&payment).await;

        if approved {
            payment.status = PaymentStatus::Success;
            payment.transaction_id = Some(Uuid::new_v4().to_string());
            payment.failure_reason = None;
        } else {
            payment.status = PaymentStatus::Failed;
            payment.failure_reason = Some("Payment gateway declined".to_string());
        }
        let payment = self.payments.update(payment).await?;

        if approved {
            info!(payment = %payment.id, ride = %payment.ride_id, amount = payment.amount, "payment successful");
            self.notifier.payment_succeeded(&payment);
        } else {
            warn!(payment = %payment.id, ride = %payment.ride_id, "payment failed");
            self.notifier.payment_failed(&payment);
        }
        Ok(payment)
    }
}
