use thiserror::Error;
use uuid::Uuid;

use crate::model::{RideStatus, TripStatus};

/// Entity category a failure belongs to, for callers that report errors
/// per domain area rather than per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Ride,
    Trip,
    Payment,
    Driver,
    Rider,
}

/// Domain-rule violations reported synchronously to callers.
///
/// Transient infrastructure failures inside the background matching task are
/// never surfaced through this type; they are converted into a `Failed` ride
/// with a descriptive reason instead.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("ride {0} not found")]
    RideNotFound(Uuid),
    #[error("trip {0} not found")]
    TripNotFound(Uuid),
    #[error("no trip found for ride {0}")]
    TripNotFoundForRide(Uuid),
    #[error("payment {0} not found")]
    PaymentNotFound(Uuid),
    #[error("no payment found for ride {0}")]
    PaymentNotFoundForRide(Uuid),
    #[error("driver {0} not found")]
    DriverNotFound(Uuid),
    #[error("rider {0} not found")]
    RiderNotFound(Uuid),
    #[error("ride {ride}: cannot {action} in {status} status")]
    InvalidRideState {
        ride: Uuid,
        status: RideStatus,
        action: &'static str,
    },
    #[error("trip {trip}: cannot {action} in {status} status")]
    InvalidTripState {
        trip: Uuid,
        status: TripStatus,
        action: &'static str,
    },
    #[error("ride {ride} is not assigned to driver {driver}")]
    WrongDriver { ride: Uuid, driver: Uuid },
    #[error("trip already started for ride {0}")]
    TripAlreadyStarted(Uuid),
    #[error("duplicate {kind} idempotency key: {key}")]
    DuplicateKey { kind: &'static str, key: String },
    #[error("payment {0}: max retry attempts exceeded")]
    RetryExhausted(Uuid),
    #[error("version conflict updating {kind} {id}")]
    VersionConflict { kind: &'static str, id: Uuid },
}

impl DispatchError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::RideNotFound(_) | Self::InvalidRideState { .. } => ErrorCategory::Ride,
            Self::TripNotFound(_)
            | Self::TripNotFoundForRide(_)
            | Self::InvalidTripState { .. }
            | Self::TripAlreadyStarted(_) => ErrorCategory::Trip,
            Self::PaymentNotFound(_)
            | Self::PaymentNotFoundForRide(_)
            | Self::RetryExhausted(_) => ErrorCategory::Payment,
            Self::DriverNotFound(_) | Self::WrongDriver { .. } => ErrorCategory::Driver,
            Self::RiderNotFound(_) => ErrorCategory::Rider,
            Self::DuplicateKey { kind, .. } | Self::VersionConflict { kind, .. } => match *kind {
                "trip" => ErrorCategory::Trip,
                "payment" => ErrorCategory::Payment,
                "driver" => ErrorCategory::Driver,
                _ => ErrorCategory::Ride,
            },
        }
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_follow_entity_kind() {
        let id = Uuid::new_v4();
        assert_eq!(
            DispatchError::RideNotFound(id).category(),
            ErrorCategory::Ride
        );
        assert_eq!(
            DispatchError::TripAlreadyStarted(id).category(),
            ErrorCategory::Trip
        );
        assert_eq!(
            DispatchError::RetryExhausted(id).category(),
            ErrorCategory::Payment
        );
        assert_eq!(
            DispatchError::VersionConflict {
                kind: "payment",
                id
            }
            .category(),
            ErrorCategory::Payment
        );
    }

    #[test]
    fn messages_name_the_entity() {
        let id = Uuid::new_v4();
        let err = DispatchError::WrongDriver {
            ride: id,
            driver: id,
        };
        assert!(err.to_string().contains("not assigned"));
    }
}
