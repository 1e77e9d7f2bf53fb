//! Domain entities and their state enums.
//!
//! Entities are plain data; all mutation goes through the lifecycle managers.
//! Each mutable entity carries a `version` counter that the record stores use
//! for optimistic conflict detection on write.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    Requested,
    Searching,
    Matched,
    Accepted,
    DriverArrived,
    InProgress,
    Completed,
    Cancelled,
    Failed,
}

impl RideStatus {
    /// Statuses that count toward regional demand for surge pricing.
    pub const ACTIVE: [RideStatus; 5] = [
        RideStatus::Requested,
        RideStatus::Searching,
        RideStatus::Matched,
        RideStatus::Accepted,
        RideStatus::InProgress,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RideStatus::Completed | RideStatus::Cancelled | RideStatus::Failed
        )
    }

    /// Case-insensitive parse of the wire name; unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "REQUESTED" => Some(Self::Requested),
            "SEARCHING" => Some(Self::Searching),
            "MATCHED" => Some(Self::Matched),
            "ACCEPTED" => Some(Self::Accepted),
            "DRIVER_ARRIVED" => Some(Self::DriverArrived),
            "IN_PROGRESS" => Some(Self::InProgress),
            "COMPLETED" => Some(Self::Completed),
            "CANCELLED" => Some(Self::Cancelled),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "REQUESTED",
            Self::Searching => "SEARCHING",
            Self::Matched => "MATCHED",
            Self::Accepted => "ACCEPTED",
            Self::DriverArrived => "DRIVER_ARRIVED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripStatus {
    Started,
    Paused,
    Resumed,
    Ended,
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Started => "STARTED",
            Self::Paused => "PAUSED",
            Self::Resumed => "RESUMED",
            Self::Ended => "ENDED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverStatus {
    Available,
    Busy,
    OnRide,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleTier {
    Economy,
    Premium,
    Luxury,
    Suv,
}

impl fmt::Display for VehicleTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Economy => "ECONOMY",
            Self::Premium => "PREMIUM",
            Self::Luxury => "LUXURY",
            Self::Suv => "SUV",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Card,
    Upi,
    Wallet,
    Cash,
}

/// A ride from request through terminal state. Never deleted; terminal
/// rides are retained for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ride {
    pub id: Uuid,
    pub idempotency_key: String,
    pub rider_id: Uuid,
    /// Set when the ride is matched; present in all later driver-bound states.
    pub driver_id: Option<Uuid>,
    pub status: RideStatus,
    pub vehicle_tier: VehicleTier,
    pub payment_method: PaymentMethod,
    pub pickup_latitude: f64,
    pub pickup_longitude: f64,
    pub pickup_address: String,
    pub destination_latitude: f64,
    pub destination_longitude: f64,
    pub destination_address: String,
    pub region: String,
    pub estimated_fare: f64,
    pub surge_multiplier: f64,
    pub created_at: DateTime<Utc>,
    pub matched_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub version: u64,
}

impl Ride {
    pub fn new(
        idempotency_key: String,
        request: &CreateRideRequest,
        surge_multiplier: f64,
        estimated_fare: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            idempotency_key,
            rider_id: request.rider_id,
            driver_id: None,
            status: RideStatus::Requested,
            vehicle_tier: request.vehicle_tier,
            payment_method: request.payment_method,
            pickup_latitude: request.pickup_latitude,
            pickup_longitude: request.pickup_longitude,
            pickup_address: request.pickup_address.clone(),
            destination_latitude: request.destination_latitude,
            destination_longitude: request.destination_longitude,
            destination_address: request.destination_address.clone(),
            region: request.region.clone(),
            estimated_fare,
            surge_multiplier,
            created_at: Utc::now(),
            matched_at: None,
            accepted_at: None,
            started_at: None,
            ended_at: None,
            cancelled_at: None,
            failure_reason: None,
            version: 1,
        }
    }
}

/// One trip per ride; immutable once `Ended`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub driver_id: Uuid,
    pub rider_id: Uuid,
    pub status: TripStatus,
    pub start_latitude: f64,
    pub start_longitude: f64,
    pub end_latitude: Option<f64>,
    pub end_longitude: Option<f64>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub paused_duration_seconds: i64,
    pub distance_km: f64,
    /// Active minutes: wall time minus accumulated paused time.
    pub duration_minutes: i64,
    /// Copied from the ride when the trip starts.
    pub surge_multiplier: f64,
    pub total_fare: Option<f64>,
    pub version: u64,
}

impl Trip {
    pub fn new(ride: &Ride, driver_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            ride_id: ride.id,
            driver_id,
            rider_id: ride.rider_id,
            status: TripStatus::Started,
            start_latitude: ride.pickup_latitude,
            start_longitude: ride.pickup_longitude,
            end_latitude: None,
            end_longitude: None,
            start_time: Utc::now(),
            end_time: None,
            paused_at: None,
            paused_duration_seconds: 0,
            distance_km: 0.0,
            duration_minutes: 0,
            surge_multiplier: ride.surge_multiplier,
            total_fare: None,
            version: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub idempotency_key: String,
    pub ride_id: Uuid,
    pub trip_id: Uuid,
    pub rider_id: Uuid,
    pub driver_id: Uuid,
    pub amount: f64,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub failure_reason: Option<String>,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

impl Payment {
    pub fn new(
        idempotency_key: String,
        request: &PaymentRequest,
        rider_id: Uuid,
        driver_id: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            idempotency_key,
            ride_id: request.ride_id,
            trip_id: request.trip_id,
            rider_id,
            driver_id,
            amount: request.amount,
            payment_method: request.payment_method,
            status: PaymentStatus::Pending,
            transaction_id: None,
            failure_reason: None,
            retry_count: 0,
            created_at: Utc::now(),
            version: 1,
        }
    }
}

/// Driver availability record. Profile CRUD lives with an external
/// collaborator; the core reads it for matching and writes status flips.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverRecord {
    pub id: Uuid,
    pub name: String,
    pub phone_number: String,
    pub vehicle_number: String,
    pub status: DriverStatus,
    pub vehicle_tier: VehicleTier,
    pub region: String,
    pub rating: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRideRequest {
    pub rider_id: Uuid,
    pub pickup_latitude: f64,
    pub pickup_longitude: f64,
    pub pickup_address: String,
    pub destination_latitude: f64,
    pub destination_longitude: f64,
    pub destination_address: String,
    pub vehicle_tier: VehicleTier,
    pub payment_method: PaymentMethod,
    pub region: String,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndTripRequest {
    pub trip_id: Uuid,
    pub end_latitude: f64,
    pub end_longitude: f64,
    pub distance_km: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub ride_id: Uuid,
    pub trip_id: Uuid,
    pub amount: f64,
    pub payment_method: PaymentMethod,
    pub idempotency_key: Option<String>,
}
