//! Fare computation: estimated fares at request time, final fares at trip end.
//!
//! Both functions are pure in their inputs and the configured rate card.
//! Formula: `(base + distance_km * per_km + minutes * per_minute) * surge`,
//! floored at the configured minimum and rounded to 2 decimal places.
//! Invalid inputs never fail the caller; they yield the minimum fare.

use tracing::{debug, warn};

use crate::config::FareConfig;
use crate::spatial::{haversine_km, valid_coords};

/// Average speed used to turn straight-line distance into estimated minutes.
const AVG_SPEED_KMH: f64 = 30.0;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn apply_rates(config: &FareConfig, distance_km: f64, minutes: f64, surge: f64) -> f64 {
    let fare = (config.base_fare
        + distance_km * config.per_km_rate
        + minutes * config.per_minute_rate)
        * surge;
    round2(fare.max(config.minimum_fare))
}

/// Estimated fare from pickup to destination before any driver is matched.
pub fn estimated_fare(
    config: &FareConfig,
    pickup_lat: f64,
    pickup_lon: f64,
    dest_lat: f64,
    dest_lon: f64,
    surge: f64,
) -> f64 {
    if !valid_coords(pickup_lat, pickup_lon)
        || !valid_coords(dest_lat, dest_lon)
        || !surge.is_finite()
        || surge < 1.0
    {
        warn!("invalid estimate inputs, falling back to minimum fare");
        return config.minimum_fare;
    }
    let distance_km = haversine_km(pickup_lat, pickup_lon, dest_lat, dest_lon);
    let minutes = distance_km / AVG_SPEED_KMH * 60.0;
    let fare = apply_rates(config, distance_km, minutes, surge);
    debug!(distance_km, surge, fare, "estimated fare");
    fare
}

/// Final fare from actual distance and active duration.
pub fn final_fare(config: &FareConfig, distance_km: f64, duration_minutes: i64, surge: f64) -> f64 {
    if !distance_km.is_finite()
        || distance_km < 0.0
        || duration_minutes < 0
        || !surge.is_finite()
        || surge < 1.0
    {
        warn!(distance_km, duration_minutes, surge, "invalid final fare inputs, falling back to minimum fare");
        return config.minimum_fare;
    }
    let fare = apply_rates(config, distance_km, duration_minutes as f64, surge);
    debug!(distance_km, duration_minutes, surge, fare, "final fare");
    fare
}
