//! Configuration for the dispatch core.
//!
//! Every tunable the dispatch pipeline depends on lives here: search radius
//! and candidate cap for matching, fare rates, surge parameters, payment
//! retry policy and location freshness. Defaults mirror a mid-sized city
//! deployment and are overridable per field with `with_*` builders.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default H3 resolution for location bucketing (~174m hexagon edge).
pub const DEFAULT_H3_RESOLUTION: u8 = 9;

/// Driver matching parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Radius around the pickup point considered for candidate drivers.
    pub search_radius_km: f64,
    /// Cap on the candidate set before ranking, to bound ranking cost.
    pub max_candidates: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            search_radius_km: 5.0,
            max_candidates: 20,
        }
    }
}

/// Fare rate card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FareConfig {
    pub base_fare: f64,
    pub per_km_rate: f64,
    pub per_minute_rate: f64,
    /// Floor applied after surge; no fare is ever below this.
    pub minimum_fare: f64,
}

impl Default for FareConfig {
    fn default() -> Self {
        Self {
            base_fare: 50.0,
            per_km_rate: 12.0,
            per_minute_rate: 2.0,
            minimum_fare: 70.0,
        }
    }
}

/// Surge pricing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurgeConfig {
    pub base_multiplier: f64,
    pub max_multiplier: f64,
    /// Active rides per region above which surge kicks in.
    pub demand_threshold: u64,
    /// Lookback window for counting active rides.
    pub window_minutes: i64,
    /// How long a computed above-base multiplier stays cached per region.
    pub cache_ttl: Duration,
}

impl Default for SurgeConfig {
    fn default() -> Self {
        Self {
            base_multiplier: 1.0,
            max_multiplier: 3.0,
            demand_threshold: 10,
            window_minutes: 5,
            cache_ttl: Duration::from_secs(30),
        }
    }
}

/// Payment settlement parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Explicit retries allowed after the initial attempt.
    pub max_retries: u32,
    /// Upper bound on a single gateway call; elapsed counts as a decline.
    pub gateway_timeout: Duration,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            gateway_timeout: Duration::from_secs(5),
        }
    }
}

/// Driver location store parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Entries older than this are treated as absent, not stale-but-present.
    pub ttl: Duration,
    /// H3 resolution used to bucket positions for radius queries.
    pub h3_resolution: u8,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            h3_resolution: DEFAULT_H3_RESOLUTION,
        }
    }
}

/// Aggregate configuration for the whole dispatch core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    pub matching: MatchingConfig,
    pub fare: FareConfig,
    pub surge: SurgeConfig,
    pub payment: PaymentConfig,
    pub location: LocationConfig,
}

impl DispatchConfig {
    pub fn with_search_radius_km(mut self, radius_km: f64) -> Self {
        self.matching.search_radius_km = radius_km;
        self
    }

    pub fn with_max_candidates(mut self, max: usize) -> Self {
        self.matching.max_candidates = max;
        self
    }

    pub fn with_fare_rates(mut self, base: f64, per_km: f64, per_minute: f64, minimum: f64) -> Self {
        self.fare = FareConfig {
            base_fare: base,
            per_km_rate: per_km,
            per_minute_rate: per_minute,
            minimum_fare: minimum,
        };
        self
    }

    pub fn with_surge_threshold(mut self, threshold: u64) -> Self {
        self.surge.demand_threshold = threshold;
        self
    }

    pub fn with_max_payment_retries(mut self, retries: u32) -> Self {
        self.payment.max_retries = retries;
        self
    }

    pub fn with_location_ttl(mut self, ttl: Duration) -> Self {
        self.location.ttl = ttl;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_rate_card() {
        let config = DispatchConfig::default();
        assert_eq!(config.fare.base_fare, 50.0);
        assert_eq!(config.fare.minimum_fare, 70.0);
        assert_eq!(config.matching.max_candidates, 20);
        assert_eq!(config.payment.max_retries, 3);
    }

    #[test]
    fn builders_override_single_fields() {
        let config = DispatchConfig::default()
            .with_search_radius_km(2.5)
            .with_surge_threshold(3)
            .with_location_ttl(Duration::from_secs(10));
        assert_eq!(config.matching.search_radius_km, 2.5);
        assert_eq!(config.surge.demand_threshold, 3);
        assert_eq!(config.location.ttl, Duration::from_secs(10));
        assert_eq!(config.matching.max_candidates, 20);
    }
}
