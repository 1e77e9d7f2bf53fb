//! Surge pricing: a demand multiplier per region.
//!
//! Demand is the count of rides in the region with an active status created
//! within the lookback window. At or below the threshold the multiplier is
//! the base; above it, it scales linearly at 0.1 per ride over the
//! threshold, capped at the configured maximum. Above-base results are
//! cached briefly per region; base results are cheap to recompute and
//! caching them would mask a demand spike for the cache interval.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use lru::LruCache;
use tokio::time::Instant;
use tracing::{error, info};

use crate::config::SurgeConfig;
use crate::model::RideStatus;
use crate::store::RideStore;

/// Increment per active ride over the demand threshold.
const SURGE_STEP: f64 = 0.1;

/// Regions worth caching simultaneously.
const CACHE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy)]
struct CachedMultiplier {
    value: f64,
    computed_at: Instant,
}

pub struct SurgeEstimator {
    rides: Arc<dyn RideStore>,
    config: SurgeConfig,
    cache: Mutex<LruCache<String, CachedMultiplier>>,
}

impl SurgeEstimator {
    pub fn new(rides: Arc<dyn RideStore>, config: SurgeConfig) -> Self {
        let capacity = NonZeroUsize::new(CACHE_CAPACITY)
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            rides,
            config,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn cached(&self, region: &str) -> Option<f64> {
        let mut cache = match self.cache.lock() {
            Ok(guard) => guard,
            Err(_) => return None,
        };
        let entry = cache.get(region)?;
        if entry.computed_at.elapsed() < self.config.cache_ttl {
            Some(entry.value)
        } else {
            cache.pop(region);
            None
        }
    }

    fn remember(&self, region: &str, value: f64) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(
                region.to_string(),
                CachedMultiplier {
                    value,
                    computed_at: Instant::now(),
                },
            );
        }
    }

    /// Current demand multiplier for a region. Store errors degrade to the
    /// base multiplier rather than failing ride creation.
    pub async fn multiplier(&self, region: &str) -> f64 {
        if let Some(value) = self.cached(region) {
            return value;
        }

        let since = Utc::now() - Duration::minutes(self.config.window_minutes);
        let active = match self
            .rides
            .count_active_in_region(region, &RideStatus::ACTIVE, since)
            .await
        {
            Ok(count) => count,
            Err(err) => {
                error!(region, error = %err, "surge computation failed, using base multiplier");
                return self.config.base_multiplier;
            }
        };

        if active <= self.config.demand_threshold {
            return self.config.base_multiplier;
        }

        let over = (active - self.config.demand_threshold) as f64;
        let value = (self.config.base_multiplier + over * SURGE_STEP).min(self.config.max_multiplier);
        info!(region, active, value, "surge multiplier computed");
        self.remember(region, value);
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CreateRideRequest, PaymentMethod, Ride, VehicleTier};
    use crate::store::InMemoryRideStore;
    use uuid::Uuid;

    fn request(region: &str) -> CreateRideRequest {
        CreateRideRequest {
            rider_id: Uuid::new_v4(),
            pickup_latitude: 37.7749,
            pickup_longitude: -122.4194,
            pickup_address: "Market St".into(),
            destination_latitude: 37.8044,
            destination_longitude: -122.2712,
            destination_address: "Broadway".into(),
            vehicle_tier: VehicleTier::Economy,
            payment_method: PaymentMethod::Card,
            region: region.into(),
            idempotency_key: None,
        }
    }

    async fn seed_active_rides(store: &InMemoryRideStore, region: &str, count: usize) {
        for i in 0..count {
            let mut ride = Ride::new(
                format!("surge-{region}-{i}-{}", Uuid::new_v4()),
                &request(region),
                1.0,
                100.0,
            );
            ride.status = RideStatus::Searching;
            store.insert(ride).await.expect("seed ride");
        }
    }

    #[tokio::test]
    async fn at_or_below_threshold_returns_base() {
        let store = Arc::new(InMemoryRideStore::new());
        seed_active_rides(&store, "downtown", 10).await;
        let surge = SurgeEstimator::new(store, SurgeConfig::default());

        assert_eq!(surge.multiplier("downtown").await, 1.0);
    }

    #[tokio::test]
    async fn scales_linearly_over_threshold() {
        let store = Arc::new(InMemoryRideStore::new());
        seed_active_rides(&store, "downtown", 15).await;
        let surge = SurgeEstimator::new(store, SurgeConfig::default());

        // 5 rides over the threshold of 10 -> 1.0 + 0.5.
        let value = surge.multiplier("downtown").await;
        assert!((value - 1.5).abs() < 1e-9, "got {value}");
    }

    #[tokio::test]
    async fn caps_at_max_multiplier() {
        let store = Arc::new(InMemoryRideStore::new());
        seed_active_rides(&store, "downtown", 60).await;
        let surge = SurgeEstimator::new(store, SurgeConfig::default());

        assert_eq!(surge.multiplier("downtown").await, 3.0);
    }

    #[tokio::test(start_paused = true)]
    async fn above_base_result_is_cached_for_the_interval() {
        let store = Arc::new(InMemoryRideStore::new());
        seed_active_rides(&store, "downtown", 15).await;
        let surge = SurgeEstimator::new(Arc::clone(&store) as Arc<dyn RideStore>, SurgeConfig::default());

        let first = surge.multiplier("downtown").await;
        // More demand arrives, but the cached value holds until the TTL.
        seed_active_rides(&store, "downtown", 10).await;
        assert_eq!(surge.multiplier("downtown").await, first);

        tokio::time::advance(std::time::Duration::from_secs(31)).await;
        let refreshed = surge.multiplier("downtown").await;
        assert!(refreshed > first);
    }

    #[tokio::test]
    async fn regions_are_independent() {
        let store = Arc::new(InMemoryRideStore::new());
        seed_active_rides(&store, "downtown", 20).await;
        let surge = SurgeEstimator::new(store, SurgeConfig::default());

        assert!(surge.multiplier("downtown").await > 1.0);
        assert_eq!(surge.multiplier("suburbs").await, 1.0);
    }
}
