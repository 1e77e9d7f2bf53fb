//! Candidate discovery and selection for a pickup request.
//!
//! Matching intersects two views of the fleet: availability records
//! (status + tier + region) and fresh positions from the location store.
//! The intersection is capped before ranking so a dense region cannot blow
//! up ranking cost. When the intersection is empty, `diagnose_no_match`
//! re-runs the query with each constraint relaxed in turn to produce a
//! precise user-facing reason.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::MatchingConfig;
use crate::error::DispatchResult;
use crate::location::LocationStore;
use crate::model::{DriverRecord, DriverStatus, VehicleTier};
use crate::spatial::haversine_km;
use crate::store::DriverStore;

use super::ranking::CandidateRanking;
use super::types::{MatchCandidate, NoMatchReason};

pub struct DriverMatcher {
    drivers: Arc<dyn DriverStore>,
    locations: Arc<dyn LocationStore>,
    ranking: Box<dyn CandidateRanking>,
    config: MatchingConfig,
}

impl DriverMatcher {
    pub fn new(
        drivers: Arc<dyn DriverStore>,
        locations: Arc<dyn LocationStore>,
        ranking: Box<dyn CandidateRanking>,
        config: MatchingConfig,
    ) -> Self {
        Self {
            drivers,
            locations,
            ranking,
            config,
        }
    }

    /// The single best available driver for the pickup, or `None` if any
    /// stage of the funnel comes up empty.
    pub async fn find_best_driver(
        &self,
        pickup_lat: f64,
        pickup_lon: f64,
        tier: VehicleTier,
        region: &str,
    ) -> DispatchResult<Option<DriverRecord>> {
        let available = self.drivers.find_available(tier, region).await?;
        if available.is_empty() {
            warn!(%tier, region, "no available drivers for tier in region");
            return Ok(None);
        }

        let nearby: HashSet<Uuid> = self
            .locations
            .radius_query(pickup_lat, pickup_lon, self.config.search_radius_km)
            .await
            .into_iter()
            .collect();
        if nearby.is_empty() {
            warn!(
                radius_km = self.config.search_radius_km,
                "no driver locations within search radius"
            );
            return Ok(None);
        }

        let shortlist: Vec<&DriverRecord> = available
            .iter()
            .filter(|driver| nearby.contains(&driver.id))
            .take(self.config.max_candidates)
            .collect();
        if shortlist.is_empty() {
            warn!(%tier, region, "no available drivers nearby");
            return Ok(None);
        }

        let mut candidates = Vec::with_capacity(shortlist.len());
        for driver in &shortlist {
            let Some(location) = self.locations.get(driver.id).await else {
                // Expired between the radius query and here; skip.
                continue;
            };
            candidates.push(MatchCandidate {
                driver_id: driver.id,
                distance_km: haversine_km(
                    pickup_lat,
                    pickup_lon,
                    location.latitude,
                    location.longitude,
                ),
                rating: driver.rating,
            });
        }

        let best = self.ranking.best(&candidates).and_then(|driver_id| {
            shortlist
                .iter()
                .find(|driver| driver.id == driver_id)
                .map(|driver| (*driver).clone())
        });

        info!(
            %tier,
            region,
            available = available.len(),
            nearby = nearby.len(),
            candidates = candidates.len(),
            matched = best.is_some(),
            "driver matching completed"
        );
        Ok(best)
    }

    /// Explain an empty match by relaxing the query one constraint at a
    /// time. Infallible: store errors degrade to the generic reason.
    pub async fn diagnose_no_match(
        &self,
        pickup_lat: f64,
        pickup_lon: f64,
        tier: VehicleTier,
        region: &str,
    ) -> NoMatchReason {
        let available = match self.drivers.find_available(tier, region).await {
            Ok(drivers) => drivers,
            Err(err) => {
                error!(error = %err, "could not query drivers for diagnostics");
                return NoMatchReason::NoSuitableDriver;
            }
        };

        if available.is_empty() {
            let all = self
                .drivers
                .list_by_tier_and_region(tier, region)
                .await
                .unwrap_or_default();
            if all.is_empty() {
                return NoMatchReason::NoDriversInRegion {
                    tier,
                    region: region.to_string(),
                };
            }
            let available_count = all
                .iter()
                .filter(|driver| driver.status == DriverStatus::Available)
                .count();
            if available_count == 0 {
                return NoMatchReason::NoneAvailable {
                    tier,
                    region: region.to_string(),
                };
            }
        }

        let nearby = self
            .locations
            .radius_query(pickup_lat, pickup_lon, self.config.search_radius_km)
            .await;
        if nearby.is_empty() {
            return NoMatchReason::NoLocationsInRadius {
                radius_km: self.config.search_radius_km,
            };
        }

        let nearby: HashSet<Uuid> = nearby.into_iter().collect();
        let any_candidate = available.iter().any(|driver| nearby.contains(&driver.id));
        if !any_candidate {
            return NoMatchReason::NoneWithinRadius {
                tier,
                region: region.to_string(),
                radius_km: self.config.search_radius_km,
            };
        }

        debug!("diagnostics found candidates; reporting generic reason");
        NoMatchReason::NoSuitableDriver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LocationConfig;
    use crate::location::InMemoryLocationStore;
    use crate::matching::NearestDriverRanking;
    use crate::store::{DriverStore, InMemoryDriverStore};

    fn driver(tier: VehicleTier, region: &str, rating: f64) -> DriverRecord {
        DriverRecord {
            id: Uuid::new_v4(),
            name: "Test Driver".into(),
            phone_number: "+1-555-0100".into(),
            vehicle_number: "CA-1234".into(),
            status: DriverStatus::Available,
            vehicle_tier: tier,
            region: region.into(),
            rating,
        }
    }

    fn matcher(
        drivers: Arc<InMemoryDriverStore>,
        locations: Arc<InMemoryLocationStore>,
    ) -> DriverMatcher {
        DriverMatcher::new(
            drivers,
            locations,
            Box::new(NearestDriverRanking),
            MatchingConfig::default(),
        )
    }

    const PICKUP: (f64, f64) = (37.7749, -122.4194);

    #[tokio::test]
    async fn picks_nearest_available_driver() {
        let drivers = Arc::new(InMemoryDriverStore::new());
        let locations = Arc::new(InMemoryLocationStore::new(&LocationConfig::default()));

        let near = driver(VehicleTier::Economy, "bay-area", 4.0);
        let far = driver(VehicleTier::Economy, "bay-area", 5.0);
        drivers.put(near.clone()).await.expect("near");
        drivers.put(far.clone()).await.expect("far");
        locations.set(near.id, 37.7800, -122.4150).await;
        locations.set(far.id, 37.7400, -122.4600).await;

        let best = matcher(drivers, locations)
            .find_best_driver(PICKUP.0, PICKUP.1, VehicleTier::Economy, "bay-area")
            .await
            .expect("matching")
            .expect("a driver");
        assert_eq!(best.id, near.id);
    }

    #[tokio::test]
    async fn busy_drivers_are_not_considered() {
        let drivers = Arc::new(InMemoryDriverStore::new());
        let locations = Arc::new(InMemoryLocationStore::new(&LocationConfig::default()));

        let mut busy = driver(VehicleTier::Economy, "bay-area", 5.0);
        busy.status = DriverStatus::Busy;
        drivers.put(busy.clone()).await.expect("busy");
        locations.set(busy.id, 37.7800, -122.4150).await;

        let best = matcher(drivers, locations)
            .find_best_driver(PICKUP.0, PICKUP.1, VehicleTier::Economy, "bay-area")
            .await
            .expect("matching");
        assert!(best.is_none());
    }

    #[tokio::test]
    async fn wrong_tier_or_region_is_excluded() {
        let drivers = Arc::new(InMemoryDriverStore::new());
        let locations = Arc::new(InMemoryLocationStore::new(&LocationConfig::default()));

        let suv = driver(VehicleTier::Suv, "bay-area", 5.0);
        let elsewhere = driver(VehicleTier::Economy, "valley", 5.0);
        drivers.put(suv.clone()).await.expect("suv");
        drivers.put(elsewhere.clone()).await.expect("elsewhere");
        locations.set(suv.id, 37.7800, -122.4150).await;
        locations.set(elsewhere.id, 37.7800, -122.4150).await;

        let best = matcher(drivers, locations)
            .find_best_driver(PICKUP.0, PICKUP.1, VehicleTier::Economy, "bay-area")
            .await
            .expect("matching");
        assert!(best.is_none());
    }

    #[tokio::test]
    async fn diagnoses_missing_tier_in_region() {
        let drivers = Arc::new(InMemoryDriverStore::new());
        let locations = Arc::new(InMemoryLocationStore::new(&LocationConfig::default()));

        let reason = matcher(drivers, locations)
            .diagnose_no_match(PICKUP.0, PICKUP.1, VehicleTier::Luxury, "bay-area")
            .await;
        assert_eq!(
            reason,
            NoMatchReason::NoDriversInRegion {
                tier: VehicleTier::Luxury,
                region: "bay-area".into()
            }
        );
    }

    #[tokio::test]
    async fn diagnoses_all_drivers_busy() {
        let drivers = Arc::new(InMemoryDriverStore::new());
        let locations = Arc::new(InMemoryLocationStore::new(&LocationConfig::default()));

        let mut busy = driver(VehicleTier::Economy, "bay-area", 5.0);
        busy.status = DriverStatus::OnRide;
        drivers.put(busy).await.expect("busy");

        let reason = matcher(drivers, locations)
            .diagnose_no_match(PICKUP.0, PICKUP.1, VehicleTier::Economy, "bay-area")
            .await;
        assert_eq!(
            reason,
            NoMatchReason::NoneAvailable {
                tier: VehicleTier::Economy,
                region: "bay-area".into()
            }
        );
    }

    #[tokio::test]
    async fn diagnoses_no_location_data_in_radius() {
        let drivers = Arc::new(InMemoryDriverStore::new());
        let locations = Arc::new(InMemoryLocationStore::new(&LocationConfig::default()));

        drivers
            .put(driver(VehicleTier::Economy, "bay-area", 5.0))
            .await
            .expect("driver");

        let reason = matcher(drivers, locations)
            .diagnose_no_match(PICKUP.0, PICKUP.1, VehicleTier::Economy, "bay-area")
            .await;
        assert_eq!(reason, NoMatchReason::NoLocationsInRadius { radius_km: 5.0 });
    }

    #[tokio::test]
    async fn diagnoses_available_drivers_outside_radius() {
        let drivers = Arc::new(InMemoryDriverStore::new());
        let locations = Arc::new(InMemoryLocationStore::new(&LocationConfig::default()));

        let distant = driver(VehicleTier::Economy, "bay-area", 5.0);
        drivers.put(distant.clone()).await.expect("driver");
        // A different driver (other region) reports near the pickup, so the
        // radius query itself is non-empty.
        let other = driver(VehicleTier::Economy, "valley", 5.0);
        drivers.put(other.clone()).await.expect("other");
        locations.set(other.id, 37.7800, -122.4150).await;
        locations.set(distant.id, 37.2000, -121.9000).await;

        let reason = matcher(drivers, locations)
            .diagnose_no_match(PICKUP.0, PICKUP.1, VehicleTier::Economy, "bay-area")
            .await;
        assert_eq!(
            reason,
            NoMatchReason::NoneWithinRadius {
                tier: VehicleTier::Economy,
                region: "bay-area".into(),
                radius_km: 5.0
            }
        );
    }
}
