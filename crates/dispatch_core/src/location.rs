//! Freshness-bounded driver location store.
//!
//! Drivers report position every second or two; an entry older than the TTL
//! is treated as absent (the driver simply disappears from matching) rather
//! than stale-but-present. Positions are bucketed into H3 cells so radius
//! queries only touch the buckets inside a covering grid disk, with an exact
//! haversine filter on top. Nothing here is persisted; loss is tolerable.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use h3o::{CellIndex, Resolution};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::LocationConfig;
use crate::spatial::{cell_for, haversine_km, ring_for_radius, valid_coords};

/// Latest known position for a driver.
#[derive(Debug, Clone, Copy)]
pub struct DriverLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub recorded_at: Instant,
}

#[async_trait]
pub trait LocationStore: Send + Sync {
    /// Record the freshest position for a driver, resetting its TTL.
    async fn set(&self, driver_id: Uuid, latitude: f64, longitude: f64);
    /// Fresh position for a driver, or `None` if unknown or expired.
    async fn get(&self, driver_id: Uuid) -> Option<DriverLocation>;
    /// Ids of drivers with a fresh position within `radius_km` of the point.
    async fn radius_query(&self, latitude: f64, longitude: f64, radius_km: f64) -> Vec<Uuid>;
    async fn remove(&self, driver_id: Uuid);
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    latitude: f64,
    longitude: f64,
    cell: CellIndex,
    recorded_at: Instant,
}

#[derive(Debug, Default)]
struct Index {
    entries: HashMap<Uuid, Entry>,
    buckets: HashMap<CellIndex, HashSet<Uuid>>,
}

impl Index {
    fn unlink(&mut self, driver_id: Uuid, cell: CellIndex) {
        if let Some(bucket) = self.buckets.get_mut(&cell) {
            bucket.remove(&driver_id);
            if bucket.is_empty() {
                self.buckets.remove(&cell);
            }
        }
    }
}

/// In-memory implementation backed by per-cell buckets.
#[derive(Debug)]
pub struct InMemoryLocationStore {
    resolution: Resolution,
    ttl: Duration,
    index: RwLock<Index>,
}

impl InMemoryLocationStore {
    pub fn new(config: &LocationConfig) -> Self {
        let resolution = Resolution::try_from(config.h3_resolution).unwrap_or(Resolution::Nine);
        Self {
            resolution,
            ttl: config.ttl,
            index: RwLock::new(Index::default()),
        }
    }

    fn is_fresh(&self, entry: &Entry) -> bool {
        entry.recorded_at.elapsed() < self.ttl
    }
}

#[async_trait]
impl LocationStore for InMemoryLocationStore {
    async fn set(&self, driver_id: Uuid, latitude: f64, longitude: f64) {
        if !valid_coords(latitude, longitude) {
            warn!(driver = %driver_id, latitude, longitude, "ignoring invalid location report");
            return;
        }
        let cell = match cell_for(latitude, longitude, self.resolution) {
            Some(cell) => cell,
            None => {
                warn!(driver = %driver_id, "could not bucket location report");
                return;
            }
        };
        let entry = Entry {
            latitude,
            longitude,
            cell,
            recorded_at: Instant::now(),
        };
        let mut index = self.index.write().await;
        if let Some(previous) = index.entries.insert(driver_id, entry) {
            if previous.cell != cell {
                index.unlink(driver_id, previous.cell);
            }
        }
        index.buckets.entry(cell).or_default().insert(driver_id);
        debug!(driver = %driver_id, latitude, longitude, "location updated");
    }

    async fn get(&self, driver_id: Uuid) -> Option<DriverLocation> {
        let index = self.index.read().await;
        let entry = index.entries.get(&driver_id)?;
        if !self.is_fresh(entry) {
            return None;
        }
        Some(DriverLocation {
            latitude: entry.latitude,
            longitude: entry.longitude,
            recorded_at: entry.recorded_at,
        })
    }

    async fn radius_query(&self, latitude: f64, longitude: f64, radius_km: f64) -> Vec<Uuid> {
        let center = match cell_for(latitude, longitude, self.resolution) {
            Some(cell) => cell,
            None => return Vec::new(),
        };
        let rings = ring_for_radius(radius_km, self.resolution);
        let cells = center.grid_disk::<Vec<_>>(rings);

        let mut nearby = Vec::new();
        let mut expired = Vec::new();
        {
            let index = self.index.read().await;
            for cell in &cells {
                let Some(bucket) = index.buckets.get(cell) else {
                    continue;
                };
                for driver_id in bucket {
                    let Some(entry) = index.entries.get(driver_id) else {
                        continue;
                    };
                    if !self.is_fresh(entry) {
                        expired.push(*driver_id);
                        continue;
                    }
                    let distance =
                        haversine_km(latitude, longitude, entry.latitude, entry.longitude);
                    if distance <= radius_km {
                        nearby.push(*driver_id);
                    }
                }
            }
        }

        // Lazy eviction of expired entries seen during the scan.
        if !expired.is_empty() {
            let mut index = self.index.write().await;
            for driver_id in expired {
                if let Some(entry) = index.entries.get(&driver_id).copied() {
                    if entry.recorded_at.elapsed() >= self.ttl {
                        index.entries.remove(&driver_id);
                        index.unlink(driver_id, entry.cell);
                    }
                }
            }
        }

        debug!(count = nearby.len(), radius_km, "radius query completed");
        nearby
    }

    async fn remove(&self, driver_id: Uuid) {
        let mut index = self.index.write().await;
        if let Some(entry) = index.entries.remove(&driver_id) {
            index.unlink(driver_id, entry.cell);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(ttl: Duration) -> InMemoryLocationStore {
        InMemoryLocationStore::new(&LocationConfig {
            ttl,
            ..LocationConfig::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn set_then_get_returns_position() {
        let store = store(Duration::from_secs(300));
        let driver = Uuid::new_v4();
        store.set(driver, 37.7749, -122.4194).await;

        let loc = store.get(driver).await.expect("location");
        assert_eq!(loc.latitude, 37.7749);
        assert_eq!(loc.longitude, -122.4194);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_absent() {
        let store = store(Duration::from_secs(10));
        let driver = Uuid::new_v4();
        store.set(driver, 37.7749, -122.4194).await;

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(store.get(driver).await.is_none());
        assert!(store.radius_query(37.7749, -122.4194, 5.0).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn re_report_revives_expired_driver() {
        let store = store(Duration::from_secs(10));
        let driver = Uuid::new_v4();
        store.set(driver, 37.7749, -122.4194).await;
        tokio::time::advance(Duration::from_secs(11)).await;
        store.set(driver, 37.7749, -122.4194).await;

        assert!(store.get(driver).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn radius_query_filters_by_distance() {
        let store = store(Duration::from_secs(300));
        let near = Uuid::new_v4();
        let far = Uuid::new_v4();
        // ~1.2 km and ~20 km from the pickup point respectively.
        store.set(near, 37.7850, -122.4100).await;
        store.set(far, 37.6000, -122.3000).await;

        let nearby = store.radius_query(37.7749, -122.4194, 5.0).await;
        assert!(nearby.contains(&near));
        assert!(!nearby.contains(&far));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_report_is_ignored() {
        let store = store(Duration::from_secs(300));
        let driver = Uuid::new_v4();
        store.set(driver, f64::NAN, -122.4194).await;
        assert!(store.get(driver).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn remove_clears_entry_and_bucket() {
        let store = store(Duration::from_secs(300));
        let driver = Uuid::new_v4();
        store.set(driver, 37.7749, -122.4194).await;
        store.remove(driver).await;

        assert!(store.get(driver).await.is_none());
        assert!(store.radius_query(37.7749, -122.4194, 5.0).await.is_empty());
    }
}
