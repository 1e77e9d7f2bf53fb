//! Per-entity mutual exclusion for transition sequences.
//!
//! One async mutex per entity id, allocated lazily. A lifecycle manager
//! acquires the entity's lock for the duration of a read-check-write
//! sequence (assign, accept, cancel, start, pause, resume, end); the owned
//! guard releases on every exit path, including errors. Ride and trip
//! managers must share a single `EntityLocks` so cross-manager operations on
//! the same ride serialize.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct EntityLocks {
    // Entries are never removed; the map is bounded by the number of live
    // entity ids, which terminal entities keep contributing to. Acceptable
    // for the in-process deployment this backs.
    inner: StdMutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the exclusive lock for an entity id, waiting if another
    /// transition holds it.
    pub async fn acquire(&self, id: Uuid) -> OwnedMutexGuard<()> {
        let handle = {
            let mut map = self
                .inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry(id).or_default())
        };
        handle.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_id_serializes_critical_sections() {
        let locks = Arc::new(EntityLocks::new());
        let id = Uuid::new_v4();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            tasks.push(tokio::spawn(async move {
                let _guard = locks.acquire(id).await;
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.expect("task");
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_ids_do_not_block_each_other() {
        let locks = EntityLocks::new();
        let _a = locks.acquire(Uuid::new_v4()).await;
        let _b = locks.acquire(Uuid::new_v4()).await;
    }
}
