//! Per-entity exclusive leases.
//!
//! Each entity gets one slot holding a `held` flag and a condition variable.
//! Acquiring a lease waits until the flag is clear and sets it; dropping the
//! lease clears it and wakes one waiter. Slots for different entities never
//! contend with each other.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use invoice_stamp_core::EntityId;
use parking_lot::{Condvar, Mutex};

use crate::error::{LedgerError, Result};

#[derive(Default)]
struct Slot {
    held: Mutex<bool>,
    released: Condvar,
}

/// Table of per-entity slots, created lazily on first use.
#[derive(Default)]
pub struct EntityLocks {
    slots: DashMap<EntityId, Arc<Slot>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, entity: &EntityId) -> Arc<Slot> {
        // Clone out of the map so no shard lock is held while waiting.
        self.slots
            .entry(entity.clone())
            .or_default()
            .value()
            .clone()
    }

    /// Block until `entity` is free, then take it.
    ///
    /// With `wait = Some(d)`, give up after `d` with [`LedgerError::Timeout`].
    pub fn acquire(&self, entity: &EntityId, wait: Option<Duration>) -> Result<EntityLease> {
        let slot = self.slot(entity);
        {
            let mut held = slot.held.lock();
            match wait {
                None => {
                    while *held {
                        slot.released.wait(&mut held);
                    }
                }
                Some(limit) => {
                    let deadline = Instant::now() + limit;
                    while *held {
                        if slot.released.wait_until(&mut held, deadline).timed_out() && *held {
                            return Err(LedgerError::Timeout {
                                entity: entity.to_string(),
                                waited_ms: limit.as_millis() as u64,
                            });
                        }
                    }
                }
            }
            *held = true;
        }

        Ok(EntityLease {
            entity: entity.clone(),
            slot,
        })
    }

    /// True if some lease on `entity` is currently outstanding.
    pub fn is_held(&self, entity: &EntityId) -> bool {
        self.slots
            .get(entity)
            .map(|slot| *slot.held.lock())
            .unwrap_or(false)
    }
}

/// Exclusive hold on one entity. Released on drop.
pub struct EntityLease {
    entity: EntityId,
    slot: Arc<Slot>,
}

impl EntityLease {
    pub fn entity(&self) -> &EntityId {
        &self.entity
    }
}

impl std::fmt::Debug for EntityLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityLease")
            .field("entity", &self.entity)
            .finish()
    }
}

impl Drop for EntityLease {
    fn drop(&mut self) {
        *self.slot.held.lock() = false;
        self.slot.released.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_acquire_and_release() {
        let locks = EntityLocks::new();
        let entity = EntityId::from("300000000000003");

        let lease = locks.acquire(&entity, None).unwrap();
        assert!(locks.is_held(&entity));
        drop(lease);
        assert!(!locks.is_held(&entity));

        // Reacquire after release.
        let _lease = locks.acquire(&entity, Some(Duration::from_millis(10))).unwrap();
    }

    #[test]
    fn test_timeout_while_held() {
        let locks = EntityLocks::new();
        let entity = EntityId::from("a");
        let _lease = locks.acquire(&entity, None).unwrap();

        let err = locks
            .acquire(&entity, Some(Duration::from_millis(20)))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Timeout { waited_ms: 20, .. }));
    }

    #[test]
    fn test_entities_are_independent() {
        let locks = EntityLocks::new();
        let _a = locks.acquire(&EntityId::from("a"), None).unwrap();
        let _b = locks
            .acquire(&EntityId::from("b"), Some(Duration::from_millis(10)))
            .unwrap();
    }

    #[test]
    fn test_mutual_exclusion_across_threads() {
        let locks = EntityLocks::new();
        let entity = EntityId::from("shared");
        let inside = AtomicUsize::new(0);
        let max_inside = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..50 {
                        let _lease = locks.acquire(&entity, None).unwrap();
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        std::thread::yield_now();
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(!locks.is_held(&entity));
    }
}
