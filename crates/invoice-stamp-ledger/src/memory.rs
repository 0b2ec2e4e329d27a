//! In-memory implementation of the ChainLedger trait.
//!
//! Same semantics as SQLite, no persistence. All state is lost when the
//! ledger is dropped.

use std::time::Duration;

use dashmap::DashMap;
use invoice_stamp_core::{Digest, EntityId, SequenceRecord};
use tracing::{debug, instrument, warn};

use crate::error::{LedgerError, Result};
use crate::locks::EntityLocks;
use crate::traits::{ChainLedger, Reservation};

/// In-memory ledger.
pub struct MemoryLedger {
    records: DashMap<EntityId, SequenceRecord>,
    locks: EntityLocks,
    placeholder: Digest,
}

impl MemoryLedger {
    /// Create an empty ledger whose chains start from `placeholder`.
    pub fn new(placeholder: Digest) -> Self {
        Self {
            records: DashMap::new(),
            locks: EntityLocks::new(),
            placeholder,
        }
    }

    /// Seed an entity's chain, e.g. when migrating from another ledger.
    pub fn with_record(self, entity: EntityId, record: SequenceRecord) -> Self {
        self.records.insert(entity, record);
        self
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new(Digest::placeholder())
    }
}

impl ChainLedger for MemoryLedger {
    #[instrument(level = "debug", skip(self, entity), fields(entity = %entity))]
    fn reserve_within(&self, entity: &EntityId, wait: Option<Duration>) -> Result<Reservation> {
        let lease = self.locks.acquire(entity, wait)?;
        let previous = self.records.get(entity).map(|r| *r.value());
        let reservation = Reservation::new(lease, previous, self.placeholder);
        debug!(counter = reservation.counter(), "reserved");
        Ok(reservation)
    }

    fn commit(&self, reservation: Reservation, digest: Digest) -> Result<SequenceRecord> {
        let entity = reservation.entity().clone();
        let next = reservation.next_record(digest);

        // The shard lock makes check-and-write atomic for this entity.
        let mut slot = self
            .records
            .entry(entity.clone())
            .or_insert(SequenceRecord::new(0, self.placeholder));
        let found = slot.counter;
        let expected = reservation.basis_counter();
        if found != expected {
            warn!(entity = %entity, expected, found, "commit conflict");
            return Err(LedgerError::Conflict {
                entity: entity.to_string(),
                expected,
                found,
            });
        }
        *slot = next;
        drop(slot);

        debug!(entity = %entity, counter = next.counter, digest = ?next.last_digest, "committed");
        Ok(next)
    }

    fn current(&self, entity: &EntityId) -> Result<Option<SequenceRecord>> {
        Ok(self
            .records
            .get(entity)
            .map(|r| *r.value())
            .filter(|r| r.counter > 0))
    }

    fn entities(&self) -> Result<Vec<EntityId>> {
        let mut entities: Vec<EntityId> = self
            .records
            .iter()
            .filter(|r| r.value().counter > 0)
            .map(|r| r.key().clone())
            .collect();
        entities.sort();
        Ok(entities)
    }

    fn placeholder(&self) -> Digest {
        self.placeholder
    }
}
