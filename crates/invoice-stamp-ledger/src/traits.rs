//! ChainLedger trait: the abstract interface for per-entity chain state.
//!
//! Implementations include SQLite (persistent) and in-memory (for tests and
//! single-process use).

use std::time::Duration;

use invoice_stamp_core::{Digest, EntityId, SequenceRecord};

use crate::error::Result;
use crate::locks::EntityLease;

/// A claimed, not yet committed, position in an entity's chain.
///
/// Holds the entity's exclusive lease. Dropping a reservation without
/// committing it releases the lease and leaves the ledger untouched.
#[derive(Debug)]
pub struct Reservation {
    previous: Option<SequenceRecord>,
    counter: u64,
    previous_digest: Digest,
    lease: EntityLease,
}

impl Reservation {
    /// Build a reservation on top of the entity's current record.
    ///
    /// With no record, the counter is 1 and the previous digest is
    /// `placeholder`.
    pub fn new(lease: EntityLease, previous: Option<SequenceRecord>, placeholder: Digest) -> Self {
        let (counter, previous_digest) = match previous {
            Some(record) => (record.next_counter(), record.last_digest),
            None => (1, placeholder),
        };
        Self {
            previous,
            counter,
            previous_digest,
            lease,
        }
    }

    pub fn entity(&self) -> &EntityId {
        self.lease.entity()
    }

    /// The record this reservation was based on.
    pub fn previous(&self) -> Option<&SequenceRecord> {
        self.previous.as_ref()
    }

    /// Counter of the previous record, 0 if there was none.
    pub fn basis_counter(&self) -> u64 {
        self.previous.map(|r| r.counter).unwrap_or(0)
    }

    /// Counter the document being stamped receives.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Digest the document being stamped links back to.
    pub fn previous_digest(&self) -> &Digest {
        &self.previous_digest
    }

    /// The record that committing `digest` will store.
    pub fn next_record(&self, digest: Digest) -> SequenceRecord {
        SequenceRecord::new(self.counter, digest)
    }
}

/// The ChainLedger trait: two-phase access to per-entity sequence records.
///
/// # Design Notes
///
/// - **Exclusive reservation**: between `reserve` and `commit` (or drop), no
///   other reservation for the same entity is granted in this process.
/// - **Compare-and-swap commit**: `commit` succeeds only if the stored record
///   is still the one the reservation was based on; otherwise it returns
///   [`LedgerError::Conflict`](crate::LedgerError::Conflict) and changes nothing.
/// - **Entities are independent**: reservations for different entities never
///   wait on each other.
pub trait ChainLedger: Send + Sync {
    /// Reserve the next position for `entity`, waiting at most `wait`
    /// (forever with `None`).
    fn reserve_within(&self, entity: &EntityId, wait: Option<Duration>) -> Result<Reservation>;

    /// Store `digest` as the entity's latest document and release the lease.
    fn commit(&self, reservation: Reservation, digest: Digest) -> Result<SequenceRecord>;

    /// The entity's latest committed record.
    fn current(&self, entity: &EntityId) -> Result<Option<SequenceRecord>>;

    /// Every entity with at least one committed record, sorted.
    fn entities(&self) -> Result<Vec<EntityId>>;

    /// Previous digest given to the first document of a chain.
    fn placeholder(&self) -> Digest;

    /// Reserve the next position for `entity`, waiting as long as needed.
    fn reserve(&self, entity: &EntityId) -> Result<Reservation> {
        self.reserve_within(entity, None)
    }
}

impl<L: ChainLedger + ?Sized> ChainLedger for std::sync::Arc<L> {
    fn reserve_within(&self, entity: &EntityId, wait: Option<Duration>) -> Result<Reservation> {
        (**self).reserve_within(entity, wait)
    }

    fn commit(&self, reservation: Reservation, digest: Digest) -> Result<SequenceRecord> {
        (**self).commit(reservation, digest)
    }

    fn current(&self, entity: &EntityId) -> Result<Option<SequenceRecord>> {
        (**self).current(entity)
    }

    fn entities(&self) -> Result<Vec<EntityId>> {
        (**self).entities()
    }

    fn placeholder(&self) -> Digest {
        (**self).placeholder()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locks::EntityLocks;

    #[test]
    fn test_first_reservation_uses_placeholder() {
        let locks = EntityLocks::new();
        let lease = locks.acquire(&EntityId::from("e"), None).unwrap();
        let r = Reservation::new(lease, None, Digest::placeholder());
        assert_eq!(r.counter(), 1);
        assert_eq!(r.basis_counter(), 0);
        assert_eq!(r.previous_digest(), &Digest::placeholder());
    }

    #[test]
    fn test_reservation_builds_on_previous() {
        let locks = EntityLocks::new();
        let lease = locks.acquire(&EntityId::from("e"), None).unwrap();
        let last = Digest::of(b"doc-4");
        let r = Reservation::new(lease, Some(SequenceRecord::new(4, last)), Digest::placeholder());
        assert_eq!(r.counter(), 5);
        assert_eq!(r.basis_counter(), 4);
        assert_eq!(r.previous_digest(), &last);
        assert_eq!(r.next_record(Digest::of(b"doc-5")).counter, 5);
    }

    #[test]
    fn test_dropping_reservation_releases_lease() {
        let locks = EntityLocks::new();
        let entity = EntityId::from("e");
        let lease = locks.acquire(&entity, None).unwrap();
        let r = Reservation::new(lease, None, Digest::placeholder());
        assert!(locks.is_held(&entity));
        drop(r);
        assert!(!locks.is_held(&entity));
    }
}
