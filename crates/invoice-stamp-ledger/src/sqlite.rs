//! SQLite implementation of the ChainLedger trait.
//!
//! The persistent backend. Commits are compare-and-swap on the stored
//! counter, so several processes sharing one database file can never both
//! commit the same chain position: the loser gets
//! [`LedgerError::Conflict`] and retries with a fresh reservation.

use std::path::Path;
use std::time::Duration;

use invoice_stamp_core::{Digest, EntityId, SequenceRecord};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, instrument, warn};

use crate::error::{LedgerError, Result};
use crate::locks::EntityLocks;
use crate::migration::{self, now_millis};
use crate::traits::{ChainLedger, Reservation};

/// SQLite-based ledger.
///
/// The connection sits behind a mutex; it is only held for the duration of
/// a single statement or transaction, never across reserve and commit.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
    locks: EntityLocks,
    placeholder: Digest,
}

impl SqliteLedger {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed.
    pub fn open(path: impl AsRef<Path>, placeholder: Digest) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        migration::migrate(&mut conn)?;
        Ok(Self::from_connection(conn, placeholder))
    }

    /// Open an in-memory SQLite database with the standard placeholder.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self::from_connection(conn, Digest::placeholder()))
    }

    fn from_connection(conn: Connection, placeholder: Digest) -> Self {
        Self {
            conn: Mutex::new(conn),
            locks: EntityLocks::new(),
            placeholder,
        }
    }

    /// Every committed record for `entity`, oldest first.
    pub fn history(&self, entity: &EntityId) -> Result<Vec<SequenceRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT counter, digest FROM chain_history WHERE entity_id = ?1 ORDER BY counter",
        )?;
        let rows = stmt.query_map([entity.as_str()], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (counter, digest) = row?;
            records.push(to_record(counter, &digest)?);
        }
        Ok(records)
    }

    fn read_current(conn: &Connection, entity: &EntityId) -> Result<Option<SequenceRecord>> {
        let row = conn
            .query_row(
                "SELECT counter, last_digest FROM chain_records WHERE entity_id = ?1",
                [entity.as_str()],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?)),
            )
            .optional()?;

        row.map(|(counter, digest)| to_record(counter, &digest))
            .transpose()
    }
}

fn to_record(counter: i64, digest: &[u8]) -> Result<SequenceRecord> {
    let counter = u64::try_from(counter)
        .map_err(|_| LedgerError::InvalidData(format!("negative counter {}", counter)))?;
    let digest = Digest::try_from(digest)
        .map_err(|e| LedgerError::InvalidData(format!("stored digest: {}", e)))?;
    Ok(SequenceRecord::new(counter, digest))
}

fn to_sql_counter(counter: u64) -> Result<i64> {
    i64::try_from(counter)
        .map_err(|_| LedgerError::InvalidData(format!("counter {} out of range", counter)))
}

impl ChainLedger for SqliteLedger {
    #[instrument(level = "debug", skip(self, entity), fields(entity = %entity))]
    fn reserve_within(&self, entity: &EntityId, wait: Option<Duration>) -> Result<Reservation> {
        let lease = self.locks.acquire(entity, wait)?;
        let previous = {
            let conn = self.conn.lock();
            Self::read_current(&conn, entity)?
        };
        let reservation = Reservation::new(lease, previous, self.placeholder);
        debug!(counter = reservation.counter(), "reserved");
        Ok(reservation)
    }

    fn commit(&self, reservation: Reservation, digest: Digest) -> Result<SequenceRecord> {
        let entity = reservation.entity().clone();
        let next = reservation.next_record(digest);
        let expected = reservation.basis_counter();
        let now = now_millis();

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let changed = match reservation.previous() {
            None => tx.execute(
                "INSERT INTO chain_records (entity_id, counter, last_digest, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(entity_id) DO NOTHING",
                params![
                    entity.as_str(),
                    to_sql_counter(next.counter)?,
                    digest.as_bytes().as_slice(),
                    now
                ],
            )?,
            Some(_) => tx.execute(
                "UPDATE chain_records
                 SET counter = ?1, last_digest = ?2, updated_at = ?3
                 WHERE entity_id = ?4 AND counter = ?5",
                params![
                    to_sql_counter(next.counter)?,
                    digest.as_bytes().as_slice(),
                    now,
                    entity.as_str(),
                    to_sql_counter(expected)?
                ],
            )?,
        };

        if changed == 0 {
            let found = Self::read_current(&tx, &entity)?
                .map(|r| r.counter)
                .unwrap_or(0);
            warn!(entity = %entity, expected, found, "commit conflict");
            return Err(LedgerError::Conflict {
                entity: entity.to_string(),
                expected,
                found,
            });
        }

        tx.execute(
            "INSERT INTO chain_history (entity_id, counter, digest, previous_digest, committed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entity.as_str(),
                to_sql_counter(next.counter)?,
                digest.as_bytes().as_slice(),
                reservation.previous_digest().as_bytes().as_slice(),
                now
            ],
        )?;
        tx.commit()?;
        drop(conn);

        debug!(entity = %entity, counter = next.counter, digest = ?digest, "committed");
        Ok(next)
    }

    fn current(&self, entity: &EntityId) -> Result<Option<SequenceRecord>> {
        let conn = self.conn.lock();
        Self::read_current(&conn, entity)
    }

    fn entities(&self) -> Result<Vec<EntityId>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT entity_id FROM chain_records ORDER BY entity_id")?;
        let entities = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .map(|r| r.map(EntityId::from))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entities)
    }

    fn placeholder(&self) -> Digest {
        self.placeholder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity() -> EntityId {
        EntityId::from("310122393500003")
    }

    #[test]
    fn test_chain_in_memory_db() {
        let ledger = SqliteLedger::open_memory().unwrap();
        let d1 = Digest::of(b"one");
        let d2 = Digest::of(b"two");

        let r = ledger.reserve(&entity()).unwrap();
        assert_eq!(r.counter(), 1);
        assert_eq!(r.previous_digest(), &Digest::placeholder());
        ledger.commit(r, d1).unwrap();

        let r = ledger.reserve(&entity()).unwrap();
        assert_eq!(r.counter(), 2);
        assert_eq!(r.previous_digest(), &d1);
        ledger.commit(r, d2).unwrap();

        assert_eq!(ledger.current(&entity()).unwrap(), Some(SequenceRecord::new(2, d2)));
        assert_eq!(
            ledger.history(&entity()).unwrap(),
            vec![SequenceRecord::new(1, d1), SequenceRecord::new(2, d2)]
        );
    }

    #[test]
    fn test_dropped_reservation_changes_nothing() {
        let ledger = SqliteLedger::open_memory().unwrap();
        drop(ledger.reserve(&entity()).unwrap());
        assert_eq!(ledger.current(&entity()).unwrap(), None);
        assert!(ledger.entities().unwrap().is_empty());
    }

    #[test]
    fn test_reopen_keeps_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let d1 = Digest::of(b"one");

        {
            let ledger = SqliteLedger::open(&path, Digest::placeholder()).unwrap();
            let r = ledger.reserve(&entity()).unwrap();
            ledger.commit(r, d1).unwrap();
        }

        let ledger = SqliteLedger::open(&path, Digest::placeholder()).unwrap();
        let r = ledger.reserve(&entity()).unwrap();
        assert_eq!(r.counter(), 2);
        assert_eq!(r.previous_digest(), &d1);
        assert_eq!(ledger.entities().unwrap(), vec![entity()]);
    }

    #[test]
    fn test_two_handles_conflict_on_same_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let a = SqliteLedger::open(&path, Digest::placeholder()).unwrap();
        let b = SqliteLedger::open(&path, Digest::placeholder()).unwrap();

        // Separate handles have separate lock tables, as separate processes would.
        let ra = a.reserve(&entity()).unwrap();
        let rb = b.reserve(&entity()).unwrap();
        assert_eq!(ra.counter(), 1);
        assert_eq!(rb.counter(), 1);

        a.commit(ra, Digest::of(b"a")).unwrap();
        let err = b.commit(rb, Digest::of(b"b")).unwrap_err();
        assert!(matches!(err, LedgerError::Conflict { expected: 0, found: 1, .. }));

        // A fresh reservation sees the winner's digest.
        let rb = b.reserve(&entity()).unwrap();
        assert_eq!(rb.counter(), 2);
        assert_eq!(rb.previous_digest(), &Digest::of(b"a"));
        b.commit(rb, Digest::of(b"b")).unwrap();
        assert_eq!(a.history(&entity()).unwrap().len(), 2);
    }

    #[test]
    fn test_stale_update_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let a = SqliteLedger::open(&path, Digest::placeholder()).unwrap();
        let b = SqliteLedger::open(&path, Digest::placeholder()).unwrap();

        let r = a.reserve(&entity()).unwrap();
        a.commit(r, Digest::of(b"1")).unwrap();

        let ra = a.reserve(&entity()).unwrap();
        let rb = b.reserve(&entity()).unwrap();
        b.commit(rb, Digest::of(b"2b")).unwrap();

        let err = a.commit(ra, Digest::of(b"2a")).unwrap_err();
        assert!(matches!(err, LedgerError::Conflict { expected: 1, found: 2, .. }));
        assert_eq!(a.current(&entity()).unwrap().unwrap().last_digest, Digest::of(b"2b"));
    }

    #[test]
    fn test_custom_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let placeholder = Digest::from_bytes([7; 32]);
        let ledger = SqliteLedger::open(dir.path().join("l.db"), placeholder).unwrap();
        assert_eq!(ledger.placeholder(), placeholder);
        assert_eq!(ledger.reserve(&entity()).unwrap().previous_digest(), &placeholder);
    }
}
