//! # Invoice Stamp Ledger
//!
//! Per-entity chain state for invoice stamping: for each issuing entity, the
//! counter and digest of its most recently stamped document.
//!
//! ## Key Types
//!
//! - [`ChainLedger`] - The trait for two-phase reserve/commit access
//! - [`Reservation`] - A claimed position holding the entity's exclusive lease
//! - [`MemoryLedger`] - In-memory ledger
//! - [`SqliteLedger`] - SQLite-based persistent ledger
//!
//! ## Usage
//!
//! ```rust,no_run
//! use invoice_stamp_core::{Digest, EntityId};
//! use invoice_stamp_ledger::{ChainLedger, SqliteLedger};
//!
//! let ledger = SqliteLedger::open("ledger.db", Digest::placeholder()).unwrap();
//! let entity = EntityId::from("300000000000003");
//!
//! let reservation = ledger.reserve(&entity).unwrap();
//! // ... stamp the document using reservation.counter() and
//! // reservation.previous_digest() ...
//! let record = ledger.commit(reservation, Digest::of(b"canonical bytes")).unwrap();
//! assert_eq!(record.counter, 1);
//! ```
//!
//! ## Design Notes
//!
//! - **Abort by drop**: a reservation that is never committed leaves no trace
//! - **Conflict detection**: commits compare the stored counter with the
//!   reservation's basis and refuse to overwrite a newer record

pub mod error;
pub mod locks;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{LedgerError, Result};
pub use locks::{EntityLease, EntityLocks};
pub use memory::MemoryLedger;
pub use sqlite::SqliteLedger;
pub use traits::{ChainLedger, Reservation};
