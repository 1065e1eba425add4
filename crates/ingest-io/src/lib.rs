//! Change model, record readers, and source adapters for the ingestion core.
//!
//! This crate provides:
//! - [`Change`] before/after diffs and the account predicates built on them
//! - [`LedgerTransaction`] with fee and operation change projections
//! - `StateReader` / `LedgerReader` record stream boundaries
//! - `HistoryArchive` / `LedgerBackend` adapter contracts
//! - [`TempSet`] de-duplication scratch space and a bucket-based state reader
//! - In-memory readers and adapters for tests and embedding

pub mod adapters;
pub mod bucket;
pub mod change;
pub mod error;
pub mod memory;
pub mod reader;
pub mod tempset;
pub mod transaction;

pub use adapters::{HistoryArchive, LedgerBackend};
pub use bucket::{BucketEntry, BucketStateReader};
pub use change::{pair_entry_changes, Change};
pub use error::{IoError, IoResult};
pub use memory::{
    LedgerCloseData, MemoryArchive, MemoryCheckpoint, MemoryLedgerBackend, MemoryLedgerReader,
    MemoryStateReader,
};
pub use reader::{LedgerReader, StateReader};
pub use tempset::{MemoryTempSet, TempSet};
pub use transaction::LedgerTransaction;
