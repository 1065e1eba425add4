//! Ledger data model for the ingestion core.
//!
//! Every other ingest crate depends on `ingest-types`. The types are plain,
//! owned snapshots: cloning an entry never aliases adapter-owned memory.
//!
//! # Key Types
//!
//! - [`Hash`]: 32-byte hash (bucket list, ledger header, transaction)
//! - [`LedgerEntry`]: Typed ledger entry snapshot
//! - [`LedgerEntryChange`]: One record of an entry-change log
//! - [`AccountEntry`]: Account state including thresholds and signers
//! - [`TransactionMeta`]: Per-operation entry-change logs of a transaction
//! - [`LedgerHeaderHistoryEntry`]: Ledger header with its hash

pub mod account;
pub mod entry;
pub mod error;
pub mod hash;
pub mod header;
pub mod transaction;

pub use account::{
    AccountEntry, AccountEntryExt, AccountId, Liabilities, Signer, SignerKey, Thresholds,
};
pub use entry::{
    Asset, DataEntry, LedgerEntry, LedgerEntryChange, LedgerEntryData, LedgerEntryType,
    LedgerKey, OfferEntry, Price, TrustLineEntry,
};
pub use error::TypeError;
pub use hash::Hash;
pub use header::{LedgerHeader, LedgerHeaderHistoryEntry};
pub use transaction::{OperationMeta, TransactionEnvelope, TransactionMeta, TransactionResultPair};
