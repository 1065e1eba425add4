use async_trait::async_trait;
use ingest_types::{LedgerEntryChange, LedgerHeaderHistoryEntry};

use crate::change::Change;
use crate::error::IoResult;
use crate::transaction::LedgerTransaction;

/// Forward-only stream of the ledger entries that make up the state at a
/// checkpoint.
///
/// Every record is a [`LedgerEntryChange::State`]. `read` returns `Ok(None)`
/// once the stream is exhausted. A reader cannot be restarted.
#[async_trait]
pub trait StateReader: Send {
    /// Checkpoint sequence this reader streams.
    fn sequence(&self) -> u32;

    async fn read(&mut self) -> IoResult<Option<LedgerEntryChange>>;

    /// Release the underlying resources. Idempotent.
    fn close(&mut self) -> IoResult<()>;
}

/// Forward-only stream of the transactions of one ledger.
///
/// Protocol upgrades applied at the end of the ledger produce changes that
/// do not belong to any transaction. They are exposed separately through
/// [`LedgerReader::read_upgrade_change`]; a consumer that does not care
/// about them must call [`LedgerReader::ignore_upgrade_changes`] before
/// closing, otherwise `close` reports [`crate::IoError::UpgradeChangesNotRead`].
#[async_trait]
pub trait LedgerReader: Send {
    fn sequence(&self) -> u32;

    fn header(&self) -> &LedgerHeaderHistoryEntry;

    async fn read(&mut self) -> IoResult<Option<LedgerTransaction>>;

    async fn read_upgrade_change(&mut self) -> IoResult<Option<Change>>;

    fn ignore_upgrade_changes(&mut self);

    fn close(&mut self) -> IoResult<()>;
}
