//! Contracts of the two ledger sources an ingestion session consumes.

use std::sync::Arc;

use async_trait::async_trait;
use ingest_types::Hash;

use crate::error::IoResult;
use crate::reader::{LedgerReader, StateReader};
use crate::tempset::TempSet;

/// Cold, checkpointed archive of ledger state.
#[async_trait]
pub trait HistoryArchive: Send + Sync {
    /// Sequence of the most recent checkpoint published by the archive.
    async fn latest_checkpoint_sequence(&self) -> IoResult<u32>;

    /// Bucket list hash the archive reports for a checkpoint.
    async fn bucket_list_hash(&self, sequence: u32) -> IoResult<Hash>;

    /// Open a stream over the state at checkpoint `sequence`.
    ///
    /// `temp_set` is used to emit each ledger key at most once.
    /// `max_retries` bounds how many times a failed download is retried.
    async fn open_state_stream(
        &self,
        sequence: u32,
        temp_set: Arc<dyn TempSet>,
        max_retries: u32,
    ) -> IoResult<Box<dyn StateReader>>;
}

/// Live backend producing closed ledgers as the network advances.
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    /// Latest ledger sequence the backend has closed.
    async fn latest_ledger_sequence(&self) -> IoResult<u32>;

    /// Open ledger `sequence`. Returns [`crate::IoError::NotFound`] if the
    /// backend does not have it (yet).
    async fn get_ledger(&self, sequence: u32) -> IoResult<Box<dyn LedgerReader>>;

    /// Bucket list hash recorded in the header of ledger `sequence`.
    async fn ledger_header_hash(&self, sequence: u32) -> IoResult<Hash> {
        let mut reader = self.get_ledger(sequence).await?;
        let hash = reader.header().header.bucket_list_hash;
        reader.ignore_upgrade_changes();
        reader.close()?;
        Ok(hash)
    }
}
