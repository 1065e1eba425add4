//! Ready-made processors for state and ledger pipelines.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use ingest_io::LedgerTransaction;
use ingest_pipeline::{NodeContext, PipelineResult, Processor, ReadCloser, Store, WriteCloser};
use ingest_types::{LedgerEntryChange, LedgerEntryType};
use tracing::info;

/// Forwards only state entries of the given types.
#[derive(Clone, Debug)]
pub struct EntryTypeFilter {
    types: HashSet<LedgerEntryType>,
}

impl EntryTypeFilter {
    pub fn new(types: impl IntoIterator<Item = LedgerEntryType>) -> Self {
        Self {
            types: types.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Processor<LedgerEntryChange> for EntryTypeFilter {
    fn name(&self) -> &str {
        "EntryTypeFilter"
    }

    async fn process(
        &self,
        _ctx: &NodeContext,
        _store: &Store,
        reader: &mut dyn ReadCloser<LedgerEntryChange>,
        writer: &mut dyn WriteCloser<LedgerEntryChange>,
    ) -> PipelineResult<()> {
        while let Some(change) = reader.read().await? {
            if self.types.contains(&change.entry_type()) {
                writer.write(change).await?;
            }
        }
        Ok(())
    }
}

/// Drops failed transactions.
#[derive(Clone, Copy, Debug, Default)]
pub struct SuccessfulTransactionFilter;

#[async_trait]
impl Processor<LedgerTransaction> for SuccessfulTransactionFilter {
    fn name(&self) -> &str {
        "SuccessfulTransactionFilter"
    }

    async fn process(
        &self,
        _ctx: &NodeContext,
        _store: &Store,
        reader: &mut dyn ReadCloser<LedgerTransaction>,
        writer: &mut dyn WriteCloser<LedgerTransaction>,
    ) -> PipelineResult<()> {
        while let Some(transaction) = reader.read().await? {
            if transaction.successful() {
                writer.write(transaction).await?;
            }
        }
        Ok(())
    }
}

/// Passes records through and logs a running count every `interval`.
#[derive(Debug)]
pub struct StatusLogger {
    name: String,
    interval: u64,
    total: AtomicU64,
}

impl StatusLogger {
    pub fn new(name: impl Into<String>, interval: u64) -> Self {
        Self {
            name: name.into(),
            interval: interval.max(1),
            total: AtomicU64::new(0),
        }
    }

    /// Records seen in the current or last run.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<T: Send + 'static> Processor<T> for StatusLogger {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(
        &self,
        _ctx: &NodeContext,
        _store: &Store,
        reader: &mut dyn ReadCloser<T>,
        writer: &mut dyn WriteCloser<T>,
    ) -> PipelineResult<()> {
        while let Some(item) = reader.read().await? {
            let total = self.total.fetch_add(1, Ordering::Relaxed) + 1;
            if total % self.interval == 0 {
                info!(processor = %self.name, records = total, "status");
            }
            writer.write(item).await?;
        }
        info!(processor = %self.name, records = self.total(), "done");
        Ok(())
    }

    fn reset(&self) {
        self.total.store(0, Ordering::Relaxed);
    }
}
