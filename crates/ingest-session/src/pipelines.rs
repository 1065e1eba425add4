use std::sync::Arc;

use async_trait::async_trait;
use ingest_io::{LedgerReader, LedgerTransaction, StateReader};
use ingest_pipeline::{Pipeline, PipelineError, PipelineResult, ReadCloser};
use ingest_types::LedgerEntryChange;

use crate::reporter::{LedgerReporter, StateReporter};

/// Pipeline fed with the state entries of a checkpoint.
pub type StatePipeline = Pipeline<LedgerEntryChange>;

/// Pipeline fed with the transactions of one ledger per run.
pub type LedgerPipeline = Pipeline<LedgerTransaction>;

/// Feeds a [`StateReader`] into a [`StatePipeline`].
pub struct StateSource {
    reader: Box<dyn StateReader>,
    reporter: Option<Arc<dyn StateReporter>>,
}

impl StateSource {
    pub fn new(reader: Box<dyn StateReader>) -> Self {
        Self {
            reader,
            reporter: None,
        }
    }

    pub fn with_reporter(mut self, reporter: Option<Arc<dyn StateReporter>>) -> Self {
        self.reporter = reporter;
        self
    }
}

#[async_trait]
impl ReadCloser<LedgerEntryChange> for StateSource {
    async fn read(&mut self) -> PipelineResult<Option<LedgerEntryChange>> {
        let entry = self.reader.read().await.map_err(PipelineError::read)?;
        if let (Some(_), Some(reporter)) = (&entry, &self.reporter) {
            reporter.on_state_entry();
        }
        Ok(entry)
    }

    fn close(&mut self) -> PipelineResult<()> {
        self.reader.close().map_err(PipelineError::read)
    }
}

/// Feeds a [`LedgerReader`] into a [`LedgerPipeline`].
pub struct LedgerSource {
    reader: Box<dyn LedgerReader>,
    reporter: Option<Arc<dyn LedgerReporter>>,
}

impl LedgerSource {
    pub fn new(reader: Box<dyn LedgerReader>) -> Self {
        Self {
            reader,
            reporter: None,
        }
    }

    pub fn with_reporter(mut self, reporter: Option<Arc<dyn LedgerReporter>>) -> Self {
        self.reporter = reporter;
        self
    }
}

#[async_trait]
impl ReadCloser<LedgerTransaction> for LedgerSource {
    async fn read(&mut self) -> PipelineResult<Option<LedgerTransaction>> {
        let transaction = self.reader.read().await.map_err(PipelineError::read)?;
        if let (Some(transaction), Some(reporter)) = (&transaction, &self.reporter) {
            reporter.on_ledger_transaction(transaction);
        }
        Ok(transaction)
    }

    fn close(&mut self) -> PipelineResult<()> {
        self.reader.close().map_err(PipelineError::read)
    }
}
