//! Observer hooks invoked around the state bootstrap and each ledger.
//!
//! Reporters only observe. Nothing they do changes how a session proceeds.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use ingest_io::LedgerTransaction;
use ingest_pipeline::PipelineError;
use tracing::{info, warn};

/// Observes the state pipeline run of a checkpoint.
pub trait StateReporter: Send + Sync {
    fn on_start_state(&self, sequence: u32);

    /// Called for every state entry read from the archive.
    fn on_state_entry(&self) {}

    /// `err` is the pipeline failure, if any. `shutdown` is set when the run
    /// was stopped by a session shutdown.
    fn on_end_state(&self, err: Option<&PipelineError>, shutdown: bool);
}

/// Observes the ledger pipeline run of each ledger.
pub trait LedgerReporter: Send + Sync {
    fn on_new_ledger(&self, sequence: u32);

    /// Called for every transaction read from the backend.
    fn on_ledger_transaction(&self, _transaction: &LedgerTransaction) {}

    fn on_end_ledger(&self, err: Option<&PipelineError>, shutdown: bool);
}

/// Logs state bootstrap progress every `interval` entries.
#[derive(Debug)]
pub struct LoggingStateReporter {
    interval: u64,
    entries: AtomicU64,
    current: Mutex<Option<(u32, Instant)>>,
}

impl LoggingStateReporter {
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            entries: AtomicU64::new(0),
            current: Mutex::new(None),
        }
    }

    /// Entries seen since the last `on_start_state`.
    pub fn entries(&self) -> u64 {
        self.entries.load(Ordering::Relaxed)
    }
}

impl Default for LoggingStateReporter {
    fn default() -> Self {
        Self::new(100_000)
    }
}

impl StateReporter for LoggingStateReporter {
    fn on_start_state(&self, sequence: u32) {
        self.entries.store(0, Ordering::Relaxed);
        *self.current.lock().expect("reporter lock poisoned") = Some((sequence, Instant::now()));
        info!(ledger = sequence, "processing state");
    }

    fn on_state_entry(&self) {
        let entries = self.entries.fetch_add(1, Ordering::Relaxed) + 1;
        if entries % self.interval == 0 {
            info!(entries, "processing state: read entries");
        }
    }

    fn on_end_state(&self, err: Option<&PipelineError>, shutdown: bool) {
        let current = self.current.lock().expect("reporter lock poisoned").take();
        let Some((sequence, started)) = current else {
            return;
        };
        let entries = self.entries();
        let elapsed = started.elapsed();
        match err {
            Some(err) => warn!(ledger = sequence, entries, ?elapsed, error = %err, "state processing failed"),
            None if shutdown => info!(ledger = sequence, entries, ?elapsed, "state processing stopped by shutdown"),
            None => info!(ledger = sequence, entries, ?elapsed, "finished processing state"),
        }
    }
}

/// Logs one line per ledger with its transaction count and duration.
#[derive(Debug, Default)]
pub struct LoggingLedgerReporter {
    transactions: AtomicU64,
    current: Mutex<Option<(u32, Instant)>>,
}

impl LoggingLedgerReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transactions seen since the last `on_new_ledger`.
    pub fn transactions(&self) -> u64 {
        self.transactions.load(Ordering::Relaxed)
    }
}

impl LedgerReporter for LoggingLedgerReporter {
    fn on_new_ledger(&self, sequence: u32) {
        self.transactions.store(0, Ordering::Relaxed);
        *self.current.lock().expect("reporter lock poisoned") = Some((sequence, Instant::now()));
        info!(ledger = sequence, "processing ledger");
    }

    fn on_ledger_transaction(&self, _transaction: &LedgerTransaction) {
        self.transactions.fetch_add(1, Ordering::Relaxed);
    }

    fn on_end_ledger(&self, err: Option<&PipelineError>, shutdown: bool) {
        let current = self.current.lock().expect("reporter lock poisoned").take();
        let Some((sequence, started)) = current else {
            return;
        };
        let transactions = self.transactions();
        let elapsed = started.elapsed();
        match err {
            Some(err) => warn!(ledger = sequence, transactions, ?elapsed, error = %err, "ledger processing failed"),
            None if shutdown => info!(ledger = sequence, transactions, ?elapsed, "ledger processing stopped by shutdown"),
            None => info!(ledger = sequence, transactions, ?elapsed, "processed ledger"),
        }
    }
}
