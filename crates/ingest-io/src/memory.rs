//! In-memory readers and adapters for tests, local demos, and embedding.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use ingest_types::{Hash, LedgerEntry, LedgerEntryChange, LedgerHeader, LedgerHeaderHistoryEntry};

use crate::adapters::{HistoryArchive, LedgerBackend};
use crate::bucket::{BucketEntry, BucketStateReader};
use crate::change::Change;
use crate::error::{IoError, IoResult};
use crate::reader::{LedgerReader, StateReader};
use crate::tempset::TempSet;
use crate::transaction::LedgerTransaction;

/// A [`StateReader`] over a fixed list of entries.
pub struct MemoryStateReader {
    sequence: u32,
    entries: VecDeque<LedgerEntryChange>,
    closed: bool,
}

impl MemoryStateReader {
    pub fn new(sequence: u32, entries: Vec<LedgerEntry>) -> Self {
        Self {
            sequence,
            entries: entries.into_iter().map(LedgerEntryChange::State).collect(),
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl StateReader for MemoryStateReader {
    fn sequence(&self) -> u32 {
        self.sequence
    }

    async fn read(&mut self) -> IoResult<Option<LedgerEntryChange>> {
        if self.closed {
            return Err(IoError::Closed);
        }
        Ok(self.entries.pop_front())
    }

    fn close(&mut self) -> IoResult<()> {
        self.closed = true;
        Ok(())
    }
}

/// Everything a backend knows about one closed ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerCloseData {
    pub header: LedgerHeaderHistoryEntry,
    pub transactions: Vec<LedgerTransaction>,
    pub upgrade_changes: Vec<Change>,
}

impl LedgerCloseData {
    /// A ledger with the given header and no transactions or upgrades.
    pub fn new(header: LedgerHeader) -> Self {
        Self {
            header: header.into(),
            transactions: Vec::new(),
            upgrade_changes: Vec::new(),
        }
    }

    pub fn with_transactions(mut self, transactions: Vec<LedgerTransaction>) -> Self {
        self.transactions = transactions;
        self
    }

    pub fn with_upgrade_changes(mut self, changes: Vec<Change>) -> Self {
        self.upgrade_changes = changes;
        self
    }

    pub fn sequence(&self) -> u32 {
        self.header.header.ledger_seq
    }
}

/// A [`LedgerReader`] over a [`LedgerCloseData`].
pub struct MemoryLedgerReader {
    data: LedgerCloseData,
    next_transaction: usize,
    next_upgrade: usize,
    ignore_upgrades: bool,
    closed: bool,
}

impl MemoryLedgerReader {
    pub fn new(data: LedgerCloseData) -> Self {
        Self {
            data,
            next_transaction: 0,
            next_upgrade: 0,
            ignore_upgrades: false,
            closed: false,
        }
    }
}

#[async_trait]
impl LedgerReader for MemoryLedgerReader {
    fn sequence(&self) -> u32 {
        self.data.sequence()
    }

    fn header(&self) -> &LedgerHeaderHistoryEntry {
        &self.data.header
    }

    async fn read(&mut self) -> IoResult<Option<LedgerTransaction>> {
        if self.closed {
            return Err(IoError::Closed);
        }
        let transaction = self.data.transactions.get(self.next_transaction).cloned();
        if transaction.is_some() {
            self.next_transaction += 1;
        }
        Ok(transaction)
    }

    async fn read_upgrade_change(&mut self) -> IoResult<Option<Change>> {
        if self.closed {
            return Err(IoError::Closed);
        }
        let change = self.data.upgrade_changes.get(self.next_upgrade).cloned();
        if change.is_some() {
            self.next_upgrade += 1;
        }
        Ok(change)
    }

    fn ignore_upgrade_changes(&mut self) {
        self.ignore_upgrades = true;
    }

    fn close(&mut self) -> IoResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if !self.ignore_upgrades && self.next_upgrade < self.data.upgrade_changes.len() {
            return Err(IoError::UpgradeChangesNotRead);
        }
        Ok(())
    }
}

/// A checkpoint held by a [`MemoryArchive`].
#[derive(Clone, Debug, Default)]
pub struct MemoryCheckpoint {
    pub bucket_list_hash: Hash,
    /// Buckets, newest first.
    pub buckets: Vec<Vec<BucketEntry>>,
}

/// In-memory [`HistoryArchive`].
#[derive(Default)]
pub struct MemoryArchive {
    checkpoints: RwLock<BTreeMap<u32, MemoryCheckpoint>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a checkpoint. The highest published sequence is the latest.
    pub fn add_checkpoint(&self, sequence: u32, checkpoint: MemoryCheckpoint) {
        self.checkpoints
            .write()
            .expect("archive lock poisoned")
            .insert(sequence, checkpoint);
    }

    fn checkpoint(&self, sequence: u32) -> IoResult<MemoryCheckpoint> {
        self.checkpoints
            .read()
            .expect("archive lock poisoned")
            .get(&sequence)
            .cloned()
            .ok_or(IoError::NotFound)
    }
}

#[async_trait]
impl HistoryArchive for MemoryArchive {
    async fn latest_checkpoint_sequence(&self) -> IoResult<u32> {
        self.checkpoints
            .read()
            .expect("archive lock poisoned")
            .keys()
            .next_back()
            .copied()
            .ok_or_else(|| IoError::Archive("archive has no checkpoints".into()))
    }

    async fn bucket_list_hash(&self, sequence: u32) -> IoResult<Hash> {
        Ok(self.checkpoint(sequence)?.bucket_list_hash)
    }

    async fn open_state_stream(
        &self,
        sequence: u32,
        temp_set: Arc<dyn TempSet>,
        _max_retries: u32,
    ) -> IoResult<Box<dyn StateReader>> {
        let checkpoint = self.checkpoint(sequence)?;
        let reader = BucketStateReader::new(sequence, checkpoint.buckets, temp_set)?;
        Ok(Box::new(reader))
    }
}

/// In-memory [`LedgerBackend`]. Ledgers can be added while a session reads
/// from it, which makes it suitable for driving the replication loop in
/// tests.
#[derive(Default)]
pub struct MemoryLedgerBackend {
    ledgers: RwLock<BTreeMap<u32, LedgerCloseData>>,
    latest_override: RwLock<Option<u32>>,
}

impl MemoryLedgerBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_ledger(&self, data: LedgerCloseData) {
        self.ledgers
            .write()
            .expect("backend lock poisoned")
            .insert(data.sequence(), data);
    }

    /// Report `sequence` as the latest ledger regardless of stored ledgers.
    pub fn set_latest_sequence(&self, sequence: u32) {
        *self.latest_override.write().expect("backend lock poisoned") = Some(sequence);
    }

    pub fn ledger_count(&self) -> usize {
        self.ledgers.read().expect("backend lock poisoned").len()
    }
}

#[async_trait]
impl LedgerBackend for MemoryLedgerBackend {
    async fn latest_ledger_sequence(&self) -> IoResult<u32> {
        if let Some(sequence) = *self.latest_override.read().expect("backend lock poisoned") {
            return Ok(sequence);
        }
        Ok(self
            .ledgers
            .read()
            .expect("backend lock poisoned")
            .keys()
            .next_back()
            .copied()
            .unwrap_or(0))
    }

    async fn get_ledger(&self, sequence: u32) -> IoResult<Box<dyn LedgerReader>> {
        let data = self
            .ledgers
            .read()
            .expect("backend lock poisoned")
            .get(&sequence)
            .cloned()
            .ok_or(IoError::NotFound)?;
        Ok(Box::new(MemoryLedgerReader::new(data)))
    }
}
