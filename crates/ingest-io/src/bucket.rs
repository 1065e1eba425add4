//! Checkpoint state streaming over bucket contents.
//!
//! A checkpoint's state is stored as a list of buckets, newest first. The
//! same key can appear in several buckets; only its newest occurrence
//! counts, and a dead entry hides every older live entry for its key.

use std::sync::Arc;

use async_trait::async_trait;
use ingest_types::{LedgerEntry, LedgerEntryChange, LedgerKey};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{IoError, IoResult};
use crate::reader::StateReader;
use crate::tempset::TempSet;

/// One record of a bucket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketEntry {
    Live(LedgerEntry),
    Dead(LedgerKey),
}

impl BucketEntry {
    pub fn key(&self) -> LedgerKey {
        match self {
            Self::Live(entry) => entry.key(),
            Self::Dead(key) => key.clone(),
        }
    }
}

/// A [`StateReader`] that walks buckets newest first and emits every live
/// key once.
pub struct BucketStateReader {
    sequence: u32,
    entries: std::vec::IntoIter<BucketEntry>,
    temp_set: Arc<dyn TempSet>,
    skipped: u64,
    closed: bool,
}

impl BucketStateReader {
    /// Open a reader over `buckets` (newest first), using `temp_set` to
    /// remember which keys were already seen.
    pub fn new(
        sequence: u32,
        buckets: Vec<Vec<BucketEntry>>,
        temp_set: Arc<dyn TempSet>,
    ) -> IoResult<Self> {
        temp_set.open()?;
        let entries: Vec<BucketEntry> = buckets.into_iter().flatten().collect();
        Ok(Self {
            sequence,
            entries: entries.into_iter(),
            temp_set,
            skipped: 0,
            closed: false,
        })
    }

    /// Number of shadowed or dead records skipped so far.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

#[async_trait]
impl StateReader for BucketStateReader {
    fn sequence(&self) -> u32 {
        self.sequence
    }

    async fn read(&mut self) -> IoResult<Option<LedgerEntryChange>> {
        if self.closed {
            return Err(IoError::Closed);
        }

        for entry in self.entries.by_ref() {
            let key = entry.key().to_string();
            if self.temp_set.exist(&key)? {
                self.skipped += 1;
                continue;
            }
            self.temp_set.add(&key)?;

            match entry {
                BucketEntry::Live(entry) => return Ok(Some(LedgerEntryChange::State(entry))),
                BucketEntry::Dead(_) => self.skipped += 1,
            }
        }

        Ok(None)
    }

    fn close(&mut self) -> IoResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        debug!(sequence = self.sequence, skipped = self.skipped, "state stream closed");
        self.temp_set.close()
    }
}
