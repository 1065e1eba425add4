use std::sync::Mutex;

use async_trait::async_trait;
use ingest_io::{IoError, IoResult};

/// Tells the ledger backend how far this consumer has replicated, so the
/// backend can prune older ledgers.
#[async_trait]
pub trait CursorClient: Send + Sync {
    async fn set_cursor(&self, name: &str, sequence: u32) -> IoResult<()>;
}

/// Records every cursor update in memory.
#[derive(Debug, Default)]
pub struct MemoryCursorClient {
    updates: Mutex<Vec<(String, u32)>>,
    fail_at: Mutex<Option<u32>>,
}

impl MemoryCursorClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the update to `sequence` fail with a backend error.
    pub fn fail_at(&self, sequence: u32) {
        *self.fail_at.lock().expect("cursor lock poisoned") = Some(sequence);
    }

    /// `(name, sequence)` of every successful update, oldest first.
    pub fn updates(&self) -> Vec<(String, u32)> {
        self.updates.lock().expect("cursor lock poisoned").clone()
    }

    pub fn last(&self) -> Option<u32> {
        self.updates
            .lock()
            .expect("cursor lock poisoned")
            .last()
            .map(|(_, sequence)| *sequence)
    }
}

#[async_trait]
impl CursorClient for MemoryCursorClient {
    async fn set_cursor(&self, name: &str, sequence: u32) -> IoResult<()> {
        if *self.fail_at.lock().expect("cursor lock poisoned") == Some(sequence) {
            return Err(IoError::Backend(format!("cursor {name} rejected ledger {sequence}")));
        }
        self.updates
            .lock()
            .expect("cursor lock poisoned")
            .push((name.to_owned(), sequence));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_updates_in_order() {
        let client = MemoryCursorClient::new();
        client.set_cursor("C", 1).await.unwrap();
        client.set_cursor("C", 2).await.unwrap();
        assert_eq!(client.updates(), vec![("C".into(), 1), ("C".into(), 2)]);
        assert_eq!(client.last(), Some(2));
    }

    #[tokio::test]
    async fn injected_failure() {
        let client = MemoryCursorClient::new();
        client.fail_at(5);
        assert!(client.set_cursor("C", 5).await.is_err());
        assert!(client.updates().is_empty());
    }
}
