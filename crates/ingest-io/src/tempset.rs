use std::collections::HashSet;
use std::sync::RwLock;

use crate::error::{IoError, IoResult};

/// Scratch set of keys used to de-duplicate entries while streaming a
/// checkpoint's state.
pub trait TempSet: Send + Sync {
    /// Prepare an empty set. Calling `open` again discards previous keys.
    fn open(&self) -> IoResult<()>;

    fn add(&self, key: &str) -> IoResult<()>;

    fn exist(&self, key: &str) -> IoResult<bool>;

    fn close(&self) -> IoResult<()>;
}

/// In-memory [`TempSet`]; the default when no other set is configured.
#[derive(Default)]
pub struct MemoryTempSet {
    keys: RwLock<Option<HashSet<String>>>,
}

impl MemoryTempSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held, zero when closed.
    pub fn len(&self) -> usize {
        self.keys
            .read()
            .expect("temp set lock poisoned")
            .as_ref()
            .map_or(0, HashSet::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TempSet for MemoryTempSet {
    fn open(&self) -> IoResult<()> {
        *self.keys.write().expect("temp set lock poisoned") = Some(HashSet::new());
        Ok(())
    }

    fn add(&self, key: &str) -> IoResult<()> {
        let mut keys = self.keys.write().expect("temp set lock poisoned");
        let set = keys
            .as_mut()
            .ok_or_else(|| IoError::TempSet("set is not open".into()))?;
        set.insert(key.to_owned());
        Ok(())
    }

    fn exist(&self, key: &str) -> IoResult<bool> {
        let keys = self.keys.read().expect("temp set lock poisoned");
        let set = keys
            .as_ref()
            .ok_or_else(|| IoError::TempSet("set is not open".into()))?;
        Ok(set.contains(key))
    }

    fn close(&self) -> IoResult<()> {
        *self.keys.write().expect("temp set lock poisoned") = None;
        Ok(())
    }
}
