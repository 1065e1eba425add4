use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Scratch key-value space shared by every node of one pipeline run.
///
/// A fresh store is created for each run and handed to the pre-processing
/// hooks first, then to every processor. Each `get`/`put` is atomic, but
/// nodes run concurrently: a read-modify-write sequence performed by
/// sibling nodes on the same key is not. Give each node its own keys, or
/// store a value with its own locking (e.g. `Mutex<_>`) and mutate through
/// it.
#[derive(Default)]
pub struct Store {
    values: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the value stored under `key`.
    pub fn put<V: Any + Send + Sync>(&self, key: impl Into<String>, value: V) {
        self.values
            .write()
            .expect("store lock poisoned")
            .insert(key.into(), Arc::new(value));
    }

    /// The value stored under `key`, if present and of type `V`.
    pub fn get<V: Any + Send + Sync>(&self, key: &str) -> Option<Arc<V>> {
        let value = self
            .values
            .read()
            .expect("store lock poisoned")
            .get(key)
            .cloned()?;
        value.downcast::<V>().ok()
    }

    pub fn remove(&self, key: &str) -> bool {
        self.values
            .write()
            .expect("store lock poisoned")
            .remove(key)
            .is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values
            .read()
            .expect("store lock poisoned")
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.read().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
