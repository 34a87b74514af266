use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::StateResult;

/// Key/value backend for persisted store caches.
///
/// A store with `persist_cache` set writes its serialized data and an
/// expiry timestamp through this interface and reads them back on
/// construction. Calls are synchronous, best-effort side effects: the
/// engine logs failures and keeps going, so implementations should not
/// need to retry internally.
pub trait PersistentKv: Send + Sync {
    /// Read a stored value, or `None` if the key is absent.
    fn get(&self, key: &str) -> Option<String>;

    /// Store a value under a key, replacing any existing entry.
    fn set(&self, key: &str, value: &str) -> StateResult<()>;

    /// Remove a key. Removing an absent key is a no-op.
    fn remove(&self, key: &str);
}

/// In-memory [`PersistentKv`] backed by a `HashMap`.
///
/// Useful for tests and for hosts without durable storage; contents do
/// not survive the process.
#[derive(Default)]
pub struct MemoryKv {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistentKv for MemoryKv {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> StateResult<()> {
        self.entries
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries.write().unwrap().remove(key);
    }
}
