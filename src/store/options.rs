use std::sync::Arc;

use crate::persist::PersistentKv;
use crate::value::Value;

/// Configuration for building a store.
///
/// # Examples
///
/// ```
/// use canister::StoreOptions;
///
/// let options = StoreOptions::new("codes").cachable(true).cache_timeout_seconds(30);
/// ```
#[derive(Clone)]
pub struct StoreOptions {
    pub(crate) name: String,
    pub(crate) is_cachable: bool,
    pub(crate) cache_timeout_seconds: i64,
    pub(crate) persist_cache: bool,
    pub(crate) cache_prefix: String,
    pub(crate) kv: Option<Arc<dyn PersistentKv>>,
}

impl StoreOptions {
    /// Options for a non-cachable store with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_cachable: false,
            cache_timeout_seconds: -1,
            persist_cache: false,
            cache_prefix: String::new(),
            kv: None,
        }
    }

    /// Allow the store to skip repeat load requests while its cache is
    /// valid. Defaults to false.
    pub fn cachable(mut self, cachable: bool) -> Self {
        self.is_cachable = cachable;
        self
    }

    /// Lifetime of the cache in seconds. Zero or less never invalidates
    /// once cached. Defaults to -1.
    pub fn cache_timeout_seconds(mut self, seconds: i64) -> Self {
        self.cache_timeout_seconds = seconds;
        self
    }

    /// Persist the cache through the given key/value backend so a later
    /// store with the same name starts from the cached data.
    pub fn persist_cache(mut self, kv: Arc<dyn PersistentKv>) -> Self {
        self.persist_cache = true;
        self.kv = Some(kv);
        self
    }

    /// Prefix applied to persisted cache keys.
    pub fn cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_prefix = prefix.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One step of a sequential [`chain`](crate::Store::chain) execution.
#[derive(Clone, Debug)]
pub struct ChainStep {
    pub action: String,
    pub params: Vec<Value>,
    pub forward_result: bool,
}

impl ChainStep {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            params: Vec::new(),
            forward_result: false,
        }
    }

    pub fn params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }

    /// Forward this step's result as the first parameter of the next step.
    /// Forwarding is one hop only.
    pub fn forward_result(mut self) -> Self {
        self.forward_result = true;
        self
    }
}

/// Before/after snapshots handed to listeners once a change is confirmed
/// dirty.
///
/// Both snapshots are shallow clones with injected bookkeeping keys
/// stripped; they never share mutable state with the live store data.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeState {
    pub previous_state: Value,
    pub new_state: Value,
}
