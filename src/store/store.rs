use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};

use crate::action::{Action, ActionCallback, ActionType, Executable, ListenerCallback};
use crate::error::StateResult;
use crate::observer::strip_injected_keys;
use crate::persist::PersistentKv;
use crate::store::{ChainStep, ChangeState, StoreOptions};
use crate::value::{deep_equals, shallow_clone, shallow_equals, stringify, Value};

struct StoreInner {
    data: Value,
    previous: Value,
    actions: Vec<Action>,
    loaders: Vec<Action>,
    listeners: Vec<Action>,
    transformers: Vec<Action>,
    is_cachable: bool,
    cache_timeout_seconds: i64,
    persist_cache: bool,
    cache_prefix: String,
    kv: Option<Arc<dyn PersistentKv>>,
    // Set for observable stores: snapshots handed to listeners have
    // injected shadow keys stripped.
    strip_injected: bool,
    is_cached: bool,
    is_loading: bool,
    last_load_time: Option<DateTime<Utc>>,
    last_store_time: Option<DateTime<Utc>>,
}

/// A named container for one value plus its registered handlers.
///
/// `Store` is a cheap handle: clones share the same underlying state, so a
/// store can live in a registry and in any number of call sites at once.
///
/// # Examples
///
/// ```
/// use canister::{Store, StoreOptions, Value};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let store = Store::new(StoreOptions::new("codes"));
/// store.create_loader("load", |_args| async { Ok(Value::array([Value::from(1)])) });
/// store.execute("load", vec![]).await.unwrap();
/// assert_eq!(store.data().as_array().unwrap().len(), 1);
/// # });
/// ```
#[derive(Clone)]
pub struct Store {
    name: Arc<str>,
    inner: Arc<RwLock<StoreInner>>,
}

// Resets `is_loading` however execution ends, including error returns.
struct LoadingReset {
    inner: Arc<RwLock<StoreInner>>,
}

impl Drop for LoadingReset {
    fn drop(&mut self) {
        self.inner.write().unwrap().is_loading = false;
    }
}

impl Store {
    /// Create a store for holding data.
    ///
    /// When the options carry a persistence backend, a previously cached
    /// value is restored and, if its expiry is still in the future, the
    /// store starts out cached.
    pub fn new(options: StoreOptions) -> Self {
        let mut inner = StoreInner {
            data: Value::Null,
            previous: Value::Null,
            actions: Vec::new(),
            loaders: Vec::new(),
            listeners: Vec::new(),
            transformers: Vec::new(),
            is_cachable: options.is_cachable,
            cache_timeout_seconds: options.cache_timeout_seconds,
            persist_cache: options.persist_cache,
            cache_prefix: options.cache_prefix,
            kv: options.kv,
            strip_injected: false,
            is_cached: false,
            is_loading: false,
            last_load_time: None,
            last_store_time: None,
        };

        if inner.persist_cache {
            restore_cache(&mut inner, &options.name);
        }

        Self {
            name: options.name.into(),
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_loading(&self) -> bool {
        self.inner.read().unwrap().is_loading
    }

    pub fn is_cached(&self) -> bool {
        self.inner.read().unwrap().is_cached
    }

    pub fn is_cachable(&self) -> bool {
        self.inner.read().unwrap().is_cachable
    }

    pub fn cache_prefix(&self) -> String {
        self.inner.read().unwrap().cache_prefix.clone()
    }

    pub fn cache_timeout_seconds(&self) -> i64 {
        self.inner.read().unwrap().cache_timeout_seconds
    }

    pub fn set_cache_timeout_seconds(&self, seconds: i64) {
        self.inner.write().unwrap().cache_timeout_seconds = seconds;
    }

    pub fn last_load_time(&self) -> Option<DateTime<Utc>> {
        self.inner.read().unwrap().last_load_time
    }

    pub fn last_store_time(&self) -> Option<DateTime<Utc>> {
        self.inner.read().unwrap().last_store_time
    }

    /// A clone of the current store data.
    pub fn data(&self) -> Value {
        self.inner.read().unwrap().data.clone()
    }

    /// Replace the store data.
    ///
    /// Captures the outgoing value as the previous snapshot, stamps the
    /// store time and notifies listeners if the change is dirty.
    pub fn set_data(&self, data: impl Into<Value>) {
        {
            let mut inner = self.inner.write().unwrap();
            inner.previous = inner.data.clone();
            inner.data = data.into();
            inner.last_store_time = Some(Utc::now());
        }
        self.execute_listeners();
    }

    /// Whether the current data differs from the last-accepted snapshot,
    /// compared by canonical string form.
    ///
    /// This is the dirty definition the listener pipeline uses everywhere.
    /// After a loader execution this is false until the data is mutated
    /// directly.
    pub fn is_dirty(&self) -> bool {
        let inner = self.inner.read().unwrap();
        !shallow_equals(&inner.data, &inner.previous)
    }

    /// Type-preserving variant of [`is_dirty`](Store::is_dirty): structural
    /// recursion instead of string comparison, so a `Map` is never clean
    /// against the object holding its serialized shape.
    pub fn is_dirty_deep(&self) -> bool {
        let inner = self.inner.read().unwrap();
        !deep_equals(&inner.data, &inner.previous)
    }

    /// Accept the current data as the new clean baseline without firing
    /// listeners.
    pub fn accept_dirty_data(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.previous = inner.data.clone();
    }

    /// True once the cache has been invalidated.
    ///
    /// Not cachable, never cached, or no stored data yet all count as
    /// stale. A timeout of zero or less never goes stale once cached.
    pub fn is_cache_stale(&self) -> bool {
        let inner = self.inner.read().unwrap();
        stale(&inner)
    }

    /// Create a listener, triggered with before/after snapshots whenever
    /// store data is confirmed dirty. Replaces any listener with the same
    /// name.
    pub fn create_listener<F>(&self, name: impl Into<String>, callback: F) -> bool
    where
        F: Fn(&ChangeState) + Send + Sync + 'static,
    {
        self.bind(Action::listener(name, callback))
    }

    /// Create an action, triggered manually through [`execute`](Store::execute).
    /// Replaces any action with the same name.
    pub fn create_action<F, Fut>(&self, name: impl Into<String>, callback: F) -> bool
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = StateResult<Value>> + Send + 'static,
    {
        self.bind(Action::new(name, ActionType::Action, callback))
    }

    /// Create an inline action: a capability closure invoked directly
    /// against the store's current data. Used by observable auto-wiring.
    pub fn create_inline_action<F>(&self, name: impl Into<String>, callback: F) -> bool
    where
        F: Fn(&mut Value, Vec<Value>) -> StateResult<Value> + Send + Sync + 'static,
    {
        self.bind(Action::inline(name, callback))
    }

    /// Create a loader. Loaders produce data: a successful execution
    /// replaces the store data and refreshes cache state. Replaces any
    /// loader with the same name.
    pub fn create_loader<F, Fut>(&self, name: impl Into<String>, callback: F) -> bool
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = StateResult<Value>> + Send + 'static,
    {
        self.bind(Action::new(name, ActionType::Loader, callback))
    }

    /// Create a transformer: a handler that reads the stored data without
    /// altering it, receiving it as an implicit first argument. Replaces
    /// any transformer with the same name.
    pub fn create_transformer<F, Fut>(&self, name: impl Into<String>, callback: F) -> bool
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = StateResult<Value>> + Send + 'static,
    {
        self.bind(Action::new(name, ActionType::Transformer, callback))
    }

    /// Removes the named loader. Returns true when it existed.
    pub fn remove_loader(&self, name: &str) -> bool {
        remove_handler(&mut self.inner.write().unwrap().loaders, name)
    }

    /// Removes the named action. Returns true when it existed.
    pub fn remove_action(&self, name: &str) -> bool {
        remove_handler(&mut self.inner.write().unwrap().actions, name)
    }

    /// Removes the named listener. Returns true when it existed.
    pub fn remove_listener(&self, name: &str) -> bool {
        remove_handler(&mut self.inner.write().unwrap().listeners, name)
    }

    /// Removes the named transformer. Returns true when it existed.
    pub fn remove_transformer(&self, name: &str) -> bool {
        remove_handler(&mut self.inner.write().unwrap().transformers, name)
    }

    /// Bind an already-built action to the registry matching its kind.
    /// Upsert semantics: an existing handler with the same name is removed
    /// first, atomically under the store lock.
    pub(crate) fn bind(&self, action: Action) -> bool {
        let mut inner = self.inner.write().unwrap();
        let handlers = match action.action_type() {
            ActionType::Listener => &mut inner.listeners,
            ActionType::Loader => &mut inner.loaders,
            ActionType::Transformer => &mut inner.transformers,
            ActionType::Action | ActionType::InlineAction => &mut inner.actions,
        };
        remove_handler(handlers, action.name());
        handlers.push(action);
        true
    }

    /// Execute an action, loader or transformer with the provided
    /// parameters.
    ///
    /// Dispatch resolves the name across actions, then loaders, then
    /// transformers; an unknown name resolves to a logging no-op rather
    /// than an error. A loader that is already in flight, or whose cache
    /// is still valid, is skipped and the current data returned unchanged.
    ///
    /// # Errors
    ///
    /// Callback failures are re-thrown as [`StateError::Callback`]
    /// (`is_loading` is reset first).
    ///
    /// [`StateError::Callback`]: crate::StateError::Callback
    pub async fn execute(&self, name: &str, args: Vec<Value>) -> StateResult<Value> {
        let mut args = args;
        let (action, genuine_load) = {
            let mut inner = self.inner.write().unwrap();
            let action = match find_handler(&inner, name) {
                Some(found) => found,
                None => Action::no_op(format!(
                    "action {name} not defined on store {}",
                    self.name
                )),
            };

            if action.action_type() == ActionType::Transformer {
                args.insert(0, inner.data.clone());
            }

            let mut genuine_load = false;
            if action.action_type() == ActionType::Loader {
                if inner.is_loading || !stale(&inner) {
                    let state = if inner.is_loading { "loading" } else { "cached" };
                    tracing::debug!(
                        store = %self.name,
                        loader = name,
                        "loader is currently {state}; load ignored"
                    );
                    return Ok(inner.data.clone());
                }
                inner.is_loading = true;
                genuine_load = true;
            }
            (action, genuine_load)
        };

        let _reset = genuine_load.then(|| LoadingReset {
            inner: Arc::clone(&self.inner),
        });

        let result = match action.callback() {
            ActionCallback::Inline(callback) => {
                let callback = Arc::clone(callback);
                let mut inner = self.inner.write().unwrap();
                callback(&mut inner.data, args)
            }
            _ => Executable::new(action.clone(), args).execute().await,
        }?;

        if genuine_load {
            {
                let mut inner = self.inner.write().unwrap();
                inner.last_load_time = Some(Utc::now());
                if inner.is_cachable {
                    inner.is_cached = true;
                    if inner.persist_cache {
                        persist_cache(&inner, &self.name, &result);
                    }
                }
            }
            self.set_data(result.clone());
            // The just-applied load should not itself look dirty on the
            // next check.
            self.accept_dirty_data();
        } else {
            // Actions and transformers may have left data dirty without
            // going through set_data.
            self.execute_listeners();
        }

        Ok(result)
    }

    /// Execute steps strictly sequentially, awaiting each before starting
    /// the next.
    ///
    /// A step whose predecessor carried [`forward_result`] receives that
    /// result prepended to its own parameters (one hop only). The returned
    /// results are index-aligned with the input steps.
    ///
    /// [`forward_result`]: ChainStep::forward_result
    pub async fn chain(&self, steps: Vec<ChainStep>) -> StateResult<Vec<Value>> {
        let mut results = Vec::with_capacity(steps.len());
        let mut last_result = Value::Null;
        let mut forward = false;
        for step in steps {
            let mut params = step.params;
            if forward {
                params.insert(0, last_result);
            }
            let result = self.execute(&step.action, params).await?;
            results.push(result.clone());
            last_result = result;
            forward = step.forward_result;
        }
        Ok(results)
    }

    /// Notify listeners if the data is dirty.
    ///
    /// Snapshots are shallow clones (shadow keys stripped for observable
    /// stores) and listeners run with the store lock released, so a
    /// listener may call back into the store.
    pub(crate) fn execute_listeners(&self) {
        let (listeners, change) = {
            let inner = self.inner.read().unwrap();
            if shallow_equals(&inner.data, &inner.previous) {
                return;
            }
            let mut previous_state = shallow_clone(&inner.previous);
            let mut new_state = shallow_clone(&inner.data);
            if inner.strip_injected {
                strip_injected_keys(&mut previous_state);
                strip_injected_keys(&mut new_state);
            }
            let listeners: Vec<ListenerCallback> = inner
                .listeners
                .iter()
                .filter_map(|action| match action.callback() {
                    ActionCallback::Listener(callback) => Some(Arc::clone(callback)),
                    _ => None,
                })
                .collect();
            (
                listeners,
                ChangeState {
                    previous_state,
                    new_state,
                },
            )
        };

        for listener in listeners {
            listener(&change);
        }
    }

    /// Flag this store as observable so listener snapshots are stripped of
    /// injected shadow keys.
    pub(crate) fn mark_observable(&self) {
        self.inner.write().unwrap().strip_injected = true;
    }

    /// Install an injected value graph without firing listeners; the
    /// previous snapshot starts out equal so the store is clean.
    pub(crate) fn install_data(&self, data: Value) {
        let mut inner = self.inner.write().unwrap();
        inner.previous = data.clone();
        inner.data = data;
    }

    /// Run a closure over the live data and previous snapshot under the
    /// store lock. Used by the observation engine's mutators.
    pub(crate) fn with_graph_mut<R>(&self, f: impl FnOnce(&mut Value, &mut Value) -> R) -> R {
        let mut inner = self.inner.write().unwrap();
        let inner = &mut *inner;
        f(&mut inner.data, &mut inner.previous)
    }

    /// Run a closure over the live data under the store lock.
    pub(crate) fn with_graph<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        let inner = self.inner.read().unwrap();
        f(&inner.data)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read().unwrap();
        f.debug_struct("Store")
            .field("name", &self.name)
            .field("is_cachable", &inner.is_cachable)
            .field("is_cached", &inner.is_cached)
            .field("is_loading", &inner.is_loading)
            .finish_non_exhaustive()
    }
}

/// First match across actions, then loaders, then transformers.
fn find_handler(inner: &StoreInner, name: &str) -> Option<Action> {
    inner
        .actions
        .iter()
        .chain(&inner.loaders)
        .chain(&inner.transformers)
        .find(|action| action.name() == name)
        .cloned()
}

fn remove_handler(handlers: &mut Vec<Action>, name: &str) -> bool {
    let before = handlers.len();
    handlers.retain(|action| action.name() != name);
    handlers.len() != before
}

fn stale(inner: &StoreInner) -> bool {
    if !inner.is_cachable || !inner.is_cached || inner.last_store_time.is_none() {
        // Nothing valid to serve yet.
        true
    } else if inner.cache_timeout_seconds <= 0 {
        // Cached forever.
        false
    } else {
        let expires = inner.last_store_time.unwrap_or_default()
            + Duration::seconds(inner.cache_timeout_seconds);
        Utc::now() > expires
    }
}

fn cache_key(prefix: &str, name: &str) -> String {
    format!("{prefix}state-cache-{name}")
}

/// Restore a persisted cache entry while constructing the store. Corrupt
/// entries are logged and purged; nothing here fails construction.
fn restore_cache(inner: &mut StoreInner, name: &str) {
    let Some(kv) = inner.kv.as_deref() else {
        return;
    };
    let key = cache_key(&inner.cache_prefix, name);
    let Some(text) = kv.get(&key) else {
        return;
    };

    match crate::value::parse(&text) {
        Ok(value) => {
            inner.data = value;
            let expiry = kv
                .get(&format!("{key}-timeout"))
                .and_then(|millis| millis.parse::<i64>().ok());
            if expiry.is_some_and(|millis| Utc::now().timestamp_millis() < millis) {
                inner.is_cached = true;
                inner.last_load_time = Some(Utc::now());
                inner.last_store_time = Some(Utc::now());
            }
        }
        Err(error) => {
            tracing::warn!(store = name, %error, "failed to load persisted state; purging entry");
            kv.remove(&key);
            kv.remove(&format!("{key}-timeout"));
        }
    }
}

/// Best-effort write of the freshly loaded data to the persistence
/// backend. Failures are logged and the entries purged so a later restore
/// never sees half-written state.
fn persist_cache(inner: &StoreInner, name: &str, data: &Value) {
    let Some(kv) = inner.kv.as_deref() else {
        return;
    };
    let key = cache_key(&inner.cache_prefix, name);
    let expiry = if inner.cache_timeout_seconds <= 0 {
        // Persist "never expires" as a day so stale entries still age out.
        Utc::now().timestamp_millis() + 1000 * 60 * 60 * 24
    } else {
        Utc::now().timestamp_millis() + inner.cache_timeout_seconds * 1000
    };

    let written = kv
        .set(&key, &stringify(data))
        .and_then(|()| kv.set(&format!("{key}-timeout"), &expiry.to_string()));
    if let Err(error) = written {
        tracing::warn!(store = name, %error, "failed to write cache to persistent storage");
        kv.remove(&key);
        kv.remove(&format!("{key}-timeout"));
    }
}
