use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::action::{Action, ActionType};
use crate::error::{StateError, StateResult};
use crate::observer::ObservableStore;
use crate::store::{ChangeState, Store, StoreOptions};
use crate::value::Value;

#[derive(Default)]
struct StateInner {
    stores: Vec<Store>,
    observers: Vec<ObservableStore>,
    // Handlers registered before their store exists, keyed by store name.
    // Applied and forgotten the moment the store appears.
    unbound: HashMap<String, Vec<Action>>,
}

/// The registry tying stores, observers and pre-registered handlers
/// together.
///
/// `State` is a cheap handle: clones share the registry. A process-wide
/// default instance lives in the [`singleton`](crate::singleton) module;
/// everything here also works against an explicitly constructed `State`,
/// which is what tests do.
///
/// # Examples
///
/// ```
/// use canister::{State, StoreOptions, Value};
///
/// let state = State::new();
/// let store = state.create_store(StoreOptions::new("employees")).unwrap();
/// store.set_data(Value::array([]));
/// assert!(state.find_store("employees").is_some());
/// ```
#[derive(Clone, Default)]
pub struct State {
    inner: Arc<RwLock<StateInner>>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store and register it under its name.
    ///
    /// Any handlers registered for the name before the store existed are
    /// bound to it now.
    ///
    /// # Errors
    ///
    /// [`StateError::DuplicateStore`] if the name is already registered.
    pub fn create_store(&self, options: StoreOptions) -> StateResult<Store> {
        if self.find_store(options.name()).is_some() {
            return Err(StateError::DuplicateStore(options.name().to_string()));
        }
        let store = Store::new(options);
        self.add_store(store.clone());
        Ok(store)
    }

    /// Register an externally built store, binding any handlers that were
    /// waiting for its name. A same-named store already present is
    /// replaced.
    pub fn add_store(&self, store: Store) {
        let mut inner = self.inner.write().unwrap();
        if let Some(waiting) = inner.unbound.remove(store.name()) {
            for action in waiting {
                store.bind(action);
            }
        }
        let name = store.name().to_string();
        inner.stores.retain(|existing| existing.name() != name);
        inner.stores.push(store);
    }

    pub fn find_store(&self, name: &str) -> Option<Store> {
        self.inner
            .read()
            .unwrap()
            .stores
            .iter()
            .find(|store| store.name() == name)
            .cloned()
    }

    /// Remove the named store and any unbound handlers recorded for it.
    /// Returns true when the store existed.
    pub fn remove_store(&self, name: &str) -> bool {
        let mut inner = self.inner.write().unwrap();
        inner.unbound.remove(name);
        let before = inner.stores.len();
        inner.stores.retain(|store| store.name() != name);
        inner.stores.len() != before
    }

    /// Drop every store and its pending handlers.
    pub fn clear_stores(&self) -> bool {
        let mut inner = self.inner.write().unwrap();
        inner.stores.clear();
        inner.unbound.clear();
        true
    }

    /// Register a listener on the named store, now or when it appears.
    pub fn add_listener<F>(&self, store: &str, name: impl Into<String>, callback: F) -> bool
    where
        F: Fn(&ChangeState) + Send + Sync + 'static,
    {
        self.register(store, Action::listener(name, callback))
    }

    /// Register an action on the named store, now or when it appears.
    pub fn add_action<F, Fut>(&self, store: &str, name: impl Into<String>, callback: F) -> bool
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = StateResult<Value>> + Send + 'static,
    {
        self.register(store, Action::new(name, ActionType::Action, callback))
    }

    /// Register a loader on the named store, now or when it appears.
    pub fn add_loader<F, Fut>(&self, store: &str, name: impl Into<String>, callback: F) -> bool
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = StateResult<Value>> + Send + 'static,
    {
        self.register(store, Action::new(name, ActionType::Loader, callback))
    }

    /// Register a transformer on the named store, now or when it appears.
    pub fn add_transformer<F, Fut>(&self, store: &str, name: impl Into<String>, callback: F) -> bool
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = StateResult<Value>> + Send + 'static,
    {
        self.register(store, Action::new(name, ActionType::Transformer, callback))
    }

    /// Bind to the store when present, otherwise record the handler as
    /// unbound for the store's name. Unbound entries upsert by name and
    /// kind, matching the store-side registries.
    fn register(&self, store_name: &str, action: Action) -> bool {
        if let Some(store) = self.find_store(store_name) {
            return store.bind(action);
        }
        let mut inner = self.inner.write().unwrap();
        let waiting = inner.unbound.entry(store_name.to_string()).or_default();
        waiting.retain(|existing| {
            existing.name() != action.name() || existing.action_type() != action.action_type()
        });
        waiting.push(action);
        true
    }

    /// Register an observer. A same-named observer already present is
    /// replaced.
    pub fn add_state_observer(&self, observer: ObservableStore) {
        let mut inner = self.inner.write().unwrap();
        let name = observer.name().to_string();
        inner.observers.retain(|existing| existing.name() != name);
        inner.observers.push(observer);
    }

    pub fn find_state_observer(&self, name: &str) -> Option<ObservableStore> {
        self.inner
            .read()
            .unwrap()
            .observers
            .iter()
            .find(|observer| observer.name() == name)
            .cloned()
    }

    /// Remove the named observer. Returns true when it existed.
    pub fn remove_state_observer(&self, name: &str) -> bool {
        let mut inner = self.inner.write().unwrap();
        let before = inner.observers.len();
        inner.observers.retain(|observer| observer.name() != name);
        inner.observers.len() != before
    }

    /// Drop every observer.
    pub fn clear_observers(&self) -> bool {
        self.inner.write().unwrap().observers.clear();
        true
    }

    /// Drop everything: stores, observers and pending handlers.
    pub fn clear(&self) -> bool {
        self.clear_stores() && self.clear_observers()
    }
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read().unwrap();
        f.debug_struct("State")
            .field("stores", &inner.stores.len())
            .field("observers", &inner.observers.len())
            .field("unbound", &inner.unbound.len())
            .finish()
    }
}
