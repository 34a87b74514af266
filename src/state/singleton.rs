//! The process-wide default [`State`].
//!
//! Created on first use and replaceable wholesale, for callers that want
//! one ambient registry instead of threading a [`State`] handle around.
//! Every function here delegates to the current instance; the engine
//! itself never touches this module.

use std::sync::{OnceLock, RwLock};

use crate::error::StateResult;
use crate::observer::ObservableStore;
use crate::state::State;
use crate::store::{ChangeState, Store, StoreOptions};
use crate::value::Value;

static GLOBAL: OnceLock<RwLock<State>> = OnceLock::new();

fn global() -> &'static RwLock<State> {
    GLOBAL.get_or_init(|| RwLock::new(State::new()))
}

/// A handle to the current process-wide state.
pub fn instance() -> State {
    global().read().unwrap().clone()
}

/// Swap the process-wide state wholesale, returning the previous one.
pub fn replace_instance(state: State) -> State {
    std::mem::replace(&mut *global().write().unwrap(), state)
}

/// [`State::create_store`] on the current instance.
pub fn create_store(options: StoreOptions) -> StateResult<Store> {
    instance().create_store(options)
}

/// [`State::add_store`] on the current instance.
pub fn add_store(store: Store) {
    instance().add_store(store)
}

/// [`State::find_store`] on the current instance.
pub fn find_store(name: &str) -> Option<Store> {
    instance().find_store(name)
}

/// [`State::remove_store`] on the current instance.
pub fn remove_store(name: &str) -> bool {
    instance().remove_store(name)
}

/// [`State::clear_stores`] on the current instance.
pub fn clear_stores() -> bool {
    instance().clear_stores()
}

/// [`State::add_listener`] on the current instance.
pub fn add_listener<F>(store: &str, name: impl Into<String>, callback: F) -> bool
where
    F: Fn(&ChangeState) + Send + Sync + 'static,
{
    instance().add_listener(store, name, callback)
}

/// [`State::add_action`] on the current instance.
pub fn add_action<F, Fut>(store: &str, name: impl Into<String>, callback: F) -> bool
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = StateResult<Value>> + Send + 'static,
{
    instance().add_action(store, name, callback)
}

/// [`State::add_loader`] on the current instance.
pub fn add_loader<F, Fut>(store: &str, name: impl Into<String>, callback: F) -> bool
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = StateResult<Value>> + Send + 'static,
{
    instance().add_loader(store, name, callback)
}

/// [`State::add_transformer`] on the current instance.
pub fn add_transformer<F, Fut>(store: &str, name: impl Into<String>, callback: F) -> bool
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = StateResult<Value>> + Send + 'static,
{
    instance().add_transformer(store, name, callback)
}

/// [`State::add_state_observer`] on the current instance.
pub fn add_state_observer(observer: ObservableStore) {
    instance().add_state_observer(observer)
}

/// [`State::find_state_observer`] on the current instance.
pub fn find_state_observer(name: &str) -> Option<ObservableStore> {
    instance().find_state_observer(name)
}

/// [`State::remove_state_observer`] on the current instance.
pub fn remove_state_observer(name: &str) -> bool {
    instance().remove_state_observer(name)
}

/// [`State::clear_observers`] on the current instance.
pub fn clear_observers() -> bool {
    instance().clear_observers()
}

/// [`State::clear`] on the current instance.
pub fn clear() -> bool {
    instance().clear()
}

#[cfg(test)]
mod tests {
    use super::*;

    // The global instance is shared across the whole test binary, so these
    // tests serialize on a lock and use names no other test touches.
    static SERIAL: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[test]
    fn instance_is_created_once_and_shared() {
        let _guard = SERIAL.lock().unwrap();
        let name = "singleton-shared";
        instance().create_store(StoreOptions::new(name)).unwrap();
        assert!(find_store(name).is_some());
        remove_store(name);
    }

    #[test]
    fn replace_instance_swaps_the_registry_wholesale() {
        let _guard = SERIAL.lock().unwrap();
        let name = "singleton-replaced";
        create_store(StoreOptions::new(name)).unwrap();

        let fresh = State::new();
        let old = replace_instance(fresh);
        assert!(old.find_store(name).is_some());
        assert!(find_store(name).is_none());

        // Restore so other tests see the original registry.
        replace_instance(old);
        assert!(find_store(name).is_some());
        remove_store(name);
    }
}
