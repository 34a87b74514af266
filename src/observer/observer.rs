use crate::error::{StateError, StateResult};
use crate::state::State;
use crate::store::{ChainStep, ChangeState, Store, StoreOptions};
use crate::value::Value;

use super::Bindings;

/// Prefix of the bookkeeping keys backing observed scalar fields.
///
/// Injection renames every scalar field of the target graph to a shadow
/// key carrying this prefix; the typed accessors translate back and
/// forth, and listener snapshots are stripped of the prefix before any
/// observer sees them. Inline-action callbacks receive the graph in its
/// injected representation and can resolve original field names with
/// [`observed_path`].
pub const INJECT_PREFIX: &str = "@state__";

fn shadow_key(key: &str) -> String {
    format!("{INJECT_PREFIX}{key}")
}

/// Traverse the target graph and redirect storage of every scalar field
/// to a shadow key, recursively.
///
/// Map and array containers are themselves left untouched (identity and
/// structure are not intercepted), but their object-like contents are
/// traversed. Fields that already carry the prefix are skipped, so
/// injection is idempotent and safe to re-run over newly introduced
/// elements.
pub(crate) fn inject_monitor_setters(value: &mut Value) {
    match value {
        Value::Object(entries) => {
            let drained = std::mem::take(entries);
            for (key, mut child) in drained {
                if child.is_container() {
                    inject_monitor_setters(&mut child);
                    entries.insert(key, child);
                } else if key.starts_with(INJECT_PREFIX) {
                    entries.insert(key, child);
                } else {
                    entries.insert(shadow_key(&key), child);
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut().filter(|item| item.is_container()) {
                inject_monitor_setters(item);
            }
        }
        Value::Map(entries) => {
            for (key, entry) in entries {
                if key.is_container() {
                    inject_monitor_setters(key);
                }
                if entry.is_container() {
                    inject_monitor_setters(entry);
                }
            }
        }
        _ => {}
    }
}

/// Rename shadow keys back to their original field names, recursively
/// through arrays, maps and objects. The inverse of injection, applied to
/// snapshots so observers never see bookkeeping fields.
pub(crate) fn strip_injected_keys(value: &mut Value) {
    match value {
        Value::Object(entries) => {
            let drained = std::mem::take(entries);
            for (key, mut child) in drained {
                strip_injected_keys(&mut child);
                let clean = match key.strip_prefix(INJECT_PREFIX) {
                    Some(original) => original.to_string(),
                    None => key,
                };
                entries.insert(clean, child);
            }
        }
        Value::Array(items) => {
            for item in items {
                strip_injected_keys(item);
            }
        }
        Value::Map(entries) => {
            for (key, entry) in entries {
                strip_injected_keys(key);
                strip_injected_keys(entry);
            }
        }
        _ => {}
    }
}

/// Find a nested value in an injected graph by dotted path, resolving
/// each object segment through the plain key first and its shadow form
/// second.
pub fn observed_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, observed_child)
}

fn observed_child<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(entries) => entries
            .get(segment)
            .or_else(|| entries.get(&shadow_key(segment))),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn observed_path_mut<'a>(value: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    path.split('.').try_fold(value, observed_child_mut)
}

fn observed_child_mut<'a>(value: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match value {
        Value::Object(entries) => {
            if entries.contains_key(segment) {
                entries.get_mut(segment)
            } else {
                entries.get_mut(&shadow_key(segment))
            }
        }
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
        _ => None,
    }
}

fn split_last(path: &str) -> (Option<&str>, &str) {
    match path.rsplit_once('.') {
        Some((parent, last)) => (Some(parent), last),
        None => (None, path),
    }
}

/// A store whose data is an observed value graph.
///
/// Construction consumes the caller's graph and injects change-detecting
/// bookkeeping into it; from then on every mutation goes through the
/// typed accessors here, each one an atomic, independently observable
/// change (compare, snapshot previous, write, notify, accept). Structural
/// mutation that bypasses these methods is out of contract.
///
/// `set_data` is disabled: observable data is mutated through the live
/// graph, never replaced wholesale.
///
/// # Examples
///
/// ```
/// use canister::{singleton, Bindings, ObservableStore, StoreOptions, Value};
///
/// let team = Value::object([
///     ("name", Value::from("core")),
///     ("members", Value::array([])),
/// ]);
/// let observer = ObservableStore::observable_store(
///     &singleton::instance(),
///     team,
///     StoreOptions::new("team"),
///     Bindings::new(),
/// );
/// observer.set("name", "platform");
/// assert_eq!(observer.get("name"), Some(Value::from("platform")));
/// ```
#[derive(Clone, Debug)]
pub struct ObservableStore {
    store: Store,
}

impl ObservableStore {
    /// Create an observable store over the target graph and register it
    /// with the given state.
    ///
    /// An existing observer with the same name is removed and replaced
    /// (unlike plain stores, re-creation is not an error). The bindings
    /// are applied through the ordinary handler registration path before
    /// the graph is installed, so no listener fires for the installation
    /// itself.
    pub fn observable_store(
        state: &State,
        target: Value,
        options: StoreOptions,
        bindings: Bindings,
    ) -> ObservableStore {
        state.remove_state_observer(options.name());

        let store = Store::new(options);
        store.mark_observable();
        let observer = ObservableStore { store };

        for action in bindings.into_actions() {
            observer.store.bind(action);
        }

        let mut graph = target;
        inject_monitor_setters(&mut graph);
        observer.store.install_data(graph);

        state.add_state_observer(observer.clone());
        observer
    }

    pub fn name(&self) -> &str {
        self.store.name()
    }

    /// A snapshot of the observed graph with all bookkeeping stripped.
    pub fn data(&self) -> Value {
        self.store.with_graph(|data| {
            let mut snapshot = data.clone();
            strip_injected_keys(&mut snapshot);
            snapshot
        })
    }

    /// Disabled. Observable store data cannot be replaced wholesale.
    pub fn set_data(&self, _data: Value) -> StateResult<()> {
        Err(StateError::DirectObservableWrite)
    }

    /// Read a field by dotted path, such as `"employees.0.name"`.
    pub fn get(&self, path: &str) -> Option<Value> {
        let found = self
            .store
            .with_graph(|data| observed_path(data, path).cloned());
        found.map(|mut value| {
            strip_injected_keys(&mut value);
            value
        })
    }

    /// Write a field by dotted path.
    ///
    /// On an actual change: the whole graph is deep-cloned as the new
    /// previous baseline, the field is written, listeners fire once, and
    /// the new state is immediately accepted as clean. Writing an equal
    /// scalar is a no-op. Container values are injected before storage so
    /// their fields are observable too. Returns whether a change was
    /// applied.
    pub fn set(&self, path: &str, value: impl Into<Value>) -> bool {
        let mut incoming = value.into();
        if incoming.is_container() {
            inject_monitor_setters(&mut incoming);
        }

        let changed = self.store.with_graph_mut(move |data, previous| {
            let (parent_path, key) = split_last(path);
            {
                let parent = match parent_path {
                    Some(prefix) => observed_path(data, prefix),
                    None => Some(&*data),
                };
                let Some(Value::Object(entries)) = parent else {
                    return false;
                };
                let current = entries
                    .get(&shadow_key(key))
                    .or_else(|| entries.get(key));
                if !incoming.is_container() && current == Some(&incoming) {
                    return false;
                }
            }

            *previous = data.clone();
            let parent = match parent_path {
                Some(prefix) => observed_path_mut(data, prefix),
                None => Some(data),
            };
            let Some(Value::Object(entries)) = parent else {
                return false;
            };
            if incoming.is_container() {
                entries.shift_remove(&shadow_key(key));
                entries.insert(key.to_string(), incoming);
            } else {
                entries.shift_remove(key);
                entries.insert(shadow_key(key), incoming);
            }
            true
        });

        self.finish(changed)
    }

    /// Append to an observed array. Fires one notification.
    pub fn push(&self, path: &str, value: impl Into<Value>) -> bool {
        let mut item = value.into();
        if item.is_container() {
            inject_monitor_setters(&mut item);
        }
        let changed = self.store.with_graph_mut(move |data, previous| {
            if !matches!(observed_path(data, path), Some(Value::Array(_))) {
                return false;
            }
            *previous = data.clone();
            match observed_path_mut(data, path) {
                Some(Value::Array(items)) => {
                    items.push(item);
                    true
                }
                _ => false,
            }
        });
        self.finish(changed)
    }

    /// Remove and return the last element of an observed array. Fires one
    /// notification when an element was removed; injection is not re-run
    /// over the remaining elements.
    pub fn pop(&self, path: &str) -> Option<Value> {
        self.remove_at_end(path, true)
    }

    /// Remove and return the first element of an observed array.
    pub fn shift(&self, path: &str) -> Option<Value> {
        self.remove_at_end(path, false)
    }

    /// Prepend to an observed array. Fires one notification.
    pub fn unshift(&self, path: &str, value: impl Into<Value>) -> bool {
        let mut item = value.into();
        if item.is_container() {
            inject_monitor_setters(&mut item);
        }
        let changed = self.store.with_graph_mut(move |data, previous| {
            if !matches!(observed_path(data, path), Some(Value::Array(_))) {
                return false;
            }
            *previous = data.clone();
            match observed_path_mut(data, path) {
                Some(Value::Array(items)) => {
                    items.insert(0, item);
                    true
                }
                _ => false,
            }
        });
        self.finish(changed)
    }

    /// Replace a range of an observed array, returning the removed
    /// elements. Notification fires only when the call changes the
    /// array's length; newly introduced elements are injected, removed
    /// ones are not re-visited.
    pub fn splice(
        &self,
        path: &str,
        start: usize,
        delete_count: usize,
        items: Vec<Value>,
    ) -> Vec<Value> {
        let mut items = items;
        for item in &mut items {
            if item.is_container() {
                inject_monitor_setters(item);
            }
        }
        let inserted = items.len();

        let result = self.store.with_graph_mut(move |data, previous| {
            let (start, removable) = match observed_path(data, path) {
                Some(Value::Array(existing)) => {
                    let start = start.min(existing.len());
                    (start, delete_count.min(existing.len() - start))
                }
                _ => return None,
            };
            let length_changes = removable != inserted;
            if length_changes {
                *previous = data.clone();
            }
            match observed_path_mut(data, path) {
                Some(Value::Array(existing)) => {
                    let removed: Vec<Value> =
                        existing.splice(start..start + removable, items).collect();
                    Some((removed, length_changes))
                }
                _ => None,
            }
        });

        match result {
            Some((removed, length_changed)) => {
                if length_changed {
                    self.finish(true);
                }
                removed
                    .into_iter()
                    .map(|mut item| {
                        strip_injected_keys(&mut item);
                        item
                    })
                    .collect()
            }
            None => Vec::new(),
        }
    }

    /// Append every item to an observed array (the concat analog). Fires
    /// one notification when at least one item was appended.
    pub fn extend(&self, path: &str, items: Vec<Value>) -> bool {
        if items.is_empty() {
            return false;
        }
        let mut items = items;
        for item in &mut items {
            if item.is_container() {
                inject_monitor_setters(item);
            }
        }
        let changed = self.store.with_graph_mut(move |data, previous| {
            if !matches!(observed_path(data, path), Some(Value::Array(_))) {
                return false;
            }
            *previous = data.clone();
            match observed_path_mut(data, path) {
                Some(Value::Array(existing)) => {
                    existing.extend(items);
                    true
                }
                _ => false,
            }
        });
        self.finish(changed)
    }

    fn remove_at_end(&self, path: &str, back: bool) -> Option<Value> {
        let removed = self.store.with_graph_mut(|data, previous| {
            match observed_path(data, path) {
                Some(Value::Array(items)) if !items.is_empty() => {}
                _ => return None,
            }
            *previous = data.clone();
            match observed_path_mut(data, path) {
                Some(Value::Array(items)) => {
                    if back {
                        items.pop()
                    } else {
                        Some(items.remove(0))
                    }
                }
                _ => None,
            }
        });

        removed.map(|mut item| {
            self.finish(true);
            strip_injected_keys(&mut item);
            item
        })
    }

    fn finish(&self, changed: bool) -> bool {
        if changed {
            self.store.execute_listeners();
            self.store.accept_dirty_data();
        }
        changed
    }

    /// See [`Store::is_dirty`].
    pub fn is_dirty(&self) -> bool {
        self.store.is_dirty()
    }

    /// See [`Store::accept_dirty_data`].
    pub fn accept_dirty_data(&self) {
        self.store.accept_dirty_data()
    }

    /// See [`Store::create_listener`].
    pub fn create_listener<F>(&self, name: impl Into<String>, callback: F) -> bool
    where
        F: Fn(&ChangeState) + Send + Sync + 'static,
    {
        self.store.create_listener(name, callback)
    }

    /// See [`Store::create_action`].
    pub fn create_action<F, Fut>(&self, name: impl Into<String>, callback: F) -> bool
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = StateResult<Value>> + Send + 'static,
    {
        self.store.create_action(name, callback)
    }

    /// See [`Store::create_inline_action`]. The closure receives the graph
    /// in its injected representation; resolve fields with
    /// [`observed_path`].
    pub fn create_inline_action<F>(&self, name: impl Into<String>, callback: F) -> bool
    where
        F: Fn(&mut Value, Vec<Value>) -> StateResult<Value> + Send + Sync + 'static,
    {
        self.store.create_inline_action(name, callback)
    }

    /// See [`Store::remove_action`].
    pub fn remove_action(&self, name: &str) -> bool {
        self.store.remove_action(name)
    }

    /// See [`Store::remove_listener`].
    pub fn remove_listener(&self, name: &str) -> bool {
        self.store.remove_listener(name)
    }

    /// See [`Store::execute`].
    pub async fn execute(&self, name: &str, args: Vec<Value>) -> StateResult<Value> {
        self.store.execute(name, args).await
    }

    /// See [`Store::chain`].
    pub async fn chain(&self, steps: Vec<ChainStep>) -> StateResult<Vec<Value>> {
        self.store.chain(steps).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::value::stringify;

    fn team() -> Value {
        Value::object([
            ("name", Value::from("core")),
            (
                "lead",
                Value::object([("name", Value::from("sam")), ("wage", Value::from(30.0))]),
            ),
            (
                "members",
                Value::array([Value::object([
                    ("name", Value::from("alex")),
                    ("wage", Value::from(20.0)),
                ])]),
            ),
        ])
    }

    fn build(name: &str) -> (State, ObservableStore) {
        let state = State::new();
        let observer = ObservableStore::observable_store(
            &state,
            team(),
            StoreOptions::new(name),
            Bindings::new(),
        );
        (state, observer)
    }

    #[test]
    fn injection_shadows_scalars_recursively() {
        let mut graph = team();
        inject_monitor_setters(&mut graph);

        let top = graph.as_object().unwrap();
        assert!(top.contains_key("@state__name"));
        assert!(!top.contains_key("name"));
        // Containers keep their names; their scalar contents are shadowed.
        let lead = top.get("lead").unwrap().as_object().unwrap();
        assert!(lead.contains_key("@state__wage"));
        let member = top.get("members").unwrap().as_array().unwrap()[0]
            .as_object()
            .unwrap();
        assert!(member.contains_key("@state__name"));
    }

    #[test]
    fn strip_restores_original_shape() {
        let original = team();
        let mut graph = original.clone();
        inject_monitor_setters(&mut graph);
        strip_injected_keys(&mut graph);
        assert_eq!(stringify(&graph), stringify(&original));
    }

    #[test]
    fn scalar_write_fires_one_clean_notification() {
        let (_state, observer) = build("scalar");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        observer.create_listener("watch", move |change| {
            seen_clone.lock().unwrap().push(change.clone());
        });

        assert!(observer.set("lead.name", "robin"));
        assert!(!observer.is_dirty());

        let changes = seen.lock().unwrap();
        assert_eq!(changes.len(), 1);
        let change = &changes[0];
        assert_eq!(
            crate::value::get_path(&change.previous_state, "lead.name"),
            Some(&Value::from("sam"))
        );
        assert_eq!(
            crate::value::get_path(&change.new_state, "lead.name"),
            Some(&Value::from("robin"))
        );
        // Snapshots differ only in the written field.
        assert_eq!(
            crate::value::get_path(&change.previous_state, "name"),
            crate::value::get_path(&change.new_state, "name")
        );
        // And carry no bookkeeping keys.
        assert!(!stringify(&change.new_state).contains(INJECT_PREFIX));
        assert!(!stringify(&change.previous_state).contains(INJECT_PREFIX));
    }

    #[test]
    fn equal_scalar_write_is_silent() {
        let (_state, observer) = build("silent");
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        observer.create_listener("watch", move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!observer.set("name", "core"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn push_and_pop_each_fire_once() {
        let (_state, observer) = build("arrays");
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        observer.create_listener("watch", move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(observer.push(
            "members",
            Value::object([("name", Value::from("kit")), ("wage", Value::from(18.0))]),
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // The new element was injected: its fields are observable.
        assert!(observer.set("members.1.wage", 19.0));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let removed = observer.pop("members").unwrap();
        assert_eq!(
            crate::value::get_path(&removed, "name"),
            Some(&Value::from("kit"))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Remaining elements are still observable after the removal.
        assert!(observer.set("members.0.wage", 21.0));
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        assert!(observer.pop("missing").is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn splice_notifies_only_on_length_change() {
        let (_state, observer) = build("splice");
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        observer.create_listener("watch", move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        // Replacement of equal length: no length change, no notification.
        let removed = observer.splice(
            "members",
            0,
            1,
            vec![Value::object([("name", Value::from("drew"))])],
        );
        assert_eq!(removed.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // Removal-only: length changes, one notification.
        let removed = observer.splice("members", 0, 1, vec![]);
        assert_eq!(removed.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unshift_shift_and_extend() {
        let (_state, observer) = build("ends");
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        observer.create_listener("watch", move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(observer.unshift("members", Value::object([("name", Value::from("max"))])));
        let first = observer.shift("members").unwrap();
        assert_eq!(
            crate::value::get_path(&first, "name"),
            Some(&Value::from("max"))
        );
        assert!(observer.extend(
            "members",
            vec![Value::from("x"), Value::from("y")],
        ));
        assert!(!observer.extend("members", vec![]));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn container_write_is_injected_and_observable() {
        let (_state, observer) = build("nested");
        assert!(observer.set(
            "lead",
            Value::object([("name", Value::from("jo")), ("wage", Value::from(40.0))]),
        ));
        assert!(observer.set("lead.wage", 41.0));
        assert_eq!(observer.get("lead.wage"), Some(Value::from(41.0)));
    }

    #[test]
    fn set_data_is_disabled() {
        let (_state, observer) = build("frozen");
        let err = observer.set_data(Value::from(1)).unwrap_err();
        assert!(matches!(err, StateError::DirectObservableWrite));
    }

    #[test]
    fn data_snapshot_is_clean_and_detached() {
        let (_state, observer) = build("snapshot");
        let snapshot = observer.data();
        assert!(!stringify(&snapshot).contains(INJECT_PREFIX));
        assert_eq!(
            crate::value::get_path(&snapshot, "lead.name"),
            Some(&Value::from("sam"))
        );
    }

    #[test]
    fn recreation_replaces_the_registered_observer() {
        let state = State::new();
        let first = ObservableStore::observable_store(
            &state,
            team(),
            StoreOptions::new("employees"),
            Bindings::new(),
        );
        first.set("name", "old");

        let _second = ObservableStore::observable_store(
            &state,
            team(),
            StoreOptions::new("employees"),
            Bindings::new(),
        );
        let found = state.find_state_observer("employees").unwrap();
        assert_eq!(found.get("name"), Some(Value::from("core")));
    }

    #[tokio::test]
    async fn bindings_wire_handlers_at_construction() {
        let state = State::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let bindings = Bindings::new()
            .listener("watch", move |_| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            })
            .inline_action("raise", |data, args| {
                let percent = args.first().and_then(Value::as_f64).unwrap_or(0.0);
                let wage = observed_path(data, "lead.wage")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0);
                let raised = wage * (1.0 + percent);
                if let Some(Value::Object(lead)) =
                    data.as_object_mut().and_then(|top| top.get_mut("lead"))
                {
                    lead.insert("@state__wage".to_string(), Value::from(raised));
                }
                Ok(Value::from(raised))
            });

        let observer = ObservableStore::observable_store(
            &state,
            team(),
            StoreOptions::new("wired"),
            bindings,
        );

        // Installation itself must not notify.
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let raised = observer.execute("raise", vec![Value::from(0.5)]).await.unwrap();
        assert_eq!(raised, Value::from(45.0));
        assert_eq!(observer.get("lead.wage"), Some(Value::from(45.0)));
        // The inline mutation left the store dirty, so the execute path
        // notified once.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
