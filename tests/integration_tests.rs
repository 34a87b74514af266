//! Integration tests for Canister

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use canister::{
    singleton, Bindings, ChainStep, GenericDataStore, MemoryKv, ObservableStore, PersistentKv,
    State, StateError, StoreOptions, Value,
};

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

#[tokio::test]
async fn store_lifecycle_integration() {
    init_tracing();
    let state = State::new();
    let store = state.create_store(StoreOptions::new("codes")).unwrap();

    let notifications = Arc::new(AtomicUsize::new(0));
    let notifications_clone = Arc::clone(&notifications);
    store.create_listener("watch", move |change| {
        assert_ne!(change.previous_state, change.new_state);
        notifications_clone.fetch_add(1, Ordering::SeqCst);
    });

    store.create_loader("load", |_args| async {
        Ok(Value::array([Value::from("alpha"), Value::from("beta")]))
    });
    store.create_transformer("count", |args: Vec<Value>| async move {
        let data = args[0].as_array().map(Vec::len).unwrap_or(0);
        Ok(Value::from(data as i64))
    });

    // Loading applies the result, notifies once and accepts it clean.
    let loaded = store.execute("load", vec![]).await.unwrap();
    assert_eq!(loaded.as_array().unwrap().len(), 2);
    assert_eq!(notifications.load(Ordering::SeqCst), 1);
    assert!(!store.is_dirty());

    // Transformers see the data without altering it.
    let count = store.execute("count", vec![]).await.unwrap();
    assert_eq!(count, Value::from(2));
    assert_eq!(store.data(), loaded);

    // Unknown names resolve to a null-returning no-op.
    let missing = store.execute("missing", vec![]).await.unwrap();
    assert_eq!(missing, Value::Null);
}

#[tokio::test]
async fn unbound_handlers_integration() {
    let state = State::new();

    // Handlers registered before the store exists.
    state.add_loader("deferred", "load", |_| async { Ok(Value::from("late")) });
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = Arc::clone(&calls);
    state.add_listener("deferred", "watch", move |_| {
        calls_clone.fetch_add(1, Ordering::SeqCst);
    });

    // Creating the store binds them.
    let store = state.create_store(StoreOptions::new("deferred")).unwrap();
    let result = store.execute("load", vec![]).await.unwrap();
    assert_eq!(result, Value::from("late"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn chained_execution_integration() {
    let state = State::new();
    let store = state.create_store(StoreOptions::new("pipeline")).unwrap();

    store.create_action("fetch", |_| async { Ok(Value::from(10)) });
    store.create_action("double", |args: Vec<Value>| async move {
        let input = args.first().and_then(Value::as_i64).unwrap_or(0);
        Ok(Value::from(input * 2))
    });

    let results = store
        .chain(vec![
            ChainStep::new("fetch").forward_result(),
            ChainStep::new("double"),
        ])
        .await
        .unwrap();
    assert_eq!(results, vec![Value::from(10), Value::from(20)]);
}

#[tokio::test]
async fn cache_gating_integration() {
    init_tracing();
    let state = State::new();
    let store = state
        .create_store(
            StoreOptions::new("cached")
                .cachable(true)
                .cache_timeout_seconds(60),
        )
        .unwrap();

    let loads = Arc::new(AtomicUsize::new(0));
    let loads_clone = Arc::clone(&loads);
    store.create_loader("load", move |_| {
        let loads = Arc::clone(&loads_clone);
        async move {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok(Value::from("fresh"))
        }
    });

    store.execute("load", vec![]).await.unwrap();
    let served = store.execute("load", vec![]).await.unwrap();

    // The second call was skipped and served from cache.
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(served, Value::from("fresh"));
    assert!(store.is_cached());
}

#[tokio::test]
async fn persistence_integration() {
    let kv = Arc::new(MemoryKv::new());
    let options = || {
        StoreOptions::new("durable")
            .cachable(true)
            .cache_timeout_seconds(300)
            .persist_cache(Arc::clone(&kv) as Arc<dyn PersistentKv>)
    };

    let state = State::new();
    let store = state.create_store(options()).unwrap();
    store.create_loader("load", |_| async {
        Ok(Value::object([("ready", Value::from(true))]))
    });
    store.execute("load", vec![]).await.unwrap();

    // A fresh store over the same backend starts out cached.
    let revived = canister::Store::new(options());
    assert!(revived.is_cached());
    assert_eq!(revived.data().get("ready"), Some(&Value::from(true)));
}

#[test]
fn observable_store_integration() {
    let state = State::new();
    let changes = Arc::new(Mutex::new(Vec::new()));
    let changes_clone = Arc::clone(&changes);

    let team = Value::object([
        ("name", Value::from("core")),
        (
            "members",
            Value::array([Value::object([
                ("name", Value::from("sam")),
                ("wage", Value::from(20.0)),
            ])]),
        ),
    ]);
    let observer = ObservableStore::observable_store(
        &state,
        team,
        StoreOptions::new("team"),
        Bindings::new().listener("watch", move |change| {
            changes_clone.lock().unwrap().push(change.clone());
        }),
    );

    // Each discrete write is one observable change.
    assert!(observer.set("members.0.wage", 22.5));
    assert!(observer.push(
        "members",
        Value::object([("name", Value::from("kit")), ("wage", Value::from(18.0))]),
    ));
    assert!(observer.set("members.1.name", "kim"));

    let recorded = changes.lock().unwrap();
    assert_eq!(recorded.len(), 3);
    assert_eq!(
        canister::get_path(&recorded[0].previous_state, "members.0.wage"),
        Some(&Value::from(20.0))
    );
    assert_eq!(
        canister::get_path(&recorded[0].new_state, "members.0.wage"),
        Some(&Value::from(22.5))
    );
    // Listener snapshots never carry bookkeeping keys.
    for change in recorded.iter() {
        assert!(!canister::stringify(&change.new_state).contains(canister::INJECT_PREFIX));
    }

    // Wholesale replacement is disabled.
    assert!(matches!(
        observer.set_data(Value::Null),
        Err(StateError::DirectObservableWrite)
    ));

    // The observer is registered and retrievable.
    let found = state.find_state_observer("team").unwrap();
    assert_eq!(found.get("members.1.name"), Some(Value::from("kim")));
}

#[test]
fn typed_store_integration() {
    #[derive(serde::Serialize, serde::Deserialize, Debug, PartialEq, Clone)]
    struct Employee {
        name: String,
        wage: f64,
    }

    let state = State::new();
    let store: GenericDataStore<Vec<Employee>> =
        GenericDataStore::create_store(&state, StoreOptions::new("employees")).unwrap();

    let roster = vec![
        Employee {
            name: "sam".to_string(),
            wage: 20.5,
        },
        Employee {
            name: "kit".to_string(),
            wage: 18.0,
        },
    ];
    store.set_data(&roster).unwrap();
    assert_eq!(store.data().unwrap(), roster);

    // The untyped handle in the registry is the same store.
    let raw = state.find_store("employees").unwrap();
    assert_eq!(raw.data().as_array().unwrap().len(), 2);
}

#[test]
fn map_round_trip_integration() {
    let graph = Value::object([(
        "lookup",
        Value::map([(Value::from(1), Value::from("one"))]),
    )]);

    let text = canister::stringify(&graph);
    assert!(text.contains("\"dataType\":\"Map\""));

    let revived = canister::parse(&text).unwrap();
    assert!(canister::deep_equals(&graph, &revived));
    assert!(matches!(revived.get("lookup"), Some(Value::Map(_))));
}

#[test]
fn singleton_integration() {
    let name = "integration-global";
    singleton::create_store(StoreOptions::new(name)).unwrap();
    assert!(singleton::find_store(name).is_some());

    // The global registry rejects the duplicate like any other state.
    assert!(matches!(
        singleton::create_store(StoreOptions::new(name)),
        Err(StateError::DuplicateStore(_))
    ));

    assert!(singleton::remove_store(name));
    assert!(singleton::find_store(name).is_none());
}
