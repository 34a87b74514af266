//! # Canister
//!
//! A reactive data-store engine for Rust.
//!
//! Canister provides two levels of abstraction for managing application
//! state:
//!
//! ## Stores (Execution engine)
//!
//! Named containers for dynamic [`Value`] data with registered handlers:
//! - Actions - manually triggered async callbacks
//! - Loaders - data producers with cache gating and optional persistence
//! - Transformers - read-only views over the stored data
//! - Listeners - synchronous before/after change notifications
//!
//! Plus [`GenericDataStore`] for `serde`-typed data over the same engine.
//!
//! ## Observable stores (Mutation observation)
//!
//! [`ObservableStore`] wraps a caller-supplied value graph behind typed
//! mutator methods, so discrete field writes and array edits flow through
//! the same dirty-check and listener pipeline as explicit `set_data`.
//!
//! Stores live in a [`State`] registry (or the process-wide
//! [`singleton`]), which also holds handlers registered before their
//! store exists and binds them when it appears.
//!
//! # Examples
//!
//! ```
//! use canister::{State, StoreOptions, Value};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let state = State::new();
//! let store = state.create_store(StoreOptions::new("employees")).unwrap();
//! store.create_loader("load", |_args| async {
//!     Ok(Value::array([Value::from("sam")]))
//! });
//! store.execute("load", vec![]).await.unwrap();
//! assert_eq!(store.data().as_array().unwrap().len(), 1);
//! # });
//! ```

pub mod action;
pub mod error;
pub mod observer;
pub mod persist;
pub mod state;
pub mod store;
pub mod value;

// Re-export main types for convenience
pub use action::{Action, ActionType};
pub use error::{StateError, StateResult};
pub use observer::{observed_path, Bindings, ObservableStore, INJECT_PREFIX};
pub use persist::{MemoryKv, PersistentKv};
pub use state::singleton;
pub use state::State;
pub use store::{ChainStep, ChangeState, GenericDataStore, Store, StoreOptions};
pub use value::{
    deep_clone, deep_equals, get_path, parse, shallow_clone, shallow_equals, stringify, Value,
};
