//! The store execution engine.
//!
//! A store is the central dispatch point for all reads and writes of a
//! named value plus notification of interested parties. Handlers come in
//! four flavors: actions (manual triggers), loaders (produce new data),
//! transformers (read data without altering it) and listeners (notified
//! with before/after snapshots whenever data is confirmed dirty).

pub mod generic;
pub mod options;
pub mod store;

pub use generic::GenericDataStore;
pub use options::{ChainStep, ChangeState, StoreOptions};
pub use store::Store;
