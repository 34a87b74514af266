//! The mutation-observation engine.
//!
//! An observable store wraps a caller-supplied value graph behind typed
//! mutator methods, so direct field mutation is indistinguishable, from a
//! listener's point of view, from an explicit `set_data` call on a plain
//! store. Scalar fields are redirected to shadow keys at construction
//! time; every write routed through the store compares, snapshots,
//! notifies and accepts in one atomic step.

pub mod bindings;
pub mod observer;

pub(crate) use observer::strip_injected_keys;
pub use bindings::Bindings;
pub use observer::{observed_path, ObservableStore, INJECT_PREFIX};
