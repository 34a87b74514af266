//! The registry layer: named lookup of stores and observers, pending
//! handler bookkeeping, and the optional process-wide instance.

pub mod singleton;
pub mod state;

pub use state::State;
