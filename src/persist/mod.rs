pub mod kv;

pub use kv::{MemoryKv, PersistentKv};
