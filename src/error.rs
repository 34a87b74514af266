use thiserror::Error;

/// Errors produced by store and registry operations.
///
/// Structural registry operations (remove/clear and the `create_*` upserts)
/// degrade to boolean returns instead of raising these; execution-path
/// failures from user callbacks are the one category that propagates to
/// the caller.
#[derive(Debug, Error)]
pub enum StateError {
    /// A store with this name already exists in the registry.
    #[error("store with the name \"{0}\" already exists. Remove the store before re-creating it")]
    DuplicateStore(String),

    /// A user-supplied callback failed; carries the original message.
    #[error("action callback failed: {0}")]
    Callback(String),

    /// A value could not be represented as store data.
    #[error("value cannot be stored: {0}")]
    InvalidData(String),

    /// `set_data` was called on an observable store. Observable data is
    /// mutated through the live value graph, never replaced wholesale.
    #[error("observable store data cannot be set directly")]
    DirectObservableWrite,

    /// A persistent key/value backend failed. The engine treats these as
    /// best-effort and never lets them interrupt the caller.
    #[error("cache persistence failed: {0}")]
    Persistence(String),
}

/// Result alias for store operations.
pub type StateResult<T> = Result<T, StateError>;
