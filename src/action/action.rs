use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::StateResult;
use crate::store::ChangeState;
use crate::value::Value;

/// Discriminant for registered handlers.
///
/// `InlineAction` is a special kind for observable stores: the handler is a
/// capability closure over the store's live data rather than a free
/// callback. Don't register one unless you have wired the data access
/// yourself or are going through the observable bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    Loader,
    Transformer,
    Listener,
    Action,
    InlineAction,
}

/// Callback for actions, loaders and transformers. Invoked with the bound
/// parameter list and awaited; the result becomes the execution result (and
/// the new store data for loaders).
pub type Callback = Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, StateResult<Value>> + Send + Sync>;

/// Callback for listeners. Runs synchronously once a change is confirmed
/// dirty, with before/after snapshots that never alias live store data.
pub type ListenerCallback = Arc<dyn Fn(&ChangeState) + Send + Sync>;

/// Callback for inline actions: a capability closure invoked directly
/// against the store's current data.
pub type InlineCallback = Arc<dyn Fn(&mut Value, Vec<Value>) -> StateResult<Value> + Send + Sync>;

/// The callback payload carried by an [`Action`], shaped by its kind.
#[derive(Clone)]
pub enum ActionCallback {
    Standard(Callback),
    Listener(ListenerCallback),
    Inline(InlineCallback),
}

/// An immutable, non-functional holder for a named callback.
///
/// Actions are cheap to clone (the callback is shared) and are owned by
/// exactly one registry list inside a store once bound.
#[derive(Clone)]
pub struct Action {
    name: String,
    action_type: ActionType,
    callback: ActionCallback,
}

impl Action {
    /// Create an action, loader or transformer from an async callback.
    pub fn new<F, Fut>(name: impl Into<String>, action_type: ActionType, callback: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = StateResult<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            action_type,
            callback: ActionCallback::Standard(Arc::new(move |args| Box::pin(callback(args)))),
        }
    }

    /// Create a listener from a synchronous change callback.
    pub fn listener<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&ChangeState) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            action_type: ActionType::Listener,
            callback: ActionCallback::Listener(Arc::new(callback)),
        }
    }

    /// Create an inline action from a capability closure over store data.
    pub fn inline<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&mut Value, Vec<Value>) -> StateResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            action_type: ActionType::InlineAction,
            callback: ActionCallback::Inline(Arc::new(callback)),
        }
    }

    /// The substitute executed when dispatch finds no handler. Logs and
    /// resolves to `Null` so execution never fails on an unknown name.
    pub(crate) fn no_op(message: String) -> Self {
        Self::new("no-op", ActionType::Action, move |_args| {
            tracing::debug!("{message}");
            std::future::ready(Ok(Value::Null))
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action_type(&self) -> ActionType {
        self.action_type
    }

    pub fn callback(&self) -> &ActionCallback {
        &self.callback
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("action_type", &self.action_type)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_reports_name_and_type() {
        let action = Action::new("load", ActionType::Loader, |_| async { Ok(Value::Null) });
        assert_eq!(action.name(), "load");
        assert_eq!(action.action_type(), ActionType::Loader);
    }

    #[test]
    fn clone_shares_the_callback() {
        let action = Action::listener("log", |_change| {});
        let copy = action.clone();
        assert_eq!(copy.name(), "log");
        assert_eq!(copy.action_type(), ActionType::Listener);
    }
}
