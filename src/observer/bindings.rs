use crate::action::{Action, ActionType};
use crate::error::StateResult;
use crate::store::ChangeState;
use crate::value::Value;

/// Handler wiring applied to an observable store at construction time.
///
/// The analog of scanning a target object for annotated methods: each
/// entry names a handler and its kind, and construction applies them all
/// through the ordinary `create_*` registration path. Purely additive:
/// there is no control flow here.
///
/// # Examples
///
/// ```
/// use canister::Bindings;
///
/// let bindings = Bindings::new()
///     .listener("log", |change| println!("{:?}", change.new_state))
///     .inline_action("clear", |data, _args| {
///         *data = canister::Value::Null;
///         Ok(canister::Value::Null)
///     });
/// ```
#[derive(Default)]
pub struct Bindings {
    actions: Vec<Action>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wire a listener, notified with before/after snapshots.
    pub fn listener<F>(mut self, name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&ChangeState) + Send + Sync + 'static,
    {
        self.actions.push(Action::listener(name, callback));
        self
    }

    /// Wire a manually triggered action.
    pub fn action<F, Fut>(mut self, name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = StateResult<Value>> + Send + 'static,
    {
        self.actions.push(Action::new(name, ActionType::Action, callback));
        self
    }

    /// Wire an inline action: a capability closure over the store's live
    /// data graph (in its injected representation).
    pub fn inline_action<F>(mut self, name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&mut Value, Vec<Value>) -> StateResult<Value> + Send + Sync + 'static,
    {
        self.actions.push(Action::inline(name, callback));
        self
    }

    pub(crate) fn into_actions(self) -> Vec<Action> {
        self.actions
    }
}
