use crate::action::{Action, ActionCallback};
use crate::error::{StateError, StateResult};
use crate::value::Value;

/// Pairs an [`Action`] with the parameters to apply when executing it.
///
/// The only functional pieces are construction and [`execute`], which
/// awaits the callback and converts whatever it raised into a uniform
/// [`StateError::Callback`] carrying the original message.
///
/// [`execute`]: Executable::execute
pub struct Executable {
    action: Action,
    params: Vec<Value>,
}

impl Executable {
    /// Create an executor for the provided action.
    pub fn new(action: Action, params: Vec<Value>) -> Self {
        Self { action, params }
    }

    /// Asynchronously execute the action. Callback failures are re-thrown
    /// as [`StateError::Callback`].
    pub async fn execute(self) -> StateResult<Value> {
        match self.action.callback() {
            ActionCallback::Standard(callback) => match callback(self.params).await {
                Ok(result) => Ok(result),
                Err(StateError::Callback(message)) => Err(StateError::Callback(message)),
                Err(other) => Err(StateError::Callback(other.to_string())),
            },
            // Listeners and inline actions are dispatched by the store
            // itself; an Executable built over one has nothing to run.
            ActionCallback::Listener(_) | ActionCallback::Inline(_) => {
                tracing::debug!(
                    action = self.action.name(),
                    "executable built over a non-standard action; nothing to run"
                );
                Ok(Value::Null)
            }
        }
    }
}
