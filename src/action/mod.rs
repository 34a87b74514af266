pub mod action;
pub mod executable;

pub use action::{Action, ActionCallback, ActionType, Callback, InlineCallback, ListenerCallback};
pub use executable::Executable;
