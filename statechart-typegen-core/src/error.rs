use thiserror::Error;

use crate::config::StateKind;

/// Errors raised while turning a [`StateConfig`](crate::StateConfig) into a
/// [`Machine`](crate::Machine).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A compound state names an initial state that is not one of its
    /// children.
    #[error("state `{state}` declares initial state `{initial}`, which is not one of its children")]
    UnknownInitial { state: String, initial: String },

    /// A transition target does not resolve to any state of the machine.
    #[error("transition `{event}` of state `{state}` targets `{target}`, which does not resolve to a state")]
    UnresolvedTarget {
        state: String,
        event: String,
        target: String,
    },

    /// A history state's default target does not resolve to any state.
    #[error("history state `{state}` defaults to `{target}`, which does not resolve to a state")]
    UnresolvedHistoryTarget { state: String, target: String },

    /// Two states declare the same explicit id.
    #[error("state id `{0}` is declared more than once")]
    DuplicateId(String),

    /// A final or history state declares child states.
    #[error("{kind} state `{state}` cannot declare child states")]
    UnexpectedChildren { state: String, kind: StateKind },
}
