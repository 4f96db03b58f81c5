//! Declarative machine configuration.
//!
//! A [`StateConfig`] is the plain, statically known part of a machine
//! definition: the state tree, its transitions and the names of the
//! implementations it refers to. It is produced by the extractor from source
//! text, or built by hand with the fluent methods below.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

/// The kind of a state node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
    Atomic,
    Compound,
    Parallel,
    Final,
    History,
}

impl StateKind {
    /// Parses the value of a `type` property.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "atomic" => Some(Self::Atomic),
            "compound" => Some(Self::Compound),
            "parallel" => Some(Self::Parallel),
            "final" => Some(Self::Final),
            "history" => Some(Self::History),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Atomic => "atomic",
            Self::Compound => "compound",
            Self::Parallel => "parallel",
            Self::Final => "final",
            Self::History => "history",
        }
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// History depth of a history state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    #[default]
    Shallow,
    Deep,
}

/// A reference to an externally supplied implementation.
///
/// Inline implementations cannot be named, so they are never tracked as
/// required or optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Named(String),
    Inline,
}

impl Reference {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// The referenced name, if the implementation is not inline.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            Self::Inline => None,
        }
    }
}

impl From<&str> for Reference {
    fn from(name: &str) -> Self {
        Self::Named(name.to_owned())
    }
}

/// An action executed on entry, exit or while taking a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// A user action referenced by name.
    Named(String),
    /// An inline function.
    Inline,
    /// A built-in action such as `xstate.assign`.
    Builtin(String),
    /// A conditional action that runs the first branch whose guard passes.
    Choose(Vec<ChooseBranch>),
}

impl Action {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }
}

impl From<&str> for Action {
    fn from(name: &str) -> Self {
        Self::Named(name.to_owned())
    }
}

/// One branch of a [`Action::Choose`] action.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChooseBranch {
    pub cond: Option<Reference>,
    pub actions: Vec<Action>,
}

impl ChooseBranch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cond(mut self, cond: impl Into<Reference>) -> Self {
        self.cond = Some(cond.into());
        self
    }

    pub fn action(mut self, action: impl Into<Action>) -> Self {
        self.actions.push(action.into());
        self
    }
}

/// A single transition as written in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransitionConfig {
    /// Target expressions, unresolved. Empty for a targetless transition.
    pub targets: Vec<String>,
    pub cond: Option<Reference>,
    pub actions: Vec<Action>,
    pub internal: Option<bool>,
}

impl TransitionConfig {
    /// A transition to `target`.
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            targets: vec![target.into()],
            ..Self::default()
        }
    }

    /// A transition without a target.
    pub fn targetless() -> Self {
        Self::default()
    }

    /// Adds another target, for transitions into several parallel regions.
    pub fn also(mut self, target: impl Into<String>) -> Self {
        self.targets.push(target.into());
        self
    }

    pub fn cond(mut self, cond: impl Into<Reference>) -> Self {
        self.cond = Some(cond.into());
        self
    }

    pub fn action(mut self, action: impl Into<Action>) -> Self {
        self.actions.push(action.into());
        self
    }

    pub fn internal(mut self, internal: bool) -> Self {
        self.internal = Some(internal);
        self
    }
}

/// A service invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeConfig {
    pub src: Reference,
    pub id: Option<String>,
    pub on_done: Vec<TransitionConfig>,
    pub on_error: Vec<TransitionConfig>,
    pub auto_forward: bool,
}

impl InvokeConfig {
    /// Invokes the service registered under `src`.
    pub fn service(src: impl Into<String>) -> Self {
        Self::from_source(Reference::Named(src.into()))
    }

    /// Invokes an inline service.
    pub fn inline() -> Self {
        Self::from_source(Reference::Inline)
    }

    fn from_source(src: Reference) -> Self {
        Self {
            src,
            id: None,
            on_done: Vec::new(),
            on_error: Vec::new(),
            auto_forward: false,
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn on_done(mut self, transition: TransitionConfig) -> Self {
        self.on_done.push(transition);
        self
    }

    pub fn on_error(mut self, transition: TransitionConfig) -> Self {
        self.on_error.push(transition);
        self
    }
}

/// Configuration of one state node and, recursively, its children.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StateConfig {
    pub id: Option<String>,
    /// The explicit `type`. When absent the kind is inferred from `states`.
    pub kind: Option<StateKind>,
    pub initial: Option<String>,
    pub states: IndexMap<String, StateConfig>,
    pub on: IndexMap<String, Vec<TransitionConfig>>,
    pub always: Vec<TransitionConfig>,
    pub after: IndexMap<String, Vec<TransitionConfig>>,
    pub on_done: Vec<TransitionConfig>,
    pub invoke: Vec<InvokeConfig>,
    pub entry: Vec<Action>,
    pub exit: Vec<Action>,
    pub activities: Vec<Reference>,
    pub history: Option<HistoryKind>,
    /// Default target of a history state.
    pub target: Option<String>,
}

impl StateConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// A state with an explicit `type`.
    pub fn of_kind(kind: StateKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// The kind this state will have in the graph.
    pub fn resolved_kind(&self) -> StateKind {
        match self.kind {
            Some(kind) => kind,
            None if self.states.is_empty() => StateKind::Atomic,
            None => StateKind::Compound,
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn initial(mut self, initial: impl Into<String>) -> Self {
        self.initial = Some(initial.into());
        self
    }

    pub fn state(mut self, key: impl Into<String>, state: StateConfig) -> Self {
        self.states.insert(key.into(), state);
        self
    }

    pub fn on(mut self, event: impl Into<String>, transition: TransitionConfig) -> Self {
        self.on.entry(event.into()).or_default().push(transition);
        self
    }

    pub fn always(mut self, transition: TransitionConfig) -> Self {
        self.always.push(transition);
        self
    }

    pub fn after(mut self, delay: impl Into<String>, transition: TransitionConfig) -> Self {
        self.after.entry(delay.into()).or_default().push(transition);
        self
    }

    pub fn on_done(mut self, transition: TransitionConfig) -> Self {
        self.on_done.push(transition);
        self
    }

    pub fn invoke(mut self, invoke: InvokeConfig) -> Self {
        self.invoke.push(invoke);
        self
    }

    pub fn entry(mut self, action: impl Into<Action>) -> Self {
        self.entry.push(action.into());
        self
    }

    pub fn exit(mut self, action: impl Into<Action>) -> Self {
        self.exit.push(action.into());
        self
    }

    pub fn activity(mut self, activity: impl Into<Reference>) -> Self {
        self.activities.push(activity.into());
        self
    }

    pub fn history(mut self, history: HistoryKind) -> Self {
        self.kind = Some(StateKind::History);
        self.history = Some(history);
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}
