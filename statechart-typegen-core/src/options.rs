//! Default implementations supplied when a machine is constructed.

use std::fmt;

use indexmap::IndexSet;
use serde::Serialize;

/// The categories of named implementations a machine can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerKind {
    Action,
    Guard,
    Service,
    Activity,
    Delay,
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Action => "action",
            Self::Guard => "guard",
            Self::Service => "service",
            Self::Activity => "activity",
            Self::Delay => "delay",
        })
    }
}

/// Names that have a default implementation in the machine's own options.
///
/// Only presence matters: a name listed here is optional for the caller, any
/// other referenced name is required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MachineOptions {
    pub actions: IndexSet<String>,
    pub guards: IndexSet<String>,
    pub services: IndexSet<String>,
    pub activities: IndexSet<String>,
    pub delays: IndexSet<String>,
}

impl MachineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a default implementation for `name`.
    pub fn with(mut self, kind: HandlerKind, name: impl Into<String>) -> Self {
        self.insert(kind, name);
        self
    }

    pub fn insert(&mut self, kind: HandlerKind, name: impl Into<String>) {
        self.names_mut(kind).insert(name.into());
    }

    /// Whether a default implementation exists for `name`.
    pub fn provides(&self, kind: HandlerKind, name: &str) -> bool {
        self.names(kind).contains(name)
    }

    pub fn names(&self, kind: HandlerKind) -> &IndexSet<String> {
        match kind {
            HandlerKind::Action => &self.actions,
            HandlerKind::Guard => &self.guards,
            HandlerKind::Service => &self.services,
            HandlerKind::Activity => &self.activities,
            HandlerKind::Delay => &self.delays,
        }
    }

    fn names_mut(&mut self, kind: HandlerKind) -> &mut IndexSet<String> {
        match kind {
            HandlerKind::Action => &mut self.actions,
            HandlerKind::Guard => &mut self.guards,
            HandlerKind::Service => &mut self.services,
            HandlerKind::Activity => &mut self.activities,
            HandlerKind::Delay => &mut self.delays,
        }
    }
}
