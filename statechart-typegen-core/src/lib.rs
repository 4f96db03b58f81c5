//! Data model and analyses for statechart type generation.
//!
//! A [`StateConfig`] describes a machine the way it is written. Building a
//! [`Machine`] from it resolves every transition target into an arena of
//! [`StateNode`]s, which [`introspect_machine`] walks to compute the state
//! matches, per-state targets and sources, and the handler tables a type
//! declaration needs.
//!
//! ```rust
//! use statechart_typegen_core::{
//!     Machine, MachineOptions, StateConfig, TransitionConfig, introspect_machine,
//! };
//!
//! let config = StateConfig::new()
//!     .initial("red")
//!     .state("red", StateConfig::new().on("GO", TransitionConfig::to("green")))
//!     .state("green", StateConfig::new().entry("celebrate"));
//!
//! let machine = Machine::from_config(&config, MachineOptions::new()).unwrap();
//! let facts = introspect_machine(&machine, "light");
//!
//! assert_eq!(facts.state_matches, ["red", "green"]);
//! assert_eq!(facts.actions.lines[0].events, ["GO"]);
//! ```

mod config;
mod error;
mod introspect;
mod machine;
mod options;
pub mod traversal;

pub use crate::config::{
    Action, ChooseBranch, HistoryKind, InvokeConfig, Reference, StateConfig, StateKind,
    TransitionConfig,
};
pub use crate::error::GraphError;
pub use crate::introspect::{
    HandlerLine, HandlerTable, Introspection, RESERVED_PREFIX, SubState, introspect_machine,
};
pub use crate::machine::{
    Delay, EventDescriptor, Invocation, Machine, NodeIdx, ROOT_KEY, StateNode, Transition,
};
pub use crate::options::{HandlerKind, MachineOptions};
pub use crate::traversal::{get_matches_states, get_root_node, get_transitions_from_node};
