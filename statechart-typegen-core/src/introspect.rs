//! Facts about a constructed machine, in the shape a declaration renderer
//! consumes.

use indexmap::{IndexMap, IndexSet};
use petgraph::Direction;
use petgraph::visit::EdgeRef;
use serde::Serialize;

use crate::config::{Action, Reference};
use crate::machine::{Delay, EventDescriptor, Machine, NodeIdx};
use crate::options::{HandlerKind, MachineOptions};
use crate::traversal::{get_matches_states, get_transitions_from_node};

/// Names with this prefix belong to the runtime and are never reported.
pub const RESERVED_PREFIX: &str = "xstate.";

/// Everything known about one machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Introspection {
    pub id: String,
    pub state_matches: Vec<String>,
    pub sub_state: SubState,
    pub actions: HandlerTable,
    pub guards: HandlerTable,
    pub services: HandlerTable,
    pub activities: HandlerTable,
    pub delays: HandlerTable,
}

impl Introspection {
    pub fn table(&self, kind: HandlerKind) -> &HandlerTable {
        match kind {
            HandlerKind::Action => &self.actions,
            HandlerKind::Guard => &self.guards,
            HandlerKind::Service => &self.services,
            HandlerKind::Activity => &self.activities,
            HandlerKind::Delay => &self.delays,
        }
    }
}

/// Targets and sources of one state, with the same record for each child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubState {
    pub targets: Vec<String>,
    /// Event types of every transition that can enter this state.
    pub sources: Vec<String>,
    pub states: IndexMap<String, SubState>,
}

/// Every referenced name of one handler category.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct HandlerTable {
    pub lines: Vec<HandlerLine>,
    /// Whether at least one line is required.
    pub required: bool,
}

impl HandlerTable {
    pub fn line(&self, name: &str) -> Option<&HandlerLine> {
        self.lines.iter().find(|line| line.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|line| line.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerLine {
    pub name: String,
    /// `false` when the machine supplies a default implementation.
    pub required: bool,
    pub events: Vec<String>,
    pub states: Vec<String>,
}

/// Introspects `machine`, reporting it under `id`.
pub fn introspect_machine(machine: &Machine, id: impl Into<String>) -> Introspection {
    let sources = collect_sources(machine);
    let mut collector = Collector::default();

    for (idx, node) in machine.nodes() {
        let state = node.path_string();
        let node_sources = &sources[idx.index()];

        for transition in &node.transitions {
            let events = [transition.event.event_type()];
            if let Some(cond) = &transition.cond {
                collector.reference(HandlerKind::Guard, cond, &events, &state);
            }
            for action in &transition.actions {
                collector.action(action, &events, &state);
            }
            if let EventDescriptor::After { delay: Delay::Named(name), .. } = &transition.event {
                collector.record(HandlerKind::Delay, name, node_sources, &state);
            }
        }
        for action in &node.exit {
            collector.action(action, &[], &state);
        }
        for action in &node.entry {
            collector.action(action, node_sources, &state);
        }
        for invocation in &node.invoke {
            collector.reference(HandlerKind::Service, &invocation.src, node_sources, &state);
        }
        for activity in &node.activities {
            collector.reference(HandlerKind::Activity, activity, node_sources, &state);
        }
    }

    let options = machine.options();
    Introspection {
        id: id.into(),
        state_matches: get_matches_states(machine, machine.root()),
        sub_state: sub_state(machine, machine.root(), &sources),
        actions: collector.finish(HandlerKind::Action, options),
        guards: collector.finish(HandlerKind::Guard, options),
        services: collector.finish(HandlerKind::Service, options),
        activities: collector.finish(HandlerKind::Activity, options),
        delays: collector.finish(HandlerKind::Delay, options),
    }
}

/// Incoming event types per node, indexed like the arena.
fn collect_sources(machine: &Machine) -> Vec<Vec<String>> {
    let graph = machine.transition_graph();
    graph
        .node_indices()
        .map(|vertex| {
            let mut incoming: Vec<_> = graph.edges_directed(vertex, Direction::Incoming).collect();
            incoming.sort_by_key(|edge| edge.id());
            incoming
                .into_iter()
                .map(|edge| edge.weight().clone())
                .collect::<IndexSet<_>>()
                .into_iter()
                .collect()
        })
        .collect()
}

fn sub_state(machine: &Machine, node: NodeIdx, sources: &[Vec<String>]) -> SubState {
    let state = machine.node(node);
    SubState {
        targets: get_transitions_from_node(machine, node),
        sources: sources[node.index()].clone(),
        states: state
            .states
            .iter()
            .map(|(key, &child)| (key.clone(), sub_state(machine, child, sources)))
            .collect(),
    }
}

#[derive(Debug, Default)]
struct Usage {
    events: IndexSet<String>,
    states: IndexSet<String>,
}

#[derive(Debug, Default)]
struct Collector {
    actions: IndexMap<String, Usage>,
    guards: IndexMap<String, Usage>,
    services: IndexMap<String, Usage>,
    activities: IndexMap<String, Usage>,
    delays: IndexMap<String, Usage>,
}

impl Collector {
    fn table_mut(&mut self, kind: HandlerKind) -> &mut IndexMap<String, Usage> {
        match kind {
            HandlerKind::Action => &mut self.actions,
            HandlerKind::Guard => &mut self.guards,
            HandlerKind::Service => &mut self.services,
            HandlerKind::Activity => &mut self.activities,
            HandlerKind::Delay => &mut self.delays,
        }
    }

    fn record(&mut self, kind: HandlerKind, name: &str, events: &[String], state: &str) {
        if name.starts_with(RESERVED_PREFIX) {
            return;
        }
        let usage = self.table_mut(kind).entry(name.to_owned()).or_default();
        usage
            .events
            .extend(events.iter().filter(|event| !event.is_empty()).cloned());
        if !state.is_empty() {
            usage.states.insert(state.to_owned());
        }
    }

    fn reference(&mut self, kind: HandlerKind, reference: &Reference, events: &[String], state: &str) {
        if let Reference::Named(name) = reference {
            self.record(kind, name, events, state);
        }
    }

    fn action(&mut self, action: &Action, events: &[String], state: &str) {
        match action {
            Action::Named(name) => self.record(HandlerKind::Action, name, events, state),
            Action::Inline | Action::Builtin(_) => {}
            Action::Choose(branches) => {
                for branch in branches {
                    if let Some(cond) = &branch.cond {
                        self.reference(HandlerKind::Guard, cond, events, state);
                    }
                    for nested in &branch.actions {
                        self.action(nested, events, state);
                    }
                }
            }
        }
    }

    fn finish(&mut self, kind: HandlerKind, options: &MachineOptions) -> HandlerTable {
        let lines: Vec<_> = std::mem::take(self.table_mut(kind))
            .into_iter()
            .map(|(name, usage)| HandlerLine {
                required: !options.provides(kind, &name),
                name,
                events: usage.events.into_iter().collect(),
                states: usage.states.into_iter().collect(),
            })
            .collect();
        HandlerTable {
            required: lines.iter().any(|line| line.required),
            lines,
        }
    }
}
