//! The state graph of one machine.
//!
//! Nodes live in a single arena owned by [`Machine`] and refer to each other
//! by [`NodeIdx`]. The arena is filled in definition (pre-)order, which is the
//! stable total ordering every traversal relies on.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::config::{Action, HistoryKind, Reference, StateConfig, StateKind, TransitionConfig};
use crate::error::GraphError;
use crate::options::MachineOptions;

/// Key of the root node when the configuration has no `id`.
pub const ROOT_KEY: &str = "(machine)";

/// Path and id delimiter.
pub const DELIMITER: char = '.';

/// Index of a node in its machine's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIdx(usize);

impl NodeIdx {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A delay of a delayed (`after`) transition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Delay {
    /// A literal number of milliseconds.
    Millis(u64),
    /// A reference into the `delays` options.
    Named(String),
}

impl Delay {
    /// Interprets an `after` key: numeric keys are literal delays.
    pub fn parse(key: &str) -> Self {
        match key.trim().parse::<u64>() {
            Ok(millis) => Self::Millis(millis),
            Err(_) => Self::Named(key.to_owned()),
        }
    }
}

impl fmt::Display for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Millis(millis) => write!(f, "{millis}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// What triggers a transition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventDescriptor {
    Named(String),
    /// Eventless (`always`) transition.
    Always,
    After { delay: Delay, state_id: String },
    /// Completion of a compound or parallel state.
    DoneState(String),
    DoneInvoke(String),
    ErrorInvoke(String),
}

impl EventDescriptor {
    /// The event type as seen by handlers.
    pub fn event_type(&self) -> String {
        match self {
            Self::Named(name) => name.clone(),
            Self::Always => String::new(),
            Self::After { delay, state_id } => format!("xstate.after({delay})#{state_id}"),
            Self::DoneState(id) => format!("done.state.{id}"),
            Self::DoneInvoke(id) => format!("done.invoke.{id}"),
            Self::ErrorInvoke(id) => format!("error.platform.{id}"),
        }
    }
}

/// A transition with resolved targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub event: EventDescriptor,
    pub cond: Option<Reference>,
    pub actions: Vec<Action>,
    /// Empty for targetless (internal self) transitions.
    pub targets: Vec<NodeIdx>,
    pub internal: bool,
}

/// An invoked service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub id: String,
    pub src: Reference,
    pub auto_forward: bool,
}

/// One node of the state tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateNode {
    pub id: String,
    pub key: String,
    pub path: Vec<String>,
    pub kind: StateKind,
    pub parent: Option<NodeIdx>,
    pub states: IndexMap<String, NodeIdx>,
    pub initial: Option<NodeIdx>,
    /// Whether `id` was written in the configuration rather than derived
    /// from the path.
    pub has_explicit_id: bool,
    pub transitions: Vec<Transition>,
    pub invoke: Vec<Invocation>,
    pub entry: Vec<Action>,
    pub exit: Vec<Action>,
    pub activities: Vec<Reference>,
    pub history: Option<HistoryKind>,
    /// Where a history state goes when its parent has no history yet.
    pub history_target: Option<NodeIdx>,
}

impl StateNode {
    /// The dot-joined path from the root; empty for the root.
    pub fn path_string(&self) -> String {
        self.path.join(".")
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// A constructed machine: its state tree and its default options.
#[derive(Debug, Clone)]
pub struct Machine {
    nodes: Vec<StateNode>,
    ids: HashMap<String, NodeIdx>,
    options: MachineOptions,
}

impl Machine {
    /// Builds the state graph of `config`, resolving every transition target.
    pub fn from_config(config: &StateConfig, options: MachineOptions) -> Result<Self, GraphError> {
        let root_key = config.id.clone().unwrap_or_else(|| ROOT_KEY.to_owned());
        let mut builder = GraphBuilder {
            root_key,
            nodes: Vec::new(),
            configs: Vec::new(),
            ids: HashMap::new(),
        };
        builder.allocate(config, Vec::new(), None)?;
        builder.resolve_transitions()?;

        Ok(Self {
            nodes: builder.nodes,
            ids: builder.ids,
            options,
        })
    }

    pub fn root(&self) -> NodeIdx {
        NodeIdx(0)
    }

    pub fn node(&self, idx: NodeIdx) -> &StateNode {
        &self.nodes[idx.0]
    }

    pub fn options(&self) -> &MachineOptions {
        &self.options
    }

    /// Number of state nodes, the root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in definition order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIdx, &StateNode)> {
        self.nodes.iter().enumerate().map(|(i, node)| (NodeIdx(i), node))
    }

    /// `from` and all of its descendants, in definition order.
    pub fn state_ids(&self, from: NodeIdx) -> Vec<NodeIdx> {
        let mut ids = Vec::new();
        let mut stack = vec![from];
        while let Some(idx) = stack.pop() {
            ids.push(idx);
            stack.extend(self.node(idx).states.values().rev());
        }
        ids
    }

    /// Looks a node up by its id, explicit or derived.
    pub fn node_by_id(&self, id: &str) -> Option<NodeIdx> {
        self.ids.get(id).copied()
    }

    /// Looks a node up by its path from the root.
    pub fn node_by_path<S: AsRef<str>>(&self, path: &[S]) -> Option<NodeIdx> {
        descend(&self.nodes, self.root(), path.iter().map(AsRef::as_ref))
    }

    /// The transition graph: one vertex per state (vertex `i` is
    /// `NodeIdx(i)`), one edge per transition target, labelled with the
    /// event type.
    pub fn transition_graph(&self) -> DiGraph<NodeIdx, String> {
        let mut graph = DiGraph::with_capacity(self.nodes.len(), self.nodes.len());
        for (idx, _) in self.nodes() {
            graph.add_node(idx);
        }
        for (idx, node) in self.nodes() {
            for transition in &node.transitions {
                let event = transition.event.event_type();
                for target in &transition.targets {
                    graph.add_edge(
                        NodeIndex::new(idx.0),
                        NodeIndex::new(target.0),
                        event.clone(),
                    );
                }
            }
        }
        graph
    }
}

fn descend<'k>(
    nodes: &[StateNode],
    from: NodeIdx,
    keys: impl IntoIterator<Item = &'k str>,
) -> Option<NodeIdx> {
    let mut current = from;
    for key in keys {
        // `''`, `'.'` and `'a..b'` name no state.
        if key.is_empty() {
            return None;
        }
        current = *nodes[current.0].states.get(key)?;
    }
    Some(current)
}

struct GraphBuilder<'a> {
    root_key: String,
    nodes: Vec<StateNode>,
    configs: Vec<&'a StateConfig>,
    ids: HashMap<String, NodeIdx>,
}

impl<'a> GraphBuilder<'a> {
    fn allocate(
        &mut self,
        config: &'a StateConfig,
        path: Vec<String>,
        parent: Option<NodeIdx>,
    ) -> Result<NodeIdx, GraphError> {
        let idx = NodeIdx(self.nodes.len());
        let kind = config.resolved_kind();
        let derived_id = std::iter::once(self.root_key.as_str())
            .chain(path.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(".");
        let id = config.id.clone().unwrap_or_else(|| derived_id.clone());

        if matches!(kind, StateKind::Final | StateKind::History) && !config.states.is_empty() {
            return Err(GraphError::UnexpectedChildren { state: id, kind });
        }
        if self.ids.insert(id.clone(), idx).is_some() {
            return Err(GraphError::DuplicateId(id));
        }
        // Derived ids stay addressable even when an explicit id is set.
        if config.id.is_some() {
            self.ids.entry(derived_id).or_insert(idx);
        }

        self.nodes.push(StateNode {
            id,
            key: path.last().cloned().unwrap_or_else(|| self.root_key.clone()),
            path: path.clone(),
            kind,
            parent,
            states: IndexMap::new(),
            initial: None,
            has_explicit_id: config.id.is_some(),
            transitions: Vec::new(),
            invoke: Vec::new(),
            entry: config.entry.clone(),
            exit: config.exit.clone(),
            activities: config.activities.clone(),
            history: match kind {
                StateKind::History => Some(config.history.unwrap_or_default()),
                _ => None,
            },
            history_target: None,
        });
        self.configs.push(config);

        for (key, child) in &config.states {
            let mut child_path = path.clone();
            child_path.push(key.clone());
            let child_idx = self.allocate(child, child_path, Some(idx))?;
            self.nodes[idx.0].states.insert(key.clone(), child_idx);
        }

        if kind == StateKind::Compound {
            let node = &self.nodes[idx.0];
            let initial = match &config.initial {
                Some(initial) => Some(*node.states.get(initial).ok_or_else(|| {
                    GraphError::UnknownInitial {
                        state: node.id.clone(),
                        initial: initial.clone(),
                    }
                })?),
                None => node.states.values().next().copied(),
            };
            self.nodes[idx.0].initial = initial;
        }

        Ok(idx)
    }

    fn resolve_transitions(&mut self) -> Result<(), GraphError> {
        for i in 0..self.nodes.len() {
            let idx = NodeIdx(i);
            let config = self.configs[i];
            let state_id = self.nodes[i].id.clone();
            let mut transitions = Vec::new();
            let mut invoke = Vec::new();

            for (event, configs) in &config.on {
                self.push_all(idx, EventDescriptor::Named(event.clone()), configs, &mut transitions)?;
            }
            self.push_all(idx, EventDescriptor::Always, &config.always, &mut transitions)?;
            for (delay, configs) in &config.after {
                let event = EventDescriptor::After {
                    delay: Delay::parse(delay),
                    state_id: state_id.clone(),
                };
                self.push_all(idx, event, configs, &mut transitions)?;
            }
            self.push_all(
                idx,
                EventDescriptor::DoneState(state_id.clone()),
                &config.on_done,
                &mut transitions,
            )?;

            for (position, invoke_config) in config.invoke.iter().enumerate() {
                let invocation_id = match (&invoke_config.id, &invoke_config.src) {
                    (Some(id), _) => id.clone(),
                    (None, Reference::Named(src)) => src.clone(),
                    (None, Reference::Inline) => format!("{state_id}:invocation[{position}]"),
                };
                self.push_all(
                    idx,
                    EventDescriptor::DoneInvoke(invocation_id.clone()),
                    &invoke_config.on_done,
                    &mut transitions,
                )?;
                self.push_all(
                    idx,
                    EventDescriptor::ErrorInvoke(invocation_id.clone()),
                    &invoke_config.on_error,
                    &mut transitions,
                )?;
                invoke.push(Invocation {
                    id: invocation_id,
                    src: invoke_config.src.clone(),
                    auto_forward: invoke_config.auto_forward,
                });
            }

            let history_target = match &config.target {
                Some(target) if self.nodes[i].kind == StateKind::History => Some(
                    self.resolve_target(idx, target)
                        .ok_or_else(|| GraphError::UnresolvedHistoryTarget {
                            state: state_id.clone(),
                            target: target.clone(),
                        })?,
                ),
                _ => None,
            };

            let node = &mut self.nodes[i];
            node.transitions = transitions;
            node.invoke = invoke;
            node.history_target = history_target;
        }
        Ok(())
    }

    fn push_all(
        &self,
        source: NodeIdx,
        event: EventDescriptor,
        configs: &[TransitionConfig],
        out: &mut Vec<Transition>,
    ) -> Result<(), GraphError> {
        for config in configs {
            let targets = config
                .targets
                .iter()
                .map(|target| {
                    self.resolve_target(source, target)
                        .ok_or_else(|| GraphError::UnresolvedTarget {
                            state: self.nodes[source.0].id.clone(),
                            event: event.event_type(),
                            target: target.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            // Targetless transitions and `.child` targets never exit the source.
            let internal = config.internal.unwrap_or_else(|| {
                targets.is_empty() || config.targets.iter().all(|t| t.starts_with(DELIMITER))
            });
            out.push(Transition {
                event: event.clone(),
                cond: config.cond.clone(),
                actions: config.actions.clone(),
                targets,
                internal,
            });
        }
        Ok(())
    }

    fn resolve_target(&self, source: NodeIdx, target: &str) -> Option<NodeIdx> {
        if let Some(reference) = target.strip_prefix('#') {
            if let Some(&idx) = self.ids.get(reference) {
                return Some(idx);
            }
            let mut segments = reference.split(DELIMITER);
            let head = *self.ids.get(segments.next()?)?;
            return descend(&self.nodes, head, segments);
        }
        if let Some(relative) = target.strip_prefix(DELIMITER) {
            return descend(&self.nodes, source, relative.split(DELIMITER));
        }
        let base = self.nodes[source.0].parent.unwrap_or(source);
        descend(&self.nodes, base, target.split(DELIMITER))
    }
}
