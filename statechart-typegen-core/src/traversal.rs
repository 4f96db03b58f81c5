//! Target visibility rules over a machine's state tree.

use indexmap::IndexSet;

use crate::machine::{Machine, NodeIdx};

/// Walks parent links up to the root of the tree containing `node`.
pub fn get_root_node(machine: &Machine, node: NodeIdx) -> NodeIdx {
    let mut current = node;
    while let Some(parent) = machine.node(current).parent {
        current = parent;
    }
    current
}

/// The dot-joined paths of `node` and every node below it, in definition
/// order. The root has no path of its own and is skipped.
pub fn get_matches_states(machine: &Machine, node: NodeIdx) -> Vec<String> {
    machine
        .state_ids(node)
        .into_iter()
        .map(|idx| machine.node(idx))
        .filter(|state| !state.path.is_empty())
        .map(|state| state.path_string())
        .collect()
}

/// Every identifier a transition declared on `node` may target.
///
/// In order: the keys of the node's siblings (itself included), the
/// descendants of those siblings relative to the parent, the node's own
/// descendants with a leading `.`, then every state reachable through an
/// explicit `#id`. Strict ancestors are never listed.
pub fn get_transitions_from_node(machine: &Machine, node: NodeIdx) -> Vec<String> {
    let mut transitions = IndexSet::new();
    let state = machine.node(node);

    if let Some(parent_idx) = state.parent {
        let parent = machine.node(parent_idx);
        transitions.extend(parent.states.keys().cloned());

        let prefix = relative_prefix(&parent.path);
        for &sibling in parent.states.values() {
            let own_path = machine.node(sibling).path_string();
            for key in get_matches_states(machine, sibling) {
                if key == own_path {
                    continue;
                }
                transitions.insert(strip(&key, &prefix));
            }
        }
    }

    let prefix = relative_prefix(&state.path);
    for &child in state.states.values() {
        for key in get_matches_states(machine, child) {
            transitions.insert(format!(".{}", strip(&key, &prefix)));
        }
    }

    let root = get_root_node(machine, node);
    for id_node in machine.state_ids(root) {
        let id_state = machine.node(id_node);
        if !id_state.has_explicit_id {
            continue;
        }
        if id_node == root {
            for key in get_matches_states(machine, id_node) {
                transitions.insert(format!("#{}.{}", id_state.id, key));
            }
            continue;
        }
        let own_path = id_state.path_string();
        for key in get_matches_states(machine, id_node) {
            let rest = key.strip_prefix(&own_path).unwrap_or(&key);
            transitions.insert(format!("#{}{}", id_state.id, rest));
        }
    }

    if state.path.len() > 1 {
        transitions.shift_remove(&state.path_string());
    }

    transitions.into_iter().collect()
}

fn relative_prefix(path: &[String]) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!("{}.", path.join("."))
    }
}

fn strip(key: &str, prefix: &str) -> String {
    key.strip_prefix(prefix).unwrap_or(key).to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StateConfig;
    use crate::options::MachineOptions;

    fn build(config: StateConfig) -> Machine {
        Machine::from_config(&config, MachineOptions::new()).unwrap()
    }

    fn targets(machine: &Machine, path: &[&str]) -> Vec<String> {
        let node = machine.node_by_path(path).unwrap();
        get_transitions_from_node(machine, node)
    }

    fn leaf() -> StateConfig {
        StateConfig::new()
    }

    fn red_a_c() -> StateConfig {
        StateConfig::new().state("a", StateConfig::new().state("c", leaf()))
    }

    #[test]
    fn siblings_are_bare_identifiers() {
        let machine = build(
            StateConfig::new()
                .initial("red")
                .state("red", leaf())
                .state("yellow", leaf())
                .state("green", leaf()),
        );
        assert_eq!(targets(&machine, &["red"]), ["red", "yellow", "green"]);
    }

    #[test]
    fn root_targets_its_children_internally() {
        let machine = build(StateConfig::new().initial("red").state("red", leaf()).state("green", leaf()));
        assert_eq!(targets(&machine, &[]), [".red", ".green"]);
    }

    #[test]
    fn root_targets_include_nested_children() {
        let machine = build(
            StateConfig::new()
                .initial("red")
                .state("red", StateConfig::new().state("a", leaf()).state("b", leaf()))
                .state("green", leaf()),
        );
        assert_eq!(targets(&machine, &[]), [".red", ".red.a", ".red.b", ".green"]);
    }

    #[test]
    fn sibling_descendants_are_relative_to_the_parent() {
        let machine = build(
            StateConfig::new()
                .initial("red")
                .state("red", red_a_c().state("b", leaf()))
                .state("yellow", leaf())
                .state("green", leaf()),
        );
        assert_eq!(
            targets(&machine, &["yellow"]),
            ["red", "yellow", "green", "red.a", "red.a.c", "red.b"]
        );
    }

    #[test]
    fn explicit_ids_are_reachable_from_anywhere() {
        let machine = build(
            StateConfig::new()
                .initial("red")
                .state("red", red_a_c().state("b", leaf()))
                .state(
                    "yellow",
                    StateConfig::new().id("topLevelStateWithId").state(
                        "deep",
                        StateConfig::new().id("nestedStateWithId").state("nested", leaf()),
                    ),
                ),
        );
        assert_eq!(
            targets(&machine, &["red", "a", "c"]),
            [
                "c",
                "#topLevelStateWithId",
                "#topLevelStateWithId.deep",
                "#topLevelStateWithId.deep.nested",
                "#nestedStateWithId",
                "#nestedStateWithId.nested",
            ]
        );
    }

    #[test]
    fn ancestors_are_not_targets() {
        let machine = build(StateConfig::new().initial("red").state("red", red_a_c()));
        assert_eq!(targets(&machine, &["red", "a", "c"]), ["c"]);
    }

    #[test]
    fn root_id_exposes_the_whole_machine() {
        let machine = build(
            StateConfig::new()
                .id("superMachine")
                .initial("red")
                .state("red", red_a_c()),
        );
        assert_eq!(
            targets(&machine, &["red", "a", "c"]),
            ["c", "#superMachine.red", "#superMachine.red.a", "#superMachine.red.a.c"]
        );
    }

    #[test]
    fn nested_siblings_use_relative_paths() {
        let machine = build(
            StateConfig::new()
                .initial("red")
                .state("red", StateConfig::new().state("a", StateConfig::new().state("c", leaf()).state("d", leaf()))),
        );
        assert_eq!(targets(&machine, &["red", "a", "c"]), ["c", "d"]);
    }

    #[test]
    fn parent_path_is_not_repeated() {
        let machine = build(
            StateConfig::new().initial("red").state(
                "red",
                StateConfig::new()
                    .state("nested1", StateConfig::new().state("c", leaf()).state("d", leaf()))
                    .state("nested2", StateConfig::new().state("e", leaf()).state("f", leaf())),
            ),
        );
        assert_eq!(
            targets(&machine, &["red", "nested1"]),
            ["nested1", "nested2", "nested1.c", "nested1.d", "nested2.e", "nested2.f", ".c", ".d"]
        );
    }

    #[test]
    fn matches_skip_the_root() {
        let machine = build(
            StateConfig::new()
                .state("red", leaf())
                .state("green", StateConfig::new().state("gold", leaf())),
        );
        assert_eq!(get_matches_states(&machine, machine.root()), ["red", "green", "green.gold"]);
        let gold = machine.node_by_path(&["green", "gold"]).unwrap();
        assert_eq!(get_root_node(&machine, gold), machine.root());
    }
}
