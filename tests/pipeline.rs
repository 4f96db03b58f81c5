use statechart_typegen::{
    AnalyzeError, Dialect, ExtractError, ExtractorSettings, HandlerTable, HistoryKind, Introspection,
    analyze_file, analyze_source,
};

fn introspect(source: &str) -> Introspection {
    let mut analyses = analyze_source(source, Dialect::TypeScript, &ExtractorSettings::default()).unwrap();
    assert_eq!(analyses.len(), 1);
    analyses.remove(0).introspection
}

fn names(table: &HandlerTable) -> Vec<&str> {
    table.names().collect()
}

#[test]
fn invoked_services_feed_done_and_error_events() {
    let result = introspect(include_str!("fixtures/fetch.machine.ts"));
    assert_eq!(result.id, "fetchMachine");
    assert_eq!(result.state_matches, ["idle", "pending", "success", "failure"]);

    let service = result.services.line("makeFetch").unwrap();
    assert!(service.required);
    assert_eq!(service.events, ["MAKE_FETCH", "RETRY"]);
    assert_eq!(service.states, ["pending"]);

    let celebrate = result.actions.line("celebrate").unwrap();
    assert_eq!(celebrate.events, ["done.invoke.makeFetch"]);

    let guard = result.guards.line("canRetry").unwrap();
    assert_eq!(guard.events, ["RETRY"]);

    assert_eq!(result.sub_state.states["failure"].sources, ["error.platform.makeFetch"]);
}

#[test]
fn default_options_make_handlers_optional() {
    let result = introspect(include_str!("fixtures/options.machine.ts"));
    for table in [&result.actions, &result.guards, &result.services, &result.activities] {
        assert!(!table.required);
        assert_eq!(table.lines.len(), 1);
        assert!(table.lines.iter().all(|line| !line.required));
    }
    assert_eq!(
        result.guards.line("isComplete").unwrap().events,
        ["done.invoke.loadSettings"]
    );
}

#[test]
fn choose_branches_contribute_guards_and_actions() {
    let result = introspect(include_str!("fixtures/choose.machine.ts"));
    assert_eq!(names(&result.guards), ["isValid", "isDraft", "isDirty"]);
    assert_eq!(names(&result.actions), ["save", "notify", "reject", "discard"]);

    assert!(!result.guards.line("isValid").unwrap().required);
    assert!(result.guards.line("isDirty").unwrap().required);
    assert!(result.actions.line("discard").unwrap().required);
    assert_eq!(result.actions.line("reject").unwrap().events, ["SUBMIT"]);
}

#[test]
fn identifiers_assertions_and_inline_functions() {
    let result = introspect(include_str!("fixtures/references.machine.ts"));
    assert_eq!(result.id, "referencesMachine");
    // `logEntry` is an implementation, not a name.
    assert_eq!(names(&result.actions), ["celebrate"]);
    assert_eq!(result.actions.line("celebrate").unwrap().events, ["done.invoke.makeFetch"]);
    assert_eq!(result.sub_state.states["success"].sources, ["done.invoke.makeFetch"]);
}

#[test]
fn root_transitions_target_children() {
    let result = introspect(include_str!("fixtures/rootTargets.machine.ts"));
    assert_eq!(result.sub_state.targets, [".red", ".green"]);
    assert_eq!(result.sub_state.states["green"].sources, ["EVENT", "EVENT2"]);
    assert!(result.sub_state.states["red"].sources.is_empty());
}

#[test]
fn parallel_timers_with_delays_history_and_eventless_transitions() {
    let source = include_str!("fixtures/timer.machine.ts");
    let mut analyses = analyze_source(source, Dialect::TypeScript, &ExtractorSettings::default()).unwrap();
    let analysis = analyses.remove(0);
    let result = &analysis.introspection;

    assert_eq!(
        result.state_matches,
        [
            "clock",
            "clock.idle",
            "clock.running",
            "clock.paused",
            "clock.resume",
            "clock.expired",
            "display",
            "display.visible",
            "display.hidden",
        ]
    );

    let tick_interval = result.delays.line("TICK_INTERVAL").unwrap();
    assert!(!tick_interval.required);
    assert_eq!(
        tick_interval.events,
        ["START", "xstate.after(TICK_INTERVAL)#timer.clock.running"]
    );
    assert_eq!(tick_interval.states, ["clock.running"]);
    assert_eq!(names(&result.delays), ["TICK_INTERVAL"]);

    let clock = &result.sub_state.states["clock"];
    assert_eq!(clock.states["expired"].sources, ["xstate.after(5000)#timer.clock.running"]);
    assert_eq!(clock.states["idle"].sources, [""]);
    assert_eq!(clock.states["resume"].sources, ["RESUME"]);
    assert_eq!(result.sub_state.states["display"].states["visible"].sources, [""]);

    assert_eq!(
        result.actions.line("tick").unwrap().events,
        ["xstate.after(TICK_INTERVAL)#timer.clock.running"]
    );
    let restart = result.guards.line("shouldRestart").unwrap();
    assert!(restart.required);
    assert!(restart.events.is_empty());

    let machine = &analysis.machine;
    let resume = machine.node(machine.node_by_path(&["clock", "resume"]).unwrap());
    assert_eq!(resume.history, Some(HistoryKind::Shallow));
    assert_eq!(resume.history_target, machine.node_by_path(&["clock", "running"]));
}

#[test]
fn self_referencing_configs_are_reported() {
    let source = "import { Machine } from '@xstate/compiled';\n\
                  var config = { initial: 'a', states: { a: config } };\n\
                  Machine<C, E, 'm'>(config);\n";
    let err = analyze_source(source, Dialect::TypeScript, &ExtractorSettings::default()).unwrap_err();
    assert!(
        matches!(err, AnalyzeError::Extract(ExtractError::UnsupportedConfig { line: 3, .. })),
        "{err}"
    );
}

#[test]
fn template_literal_escapes_name_states() {
    let result = introspect(
        r#"
import { Machine } from '@xstate/compiled';
export const m = Machine<C, E, 'escaped'>({ initial: `\x61`, states: { a: { on: { GO: `\u0062` } }, b: {} } });
"#,
    );
    assert_eq!(result.sub_state.states["b"].sources, ["GO"]);
}

#[test]
fn computed_keys_are_reported_not_skipped() {
    let source = r#"
import { Machine } from '@xstate/compiled';

const name = 'idle';
export const machine = Machine<{}, { type: 'GO' }, 'computed'>({
  initial: 'idle',
  states: {
    [name]: { on: { GO: 'done' } },
    done: {},
  },
});
"#;
    let err = analyze_source(source, Dialect::TypeScript, &ExtractorSettings::default()).unwrap_err();
    match err {
        AnalyzeError::Extract(ExtractError::UnsupportedConfig { machine_id, line, reason }) => {
            assert_eq!(machine_id, "computed");
            assert_eq!(line, 5);
            assert!(reason.contains("computed property key"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn machines_without_an_id_explain_the_fix() {
    let source = r#"
import { createMachine } from '@xstate/compiled';
export const machine = createMachine({ initial: 'a', states: { a: {} } });
"#;
    let err = analyze_source(source, Dialect::TypeScript, &ExtractorSettings::default()).unwrap_err();
    assert!(matches!(err, AnalyzeError::Extract(ExtractError::MissingMachineId { line: 3, .. })));
    assert!(
        err.to_string()
            .contains("createMachine<Context, Event, 'aUniqueIdForYourMachine'>({})")
    );
}

#[test]
fn tsx_files_are_parsed_with_jsx() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Toggle.tsx");
    std::fs::write(
        &path,
        r#"
import { Machine } from '@xstate/compiled';

export const toggle = Machine<Context, Event, 'toggle'>({
  initial: 'inactive',
  states: {
    inactive: { on: { TOGGLE: 'active' } },
    active: { on: { TOGGLE: 'inactive' }, entry: 'flash' },
  },
});

export const Toggle = () => <button>toggle</button>;
"#,
    )
    .unwrap();

    let analyses = analyze_file(&path, &ExtractorSettings::default()).unwrap();
    assert_eq!(analyses[0].introspection.actions.line("flash").unwrap().events, ["TOGGLE"]);
}

#[test]
fn introspection_serializes_in_camel_case() {
    let result = introspect(include_str!("fixtures/rootTargets.machine.ts"));
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["stateMatches"], serde_json::json!(["red", "green"]));
    assert_eq!(json["subState"]["states"]["green"]["sources"], serde_json::json!(["EVENT", "EVENT2"]));
    assert_eq!(json["actions"]["required"], serde_json::json!(false));
}
