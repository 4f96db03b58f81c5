//! Static extraction of statechart configurations from TypeScript sources.
//!
//! Machines are found by looking for calls to a factory imported from the
//! configured module, with the machine id as the third type argument:
//!
//! ```rust
//! use statechart_typegen_extract::{Dialect, ExtractorSettings, extract_machines};
//!
//! let source = r#"
//!     import { Machine } from '@xstate/compiled';
//!
//!     const light = Machine<Context, Event, 'light'>({
//!       initial: 'red',
//!       states: {
//!         red: { on: { GO: 'green' } },
//!         green: { entry: 'celebrate' },
//!       },
//!     });
//! "#;
//!
//! let machines = extract_machines(source, Dialect::TypeScript, &ExtractorSettings::default()).unwrap();
//! assert_eq!(machines[0].id, "light");
//! assert_eq!(machines[0].config.states.len(), 2);
//! ```
//!
//! Only literal configurations are understood. Identifiers are followed
//! through module-level `const` bindings; anything that would need the code
//! to run (computed keys, spreads, arbitrary calls) makes extraction fail
//! with the construct that blocked it.

mod error;
mod extractor;
mod lower;
mod schema;
mod settings;
mod source;
mod syntax;

pub use crate::error::ExtractError;
pub use crate::extractor::{Blocker, Context, Extracted, Mode, Value, find_blocker};
pub use crate::lower::{ShapeError, lower_config, lower_options};
pub use crate::schema::{extract_config, extract_options};
pub use crate::settings::ExtractorSettings;
pub use crate::source::{Binding, ImportedName, MachineCall, Scope, SourceFile};
pub use crate::syntax::{Dialect, Expr, Property, PropertyKey};

use statechart_typegen_core::{MachineOptions, StateConfig};

/// A machine definition recovered from a source file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedMachine {
    pub id: String,
    /// 1-based line of the factory call.
    pub line: usize,
    pub config: StateConfig,
    pub options: MachineOptions,
    /// The configuration as a plain value, before lowering.
    pub raw_config: Value,
    pub raw_options: Option<Value>,
}

/// Extracts every machine defined in `source`, in source order.
///
/// The first machine that cannot be extracted aborts the whole file.
pub fn extract_machines(
    source: &str,
    dialect: Dialect,
    settings: &ExtractorSettings,
) -> Result<Vec<ExtractedMachine>, ExtractError> {
    let file = SourceFile::parse(source, dialect)?;
    let cx = Context::new(file.scope(), settings);

    file.machine_calls(settings)?
        .into_iter()
        .map(|call| extract_machine(call, &cx))
        .collect()
}

fn extract_machine(call: MachineCall, cx: &Context<'_>) -> Result<ExtractedMachine, ExtractError> {
    let MachineCall {
        machine_id,
        config,
        options,
        line,
        ..
    } = call;

    let Some(raw_config) = extract_config(&config, cx).into_value() else {
        return Err(ExtractError::UnsupportedConfig {
            reason: unsupported_reason(&config, cx, false),
            machine_id,
            line,
        });
    };

    let raw_options = match extract_options(options.as_ref(), cx) {
        Extracted::Failed => {
            let reason = options
                .as_ref()
                .map(|options| unsupported_reason(options, cx, true))
                .unwrap_or_else(|| NO_MATCHING_SHAPE.to_owned());
            return Err(ExtractError::UnsupportedOptions {
                machine_id,
                line,
                reason,
            });
        }
        extracted => extracted.into_value(),
    };

    let shape_error = |err: ShapeError| ExtractError::Shape {
        machine_id: machine_id.clone(),
        path: err.path,
        expected: err.expected,
    };
    let config = lower_config(&raw_config).map_err(shape_error)?;
    let options = match &raw_options {
        Some(raw) => lower_options(raw).map_err(shape_error)?,
        None => MachineOptions::new(),
    };

    Ok(ExtractedMachine {
        id: machine_id,
        line,
        config,
        options,
        raw_config,
        raw_options,
    })
}

const NO_MATCHING_SHAPE: &str = "does not match any supported configuration shape";

fn unsupported_reason(expr: &Expr, cx: &Context<'_>, references_allowed: bool) -> String {
    match find_blocker(expr, cx, references_allowed) {
        Some(blocker) => blocker.to_string(),
        None => NO_MATCHING_SHAPE.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use statechart_typegen_core::{Action, HandlerKind, StateKind, TransitionConfig};

    use super::*;

    fn extract(source: &str) -> Result<Vec<ExtractedMachine>, ExtractError> {
        extract_machines(source, Dialect::TypeScript, &ExtractorSettings::default())
    }

    #[test]
    fn extracts_config_and_options() {
        let machines = extract(
            r#"
            import { Machine } from '@xstate/compiled';

            const lightMachine = Machine<Context, Event, 'lightMachine'>(
              {
                initial: 'red',
                states: {
                  red: { on: { GO: { target: 'green', actions: ['action2'] } } },
                  green: { type: 'final' },
                },
              },
              { actions: { action2: () => {} } },
            );
            "#,
        )
        .unwrap();

        assert_eq!(machines.len(), 1);
        let machine = &machines[0];
        assert_eq!(machine.id, "lightMachine");
        assert_eq!(machine.line, 4);
        assert_eq!(machine.config.initial.as_deref(), Some("red"));
        assert_eq!(
            machine.config.states["red"].on["GO"],
            vec![TransitionConfig::to("green").action(Action::named("action2"))]
        );
        assert_eq!(machine.config.states["green"].kind, Some(StateKind::Final));
        assert!(machine.options.provides(HandlerKind::Action, "action2"));
        assert!(machine.raw_options.is_some());
    }

    #[test]
    fn identifiers_are_followed_to_their_literals() {
        let machines = extract(
            r#"
            import { createMachine } from '@xstate/compiled';

            const states = { idle: { on: { FETCH: 'loading' } }, loading: {} } as const;
            const config = { initial: 'idle', states };

            export const fetcher = createMachine<Ctx, Ev, 'fetcher'>(config);
            "#,
        )
        .unwrap();
        assert_eq!(machines[0].config.states["idle"].on["FETCH"], vec![TransitionConfig::to("loading")]);
        assert_eq!(machines[0].raw_options, None);
    }

    #[test]
    fn computed_keys_fail_extraction() {
        let err = extract(
            r#"
            import { Machine } from '@xstate/compiled';

            const key = 'red';
            const machine = Machine<C, E, 'dynamic'>({
              initial: 'red',
              states: { [key]: {} },
            });
            "#,
        )
        .unwrap_err();

        let ExtractError::UnsupportedConfig { machine_id, reason, .. } = err else {
            panic!("expected an unsupported configuration, got {err:?}");
        };
        assert_eq!(machine_id, "dynamic");
        assert!(reason.contains("states"), "{reason}");
    }

    #[test]
    fn self_referencing_configs_fail_closed() {
        let err = extract(
            r#"
            import { Machine } from '@xstate/compiled';

            var config = { initial: 'a', states: { a: config } };
            Machine<C, E, 'm'>(config);
            "#,
        )
        .unwrap_err();

        let ExtractError::UnsupportedConfig { machine_id, line, reason } = err else {
            panic!("expected an unsupported configuration, got {err:?}");
        };
        assert_eq!(machine_id, "m");
        assert_eq!(line, 5);
        assert!(reason.starts_with("nesting deeper than 64 levels at `states.a.states.a"), "{reason}");
    }

    #[test]
    fn unresolvable_option_references_are_accepted() {
        let machines = extract(
            r#"
            import { Machine } from '@xstate/compiled';
            import { notify } from './handlers';

            const machine = Machine<C, E, 'm'>(
              { entry: 'notify' },
              { actions: { notify } },
            );
            "#,
        )
        .unwrap();
        assert!(machines[0].options.provides(HandlerKind::Action, "notify"));
    }

    #[test]
    fn each_machine_in_a_file_is_extracted_in_order() {
        let machines = extract(
            r#"
            import { Machine } from '@xstate/compiled';
            const a = Machine<C, E, 'first'>({});
            const b = Machine<C, E, 'second'>({});
            "#,
        )
        .unwrap();
        let ids: Vec<_> = machines.iter().map(|machine| machine.id.as_str()).collect();
        assert_eq!(ids, ["first", "second"]);
    }
}
