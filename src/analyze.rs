use std::path::{Path, PathBuf};

use statechart_typegen_core::{GraphError, Introspection, Machine, introspect_machine};
use statechart_typegen_extract::{
    Dialect, ExtractError, ExtractedMachine, ExtractorSettings, extract_machines,
};
use thiserror::Error;
use tracing::debug;

/// Errors raised while analyzing a source file.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// The extracted configuration does not form a valid state tree.
    #[error("machine `{machine_id}` is not a valid state tree: {source}")]
    Graph {
        machine_id: String,
        #[source]
        source: GraphError,
    },

    #[error("failed to read `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One machine of a source file, from its definition to its introspection.
#[derive(Debug, Clone)]
pub struct MachineAnalysis {
    pub definition: ExtractedMachine,
    pub machine: Machine,
    pub introspection: Introspection,
}

impl MachineAnalysis {
    pub fn id(&self) -> &str {
        &self.definition.id
    }
}

/// Extracts and introspects every machine defined in `source`.
pub fn analyze_source(
    source: &str,
    dialect: Dialect,
    settings: &ExtractorSettings,
) -> Result<Vec<MachineAnalysis>, AnalyzeError> {
    extract_machines(source, dialect, settings)?
        .into_iter()
        .map(analyze_machine)
        .collect()
}

/// Reads `path` and analyzes it with the dialect its extension implies.
pub fn analyze_file(
    path: &Path,
    settings: &ExtractorSettings,
) -> Result<Vec<MachineAnalysis>, AnalyzeError> {
    let source = read_source(path)?;
    let machines = analyze_source(&source, Dialect::from_path(path), settings)?;
    debug!(path = %path.display(), machines = machines.len(), "analyzed file");
    Ok(machines)
}

pub(crate) fn read_source(path: &Path) -> Result<String, AnalyzeError> {
    std::fs::read_to_string(path).map_err(|source| AnalyzeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn analyze_machine(definition: ExtractedMachine) -> Result<MachineAnalysis, AnalyzeError> {
    let machine = Machine::from_config(&definition.config, definition.options.clone()).map_err(
        |source| AnalyzeError::Graph {
            machine_id: definition.id.clone(),
            source,
        },
    )?;
    let introspection = introspect_machine(&machine, definition.id.as_str());
    debug!(
        machine = %definition.id,
        line = definition.line,
        states = machine.len(),
        required_actions = introspection.actions.required,
        "introspected machine"
    );
    Ok(MachineAnalysis {
        definition,
        machine,
        introspection,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"
import { Machine } from '@xstate/compiled';

export const light = Machine<Context, Event, 'light'>({
  initial: 'red',
  states: {
    red: { on: { GO: 'green' } },
    green: { entry: 'celebrate' },
  },
});
"#;

    #[test]
    fn analyzes_every_machine() {
        let analyses = analyze_source(SOURCE, Dialect::TypeScript, &ExtractorSettings::default()).unwrap();
        assert_eq!(analyses.len(), 1);
        assert_eq!(analyses[0].id(), "light");
        assert_eq!(analyses[0].introspection.state_matches, ["red", "green"]);
        assert!(analyses[0].introspection.actions.required);
    }

    #[test]
    fn invalid_trees_name_their_machine() {
        let source = r#"
import { Machine } from '@xstate/compiled';
const m = Machine<C, E, 'broken'>({ initial: 'missing', states: { a: {} } });
"#;
        let err = analyze_source(source, Dialect::TypeScript, &ExtractorSettings::default()).unwrap_err();
        assert!(matches!(
            err,
            AnalyzeError::Graph { ref machine_id, source: GraphError::UnknownInitial { .. } } if machine_id == "broken"
        ));
    }

    #[test]
    fn missing_files_report_their_path() {
        let err = analyze_file(Path::new("does/not/exist.ts"), &ExtractorSettings::default()).unwrap_err();
        assert!(matches!(err, AnalyzeError::Io { .. }));
        assert!(err.to_string().contains("does/not/exist.ts"));
    }
}
