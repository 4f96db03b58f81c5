//! Extractor configuration.

use serde::{Deserialize, Serialize};

use crate::error::ExtractError;
use crate::extractor::Mode;

/// Where machines come from and how strictly their configurations are read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractorSettings {
    /// Whether unknown configuration keys are ignored or rejected.
    #[serde(default)]
    pub mode: Mode,

    /// Module the machine factories are imported from.
    #[serde(default = "default_import_source")]
    pub import_source: String,

    /// Exported names of the machine factories.
    #[serde(default = "default_factory_names")]
    pub factory_names: Vec<String>,

    /// Modules whose exports are recognised as built-in action creators.
    #[serde(default = "default_action_modules")]
    pub action_modules: Vec<String>,
}

fn default_import_source() -> String {
    "@xstate/compiled".to_owned()
}

fn default_factory_names() -> Vec<String> {
    vec!["Machine".to_owned(), "createMachine".to_owned()]
}

fn default_action_modules() -> Vec<String> {
    ["xstate", "@xstate/compiled", "xstate/lib/actions"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            import_source: default_import_source(),
            factory_names: default_factory_names(),
            action_modules: default_action_modules(),
        }
    }
}

impl ExtractorSettings {
    /// Reads settings from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ExtractError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn is_factory(&self, name: &str) -> bool {
        self.factory_names.iter().any(|factory| factory == name)
    }

    pub fn is_action_module(&self, module: &str) -> bool {
        self.action_modules.iter().any(|candidate| candidate == module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let settings = ExtractorSettings::from_json(r#"{ "mode": "strict", "importSource": "xstate" }"#).unwrap();
        assert_eq!(settings.mode, Mode::Strict);
        assert_eq!(settings.import_source, "xstate");
        assert!(settings.is_factory("createMachine"));
        assert!(settings.is_action_module("xstate/lib/actions"));
    }

    #[test]
    fn unknown_modes_are_rejected() {
        let err = ExtractorSettings::from_json(r#"{ "mode": "lenient" }"#).unwrap_err();
        assert!(matches!(err, ExtractError::Settings(_)));
    }
}
