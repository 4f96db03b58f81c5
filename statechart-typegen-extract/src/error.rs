use thiserror::Error;

/// Errors raised while extracting machine definitions from a source file.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The TypeScript grammar could not be loaded into the parser.
    #[error("failed to load the TypeScript grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    /// The parser gave up without producing a syntax tree.
    #[error("failed to parse source")]
    Parse,

    /// Extractor settings could not be read.
    #[error("invalid extractor settings: {0}")]
    Settings(#[from] serde_json::Error),

    /// Factories were imported through a namespace, so calls to them
    /// cannot be told apart from other members of the module.
    #[error("`import * as {alias} from '{module}'` is not supported, import the machine factory by name")]
    NamespaceImport { alias: String, module: String },

    /// An imported factory is used other than by calling it directly.
    #[error("`{name}` on line {line} can only be called")]
    FactoryNotCalled { name: String, line: usize },

    /// A factory call lacks a string literal machine id.
    #[error(
        "machine on line {line} has no id: pass a string literal as the third type argument, e.g. \
         `const machine = {callee}<Context, Event, 'aUniqueIdForYourMachine'>({{}})`"
    )]
    MissingMachineId { callee: String, line: usize },

    /// A factory call has no configuration argument.
    #[error("machine `{machine_id}` on line {line} is called without a configuration")]
    MissingConfig { machine_id: String, line: usize },

    /// The configuration cannot be extracted statically.
    #[error("could not statically extract the configuration of machine `{machine_id}` on line {line}: {reason}")]
    UnsupportedConfig {
        machine_id: String,
        line: usize,
        reason: String,
    },

    /// The default options cannot be extracted statically.
    #[error("could not statically extract the options of machine `{machine_id}` on line {line}: {reason}")]
    UnsupportedOptions {
        machine_id: String,
        line: usize,
        reason: String,
    },

    /// An extracted value does not have the shape its position requires.
    #[error("machine `{machine_id}`: expected {expected} at `{path}`")]
    Shape {
        machine_id: String,
        path: String,
        expected: &'static str,
    },
}
