//! # statechart-typegen
//!
//! Static introspection of statechart configurations written in TypeScript,
//! producing everything needed to generate precise type declarations for
//! them: the states a machine can match, the targets and sources of each
//! state, and which actions, guards, services, activities and delays must
//! be implemented by the caller.
//!
//! ## Example
//!
//! ```rust
//! use statechart_typegen::{Dialect, ExtractorSettings, analyze_source};
//!
//! let source = r#"
//!     import { Machine } from '@xstate/compiled';
//!
//!     export const light = Machine<Context, Event, 'light'>({
//!       initial: 'red',
//!       states: {
//!         red: { on: { GO: { target: 'green', actions: 'logGo' } } },
//!         green: {},
//!       },
//!     });
//! "#;
//!
//! let analyses = analyze_source(source, Dialect::TypeScript, &ExtractorSettings::default()).unwrap();
//! let light = &analyses[0].introspection;
//!
//! assert_eq!(light.state_matches, ["red", "green"]);
//! assert_eq!(light.actions.line("logGo").unwrap().events, ["GO"]);
//! ```
//!
//! Files analyzed repeatedly, e.g. on every save, can go through an
//! [`ExtractionCache`].

mod analyze;
mod cache;

pub use crate::analyze::{AnalyzeError, MachineAnalysis, analyze_file, analyze_source};
pub use crate::cache::ExtractionCache;

#[doc(inline)]
pub use statechart_typegen_core::*;
#[doc(inline)]
pub use statechart_typegen_extract::{
    Dialect, ExtractError, ExtractedMachine, ExtractorSettings, Mode, Value, extract_machines,
};

/// Lower-level access to the extractor.
pub mod extract {
    pub use statechart_typegen_extract::*;
}
