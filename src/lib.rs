//! Extract a Go declaration together with the declarations it depends on.
//!
//! The pipeline is locate -> collect -> analyze -> assemble:
//! [`locator`] maps a source position to a declaration, [`collector`]
//! walks its dependency closure breadth-first, [`interfaces`] and [`di`]
//! add interface and wiring relationships, and [`extract`] assembles a
//! [`extract::Report`] for the renderers in [`output`].  All of it runs
//! against the [`model::ProgramModel`] trait; [`program::GoProgram`] is the
//! tree-sitter implementation for Go modules.

pub mod cli;
pub mod collector;
pub mod config;
pub mod di;
pub mod errors;
pub mod extract;
pub mod indexer;
pub mod interfaces;
pub mod locator;
pub mod model;
pub mod output;
pub mod program;
mod resolve;
pub mod router;
pub mod types;
pub mod typesys;
pub mod walker;

#[cfg(test)]
mod testutil;

pub use errors::{ExtractError, ScopeError};
pub use extract::{Metadata, Report, extract, run};
pub use model::ProgramModel;
pub use program::{GoProgram, LoadOptions};
pub use types::{Extract, Options, Reference, ReferenceReason, Symbol, SymbolKind, Target};
