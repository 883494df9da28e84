//! Extraction pipeline: locate, collect, analyze, assemble.

use std::collections::HashSet;

use serde::Serialize;

use crate::collector::Collector;
use crate::di::{DiAnalyzer, binding_references};
use crate::errors::ExtractError;
use crate::interfaces::{InterfaceAnalyzer, relationship_references};
use crate::locator;
use crate::model::ProgramModel;
use crate::program::{GoProgram, LoadOptions};
use crate::types::{Extract, Options, Reference, Symbol, Target};

/// Summary numbers about one extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub module: String,
    pub depth: usize,
    /// Target plus traversal references.
    pub total_symbols: usize,
    /// Lines of code across the target and every full reference.
    pub total_lines: usize,
}

/// An [`Extract`] plus its [`Metadata`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub extract: Extract,
    pub metadata: Metadata,
}

/// Load the module at `target.root` and extract from it.
pub fn run(target: &Target, options: &Options, load: &LoadOptions) -> Result<Report, ExtractError> {
    let program = GoProgram::load(&target.root, load)?;
    let target = Target {
        root: program.root().to_path_buf(),
        ..target.clone()
    };
    extract(&program, &target, options)
}

/// Run the whole pipeline against an already loaded model.
pub fn extract(model: &dyn ProgramModel, target: &Target, options: &Options) -> Result<Report, ExtractError> {
    let file = target.absolute_file();
    let symbol = locator::locate(model, &file, target.line, target.column)?;
    let collected = Collector::new(model, options).collect(&symbol)?;
    let symbols = symbol_set(&symbol, &collected.references);

    let di = DiAnalyzer::new(model);
    let framework = di.detect_framework();
    let mut mappings = InterfaceAnalyzer::new(model, options).analyze(&symbols);
    for mapping in &mut mappings {
        if let Some(ctor) = &mapping.constructor {
            mapping.framework = Some(di.package_framework(&ctor.package));
        }
    }
    let bindings = di.analyze(framework, &symbols);

    let metadata = Metadata {
        module: model.module_path().to_string(),
        depth: options.depth,
        total_symbols: collected.references.len() + 1,
        total_lines: symbol.line_count()
            + collected
                .references
                .iter()
                .filter(|r| !r.stub)
                .map(|r| r.symbol.line_count())
                .sum::<usize>(),
    };

    // Relationships are surfaced one level past the traversal budget.
    let relationship_depth = options.depth + 1;
    let mut references = collected.references;
    references.extend(relationship_references(&mappings, relationship_depth));
    references.extend(binding_references(&bindings, relationship_depth));

    tracing::info!(
        target = %symbol.qualified_name(),
        references = references.len(),
        external = collected.external.len(),
        interfaces = mappings.len(),
        bindings = bindings.len(),
        framework = %framework,
        "extracted"
    );

    Ok(Report {
        extract: Extract {
            target: symbol,
            references,
            external: collected.external,
            interface_mappings: mappings,
            di_bindings: bindings,
            framework,
        },
        metadata,
    })
}

/// Target plus every referenced symbol, deduplicated by visited key.
fn symbol_set(target: &Symbol, references: &[Reference]) -> Vec<Symbol> {
    let mut seen = HashSet::from([target.key()]);
    let mut symbols = vec![target.clone()];
    for r in references {
        if seen.insert(r.symbol.key()) {
            symbols.push(r.symbol.clone());
        }
    }
    symbols
}
