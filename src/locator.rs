//! Symbol locator: source position -> enclosing declaration.

use std::path::Path;

use crate::errors::ExtractError;
use crate::model::{DeclId, ProgramModel};
use crate::types::Symbol;

/// Find the declaration enclosing a 1-based `line` (and optional 1-based
/// `column`) in `file`.
///
/// When several declarations share the line, the column picks the one
/// whose span contains it (innermost first); without a column, or when the
/// column falls outside every span, the first one in source order wins.
pub fn declaration_at(
    model: &dyn ProgramModel,
    file: &Path,
    line: usize,
    column: Option<usize>,
) -> Result<DeclId, ExtractError> {
    let text = model.file_text(file)?;
    let offset = offset_of(text, line, column)?;

    let candidates: Vec<DeclId> = model
        .file_declarations(file)?
        .into_iter()
        .filter(|id| {
            let d = model.declaration(*id);
            d.line <= line && line <= d.end_line
        })
        .collect();

    let not_found = || ExtractError::SymbolNotFound {
        file: file.to_path_buf(),
        line,
        column: column.unwrap_or(1),
    };
    let first = *candidates.first().ok_or_else(not_found)?;

    let Some(offset) = offset else {
        return Ok(first);
    };
    let innermost = candidates
        .iter()
        .copied()
        .filter(|id| model.declaration(*id).contains_offset(offset))
        .min_by_key(|id| {
            let d = model.declaration(*id);
            d.end_byte - d.start_byte
        });
    Ok(innermost.unwrap_or(first))
}

/// Byte offset of a position, validating both coordinates.  `None` when
/// no column was given.
fn offset_of(text: &str, line: usize, column: Option<usize>) -> Result<Option<usize>, ExtractError> {
    let invalid = || ExtractError::InvalidPosition {
        line,
        column: column.unwrap_or(0),
    };
    if line == 0 {
        return Err(invalid());
    }
    let mut start = 0usize;
    let mut current = None;
    for (i, l) in text.split_inclusive('\n').enumerate() {
        if i + 1 == line {
            current = Some(l.trim_end_matches(['\n', '\r']));
            break;
        }
        start += l.len();
    }
    let line_text = current.ok_or_else(invalid)?;
    match column {
        None => Ok(None),
        Some(col) if col >= 1 && col <= line_text.len() + 1 => Ok(Some(start + col - 1)),
        Some(_) => Err(invalid()),
    }
}

/// Materialize a declaration as a portable [`Symbol`].
pub fn materialize(model: &dyn ProgramModel, id: DeclId) -> Symbol {
    let d = model.declaration(id);
    Symbol {
        package: d.package.clone(),
        name: d.name.clone(),
        kind: d.kind,
        receiver: d.receiver.clone(),
        file: d.file.display().to_string(),
        line: d.line,
        end_line: d.end_line,
        column: d.column,
        code: model.source_text(id).to_string(),
        doc: d.doc.clone(),
        exported: d.exported,
        interface_type: None,
        implementation: None,
    }
}

/// Locate and materialize the symbol at a position.
pub fn locate(
    model: &dyn ProgramModel,
    file: &Path,
    line: usize,
    column: Option<usize>,
) -> Result<Symbol, ExtractError> {
    let id = declaration_at(model, file, line, column)?;
    let symbol = materialize(model, id);
    tracing::debug!(
        symbol = %symbol.qualified_name(),
        kind = %symbol.kind,
        line,
        "located declaration"
    );
    Ok(symbol)
}
