//! Output formatting: Markdown (default), JSON and TOON.
//!
//! All result data flows through a [`Formatter`] which writes to an
//! arbitrary [`std::io::Write`] destination (typically stdout or the
//! `--output` file).  Hints and errors always go to stderr via
//! [`print_hint`] and [`print_error`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::{self, Write as _};
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::errors::ScopeError;
use crate::extract::{Metadata, Report};
use crate::types::{
    DiBinding, Framework, InterfaceMapping, Reference, ReferenceReason, Symbol, SymbolKind,
};

// ---------------------------------------------------------------------------
// Formats
// ---------------------------------------------------------------------------

/// Rendering of an extraction report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Format {
    /// Human-readable review document.
    #[default]
    Markdown,
    /// Visualization document (nodes and edges).
    Json,
    /// The visualization document in TOON.
    Toon,
}

#[derive(Debug, Error)]
#[error("unknown output format `{0}` (expected markdown, json or toon)")]
pub struct UnknownFormat(String);

impl FromStr for Format {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(Format::Markdown),
            "json" => Ok(Format::Json),
            "toon" => Ok(Format::Toon),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Format::Markdown => "markdown",
            Format::Json => "json",
            Format::Toon => "toon",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Serializable output types
// ---------------------------------------------------------------------------

/// A located declaration, as printed by `locate`.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolOutput {
    pub name: String,
    pub kind: SymbolKind,
    pub package: String,
    pub file: String,
    pub line: usize,
    pub end_line: usize,
    pub col: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub doc: String,
}

impl From<&Symbol> for SymbolOutput {
    fn from(s: &Symbol) -> Self {
        Self {
            name: s.name.clone(),
            kind: s.kind,
            package: s.package.clone(),
            file: s.file.clone(),
            line: s.line,
            end_line: s.end_line,
            col: s.column,
            receiver: s.receiver.clone(),
            doc: s.doc.clone(),
        }
    }
}

/// Visualization document: the target, deduplicated nodes and typed edges.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document<'a> {
    pub target: Node<'a>,
    pub nodes: Vec<Node<'a>>,
    pub edges: Vec<Edge>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub external: &'a [String],
    pub total_layers: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub interface_mappings: Vec<MappingNode<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub di_bindings: Vec<BindingNode<'a>>,
    #[serde(rename = "detectedDIFramework")]
    pub detected_di_framework: Framework,
    pub metadata: &'a Metadata,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Node<'a> {
    pub id: String,
    pub name: &'a str,
    pub kind: SymbolKind,
    pub package: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub file: &'a str,
    pub line: usize,
    pub end_line: usize,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub code: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub doc: &'a str,
    pub exported: bool,
    pub depth: usize,
    pub is_target: bool,
    pub external: bool,
    pub stub: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementation: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub reason: ReferenceReason,
    pub depth: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingNode<'a> {
    pub interface: Node<'a>,
    pub implementations: Vec<Node<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constructor: Option<Node<'a>>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "diFramework")]
    pub framework: Option<Framework>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingNode<'a> {
    pub provider: Node<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<Node<'a>>,
    pub dependencies: Vec<Node<'a>>,
    pub framework: Framework,
    pub scope: &'a str,
}

/// Node id: qualified name, with the receiver base for methods.
fn node_id(s: &Symbol) -> String {
    match &s.receiver {
        Some(recv) => {
            let base = recv.trim_start_matches('*');
            let base = base.split('[').next().unwrap_or(base);
            format!("{}.{}.{}", s.package, base, s.name)
        }
        None => s.qualified_name(),
    }
}

fn node(s: &Symbol, depth: usize) -> Node<'_> {
    Node {
        id: node_id(s),
        name: &s.name,
        kind: s.kind,
        package: &s.package,
        file: &s.file,
        line: s.line,
        end_line: s.end_line,
        code: &s.code,
        doc: &s.doc,
        exported: s.exported,
        depth,
        is_target: false,
        external: false,
        stub: false,
        signature: None,
        interface_type: s.interface_type.as_deref(),
        implementation: s.implementation.as_deref(),
    }
}

fn reference_node(r: &Reference) -> Node<'_> {
    Node {
        external: r.external,
        stub: r.stub,
        signature: r.signature.as_deref(),
        ..node(&r.symbol, r.depth)
    }
}

/// Build the visualization document of a report.
pub fn document(report: &Report) -> Document<'_> {
    let extract = &report.extract;
    let target = Node {
        is_target: true,
        ..node(&extract.target, 0)
    };

    let mut seen: HashSet<String> = HashSet::from([target.id.clone()]);
    let mut nodes = Vec::new();
    for r in &extract.references {
        let n = reference_node(r);
        if seen.insert(n.id.clone()) {
            nodes.push(n);
        }
    }

    // Edges name their source by symbol name; map it back to a node id.
    let mut ids: HashMap<&str, &str> = HashMap::new();
    ids.insert(target.name, target.id.as_str());
    for n in &nodes {
        ids.entry(n.name).or_insert(n.id.as_str());
    }
    let edges = extract
        .references
        .iter()
        .filter(|r| !r.referenced_by.is_empty())
        .map(|r| Edge {
            from: ids
                .get(r.referenced_by.as_str())
                .map_or_else(|| r.referenced_by.clone(), |id| id.to_string()),
            to: node_id(&r.symbol),
            reason: r.reason,
            depth: r.depth,
        })
        .collect();

    Document {
        total_layers: extract.references.iter().map(|r| r.depth).max().unwrap_or(0),
        interface_mappings: extract.interface_mappings.iter().map(mapping_node).collect(),
        di_bindings: extract.di_bindings.iter().map(binding_node).collect(),
        detected_di_framework: extract.framework,
        external: &extract.external,
        metadata: &report.metadata,
        target,
        nodes,
        edges,
    }
}

fn mapping_node(m: &InterfaceMapping) -> MappingNode<'_> {
    MappingNode {
        interface: node(&m.interface, 0),
        implementations: m.implementations.iter().map(|s| node(s, 0)).collect(),
        constructor: m.constructor.as_ref().map(|s| node(s, 0)),
        framework: m.framework,
    }
}

fn binding_node(b: &DiBinding) -> BindingNode<'_> {
    BindingNode {
        provider: node(&b.provider, 0),
        product: b.product.as_ref().map(|s| node(s, 0)),
        dependencies: b.dependencies.iter().map(|s| node(s, 0)).collect(),
        framework: b.framework,
        scope: &b.scope,
    }
}

// ---------------------------------------------------------------------------
// Markdown
// ---------------------------------------------------------------------------

fn basename(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

fn code_block(out: &mut String, code: &str) -> fmt::Result {
    writeln!(out, "```go")?;
    writeln!(out, "{}", code.trim_end())?;
    writeln!(out, "```")
}

/// Render a report as a Markdown review document.
pub fn markdown(report: &Report) -> Result<String, fmt::Error> {
    let extract = &report.extract;
    let target = &extract.target;
    let mut out = String::new();

    writeln!(out, "# Code Extract: {}", target.name)?;
    writeln!(out)?;
    writeln!(out, "**File**: {}:{}", target.file, target.line)?;
    writeln!(out, "**Kind**: {}", target.kind)?;
    if !target.package.is_empty() {
        writeln!(out, "**Package**: {}", target.package)?;
    }
    writeln!(out)?;

    writeln!(out, "## Target Symbol")?;
    writeln!(out)?;
    if !target.doc.is_empty() {
        writeln!(out, "{}", target.doc)?;
        writeln!(out)?;
    }
    code_block(&mut out, &target.code)?;

    if !extract.references.is_empty() {
        writeln!(out)?;
        writeln!(out, "## Dependencies")?;
        let mut by_depth: BTreeMap<usize, Vec<&Reference>> = BTreeMap::new();
        for r in &extract.references {
            by_depth.entry(r.depth).or_default().push(r);
        }
        for (depth, refs) in by_depth {
            writeln!(out)?;
            writeln!(out, "### Depth {depth}")?;
            for r in refs {
                writeln!(out)?;
                write_reference(&mut out, r)?;
            }
        }
    }

    if !extract.external.is_empty() {
        writeln!(out)?;
        writeln!(out, "## External References")?;
        writeln!(out)?;
        for name in &extract.external {
            writeln!(out, "- `{name}`")?;
        }
    }

    if !extract.interface_mappings.is_empty() {
        writeln!(out)?;
        writeln!(out, "## Interface Mappings")?;
        for m in &extract.interface_mappings {
            writeln!(out)?;
            write_mapping(&mut out, m)?;
        }
    }

    if extract.framework != Framework::None || !extract.di_bindings.is_empty() {
        writeln!(out)?;
        writeln!(out, "## Dependency Injection")?;
        writeln!(out)?;
        writeln!(out, "**Framework**: {}", extract.framework)?;
        if !extract.di_bindings.is_empty() {
            writeln!(out)?;
        }
        for b in &extract.di_bindings {
            write_binding(&mut out, b)?;
        }
    }

    let meta = &report.metadata;
    writeln!(out)?;
    writeln!(out, "---")?;
    writeln!(
        out,
        "_{} symbols, {} lines, depth {}, module `{}`_",
        meta.total_symbols, meta.total_lines, meta.depth, meta.module
    )?;
    Ok(out)
}

fn write_reference(out: &mut String, r: &Reference) -> fmt::Result {
    let s = &r.symbol;
    if r.stub {
        let shown = r.signature.clone().unwrap_or_else(|| s.qualified_name());
        return writeln!(
            out,
            "- `{shown}` ({}, external, from {})",
            r.reason, r.referenced_by
        );
    }
    writeln!(out, "#### {} `{}:{}`", s.name, basename(&s.file), s.line)?;
    writeln!(out)?;
    writeln!(out, "*{} {}, from {}*", s.kind, r.reason, r.referenced_by)?;
    writeln!(out)?;
    code_block(out, &s.code)
}

fn write_mapping(out: &mut String, m: &InterfaceMapping) -> fmt::Result {
    let i = &m.interface;
    writeln!(out, "### {} `{}:{}`", i.name, basename(&i.file), i.line)?;
    writeln!(out)?;
    if m.implementations.is_empty() {
        writeln!(out, "- Implementations: none collected")?;
    } else {
        let impls: Vec<String> = m
            .implementations
            .iter()
            .map(|s| format!("`{}` ({}:{})", s.name, basename(&s.file), s.line))
            .collect();
        writeln!(out, "- Implementations: {}", impls.join(", "))?;
    }
    if let Some(c) = &m.constructor {
        write!(out, "- Constructor: `{}`", c.name)?;
        if let Some(imp) = &c.implementation {
            write!(out, " returns `{imp}`")?;
        }
        if let Some(fw) = m.framework {
            write!(out, " ({fw})")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_binding(out: &mut String, b: &DiBinding) -> fmt::Result {
    write!(out, "- `{}`", b.provider.name)?;
    match &b.product {
        Some(p) => write!(out, " provides `{}`", p.name)?,
        None => write!(out, " provides an uncollected type")?,
    }
    if !b.dependencies.is_empty() {
        let deps: Vec<String> = b.dependencies.iter().map(|d| format!("`{}`", d.name)).collect();
        write!(out, ", depends on {}", deps.join(", "))?;
    }
    writeln!(out, " ({}, {})", b.framework, b.scope)
}

// ---------------------------------------------------------------------------
// Formatter
// ---------------------------------------------------------------------------

/// Output formatter for reports and located symbols.
pub struct Formatter<W: Write> {
    writer: W,
    format: Format,
}

impl<W: Write> Formatter<W> {
    pub fn new(writer: W, format: Format) -> Self {
        Self { writer, format }
    }

    /// Write a full extraction report.
    pub fn format_report(&mut self, report: &Report) -> std::io::Result<()> {
        let text = match self.format {
            Format::Markdown => markdown(report).map_err(std::io::Error::other)?,
            Format::Json => serde_json::to_string_pretty(&document(report))?,
            Format::Toon => serde_toon2::to_string(&document(report))
                .map_err(|e| std::io::Error::other(e.to_string()))?,
        };
        writeln!(self.writer, "{}", text.trim_end())
    }

    /// Write one located symbol: `file:line:col: kind name` or one JSON line.
    pub fn format_symbol(&mut self, symbol: &Symbol) -> std::io::Result<()> {
        let out = SymbolOutput::from(symbol);
        match self.format {
            Format::Json => {
                serde_json::to_writer(&mut self.writer, &out)?;
                writeln!(self.writer)
            }
            Format::Toon => {
                let text = serde_toon2::to_string(&out).map_err(|e| std::io::Error::other(e.to_string()))?;
                writeln!(self.writer, "{}", text.trim_end())
            }
            Format::Markdown => {
                write!(self.writer, "{}:{}:{}: {} ", out.file, out.line, out.col, out.kind)?;
                if let Some(recv) = &out.receiver {
                    write!(self.writer, "({recv}) ")?;
                }
                writeln!(self.writer, "{} [{}]", out.name, out.package)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Stderr helpers
// ---------------------------------------------------------------------------

/// Print a hint message to stderr. Suppressed in JSON mode.
pub fn print_hint(msg: &str, json: bool) {
    if !json {
        eprintln!("hint: {msg}");
    }
}

/// Print an error message to stderr.
pub fn print_error(msg: &str) {
    eprintln!("error: {msg}");
}

/// Format a [`ScopeError`] to stderr with structured `error:` / `hint:` lines.
///
/// Returns the appropriate process exit code.
pub fn format_error(err: &ScopeError, json: bool) -> i32 {
    print_error(&format!("{err}"));
    if let Some(hint) = err.hint() {
        print_hint(hint, json);
    }
    err.exit_code()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
