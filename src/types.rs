//! Shared types and data structures.
//!
//! Everything here is a plain value: pipeline stages copy symbols between
//! each other rather than sharing them, and an assembled [`Extract`] is
//! never mutated afterwards.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// The kind of a located declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    #[default]
    Function,
    Method,
    Type,
    Struct,
    Interface,
    Variable,
    Constant,
}

impl SymbolKind {
    /// Types of any shape (struct, interface, named or generic type).
    pub fn is_type(self) -> bool {
        matches!(self, SymbolKind::Type | SymbolKind::Struct | SymbolKind::Interface)
    }

    /// Functions and methods.
    pub fn is_callable(self) -> bool {
        matches!(self, SymbolKind::Function | SymbolKind::Method)
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Type => "type",
            SymbolKind::Struct => "struct",
            SymbolKind::Interface => "interface",
            SymbolKind::Variable => "variable",
            SymbolKind::Constant => "constant",
        };
        write!(f, "{s}")
    }
}

/// Deduplication identity of a declaration: package, name and position.
///
/// Same-named declarations in different packages (or different positions)
/// stay distinct.  External declarations have no position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VisitedKey {
    pub package: String,
    pub name: String,
    pub position: Option<(String, usize, usize)>,
}

/// A located declaration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Symbol {
    /// Full package path.
    pub package: String,
    pub name: String,
    pub kind: SymbolKind,
    /// Receiver type as written (e.g. `*Server`), methods only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    /// Path of the source file (empty for external declarations).
    pub file: String,
    /// 1-based start line.
    pub line: usize,
    /// 1-based end line.
    pub end_line: usize,
    /// 1-based start column.
    pub column: usize,
    /// Verbatim source text.
    pub code: String,
    pub doc: String,
    pub exported: bool,
    /// For constructors: the interface type they return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface_type: Option<String>,
    /// For constructors: the concrete type they instantiate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementation: Option<String>,
}

impl Symbol {
    /// `package.Name`, or just the name when the package is unknown.
    pub fn qualified_name(&self) -> String {
        if self.package.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.package, self.name)
        }
    }

    /// The deduplication key for this symbol.
    pub fn key(&self) -> VisitedKey {
        let position = if self.file.is_empty() {
            None
        } else {
            Some((self.file.clone(), self.line, self.column))
        };
        VisitedKey {
            package: self.package.clone(),
            name: self.name.clone(),
            position,
        }
    }

    /// Number of source lines this symbol spans.
    pub fn line_count(&self) -> usize {
        if self.code.is_empty() {
            0
        } else {
            self.code.lines().count()
        }
    }
}

/// Why a declaration was pulled into the extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceReason {
    DirectCall,
    TypeReference,
    FieldAccess,
    InterfaceContract,
    ImplementsInterface,
    ReturnsInterface,
    DiBinding,
}

impl fmt::Display for ReferenceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReferenceReason::DirectCall => "direct-call",
            ReferenceReason::TypeReference => "type-reference",
            ReferenceReason::FieldAccess => "field-access",
            ReferenceReason::InterfaceContract => "interface-contract",
            ReferenceReason::ImplementsInterface => "implements-interface",
            ReferenceReason::ReturnsInterface => "returns-interface",
            ReferenceReason::DiBinding => "di-binding",
        };
        write!(f, "{s}")
    }
}

/// An edge from a referencing symbol to a referenced [`Symbol`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    /// The referenced symbol.
    pub symbol: Symbol,
    pub reason: ReferenceReason,
    /// BFS depth at which the edge was discovered (0 = target).
    pub depth: usize,
    /// The referenced declaration lives outside the analyzed module.
    pub external: bool,
    /// Only a signature is retained, not a body.
    pub stub: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Name of the symbol that produced this edge.
    pub referenced_by: String,
}

/// Dependency-injection framework convention detected in a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    Wire,
    Fx,
    Manual,
    None,
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Framework::Wire => "wire",
            Framework::Fx => "fx",
            Framework::Manual => "manual",
            Framework::None => "none",
        };
        write!(f, "{s}")
    }
}

/// An interface together with its implementations and constructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceMapping {
    pub interface: Symbol,
    pub implementations: Vec<Symbol>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constructor: Option<Symbol>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<Framework>,
}

/// One provider relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiBinding {
    pub provider: Symbol,
    /// What the provider produces; `None` when its result type is not
    /// among the collected symbols.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<Symbol>,
    pub dependencies: Vec<Symbol>,
    pub framework: Framework,
    pub scope: String,
}

/// The aggregate result of one extraction request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Extract {
    pub target: Symbol,
    pub references: Vec<Reference>,
    /// Qualified names of external declarations, insertion-ordered.
    pub external: Vec<String>,
    pub interface_mappings: Vec<InterfaceMapping>,
    pub di_bindings: Vec<DiBinding>,
    pub framework: Framework,
}

/// Where to extract from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Module root (directory containing `go.mod`).
    pub root: PathBuf,
    /// Source file, absolute or relative to `root`.
    pub file: PathBuf,
    /// 1-based line.
    pub line: usize,
    /// 1-based column; `None` picks the first declaration on the line.
    pub column: Option<usize>,
}

impl Target {
    /// The file path made absolute against the module root.
    pub fn absolute_file(&self) -> PathBuf {
        if self.file.is_absolute() {
            self.file.clone()
        } else {
            self.root.join(&self.file)
        }
    }
}

/// Which implementation-inference strategy the interface analyzer uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InferenceMode {
    CompositeLiteral,
    Disabled,
}

/// Extraction behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Options {
    /// Dependency depth: 0 = target only, 1 = direct dependencies, ...
    pub depth: usize,
    /// Record external dependencies as stub references.
    pub stub_external: bool,
    /// Treat universe-scope builtins as external dependencies.
    pub include_builtins: bool,
    /// Name prefixes that mark an interface constructor.
    pub constructor_prefixes: Vec<String>,
    pub inference: InferenceMode,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            depth: 1,
            stub_external: true,
            include_builtins: true,
            constructor_prefixes: vec!["New".into(), "Create".into(), "Make".into()],
            inference: InferenceMode::CompositeLiteral,
        }
    }
}
