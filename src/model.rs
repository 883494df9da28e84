//! The program model consumed by the extraction core.
//!
//! Locator, collector and both analyzers talk to a loaded program only
//! through [`ProgramModel`], so the traversal and analysis code stays
//! independent of any particular language frontend.  The one frontend that
//! ships is [`crate::program::GoProgram`].

use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::ExtractError;
use crate::types::{Symbol, SymbolKind, VisitedKey};

/// Opaque handle of a declaration inside one loaded program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub usize);

/// A declaration as the program model knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Full package path.
    pub package: String,
    pub name: String,
    pub kind: SymbolKind,
    /// Receiver type as written, methods only.
    pub receiver: Option<String>,
    /// Absolute path of the declaring file.
    pub file: PathBuf,
    /// 1-based start line.
    pub line: usize,
    /// 1-based end line.
    pub end_line: usize,
    /// 1-based start column.
    pub column: usize,
    pub start_byte: usize,
    pub end_byte: usize,
    pub doc: String,
    pub exported: bool,
}

impl Declaration {
    /// The deduplication key of this declaration.
    pub fn key(&self) -> VisitedKey {
        VisitedKey {
            package: self.package.clone(),
            name: self.name.clone(),
            position: Some((self.file.display().to_string(), self.line, self.column)),
        }
    }

    /// Whether `offset` falls inside this declaration's byte span.
    pub fn contains_offset(&self, offset: usize) -> bool {
        self.start_byte <= offset && offset <= self.end_byte
    }
}

/// Syntactic construct an identifier was used in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UseConstruct {
    /// Callee position: `f(x)`, `pkg.F(x)`, `v.M(x)`.
    Call,
    /// Type position: parameter types, composite literal types, conversions.
    Type,
    /// Member access that is not a call: `v.field`.
    Selector,
    /// Any other expression use.
    Value,
}

/// What a used name is qualified by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UseBinding {
    /// Bare name, looked up in package then universe scope.
    Unqualified,
    /// `alias.Name` where `alias` imports this path.
    Package(String),
    /// `value.member` where the value has this (pointer-stripped) type.
    Member(TypeName),
}

/// One identifier use inside a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseSite {
    /// The declaration whose text contains the use.
    pub scope: DeclId,
    pub name: String,
    pub construct: UseConstruct,
    /// Byte offset of the used name in its file.
    pub offset: usize,
    pub binding: UseBinding,
}

/// A declaration outside the analyzed module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalDecl {
    /// Import path, or `builtin` for universe-scope names.
    pub package: String,
    pub name: String,
    pub kind: SymbolKind,
    pub signature: Option<String>,
    pub builtin: bool,
}

impl ExternalDecl {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.package, self.name)
    }

    /// Materialize as a body-less symbol.
    pub fn to_symbol(&self) -> Symbol {
        Symbol {
            package: self.package.clone(),
            name: self.name.clone(),
            kind: self.kind,
            exported: self.name.chars().next().is_some_and(char::is_uppercase),
            ..Symbol::default()
        }
    }
}

/// Outcome of resolving one [`UseSite`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Declaration(DeclId),
    External(ExternalDecl),
    Unresolved,
}

/// A named type: package path plus type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeName {
    pub package: String,
    pub name: String,
}

impl TypeName {
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.package.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.package, self.name)
        }
    }
}

/// A parameter or result type, as much as the analyzers need of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    Named(TypeName),
    Pointer(Box<TypeExpr>),
    /// Predeclared type such as `int` or `error`.
    Builtin(String),
    /// Slices, maps, channels, function types and the like, as written.
    Other(String),
}

impl TypeExpr {
    /// The named type behind any number of pointer indirections.
    pub fn named(&self) -> Option<&TypeName> {
        match self {
            TypeExpr::Named(t) => Some(t),
            TypeExpr::Pointer(inner) => inner.named(),
            TypeExpr::Builtin(_) | TypeExpr::Other(_) => None,
        }
    }
}

/// Parameter and result types of a function or method.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FuncSignature {
    pub params: Vec<TypeExpr>,
    pub results: Vec<TypeExpr>,
}

/// Which method set of a concrete type to test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverForm {
    /// `T`: value-receiver methods only.
    Value,
    /// `*T`: all methods.
    Pointer,
}

/// Syntactic shape of an expression returned by a function body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnShape {
    /// `T{...}` or `&T{...}`.
    Composite { type_name: TypeName, address_of: bool },
    Other,
}

/// An argument to a wiring-framework call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallArg {
    /// A plain or package-qualified identifier, resolved to its package.
    Named(TypeName),
    /// Anything else, as written.
    Other(String),
}

/// A call to an imported function inside some package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Package containing the call.
    pub package: String,
    pub file: PathBuf,
    pub line: usize,
    pub args: Vec<CallArg>,
}

/// Read-only view of a loaded program.
///
/// Implementations must be immutable after loading so one model can serve
/// several independent extractions.
pub trait ProgramModel {
    /// Path of the analyzed module (`example.com/app`).
    fn module_path(&self) -> &str;

    /// Full text of a loaded source file.
    fn file_text(&self, file: &Path) -> Result<&str, ExtractError>;

    /// Top-level declarations of a file, in source order.
    fn file_declarations(&self, file: &Path) -> Result<Vec<DeclId>, ExtractError>;

    fn declaration(&self, id: DeclId) -> &Declaration;

    /// Map a portable symbol back to its declaration.
    fn find_declaration(&self, symbol: &Symbol) -> Option<DeclId>;

    /// Every identifier use inside a declaration, in source order.
    fn identifier_uses(&self, id: DeclId) -> Vec<UseSite>;

    fn resolve_use(&self, site: &UseSite) -> Resolution;

    /// Whether `concrete` (in the given form) structurally satisfies `iface`.
    fn implements_interface(&self, concrete: DeclId, iface: DeclId, form: ReceiverForm) -> bool;

    /// Verbatim declaration text.
    fn source_text(&self, id: DeclId) -> &str;

    /// One-line rendering of the declaration header.
    fn signature(&self, id: DeclId) -> String;

    fn package_path(&self, id: DeclId) -> &str {
        &self.declaration(id).package
    }

    /// Declarations in one package scope, in file then source order.
    fn package_declarations(&self, package: &str) -> Vec<DeclId>;

    fn all_declarations(&self) -> Vec<DeclId>;

    /// Paths of every loaded package, sorted.
    fn packages(&self) -> Vec<String>;

    /// Parameter and result types of a function or method.
    fn function_signature(&self, id: DeclId) -> Option<FuncSignature>;

    /// Shapes of the expressions returned anywhere in a function body.
    fn return_shapes(&self, id: DeclId) -> Vec<ReturnShape>;

    /// Whether any file of `package` carries the build constraint `tag`.
    fn has_build_tag(&self, package: &str, tag: &str) -> bool;

    /// Whether any file of `package` imports `path`.
    fn imports(&self, package: &str, path: &str) -> bool;

    /// Calls of `import_path.function` made in `package`.
    fn calls_to(&self, package: &str, import_path: &str, function: &str) -> Vec<CallSite>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_strips_pointers() {
        let t = TypeExpr::Pointer(Box::new(TypeExpr::Pointer(Box::new(TypeExpr::Named(
            TypeName::new("example.com/m/db", "Conn"),
        )))));
        assert_eq!(t.named().unwrap().name, "Conn");
        assert!(TypeExpr::Builtin("int".into()).named().is_none());
    }

    #[test]
    fn external_symbol_has_no_body() {
        let ext = ExternalDecl {
            package: "net/http".into(),
            name: "ListenAndServe".into(),
            kind: SymbolKind::Function,
            signature: None,
            builtin: false,
        };
        let sym = ext.to_symbol();
        assert!(sym.code.is_empty());
        assert!(sym.file.is_empty());
        assert!(sym.exported);
        assert_eq!(ext.qualified_name(), "net/http.ListenAndServe");
    }

    #[test]
    fn declaration_key_includes_position() {
        let d = Declaration {
            package: "example.com/m".into(),
            name: "F".into(),
            kind: SymbolKind::Function,
            receiver: None,
            file: PathBuf::from("/m/a.go"),
            line: 3,
            end_line: 5,
            column: 1,
            start_byte: 10,
            end_byte: 40,
            doc: String::new(),
            exported: true,
        };
        assert_eq!(d.key().position, Some(("/m/a.go".to_string(), 3, 1)));
        assert!(d.contains_offset(10));
        assert!(d.contains_offset(40));
        assert!(!d.contains_offset(41));
    }

    #[test]
    fn type_name_display() {
        assert_eq!(TypeName::new("", "int").to_string(), "int");
        assert_eq!(TypeName::new("io", "Reader").to_string(), "io.Reader");
    }
}
