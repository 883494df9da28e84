//! Go source parsing and declaration extraction.
//!
//! Provides the tree-sitter plumbing for the Go frontend: parser
//! construction, file header extraction (package clause, imports, build
//! constraints) and the top-level declaration scan that feeds the program
//! model's package scopes.

use std::path::Path;

use tree_sitter::{Language, Node, Parser, Tree};

use crate::errors::ExtractError;
use crate::types::SymbolKind;

/// Return the Tree-sitter [`Language`] grammar for Go.
fn grammar() -> Language {
    tree_sitter_go::LANGUAGE.into()
}

/// Create a new [`Parser`] configured for Go.
pub fn get_parser() -> Result<Parser, ExtractError> {
    let mut parser = Parser::new();
    parser
        .set_language(&grammar())
        .map_err(|e| ExtractError::Load(format!("error loading Go grammar: {e}")))?;
    Ok(parser)
}

/// Parse Go source text into a syntax tree.
pub fn parse_source(source: &str) -> Result<Tree, ExtractError> {
    let mut parser = get_parser()?;
    parser
        .parse(source.as_bytes(), None)
        .ok_or_else(|| ExtractError::Load("parser produced no tree".into()))
}

/// Whether a path names a loadable (non-test) Go source file.
pub fn is_go_source(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with(".go") && !name.ends_with("_test.go")
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Get the text content of a node.
pub fn node_text<'a>(node: Node, src: &'a [u8]) -> &'a str {
    node.utf8_text(src).unwrap_or("")
}

/// Find a named child by its field name and return its text.
pub fn field_text<'a>(node: Node, field: &str, src: &'a [u8]) -> Option<&'a str> {
    node.child_by_field_name(field).map(|n| node_text(n, src))
}

/// All named children of a node, in order.
pub fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut out = Vec::with_capacity(node.named_child_count());
    for i in 0..node.named_child_count() {
        if let Some(child) = node.named_child(i as u32) {
            out.push(child);
        }
    }
    out
}

/// Every child carrying the given field name (`a, b int` has two names).
pub fn field_children<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor).collect()
}

/// Extract the first line of a node's text as the signature.
pub fn first_line(node: Node, src: &[u8]) -> String {
    let text = node_text(node, src);
    let sig = text
        .split_once('{')
        .map(|(before, _)| before.trim())
        .unwrap_or_else(|| text.lines().next().unwrap_or("").trim());
    sig.to_string()
}

/// Re-find a node from its kind and byte range.
pub fn node_at<'t>(tree: &'t Tree, kind: &str, start: usize, end: usize) -> Option<Node<'t>> {
    let mut node = tree.root_node().descendant_for_byte_range(start, end)?;
    loop {
        if node.kind() == kind && node.start_byte() == start && node.end_byte() == end {
            return Some(node);
        }
        node = node.parent()?;
    }
}

fn unquote(s: &str) -> &str {
    s.trim_matches(|c| c == '"' || c == '`')
}

fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

// ---------------------------------------------------------------------------
// File header: package clause, imports, build constraints
// ---------------------------------------------------------------------------

/// One import spec of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Explicit local name (`_`, `.` or an alias), if any.
    pub alias: Option<String>,
    pub path: String,
}

/// Everything a file declares before its first top-level declaration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileHeader {
    /// Name from the `package` clause.
    pub package_name: String,
    pub imports: Vec<Import>,
    /// Identifiers mentioned in `//go:build` / `// +build` constraints.
    pub build_tags: Vec<String>,
}

/// Extract the package clause, imports and build tags of a parsed file.
pub fn extract_header(tree: &Tree, source: &str) -> FileHeader {
    let src = source.as_bytes();
    let mut header = FileHeader {
        build_tags: build_tags(source),
        ..FileHeader::default()
    };

    for child in named_children(tree.root_node()) {
        match child.kind() {
            "package_clause" => {
                if let Some(name) = child.named_child(0u32) {
                    header.package_name = node_text(name, src).to_string();
                }
            }
            "import_declaration" => collect_imports(child, src, &mut header.imports),
            _ => {}
        }
    }
    header
}

fn collect_imports(node: Node, src: &[u8], imports: &mut Vec<Import>) {
    for child in named_children(node) {
        match child.kind() {
            "import_spec" => {
                let Some(path) = field_text(child, "path", src) else {
                    continue;
                };
                imports.push(Import {
                    alias: field_text(child, "name", src).map(str::to_string),
                    path: unquote(path).to_string(),
                });
            }
            "import_spec_list" => collect_imports(child, src, imports),
            _ => {}
        }
    }
}

/// Identifiers named by the file's build constraint lines.
///
/// Only the comment block preceding the `package` clause is considered.
pub fn build_tags(source: &str) -> Vec<String> {
    let mut tags = Vec::new();
    for line in source.lines() {
        let line = line.trim();
        if line.starts_with("package ") {
            break;
        }
        let expr = if let Some(rest) = line.strip_prefix("//go:build") {
            rest
        } else if let Some(rest) = line.strip_prefix("// +build") {
            rest
        } else {
            continue;
        };
        for word in expr.split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.')) {
            if !word.is_empty() && !tags.iter().any(|t| t == word) {
                tags.push(word.to_string());
            }
        }
    }
    tags
}

/// The name an import is referred to by when no alias is given.
///
/// Uses the last path element, skipping a `vN` major-version suffix and
/// trimming `.vN` suffixes and `go-` prefixes (`gopkg.in/yaml.v3` is
/// `yaml`, `github.com/go-chi/chi/v5` is `chi`).
pub fn default_import_name(path: &str) -> String {
    let mut parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    if parts.len() > 1
        && let Some(last) = parts.last()
        && is_major_version(last)
    {
        parts.pop();
    }
    let mut name = parts.last().copied().unwrap_or(path);
    if let Some((base, suffix)) = name.rsplit_once('.')
        && is_major_version(suffix)
    {
        name = base;
    }
    if let Some(rest) = name.strip_prefix("go-") {
        name = rest;
    }
    name.replace('-', "_")
}

fn is_major_version(s: &str) -> bool {
    s.len() > 1 && s.starts_with('v') && s[1..].chars().all(|c| c.is_ascii_digit())
}

// ---------------------------------------------------------------------------
// Declaration extraction
// ---------------------------------------------------------------------------

/// A top-level declaration found in one file, before it is placed in a
/// package scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDecl {
    pub name: String,
    /// Further names bound by the same spec (`var a, b = ...`).
    pub other_names: Vec<String>,
    pub kind: SymbolKind,
    /// Receiver type text (`*Server`), methods only.
    pub receiver: Option<String>,
    /// Base type name of the receiver (`Server`), methods only.
    pub receiver_base: Option<String>,
    /// Kind and byte range of the declaring syntax node.
    pub node_kind: &'static str,
    pub node_start: usize,
    pub node_end: usize,
    /// Byte range reported as the declaration's source text.
    pub span_start: usize,
    pub span_end: usize,
    pub line: usize,
    pub end_line: usize,
    pub column: usize,
    pub doc: String,
    pub exported: bool,
}

/// Extract top-level declarations from a parsed Go file, in source order.
pub fn extract_declarations(tree: &Tree, source: &str) -> Vec<RawDecl> {
    let src = source.as_bytes();
    let mut decls = Vec::new();

    for node in named_children(tree.root_node()) {
        match node.kind() {
            "function_declaration" => {
                if let Some(d) = extract_function(node, src) {
                    decls.push(d);
                }
            }
            "method_declaration" => {
                if let Some(d) = extract_method(node, src) {
                    decls.push(d);
                }
            }
            "type_declaration" | "const_declaration" | "var_declaration" => {
                extract_grouped(node, src, &mut decls);
            }
            _ => {}
        }
    }
    decls
}

fn make_decl(name: &str, kind: SymbolKind, node: Node, span: Node, src: &[u8]) -> RawDecl {
    RawDecl {
        name: name.to_string(),
        other_names: Vec::new(),
        kind,
        receiver: None,
        receiver_base: None,
        node_kind: node.kind(),
        node_start: node.start_byte(),
        node_end: node.end_byte(),
        span_start: span.start_byte(),
        span_end: span.end_byte(),
        line: span.start_position().row + 1,
        end_line: span.end_position().row + 1,
        column: span.start_position().column + 1,
        doc: doc_comment(span, src),
        exported: is_exported(name),
    }
}

fn extract_function(node: Node, src: &[u8]) -> Option<RawDecl> {
    let name = field_text(node, "name", src)?;
    Some(make_decl(name, SymbolKind::Function, node, node, src))
}

fn extract_method(node: Node, src: &[u8]) -> Option<RawDecl> {
    let name = field_text(node, "name", src)?;
    let mut decl = make_decl(name, SymbolKind::Method, node, node, src);
    let recv_type = node
        .child_by_field_name("receiver")
        .and_then(|r| r.named_child(0u32))
        .and_then(|param| param.child_by_field_name("type"));
    if let Some(t) = recv_type {
        decl.receiver = Some(node_text(t, src).to_string());
        decl.receiver_base = receiver_base(t, src);
    }
    Some(decl)
}

/// `*Server[T]` -> `Server`.
pub fn receiver_base(type_node: Node, src: &[u8]) -> Option<String> {
    match type_node.kind() {
        "pointer_type" | "parenthesized_type" => receiver_base(type_node.named_child(0u32)?, src),
        "generic_type" => receiver_base(type_node.child_by_field_name("type")?, src),
        "type_identifier" => Some(node_text(type_node, src).to_string()),
        _ => None,
    }
}

/// `type`, `const` and `var` statements: one declaration per spec.
fn extract_grouped(stmt: Node, src: &[u8], decls: &mut Vec<RawDecl>) {
    let mut specs = Vec::new();
    for child in named_children(stmt) {
        match child.kind() {
            "type_spec" | "type_alias" | "const_spec" | "var_spec" => specs.push(child),
            "var_spec_list" => specs.extend(
                named_children(child)
                    .into_iter()
                    .filter(|c| c.kind() == "var_spec"),
            ),
            _ => {}
        }
    }
    let grouped = specs.len() != 1 || stmt_is_parenthesized(stmt);

    for spec in specs {
        let span = if grouped { spec } else { stmt };
        let decl = match spec.kind() {
            "type_spec" | "type_alias" => {
                let Some(name) = field_text(spec, "name", src) else {
                    continue;
                };
                let kind = match spec.child_by_field_name("type").map(|t| t.kind()) {
                    Some("struct_type") if spec.kind() == "type_spec" => SymbolKind::Struct,
                    Some("interface_type") if spec.kind() == "type_spec" => SymbolKind::Interface,
                    _ => SymbolKind::Type,
                };
                make_decl(name, kind, spec, span, src)
            }
            _ => {
                let names = field_children(spec, "name");
                let Some(first) = names.first() else {
                    continue;
                };
                let kind = if spec.kind() == "const_spec" {
                    SymbolKind::Constant
                } else {
                    SymbolKind::Variable
                };
                let mut decl = make_decl(node_text(*first, src), kind, spec, span, src);
                decl.other_names = names[1..]
                    .iter()
                    .map(|n| node_text(*n, src).to_string())
                    .filter(|n| n != "_")
                    .collect();
                decl
            }
        };
        if decl.name != "_" {
            decls.push(decl);
        }
    }
}

fn stmt_is_parenthesized(stmt: Node) -> bool {
    let mut cursor = stmt.walk();
    let found = stmt.children(&mut cursor).any(|c| c.kind() == "(" || c.kind() == "var_spec_list");
    found
}

/// The contiguous comment block directly above `node`, markers stripped.
fn doc_comment(node: Node, src: &[u8]) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut expected_row = node.start_position().row;
    let mut cur = node.prev_named_sibling();
    while let Some(prev) = cur {
        if prev.kind() != "comment" || prev.end_position().row + 1 != expected_row {
            break;
        }
        let text = node_text(prev, src);
        let mut block: Vec<String> = strip_comment(text);
        block.append(&mut lines);
        lines = block;
        expected_row = prev.start_position().row;
        cur = prev.prev_named_sibling();
    }
    lines.join("\n")
}

fn strip_comment(text: &str) -> Vec<String> {
    if let Some(line) = text.strip_prefix("//") {
        return vec![line.strip_prefix(' ').unwrap_or(line).trim_end().to_string()];
    }
    let inner = text
        .strip_prefix("/*")
        .and_then(|t| t.strip_suffix("*/"))
        .unwrap_or(text);
    inner
        .lines()
        .map(|l| {
            let l = l.trim();
            l.strip_prefix("* ").or_else(|| l.strip_prefix('*')).unwrap_or(l).to_string()
        })
        .filter(|l| !l.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Parse source code and extract declarations.
    fn extract_from(source: &str) -> Vec<RawDecl> {
        let tree = parse_source(source).unwrap();
        extract_declarations(&tree, source)
    }

    /// Find a declaration by name in a list.
    fn find_decl<'a>(decls: &'a [RawDecl], name: &str) -> &'a RawDecl {
        decls.iter().find(|d| d.name == name).unwrap_or_else(|| {
            panic!(
                "declaration '{name}' not found in: {:?}",
                decls.iter().map(|d| &d.name).collect::<Vec<_>>()
            )
        })
    }

    #[test]
    fn go_source_detection() {
        assert!(is_go_source(Path::new("pkg/a.go")));
        assert!(!is_go_source(Path::new("pkg/a_test.go")));
        assert!(!is_go_source(Path::new("pkg/a.rs")));
        assert!(!is_go_source(Path::new("Makefile")));
    }

    #[test]
    fn parser_loads_go_grammar() {
        assert!(get_parser().is_ok());
    }

    #[test]
    fn function_and_method() {
        let src = "package p\n\nfunc Hello(x int) bool { return true }\n\nfunc (s *Server) Start() error { return nil }\n";
        let decls = extract_from(src);
        let f = find_decl(&decls, "Hello");
        assert_eq!(f.kind, SymbolKind::Function);
        assert_eq!(f.line, 3);
        assert_eq!(f.column, 1);
        assert!(f.exported);

        let m = find_decl(&decls, "Start");
        assert_eq!(m.kind, SymbolKind::Method);
        assert_eq!(m.receiver.as_deref(), Some("*Server"));
        assert_eq!(m.receiver_base.as_deref(), Some("Server"));
    }

    #[test]
    fn type_specs_are_classified() {
        let src = "package p\n\ntype S struct { x int }\n\ntype I interface { M() }\n\ntype ID string\n\ntype Alias = S\n";
        let decls = extract_from(src);
        assert_eq!(find_decl(&decls, "S").kind, SymbolKind::Struct);
        assert_eq!(find_decl(&decls, "I").kind, SymbolKind::Interface);
        assert_eq!(find_decl(&decls, "ID").kind, SymbolKind::Type);
        assert_eq!(find_decl(&decls, "Alias").kind, SymbolKind::Type);
    }

    #[test]
    fn single_spec_spans_statement() {
        let src = "package p\n\ntype S struct {\n\tx int\n}\n";
        let decls = extract_from(src);
        let s = find_decl(&decls, "S");
        assert_eq!(&src[s.span_start..s.span_end], "type S struct {\n\tx int\n}");
        assert_eq!(s.node_kind, "type_spec");
        assert_eq!(s.end_line, 5);
    }

    #[test]
    fn grouped_specs_span_themselves() {
        let src = "package p\n\nconst (\n\tA = 1\n\tB, C = 2, 3\n)\n\nvar x, y int\n";
        let decls = extract_from(src);
        let a = find_decl(&decls, "A");
        assert_eq!(a.kind, SymbolKind::Constant);
        assert_eq!(&src[a.span_start..a.span_end], "A = 1");
        let b = find_decl(&decls, "B");
        assert_eq!(b.other_names, vec!["C".to_string()]);
        let x = find_decl(&decls, "x");
        assert_eq!(x.kind, SymbolKind::Variable);
        assert!(!x.exported);
        assert_eq!(&src[x.span_start..x.span_end], "var x, y int");
    }

    #[test]
    fn doc_comments_are_collected() {
        let src = "package p\n\n// unrelated\n\n// Run starts things.\n// It blocks.\nfunc Run() {}\n";
        let decls = extract_from(src);
        assert_eq!(find_decl(&decls, "Run").doc, "Run starts things.\nIt blocks.");
    }

    #[test]
    fn header_imports_and_package() {
        let src = "//go:build wireinject\n\npackage app\n\nimport (\n\t\"fmt\"\n\tlog \"github.com/sirupsen/logrus\"\n)\n\nimport \"os\"\n";
        let tree = parse_source(src).unwrap();
        let header = extract_header(&tree, src);
        assert_eq!(header.package_name, "app");
        assert_eq!(header.imports.len(), 3);
        assert_eq!(header.imports[1].alias.as_deref(), Some("log"));
        assert_eq!(header.imports[1].path, "github.com/sirupsen/logrus");
        assert_eq!(header.imports[2].path, "os");
        assert_eq!(header.build_tags, vec!["wireinject".to_string()]);
    }

    #[test]
    fn build_tags_stop_at_package_clause() {
        let src = "// +build linux,!cgo\n\npackage p\n\n//go:build ignored\n";
        assert_eq!(build_tags(src), vec!["linux".to_string(), "cgo".to_string()]);
    }

    #[test]
    fn default_import_names() {
        assert_eq!(default_import_name("fmt"), "fmt");
        assert_eq!(default_import_name("net/http"), "http");
        assert_eq!(default_import_name("gopkg.in/yaml.v3"), "yaml");
        assert_eq!(default_import_name("github.com/go-chi/chi/v5"), "chi");
        assert_eq!(default_import_name("github.com/mattn/go-sqlite3"), "sqlite3");
        assert_eq!(default_import_name("go.uber.org/fx"), "fx");
    }

    #[test]
    fn node_at_refinds_spec() {
        let src = "package p\n\ntype (\n\tA int\n\tB struct{}\n)\n";
        let tree = parse_source(src).unwrap();
        let decls = extract_declarations(&tree, src);
        let b = find_decl(&decls, "B");
        let node = node_at(&tree, b.node_kind, b.node_start, b.node_end).unwrap();
        assert_eq!(node.kind(), "type_spec");
        assert_eq!(node_text(node, src.as_bytes()), "B struct{}");
    }
}
