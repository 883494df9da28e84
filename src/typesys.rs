//! Go type expressions: universe scope, canonical rendering and
//! conversion into model [`TypeExpr`]s.
//!
//! Method matching for structural interface satisfaction compares
//! canonical strings, so two spellings of the same type (`io.Reader` via an
//! alias import, `T` inside its own package) must render identically.

use std::collections::{HashMap, HashSet};

use tree_sitter::Node;

use crate::indexer::{field_children, named_children, node_text};
use crate::model::{TypeExpr, TypeName};
use crate::types::SymbolKind;

/// Package path reported for universe-scope declarations.
pub const BUILTIN_PACKAGE: &str = "builtin";

const BUILTIN_TYPES: &[&str] = &[
    "any", "bool", "byte", "comparable", "complex64", "complex128", "error", "float32", "float64",
    "int", "int8", "int16", "int32", "int64", "rune", "string", "uint", "uint8", "uint16",
    "uint32", "uint64", "uintptr",
];

const BUILTIN_CONSTS: &[&str] = &["true", "false", "iota", "nil"];

const BUILTIN_FUNCS: &[(&str, &str)] = &[
    ("append", "func append(slice []Type, elems ...Type) []Type"),
    ("cap", "func cap(v Type) int"),
    ("clear", "func clear[T ~[]Type | ~map[Type]Type1](t T)"),
    ("close", "func close(c chan<- Type)"),
    ("complex", "func complex(r, i FloatType) ComplexType"),
    ("copy", "func copy(dst, src []Type) int"),
    ("delete", "func delete(m map[Type]Type1, key Type)"),
    ("imag", "func imag(c ComplexType) FloatType"),
    ("len", "func len(v Type) int"),
    ("make", "func make(t Type, size ...IntegerType) Type"),
    ("max", "func max[T cmp.Ordered](x T, y ...T) T"),
    ("min", "func min[T cmp.Ordered](x T, y ...T) T"),
    ("new", "func new(Type) *Type"),
    ("panic", "func panic(v any)"),
    ("print", "func print(args ...Type)"),
    ("println", "func println(args ...Type)"),
    ("real", "func real(c ComplexType) FloatType"),
    ("recover", "func recover() any"),
];

/// A universe-scope name: its kind and, for functions, its signature.
pub fn universe(name: &str) -> Option<(SymbolKind, Option<&'static str>)> {
    if BUILTIN_TYPES.contains(&name) {
        let kind = if name == "error" || name == "any" || name == "comparable" {
            SymbolKind::Interface
        } else {
            SymbolKind::Type
        };
        return Some((kind, None));
    }
    if BUILTIN_CONSTS.contains(&name) {
        let kind = if name == "nil" {
            SymbolKind::Variable
        } else {
            SymbolKind::Constant
        };
        return Some((kind, None));
    }
    BUILTIN_FUNCS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, sig)| (SymbolKind::Function, Some(*sig)))
}

pub fn is_builtin_type(name: &str) -> bool {
    BUILTIN_TYPES.contains(&name)
}

/// Name resolution context for type expressions of one file.
pub struct TypeContext<'a> {
    /// Package path of the file.
    pub package: &'a str,
    /// Local import name -> import path.
    pub imports: &'a HashMap<String, String>,
    /// Type parameters in scope; rendered by name, never qualified.
    pub type_params: HashSet<String>,
    /// Whether a name is declared in the file's package scope.
    pub declared: &'a dyn Fn(&str) -> bool,
}

impl<'a> TypeContext<'a> {
    pub fn new(
        package: &'a str,
        imports: &'a HashMap<String, String>,
        declared: &'a dyn Fn(&str) -> bool,
    ) -> Self {
        Self {
            package,
            imports,
            type_params: HashSet::new(),
            declared,
        }
    }

    /// Add the names of a `[T any, U comparable]` list.
    pub fn with_type_params(mut self, list: Option<Node>, src: &[u8]) -> Self {
        if let Some(list) = list {
            for param in named_children(list) {
                for name in field_children(param, "name") {
                    self.type_params.insert(node_text(name, src).to_string());
                }
            }
        }
        self
    }

    /// Resolve a bare type name.
    pub fn resolve_ident(&self, name: &str) -> TypeExpr {
        if self.type_params.contains(name) {
            return TypeExpr::Other(name.to_string());
        }
        if !(self.declared)(name) && is_builtin_type(name) {
            return TypeExpr::Builtin(name.to_string());
        }
        TypeExpr::Named(TypeName::new(self.package, name))
    }

    /// Resolve `pkg.Name` through the file's imports.
    pub fn resolve_qualified(&self, package: &str, name: &str) -> Option<TypeName> {
        self.imports
            .get(package)
            .map(|path| TypeName::new(path.clone(), name))
    }

    /// Convert a type node into a model [`TypeExpr`].
    pub fn type_expr(&self, node: Node, src: &[u8]) -> TypeExpr {
        match node.kind() {
            "type_identifier" | "identifier" => self.resolve_ident(node_text(node, src)),
            "qualified_type" => {
                let pkg = node.child_by_field_name("package").map(|n| node_text(n, src));
                let name = node.child_by_field_name("name").map(|n| node_text(n, src));
                match (pkg, name) {
                    (Some(pkg), Some(name)) => match self.resolve_qualified(pkg, name) {
                        Some(t) => TypeExpr::Named(t),
                        None => TypeExpr::Other(node_text(node, src).to_string()),
                    },
                    _ => TypeExpr::Other(node_text(node, src).to_string()),
                }
            }
            "pointer_type" => match node.named_child(0u32) {
                Some(inner) => TypeExpr::Pointer(Box::new(self.type_expr(inner, src))),
                None => TypeExpr::Other(node_text(node, src).to_string()),
            },
            "generic_type" | "parenthesized_type" => {
                let inner = node
                    .child_by_field_name("type")
                    .or_else(|| node.named_child(0u32));
                match inner {
                    Some(inner) => self.type_expr(inner, src),
                    None => TypeExpr::Other(node_text(node, src).to_string()),
                }
            }
            _ => TypeExpr::Other(self.canonical(node, src)),
        }
    }

    /// The named type behind a type node, pointers and type arguments
    /// stripped.  `None` for builtins, type parameters and composite types.
    pub fn type_name(&self, node: Node, src: &[u8]) -> Option<TypeName> {
        match self.type_expr(node, src) {
            TypeExpr::Named(t) => Some(t),
            TypeExpr::Pointer(inner) => inner.named().cloned(),
            TypeExpr::Builtin(_) | TypeExpr::Other(_) => None,
        }
    }

    /// Canonical rendering of a type node.
    pub fn canonical(&self, node: Node, src: &[u8]) -> String {
        match node.kind() {
            "type_identifier" | "identifier" => match self.resolve_ident(node_text(node, src)) {
                TypeExpr::Named(t) => t.to_string(),
                TypeExpr::Builtin(n) | TypeExpr::Other(n) => n,
                TypeExpr::Pointer(_) => node_text(node, src).to_string(),
            },
            "qualified_type" => match self.type_expr(node, src) {
                TypeExpr::Named(t) => t.to_string(),
                _ => node_text(node, src).to_string(),
            },
            "pointer_type" => format!("*{}", self.canonical_child(node, src)),
            "slice_type" => format!("[]{}", self.canonical_field(node, "element", src)),
            "array_type" => {
                let len = field_text_compact(node, "length", src);
                format!("[{len}]{}", self.canonical_field(node, "element", src))
            }
            "implicit_length_array_type" => {
                format!("[...]{}", self.canonical_field(node, "element", src))
            }
            "map_type" => format!(
                "map[{}]{}",
                self.canonical_field(node, "key", src),
                self.canonical_field(node, "value", src)
            ),
            "channel_type" => {
                let text = node_text(node, src);
                let dir = if text.starts_with("<-") {
                    "<-chan "
                } else if text.starts_with("chan<-") || text.starts_with("chan <-") {
                    "chan<- "
                } else {
                    "chan "
                };
                format!("{dir}{}", self.canonical_field(node, "value", src))
            }
            "function_type" => format!(
                "func{}",
                self.signature(
                    node.child_by_field_name("parameters"),
                    node.child_by_field_name("result"),
                    src
                )
            ),
            "generic_type" => {
                let base = node
                    .child_by_field_name("type")
                    .map(|t| self.canonical(t, src))
                    .unwrap_or_default();
                let args: Vec<String> = node
                    .child_by_field_name("type_arguments")
                    .map(named_children)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|a| self.canonical(unwrap_elem(a), src))
                    .collect();
                format!("{base}[{}]", args.join(","))
            }
            "parenthesized_type" => self.canonical_child(node, src),
            "interface_type" if named_children(node).is_empty() => "interface{}".to_string(),
            "struct_type" if collapse(node_text(node, src)) == "struct{}" => "struct{}".to_string(),
            _ => collapse(node_text(node, src)),
        }
    }

    fn canonical_child(&self, node: Node, src: &[u8]) -> String {
        node.named_child(0u32)
            .map(|c| self.canonical(c, src))
            .unwrap_or_default()
    }

    fn canonical_field(&self, node: Node, field: &str, src: &[u8]) -> String {
        node.child_by_field_name(field)
            .map(|c| self.canonical(c, src))
            .unwrap_or_default()
    }

    /// Canonical `(params)(results)` of a function or method.
    ///
    /// Parameter names are dropped; `a, b int` counts as two `int`s.
    pub fn signature(&self, params: Option<Node>, result: Option<Node>, src: &[u8]) -> String {
        let params = params.map(|p| self.param_types(p, src)).unwrap_or_default();
        let results = match result {
            None => Vec::new(),
            Some(r) if r.kind() == "parameter_list" => self.param_types(r, src),
            Some(r) => vec![self.canonical(r, src)],
        };
        format!("({})({})", params.join(","), results.join(","))
    }

    /// Canonical types of a parameter list, one entry per parameter.
    pub fn param_types(&self, list: Node, src: &[u8]) -> Vec<String> {
        let mut out = Vec::new();
        for param in named_children(list) {
            let Some(ty) = param.child_by_field_name("type") else {
                continue;
            };
            let mut rendered = self.canonical(ty, src);
            if param.kind() == "variadic_parameter_declaration" {
                rendered = format!("...{rendered}");
            }
            let count = field_children(param, "name").len().max(1);
            for _ in 0..count {
                out.push(rendered.clone());
            }
        }
        out
    }

    /// Model types of a parameter list, one entry per parameter.
    pub fn param_exprs(&self, list: Node, src: &[u8]) -> Vec<TypeExpr> {
        let mut out = Vec::new();
        for param in named_children(list) {
            let Some(ty) = param.child_by_field_name("type") else {
                continue;
            };
            let expr = if param.kind() == "variadic_parameter_declaration" {
                TypeExpr::Other(format!("...{}", self.canonical(ty, src)))
            } else {
                self.type_expr(ty, src)
            };
            let count = field_children(param, "name").len().max(1);
            for _ in 0..count {
                out.push(expr.clone());
            }
        }
        out
    }

    /// Model types of a function result (a list or a single type).
    pub fn result_exprs(&self, result: Option<Node>, src: &[u8]) -> Vec<TypeExpr> {
        match result {
            None => Vec::new(),
            Some(r) if r.kind() == "parameter_list" => self.param_exprs(r, src),
            Some(r) => vec![self.type_expr(r, src)],
        }
    }
}

/// Type arguments may be wrapped in `type_elem` nodes.
fn unwrap_elem(node: Node) -> Node {
    if node.kind() == "type_elem"
        && node.named_child_count() == 1
        && let Some(inner) = node.named_child(0u32)
    {
        return inner;
    }
    node
}

fn field_text_compact(node: Node, field: &str, src: &[u8]) -> String {
    node.child_by_field_name(field)
        .map(|n| collapse(node_text(n, src)))
        .unwrap_or_default()
}

/// Remove all whitespace so formatting differences do not matter.
fn collapse(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::parse_source;

    fn with_ctx<R>(package_decls: &[&str], f: impl FnOnce(&TypeContext) -> R) -> R {
        let mut imports = HashMap::new();
        imports.insert("io".to_string(), "io".to_string());
        imports.insert("pb".to_string(), "example.com/m/gen/proto".to_string());
        let decls: HashSet<String> = package_decls.iter().map(|s| s.to_string()).collect();
        let declared = move |n: &str| decls.contains(n);
        let ctx = TypeContext::new("example.com/m/store", &imports, &declared);
        f(&ctx)
    }

    /// Canonical signature of the first method in `src`.
    fn method_sig(src: &str, package_decls: &[&str]) -> String {
        let tree = parse_source(src).unwrap();
        let root = tree.root_node();
        let method = named_children(root)
            .into_iter()
            .find(|n| n.kind() == "method_declaration")
            .unwrap();
        with_ctx(package_decls, |ctx| {
            ctx.signature(
                method.child_by_field_name("parameters"),
                method.child_by_field_name("result"),
                src.as_bytes(),
            )
        })
    }

    #[test]
    fn universe_lookup() {
        assert_eq!(universe("len").map(|u| u.0), Some(SymbolKind::Function));
        assert!(universe("len").unwrap().1.unwrap().starts_with("func len"));
        assert_eq!(universe("error").map(|u| u.0), Some(SymbolKind::Interface));
        assert_eq!(universe("true").map(|u| u.0), Some(SymbolKind::Constant));
        assert!(universe("Println").is_none());
    }

    #[test]
    fn names_are_dropped_and_types_qualified() {
        let sig = method_sig(
            "package p\nfunc (s *S) Get(ctx Ctx, a, b int, r io.Reader) (*Item, error) { return nil, nil }\n",
            &["Ctx", "Item", "S"],
        );
        assert_eq!(
            sig,
            "(example.com/m/store.Ctx,int,int,io.Reader)(*example.com/m/store.Item,error)"
        );
    }

    #[test]
    fn composite_types_render_canonically() {
        let sig = method_sig(
            "package p\nfunc (s S) Put(m map[string] []byte, ch <-chan pb.Msg, opts ...Opt) func(int) bool { return nil }\n",
            &["Opt", "S"],
        );
        assert_eq!(
            sig,
            "(map[string][]byte,<-chan example.com/m/gen/proto.Msg,...example.com/m/store.Opt)(func(int)(bool))"
        );
    }

    #[test]
    fn package_scope_shadows_builtin_types() {
        with_ctx(&["error"], |ctx| {
            assert_eq!(
                ctx.resolve_ident("error"),
                TypeExpr::Named(TypeName::new("example.com/m/store", "error"))
            );
            assert_eq!(ctx.resolve_ident("int"), TypeExpr::Builtin("int".into()));
        });
    }

    #[test]
    fn result_exprs_keep_pointers() {
        let src = "package p\nfunc NewRepo(db *pb.DB) (*Repo, error) { return nil, nil }\n";
        let tree = parse_source(src).unwrap();
        let func = named_children(tree.root_node())
            .into_iter()
            .find(|n| n.kind() == "function_declaration")
            .unwrap();
        with_ctx(&["Repo"], |ctx| {
            let params = ctx.param_exprs(func.child_by_field_name("parameters").unwrap(), src.as_bytes());
            assert_eq!(
                params[0].named(),
                Some(&TypeName::new("example.com/m/gen/proto", "DB"))
            );
            let results = ctx.result_exprs(func.child_by_field_name("result"), src.as_bytes());
            assert!(matches!(results[0], TypeExpr::Pointer(_)));
            assert_eq!(results[1], TypeExpr::Builtin("error".into()));
        });
    }
}
