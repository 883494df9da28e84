//! Identifier-use scanning and resolution for [`GoProgram`].
//!
//! This is a syntactic approximation of Go scoping.  Every name bound
//! anywhere inside a declaration (parameters, short variable declarations,
//! closure parameters, range and type-switch bindings, local types) forms
//! one function-wide local environment that shadows package scope.  Member
//! selections `v.m` are resolved through a small type inference over that
//! environment.

use std::collections::{HashMap, HashSet};

use tree_sitter::Node;

use crate::indexer::{field_children, named_children, node_text};
use crate::model::{
    DeclId, ExternalDecl, ProgramModel, Resolution, TypeExpr, TypeName, UseBinding, UseConstruct,
    UseSite,
};
use crate::program::{GoProgram, SourceFile, composite_type};
use crate::types::SymbolKind;
use crate::typesys::{BUILTIN_PACKAGE, TypeContext, universe};

/// How far inference follows package variables and call results.
const MAX_INFER_DEPTH: usize = 6;

/// Names bound inside one declaration, with their inferred types.
type LocalEnv = HashMap<String, Option<TypeName>>;

struct Scanner<'p, 'c> {
    program: &'p GoProgram,
    file: &'p SourceFile,
    src: &'p [u8],
    ctx: &'c TypeContext<'c>,
    scope: DeclId,
    locals: LocalEnv,
    uses: Vec<UseSite>,
}

impl GoProgram {
    /// Every identifier use inside a declaration, in source order.
    pub(crate) fn scan_uses(&self, id: DeclId) -> Vec<UseSite> {
        let file = self.file_of(id);
        self.with_ctx(id, |ctx, node, src| {
            let mut scanner = Scanner {
                program: self,
                file,
                src,
                ctx,
                scope: id,
                locals: LocalEnv::new(),
                uses: Vec::new(),
            };
            let roots = scan_roots(node);
            if node.kind() == "method_declaration"
                && let Some(recv) = node.child_by_field_name("receiver")
            {
                scanner.bind_params(recv);
            }
            for root in &roots {
                scanner.collect_locals(*root);
            }
            for root in &roots {
                scanner.visit(*root);
            }
            scanner.uses
        })
        .unwrap_or_default()
    }

    /// Resolve one use site against package scope, imports and members.
    pub(crate) fn resolve_site(&self, site: &UseSite) -> Resolution {
        let package = &self.declaration(site.scope).package;
        match &site.binding {
            UseBinding::Unqualified => {
                if let Some(id) = self.lookup_scope(package, &site.name) {
                    return Resolution::Declaration(id);
                }
                match universe(&site.name) {
                    Some((kind, signature)) => Resolution::External(ExternalDecl {
                        package: BUILTIN_PACKAGE.to_string(),
                        name: site.name.clone(),
                        kind,
                        signature: signature.map(str::to_string),
                        builtin: true,
                    }),
                    None => Resolution::Unresolved,
                }
            }
            UseBinding::Package(path) => {
                if self.is_local_package(path) {
                    return self
                        .lookup_scope(path, &site.name)
                        .map_or(Resolution::Unresolved, Resolution::Declaration);
                }
                let kind = match site.construct {
                    UseConstruct::Call => SymbolKind::Function,
                    UseConstruct::Type => SymbolKind::Type,
                    UseConstruct::Selector | UseConstruct::Value => {
                        if site.name.chars().next().is_some_and(char::is_uppercase) {
                            SymbolKind::Variable
                        } else {
                            return Resolution::Unresolved;
                        }
                    }
                };
                Resolution::External(ExternalDecl {
                    package: path.clone(),
                    name: site.name.clone(),
                    kind,
                    signature: None,
                    builtin: false,
                })
            }
            UseBinding::Member(ty) => {
                if self.is_local_package(&ty.package) {
                    let mut seen = HashSet::new();
                    return match self.lookup_member(ty, &site.name, &mut seen) {
                        Some(Member::Local(id)) => Resolution::Declaration(id),
                        Some(Member::External(owner)) => external_member(&owner, site),
                        None => Resolution::Unresolved,
                    };
                }
                external_member(ty, site)
            }
        }
    }

    /// Find the declaration providing `ty.name`: a method, the struct
    /// owning a field, or the interface declaring a method.  Follows
    /// embedded fields.
    fn lookup_member(&self, ty: &TypeName, name: &str, seen: &mut HashSet<TypeName>) -> Option<Member> {
        if !seen.insert(ty.clone()) {
            return None;
        }
        if let Some(id) = self.lookup_method(ty, name) {
            return Some(Member::Local(id));
        }
        let decl = self.type_decl(ty)?;
        match self.declaration(decl).kind {
            SymbolKind::Struct => {
                let fields = self.struct_fields(decl);
                if fields.iter().any(|f| !f.embedded && f.name == name) {
                    return Some(Member::Local(decl));
                }
                let mut external_owner = None;
                for field in fields.iter().filter(|f| f.embedded) {
                    if field.name == name {
                        return Some(Member::Local(decl));
                    }
                    let Some(inner) = field.ty.named() else {
                        continue;
                    };
                    if self.is_local_package(&inner.package) {
                        if let Some(found) = self.lookup_member(inner, name, seen) {
                            return Some(found);
                        }
                    } else if external_owner.is_none() {
                        external_owner = Some(inner.clone());
                    }
                }
                external_owner.map(Member::External)
            }
            SymbolKind::Interface => {
                let declares = self
                    .with_ctx(decl, |_, node, src| interface_declares(node, name, src))
                    .unwrap_or(false);
                declares.then_some(Member::Local(decl))
            }
            _ => None,
        }
    }

    /// Result type of calling a function declaration.
    fn call_result(&self, id: DeclId) -> Option<TypeName> {
        let sig = self.function_signature(id)?;
        sig.results.first().and_then(TypeExpr::named).cloned()
    }

    /// Type of field `name` of the struct behind `ty`.
    fn field_type(&self, ty: &TypeName, name: &str, seen: &mut HashSet<TypeName>) -> Option<TypeName> {
        if !seen.insert(ty.clone()) {
            return None;
        }
        let decl = self.type_decl(ty)?;
        let fields = self.struct_fields(decl);
        if let Some(f) = fields.iter().find(|f| f.name == name) {
            return f.ty.named().cloned();
        }
        fields
            .iter()
            .filter(|f| f.embedded)
            .filter_map(|f| f.ty.named())
            .find_map(|inner| self.field_type(inner, name, seen))
    }

    /// Type produced by a package-level declaration used as a value.
    fn value_type(&self, id: DeclId, name: &str, depth: usize) -> Option<TypeName> {
        if depth > MAX_INFER_DEPTH {
            return None;
        }
        match self.declaration(id).kind {
            SymbolKind::Variable | SymbolKind::Constant => self.var_type(id, name),
            _ => None,
        }
    }
}

enum Member {
    Local(DeclId),
    /// Promoted from an embedded type outside the module.
    External(TypeName),
}

fn external_member(owner: &TypeName, site: &UseSite) -> Resolution {
    let kind = if site.construct == UseConstruct::Call {
        SymbolKind::Method
    } else {
        SymbolKind::Variable
    };
    Resolution::External(ExternalDecl {
        package: owner.package.clone(),
        name: format!("{}.{}", owner.name, site.name),
        kind,
        signature: None,
        builtin: false,
    })
}

fn interface_declares(node: Node, name: &str, src: &[u8]) -> bool {
    let Some(body) = node.child_by_field_name("type") else {
        return false;
    };
    named_children(body).into_iter().any(|elem| {
        elem.kind() == "method_elem"
            && elem
                .child_by_field_name("name")
                .is_some_and(|n| node_text(n, src) == name)
    })
}

/// Subtrees of a declaration that may contain uses.
fn scan_roots(node: Node<'_>) -> Vec<Node<'_>> {
    let fields: &[&str] = match node.kind() {
        "function_declaration" | "method_declaration" => {
            &["receiver", "type_parameters", "parameters", "result", "body"]
        }
        "type_spec" | "type_alias" => &["type_parameters", "type"],
        "const_spec" | "var_spec" => &["type", "value"],
        _ => &[],
    };
    fields
        .iter()
        .filter_map(|f| node.child_by_field_name(f))
        .collect()
}

fn is_callee(node: Node) -> bool {
    node.parent().is_some_and(|p| {
        p.kind() == "call_expression"
            && p.child_by_field_name("function")
                .is_some_and(|f| f.id() == node.id())
    })
}

impl<'p, 'c> Scanner<'p, 'c> {
    fn text(&self, node: Node) -> &'p str {
        node_text(node, self.src)
    }

    fn bind(&mut self, name: &str, ty: Option<TypeName>) {
        if name != "_" {
            self.locals.insert(name.to_string(), ty);
        }
    }

    /// Bind every name of a parameter list with its declared type.
    fn bind_params(&mut self, list: Node) {
        for param in named_children(list) {
            let ty = param
                .child_by_field_name("type")
                .and_then(|t| self.ctx.type_name(t, self.src));
            for name in field_children(param, "name") {
                let name = self.text(name);
                self.bind(name, ty.clone());
            }
        }
    }

    /// Bind identifiers of an `expression_list` (or single expression)
    /// on the left of `:=`, `range` or a type switch.
    fn bind_lhs(&mut self, left: Node, types: &[Option<TypeName>]) {
        let idents: Vec<Node> = if left.kind() == "expression_list" {
            named_children(left)
        } else {
            vec![left]
        };
        for (i, ident) in idents.into_iter().enumerate() {
            if ident.kind() == "identifier" {
                let name = self.text(ident);
                self.bind(name, types.get(i).cloned().flatten());
            }
        }
    }

    /// Walk a subtree in source order, binding local names.
    fn collect_locals(&mut self, node: Node) {
        match node.kind() {
            "parameter_list" => self.bind_params(node),
            "type_parameter_list" => {
                for param in named_children(node) {
                    for name in field_children(param, "name") {
                        let name = self.text(name);
                        self.bind(name, None);
                    }
                }
            }
            "short_var_declaration" => {
                let types = match (node.child_by_field_name("left"), node.child_by_field_name("right")) {
                    (Some(_), Some(right)) => self.infer_list(right),
                    _ => Vec::new(),
                };
                if let Some(left) = node.child_by_field_name("left") {
                    self.bind_lhs(left, &types);
                }
            }
            "var_spec" | "const_spec" => {
                let declared = node
                    .child_by_field_name("type")
                    .and_then(|t| self.ctx.type_name(t, self.src));
                let values = node
                    .child_by_field_name("value")
                    .map(|v| self.infer_list(v))
                    .unwrap_or_default();
                for (i, name) in field_children(node, "name").into_iter().enumerate() {
                    let ty = declared.clone().or_else(|| values.get(i).cloned().flatten());
                    let name = self.text(name);
                    self.bind(name, ty);
                }
            }
            "type_spec" | "type_alias" => {
                if let Some(name) = node.child_by_field_name("name") {
                    let name = self.text(name);
                    self.bind(name, None);
                }
            }
            "range_clause" => {
                if let Some(left) = node.child_by_field_name("left") {
                    self.bind_lhs(left, &[]);
                }
            }
            "type_switch_statement" => {
                if let Some(alias) = node.child_by_field_name("alias") {
                    self.bind_lhs(alias, &[]);
                }
            }
            "receive_statement" => {
                let declares = {
                    let mut cursor = node.walk();
                    let found = node.children(&mut cursor).any(|c| c.kind() == ":=");
                    found
                };
                if declares && let Some(left) = node.child_by_field_name("left") {
                    self.bind_lhs(left, &[]);
                }
            }
            "labeled_statement" => {}
            _ => {}
        }
        for child in named_children(node) {
            // Parameter lists were bound above; their children hold no
            // further declarations.
            if node.kind() != "parameter_list" {
                self.collect_locals(child);
            }
        }
    }

    fn infer_list(&self, list: Node) -> Vec<Option<TypeName>> {
        let exprs = if list.kind() == "expression_list" {
            named_children(list)
        } else {
            vec![list]
        };
        if exprs.len() == 1 && exprs[0].kind() == "call_expression" {
            // `a, err := f()` takes each result in turn.
            if let Some(results) = self.call_results(exprs[0]) {
                return results;
            }
        }
        exprs.into_iter().map(|e| self.infer(e, 0)).collect()
    }

    /// Result types of a call to a module function or method.
    fn call_results(&self, call: Node) -> Option<Vec<Option<TypeName>>> {
        let callee = call.child_by_field_name("function")?;
        let id = self.callee_decl(callee, 0)?;
        let sig = self.program.function_signature(id)?;
        Some(sig.results.iter().map(|r| r.named().cloned()).collect())
    }

    /// The module declaration a callee expression names, if any.
    fn callee_decl(&self, callee: Node, depth: usize) -> Option<DeclId> {
        match callee.kind() {
            "identifier" => {
                let name = self.text(callee);
                if self.locals.contains_key(name) {
                    return None;
                }
                self.program.lookup_scope(&self.file.package, name)
            }
            "selector_expression" => {
                let operand = callee.child_by_field_name("operand")?;
                let field = self.text(callee.child_by_field_name("field")?);
                if let Some(path) = self.import_path(operand) {
                    return self.program.lookup_scope(path, field);
                }
                let ty = self.infer(operand, depth + 1)?;
                self.program.lookup_method(&ty, field)
            }
            "parenthesized_expression" => self.callee_decl(callee.named_child(0u32)?, depth),
            _ => None,
        }
    }

    /// The import path when `operand` is an unshadowed import name.
    fn import_path(&self, operand: Node) -> Option<&'p str> {
        if operand.kind() != "identifier" {
            return None;
        }
        let name = self.text(operand);
        if self.locals.contains_key(name) {
            return None;
        }
        self.file.imports.get(name).map(String::as_str)
    }

    /// Infer the (pointer-stripped) named type of an expression.
    fn infer(&self, expr: Node, depth: usize) -> Option<TypeName> {
        if depth > MAX_INFER_DEPTH {
            return None;
        }
        match expr.kind() {
            "identifier" => {
                let name = self.text(expr);
                if let Some(ty) = self.locals.get(name) {
                    return ty.clone();
                }
                let id = self.program.lookup_scope(&self.file.package, name)?;
                self.program.value_type(id, name, depth)
            }
            "composite_literal" | "unary_expression" => composite_type(self.ctx, expr, self.src)
                .or_else(|| {
                    let operand = expr.child_by_field_name("operand")?;
                    self.infer(operand, depth + 1)
                }),
            "parenthesized_expression" => self.infer(expr.named_child(0u32)?, depth + 1),
            "type_assertion_expression" => self.ctx.type_name(expr.child_by_field_name("type")?, self.src),
            "call_expression" => {
                let callee = expr.child_by_field_name("function")?;
                if callee.kind() == "identifier" && self.text(callee) == "new" {
                    let arg = expr.child_by_field_name("arguments")?.named_child(0u32)?;
                    return self.ctx.type_name(arg, self.src);
                }
                let id = self.callee_decl(callee, depth)?;
                let decl = self.program.declaration(id);
                if decl.kind.is_type() {
                    // Conversion `T(x)`.
                    return Some(TypeName::new(decl.package.clone(), decl.name.clone()));
                }
                self.program.call_result(id)
            }
            "selector_expression" => {
                let operand = expr.child_by_field_name("operand")?;
                let field = self.text(expr.child_by_field_name("field")?);
                if let Some(path) = self.import_path(operand) {
                    let id = self.program.lookup_scope(path, field)?;
                    return self.program.value_type(id, field, depth + 1);
                }
                let owner = self.infer(operand, depth + 1)?;
                self.program.field_type(&owner, field, &mut HashSet::new())
            }
            _ => None,
        }
    }

    fn push(&mut self, name: &str, node: Node, construct: UseConstruct, binding: UseBinding) {
        self.uses.push(UseSite {
            scope: self.scope,
            name: name.to_string(),
            construct,
            offset: node.start_byte(),
            binding,
        });
    }

    /// Record uses in a subtree.
    fn visit(&mut self, node: Node) {
        match node.kind() {
            "identifier" => {
                let name = self.text(node);
                if name == "_" || self.locals.contains_key(name) {
                    return;
                }
                let construct = if is_callee(node) {
                    UseConstruct::Call
                } else {
                    UseConstruct::Value
                };
                self.push(name, node, construct, UseBinding::Unqualified);
            }
            "type_identifier" => {
                let name = self.text(node);
                if self.ctx.type_params.contains(name) || self.locals.contains_key(name) {
                    return;
                }
                self.push(name, node, UseConstruct::Type, UseBinding::Unqualified);
            }
            "qualified_type" => {
                let (Some(pkg), Some(name)) = (
                    node.child_by_field_name("package"),
                    node.child_by_field_name("name"),
                ) else {
                    return;
                };
                let file = self.file;
                match file.imports.get(self.text(pkg)) {
                    Some(path) => {
                        let name = self.text(name);
                        self.push(name, node, UseConstruct::Type, UseBinding::Package(path.clone()));
                    }
                    None => tracing::trace!(qualified = %self.text(node), "unknown package qualifier"),
                }
            }
            "selector_expression" => self.visit_selector(node),
            "keyed_element" => self.visit_keyed(node),
            // Declared names: field names, method names in interfaces,
            // labels and package qualifiers.
            "field_identifier" | "package_identifier" | "label_name" | "comment" => {}
            _ => {
                for child in named_children(node) {
                    self.visit(child);
                }
            }
        }
    }

    fn visit_selector(&mut self, node: Node) {
        let (Some(operand), Some(field)) = (
            node.child_by_field_name("operand"),
            node.child_by_field_name("field"),
        ) else {
            return;
        };
        let name = self.text(field);
        let called = is_callee(node);

        if let Some(path) = self.import_path(operand) {
            let construct = if called {
                UseConstruct::Call
            } else {
                UseConstruct::Value
            };
            self.push(name, field, construct, UseBinding::Package(path.to_string()));
            return;
        }

        self.visit(operand);
        let construct = if called {
            UseConstruct::Call
        } else {
            UseConstruct::Selector
        };
        match self.infer(operand, 0) {
            Some(ty) => self.push(name, field, construct, UseBinding::Member(ty)),
            None => tracing::trace!(member = name, operand = %self.text(operand), "cannot infer receiver type"),
        }
    }

    /// Struct-literal keys name fields, not values; map keys are uses.
    fn visit_keyed(&mut self, node: Node) {
        let children = named_children(node);
        let in_map = node
            .parent()
            .and_then(|lit| lit.parent())
            .and_then(|c| c.child_by_field_name("type"))
            .is_some_and(|t| t.kind() == "map_type");
        for (i, child) in children.into_iter().enumerate() {
            if i == 0 && !in_map {
                let key = if child.kind() == "literal_element" {
                    child.named_child(0u32).unwrap_or(child)
                } else {
                    child
                };
                if key.kind() == "identifier" || key.kind() == "field_identifier" {
                    continue;
                }
            }
            self.visit(child);
        }
    }
}
