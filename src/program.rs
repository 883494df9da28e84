//! The Go frontend: loads a module into a [`ProgramModel`].
//!
//! Loading walks the module, parses every file in parallel, groups files
//! into one package per directory and builds package scopes plus a method
//! table keyed by receiver type.  Identifier resolution and type inference
//! live in [`crate::resolve`]; this module owns the data and the
//! structural method-set comparison.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use rayon::prelude::*;
use regex::Regex;
use tree_sitter::{Node, Tree};

use crate::errors::ExtractError;
use crate::indexer::{
    self, FileHeader, default_import_name, field_children, first_line, named_children, node_at,
    node_text,
};
use crate::model::{
    CallArg, CallSite, DeclId, Declaration, FuncSignature, ProgramModel, ReceiverForm,
    Resolution, ReturnShape, TypeExpr, TypeName, UseSite,
};
use crate::types::{Symbol, SymbolKind};
use crate::typesys::TypeContext;
use crate::walker::Walker;

/// Build tag marking Wire injector templates.
pub const WIREINJECT_TAG: &str = "wireinject";

static MODULE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*module\s+"?([^\s"]+)"?"#).expect("module directive regex is valid")
});

/// Options for loading a module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Extra exclusion globs, relative to the module root.
    pub ignore_patterns: Vec<String>,
}

/// One parsed source file.
pub(crate) struct SourceFile {
    pub(crate) path: PathBuf,
    /// Package path.
    pub(crate) package: String,
    pub(crate) source: String,
    pub(crate) tree: Tree,
    pub(crate) header: FileHeader,
    /// Local import name -> import path.
    pub(crate) imports: HashMap<String, String>,
    /// Carries the `wireinject` build tag.
    pub(crate) injector: bool,
    pub(crate) decls: Vec<DeclId>,
}

struct Package {
    name: String,
    files: Vec<usize>,
    decls: Vec<DeclId>,
}

/// Where a declaration's syntax node lives.
pub(crate) struct DeclSite {
    pub(crate) file: usize,
    pub(crate) node_kind: &'static str,
    pub(crate) node_start: usize,
    pub(crate) node_end: usize,
}

/// A struct field as seen by member lookup.
pub(crate) struct FieldInfo {
    /// Field name; the type name for embedded fields.
    pub(crate) name: String,
    pub(crate) ty: TypeExpr,
    pub(crate) embedded: bool,
}

/// A Go module loaded with tree-sitter.
pub struct GoProgram {
    root: PathBuf,
    module: String,
    pub(crate) files: Vec<SourceFile>,
    file_index: HashMap<PathBuf, usize>,
    packages: BTreeMap<String, Package>,
    decls: Vec<Declaration>,
    pub(crate) sites: Vec<DeclSite>,
    /// Package path -> name -> declaration (functions, types, vars, consts).
    scopes: HashMap<String, HashMap<String, DeclId>>,
    /// Receiver type -> method name -> method declaration.
    methods: HashMap<TypeName, BTreeMap<String, DeclId>>,
}

struct Parsed {
    path: PathBuf,
    source: String,
    tree: Tree,
    header: FileHeader,
}

impl GoProgram {
    /// Load every package of the module rooted at `root`.
    pub fn load(root: &Path, options: &LoadOptions) -> Result<GoProgram, ExtractError> {
        if !root.is_dir() {
            return Err(ExtractError::InvalidInput(format!(
                "module root is not a directory: {}",
                root.display()
            )));
        }
        let root = root
            .canonicalize()
            .map_err(|e| ExtractError::InvalidInput(format!("{}: {e}", root.display())))?;
        let module = read_module_path(&root);

        let paths = Walker::new(&root)
            .ignore_patterns(&options.ignore_patterns)
            .collect_paths()?;
        tracing::debug!(files = paths.len(), root = %root.display(), "walked module");

        let mut parsed: Vec<Parsed> = paths
            .par_iter()
            .filter_map(|path| match parse_file(path) {
                Ok(p) => Some(p),
                Err(err) => {
                    tracing::warn!(file = %path.display(), error = %err, "skipping file");
                    None
                }
            })
            .collect();
        parsed.sort_by(|a, b| a.path.cmp(&b.path));

        let program = Self::assemble(root, module, parsed);
        tracing::info!(
            module = %program.module,
            packages = program.packages.len(),
            files = program.files.len(),
            declarations = program.decls.len(),
            "loaded module"
        );
        Ok(program)
    }

    fn assemble(root: PathBuf, module: String, parsed: Vec<Parsed>) -> GoProgram {
        let mut program = GoProgram {
            root,
            module,
            files: Vec::with_capacity(parsed.len()),
            file_index: HashMap::new(),
            packages: BTreeMap::new(),
            decls: Vec::new(),
            sites: Vec::new(),
            scopes: HashMap::new(),
            methods: HashMap::new(),
        };

        // Files and packages.
        for p in parsed {
            let package = program.package_path_for(&p.path);
            let injector = p.header.build_tags.iter().any(|t| t == WIREINJECT_TAG);
            let idx = program.files.len();
            let entry = program
                .packages
                .entry(package.clone())
                .or_insert_with(|| Package {
                    name: String::new(),
                    files: Vec::new(),
                    decls: Vec::new(),
                });
            if entry.name.is_empty() || (!injector && entry.files.is_empty()) {
                entry.name = p.header.package_name.clone();
            }
            entry.files.push(idx);
            program.file_index.insert(p.path.clone(), idx);
            program.files.push(SourceFile {
                path: p.path,
                package,
                source: p.source,
                tree: p.tree,
                header: p.header,
                imports: HashMap::new(),
                injector,
                decls: Vec::new(),
            });
        }

        // Import names need every package's clause name.
        let package_names: HashMap<String, String> = program
            .packages
            .iter()
            .map(|(path, pkg)| (path.clone(), pkg.name.clone()))
            .collect();
        for file in &mut program.files {
            file.imports = import_names(&file.header, &package_names);
        }

        // Declarations, scopes and method tables.
        for idx in 0..program.files.len() {
            let raw = indexer::extract_declarations(&program.files[idx].tree, &program.files[idx].source);
            for r in raw {
                program.add_declaration(idx, r);
            }
        }
        program
    }

    fn add_declaration(&mut self, file_idx: usize, raw: indexer::RawDecl) {
        let id = DeclId(self.decls.len());
        let file = &mut self.files[file_idx];
        let package = file.package.clone();
        let mut names = vec![raw.name.clone()];
        names.extend(raw.other_names.iter().cloned());

        self.decls.push(Declaration {
            package: package.clone(),
            name: raw.name.clone(),
            kind: raw.kind,
            receiver: raw.receiver.clone(),
            file: file.path.clone(),
            line: raw.line,
            end_line: raw.end_line,
            column: raw.column,
            start_byte: raw.span_start,
            end_byte: raw.span_end,
            doc: raw.doc,
            exported: raw.exported,
        });
        self.sites.push(DeclSite {
            file: file_idx,
            node_kind: raw.node_kind,
            node_start: raw.node_start,
            node_end: raw.node_end,
        });
        file.decls.push(id);

        // Injector templates are replaced by generated code at build time.
        if file.injector {
            return;
        }
        if let Some(pkg) = self.packages.get_mut(&package) {
            pkg.decls.push(id);
        }
        match raw.receiver_base {
            Some(base) => {
                self.methods
                    .entry(TypeName::new(package, base))
                    .or_default()
                    .entry(raw.name)
                    .or_insert(id);
            }
            None if raw.kind == SymbolKind::Method => {}
            None => {
                let scope = self.scopes.entry(package).or_default();
                for name in names {
                    if name == "_" || name == "init" {
                        continue;
                    }
                    if scope.contains_key(&name) {
                        tracing::debug!(name = %name, "duplicate package-scope name, keeping first");
                        continue;
                    }
                    scope.insert(name, id);
                }
            }
        }
    }

    fn package_path_for(&self, file: &Path) -> String {
        let dir = file.parent().unwrap_or(&self.root);
        match dir.strip_prefix(&self.root) {
            Ok(rel) if rel.as_os_str().is_empty() => self.module.clone(),
            Ok(rel) => {
                let rel: Vec<String> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                format!("{}/{}", self.module, rel.join("/"))
            }
            Err(_) => self.module.clone(),
        }
    }

    /// The canonical module root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether an import path names a package of this module.
    pub(crate) fn is_local_package(&self, path: &str) -> bool {
        self.packages.contains_key(path)
    }

    pub(crate) fn lookup_scope(&self, package: &str, name: &str) -> Option<DeclId> {
        self.scopes.get(package).and_then(|s| s.get(name)).copied()
    }

    pub(crate) fn is_declared(&self, package: &str, name: &str) -> bool {
        self.scopes.get(package).is_some_and(|s| s.contains_key(name))
    }

    pub(crate) fn lookup_method(&self, ty: &TypeName, name: &str) -> Option<DeclId> {
        self.methods.get(ty).and_then(|m| m.get(name)).copied()
    }

    fn file_idx(&self, path: &Path) -> Option<usize> {
        if let Some(idx) = self.file_index.get(path) {
            return Some(*idx);
        }
        let canonical = path.canonicalize().ok()?;
        self.file_index.get(&canonical).copied()
    }

    pub(crate) fn file_of(&self, id: DeclId) -> &SourceFile {
        &self.files[self.sites[id.0].file]
    }

    /// The declaring syntax node (`function_declaration`, `type_spec`, ...).
    pub(crate) fn decl_node(&self, id: DeclId) -> Option<Node<'_>> {
        let site = &self.sites[id.0];
        let file = &self.files[site.file];
        node_at(&file.tree, site.node_kind, site.node_start, site.node_end)
    }

    /// Run `f` with the type context of a declaration's file, including
    /// the declaration's own type parameters.
    pub(crate) fn with_ctx<R>(&self, id: DeclId, f: impl FnOnce(&TypeContext<'_>, Node<'_>, &[u8]) -> R) -> Option<R> {
        let node = self.decl_node(id)?;
        let file = self.file_of(id);
        let src = file.source.as_bytes();
        let declared = |n: &str| self.is_declared(&file.package, n);
        let mut ctx = TypeContext::new(&file.package, &file.imports, &declared)
            .with_type_params(node.child_by_field_name("type_parameters"), src);
        if node.kind() == "method_declaration" {
            receiver_type_params(node, src, &mut ctx.type_params);
        }
        Some(f(&ctx, node, src))
    }

    /// The declared (or inferred from a composite literal) type of a
    /// package-level variable.
    pub(crate) fn var_type(&self, id: DeclId, name: &str) -> Option<TypeName> {
        self.with_ctx(id, |ctx, node, src| {
            if !matches!(node.kind(), "var_spec" | "const_spec") {
                return None;
            }
            if let Some(ty) = node.child_by_field_name("type") {
                return ctx.type_name(ty, src);
            }
            let position = field_children(node, "name")
                .iter()
                .position(|n| node_text(*n, src) == name)?;
            let values = node.child_by_field_name("value")?;
            let value = named_children(values).into_iter().nth(position)?;
            composite_type(ctx, value, src)
        })
        .flatten()
    }

    /// Fields of a struct declaration, embedded fields included.
    pub(crate) fn struct_fields(&self, id: DeclId) -> Vec<FieldInfo> {
        self.with_ctx(id, |ctx, node, src| {
            let Some(body) = node.child_by_field_name("type") else {
                return Vec::new();
            };
            if body.kind() != "struct_type" {
                return Vec::new();
            }
            let mut fields = Vec::new();
            for list in named_children(body) {
                for decl in named_children(list) {
                    if decl.kind() != "field_declaration" {
                        continue;
                    }
                    let Some(ty_node) = decl.child_by_field_name("type") else {
                        continue;
                    };
                    let names = field_children(decl, "name");
                    let mut ty = ctx.type_expr(ty_node, src);
                    if names.is_empty() {
                        if node_text(decl, src).trim_start().starts_with('*')
                            && !matches!(ty, TypeExpr::Pointer(_))
                        {
                            ty = TypeExpr::Pointer(Box::new(ty));
                        }
                        let name = match ty.named() {
                            Some(t) => t.name.clone(),
                            None => match &ty {
                                TypeExpr::Builtin(n) => n.clone(),
                                _ => continue,
                            },
                        };
                        fields.push(FieldInfo {
                            name,
                            ty,
                            embedded: true,
                        });
                    } else {
                        for n in names {
                            fields.push(FieldInfo {
                                name: node_text(n, src).to_string(),
                                ty: ty.clone(),
                                embedded: false,
                            });
                        }
                    }
                }
            }
            fields
        })
        .unwrap_or_default()
    }

    /// The local type declaration behind a named type, if any.
    pub(crate) fn type_decl(&self, ty: &TypeName) -> Option<DeclId> {
        let id = self.lookup_scope(&ty.package, &ty.name)?;
        self.decls[id.0].kind.is_type().then_some(id)
    }

    // -----------------------------------------------------------------------
    // Structural satisfaction
    // -----------------------------------------------------------------------

    /// Required methods of an interface: name -> canonical signature.
    ///
    /// `None` when the method set cannot be known (embedded external
    /// interface or a type-set element).
    fn interface_methods(&self, id: DeclId, seen: &mut HashSet<DeclId>) -> Option<BTreeMap<String, String>> {
        if !seen.insert(id) {
            return Some(BTreeMap::new());
        }
        let mut embeds: Vec<TypeExpr> = Vec::new();
        let mut methods = self
            .with_ctx(id, |ctx, node, src| {
                let body = node.child_by_field_name("type")?;
                if body.kind() != "interface_type" {
                    return None;
                }
                let mut methods = BTreeMap::new();
                for elem in named_children(body) {
                    match elem.kind() {
                        "method_elem" => {
                            let name = node_text(elem.child_by_field_name("name")?, src).to_string();
                            let sig = ctx.signature(
                                elem.child_by_field_name("parameters"),
                                elem.child_by_field_name("result"),
                                src,
                            );
                            methods.insert(name, sig);
                        }
                        "type_elem" => {
                            let parts = named_children(elem);
                            if parts.len() != 1 {
                                return None;
                            }
                            embeds.push(ctx.type_expr(parts[0], src));
                        }
                        "comment" => {}
                        _ => return None,
                    }
                }
                Some(methods)
            })
            .flatten()?;

        for embed in embeds {
            match embed {
                TypeExpr::Builtin(name) if name == "error" => {
                    methods
                        .entry("Error".to_string())
                        .or_insert_with(|| "()(string)".to_string());
                }
                TypeExpr::Builtin(name) if name == "any" => {}
                TypeExpr::Named(t) => {
                    let inner = self.type_decl(&t)?;
                    for (name, sig) in self.interface_methods(inner, seen)? {
                        methods.entry(name).or_insert(sig);
                    }
                }
                _ => return None,
            }
        }
        Some(methods)
    }

    /// Canonical signature of a method declaration.
    fn method_signature(&self, id: DeclId) -> Option<String> {
        self.with_ctx(id, |ctx, node, src| {
            ctx.signature(
                node.child_by_field_name("parameters"),
                node.child_by_field_name("result"),
                src,
            )
        })
    }

    /// Method set of a named type in the given form, promoted methods
    /// included.  Shallower methods shadow deeper ones.
    fn method_set(&self, ty: &TypeName, form: ReceiverForm) -> BTreeMap<String, String> {
        let mut set = BTreeMap::new();
        let mut seen = HashSet::new();
        self.collect_method_set(ty, form, &mut set, &mut seen);
        set
    }

    fn collect_method_set(
        &self,
        ty: &TypeName,
        form: ReceiverForm,
        set: &mut BTreeMap<String, String>,
        seen: &mut HashSet<TypeName>,
    ) {
        if !seen.insert(ty.clone()) {
            return;
        }
        if let Some(methods) = self.methods.get(ty) {
            for (name, id) in methods {
                let pointer_receiver = self.decls[id.0]
                    .receiver
                    .as_deref()
                    .is_some_and(|r| r.trim_start().starts_with('*'));
                if pointer_receiver && form == ReceiverForm::Value {
                    continue;
                }
                if let Some(sig) = self.method_signature(*id) {
                    set.entry(name.clone()).or_insert(sig);
                }
            }
        }
        let Some(decl) = self.type_decl(ty) else {
            return;
        };
        match self.decls[decl.0].kind {
            SymbolKind::Struct => {
                for field in self.struct_fields(decl).into_iter().filter(|f| f.embedded) {
                    let Some(inner) = field.ty.named() else {
                        continue;
                    };
                    // Embedding *E promotes E's pointer methods to both forms.
                    let inner_form = if matches!(field.ty, TypeExpr::Pointer(_)) {
                        ReceiverForm::Pointer
                    } else {
                        form
                    };
                    let inner = inner.clone();
                    self.collect_method_set(&inner, inner_form, set, seen);
                }
            }
            SymbolKind::Interface => {
                if let Some(methods) = self.interface_methods(decl, &mut HashSet::new()) {
                    for (name, sig) in methods {
                        set.entry(name).or_insert(sig);
                    }
                }
            }
            _ => {}
        }
    }
}

impl ProgramModel for GoProgram {
    fn module_path(&self) -> &str {
        &self.module
    }

    fn file_text(&self, file: &Path) -> Result<&str, ExtractError> {
        let idx = self
            .file_idx(file)
            .ok_or_else(|| ExtractError::FileNotFound(file.to_path_buf()))?;
        Ok(&self.files[idx].source)
    }

    fn file_declarations(&self, file: &Path) -> Result<Vec<DeclId>, ExtractError> {
        let idx = self
            .file_idx(file)
            .ok_or_else(|| ExtractError::FileNotFound(file.to_path_buf()))?;
        Ok(self.files[idx].decls.clone())
    }

    fn declaration(&self, id: DeclId) -> &Declaration {
        &self.decls[id.0]
    }

    fn find_declaration(&self, symbol: &Symbol) -> Option<DeclId> {
        let matches = |d: &Declaration| {
            d.package == symbol.package
                && d.name == symbol.name
                && d.kind == symbol.kind
                && d.receiver == symbol.receiver
        };
        if !symbol.file.is_empty() {
            let file = PathBuf::from(&symbol.file);
            let idx = self.file_idx(&file)?;
            return self.files[idx]
                .decls
                .iter()
                .copied()
                .find(|id| {
                    let d = &self.decls[id.0];
                    matches(d) && d.line == symbol.line
                })
                .or_else(|| {
                    self.files[idx]
                        .decls
                        .iter()
                        .copied()
                        .find(|id| matches(&self.decls[id.0]))
                });
        }
        self.decls
            .iter()
            .position(matches)
            .map(DeclId)
    }

    fn identifier_uses(&self, id: DeclId) -> Vec<UseSite> {
        self.scan_uses(id)
    }

    fn resolve_use(&self, site: &UseSite) -> Resolution {
        self.resolve_site(site)
    }

    fn implements_interface(&self, concrete: DeclId, iface: DeclId, form: ReceiverForm) -> bool {
        if concrete == iface || self.decls[iface.0].kind != SymbolKind::Interface {
            return false;
        }
        let Some(required) = self.interface_methods(iface, &mut HashSet::new()) else {
            return false;
        };
        if required.is_empty() {
            return true;
        }
        let d = &self.decls[concrete.0];
        let have = self.method_set(&TypeName::new(d.package.clone(), d.name.clone()), form);
        required
            .iter()
            .all(|(name, sig)| have.get(name).is_some_and(|s| s == sig))
    }

    fn source_text(&self, id: DeclId) -> &str {
        let d = &self.decls[id.0];
        let file = self.file_of(id);
        file.source.get(d.start_byte..d.end_byte).unwrap_or("")
    }

    fn signature(&self, id: DeclId) -> String {
        let d = &self.decls[id.0];
        match self.decl_node(id) {
            Some(node) if matches!(node.kind(), "type_spec" | "type_alias") => {
                format!("type {}", first_line(node, self.file_of(id).source.as_bytes()))
            }
            Some(node) if matches!(node.kind(), "const_spec" | "var_spec") => {
                let keyword = if node.kind() == "const_spec" { "const" } else { "var" };
                format!("{keyword} {}", first_line(node, self.file_of(id).source.as_bytes()))
            }
            Some(node) => first_line(node, self.file_of(id).source.as_bytes()),
            None => d.name.clone(),
        }
    }

    fn package_declarations(&self, package: &str) -> Vec<DeclId> {
        self.packages
            .get(package)
            .map(|p| p.decls.clone())
            .unwrap_or_default()
    }

    fn all_declarations(&self) -> Vec<DeclId> {
        self.packages.values().flat_map(|p| p.decls.iter().copied()).collect()
    }

    fn packages(&self) -> Vec<String> {
        self.packages.keys().cloned().collect()
    }

    fn function_signature(&self, id: DeclId) -> Option<FuncSignature> {
        if !self.decls[id.0].kind.is_callable() {
            return None;
        }
        self.with_ctx(id, |ctx, node, src| FuncSignature {
            params: node
                .child_by_field_name("parameters")
                .map(|p| ctx.param_exprs(p, src))
                .unwrap_or_default(),
            results: ctx.result_exprs(node.child_by_field_name("result"), src),
        })
    }

    fn return_shapes(&self, id: DeclId) -> Vec<ReturnShape> {
        self.with_ctx(id, |ctx, node, src| {
            let mut shapes = Vec::new();
            if let Some(body) = node.child_by_field_name("body") {
                collect_returns(ctx, body, src, &mut shapes);
            }
            shapes
        })
        .unwrap_or_default()
    }

    fn has_build_tag(&self, package: &str, tag: &str) -> bool {
        self.package_files(package)
            .any(|f| f.header.build_tags.iter().any(|t| t == tag))
    }

    fn imports(&self, package: &str, path: &str) -> bool {
        self.package_files(package)
            .any(|f| f.header.imports.iter().any(|i| i.path == path))
    }

    fn calls_to(&self, package: &str, import_path: &str, function: &str) -> Vec<CallSite> {
        let mut sites = Vec::new();
        for file in self.package_files(package) {
            let aliases: HashSet<&str> = file
                .imports
                .iter()
                .filter(|(_, path)| path.as_str() == import_path)
                .map(|(name, _)| name.as_str())
                .collect();
            if aliases.is_empty() {
                continue;
            }
            let src = file.source.as_bytes();
            let mut stack = vec![file.tree.root_node()];
            while let Some(node) = stack.pop() {
                if node.kind() == "call_expression"
                    && let Some(callee) = node.child_by_field_name("function")
                    && callee.kind() == "selector_expression"
                    && callee
                        .child_by_field_name("operand")
                        .is_some_and(|o| o.kind() == "identifier" && aliases.contains(node_text(o, src)))
                    && callee
                        .child_by_field_name("field")
                        .is_some_and(|f| node_text(f, src) == function)
                {
                    let args = node
                        .child_by_field_name("arguments")
                        .map(named_children)
                        .unwrap_or_default()
                        .into_iter()
                        .map(|arg| call_arg(file, arg, src))
                        .collect();
                    sites.push(CallSite {
                        package: file.package.clone(),
                        file: file.path.clone(),
                        line: node.start_position().row + 1,
                        args,
                    });
                }
                let mut children = named_children(node);
                children.reverse();
                stack.extend(children);
            }
        }
        sites
    }
}

impl GoProgram {
    fn package_files(&self, package: &str) -> impl Iterator<Item = &SourceFile> {
        self.packages
            .get(package)
            .into_iter()
            .flat_map(|p| p.files.iter().map(|idx| &self.files[*idx]))
    }
}

// ---------------------------------------------------------------------------
// Loading helpers
// ---------------------------------------------------------------------------

fn parse_file(path: &Path) -> Result<Parsed, ExtractError> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| ExtractError::Load(format!("{}: {e}", path.display())))?;
    let tree = indexer::parse_source(&source)?;
    if tree.root_node().has_error() {
        tracing::warn!(file = %path.display(), "syntax errors, using partial tree");
    }
    let header = indexer::extract_header(&tree, &source);
    Ok(Parsed {
        path: path.to_path_buf(),
        source,
        tree,
        header,
    })
}

/// Module path from `go.mod`, or the root directory's name.
fn read_module_path(root: &Path) -> String {
    let fallback = || {
        root.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "main".to_string())
    };
    match std::fs::read_to_string(root.join("go.mod")) {
        Ok(contents) => match MODULE_RE.captures(&contents) {
            Some(caps) => caps[1].to_string(),
            None => {
                tracing::warn!("go.mod has no module directive, using directory name");
                fallback()
            }
        },
        Err(err) => {
            tracing::warn!(error = %err, "cannot read go.mod, using directory name");
            fallback()
        }
    }
}

/// Local names of a file's imports.  Blank and dot imports bind nothing
/// addressable and are skipped.
fn import_names(header: &FileHeader, package_names: &HashMap<String, String>) -> HashMap<String, String> {
    let mut names = HashMap::new();
    for import in &header.imports {
        let name = match import.alias.as_deref() {
            Some("_") => continue,
            Some(".") => {
                tracing::debug!(path = %import.path, "dot import, names not resolvable");
                continue;
            }
            Some(alias) => alias.to_string(),
            None => match package_names.get(&import.path) {
                Some(name) if !name.is_empty() => name.clone(),
                _ => default_import_name(&import.path),
            },
        };
        names.insert(name, import.path.clone());
    }
    names
}

/// Type parameters declared by a generic receiver (`func (s *Stack[T])`).
fn receiver_type_params(method: Node, src: &[u8], out: &mut HashSet<String>) {
    let Some(recv) = method.child_by_field_name("receiver") else {
        return;
    };
    let mut stack = vec![recv];
    while let Some(node) = stack.pop() {
        if node.kind() == "generic_type"
            && let Some(args) = node.child_by_field_name("type_arguments")
        {
            let mut inner = vec![args];
            while let Some(n) = inner.pop() {
                if matches!(n.kind(), "type_identifier" | "identifier") {
                    out.insert(node_text(n, src).to_string());
                }
                inner.extend(named_children(n));
            }
            continue;
        }
        stack.extend(named_children(node));
    }
}

/// The named type of a `T{...}` or `&T{...}` expression.
pub(crate) fn composite_type(ctx: &TypeContext<'_>, expr: Node, src: &[u8]) -> Option<TypeName> {
    match expr.kind() {
        "composite_literal" => ctx.type_name(expr.child_by_field_name("type")?, src),
        "unary_expression" | "parenthesized_expression" => {
            let inner = expr
                .child_by_field_name("operand")
                .or_else(|| expr.named_child(0u32))?;
            composite_type(ctx, inner, src)
        }
        _ => None,
    }
}

fn collect_returns(ctx: &TypeContext<'_>, node: Node, src: &[u8], shapes: &mut Vec<ReturnShape>) {
    for child in named_children(node) {
        match child.kind() {
            // Returns inside closures belong to the closure.
            "func_literal" => {}
            "return_statement" => {
                let Some(list) = child.named_child(0u32) else {
                    continue;
                };
                let exprs = if list.kind() == "expression_list" {
                    named_children(list)
                } else {
                    vec![list]
                };
                for expr in exprs {
                    shapes.push(return_shape(ctx, expr, src));
                }
            }
            _ => collect_returns(ctx, child, src, shapes),
        }
    }
}

fn return_shape(ctx: &TypeContext<'_>, expr: Node, src: &[u8]) -> ReturnShape {
    let mut node = expr;
    let mut address_of = false;
    loop {
        match node.kind() {
            "parenthesized_expression" => match node.named_child(0u32) {
                Some(inner) => node = inner,
                None => return ReturnShape::Other,
            },
            "unary_expression" => {
                let is_addr = node
                    .child_by_field_name("operator")
                    .is_some_and(|op| node_text(op, src) == "&");
                match node.child_by_field_name("operand") {
                    Some(inner) if is_addr => {
                        address_of = true;
                        node = inner;
                    }
                    _ => return ReturnShape::Other,
                }
            }
            "composite_literal" => {
                return match node
                    .child_by_field_name("type")
                    .and_then(|t| ctx.type_name(t, src))
                {
                    Some(type_name) => ReturnShape::Composite {
                        type_name,
                        address_of,
                    },
                    None => ReturnShape::Other,
                };
            }
            _ => return ReturnShape::Other,
        }
    }
}

fn call_arg(file: &SourceFile, arg: Node, src: &[u8]) -> CallArg {
    match arg.kind() {
        "identifier" => CallArg::Named(TypeName::new(file.package.clone(), node_text(arg, src))),
        "selector_expression" => {
            let operand = arg.child_by_field_name("operand");
            let field = arg.child_by_field_name("field");
            if let (Some(op), Some(field)) = (operand, field)
                && op.kind() == "identifier"
                && let Some(path) = file.imports.get(node_text(op, src))
            {
                return CallArg::Named(TypeName::new(path.clone(), node_text(field, src)));
            }
            CallArg::Other(node_text(arg, src).to_string())
        }
        _ => CallArg::Other(node_text(arg, src).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::GoModule;

    fn find(program: &GoProgram, package: &str, name: &str) -> DeclId {
        program
            .all_declarations()
            .into_iter()
            .find(|id| {
                let d = program.declaration(*id);
                d.package == package && d.name == name
            })
            .unwrap_or_else(|| panic!("{package}.{name} not loaded"))
    }

    #[test]
    fn loads_packages_by_directory() {
        let m = GoModule::new("example.com/app")
            .file("main.go", "package main\n\nfunc main() {}\n")
            .file("store/store.go", "package store\n\ntype Store struct{}\n")
            .file("store/store_test.go", "package store\n\nfunc TestX() {}\n");
        let program = m.load();
        assert_eq!(program.module_path(), "example.com/app");
        assert_eq!(program.packages(), vec!["example.com/app", "example.com/app/store"]);
        let store = find(&program, "example.com/app/store", "Store");
        assert_eq!(program.declaration(store).kind, SymbolKind::Struct);
        assert!(program
            .all_declarations()
            .iter()
            .all(|id| program.declaration(*id).name != "TestX"));
    }

    #[test]
    fn missing_go_mod_falls_back_to_dir_name() {
        let m = GoModule::without_go_mod().file("a.go", "package a\n\nfunc A() {}\n");
        let program = m.load();
        let expected = m.root().canonicalize().unwrap();
        assert_eq!(
            program.module_path(),
            expected.file_name().unwrap().to_string_lossy()
        );
    }

    #[test]
    fn root_must_be_a_directory() {
        let err = GoProgram::load(Path::new("/definitely/not/here"), &LoadOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, ExtractError::InvalidInput(_)));
    }

    #[test]
    fn unknown_file_is_not_found() {
        let m = GoModule::new("example.com/app").file("a.go", "package a\n");
        let program = m.load();
        let err = program.file_text(&m.root().join("b.go")).unwrap_err();
        assert!(matches!(err, ExtractError::FileNotFound(_)));
    }

    #[test]
    fn pointer_and_value_method_sets() {
        let m = GoModule::new("example.com/app").file(
            "shape.go",
            r#"package shape

type Shape interface {
	Area() float64
	Scale(f float64)
}

type Square struct{ side float64 }

func (s Square) Area() float64 { return s.side * s.side }

func (s *Square) Scale(f float64) { s.side *= f }
"#,
        );
        let program = m.load();
        let shape = find(&program, "example.com/app", "Shape");
        let square = find(&program, "example.com/app", "Square");
        assert!(!program.implements_interface(square, shape, ReceiverForm::Value));
        assert!(program.implements_interface(square, shape, ReceiverForm::Pointer));
    }

    #[test]
    fn signatures_must_match_exactly() {
        let m = GoModule::new("example.com/app").file(
            "io.go",
            r#"package app

type Reader interface {
	Read(p []byte) (int, error)
}

type Good struct{}

func (Good) Read(buf []byte) (n int, err error) { return 0, nil }

type Bad struct{}

func (Bad) Read(p []byte) error { return nil }
"#,
        );
        let program = m.load();
        let reader = find(&program, "example.com/app", "Reader");
        assert!(program.implements_interface(find(&program, "example.com/app", "Good"), reader, ReceiverForm::Value));
        assert!(!program.implements_interface(find(&program, "example.com/app", "Bad"), reader, ReceiverForm::Pointer));
    }

    #[test]
    fn embedded_interfaces_and_promoted_methods() {
        let m = GoModule::new("example.com/app").file(
            "svc.go",
            r#"package app

type Closer interface{ Close() error }

type ReadCloser interface {
	Closer
	Read() string
}

type Fault interface {
	error
	Code() int
}

type base struct{}

func (*base) Close() error { return nil }

type File struct {
	*base
	name string
}

func (f File) Read() string { return f.name }

type Oops struct{}

func (Oops) Error() string { return "oops" }
func (Oops) Code() int     { return 1 }
"#,
        );
        let program = m.load();
        let rc = find(&program, "example.com/app", "ReadCloser");
        let file = find(&program, "example.com/app", "File");
        assert!(program.implements_interface(file, rc, ReceiverForm::Value));

        let fault = find(&program, "example.com/app", "Fault");
        let oops = find(&program, "example.com/app", "Oops");
        assert!(program.implements_interface(oops, fault, ReceiverForm::Value));
    }

    #[test]
    fn external_embeds_are_unsatisfiable() {
        let m = GoModule::new("example.com/app").file(
            "x.go",
            r#"package app

import "io"

type RC interface {
	io.Reader
	Close() error
}

type Empty interface{}

type T struct{}

func (T) Close() error { return nil }
"#,
        );
        let program = m.load();
        let t = find(&program, "example.com/app", "T");
        assert!(!program.implements_interface(t, find(&program, "example.com/app", "RC"), ReceiverForm::Pointer));
        assert!(program.implements_interface(t, find(&program, "example.com/app", "Empty"), ReceiverForm::Value));
    }

    #[test]
    fn return_shapes_and_signature() {
        let m = GoModule::new("example.com/app").file(
            "repo.go",
            r#"package app

type Repo interface{ Get() string }

type sqlRepo struct{}

func (sqlRepo) Get() string { return "" }

func NewRepo(dsn string) (Repo, error) {
	if dsn == "" {
		return nil, nil
	}
	f := func() *sqlRepo { return &sqlRepo{} }
	_ = f
	return &sqlRepo{}, nil
}
"#,
        );
        let program = m.load();
        let ctor = find(&program, "example.com/app", "NewRepo");
        let shapes = program.return_shapes(ctor);
        assert_eq!(shapes.len(), 4);
        assert_eq!(
            shapes[2],
            ReturnShape::Composite {
                type_name: TypeName::new("example.com/app", "sqlRepo"),
                address_of: true
            }
        );
        let sig = program.function_signature(ctor).unwrap();
        assert_eq!(sig.params, vec![TypeExpr::Builtin("string".into())]);
        assert_eq!(
            sig.results[0],
            TypeExpr::Named(TypeName::new("example.com/app", "Repo"))
        );
        assert_eq!(program.signature(ctor), "func NewRepo(dsn string) (Repo, error)");
    }

    #[test]
    fn injector_files_stay_out_of_scope() {
        let m = GoModule::new("example.com/app")
            .file(
                "wire.go",
                "//go:build wireinject\n\npackage app\n\nimport \"github.com/google/wire\"\n\nfunc InitApp() *App {\n\twire.Build(NewApp, NewDB)\n\treturn nil\n}\n",
            )
            .file("app.go", "package app\n\ntype App struct{}\n\nfunc NewApp() *App { return &App{} }\n\nfunc NewDB() int { return 0 }\n");
        let program = m.load();
        assert!(program.lookup_scope("example.com/app", "InitApp").is_none());
        assert!(program.has_build_tag("example.com/app", WIREINJECT_TAG));
        let calls = program.calls_to("example.com/app", "github.com/google/wire", "Build");
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].args,
            vec![
                CallArg::Named(TypeName::new("example.com/app", "NewApp")),
                CallArg::Named(TypeName::new("example.com/app", "NewDB")),
            ]
        );
    }

    #[test]
    fn stale_line_keeps_the_receiver() {
        let m = GoModule::new("example.com/app").file(
            "conn/conn.go",
            r#"package conn

type A struct{}

func (a *A) Close() error { return nil }

type B struct{}

func (b *B) Close() error { return nil }
"#,
        );
        let program = m.load();
        let b_close = program
            .all_declarations()
            .into_iter()
            .find(|id| program.declaration(*id).receiver.as_deref() == Some("*B"))
            .unwrap();
        let mut symbol = crate::locator::materialize(&program, b_close);
        assert_eq!(program.find_declaration(&symbol), Some(b_close));

        symbol.line = 1;
        assert_eq!(program.find_declaration(&symbol), Some(b_close));
    }
}
