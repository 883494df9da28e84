//! Dependency-injection wiring detection and binding extraction.
//!
//! Two framework conventions are recognised: Google Wire (injector files
//! tagged `wireinject`, `wire.NewSet` / `wire.Build` provider lists) and
//! Uber Fx (`fx.Provide`).  Everything else with `New*` constructors taking
//! arguments counts as manual wiring.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::model::{CallArg, ProgramModel, TypeExpr, TypeName};
use crate::program::WIREINJECT_TAG;
use crate::types::{DiBinding, Framework, Reference, ReferenceReason, Symbol, SymbolKind, VisitedKey};

pub const WIRE_IMPORT: &str = "github.com/google/wire";
pub const FX_IMPORT: &str = "go.uber.org/fx";

const WIRE_CALLS: [&str; 2] = ["NewSet", "Build"];
const FX_CALLS: [&str; 1] = ["Provide"];

/// Scope label of every binding; Go source carries no lifetime hints.
const DEFAULT_SCOPE: &str = "singleton";

pub struct DiAnalyzer<'a> {
    model: &'a dyn ProgramModel,
}

impl<'a> DiAnalyzer<'a> {
    pub fn new(model: &'a dyn ProgramModel) -> Self {
        Self { model }
    }

    /// Program-wide framework: Wire, then Fx, then manual, else none.
    pub fn detect_framework(&self) -> Framework {
        let packages = self.model.packages();
        if packages.iter().any(|p| self.uses_wire(p)) {
            return Framework::Wire;
        }
        if packages.iter().any(|p| self.uses_fx(p)) {
            return Framework::Fx;
        }
        let manual = self.model.all_declarations().into_iter().any(|id| {
            let d = self.model.declaration(id);
            d.kind == SymbolKind::Function
                && d.name.starts_with("New")
                && self
                    .model
                    .function_signature(id)
                    .is_some_and(|sig| !sig.params.is_empty())
        });
        if manual { Framework::Manual } else { Framework::None }
    }

    /// Framework used by one package; `Manual` when neither convention
    /// appears there.
    pub fn package_framework(&self, package: &str) -> Framework {
        if self.uses_wire(package) {
            Framework::Wire
        } else if self.uses_fx(package) {
            Framework::Fx
        } else {
            Framework::Manual
        }
    }

    fn uses_wire(&self, package: &str) -> bool {
        self.model.has_build_tag(package, WIREINJECT_TAG)
            || WIRE_CALLS
                .iter()
                .any(|f| !self.model.calls_to(package, WIRE_IMPORT, f).is_empty())
    }

    fn uses_fx(&self, package: &str) -> bool {
        self.model.imports(package, FX_IMPORT)
            && FX_CALLS
                .iter()
                .any(|f| !self.model.calls_to(package, FX_IMPORT, f).is_empty())
    }

    /// Bindings among the collected `symbols` for a detected framework.
    pub fn analyze(&self, framework: Framework, symbols: &[Symbol]) -> Vec<DiBinding> {
        let collected = CollectedTypes::new(symbols);
        let providers: Vec<&Symbol> = match framework {
            Framework::Wire => self.registered(&collected, WIRE_IMPORT, &WIRE_CALLS),
            Framework::Fx => self.registered(&collected, FX_IMPORT, &FX_CALLS),
            Framework::Manual => collected
                .symbols()
                .filter(|s| s.kind == SymbolKind::Function && s.name.starts_with("New"))
                .collect(),
            Framework::None => Vec::new(),
        };
        let bindings: Vec<DiBinding> = providers
            .into_iter()
            .map(|p| self.binding(p, framework, &collected))
            .collect();
        tracing::debug!(framework = %framework, bindings = bindings.len(), "dependency injection");
        bindings
    }

    /// Collected functions named as arguments of registration calls.
    fn registered<'s>(&self, collected: &CollectedTypes<'s>, import: &str, calls: &[&str]) -> Vec<&'s Symbol> {
        let mut seen = HashSet::new();
        let mut providers = Vec::new();
        for package in self.model.packages() {
            for call in calls {
                for site in self.model.calls_to(&package, import, call) {
                    for arg in site.args {
                        let CallArg::Named(name) = arg else {
                            continue;
                        };
                        match collected.function(&name) {
                            Some(s) if seen.insert(s.key()) => providers.push(s),
                            Some(_) => {}
                            None => tracing::trace!(provider = %name, "provider not among collected symbols"),
                        }
                    }
                }
            }
        }
        providers
    }

    fn binding(&self, provider: &Symbol, framework: Framework, collected: &CollectedTypes<'_>) -> DiBinding {
        let signature = self
            .model
            .find_declaration(provider)
            .and_then(|id| self.model.function_signature(id))
            .unwrap_or_default();
        let resolve = |t: &TypeExpr| t.named().and_then(|n| collected.get(n)).cloned();
        DiBinding {
            provider: provider.clone(),
            product: signature.results.first().and_then(resolve),
            dependencies: signature.params.iter().filter_map(resolve).collect(),
            framework,
            scope: DEFAULT_SCOPE.to_string(),
        }
    }
}

/// The collected symbols indexed by (package, name).
struct CollectedTypes<'s> {
    by_name: IndexMap<(String, String), &'s Symbol>,
}

impl<'s> CollectedTypes<'s> {
    fn new(symbols: &'s [Symbol]) -> Self {
        let mut keys: HashSet<VisitedKey> = HashSet::new();
        let mut by_name = IndexMap::new();
        for s in symbols.iter().filter(|s| keys.insert(s.key())) {
            by_name
                .entry((s.package.clone(), s.name.clone()))
                .or_insert(s);
        }
        Self { by_name }
    }

    fn symbols(&self) -> impl Iterator<Item = &'s Symbol> + '_ {
        self.by_name.values().copied()
    }

    fn get(&self, name: &TypeName) -> Option<&'s Symbol> {
        self.by_name
            .get(&(name.package.clone(), name.name.clone()))
            .copied()
    }

    fn function(&self, name: &TypeName) -> Option<&'s Symbol> {
        self.get(name).filter(|s| s.kind == SymbolKind::Function)
    }
}

/// Provider -> product edges at `depth`.
pub fn binding_references(bindings: &[DiBinding], depth: usize) -> Vec<Reference> {
    let mut seen: HashSet<(VisitedKey, VisitedKey)> = HashSet::new();
    bindings
        .iter()
        .filter_map(|b| {
            let product = b.product.as_ref()?;
            seen.insert((b.provider.key(), product.key()))
                .then(|| Reference {
                    symbol: product.clone(),
                    reason: ReferenceReason::DiBinding,
                    depth,
                    external: false,
                    stub: false,
                    signature: None,
                    referenced_by: b.provider.name.clone(),
                })
        })
        .collect()
}
