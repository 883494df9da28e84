//! Interface/implementation discovery over a collected symbol set.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::locator::materialize;
use crate::model::{DeclId, ProgramModel, ReceiverForm, ReturnShape, TypeExpr, TypeName};
use crate::types::{
    InferenceMode, InterfaceMapping, Options, Reference, ReferenceReason, Symbol, SymbolKind,
    VisitedKey,
};

/// Guesses which concrete type a constructor instantiates.
pub trait ImplementationInference {
    /// Name of the concrete type `constructor` returns as `iface`, if it
    /// can be determined.
    fn infer(&self, model: &dyn ProgramModel, constructor: DeclId, iface: DeclId) -> Option<String>;
}

/// Looks for `return T{...}` / `return &T{...}` in the constructor body.
pub struct CompositeLiteralInference;

impl ImplementationInference for CompositeLiteralInference {
    fn infer(&self, model: &dyn ProgramModel, constructor: DeclId, iface: DeclId) -> Option<String> {
        let iface_decl = model.declaration(iface);
        let iface_type = TypeName::new(iface_decl.package.clone(), iface_decl.name.clone());
        model
            .return_shapes(constructor)
            .into_iter()
            .find_map(|shape| match shape {
                ReturnShape::Composite { type_name, .. } if type_name != iface_type => {
                    if type_name.package == iface_type.package {
                        Some(type_name.name)
                    } else {
                        Some(type_name.to_string())
                    }
                }
                _ => None,
            })
    }
}

/// Never infers anything.
pub struct NoInference;

impl ImplementationInference for NoInference {
    fn infer(&self, _: &dyn ProgramModel, _: DeclId, _: DeclId) -> Option<String> {
        None
    }
}

/// The strategy selected by an [`InferenceMode`].
pub fn inference_for(mode: InferenceMode) -> Box<dyn ImplementationInference> {
    match mode {
        InferenceMode::CompositeLiteral => Box::new(CompositeLiteralInference),
        InferenceMode::Disabled => Box::new(NoInference),
    }
}

pub struct InterfaceAnalyzer<'a> {
    model: &'a dyn ProgramModel,
    prefixes: &'a [String],
    inference: Box<dyn ImplementationInference>,
}

impl<'a> InterfaceAnalyzer<'a> {
    pub fn new(model: &'a dyn ProgramModel, options: &'a Options) -> Self {
        Self {
            model,
            prefixes: &options.constructor_prefixes,
            inference: inference_for(options.inference),
        }
    }

    /// Replace the implementation-inference strategy.
    pub fn with_inference(mut self, inference: Box<dyn ImplementationInference>) -> Self {
        self.inference = inference;
        self
    }

    /// Interface mappings among `symbols`.  Symbols that do not map back to
    /// a declaration of the model (external stubs) are ignored.
    pub fn analyze(&self, symbols: &[Symbol]) -> Vec<InterfaceMapping> {
        let mut seen = HashSet::new();
        let decls: Vec<DeclId> = symbols
            .iter()
            .filter_map(|s| self.model.find_declaration(s))
            .filter(|id| seen.insert(*id))
            .collect();
        let of_kind = |kind: SymbolKind| -> Vec<DeclId> {
            decls
                .iter()
                .copied()
                .filter(|id| self.model.declaration(*id).kind == kind)
                .collect()
        };
        let structs = of_kind(SymbolKind::Struct);
        let functions = of_kind(SymbolKind::Function);

        // Candidate interfaces keyed by (package, name), collected first.
        let mut interfaces: IndexMap<(String, String), DeclId> = IndexMap::new();
        for id in of_kind(SymbolKind::Interface) {
            let d = self.model.declaration(id);
            interfaces.entry((d.package.clone(), d.name.clone())).or_insert(id);
        }
        for s in &structs {
            let package = self.model.package_path(*s).to_string();
            for candidate in self.model.package_declarations(&package) {
                if self.model.declaration(candidate).kind != SymbolKind::Interface {
                    continue;
                }
                if self.satisfies(*s, candidate) {
                    let d = self.model.declaration(candidate);
                    interfaces
                        .entry((d.package.clone(), d.name.clone()))
                        .or_insert(candidate);
                }
            }
        }

        let mut claimed: HashSet<DeclId> = HashSet::new();
        let mut mappings = Vec::new();
        for iface in interfaces.into_values() {
            let implementations: Vec<Symbol> = structs
                .iter()
                .copied()
                .filter(|s| self.satisfies(*s, iface))
                .map(|s| materialize(self.model, s))
                .collect();
            let constructor = functions
                .iter()
                .copied()
                .filter(|f| !claimed.contains(f))
                .find(|f| self.is_constructor(*f, iface));
            if let Some(c) = constructor {
                claimed.insert(c);
            }
            if implementations.is_empty() && constructor.is_none() {
                continue;
            }
            let interface = materialize(self.model, iface);
            let constructor = constructor.map(|c| {
                let mut symbol = materialize(self.model, c);
                symbol.interface_type = Some(interface.name.clone());
                symbol.implementation = self.inference.infer(self.model, c, iface);
                symbol
            });
            tracing::debug!(
                interface = %interface.qualified_name(),
                implementations = implementations.len(),
                constructor = constructor.as_ref().map(|c| c.name.as_str()).unwrap_or("-"),
                "interface mapping"
            );
            mappings.push(InterfaceMapping {
                interface,
                implementations,
                constructor,
                framework: None,
            });
        }
        mappings
    }

    /// Value or pointer form satisfies the interface.
    fn satisfies(&self, concrete: DeclId, iface: DeclId) -> bool {
        self.model.implements_interface(concrete, iface, ReceiverForm::Value)
            || self.model.implements_interface(concrete, iface, ReceiverForm::Pointer)
    }

    /// `<Prefix><Iface>` whose first result is the interface itself.
    fn is_constructor(&self, function: DeclId, iface: DeclId) -> bool {
        let f = self.model.declaration(function);
        let i = self.model.declaration(iface);
        let named = self
            .prefixes
            .iter()
            .any(|p| f.name.strip_prefix(p.as_str()) == Some(i.name.as_str()));
        if !named {
            return false;
        }
        let Some(sig) = self.model.function_signature(function) else {
            return false;
        };
        let expected = TypeName::new(i.package.clone(), i.name.clone());
        matches!(sig.results.first(), Some(TypeExpr::Named(t)) if *t == expected)
    }
}

/// Edges for each mapping: implementation -> interface, interface ->
/// implementation and constructor -> interface, all at `depth`.
pub fn relationship_references(mappings: &[InterfaceMapping], depth: usize) -> Vec<Reference> {
    let mut seen: HashSet<(ReferenceReason, VisitedKey, VisitedKey)> = HashSet::new();
    let mut refs = Vec::new();
    let mut push = |reason: ReferenceReason, from: &Symbol, to: &Symbol| {
        if seen.insert((reason, from.key(), to.key())) {
            refs.push(Reference {
                symbol: to.clone(),
                reason,
                depth,
                external: false,
                stub: false,
                signature: None,
                referenced_by: from.name.clone(),
            });
        }
    };
    for m in mappings {
        for imp in &m.implementations {
            push(ReferenceReason::ImplementsInterface, imp, &m.interface);
            push(ReferenceReason::InterfaceContract, &m.interface, imp);
        }
        if let Some(ctor) = &m.constructor {
            push(ReferenceReason::ReturnsInterface, ctor, &m.interface);
        }
    }
    refs
}
