//! Depth-limited breadth-first dependency collection.
//!
//! A [`Collector`] is consumed by [`Collector::collect`]: queue, visited
//! set and accumulators live only for one traversal, so independent
//! extractions never share state.

use std::collections::{HashSet, VecDeque};

use indexmap::IndexSet;

use crate::errors::ExtractError;
use crate::locator::materialize;
use crate::model::{DeclId, ProgramModel, Resolution, UseBinding, UseConstruct, UseSite};
use crate::types::{Options, Reference, ReferenceReason, Symbol, SymbolKind, VisitedKey};

/// Output of one traversal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collected {
    pub references: Vec<Reference>,
    /// Qualified names of external declarations, first-seen order.
    pub external: Vec<String>,
}

/// Collects the dependency closure of one target symbol.
pub struct Collector<'a> {
    model: &'a dyn ProgramModel,
    options: &'a Options,
}

impl<'a> Collector<'a> {
    pub fn new(model: &'a dyn ProgramModel, options: &'a Options) -> Self {
        Self { model, options }
    }

    /// Run the traversal from `target` down to `options.depth`.
    ///
    /// Depth 0 returns immediately without inspecting the target.  Fails
    /// only when the target cannot be mapped back into the model.
    pub fn collect(self, target: &Symbol) -> Result<Collected, ExtractError> {
        let max_depth = self.options.depth;
        if max_depth == 0 {
            return Ok(Collected::default());
        }
        let root = self
            .model
            .find_declaration(target)
            .ok_or_else(|| ExtractError::Resolution(target.qualified_name()))?;

        let mut queue: VecDeque<(DeclId, usize)> = VecDeque::from([(root, 0)]);
        let mut visited: HashSet<VisitedKey> = HashSet::new();
        let mut emitted: HashSet<VisitedKey> = HashSet::from([self.model.declaration(root).key()]);
        let mut external: IndexSet<String> = IndexSet::new();
        let mut references = Vec::new();

        while let Some((id, depth)) = queue.pop_front() {
            let decl = self.model.declaration(id);
            if !visited.insert(decl.key()) {
                continue;
            }
            if depth >= max_depth {
                continue;
            }
            let referenced_by = decl.name.clone();
            let mut seen_in_body: HashSet<(String, String)> = HashSet::new();
            let before = references.len();

            for site in self.model.identifier_uses(id) {
                match self.model.resolve_use(&site) {
                    Resolution::Unresolved => {
                        tracing::trace!(name = %site.name, scope = %referenced_by, "unresolved identifier skipped");
                    }
                    Resolution::Declaration(rid) => {
                        let r = self.model.declaration(rid);
                        if !seen_in_body.insert((r.package.clone(), r.name.clone())) {
                            continue;
                        }
                        if !emitted.insert(r.key()) {
                            continue;
                        }
                        references.push(Reference {
                            symbol: materialize(self.model, rid),
                            reason: reason_for(&site, r.kind),
                            depth: depth + 1,
                            external: false,
                            stub: false,
                            signature: None,
                            referenced_by: referenced_by.clone(),
                        });
                        queue.push_back((rid, depth + 1));
                    }
                    Resolution::External(ext) => {
                        if ext.builtin && !self.options.include_builtins {
                            continue;
                        }
                        if !seen_in_body.insert((ext.package.clone(), ext.name.clone())) {
                            continue;
                        }
                        external.insert(ext.qualified_name());
                        if !self.options.stub_external {
                            continue;
                        }
                        let symbol = ext.to_symbol();
                        if !emitted.insert(symbol.key()) {
                            continue;
                        }
                        references.push(Reference {
                            reason: reason_for(&site, ext.kind),
                            symbol,
                            depth: depth + 1,
                            external: true,
                            stub: true,
                            signature: ext.signature,
                            referenced_by: referenced_by.clone(),
                        });
                    }
                }
            }
            tracing::debug!(
                scope = %referenced_by,
                depth,
                found = references.len() - before,
                queued = queue.len(),
                "expanded declaration"
            );
        }

        Ok(Collected {
            references,
            external: external.into_iter().collect(),
        })
    }
}

/// Classify an edge by the construct that produced it.
fn reason_for(site: &UseSite, kind: SymbolKind) -> ReferenceReason {
    match site.construct {
        UseConstruct::Type => ReferenceReason::TypeReference,
        UseConstruct::Call => {
            // `T(x)` is a conversion; `v.M()` on an interface value is a call.
            if kind.is_type() && !matches!(site.binding, UseBinding::Member(_)) {
                ReferenceReason::TypeReference
            } else {
                ReferenceReason::DirectCall
            }
        }
        UseConstruct::Selector => {
            if kind.is_callable() {
                ReferenceReason::DirectCall
            } else {
                ReferenceReason::FieldAccess
            }
        }
        UseConstruct::Value => {
            if kind.is_callable() {
                ReferenceReason::DirectCall
            } else if kind.is_type() {
                ReferenceReason::TypeReference
            } else {
                ReferenceReason::FieldAccess
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::locate;
    use crate::program::GoProgram;
    use crate::testutil::GoModule;

    const CHAIN: &str = r#"package p

import "example.com/ext"

func F() {
	G()
	ext.Q()
}

func G() {
	H()
}

func H() {}
"#;

    fn options(depth: usize) -> Options {
        Options {
            depth,
            ..Options::default()
        }
    }

    fn target(m: &GoModule, program: &GoProgram, file: &str, line: usize) -> Symbol {
        locate(program, &m.path(file), line, None).unwrap()
    }

    fn names(refs: &[Reference]) -> Vec<(String, usize)> {
        refs.iter().map(|r| (r.symbol.name.clone(), r.depth)).collect()
    }

    #[test]
    fn depth_one_collects_direct_dependencies() {
        let m = GoModule::new("example.com/m").file("p/p.go", CHAIN);
        let program = m.load();
        let f = target(&m, &program, "p/p.go", 5);
        let opts = Options {
            stub_external: false,
            ..options(1)
        };
        let out = Collector::new(&program, &opts).collect(&f).unwrap();
        assert_eq!(names(&out.references), vec![("G".to_string(), 1)]);
        let g = &out.references[0];
        assert!(!g.external && !g.stub);
        assert_eq!(g.reason, ReferenceReason::DirectCall);
        assert_eq!(g.referenced_by, "F");
        assert!(g.symbol.code.contains("H()"));
        assert_eq!(out.external, vec!["example.com/ext.Q".to_string()]);
    }

    #[test]
    fn depth_zero_is_empty() {
        let m = GoModule::new("example.com/m").file("p/p.go", CHAIN);
        let program = m.load();
        let f = target(&m, &program, "p/p.go", 5);
        let out = Collector::new(&program, &options(0)).collect(&f).unwrap();
        assert!(out.references.is_empty());
        assert!(out.external.is_empty());
    }

    #[test]
    fn depth_two_reaches_transitive_calls() {
        let m = GoModule::new("example.com/m").file("p/p.go", CHAIN);
        let program = m.load();
        let f = target(&m, &program, "p/p.go", 5);
        let out = Collector::new(&program, &options(2)).collect(&f).unwrap();
        let internal: Vec<_> = out.references.iter().filter(|r| !r.external).cloned().collect();
        assert_eq!(names(&internal), vec![("G".to_string(), 1), ("H".to_string(), 2)]);
        for r in &out.references {
            assert!(r.depth >= 1 && r.depth <= 2);
        }
    }

    #[test]
    fn externals_are_stubs_without_bodies() {
        let m = GoModule::new("example.com/m").file("p/p.go", CHAIN);
        let program = m.load();
        let f = target(&m, &program, "p/p.go", 5);
        let out = Collector::new(&program, &options(1)).collect(&f).unwrap();
        let q = out
            .references
            .iter()
            .find(|r| r.symbol.name == "Q")
            .expect("external stub recorded");
        assert!(q.external && q.stub);
        assert!(q.symbol.code.is_empty());
        assert_eq!(q.symbol.package, "example.com/ext");
    }

    #[test]
    fn cycles_terminate_and_dedup() {
        let src = "package p\n\nfunc A() { B(); B() }\n\nfunc B() { A() }\n";
        let m = GoModule::new("example.com/m").file("p.go", src);
        let program = m.load();
        let a = target(&m, &program, "p.go", 3);
        let out = Collector::new(&program, &options(5)).collect(&a).unwrap();
        assert_eq!(names(&out.references), vec![("B".to_string(), 1)]);
    }

    #[test]
    fn keys_are_unique_across_paths() {
        let src = r#"package p

type Conf struct{ Name string }

func A() { B(); C() }

func B() Conf { return Conf{} }

func C() Conf { return Conf{} }
"#;
        let m = GoModule::new("example.com/m").file("p.go", src);
        let program = m.load();
        let a = target(&m, &program, "p.go", 5);
        let out = Collector::new(&program, &options(3)).collect(&a).unwrap();
        let keys: HashSet<VisitedKey> = out.references.iter().map(|r| r.symbol.key()).collect();
        assert_eq!(keys.len(), out.references.len());
        let conf = out.references.iter().find(|r| r.symbol.name == "Conf").unwrap();
        assert_eq!(conf.depth, 2);
        assert_eq!(conf.reason, ReferenceReason::TypeReference);
        assert_eq!(conf.referenced_by, "B");
    }

    #[test]
    fn builtins_follow_options() {
        let src = "package p\n\nfunc Size(xs []string) int { return len(xs) }\n";
        let m = GoModule::new("example.com/m").file("p.go", src);
        let program = m.load();
        let size = target(&m, &program, "p.go", 3);

        let out = Collector::new(&program, &options(1)).collect(&size).unwrap();
        assert_eq!(out.external, vec!["builtin.string", "builtin.int", "builtin.len"]);
        let len = out.references.iter().find(|r| r.symbol.name == "len").unwrap();
        assert_eq!(len.signature.as_deref(), Some("func len(v Type) int"));

        let opts = Options {
            include_builtins: false,
            ..options(1)
        };
        let out = Collector::new(&program, &opts).collect(&size).unwrap();
        assert!(out.references.is_empty());
        assert!(out.external.is_empty());
    }

    #[test]
    fn field_access_and_methods() {
        let src = r#"package p

type Store struct{ items map[string]int }

func (s *Store) Count() int { return len(s.items) }

func Report(s *Store) int { return s.Count() }
"#;
        let m = GoModule::new("example.com/m").file("p.go", src);
        let program = m.load();
        let count = target(&m, &program, "p.go", 5);
        let opts = Options {
            include_builtins: false,
            ..options(1)
        };
        let out = Collector::new(&program, &opts).collect(&count).unwrap();
        // Receiver type and field access resolve to the same struct.
        assert_eq!(names(&out.references), vec![("Store".to_string(), 1)]);
        assert_eq!(out.references[0].reason, ReferenceReason::TypeReference);

        let report = target(&m, &program, "p.go", 7);
        let out = Collector::new(&program, &opts).collect(&report).unwrap();
        let count_ref = out.references.iter().find(|r| r.symbol.name == "Count").unwrap();
        assert_eq!(count_ref.reason, ReferenceReason::DirectCall);
        assert_eq!(count_ref.symbol.kind, SymbolKind::Method);
    }

    #[test]
    fn same_name_in_other_package_stays_distinct() {
        let m = GoModule::new("example.com/m")
            .file("a/a.go", "package a\n\nimport \"example.com/m/b\"\n\nfunc Run() { b.Run() }\n")
            .file("b/b.go", "package b\n\nfunc Run() {}\n");
        let program = m.load();
        let run = target(&m, &program, "a/a.go", 5);
        let out = Collector::new(&program, &options(2)).collect(&run).unwrap();
        assert_eq!(out.references.len(), 1);
        assert_eq!(out.references[0].symbol.package, "example.com/m/b");
    }

    #[test]
    fn unknown_target_is_a_resolution_error() {
        let m = GoModule::new("example.com/m").file("p/p.go", CHAIN);
        let program = m.load();
        let ghost = Symbol {
            package: "example.com/m/p".into(),
            name: "Ghost".into(),
            ..Symbol::default()
        };
        let err = Collector::new(&program, &options(1)).collect(&ghost).unwrap_err();
        assert!(matches!(err, ExtractError::Resolution(_)));
    }
}
