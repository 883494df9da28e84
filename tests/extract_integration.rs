//! End-to-end extraction over Go module fixtures.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use goscope::collector::Collector;
use goscope::di::DiAnalyzer;
use goscope::interfaces::InterfaceAnalyzer;
use goscope::locator::locate;
use goscope::output::{Format, Formatter};
use goscope::types::{Framework, VisitedKey};
use goscope::{
    ExtractError, GoProgram, LoadOptions, Options, ReferenceReason, Report, Symbol, SymbolKind,
    Target,
};
use tempfile::TempDir;

/// A throwaway Go module on disk.
struct Module {
    dir: TempDir,
}

impl Module {
    fn new(path: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("go.mod"), format!("module {path}\n\ngo 1.22\n")).unwrap();
        Self { dir }
    }

    fn file(self, rel: &str, contents: &str) -> Self {
        let p = self.dir.path().join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, contents).unwrap();
        self
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn load(&self) -> GoProgram {
        GoProgram::load(self.root(), &LoadOptions::default()).unwrap()
    }

    fn target(&self, file: &str, line: usize) -> Target {
        Target {
            root: self.root().to_path_buf(),
            file: file.into(),
            line,
            column: None,
        }
    }

    fn extract(&self, file: &str, line: usize, options: &Options) -> Report {
        goscope::run(&self.target(file, line), options, &LoadOptions::default()).unwrap()
    }
}

const SCENARIO: &str = r#"package p

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

fn scenario() -> Module {
    Module::new("example.com/m").file("p/p.go", SCENARIO)
}

fn depth(d: usize) -> Options {
    Options {
        depth: d,
        ..Options::default()
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn direct_dependencies_at_depth_one() {
    let m = scenario();
    let options = Options {
        stub_external: false,
        ..depth(1)
    };
    let report = m.extract("p/p.go", 6, &options);
    let ex = &report.extract;
    assert_eq!(ex.target.name, "F");
    assert_eq!(ex.references.len(), 1);
    let g = &ex.references[0];
    assert_eq!((g.symbol.name.as_str(), g.depth, g.external), ("G", 1, false));
    assert!(g.symbol.code.starts_with("func G()"));
    assert_eq!(ex.external, vec!["example.com/ext.Q".to_string()]);
}

#[test]
fn depth_zero_inspects_nothing() {
    let m = scenario();
    let report = m.extract("p/p.go", 5, &depth(0));
    assert_eq!(report.extract.target.name, "F");
    assert!(report.extract.references.is_empty());
    assert!(report.extract.external.is_empty());
}

#[test]
fn depth_two_follows_calls() {
    let m = scenario();
    let report = m.extract("p/p.go", 5, &depth(2));
    let internal: Vec<(&str, usize)> = report
        .extract
        .references
        .iter()
        .filter(|r| !r.external)
        .map(|r| (r.symbol.name.as_str(), r.depth))
        .collect();
    assert_eq!(internal, vec![("G", 1), ("H", 2)]);
}

#[test]
fn interface_with_implementation_and_constructor() {
    let m = Module::new("example.com/m").file(
        "q/q.go",
        r#"package q

type I interface {
	M()
}

type S struct{}

func (s *S) M() {}

func NewI() I { return &S{} }
"#,
    );
    let program = m.load();
    let file = m.root().canonicalize().unwrap().join("q/q.go");
    let set: Vec<Symbol> = [3, 7, 11]
        .iter()
        .map(|l| locate(&program, &file, *l, None).unwrap())
        .collect();
    let options = Options::default();
    let mappings = InterfaceAnalyzer::new(&program, &options).analyze(&set);
    assert_eq!(mappings.len(), 1);
    assert_eq!(mappings[0].interface.name, "I");
    assert_eq!(mappings[0].implementations.len(), 1);
    assert_eq!(mappings[0].implementations[0].name, "S");
    let ctor = mappings[0].constructor.as_ref().unwrap();
    assert_eq!(ctor.name, "NewI");
    assert_eq!(ctor.implementation.as_deref(), Some("S"));
}

#[test]
fn manual_provider_binding() {
    let m = Module::new("example.com/m").file(
        "app.go",
        r#"package app

type Dep struct{}

type Product struct{}

func NewThing(d Dep) Product { return Product{} }
"#,
    );
    let report = m.extract("app.go", 7, &depth(1));
    let ex = &report.extract;
    assert_eq!(ex.framework, Framework::Manual);
    assert_eq!(ex.di_bindings.len(), 1);
    let b = &ex.di_bindings[0];
    assert_eq!(b.provider.name, "NewThing");
    assert_eq!(b.product.as_ref().unwrap().name, "Product");
    let deps: Vec<&str> = b.dependencies.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(deps, vec!["Dep"]);
    assert_eq!(b.scope, "singleton");
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

const GRAPH: &str = r#"package graph

import (
	"fmt"
	"strings"
)

type Node struct {
	Name  string
	Edges []*Node
}

func (n *Node) Visit(seen map[string]bool) {
	if seen[n.Name] {
		return
	}
	seen[n.Name] = true
	for _, e := range n.Edges {
		e.Visit(seen)
	}
	Report(n)
}

func Report(n *Node) {
	fmt.Println(strings.ToUpper(n.Name))
	Walk(n)
}

func Walk(n *Node) {
	n.Visit(map[string]bool{})
}

const Limit = 3

var Default = &Node{Name: "root"}
"#;

#[test]
fn every_position_inside_a_declaration_locates_it() {
    let m = Module::new("example.com/g").file("graph/graph.go", GRAPH);
    let program = m.load();
    let file = m.root().canonicalize().unwrap().join("graph/graph.go");
    let expected = [
        (8..=11, "Node", SymbolKind::Struct),
        (13..=22, "Visit", SymbolKind::Method),
        (24..=27, "Report", SymbolKind::Function),
        (29..=31, "Walk", SymbolKind::Function),
        (33..=33, "Limit", SymbolKind::Constant),
        (35..=35, "Default", SymbolKind::Variable),
    ];
    for (lines, name, kind) in expected {
        for line in lines {
            let s = locate(&program, &file, line, None).unwrap();
            assert_eq!((s.name.as_str(), s.kind), (name, kind), "line {line}");
        }
    }
}

#[test]
fn depth_bounds_dedup_and_stubs_hold() {
    let m = Module::new("example.com/g").file("graph/graph.go", GRAPH);
    let program = m.load();
    let file = m.root().canonicalize().unwrap().join("graph/graph.go");
    for line in [13, 24, 29] {
        let target = locate(&program, &file, line, None).unwrap();
        for d in 0..=4 {
            let collected = Collector::new(&program, &depth(d)).collect(&target).unwrap();
            let mut keys: HashSet<VisitedKey> = HashSet::new();
            for r in &collected.references {
                assert!(r.depth >= 1 && r.depth <= d, "depth {} at max {d}", r.depth);
                assert!(keys.insert(r.symbol.key()), "duplicate {}", r.symbol.qualified_name());
                assert_ne!(r.symbol.key(), target.key());
                if r.external {
                    assert!(r.stub);
                    assert!(r.symbol.code.is_empty());
                } else {
                    assert!(r.symbol.file.ends_with("graph.go"));
                }
            }
            if d == 0 {
                assert!(collected.references.is_empty() && collected.external.is_empty());
            }
        }
    }
}

#[test]
fn cycles_terminate_with_each_symbol_once() {
    let m = Module::new("example.com/g").file("graph/graph.go", GRAPH);
    let report = m.extract("graph/graph.go", 24, &depth(10));
    let names: Vec<&str> = report
        .extract
        .references
        .iter()
        .filter(|r| !r.external)
        .map(|r| r.symbol.name.as_str())
        .collect();
    for name in ["Walk", "Visit", "Node"] {
        assert_eq!(names.iter().filter(|n| **n == name).count(), 1, "{name} in {names:?}");
    }
    assert!(!names.contains(&"Report"));
    assert!(report.extract.external.contains(&"fmt.Println".to_string()));
    assert!(report.extract.external.contains(&"strings.ToUpper".to_string()));
}

const SHAPES: &str = r#"package shapes

type Shape interface {
	Area() float64
}

type Named interface {
	Name() string
}

type Square struct{ side float64 }

func (s Square) Area() float64 { return s.side * s.side }
func (s Square) Name() string  { return "square" }

type Circle struct{ r float64 }

func (c *Circle) Area() float64 { return 3 * c.r * c.r }

func NewShape(side float64) Shape { return Square{side: side} }

func NewNamed() Named { return Square{} }

func Describe(a Square, b *Circle) float64 {
	var s Shape = NewShape(1)
	var n Named = NewNamed()
	_ = n
	return a.Area() + b.Area() + s.Area()
}
"#;

#[test]
fn relationship_edges_pair_up() {
    let m = Module::new("example.com/s").file("shapes/shapes.go", SHAPES);
    let report = m.extract("shapes/shapes.go", 25, &depth(1));
    let ex = &report.extract;

    let implements: HashSet<(String, String)> = ex
        .references
        .iter()
        .filter(|r| r.reason == ReferenceReason::ImplementsInterface)
        .map(|r| (r.symbol.name.clone(), r.referenced_by.clone()))
        .collect();
    let contracts: HashSet<(String, String)> = ex
        .references
        .iter()
        .filter(|r| r.reason == ReferenceReason::InterfaceContract)
        .map(|r| (r.referenced_by.clone(), r.symbol.name.clone()))
        .collect();
    assert!(!implements.is_empty());
    assert_eq!(implements, contracts);
    assert!(implements.contains(&("Shape".to_string(), "Circle".to_string())));
    assert!(implements.contains(&("Named".to_string(), "Square".to_string())));
    let relationships = [
        ReferenceReason::ImplementsInterface,
        ReferenceReason::InterfaceContract,
        ReferenceReason::ReturnsInterface,
        ReferenceReason::DiBinding,
    ];
    assert!(ex
        .references
        .iter()
        .filter(|r| relationships.contains(&r.reason))
        .all(|r| r.depth == 2));
}

#[test]
fn same_named_implementations_in_different_packages_pair_up() {
    let imp = |pkg: &str| format!("package {pkg}\n\ntype S struct{{}}\n\nfunc (S) M() {{}}\n");
    let m = Module::new("example.com/m")
        .file("a/a.go", "package a\n\ntype I interface {\n\tM()\n}\n")
        .file("b/b.go", &imp("b"))
        .file("c/c.go", &imp("c"));
    let program = m.load();
    let root = m.root().canonicalize().unwrap();
    let set: Vec<Symbol> = ["a/a.go", "b/b.go", "c/c.go"]
        .iter()
        .map(|f| locate(&program, &root.join(f), 3, None).unwrap())
        .collect();
    let options = Options::default();
    let mappings = InterfaceAnalyzer::new(&program, &options).analyze(&set);
    assert_eq!(mappings.len(), 1);
    let packages: Vec<&str> = mappings[0]
        .implementations
        .iter()
        .map(|s| s.package.as_str())
        .collect();
    assert_eq!(packages, vec!["example.com/m/b", "example.com/m/c"]);

    let refs = goscope::interfaces::relationship_references(&mappings, 2);
    let count = |reason| refs.iter().filter(|r| r.reason == reason).count();
    assert_eq!(count(ReferenceReason::ImplementsInterface), 2);
    assert_eq!(count(ReferenceReason::InterfaceContract), 2);
    let contract_targets: HashSet<VisitedKey> = refs
        .iter()
        .filter(|r| r.reason == ReferenceReason::InterfaceContract)
        .map(|r| r.symbol.key())
        .collect();
    let impl_sources: HashSet<VisitedKey> = mappings[0]
        .implementations
        .iter()
        .map(Symbol::key)
        .collect();
    assert_eq!(contract_targets, impl_sources);
}

#[test]
fn constructors_map_to_one_interface() {
    let m = Module::new("example.com/s").file("shapes/shapes.go", SHAPES);
    let report = m.extract("shapes/shapes.go", 25, &depth(1));
    let mut seen = HashSet::new();
    for mapping in &report.extract.interface_mappings {
        if let Some(ctor) = &mapping.constructor {
            assert!(seen.insert(ctor.name.clone()), "{} mapped twice", ctor.name);
            assert_eq!(ctor.interface_type.as_deref(), Some(mapping.interface.name.as_str()));
        }
    }
    assert_eq!(seen.len(), 2);
}

// ---------------------------------------------------------------------------
// Errors and rendering
// ---------------------------------------------------------------------------

#[test]
fn position_errors() {
    let m = scenario();
    let err = goscope::run(&m.target("p/p.go", 4), &depth(1), &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, ExtractError::SymbolNotFound { .. }));

    let err = goscope::run(&m.target("p/p.go", 99), &depth(1), &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, ExtractError::InvalidPosition { .. }));

    let err = goscope::run(&m.target("p/none.go", 1), &depth(1), &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, ExtractError::FileNotFound(_)));

    let missing = Target {
        root: m.root().join("nope"),
        ..m.target("p/p.go", 5)
    };
    let err = goscope::run(&missing, &depth(1), &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, ExtractError::InvalidInput(_)));
}

#[test]
fn ignore_patterns_hide_packages() {
    let m = scenario().file("gen/gen.go", "package gen\n\nfunc Gen() {}\n");
    let load = LoadOptions {
        ignore_patterns: vec!["gen/".into()],
    };
    let err = goscope::run(&m.target("gen/gen.go", 3), &depth(1), &load).unwrap_err();
    assert!(matches!(err, ExtractError::FileNotFound(_)));
}

#[test]
fn renders_every_format() {
    let m = scenario();
    let report = m.extract("p/p.go", 5, &depth(2));
    for format in [Format::Markdown, Format::Json, Format::Toon] {
        let mut buf = Vec::new();
        Formatter::new(&mut buf, format).format_report(&report).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("G"), "{format}");
    }
}

#[test]
fn analyzers_accept_any_symbol_set() {
    let m = scenario();
    let program = m.load();
    let options = Options::default();
    assert!(InterfaceAnalyzer::new(&program, &options).analyze(&[]).is_empty());
    let di = DiAnalyzer::new(&program);
    assert_eq!(di.detect_framework(), Framework::None);
    assert!(di.analyze(Framework::None, &[]).is_empty());
}
