//! The project-wide type graph and member binding.
//!
//! Per-unit type declarations are merged with the signature database into
//! an arena of [`TypeNode`]s addressed by [`TypeId`]. Supertype edges are
//! index references, never pointers, so shared read access during parallel
//! rewriting is trivially safe and pathological cycles cannot produce
//! unbounded traversal: every walk carries an explicit visited set, and a
//! detected cycle poisons only the implicated types (their member lookups
//! answer `Ambiguous`), never the whole project.
//!
//! Member binding walks supertypes breadth-first from the most-derived
//! type, preferring an exact arity match and falling back to a name-only
//! match. An unknown supertype degrades the chain: lookups still proceed
//! through what is known, tagged `incomplete`.

use std::collections::{HashMap, HashSet, VecDeque};

use unmask_core::mapping::descriptor_arity;
use unmask_core::report::{Diagnostic, DiagnosticKind};

use crate::sigdb::SignatureDb;
use crate::symbols::{SymbolKind, SymbolTable};

// ============================================================================
// IDs & Nodes
// ============================================================================

/// Arena index of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl std::fmt::Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "type_{}", self.0)
    }
}

/// Member namespace within a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Method,
    Field,
}

/// One member signature attached to a type node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub kind: MemberKind,
    /// Normalized parameter descriptor (methods only).
    pub descriptor: Option<String>,
    /// Field type or method return type, as declared.
    pub ty: Option<String>,
}

/// Where a type node came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeOrigin {
    /// Declared in a source unit.
    Source { unit: String },
    /// Known only through the signature database.
    Database,
}

/// A class/interface/enum entry in the project-wide graph.
#[derive(Debug, Clone)]
pub struct TypeNode {
    pub id: TypeId,
    pub fqcn: String,
    /// Supertype names as written (class + interfaces), possibly short.
    pub declared_supers: Vec<String>,
    /// Resolved supertype edges.
    pub supers: Vec<TypeId>,
    /// Declared supers that resolved to nothing known.
    pub unresolved_supers: Vec<String>,
    pub members: Vec<Member>,
    pub origin: TypeOrigin,
    /// Member names are authoritative (known framework interface).
    pub canonical: bool,
    /// Part of an inheritance cycle; member lookups answer Ambiguous.
    pub cyclic: bool,
}

// ============================================================================
// Resolution Results
// ============================================================================

/// A resolved member with its declaring type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    pub owner: TypeId,
    pub owner_fqcn: String,
    pub name: String,
    pub kind: MemberKind,
    pub descriptor: Option<String>,
    pub ty: Option<String>,
    pub canonical: bool,
}

/// Outcome of a member lookup. Every consumer branches on this; there is
/// no "assume resolved" accessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberResolution {
    Resolved(MemberRef),
    Ambiguous(Vec<MemberRef>),
    NotFound,
}

/// A lookup outcome plus chain-completeness information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub outcome: MemberResolution,
    /// True when the supertype chain was degraded by an unknown super;
    /// a NotFound with this flag is best-effort, not definitive.
    pub incomplete: bool,
}

// ============================================================================
// Graph
// ============================================================================

/// The project-wide type graph.
#[derive(Debug, Default)]
pub struct TypeGraph {
    types: Vec<TypeNode>,
    by_fqcn: HashMap<String, TypeId>,
    by_simple: HashMap<String, Vec<TypeId>>,
}

impl TypeGraph {
    /// Build the graph from all per-unit tables plus the signature
    /// database. Needs every unit's table: a supertype written in unit A
    /// may be declared in unit B.
    pub fn build<'t, I>(tables: I, db: &SignatureDb, diagnostics: &mut Vec<Diagnostic>) -> TypeGraph
    where
        I: IntoIterator<Item = &'t SymbolTable>,
    {
        let tables: Vec<&SymbolTable> = tables.into_iter().collect();
        let mut graph = TypeGraph::default();

        // Source types first: they shadow database entries of the same name.
        for table in &tables {
            for decl in &table.types {
                let members = table
                    .members_of(&decl.fqcn)
                    .filter(|s| s.kind != SymbolKind::Constructor)
                    .map(|s| Member {
                        name: s.name.clone(),
                        kind: if s.kind == SymbolKind::Method {
                            MemberKind::Method
                        } else {
                            MemberKind::Field
                        },
                        descriptor: s.descriptor.clone(),
                        ty: s.declared_type.clone(),
                    })
                    .collect();
                let mut declared_supers = Vec::new();
                if let Some(sc) = &decl.superclass {
                    declared_supers.push(sc.clone());
                }
                declared_supers.extend(decl.interfaces.iter().cloned());

                graph.add_node(TypeNode {
                    id: TypeId(0), // assigned by add_node
                    fqcn: decl.fqcn.clone(),
                    declared_supers,
                    supers: Vec::new(),
                    unresolved_supers: Vec::new(),
                    members,
                    origin: TypeOrigin::Source {
                        unit: table.unit_path.clone(),
                    },
                    canonical: false,
                    cyclic: false,
                });
            }
        }

        // Database types fill in what source lacks.
        for (fqcn, sig) in &db.types {
            if graph.by_fqcn.contains_key(fqcn) {
                continue;
            }
            let mut members: Vec<Member> = sig
                .methods
                .iter()
                .map(|m| Member {
                    name: m.name.clone(),
                    kind: MemberKind::Method,
                    descriptor: m.descriptor.clone(),
                    ty: m.returns.clone(),
                })
                .collect();
            members.extend(sig.fields.iter().map(|f| Member {
                name: f.name.clone(),
                kind: MemberKind::Field,
                descriptor: None,
                ty: f.ty.clone(),
            }));
            let mut declared_supers = sig.supers.clone();
            declared_supers.extend(sig.interfaces.iter().cloned());

            graph.add_node(TypeNode {
                id: TypeId(0),
                fqcn: fqcn.clone(),
                declared_supers,
                supers: Vec::new(),
                unresolved_supers: Vec::new(),
                members,
                origin: TypeOrigin::Database,
                canonical: sig.canonical,
                cyclic: false,
            });
        }

        graph.resolve_supers(&tables, diagnostics);
        graph.mark_cycles(diagnostics);
        graph
    }

    fn add_node(&mut self, mut node: TypeNode) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        node.id = id;
        self.by_fqcn.insert(node.fqcn.clone(), id);
        self.by_simple
            .entry(simple_name(&node.fqcn).to_string())
            .or_default()
            .push(id);
        self.types.push(node);
        id
    }

    /// Fill in supertype edges, using the declaring unit's imports for
    /// source types and exact FQCN lookup for database types.
    fn resolve_supers(&mut self, tables: &[&SymbolTable], diagnostics: &mut Vec<Diagnostic>) {
        let tables_by_unit: HashMap<&str, &SymbolTable> = tables
            .iter()
            .map(|t| (t.unit_path.as_str(), *t))
            .collect();

        for i in 0..self.types.len() {
            let (declared, origin) = {
                let node = &self.types[i];
                (node.declared_supers.clone(), node.origin.clone())
            };
            let mut supers = Vec::new();
            let mut unresolved = Vec::new();

            for name in &declared {
                let resolved = match &origin {
                    TypeOrigin::Source { unit } => tables_by_unit
                        .get(unit.as_str())
                        .and_then(|table| self.resolve_type_name(name, table)),
                    TypeOrigin::Database => self.by_fqcn.get(name.as_str()).copied(),
                };
                match resolved {
                    Some(id) => supers.push(id),
                    None => {
                        unresolved.push(name.clone());
                        if let TypeOrigin::Source { unit } = &origin {
                            diagnostics.push(Diagnostic::unit(
                                DiagnosticKind::MissingSignatureData,
                                unit.clone(),
                                format!(
                                    "supertype '{}' of {} has no source or database entry",
                                    name, self.types[i].fqcn
                                ),
                            ));
                        }
                    }
                }
            }

            self.types[i].supers = supers;
            self.types[i].unresolved_supers = unresolved;
        }
    }

    /// Mark every type on an inheritance cycle. The source object model
    /// forbids cycles, so any found are treated as a hard configuration
    /// error for those types only.
    fn mark_cycles(&mut self, diagnostics: &mut Vec<Diagnostic>) {
        const WHITE: u8 = 0;
        const GRAY: u8 = 1;
        const BLACK: u8 = 2;
        let n = self.types.len();
        let mut color = vec![WHITE; n];
        let mut cyclic = vec![false; n];

        fn dfs(
            i: usize,
            types: &[TypeNode],
            color: &mut [u8],
            cyclic: &mut [bool],
            stack: &mut Vec<usize>,
        ) {
            color[i] = GRAY;
            stack.push(i);
            for s in &types[i].supers {
                let j = s.0 as usize;
                if color[j] == WHITE {
                    dfs(j, types, color, cyclic, stack);
                } else if color[j] == GRAY {
                    // Back edge: everything from j to the stack top cycles.
                    if let Some(pos) = stack.iter().position(|&k| k == j) {
                        for &k in &stack[pos..] {
                            cyclic[k] = true;
                        }
                    }
                }
            }
            stack.pop();
            color[i] = BLACK;
        }

        let mut stack = Vec::new();
        for i in 0..n {
            if color[i] == WHITE {
                dfs(i, &self.types, &mut color, &mut cyclic, &mut stack);
            }
        }

        for (i, is_cyclic) in cyclic.iter().enumerate() {
            if *is_cyclic {
                self.types[i].cyclic = true;
                diagnostics.push(Diagnostic::project(
                    DiagnosticKind::InheritanceCycle,
                    format!("inheritance cycle through {}", self.types[i].fqcn),
                ));
            }
        }
    }

    pub fn node(&self, id: TypeId) -> &TypeNode {
        &self.types[id.0 as usize]
    }

    pub fn nodes(&self) -> &[TypeNode] {
        &self.types
    }

    pub fn id_of(&self, fqcn: &str) -> Option<TypeId> {
        self.by_fqcn.get(fqcn).copied()
    }

    /// Resolve a type name as written in a unit to a graph node.
    ///
    /// Resolution order mirrors the language: qualified names exactly,
    /// then types declared in the unit, explicit imports, same package,
    /// wildcard imports, `java.lang`, and finally a unique simple-name
    /// match anywhere in the project.
    pub fn resolve_type_name(&self, name: &str, table: &SymbolTable) -> Option<TypeId> {
        let name = strip_type_decorations(name);
        if name.is_empty() || is_primitive(&name) {
            return None;
        }

        if name.contains('.') {
            if let Some(id) = self.by_fqcn.get(name.as_str()) {
                return Some(*id);
            }
            // Nested types are written with dots (`View.OnClickListener`)
            // but keyed by binary name (`View$OnClickListener`): match on
            // the dotted form of each node's FQCN.
            let mut hits = self.types.iter().filter(|n| {
                let dotted = n.fqcn.replace('$', ".");
                dotted == name || dotted.ends_with(&format!(".{name}"))
            });
            let first = hits.next();
            return match (first, hits.next()) {
                (Some(node), None) => Some(node.id),
                _ => None,
            };
        }

        // Declared in this unit (nearest nesting first is approximated by
        // declaration order; inner classes carry `Outer$Inner` names).
        for decl in &table.types {
            if simple_name(&decl.fqcn) == name {
                return self.by_fqcn.get(decl.fqcn.as_str()).copied();
            }
        }

        for import in &table.imports {
            if import.wildcard {
                continue;
            }
            if import.path.rsplit('.').next() == Some(name.as_str()) {
                if let Some(id) = self.by_fqcn.get(import.path.as_str()) {
                    return Some(*id);
                }
            }
        }

        if let Some(pkg) = &table.package {
            if let Some(id) = self.by_fqcn.get(&format!("{pkg}.{name}")) {
                return Some(*id);
            }
        }

        for import in &table.imports {
            if import.wildcard {
                if let Some(id) = self.by_fqcn.get(&format!("{}.{}", import.path, name)) {
                    return Some(*id);
                }
            }
        }

        if let Some(id) = self.by_fqcn.get(&format!("java.lang.{name}")) {
            return Some(*id);
        }

        match self.by_simple.get(name.as_str()) {
            Some(ids) if ids.len() == 1 => Some(ids[0]),
            _ => None,
        }
    }

    /// All supertypes reachable from `ty`, breadth-first, self first.
    /// Visited-set guarded, so cycles terminate.
    pub fn supertype_chain(&self, ty: TypeId) -> Vec<TypeId> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([ty]);
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            order.push(current);
            queue.extend(self.node(current).supers.iter().copied());
        }
        order
    }

    /// Bind a member reference, walking supertypes breadth-first from the
    /// most-derived type.
    pub fn resolve_member(
        &self,
        ty: TypeId,
        name: &str,
        kind: MemberKind,
        arity: Option<usize>,
    ) -> Resolution {
        if self.node(ty).cyclic {
            return Resolution {
                outcome: MemberResolution::Ambiguous(Vec::new()),
                incomplete: false,
            };
        }

        let mut incomplete = false;
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([ty]);

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            let node = self.node(current);
            if !node.unresolved_supers.is_empty() {
                incomplete = true;
            }

            let named: Vec<&Member> = node
                .members
                .iter()
                .filter(|m| m.kind == kind && m.name == name)
                .collect();

            if !named.is_empty() {
                let chosen: Vec<&Member> = match (kind, arity) {
                    (MemberKind::Method, Some(want)) => {
                        let exact: Vec<&Member> = named
                            .iter()
                            .copied()
                            .filter(|m| {
                                m.descriptor
                                    .as_deref()
                                    .map(|d| descriptor_arity(d) == want)
                                    .unwrap_or(false)
                            })
                            .collect();
                        if exact.is_empty() {
                            named // name-only fallback
                        } else {
                            exact
                        }
                    }
                    _ => named,
                };

                let refs: Vec<MemberRef> = chosen
                    .iter()
                    .map(|m| MemberRef {
                        owner: current,
                        owner_fqcn: node.fqcn.clone(),
                        name: m.name.clone(),
                        kind: m.kind,
                        descriptor: m.descriptor.clone(),
                        ty: m.ty.clone(),
                        canonical: node.canonical,
                    })
                    .collect();

                let outcome = if refs.len() == 1 {
                    MemberResolution::Resolved(refs.into_iter().next().expect("one ref"))
                } else {
                    MemberResolution::Ambiguous(refs)
                };
                return Resolution {
                    outcome,
                    incomplete,
                };
            }

            queue.extend(node.supers.iter().copied());
        }

        Resolution {
            outcome: MemberResolution::NotFound,
            incomplete,
        }
    }
}

/// Simple name of a binary FQCN (`pkg.Outer$Inner` -> `Inner`).
pub fn simple_name(fqcn: &str) -> &str {
    fqcn.rsplit(['.', '$']).next().unwrap_or(fqcn)
}

/// Strip generics, arrays, and whitespace from a declared type text.
pub fn strip_type_decorations(ty: &str) -> String {
    let ty = ty.trim();
    let base = match ty.find('<') {
        Some(i) => &ty[..i],
        None => ty,
    };
    base.trim_end_matches("[]").trim().to_string()
}

fn is_primitive(name: &str) -> bool {
    matches!(
        name,
        "int" | "long" | "float" | "double" | "boolean" | "byte" | "char" | "short" | "void" | "var"
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolTable;
    use crate::syntax::JavaParser;

    fn analyze(sources: &[(&str, &str)]) -> (Vec<SymbolTable>, Vec<Diagnostic>) {
        let mut parser = JavaParser::new().unwrap();
        let tables = sources
            .iter()
            .map(|(path, src)| {
                let tree = parser.parse(src).unwrap();
                SymbolTable::build(path, &tree, src)
            })
            .collect();
        (tables, Vec::new())
    }

    fn graph_for(sources: &[(&str, &str)]) -> (TypeGraph, Vec<Diagnostic>) {
        let (tables, mut diags) = analyze(sources);
        let graph = TypeGraph::build(&tables, &SignatureDb::builtin(), &mut diags);
        (graph, diags)
    }

    #[test]
    fn cross_unit_supertype_edges_resolve() {
        let (graph, _) = graph_for(&[
            ("com/a/b.java", "package com.a;\nclass b extends c { void m() { } }"),
            ("com/a/c.java", "package com.a;\nclass c { void p() { } int f; }"),
        ]);

        let b = graph.id_of("com.a.b").unwrap();
        let c = graph.id_of("com.a.c").unwrap();
        assert_eq!(graph.node(b).supers, vec![c]);

        // Inherited member binds to the declaring supertype.
        let res = graph.resolve_member(b, "p", MemberKind::Method, Some(0));
        match res.outcome {
            MemberResolution::Resolved(m) => assert_eq!(m.owner_fqcn, "com.a.c"),
            other => panic!("expected resolved, got {other:?}"),
        }
        assert!(!res.incomplete);
    }

    #[test]
    fn imported_supertype_resolves_across_packages() {
        let (graph, _) = graph_for(&[
            (
                "com/a/b.java",
                "package com.a;\nimport com.x.c;\nclass b extends c { }",
            ),
            ("com/x/c.java", "package com.x;\nclass c { }"),
        ]);
        let b = graph.id_of("com.a.b").unwrap();
        let c = graph.id_of("com.x.c").unwrap();
        assert_eq!(graph.node(b).supers, vec![c]);
    }

    #[test]
    fn most_derived_declaration_wins() {
        let (graph, _) = graph_for(&[
            (
                "com/a/b.java",
                "package com.a;\nclass b extends c { void m() { } }",
            ),
            ("com/a/c.java", "package com.a;\nclass c { void m() { } }"),
        ]);
        let b = graph.id_of("com.a.b").unwrap();
        let res = graph.resolve_member(b, "m", MemberKind::Method, Some(0));
        match res.outcome {
            MemberResolution::Resolved(m) => assert_eq!(m.owner_fqcn, "com.a.b"),
            other => panic!("expected resolved, got {other:?}"),
        }
    }

    #[test]
    fn unknown_supertype_degrades_to_incomplete() {
        let (graph, diags) = graph_for(&[(
            "com/a/b.java",
            "package com.a;\nclass b extends Mystery { }",
        )]);
        let b = graph.id_of("com.a.b").unwrap();
        assert_eq!(graph.node(b).unresolved_supers, vec!["Mystery"]);
        assert!(diags
            .iter()
            .any(|d| d.kind == DiagnosticKind::MissingSignatureData));

        let res = graph.resolve_member(b, "ghost", MemberKind::Method, None);
        assert_eq!(res.outcome, MemberResolution::NotFound);
        assert!(res.incomplete);
    }

    #[test]
    fn overload_arity_prefers_exact_then_falls_back() {
        let (graph, _) = graph_for(&[(
            "com/a/b.java",
            "package com.a;\nclass b { void m(int x) { } void m(int x, int y) { } }",
        )]);
        let b = graph.id_of("com.a.b").unwrap();

        let res = graph.resolve_member(b, "m", MemberKind::Method, Some(2));
        match res.outcome {
            MemberResolution::Resolved(m) => {
                assert_eq!(m.descriptor.as_deref(), Some("(int,int)"))
            }
            other => panic!("expected resolved, got {other:?}"),
        }

        // No arity information: both overloads are candidates.
        let res = graph.resolve_member(b, "m", MemberKind::Method, None);
        assert!(matches!(res.outcome, MemberResolution::Ambiguous(ref v) if v.len() == 2));
    }

    #[test]
    fn inheritance_cycle_poisons_only_the_cycle() {
        let (graph, diags) = graph_for(&[
            ("com/a/b.java", "package com.a;\nclass b extends c { }"),
            ("com/a/c.java", "package com.a;\nclass c extends b { }"),
            ("com/a/d.java", "package com.a;\nclass d { void m() { } }"),
        ]);

        let b = graph.id_of("com.a.b").unwrap();
        assert!(graph.node(b).cyclic);
        assert!(diags
            .iter()
            .any(|d| d.kind == DiagnosticKind::InheritanceCycle));

        let res = graph.resolve_member(b, "anything", MemberKind::Method, None);
        assert!(matches!(res.outcome, MemberResolution::Ambiguous(ref v) if v.is_empty()));

        // The unrelated type is unaffected.
        let d = graph.id_of("com.a.d").unwrap();
        assert!(!graph.node(d).cyclic);
        let res = graph.resolve_member(d, "m", MemberKind::Method, Some(0));
        assert!(matches!(res.outcome, MemberResolution::Resolved(_)));
    }

    #[test]
    fn builtin_interface_reachable_through_chain() {
        let (graph, _) = graph_for(&[(
            "com/a/h.java",
            "package com.a;\nimport android.view.View;\nclass h implements View.OnClickListener { public void onClick(View v) { } }",
        )]);
        let h = graph.id_of("com.a.h").unwrap();
        let listener = graph.id_of("android.view.View$OnClickListener").unwrap();
        assert!(graph.node(listener).canonical);
        // The dotted `View.OnClickListener` resolves to the binary name.
        assert!(graph.node(h).supers.contains(&listener));
        assert!(graph.supertype_chain(h).contains(&listener));
    }

    #[test]
    fn supertype_chain_is_bfs_and_terminates_on_cycles() {
        let (graph, _) = graph_for(&[
            ("a.java", "class a extends b { }"),
            ("b.java", "class b extends a { }"),
        ]);
        let a = graph.id_of("a").unwrap();
        let chain = graph.supertype_chain(a);
        assert_eq!(chain.len(), 2);
    }
}
