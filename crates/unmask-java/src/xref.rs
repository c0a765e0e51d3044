//! The cross-reference index: call edges, field access sites, and
//! string-literal correlation.
//!
//! Built once, project-wide, after every unit's symbol table exists; read
//! only afterwards. Only calls with exactly one resolved candidate become
//! hard edges. A call with several plausible targets (unresolved overloads,
//! dispatch through an interface with multiple implementers) is recorded as
//! *weak* evidence keyed by every candidate — downstream inference treats
//! that as corroboration at reduced weight, never as certainty.

use std::collections::BTreeMap;
use tree_sitter::Node;

use unmask_core::mapping::SymbolKey;
use unmask_core::patch::Span;

use crate::binding::BindCtx;
use crate::symbols::Namespace;
use crate::syntax::{argument_count, node_text, span_of, walk_tree};
use crate::typegraph::{MemberKind, MemberRef, MemberResolution, TypeGraph};
use crate::AnalyzedUnit;

// ============================================================================
// Records
// ============================================================================

/// A call site whose target resolved to exactly one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallEdge {
    /// The enclosing method of the call site (None in initializers).
    pub caller: Option<SymbolKey>,
    pub callee: SymbolKey,
    pub unit: String,
    pub span: Span,
}

/// A call site with several plausible targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeakCall {
    pub candidates: Vec<SymbolKey>,
    pub caller: Option<SymbolKey>,
    pub unit: String,
    pub span: Span,
}

/// One read or write site of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSite {
    pub unit: String,
    pub span: Span,
    /// The enclosing method of the access site.
    pub accessor: Option<SymbolKey>,
}

/// A string literal passed to a key-based accessor call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralUse {
    /// Literal content without quotes.
    pub value: String,
    /// The accessor method name (`getString`, `optInt`, ...).
    pub accessor: String,
    /// Argument position of the literal in the call.
    pub arg_index: usize,
    pub enclosing: Option<SymbolKey>,
    /// The field the call's result is immediately assigned to, if any.
    pub assigned_field: Option<SymbolKey>,
    pub unit: String,
}

/// Accessor names whose first string argument is a semantic key.
pub const KEY_ACCESSORS: &[&str] = &[
    "getString",
    "getInt",
    "getBoolean",
    "getLong",
    "getFloat",
    "optString",
    "optInt",
    "optBoolean",
    "getJSONObject",
];

// ============================================================================
// Index
// ============================================================================

/// The project-wide cross-reference index. Additive during build, queried
/// (never mutated) during inference.
#[derive(Debug, Default)]
pub struct CallGraphIndex {
    edges: Vec<CallEdge>,
    callers: BTreeMap<SymbolKey, Vec<usize>>,
    weak: Vec<WeakCall>,
    weak_by_candidate: BTreeMap<SymbolKey, Vec<usize>>,
    reads: BTreeMap<SymbolKey, Vec<FieldSite>>,
    writes: BTreeMap<SymbolKey, Vec<FieldSite>>,
    literals: Vec<LiteralUse>,
}

impl CallGraphIndex {
    /// Build the index over all analyzed units.
    pub fn build(units: &[AnalyzedUnit], graph: &TypeGraph) -> CallGraphIndex {
        let mut index = CallGraphIndex::default();
        for analyzed in units {
            let ctx = BindCtx {
                source: &analyzed.unit.content,
                table: &analyzed.table,
                graph,
            };
            walk_tree(analyzed.tree.root(), &mut |node| {
                index.visit(node, &ctx, &analyzed.unit.path);
            });
        }
        tracing::debug!(
            edges = index.edges.len(),
            weak = index.weak.len(),
            literals = index.literals.len(),
            "cross-reference index built"
        );
        index
    }

    fn visit<'t>(&mut self, node: Node<'t>, ctx: &BindCtx<'t>, unit: &str) {
        match node.kind() {
            "method_invocation" => self.visit_invocation(node, ctx, unit),
            "field_access" => self.visit_field_access(node, ctx, unit),
            "identifier" => self.visit_bare_identifier(node, ctx, unit),
            _ => {}
        }
    }

    fn visit_invocation<'t>(&mut self, node: Node<'t>, ctx: &BindCtx<'t>, unit: &str) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, ctx.source);
        let span = span_of(name_node);
        let caller = ctx.enclosing_method_key(span.start);

        self.collect_literal_use(node, ctx, unit, name, &caller);

        let Some(receiver) = ctx.receiver_type(node) else {
            return;
        };
        let arity = node.child_by_field_name("arguments").map(argument_count);
        match ctx
            .graph
            .resolve_member(receiver, name, MemberKind::Method, arity)
            .outcome
        {
            MemberResolution::Resolved(member) => {
                let edge_index = self.edges.len();
                let callee = member_key(&member);
                self.callers
                    .entry(callee.clone())
                    .or_default()
                    .push(edge_index);
                self.edges.push(CallEdge {
                    caller,
                    callee,
                    unit: unit.to_string(),
                    span,
                });
            }
            MemberResolution::Ambiguous(candidates) if !candidates.is_empty() => {
                let weak_index = self.weak.len();
                let keys: Vec<SymbolKey> = candidates.iter().map(member_key).collect();
                for key in &keys {
                    self.weak_by_candidate
                        .entry(key.clone())
                        .or_default()
                        .push(weak_index);
                }
                self.weak.push(WeakCall {
                    candidates: keys,
                    caller,
                    unit: unit.to_string(),
                    span,
                });
            }
            _ => {}
        }
    }

    fn visit_field_access<'t>(&mut self, node: Node<'t>, ctx: &BindCtx<'t>, unit: &str) {
        let Some(object) = node.child_by_field_name("object") else {
            return;
        };
        let Some(field_node) = node.child_by_field_name("field") else {
            return;
        };
        let Some(owner) = ctx.expr_type(object) else {
            return;
        };
        let name = node_text(field_node, ctx.source);
        let MemberResolution::Resolved(member) = ctx
            .graph
            .resolve_member(owner, name, MemberKind::Field, None)
            .outcome
        else {
            return;
        };

        let span = span_of(field_node);
        self.record_field_site(member_key(&member), node, ctx, unit, span);
    }

    /// A bare identifier reading/writing a field of the enclosing class
    /// (implicit `this`).
    fn visit_bare_identifier<'t>(&mut self, node: Node<'t>, ctx: &BindCtx<'t>, unit: &str) {
        // Skip identifiers that are part of larger member accesses or
        // declarations; those are handled at their parent.
        let Some(parent) = node.parent() else {
            return;
        };
        if matches!(
            parent.kind(),
            "field_access"
                | "method_invocation"
                | "variable_declarator"
                | "formal_parameter"
                | "catch_formal_parameter"
                | "class_declaration"
                | "interface_declaration"
                | "enum_declaration"
                | "method_declaration"
                | "constructor_declaration"
                | "scoped_identifier"
                | "labeled_statement"
        ) {
            return;
        }

        let name = node_text(node, ctx.source);
        let offset = span_of(node).start;
        let scope = ctx.table.scope_at(offset);
        let Some(sym_id) = ctx.table.resolve_at(name, Namespace::Value, scope, offset) else {
            return;
        };
        let symbol = ctx.table.symbol(sym_id);
        if symbol.kind != crate::symbols::SymbolKind::Field {
            return;
        }
        let Some(key) = symbol.key(&ctx.table.unit_path) else {
            return;
        };
        self.record_field_site(key, node, ctx, unit, span_of(node));
    }

    fn record_field_site<'t>(
        &mut self,
        key: SymbolKey,
        node: Node<'t>,
        ctx: &BindCtx<'t>,
        unit: &str,
        span: Span,
    ) {
        let site = FieldSite {
            unit: unit.to_string(),
            span,
            accessor: ctx.enclosing_method_key(span.start),
        };
        if is_write_target(node) {
            self.writes.entry(key).or_default().push(site);
        } else {
            self.reads.entry(key).or_default().push(site);
        }
    }

    fn collect_literal_use<'t>(
        &mut self,
        node: Node<'t>,
        ctx: &BindCtx<'t>,
        unit: &str,
        name: &str,
        caller: &Option<SymbolKey>,
    ) {
        if !KEY_ACCESSORS.contains(&name) {
            return;
        }
        let Some(args) = node.child_by_field_name("arguments") else {
            return;
        };
        let mut cursor = args.walk();
        let first = args.named_children(&mut cursor).next();
        let Some(first) = first else {
            return;
        };
        if first.kind() != "string_literal" {
            return;
        }
        let raw = node_text(first, ctx.source);
        let value = raw.trim_matches('"').to_string();
        if value.is_empty() {
            return;
        }

        self.literals.push(LiteralUse {
            value,
            accessor: name.to_string(),
            arg_index: 0,
            enclosing: caller.clone(),
            assigned_field: assigned_field_of(node, ctx),
            unit: unit.to_string(),
        });
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Hard-edge call sites targeting a member.
    pub fn callers_of(&self, callee: &SymbolKey) -> impl Iterator<Item = &CallEdge> {
        self.callers
            .get(callee)
            .into_iter()
            .flatten()
            .map(|&i| &self.edges[i])
    }

    /// Weak call sites listing a member among their candidates.
    pub fn weak_callers_of(&self, candidate: &SymbolKey) -> impl Iterator<Item = &WeakCall> {
        self.weak_by_candidate
            .get(candidate)
            .into_iter()
            .flatten()
            .map(|&i| &self.weak[i])
    }

    /// Read sites of a field.
    pub fn reads_of(&self, field: &SymbolKey) -> &[FieldSite] {
        self.reads.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Write sites of a field.
    pub fn writes_of(&self, field: &SymbolKey) -> &[FieldSite] {
        self.writes.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All literal correlation entries.
    pub fn literals(&self) -> &[LiteralUse] {
        &self.literals
    }

    /// All members that appear as a call target (hard or weak),
    /// deterministically ordered.
    pub fn call_targets(&self) -> impl Iterator<Item = &SymbolKey> {
        // BTreeMap keys are already sorted; merge the two key sets.
        let mut keys: Vec<&SymbolKey> = self
            .callers
            .keys()
            .chain(self.weak_by_candidate.keys())
            .collect();
        keys.sort();
        keys.dedup();
        keys.into_iter()
    }

    /// Number of hard edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

/// The mapping-store key of a resolved member.
pub fn member_key(member: &MemberRef) -> SymbolKey {
    match member.kind {
        MemberKind::Method => SymbolKey::Method {
            owner: member.owner_fqcn.clone(),
            name: member.name.clone(),
            descriptor: member.descriptor.clone(),
        },
        MemberKind::Field => SymbolKey::Field {
            owner: member.owner_fqcn.clone(),
            name: member.name.clone(),
        },
    }
}

/// Whether a node is the target of an assignment or update.
fn is_write_target(node: Node<'_>) -> bool {
    match node.parent() {
        Some(p) if p.kind() == "assignment_expression" => p
            .child_by_field_name("left")
            .map(|l| l.id() == node.id())
            .unwrap_or(false),
        Some(p) if p.kind() == "update_expression" => true,
        _ => false,
    }
}

/// The field a call's result is immediately assigned to
/// (`this.f = x.getString("key")` patterns).
fn assigned_field_of<'t>(invocation: Node<'t>, ctx: &BindCtx<'t>) -> Option<SymbolKey> {
    let parent = invocation.parent()?;
    if parent.kind() != "assignment_expression" {
        return None;
    }
    let right = parent.child_by_field_name("right")?;
    if right.id() != invocation.id() {
        return None;
    }
    let left = parent.child_by_field_name("left")?;
    match left.kind() {
        "field_access" => {
            let object = left.child_by_field_name("object")?;
            let field = left.child_by_field_name("field")?;
            let owner = ctx.expr_type(object)?;
            let name = node_text(field, ctx.source);
            match ctx
                .graph
                .resolve_member(owner, name, MemberKind::Field, None)
                .outcome
            {
                MemberResolution::Resolved(member) => Some(member_key(&member)),
                _ => None,
            }
        }
        "identifier" => {
            let name = node_text(left, ctx.source);
            let offset = span_of(left).start;
            let scope = ctx.table.scope_at(offset);
            let sym_id = ctx.table.resolve_at(name, Namespace::Value, scope, offset)?;
            let symbol = ctx.table.symbol(sym_id);
            if symbol.kind == crate::symbols::SymbolKind::Field {
                symbol.key(&ctx.table.unit_path)
            } else {
                None
            }
        }
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sigdb::SignatureDb;
    use crate::symbols::SymbolTable;
    use crate::syntax::JavaParser;
    use crate::unit::{SourceUnit, UnitOrigin};
    use unmask_core::patch::FileId;

    fn analyze(sources: &[(&str, &str)]) -> (Vec<AnalyzedUnit>, TypeGraph) {
        let mut parser = JavaParser::new().unwrap();
        let units: Vec<AnalyzedUnit> = sources
            .iter()
            .enumerate()
            .map(|(i, (path, src))| {
                let tree = parser.parse(src).unwrap();
                let table = SymbolTable::build(path, &tree, src);
                AnalyzedUnit {
                    unit: SourceUnit {
                        id: FileId::new(i as u32),
                        path: path.to_string(),
                        content: src.to_string(),
                        origin: UnitOrigin::JavaFile {
                            rel_path: path.to_string(),
                        },
                    },
                    tree,
                    table,
                }
            })
            .collect();
        let tables: Vec<SymbolTable> = sources
            .iter()
            .map(|(path, src)| {
                let tree = parser.parse(src).unwrap();
                SymbolTable::build(path, &tree, src)
            })
            .collect();
        let mut diags = Vec::new();
        let graph = TypeGraph::build(&tables, &SignatureDb::builtin(), &mut diags);
        (units, graph)
    }

    fn fkey(owner: &str, name: &str) -> SymbolKey {
        SymbolKey::Field {
            owner: owner.to_string(),
            name: name.to_string(),
        }
    }

    fn mkey(owner: &str, name: &str, desc: &str) -> SymbolKey {
        SymbolKey::Method {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: Some(desc.to_string()),
        }
    }

    #[test]
    fn single_candidate_call_becomes_hard_edge() {
        let (units, graph) = analyze(&[
            (
                "com/a/b.java",
                "package com.a;\nclass b { void m() { c x = null; x.p(); } }",
            ),
            ("com/a/c.java", "package com.a;\nclass c { void p() { } }"),
        ]);
        let index = CallGraphIndex::build(&units, &graph);

        let callee = mkey("com.a.c", "p", "()");
        let edges: Vec<&CallEdge> = index.callers_of(&callee).collect();
        assert_eq!(edges.len(), 1);
        assert_eq!(
            edges[0].caller,
            Some(mkey("com.a.b", "m", "()"))
        );
    }

    #[test]
    fn unresolved_overload_is_weak_evidence_not_an_edge() {
        // Calling m with one argument where only 0- and 2-ary overloads
        // exist: no exact arity match, two name-only candidates.
        let (units, graph) = analyze(&[(
            "com/a/b.java",
            "package com.a;\nclass b { void m() { } void m(int x, int y) { } void go(b o) { o.m(1); } }",
        )]);
        let index = CallGraphIndex::build(&units, &graph);

        assert_eq!(index.edge_count(), 0);
        let weak: Vec<&WeakCall> = index
            .weak_callers_of(&mkey("com.a.b", "m", "()"))
            .collect();
        assert_eq!(weak.len(), 1);
        assert_eq!(weak[0].candidates.len(), 2);
    }

    #[test]
    fn field_reads_and_writes_are_classified() {
        let (units, graph) = analyze(&[(
            "com/a/b.java",
            "package com.a;\nclass b { int f; void m() { this.f = 1; int x = this.f; f = 2; } }",
        )]);
        let index = CallGraphIndex::build(&units, &graph);

        let key = fkey("com.a.b", "f");
        assert_eq!(index.writes_of(&key).len(), 2);
        assert_eq!(index.reads_of(&key).len(), 1);
    }

    #[test]
    fn key_accessor_literal_correlates_with_assigned_field() {
        let (units, graph) = analyze(&[(
            "com/a/b.java",
            "package com.a;\nclass b { String a; void m(b p) { this.a = p.getString(\"player_name\"); } }",
        )]);
        let index = CallGraphIndex::build(&units, &graph);

        assert_eq!(index.literals().len(), 1);
        let lit = &index.literals()[0];
        assert_eq!(lit.value, "player_name");
        assert_eq!(lit.accessor, "getString");
        assert_eq!(lit.assigned_field, Some(fkey("com.a.b", "a")));
    }

    #[test]
    fn plain_literals_are_not_correlated() {
        let (units, graph) = analyze(&[(
            "com/a/b.java",
            "package com.a;\nclass b { void m() { System.out.println(\"hello\"); } }",
        )]);
        let index = CallGraphIndex::build(&units, &graph);
        assert!(index.literals().is_empty());
    }

    #[test]
    fn inherited_call_binds_to_declaring_type() {
        let (units, graph) = analyze(&[
            (
                "com/a/b.java",
                "package com.a;\nclass b extends c { void m() { p(); } }",
            ),
            ("com/a/c.java", "package com.a;\nclass c { void p() { } }"),
        ]);
        let index = CallGraphIndex::build(&units, &graph);
        let edges: Vec<&CallEdge> = index.callers_of(&mkey("com.a.c", "p", "()")).collect();
        assert_eq!(edges.len(), 1);
    }
}
