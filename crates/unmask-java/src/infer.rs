//! Heuristic name inference: an ordered cascade of pure passes.
//!
//! Each pass is a pure function `(context) -> entries` over read-only
//! analysis state; passes run in fixed precedence order and feed the
//! layered mapping store, which enforces layer precedence and records
//! equal-precedence conflicts. Keeping every heuristic a standalone
//! function keeps them independently testable and removes hidden
//! execution-order coupling.
//!
//! Order:
//! 1. interface overrides — canonical names from externally known
//!    interfaces, matched by signature shape, never by name
//! 2. literal correlation — field names recovered from key-based lookup
//!    literals
//! 3. caller roles — role-qualified names from call-graph context
//! 4. conventions — loop counters, exception variables, accessor pairs

use std::collections::BTreeMap;

use tree_sitter::Node;

use unmask_core::mapping::{
    descriptor_arity, MappingEntry, MappingError, MappingStore, Provenance, SymbolKey,
};
use unmask_core::patch::Span;
use unmask_core::report::{Diagnostic, DiagnosticKind};

use crate::symbols::{Namespace, ScopeKind, SymbolKind, SymbolTable};
use crate::syntax::{node_text, span_of, walk_tree};
use crate::typegraph::{TypeGraph, TypeOrigin};
use crate::xref::CallGraphIndex;
use crate::AnalyzedUnit;

// ============================================================================
// Context & Runner
// ============================================================================

/// Read-only context shared by every inference pass.
pub struct InferContext<'a> {
    pub units: &'a [AnalyzedUnit],
    pub graph: &'a TypeGraph,
    pub xref: &'a CallGraphIndex,
    pub store: &'a MappingStore,
}

impl<'a> InferContext<'a> {
    fn table_for(&self, unit: &str) -> Option<&'a SymbolTable> {
        self.units
            .iter()
            .find(|u| u.unit.path == unit)
            .map(|u| &u.table)
    }

    /// Declaration span of a member key, when its owner is in source.
    fn member_decl_span(&self, key: &SymbolKey) -> Option<Span> {
        let (owner, name, want_method) = match key {
            SymbolKey::Method { owner, name, .. } => (owner, name, true),
            SymbolKey::Field { owner, name } => (owner, name, false),
            _ => return None,
        };
        for analyzed in self.units {
            for symbol in analyzed.table.members_of(owner) {
                let is_method =
                    matches!(symbol.kind, SymbolKind::Method | SymbolKind::Constructor);
                if symbol.name == *name && is_method == want_method {
                    return Some(symbol.name_span);
                }
            }
        }
        None
    }
}

/// One inference pass.
pub type InferPass = fn(&InferContext<'_>, &mut Vec<Diagnostic>) -> Vec<MappingEntry>;

/// The cascade, in precedence order.
pub fn passes() -> Vec<(&'static str, InferPass)> {
    vec![
        ("interface-override", interface_override_pass),
        ("literal-correlation", literal_field_pass),
        ("caller-role", caller_role_pass),
        ("conventions", convention_pass),
    ]
}

/// Run the cascade into the store. The store must not be frozen yet.
pub fn run_inference(
    units: &[AnalyzedUnit],
    graph: &TypeGraph,
    xref: &CallGraphIndex,
    store: &mut MappingStore,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<(), MappingError> {
    for (name, pass) in passes() {
        let entries = {
            let ctx = InferContext {
                units,
                graph,
                xref,
                store,
            };
            pass(&ctx, diagnostics)
        };
        tracing::debug!(pass = name, proposals = entries.len(), "inference pass done");
        store.insert_all(entries)?;
    }
    Ok(())
}

// ============================================================================
// Pass 1: Interface Overrides
// ============================================================================

/// Methods whose override chain reaches a known external interface method
/// take that method's canonical name, matched by signature shape.
fn interface_override_pass(
    ctx: &InferContext<'_>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<MappingEntry> {
    let mut entries = Vec::new();

    for node in ctx.graph.nodes() {
        let TypeOrigin::Source { unit } = &node.origin else {
            continue;
        };
        let Some(table) = ctx.table_for(unit) else {
            continue;
        };

        // Canonical interfaces anywhere above this type.
        let canonical: Vec<_> = ctx
            .graph
            .supertype_chain(node.id)
            .into_iter()
            .skip(1)
            .map(|id| ctx.graph.node(id))
            .filter(|n| n.canonical)
            .collect();
        if canonical.is_empty() {
            continue;
        }

        for symbol in table.members_of(&node.fqcn) {
            if symbol.kind != SymbolKind::Method {
                continue;
            }
            let Some(descriptor) = symbol.descriptor.as_deref() else {
                continue;
            };

            let mut names: Vec<&str> = Vec::new();
            for iface in &canonical {
                for member in &iface.members {
                    let Some(iface_desc) = member.descriptor.as_deref() else {
                        continue;
                    };
                    if shapes_match(descriptor, iface_desc, ctx) {
                        names.push(member.name.as_str());
                    }
                }
            }
            names.sort_unstable();
            names.dedup();

            match names.as_slice() {
                [] => {}
                [canonical_name] => {
                    if *canonical_name != symbol.name {
                        let key = SymbolKey::Method {
                            owner: node.fqcn.clone(),
                            name: symbol.name.clone(),
                            descriptor: symbol.descriptor.clone(),
                        };
                        entries.push(
                            MappingEntry::inferred(
                                key,
                                *canonical_name,
                                Provenance::InterfaceOverride,
                                90,
                            )
                            .with_decl_span(symbol.name_span),
                        );
                    }
                }
                many => {
                    diagnostics.push(Diagnostic::unit(
                        DiagnosticKind::ResolutionAmbiguous,
                        unit.clone(),
                        format!(
                            "method {}.{}{} matches multiple interface methods: {}",
                            node.fqcn,
                            symbol.name,
                            descriptor,
                            many.join(", ")
                        ),
                    ));
                }
            }
        }
    }

    entries
}

/// Signature-shape compatibility: same arity, and every parameter pair
/// either agrees on the simple name or the source side is an obfuscated
/// or project-local type the framework descriptor cannot name.
fn shapes_match(source_desc: &str, iface_desc: &str, ctx: &InferContext<'_>) -> bool {
    if descriptor_arity(source_desc) != descriptor_arity(iface_desc) {
        return false;
    }
    let strip = |d: &str| -> Vec<String> {
        d.trim_matches(['(', ')'])
            .split(',')
            .filter(|s| !s.is_empty())
            .map(|s| s.trim().to_string())
            .collect()
    };
    let source_params = strip(source_desc);
    let iface_params = strip(iface_desc);
    source_params
        .iter()
        .zip(iface_params.iter())
        .all(|(s, i)| s == i || is_obscure_type(s, ctx))
}

/// A type name the framework side cannot be expected to spell: short
/// obfuscated names and project-declared types.
fn is_obscure_type(name: &str, ctx: &InferContext<'_>) -> bool {
    let base = name.trim_end_matches("[]");
    if base.len() <= 2 {
        return true;
    }
    ctx.graph
        .nodes()
        .iter()
        .any(|n| matches!(n.origin, TypeOrigin::Source { .. }) && crate::typegraph::simple_name(&n.fqcn) == base)
}

// ============================================================================
// Pass 2: Literal Correlation
// ============================================================================

/// A field solely assigned from a key-based lookup call whose literal is a
/// clean identifier takes that key as its name.
fn literal_field_pass(
    ctx: &InferContext<'_>,
    _diagnostics: &mut Vec<Diagnostic>,
) -> Vec<MappingEntry> {
    let mut by_field: BTreeMap<SymbolKey, Vec<&str>> = BTreeMap::new();
    for lit in ctx.xref.literals() {
        if let Some(field) = &lit.assigned_field {
            if is_identifier_like(&lit.value) {
                by_field.entry(field.clone()).or_default().push(&lit.value);
            }
        }
    }

    let mut entries = Vec::new();
    for (field, values) in by_field {
        let mut distinct = values.clone();
        distinct.sort_unstable();
        distinct.dedup();
        // Conflicting keys for one field are no evidence at all.
        if distinct.len() != 1 {
            continue;
        }
        let proposed = camel_case(distinct[0]);
        if proposed == field.name() {
            continue;
        }

        let corroborating = values.len();
        let total_writes = ctx.xref.writes_of(&field).len().max(corroborating);
        let confidence = ((corroborating * 100) / total_writes).clamp(40, 95) as u8;

        let mut entry =
            MappingEntry::inferred(field.clone(), proposed, Provenance::XrefInferred, confidence);
        if let Some(span) = ctx.member_decl_span(&field) {
            entry = entry.with_decl_span(span);
        }
        entries.push(entry);
    }
    entries
}

fn is_identifier_like(value: &str) -> bool {
    value.len() >= 2
        && value.len() <= 40
        && value
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false)
        && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `player_name` -> `playerName`, `MAX_COUNT` -> `maxCount`.
fn camel_case(key: &str) -> String {
    if key.contains('_') {
        let mut out = String::new();
        for (i, part) in key.to_ascii_lowercase().split('_').enumerate() {
            if part.is_empty() {
                continue;
            }
            if i == 0 {
                out.push_str(part);
            } else {
                let mut chars = part.chars();
                if let Some(first) = chars.next() {
                    out.push(first.to_ascii_uppercase());
                    out.extend(chars);
                }
            }
        }
        return out;
    }
    if key.chars().all(|c| c.is_ascii_uppercase()) {
        return key.to_ascii_lowercase();
    }
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => format!("{}{}", first.to_ascii_lowercase(), chars.as_str()),
        None => key.to_string(),
    }
}

// ============================================================================
// Pass 3: Caller Roles
// ============================================================================

/// Role vocabulary: caller-name fragments that suggest what a callee does.
const ROLE_PATTERNS: &[(&str, &[&str])] = &[
    ("draw", &["ondraw", "draw", "paint", "render"]),
    ("update", &["update", "tick", "onupdate", "step"]),
    ("init", &["init", "initialize", "setup", "oncreate"]),
    ("dispose", &["dispose", "cleanup", "destroy", "close", "release"]),
    ("callback", &["onclick", "ontouch", "onevent", "handle"]),
];

/// Weight below which weak (multi-candidate) evidence counts.
const WEAK_WEIGHT: f64 = 0.5;

/// A short-named method called predominantly from role-suggesting callers
/// takes a role-qualified name. Confidence scales with the fraction of
/// corroborating edges; weak evidence contributes at reduced weight.
fn caller_role_pass(
    ctx: &InferContext<'_>,
    _diagnostics: &mut Vec<Diagnostic>,
) -> Vec<MappingEntry> {
    let mut entries = Vec::new();

    for target in ctx.xref.call_targets() {
        let SymbolKey::Method { .. } = target else {
            continue;
        };
        // Only short, obfuscated-looking names are worth replacing.
        if target.name().len() > 3 {
            continue;
        }
        // A higher layer (or the explicit file) already named it.
        if ctx.store.resolve(target).is_some() {
            continue;
        }

        let mut role_weight: BTreeMap<&str, f64> = BTreeMap::new();
        let mut total = 0.0;

        for edge in ctx.xref.callers_of(target) {
            let Some(caller) = &edge.caller else { continue };
            total += 1.0;
            if let Some(role) = classify_role(caller.name()) {
                *role_weight.entry(role).or_insert(0.0) += 1.0;
            }
        }
        for weak in ctx.xref.weak_callers_of(target) {
            let Some(caller) = &weak.caller else { continue };
            total += WEAK_WEIGHT;
            if let Some(role) = classify_role(caller.name()) {
                *role_weight.entry(role).or_insert(0.0) += WEAK_WEIGHT;
            }
        }

        let Some((role, weight)) = role_weight
            .into_iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        else {
            continue;
        };
        if weight < 2.0 || total == 0.0 {
            continue;
        }
        let fraction = weight / total;
        if fraction < 0.6 {
            continue;
        }

        let proposed = format!("relatedTo{}{}", role[..1].to_ascii_uppercase(), &role[1..]);
        let confidence = ((fraction * 80.0) as u8).clamp(40, 85);
        let mut entry = MappingEntry::inferred(
            target.clone(),
            proposed,
            Provenance::XrefInferred,
            confidence,
        );
        if let Some(span) = ctx.member_decl_span(target) {
            entry = entry.with_decl_span(span);
        }
        entries.push(entry);
    }

    entries
}

fn classify_role(caller_name: &str) -> Option<&'static str> {
    let lowered = caller_name.to_ascii_lowercase();
    for (role, patterns) in ROLE_PATTERNS {
        if patterns.iter().any(|p| lowered.contains(p)) {
            return Some(role);
        }
    }
    None
}

// ============================================================================
// Pass 4: Conventions
// ============================================================================

/// Loop-counter name sequence, outermost first.
const LOOP_NAMES: &[&str] = &["i", "j", "k", "m", "n"];

/// Shape-based local and accessor conventions.
fn convention_pass(
    ctx: &InferContext<'_>,
    _diagnostics: &mut Vec<Diagnostic>,
) -> Vec<MappingEntry> {
    let mut entries = Vec::new();
    for analyzed in ctx.units {
        loop_counters(ctx, analyzed, &mut entries);
        catch_variables(ctx, analyzed, &mut entries);
        accessor_pairs(ctx, analyzed, &mut entries);
    }
    entries
}

/// Single-character integral loop-header variables become `i`/`j`/`k`...
/// by nesting depth, never reusing a name live in an enclosing scope.
fn loop_counters(
    _ctx: &InferContext<'_>,
    analyzed: &AnalyzedUnit,
    entries: &mut Vec<MappingEntry>,
) {
    let table = &analyzed.table;
    for symbol in table.symbols() {
        if symbol.kind != SymbolKind::ForVariable || symbol.name.len() != 1 {
            continue;
        }
        if !matches!(symbol.declared_type.as_deref(), Some("int" | "long" | "short")) {
            continue;
        }

        // Nesting depth = enclosing For scopes above this one.
        let mut depth = 0usize;
        let mut current = table.scope(symbol.scope).parent;
        while let Some(id) = current {
            let scope = table.scope(id);
            if scope.kind == ScopeKind::For {
                depth += 1;
            }
            current = scope.parent;
        }

        // Pick the first sequence name from `depth` onward that is not
        // already live in an enclosing scope.
        let parent = table.scope(symbol.scope).parent;
        let mut proposed = None;
        for name in LOOP_NAMES.iter().skip(depth.min(LOOP_NAMES.len() - 1)) {
            let live = parent
                .and_then(|p| {
                    table.resolve_at(name, Namespace::Value, p, symbol.name_span.start)
                })
                .is_some();
            if !live {
                proposed = Some(*name);
                break;
            }
        }
        let Some(proposed) = proposed else { continue };
        if proposed == symbol.name {
            continue;
        }
        let Some(key) = symbol.key(&table.unit_path) else {
            continue;
        };
        entries.push(
            MappingEntry::inferred(key, proposed, Provenance::ConventionHeuristic, 60)
                .with_decl_span(symbol.name_span),
        );
    }
}

/// A short catch variable referenced nowhere beyond its declaration is an
/// exception variable.
fn catch_variables(
    _ctx: &InferContext<'_>,
    analyzed: &AnalyzedUnit,
    entries: &mut Vec<MappingEntry>,
) {
    let table = &analyzed.table;
    let source = &analyzed.unit.content;

    for symbol in table.symbols() {
        if symbol.kind != SymbolKind::CatchParam || symbol.name.len() > 2 {
            continue;
        }
        if symbol.name == "ex" {
            continue;
        }

        let mut referenced = false;
        walk_tree(analyzed.tree.root(), &mut |node: Node<'_>| {
            if referenced || node.kind() != "identifier" {
                return;
            }
            let span = span_of(node);
            if span == symbol.name_span {
                return;
            }
            if node_text(node, source) != symbol.name {
                return;
            }
            let scope = table.scope_at(span.start);
            if table.resolve_at(&symbol.name, Namespace::Value, scope, span.start)
                == Some(symbol.id)
            {
                referenced = true;
            }
        });
        if referenced {
            continue;
        }

        let Some(key) = symbol.key(&table.unit_path) else {
            continue;
        };
        entries.push(
            MappingEntry::inferred(key, "ex", Provenance::ConventionHeuristic, 55)
                .with_decl_span(symbol.name_span),
        );
    }
}

/// Single-statement `return this.f;` methods become getters, single
/// `this.f = p;` methods become setters, named from the field's already
/// resolved name.
fn accessor_pairs(
    ctx: &InferContext<'_>,
    analyzed: &AnalyzedUnit,
    entries: &mut Vec<MappingEntry>,
) {
    let source = &analyzed.unit.content;
    let table = &analyzed.table;

    walk_tree(analyzed.tree.root(), &mut |node: Node<'_>| {
        if node.kind() != "method_declaration" {
            return;
        }
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let method_name = node_text(name_node, source);
        // Only short obfuscated names are worth replacing.
        if method_name.len() > 3 {
            return;
        }
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        let mut cursor = body.walk();
        let statements: Vec<Node<'_>> = body.named_children(&mut cursor).collect();
        if statements.len() != 1 {
            return;
        }

        let offset = span_of(name_node).start;
        let scope = table.scope_at(offset);
        let Some(owner) = table.enclosing_type(scope) else {
            return;
        };

        let accessor = classify_accessor(statements[0], source);
        let Some((field_name, is_getter)) = accessor else {
            return;
        };

        // The field must already carry a resolved name.
        let Some(field_entry) = ctx.store.resolve_field(owner, &field_name) else {
            return;
        };
        let resolved = &field_entry.name;
        let capitalized = match resolved.chars().next() {
            Some(first) => format!("{}{}", first.to_ascii_uppercase(), &resolved[first.len_utf8()..]),
            None => return,
        };
        let proposed = if is_getter {
            format!("get{capitalized}")
        } else {
            format!("set{capitalized}")
        };
        if proposed == method_name {
            return;
        }

        let Some(method_sym) = table
            .members_of(owner)
            .find(|s| s.kind == SymbolKind::Method && s.name_span == span_of(name_node))
        else {
            return;
        };
        let Some(key) = method_sym.key(&table.unit_path) else {
            return;
        };
        entries.push(
            MappingEntry::inferred(key, proposed, Provenance::ConventionHeuristic, 70)
                .with_decl_span(method_sym.name_span),
        );
    });
}

/// Classify a single statement as a getter return or setter assignment,
/// yielding the accessed field's (obfuscated) name.
fn classify_accessor<'a>(statement: Node<'a>, source: &'a str) -> Option<(String, bool)> {
    match statement.kind() {
        "return_statement" => {
            let mut cursor = statement.walk();
            let value = statement.named_children(&mut cursor).next()?;
            field_name_of(value, source).map(|f| (f, true))
        }
        "expression_statement" => {
            let mut cursor = statement.walk();
            let expr = statement.named_children(&mut cursor).next()?;
            if expr.kind() != "assignment_expression" {
                return None;
            }
            let left = expr.child_by_field_name("left")?;
            let right = expr.child_by_field_name("right")?;
            // The right side must be a bare parameter reference.
            if right.kind() != "identifier" {
                return None;
            }
            field_name_of(left, source).map(|f| (f, false))
        }
        _ => None,
    }
}

/// The field name of a `this.f` access or bare identifier.
fn field_name_of<'a>(node: Node<'a>, source: &'a str) -> Option<String> {
    match node.kind() {
        "field_access" => {
            let object = node.child_by_field_name("object")?;
            if object.kind() != "this" {
                return None;
            }
            let field = node.child_by_field_name("field")?;
            Some(node_text(field, source).to_string())
        }
        "identifier" => Some(node_text(node, source).to_string()),
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

    fn analyze(sources: &[(&str, &str)]) -> (Vec<AnalyzedUnit>, TypeGraph, CallGraphIndex) {
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
        let xref = CallGraphIndex::build(&units, &graph);
        (units, graph, xref)
    }

    fn infer(sources: &[(&str, &str)]) -> (MappingStore, Vec<Diagnostic>) {
        let (units, graph, xref) = analyze(sources);
        let mut store = MappingStore::new();
        let mut diags = Vec::new();
        run_inference(&units, &graph, &xref, &mut store, &mut diags).unwrap();
        (store, diags)
    }

    #[test]
    fn interface_override_assigns_canonical_name() {
        let (store, _) = infer(&[(
            "com/a/h.java",
            "package com.a;\nimport android.view.View;\nclass h implements View.OnClickListener { public void a(View v) { } }",
        )]);
        let entry = store.resolve_method("com.a.h", "a", Some("(View)")).unwrap();
        assert_eq!(entry.name, "onClick");
        assert_eq!(entry.provenance, Provenance::InterfaceOverride);
    }

    #[test]
    fn conflicting_interface_matches_are_skipped_with_diagnostic() {
        // Runnable's run() and Callable-like call() shapes collide for a
        // zero-argument method when both interfaces are implemented.
        let (store, diags) = infer(&[(
            "com/a/h.java",
            "package com.a;\nclass h implements Runnable, java.util.concurrent.Callable { public void a() { } }",
        )]);
        assert!(store.resolve_method("com.a.h", "a", Some("()")).is_none());
        assert!(diags
            .iter()
            .any(|d| d.kind == DiagnosticKind::ResolutionAmbiguous));
    }

    #[test]
    fn literal_key_becomes_field_name() {
        let (store, _) = infer(&[(
            "com/a/b.java",
            "package com.a;\nclass b { String a; void m(b p) { this.a = p.getString(\"player_name\"); } }",
        )]);
        let entry = store.resolve_field("com.a.b", "a").unwrap();
        assert_eq!(entry.name, "playerName");
        assert_eq!(entry.provenance, Provenance::XrefInferred);
    }

    #[test]
    fn conflicting_literal_keys_are_no_evidence() {
        let (store, _) = infer(&[(
            "com/a/b.java",
            "package com.a;\nclass b { String a; void m(b p) { this.a = p.getString(\"one\"); this.a = p.getString(\"two\"); } }",
        )]);
        assert!(store.resolve_field("com.a.b", "a").is_none());
    }

    #[test]
    fn caller_role_names_short_methods() {
        let source = "\
package com.a;
class b {
    void a() { }
    void drawWorld() { a(); }
    void drawHud() { a(); }
    void render() { a(); }
}
";
        let (store, _) = infer(&[("com/a/b.java", source)]);
        let entry = store.resolve_method("com.a.b", "a", Some("()")).unwrap();
        assert_eq!(entry.name, "relatedToDraw");
        assert_eq!(entry.provenance, Provenance::XrefInferred);
    }

    #[test]
    fn loop_counters_follow_nesting_depth() {
        let source = "\
package com.a;
class b {
    void m() {
        for (int x = 0; x < 3; x++) {
            for (int y = 0; y < 3; y++) { }
        }
    }
}
";
        let (store, _) = infer(&[("com/a/b.java", source)]);
        let names: Vec<(&str, &str)> = store
            .iter()
            .filter_map(|e| match &e.key {
                SymbolKey::Local { name, .. } => Some((name.as_str(), e.name.as_str())),
                _ => None,
            })
            .collect();
        assert!(names.contains(&("x", "i")));
        assert!(names.contains(&("y", "j")));
    }

    #[test]
    fn unreferenced_catch_variable_becomes_ex() {
        let source = "\
package com.a;
class b {
    void m() {
        try { } catch (RuntimeException q) { }
        try { } catch (RuntimeException r) { r.toString(); }
    }
}
";
        let (store, _) = infer(&[("com/a/b.java", source)]);
        let renamed: Vec<&str> = store
            .iter()
            .filter_map(|e| match &e.key {
                SymbolKey::Local { name, .. } if e.name == "ex" => Some(name.as_str()),
                _ => None,
            })
            .collect();
        // `q` is never referenced; `r` is used, so it keeps its name.
        assert_eq!(renamed, vec!["q"]);
    }

    #[test]
    fn accessor_pair_named_from_resolved_field() {
        let source = "\
package com.a;
class b {
    int c;
    int a() { return this.c; }
    void d(int v) { this.c = v; }
}
";
        let (units, graph, xref) = analyze(&[("com/a/b.java", source)]);
        let mut store = MappingStore::new();
        store
            .insert(MappingEntry::explicit(
                SymbolKey::Field {
                    owner: "com.a.b".to_string(),
                    name: "c".to_string(),
                },
                "score",
            ))
            .unwrap();
        let mut diags = Vec::new();
        run_inference(&units, &graph, &xref, &mut store, &mut diags).unwrap();

        assert_eq!(
            store.resolve_method("com.a.b", "a", Some("()")).unwrap().name,
            "getScore"
        );
        assert_eq!(
            store
                .resolve_method("com.a.b", "d", Some("(int)"))
                .unwrap()
                .name,
            "setScore"
        );
    }
}
