//! The rewrite engine: applies the frozen mapping store onto one unit.
//!
//! Occurrences are collected by walking the tree and binding each
//! identifier to its declared symbol — declarations through the symbol
//! table, member references through receiver-type inference and the
//! inheritance chain. A replacement is staged only for occurrences whose
//! *resolved symbol* has a mapping entry; spelling never drives a
//! replacement, so a local and an unrelated field sharing an obfuscated
//! name cannot cross-contaminate. Unresolved or ambiguous occurrences are
//! left verbatim with a diagnostic.
//!
//! All staged edits apply in one descending-offset pass; if the set
//! conflicts, the unit is emitted verbatim (never a partial or mid-span
//! application).

use tree_sitter::Node;

use unmask_core::mapping::{MappingEntry, MappingStore, Provenance, SymbolKey};
use unmask_core::patch::{ApplyResult, Edit, EditSet};
use unmask_core::report::{Diagnostic, DiagnosticKind};

use crate::binding::BindCtx;
use crate::symbols::{Namespace, SymbolKind, SymbolTable};
use crate::syntax::{argument_count, node_text, span_of, walk_tree, SyntaxTree};
use crate::typegraph::{simple_name, MemberKind, MemberResolution, TypeGraph};
use crate::unit::SourceUnit;

// ============================================================================
// Contract
// ============================================================================

/// Rewrite configuration.
#[derive(Debug, Clone, Default)]
pub struct RewriteOptions {
    /// Insert provenance comments next to renamed declarations.
    pub annotate: bool,
    /// Rewrite reflection strings (`Class.forName`, `getMethod`).
    /// Off by default: literals are otherwise never touched.
    pub reflection: bool,
}

/// Everything a rewriter needs for one unit. All borrows are immutable;
/// rewriting units in parallel shares this read-only state.
pub struct RewriteRequest<'a> {
    pub unit: &'a SourceUnit,
    pub tree: &'a SyntaxTree,
    pub table: &'a SymbolTable,
    pub graph: &'a TypeGraph,
    pub store: &'a MappingStore,
    pub options: &'a RewriteOptions,
}

/// Result of rewriting one unit.
#[derive(Debug)]
pub struct RewriteOutcome {
    pub text: String,
    pub edits_applied: usize,
    /// New workspace-relative path when the unit's primary type moved to
    /// another name/package (used for merged-blob markers).
    pub new_unit_path: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
    /// True for the regex fallback; its guarantees are weaker.
    pub degraded: bool,
}

/// The rewrite contract. The syntax-aware engine and the regex fallback
/// are alternate implementations of this same interface.
pub trait Rewriter {
    fn rewrite(&self, req: &RewriteRequest<'_>) -> RewriteOutcome;
}

// ============================================================================
// Syntax-aware Engine
// ============================================================================

/// The syntax-aware rewrite engine.
pub struct AstRewriter;

impl Rewriter for AstRewriter {
    fn rewrite(&self, req: &RewriteRequest<'_>) -> RewriteOutcome {
        let mut pass = RewritePass {
            req,
            ctx: BindCtx {
                source: &req.unit.content,
                table: req.table,
                graph: req.graph,
            },
            edits: EditSet::new(),
            diagnostics: Vec::new(),
        };

        pass.stage_declarations();
        walk_tree(req.tree.root(), &mut |node| pass.visit(node));

        let new_unit_path = pass.new_unit_path();
        let edits_staged = pass.edits.len();
        let (text, edits_applied) = match pass.edits.apply(&req.unit.content) {
            ApplyResult::Applied(text) => (text, edits_staged),
            ApplyResult::Refused(conflicts) => {
                for conflict in conflicts {
                    pass.diagnostics.push(Diagnostic::unit(
                        DiagnosticKind::MappingConflict,
                        req.unit.path.clone(),
                        format!("edit refused, unit left verbatim: {conflict}"),
                    ));
                }
                (req.unit.content.clone(), 0)
            }
        };

        RewriteOutcome {
            text,
            edits_applied,
            new_unit_path,
            diagnostics: pass.diagnostics,
            degraded: false,
        }
    }
}

struct RewritePass<'a, 'b> {
    req: &'b RewriteRequest<'a>,
    ctx: BindCtx<'a>,
    edits: EditSet,
    diagnostics: Vec<Diagnostic>,
}

impl<'a, 'b> RewritePass<'a, 'b> {
    fn source(&self) -> &'a str {
        &self.req.unit.content
    }

    /// New unit path when the primary type was renamed.
    fn new_unit_path(&self) -> Option<String> {
        let decl = self.req.table.primary_type()?;
        let entry = self.req.store.resolve_type(&decl.fqcn)?;
        if entry.name == decl.fqcn {
            return None;
        }
        Some(format!("{}.java", entry.name.replace('.', "/")))
    }

    /// Stage edits for every declaration site straight off the symbol
    /// table: type names, constructor names, members, and locals.
    fn stage_declarations(&mut self) {
        let table = self.req.table;
        let store = self.req.store;

        for decl in &table.types {
            if let Some(entry) = store.resolve_type(&decl.fqcn) {
                let new_short = simple_name(&entry.name);
                self.stage(decl.name_span, new_short, entry, "type decl");
            }
        }

        for symbol in table.symbols() {
            let entry = match symbol.kind {
                SymbolKind::Method => symbol.owner.as_deref().and_then(|owner| {
                    store.resolve_method(owner, &symbol.name, symbol.descriptor.as_deref())
                }),
                SymbolKind::Constructor => {
                    // Constructor names follow their class rename.
                    symbol.owner.as_deref().and_then(|o| store.resolve_type(o))
                }
                SymbolKind::Field | SymbolKind::EnumConstant => symbol
                    .owner
                    .as_deref()
                    .and_then(|owner| store.resolve_field(owner, &symbol.name)),
                kind if kind.is_local_like() => symbol
                    .key(&table.unit_path)
                    .and_then(|key| store.resolve(&key)),
                _ => None,
            };
            let Some(entry) = entry else { continue };

            let new_name = if symbol.kind == SymbolKind::Constructor {
                simple_name(&entry.name).to_string()
            } else {
                entry.name.clone()
            };
            self.stage(symbol.name_span, &new_name, entry, "decl");
        }
    }

    fn stage(
        &mut self,
        span: unmask_core::patch::Span,
        new_name: &str,
        entry: &MappingEntry,
        label: &str,
    ) {
        let old = &self.source()[span.start as usize..span.end as usize];
        if old == new_name {
            return;
        }
        self.edits.add(Edit::replace(
            span,
            old,
            new_name,
            format!("{label}: {old} -> {new_name}"),
        ));
        if self.req.options.annotate && entry.provenance != Provenance::Explicit {
            self.edits.add(Edit::insert(
                span.end,
                format!(" /* unmask: {} {}% */", entry.provenance, entry.confidence),
                "annotation",
            ));
        }
    }

    fn visit(&mut self, node: Node<'a>) {
        match node.kind() {
            "identifier" => self.visit_identifier(node),
            "type_identifier" => self.visit_type_identifier(node),
            "scoped_type_identifier" => self.visit_scoped_type(node),
            "method_invocation" => self.visit_invocation(node),
            "field_access" => self.visit_field_access(node),
            "import_declaration" => self.visit_import(node),
            "package_declaration" => self.visit_package(node),
            "string_literal" => {
                if self.req.options.reflection {
                    self.visit_reflection_literal(node);
                }
            }
            _ => {}
        }
    }

    /// A plain identifier occurrence: a variable read/write, an implicit
    /// `this` member access, or a type used as a static receiver.
    fn visit_identifier(&mut self, node: Node<'a>) {
        if is_declaration_name(node) || is_handled_elsewhere(node) {
            return;
        }
        let name = node_text(node, self.source());
        let span = span_of(node);
        let scope = self.req.table.scope_at(span.start);

        if let Some(sym_id) = self
            .req
            .table
            .resolve_at(name, Namespace::Value, scope, span.start)
        {
            let symbol = self.req.table.symbol(sym_id);
            let entry = match symbol.kind {
                SymbolKind::Field | SymbolKind::EnumConstant => symbol
                    .owner
                    .as_deref()
                    .and_then(|o| self.req.store.resolve_field(o, name)),
                kind if kind.is_local_like() => symbol
                    .key(&self.req.table.unit_path)
                    .and_then(|key| self.req.store.resolve(&key)),
                _ => None,
            };
            if let Some(entry) = entry {
                let new_name = entry.name.clone();
                self.stage_ref(span, &new_name, "ref");
            }
            return;
        }

        // Not in the unit's scopes: an inherited field, or a type used as
        // a static receiver.
        if let Some(current) = self.ctx.current_type_at(span.start) {
            match self
                .req
                .graph
                .resolve_member(current, name, MemberKind::Field, None)
                .outcome
            {
                MemberResolution::Resolved(member) => {
                    if let Some(entry) =
                        self.req.store.resolve_field(&member.owner_fqcn, name)
                    {
                        let new_name = entry.name.clone();
                        self.stage_ref(span, &new_name, "inherited field");
                    }
                    return;
                }
                MemberResolution::Ambiguous(candidates) if !candidates.is_empty() => {
                    self.diagnostics.push(Diagnostic::unit(
                        DiagnosticKind::ResolutionAmbiguous,
                        self.req.unit.path.clone(),
                        format!("field '{name}' has multiple candidate bindings; left verbatim"),
                    ));
                    return;
                }
                _ => {}
            }
        }

        // A type used as a static receiver (`b.MEMBER`). Anywhere else an
        // unresolved identifier stays verbatim rather than being guessed
        // at as a type name.
        let receiver_position = node
            .parent()
            .map(|p| matches!(p.kind(), "field_access" | "method_invocation"))
            .unwrap_or(false);
        if !receiver_position {
            return;
        }
        if let Some(ty) = self.req.graph.resolve_type_name(name, self.req.table) {
            let fqcn = &self.req.graph.node(ty).fqcn;
            if let Some(entry) = self.req.store.resolve_type(fqcn) {
                let new_name = simple_name(&entry.name).to_string();
                self.stage_ref(span, &new_name, "type ref");
            }
        }
    }

    /// A type reference written as a simple name.
    fn visit_type_identifier(&mut self, node: Node<'a>) {
        if let Some(parent) = node.parent() {
            // Scoped paths are replaced whole at the parent.
            if parent.kind() == "scoped_type_identifier" {
                return;
            }
        }
        let name = node_text(node, self.source());
        let Some(ty) = self.req.graph.resolve_type_name(name, self.req.table) else {
            return;
        };
        let fqcn = self.req.graph.node(ty).fqcn.clone();
        if let Some(entry) = self.req.store.resolve_type(&fqcn) {
            let new_name = simple_name(&entry.name).to_string();
            self.stage_ref(span_of(node), &new_name, "type ref");
        }
    }

    /// A qualified type reference (`com.a.b` or `Outer.Inner`): replace
    /// the whole path when the type is mapped, otherwise try the final
    /// segment alone.
    fn visit_scoped_type(&mut self, node: Node<'a>) {
        if let Some(parent) = node.parent() {
            if parent.kind() == "scoped_type_identifier" {
                return;
            }
        }
        let text = node_text(node, self.source());
        if let Some(ty) = self.req.graph.resolve_type_name(text, self.req.table) {
            let fqcn = self.req.graph.node(ty).fqcn.clone();
            if let Some(entry) = self.req.store.resolve_type(&fqcn) {
                let new_name = entry.name.replace('$', ".");
                self.stage_ref(span_of(node), &new_name, "scoped type");
                return;
            }
        }
        // Fall back to the last segment.
        let mut cursor = node.walk();
        let last = node
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "type_identifier")
            .last();
        if let Some(last) = last {
            self.visit_type_identifier_unchecked(last);
        }
    }

    fn visit_type_identifier_unchecked(&mut self, node: Node<'a>) {
        let name = node_text(node, self.source());
        let Some(ty) = self.req.graph.resolve_type_name(name, self.req.table) else {
            return;
        };
        let fqcn = self.req.graph.node(ty).fqcn.clone();
        if let Some(entry) = self.req.store.resolve_type(&fqcn) {
            let new_name = simple_name(&entry.name).to_string();
            self.stage_ref(span_of(node), &new_name, "type ref");
        }
    }

    /// A method call: bind the callee through the receiver's inheritance
    /// chain; a unique binding rewrites the name, multiple candidates are
    /// evidence of ambiguity and leave the occurrence verbatim.
    fn visit_invocation(&mut self, node: Node<'a>) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.source());
        let Some(receiver) = self.ctx.receiver_type(node) else {
            return;
        };
        let arity = node.child_by_field_name("arguments").map(argument_count);

        match self
            .req
            .graph
            .resolve_member(receiver, name, MemberKind::Method, arity)
            .outcome
        {
            MemberResolution::Resolved(member) => {
                if let Some(entry) = self.req.store.resolve_method(
                    &member.owner_fqcn,
                    name,
                    member.descriptor.as_deref(),
                ) {
                    let new_name = entry.name.clone();
                    self.stage_ref(span_of(name_node), &new_name, "call");
                }
            }
            MemberResolution::Ambiguous(candidates) if !candidates.is_empty() => {
                self.diagnostics.push(Diagnostic::unit(
                    DiagnosticKind::ResolutionAmbiguous,
                    self.req.unit.path.clone(),
                    format!("call to '{name}' has multiple candidate targets; left verbatim"),
                ));
            }
            _ => {}
        }
    }

    /// An explicit member access (`x.f`).
    fn visit_field_access(&mut self, node: Node<'a>) {
        let Some(object) = node.child_by_field_name("object") else {
            return;
        };
        let Some(field_node) = node.child_by_field_name("field") else {
            return;
        };
        let Some(owner) = self.ctx.expr_type(object) else {
            return;
        };
        let name = node_text(field_node, self.source());

        match self
            .req
            .graph
            .resolve_member(owner, name, MemberKind::Field, None)
            .outcome
        {
            MemberResolution::Resolved(member) => {
                if let Some(entry) = self.req.store.resolve_field(&member.owner_fqcn, name) {
                    let new_name = entry.name.clone();
                    self.stage_ref(span_of(field_node), &new_name, "field");
                }
            }
            MemberResolution::Ambiguous(candidates) if !candidates.is_empty() => {
                self.diagnostics.push(Diagnostic::unit(
                    DiagnosticKind::ResolutionAmbiguous,
                    self.req.unit.path.clone(),
                    format!("field access '{name}' has multiple candidate bindings; left verbatim"),
                ));
            }
            _ => {}
        }
    }

    /// Rewrite a mapped import target wholesale.
    fn visit_import(&mut self, node: Node<'a>) {
        let mut cursor = node.walk();
        let Some(path_node) = node
            .named_children(&mut cursor)
            .find(|c| c.kind() == "scoped_identifier")
        else {
            return;
        };
        let path = node_text(path_node, self.source());
        if let Some(entry) = self.req.store.resolve_type(path) {
            let new_name = entry.name.replace('$', ".");
            self.stage_ref(span_of(path_node), &new_name, "import");
        }
    }

    /// Rewrite the package declaration when the unit's primary type moved
    /// to a different package.
    fn visit_package(&mut self, node: Node<'a>) {
        let Some(decl) = self.req.table.primary_type() else {
            return;
        };
        let Some(entry) = self.req.store.resolve_type(&decl.fqcn) else {
            return;
        };
        let new_package = match entry.name.rsplit_once('.') {
            Some((pkg, _)) => pkg.to_string(),
            None => return,
        };
        let mut cursor = node.walk();
        let Some(name_node) = node
            .named_children(&mut cursor)
            .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"))
        else {
            return;
        };
        if node_text(name_node, self.source()) == new_package {
            return;
        }
        self.stage_ref(span_of(name_node), &new_package, "package");
    }

    /// Reflection strings, opt-in: only two whitelisted call shapes may
    /// touch a literal, and only its interior.
    fn visit_reflection_literal(&mut self, node: Node<'a>) {
        let Some(args) = node.parent() else { return };
        if args.kind() != "argument_list" {
            return;
        }
        let Some(call) = args.parent() else { return };
        if call.kind() != "method_invocation" {
            return;
        }
        let Some(name_node) = call.child_by_field_name("name") else {
            return;
        };
        let method = node_text(name_node, self.source());
        let raw = node_text(node, self.source());
        if raw.len() < 4 {
            return;
        }
        let content = &raw[1..raw.len() - 1];
        let span = span_of(node);
        let interior =
            unmask_core::patch::Span::new(span.start + 1, span.end - 1);

        match method {
            "forName" => {
                let receiver = call
                    .child_by_field_name("object")
                    .map(|o| node_text(o, self.source()));
                if !matches!(receiver, Some("Class" | "java.lang.Class")) {
                    return;
                }
                if !content.contains('.') {
                    return;
                }
                if let Some(entry) = self.req.store.resolve_type(content) {
                    let new_name = entry.name.clone();
                    self.stage_ref(interior, &new_name, "reflection class");
                }
            }
            "getMethod" | "getDeclaredMethod" => {
                // Only the first argument is a method name.
                let mut cursor = args.walk();
                let first = args.named_children(&mut cursor).next();
                if first.map(|f| f.id()) != Some(node.id()) {
                    return;
                }
                if content.len() < 2 {
                    return;
                }
                let mut names: Vec<&str> = self
                    .req
                    .store
                    .iter()
                    .filter_map(|e| match &e.key {
                        SymbolKey::Method { name, .. } if name.as_str() == content => {
                            Some(e.name.as_str())
                        }
                        _ => None,
                    })
                    .collect();
                names.sort_unstable();
                names.dedup();
                if let [unique] = names.as_slice() {
                    let new_name = unique.to_string();
                    self.stage_ref(interior, &new_name, "reflection method");
                }
            }
            _ => {}
        }
    }

    /// Stage a reference-site replacement (no annotation; annotations
    /// only decorate declarations).
    fn stage_ref(&mut self, span: unmask_core::patch::Span, new_name: &str, label: &str) {
        let old = &self.source()[span.start as usize..span.end as usize];
        if old == new_name {
            return;
        }
        self.edits.add(Edit::replace(
            span,
            old,
            new_name,
            format!("{label}: {old} -> {new_name}"),
        ));
    }
}

// ============================================================================
// Occurrence Classification
// ============================================================================

/// Whether an identifier node is a declaration's name (staged from the
/// symbol table, not the tree walk).
fn is_declaration_name(node: Node<'_>) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    let name_field = |kind: &str| -> bool {
        parent.kind() == kind
            && parent
                .child_by_field_name("name")
                .map(|n| n.id() == node.id())
                .unwrap_or(false)
    };
    name_field("variable_declarator")
        || name_field("method_declaration")
        || name_field("constructor_declaration")
        || name_field("class_declaration")
        || name_field("interface_declaration")
        || name_field("enum_declaration")
        || name_field("formal_parameter")
        || name_field("catch_formal_parameter")
        || name_field("enhanced_for_statement")
        || name_field("enum_constant")
        || parent.kind() == "inferred_parameters"
        || parent.kind() == "labeled_statement"
        || (parent.kind() == "lambda_expression"
            && parent
                .child_by_field_name("parameters")
                .map(|p| p.id() == node.id())
                .unwrap_or(false))
}

/// Whether another visitor owns this identifier occurrence.
fn is_handled_elsewhere(node: Node<'_>) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    match parent.kind() {
        // Call and access names are bound by their own visitors; the
        // object side is a plain identifier occurrence.
        "method_invocation" | "field_access" => parent
            .child_by_field_name("object")
            .map(|o| o.id() != node.id())
            .unwrap_or(true),
        // Qualified names (imports, packages) and annotations.
        "scoped_identifier" | "package_declaration" | "import_declaration" => true,
        "marker_annotation" | "annotation" => true,
        // Labels on break/continue are not renamed.
        "break_statement" | "continue_statement" => true,
        "method_reference" => true,
        _ => false,
    }
}

// ============================================================================
// Tests
// ============================================================================
