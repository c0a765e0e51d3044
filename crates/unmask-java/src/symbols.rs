//! Per-unit symbol tables: declarations, scope tree, shadowing-correct
//! lookup.
//!
//! One walk over the syntax tree records every declaration with its exact
//! name span, declared type text, and lexical scope. The scope tree models
//! standard shadowing: a scope's visible symbols are its own bindings over
//! the union of its ancestors', nearest declaration winning. Locals are
//! position-sensitive — a local declared after an occurrence does not
//! capture it (the occurrence binds to the outer declaration, typically a
//! field).
//!
//! The table is a pure function of the tree and is read-only once built.

use std::collections::HashMap;
use tree_sitter::Node;

use unmask_core::mapping::{normalize_descriptor, SymbolKey};
use unmask_core::patch::Span;

use crate::syntax::{child_of_kind, node_text, span_of, SyntaxTree};

// ============================================================================
// IDs
// ============================================================================

/// Unique identifier for a symbol within a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

impl std::fmt::Display for SymbolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sym_{}", self.0)
    }
}

/// Unique identifier for a scope within a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scope_{}", self.0)
    }
}

// ============================================================================
// Symbols
// ============================================================================

/// Kind of declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Class,
    Interface,
    Enum,
    Method,
    Constructor,
    Field,
    EnumConstant,
    Parameter,
    Local,
    ForVariable,
    CatchParam,
    LambdaParam,
    Label,
}

impl SymbolKind {
    /// Whether occurrences before the declaration bind elsewhere.
    pub fn is_position_sensitive(&self) -> bool {
        matches!(self, SymbolKind::Local | SymbolKind::ForVariable)
    }

    /// The namespace this kind binds in (Java keeps variables, methods,
    /// and types in separate namespaces).
    pub fn namespace(&self) -> Namespace {
        match self {
            SymbolKind::Class | SymbolKind::Interface | SymbolKind::Enum => Namespace::Type,
            SymbolKind::Method | SymbolKind::Constructor => Namespace::Method,
            SymbolKind::Label => Namespace::Label,
            _ => Namespace::Value,
        }
    }

    /// Whether this is a local-variable-like kind keyed by declaration site.
    pub fn is_local_like(&self) -> bool {
        matches!(
            self,
            SymbolKind::Parameter
                | SymbolKind::Local
                | SymbolKind::ForVariable
                | SymbolKind::CatchParam
                | SymbolKind::LambdaParam
        )
    }
}

/// Lookup namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Value,
    Method,
    Type,
    Label,
}

/// One recorded declaration.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    /// FQCN of the enclosing type (binary name, `pkg.Outer$Inner`).
    pub owner: Option<String>,
    /// Declared type text as written (field/local/param type, method
    /// return type). Possibly obfuscated.
    pub declared_type: Option<String>,
    /// Normalized parameter descriptor for methods/constructors.
    pub descriptor: Option<String>,
    pub scope: ScopeId,
    /// Span of the name identifier itself.
    pub name_span: Span,
}

impl Symbol {
    /// The project-wide mapping-store key for this symbol, when it has
    /// one. Type symbols are keyed through [`TypeDecl::fqcn`] instead.
    pub fn key(&self, unit_path: &str) -> Option<SymbolKey> {
        match self.kind {
            SymbolKind::Method | SymbolKind::Constructor => Some(SymbolKey::Method {
                owner: self.owner.clone()?,
                name: self.name.clone(),
                descriptor: self.descriptor.clone(),
            }),
            SymbolKind::Field | SymbolKind::EnumConstant => Some(SymbolKey::Field {
                owner: self.owner.clone()?,
                name: self.name.clone(),
            }),
            kind if kind.is_local_like() => Some(SymbolKey::Local {
                unit: unit_path.to_string(),
                name: self.name.clone(),
                span: self.name_span,
            }),
            _ => None,
        }
    }
}

// ============================================================================
// Scopes
// ============================================================================

/// Kind of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Unit,
    Type,
    Method,
    Block,
    For,
    Catch,
    Lambda,
}

/// A node in the per-unit scope tree.
#[derive(Debug, Clone)]
pub struct Scope {
    pub id: ScopeId,
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub span: Span,
    /// FQCN of the enclosing type at scope creation.
    pub enclosing_type: Option<String>,
    /// The enclosing method/constructor symbol for Method scopes.
    pub method: Option<SymbolId>,
    bindings: HashMap<(String, Namespace), SymbolId>,
}

// ============================================================================
// Declared Types
// ============================================================================

/// A type declared in this unit.
#[derive(Debug, Clone)]
pub struct TypeDecl {
    /// Binary FQCN (`pkg.Outer$Inner`).
    pub fqcn: String,
    pub kind: SymbolKind,
    pub name_span: Span,
    /// Declared supertype text, as written (class `extends`).
    pub superclass: Option<String>,
    /// Declared interface texts (`implements` / interface `extends`).
    pub interfaces: Vec<String>,
    pub symbol: SymbolId,
}

/// An import declaration.
#[derive(Debug, Clone)]
pub struct ImportDecl {
    pub path: String,
    pub wildcard: bool,
    pub span: Span,
}

// ============================================================================
// Symbol Table
// ============================================================================

/// The per-unit symbol set and scope tree.
#[derive(Debug)]
pub struct SymbolTable {
    pub unit_path: String,
    pub package: Option<String>,
    pub imports: Vec<ImportDecl>,
    symbols: Vec<Symbol>,
    scopes: Vec<Scope>,
    pub types: Vec<TypeDecl>,
}

impl SymbolTable {
    /// Build the table for one unit. Pure function of the tree; error
    /// nodes simply contribute no declarations.
    pub fn build<'a>(unit_path: &str, tree: &'a SyntaxTree, source: &'a str) -> SymbolTable {
        let mut builder = Builder {
            source,
            table: SymbolTable {
                unit_path: unit_path.to_string(),
                package: None,
                imports: Vec::new(),
                symbols: Vec::new(),
                scopes: Vec::new(),
                types: Vec::new(),
            },
            type_stack: Vec::new(),
        };
        let root_scope = builder.new_scope(
            ScopeKind::Unit,
            None,
            Span::new(0, source.len() as u64),
            None,
        );
        builder.visit(tree.root(), root_scope, false);
        builder.table
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    /// Innermost scope containing a byte offset.
    pub fn scope_at(&self, offset: u64) -> ScopeId {
        let mut best = ScopeId(0);
        let mut best_len = u64::MAX;
        for scope in &self.scopes {
            if scope.span.contains_offset(offset) && scope.span.len() < best_len {
                best = scope.id;
                best_len = scope.span.len();
            }
        }
        best
    }

    /// Resolve a name occurrence at `offset` through the scope chain.
    ///
    /// Nearest declaration wins; position-sensitive kinds (locals) are
    /// skipped when declared after the occurrence, letting the occurrence
    /// bind to the shadowed outer declaration instead.
    pub fn resolve_at(
        &self,
        name: &str,
        ns: Namespace,
        scope: ScopeId,
        offset: u64,
    ) -> Option<SymbolId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = &self.scopes[id.0 as usize];
            if let Some(&sym_id) = scope.bindings.get(&(name.to_string(), ns)) {
                let symbol = &self.symbols[sym_id.0 as usize];
                if !symbol.kind.is_position_sensitive() || symbol.name_span.start <= offset {
                    return Some(sym_id);
                }
            }
            current = scope.parent;
        }
        None
    }

    /// FQCN of the type enclosing a scope.
    pub fn enclosing_type(&self, scope: ScopeId) -> Option<&str> {
        self.scopes[scope.0 as usize].enclosing_type.as_deref()
    }

    /// The method/constructor symbol enclosing a scope, if any.
    pub fn enclosing_method(&self, scope: ScopeId) -> Option<SymbolId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = &self.scopes[id.0 as usize];
            if let Some(m) = scope.method {
                return Some(m);
            }
            current = scope.parent;
        }
        None
    }

    /// The unit's first top-level type, if any.
    pub fn primary_type(&self) -> Option<&TypeDecl> {
        self.types.iter().find(|t| !t.fqcn.contains('$'))
    }

    /// All member symbols (methods, constructors, fields) of a type.
    pub fn members_of<'a>(&'a self, fqcn: &'a str) -> impl Iterator<Item = &'a Symbol> {
        self.symbols.iter().filter(move |s| {
            s.owner.as_deref() == Some(fqcn)
                && matches!(
                    s.kind,
                    SymbolKind::Method
                        | SymbolKind::Constructor
                        | SymbolKind::Field
                        | SymbolKind::EnumConstant
                )
        })
    }
}

// ============================================================================
// Builder
// ============================================================================

struct Builder<'a> {
    source: &'a str,
    table: SymbolTable,
    type_stack: Vec<String>,
}

impl<'a> Builder<'a> {
    fn new_scope(
        &mut self,
        kind: ScopeKind,
        parent: Option<ScopeId>,
        span: Span,
        method: Option<SymbolId>,
    ) -> ScopeId {
        let id = ScopeId(self.table.scopes.len() as u32);
        let enclosing_type = self.current_fqcn();
        self.table.scopes.push(Scope {
            id,
            kind,
            parent,
            span,
            enclosing_type,
            method,
            bindings: HashMap::new(),
        });
        id
    }

    fn add_symbol(
        &mut self,
        name: &str,
        kind: SymbolKind,
        scope: ScopeId,
        name_span: Span,
        declared_type: Option<String>,
        descriptor: Option<String>,
    ) -> SymbolId {
        let id = SymbolId(self.table.symbols.len() as u32);
        let owner = self.current_fqcn();
        self.table.symbols.push(Symbol {
            id,
            name: name.to_string(),
            kind,
            owner,
            declared_type,
            descriptor,
            scope,
            name_span,
        });
        self.table.scopes[scope.0 as usize]
            .bindings
            .insert((name.to_string(), kind.namespace()), id);
        id
    }

    /// Binary FQCN of the innermost enclosing type.
    fn current_fqcn(&self) -> Option<String> {
        if self.type_stack.is_empty() {
            return None;
        }
        let nested = self.type_stack.join("$");
        Some(match &self.table.package {
            Some(pkg) => format!("{pkg}.{nested}"),
            None => nested,
        })
    }

    fn visit(&mut self, node: Node<'a>, scope: ScopeId, in_for_init: bool) {
        match node.kind() {
            "package_declaration" => {
                if let Some(name) = child_of_kind(node, "scoped_identifier")
                    .or_else(|| child_of_kind(node, "identifier"))
                {
                    self.table.package = Some(node_text(name, self.source).to_string());
                }
            }
            "import_declaration" => {
                if let Some(path) = child_of_kind(node, "scoped_identifier") {
                    let wildcard = child_of_kind(node, "asterisk").is_some();
                    self.table.imports.push(ImportDecl {
                        path: node_text(path, self.source).to_string(),
                        wildcard,
                        span: span_of(path),
                    });
                }
            }
            "class_declaration" | "interface_declaration" | "enum_declaration" => {
                self.handle_type(node, scope);
            }
            "method_declaration" | "constructor_declaration" => {
                self.handle_callable(node, scope);
            }
            "field_declaration" => {
                self.handle_field(node, scope);
            }
            "enum_constant" => {
                if let Some(name) = node.child_by_field_name("name") {
                    self.add_symbol(
                        node_text(name, self.source),
                        SymbolKind::EnumConstant,
                        scope,
                        span_of(name),
                        self.current_fqcn(),
                        None,
                    );
                }
                self.visit_children(node, scope, false);
            }
            "local_variable_declaration" => {
                let kind = if in_for_init {
                    SymbolKind::ForVariable
                } else {
                    SymbolKind::Local
                };
                let ty = node
                    .child_by_field_name("type")
                    .map(|t| node_text(t, self.source).to_string());
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    if child.kind() == "variable_declarator" {
                        if let Some(name) = child.child_by_field_name("name") {
                            self.add_symbol(
                                node_text(name, self.source),
                                kind,
                                scope,
                                span_of(name),
                                ty.clone(),
                                None,
                            );
                        }
                        if let Some(value) = child.child_by_field_name("value") {
                            self.visit(value, scope, false);
                        }
                    }
                }
            }
            "enhanced_for_statement" => {
                let for_scope = self.new_scope(ScopeKind::For, Some(scope), span_of(node), None);
                if let Some(name) = node.child_by_field_name("name") {
                    let ty = node
                        .child_by_field_name("type")
                        .map(|t| node_text(t, self.source).to_string());
                    self.add_symbol(
                        node_text(name, self.source),
                        SymbolKind::ForVariable,
                        for_scope,
                        span_of(name),
                        ty,
                        None,
                    );
                }
                if let Some(value) = node.child_by_field_name("value") {
                    self.visit(value, for_scope, false);
                }
                if let Some(body) = node.child_by_field_name("body") {
                    self.visit(body, for_scope, false);
                }
            }
            "for_statement" => {
                let for_scope = self.new_scope(ScopeKind::For, Some(scope), span_of(node), None);
                let mut init_ids = Vec::new();
                {
                    let mut cursor = node.walk();
                    for init in node.children_by_field_name("init", &mut cursor) {
                        init_ids.push(init.id());
                    }
                }
                let mut cursor = node.walk();
                let children: Vec<Node<'a>> = node.named_children(&mut cursor).collect();
                for child in children {
                    self.visit(child, for_scope, init_ids.contains(&child.id()));
                }
            }
            "catch_clause" => {
                let catch_scope =
                    self.new_scope(ScopeKind::Catch, Some(scope), span_of(node), None);
                self.visit_children(node, catch_scope, false);
            }
            "catch_formal_parameter" => {
                if let Some(name) = node.child_by_field_name("name") {
                    let ty = child_of_kind(node, "catch_type")
                        .map(|t| node_text(t, self.source).to_string());
                    self.add_symbol(
                        node_text(name, self.source),
                        SymbolKind::CatchParam,
                        scope,
                        span_of(name),
                        ty,
                        None,
                    );
                }
            }
            "lambda_expression" => {
                let lambda_scope =
                    self.new_scope(ScopeKind::Lambda, Some(scope), span_of(node), None);
                if let Some(params) = node.child_by_field_name("parameters") {
                    self.record_lambda_params(params, lambda_scope);
                }
                if let Some(body) = node.child_by_field_name("body") {
                    self.visit(body, lambda_scope, false);
                }
            }
            "block" => {
                let block_scope =
                    self.new_scope(ScopeKind::Block, Some(scope), span_of(node), None);
                self.visit_children(node, block_scope, false);
            }
            "labeled_statement" => {
                if let Some(label) = child_of_kind(node, "identifier") {
                    self.add_symbol(
                        node_text(label, self.source),
                        SymbolKind::Label,
                        scope,
                        span_of(label),
                        None,
                        None,
                    );
                }
                self.visit_children(node, scope, false);
            }
            _ => {
                self.visit_children(node, scope, false);
            }
        }
    }

    fn visit_children(&mut self, node: Node<'a>, scope: ScopeId, in_for_init: bool) {
        let mut cursor = node.walk();
        let children: Vec<Node<'a>> = node.named_children(&mut cursor).collect();
        for child in children {
            self.visit(child, scope, in_for_init);
        }
    }

    fn handle_type(&mut self, node: Node<'a>, scope: ScopeId) {
        let Some(name_node) = node.child_by_field_name("name") else {
            // Error-recovered declaration without a name: nothing to record.
            self.visit_children(node, scope, false);
            return;
        };
        let name = node_text(name_node, self.source).to_string();
        let kind = match node.kind() {
            "interface_declaration" => SymbolKind::Interface,
            "enum_declaration" => SymbolKind::Enum,
            _ => SymbolKind::Class,
        };

        let symbol = self.add_symbol(&name, kind, scope, span_of(name_node), None, None);

        self.type_stack.push(name);
        let fqcn = self.current_fqcn().expect("type stack is non-empty");

        let superclass = node
            .child_by_field_name("superclass")
            .and_then(|sc| super_type_text(sc, self.source));
        let mut interfaces = Vec::new();
        if let Some(ifaces) = node.child_by_field_name("interfaces") {
            collect_type_list(ifaces, self.source, &mut interfaces);
        }
        if let Some(ext) = child_of_kind(node, "extends_interfaces") {
            collect_type_list(ext, self.source, &mut interfaces);
        }

        self.table.types.push(TypeDecl {
            fqcn,
            kind,
            name_span: span_of(name_node),
            superclass,
            interfaces,
            symbol,
        });

        let type_scope = self.new_scope(ScopeKind::Type, Some(scope), span_of(node), None);
        if let Some(body) = node.child_by_field_name("body") {
            self.visit_children(body, type_scope, false);
        }
        self.type_stack.pop();
    }

    fn handle_callable(&mut self, node: Node<'a>, scope: ScopeId) {
        let Some(name_node) = node.child_by_field_name("name") else {
            self.visit_children(node, scope, false);
            return;
        };
        let name = node_text(name_node, self.source).to_string();
        let kind = if node.kind() == "constructor_declaration" {
            SymbolKind::Constructor
        } else {
            SymbolKind::Method
        };
        let return_type = node
            .child_by_field_name("type")
            .map(|t| node_text(t, self.source).to_string());
        let descriptor = node
            .child_by_field_name("parameters")
            .map(|p| normalize_descriptor(&parameter_list_text(p, self.source)));

        let symbol = self.add_symbol(
            &name,
            kind,
            scope,
            span_of(name_node),
            return_type,
            descriptor,
        );

        let method_scope =
            self.new_scope(ScopeKind::Method, Some(scope), span_of(node), Some(symbol));
        if let Some(params) = node.child_by_field_name("parameters") {
            self.record_params(params, method_scope);
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.visit(body, method_scope, false);
        }
    }

    fn handle_field(&mut self, node: Node<'a>, scope: ScopeId) {
        let ty = node
            .child_by_field_name("type")
            .map(|t| node_text(t, self.source).to_string());
        let mut cursor = node.walk();
        let declarators: Vec<Node<'a>> = node
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "variable_declarator")
            .collect();
        for declarator in declarators {
            if let Some(name) = declarator.child_by_field_name("name") {
                self.add_symbol(
                    node_text(name, self.source),
                    SymbolKind::Field,
                    scope,
                    span_of(name),
                    ty.clone(),
                    None,
                );
            }
            if let Some(value) = declarator.child_by_field_name("value") {
                self.visit(value, scope, false);
            }
        }
    }

    fn record_params(&mut self, params: Node<'a>, scope: ScopeId) {
        let mut cursor = params.walk();
        let children: Vec<Node<'a>> = params.named_children(&mut cursor).collect();
        for child in children {
            match child.kind() {
                "formal_parameter" => {
                    if let Some(name) = child.child_by_field_name("name") {
                        let ty = child
                            .child_by_field_name("type")
                            .map(|t| node_text(t, self.source).to_string());
                        self.add_symbol(
                            node_text(name, self.source),
                            SymbolKind::Parameter,
                            scope,
                            span_of(name),
                            ty,
                            None,
                        );
                    }
                }
                "spread_parameter" => {
                    if let Some(declarator) = child_of_kind(child, "variable_declarator") {
                        if let Some(name) = declarator.child_by_field_name("name") {
                            self.add_symbol(
                                node_text(name, self.source),
                                SymbolKind::Parameter,
                                scope,
                                span_of(name),
                                None,
                                None,
                            );
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn record_lambda_params(&mut self, params: Node<'a>, scope: ScopeId) {
        match params.kind() {
            "identifier" => {
                self.add_symbol(
                    node_text(params, self.source),
                    SymbolKind::LambdaParam,
                    scope,
                    span_of(params),
                    None,
                    None,
                );
            }
            "inferred_parameters" => {
                let mut cursor = params.walk();
                let children: Vec<Node<'a>> = params.named_children(&mut cursor).collect();
                for child in children {
                    if child.kind() == "identifier" {
                        self.add_symbol(
                            node_text(child, self.source),
                            SymbolKind::LambdaParam,
                            scope,
                            span_of(child),
                            None,
                            None,
                        );
                    }
                }
            }
            "formal_parameters" => {
                self.record_params(params, scope);
            }
            _ => {}
        }
    }
}

/// Text of the type under a `superclass` node.
fn super_type_text(node: Node<'_>, source: &str) -> Option<String> {
    let mut cursor = node.walk();
    let out = node
        .named_children(&mut cursor)
        .next()
        .map(|t| node_text(t, source).to_string());
    out
}

/// Collect type texts out of a `super_interfaces` / `extends_interfaces`
/// node (both wrap a `type_list`).
fn collect_type_list(node: Node<'_>, source: &str, out: &mut Vec<String>) {
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
    for child in children {
        if child.kind() == "type_list" {
            collect_type_list(child, source, out);
        } else {
            out.push(node_text(child, source).to_string());
        }
    }
}

/// Comma-joined parameter type texts of a `formal_parameters` node.
fn parameter_list_text(params: Node<'_>, source: &str) -> String {
    let mut types = Vec::new();
    let mut cursor = params.walk();
    for child in params.named_children(&mut cursor) {
        match child.kind() {
            "formal_parameter" => {
                if let Some(ty) = child.child_by_field_name("type") {
                    types.push(node_text(ty, source).to_string());
                }
            }
            "spread_parameter" => {
                // First named child is the element type.
                let mut inner = child.walk();
                let first = child.named_children(&mut inner).next();
                if let Some(ty) = first {
                    types.push(format!("{}[]", node_text(ty, source)));
                }
            }
            _ => {}
        }
    }
    format!("({})", types.join(","))
}

// ============================================================================
// Tests
// ============================================================================
