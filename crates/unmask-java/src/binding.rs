//! Static receiver-type inference over expressions.
//!
//! Shared by the cross-reference index and the rewrite engine: both need
//! to know, for `x.f(...)` or `x.g`, the static type of `x` so the member
//! can be bound through the inheritance chain. Inference is best-effort —
//! anything unknown answers `None`, and callers treat that as "leave the
//! occurrence alone", never as a guess.

use tree_sitter::Node;

use unmask_core::mapping::SymbolKey;

use crate::symbols::{Namespace, Symbol, SymbolTable};
use crate::syntax::{argument_count, node_text, span_of};
use crate::typegraph::{MemberKind, MemberResolution, TypeGraph, TypeId};

/// Read-only context for binding queries within one unit.
pub struct BindCtx<'a> {
    pub source: &'a str,
    pub table: &'a SymbolTable,
    pub graph: &'a TypeGraph,
}

impl<'a> BindCtx<'a> {
    /// The type enclosing a byte offset, as a graph node.
    pub fn current_type_at(&self, offset: u64) -> Option<TypeId> {
        let scope = self.table.scope_at(offset);
        let fqcn = self.table.enclosing_type(scope)?;
        self.graph.id_of(fqcn)
    }

    /// The enclosing method/constructor symbol at a byte offset.
    pub fn enclosing_method_at(&self, offset: u64) -> Option<&'a Symbol> {
        let scope = self.table.scope_at(offset);
        let id = self.table.enclosing_method(scope)?;
        Some(self.table.symbol(id))
    }

    /// The mapping-store key of the enclosing method at an offset.
    pub fn enclosing_method_key(&self, offset: u64) -> Option<SymbolKey> {
        self.enclosing_method_at(offset)?
            .key(&self.table.unit_path)
    }

    /// Static type of a receiver expression. `None` means unknown.
    pub fn expr_type(&self, node: Node<'a>) -> Option<TypeId> {
        match node.kind() {
            "identifier" => {
                let name = node_text(node, self.source);
                let offset = span_of(node).start;
                let scope = self.table.scope_at(offset);
                if let Some(sym_id) = self.table.resolve_at(name, Namespace::Value, scope, offset)
                {
                    let symbol = self.table.symbol(sym_id);
                    let declared = symbol.declared_type.as_deref()?;
                    return self.graph.resolve_type_name(declared, self.table);
                }
                // Not a variable: maybe a type name (static member access).
                self.graph.resolve_type_name(name, self.table)
            }
            "this" => self.current_type_at(span_of(node).start),
            "super" => {
                let current = self.current_type_at(span_of(node).start)?;
                self.graph.node(current).supers.first().copied()
            }
            "field_access" => {
                let object = node.child_by_field_name("object")?;
                let field = node.child_by_field_name("field")?;
                let owner = self.expr_type(object)?;
                let name = node_text(field, self.source);
                match self
                    .graph
                    .resolve_member(owner, name, MemberKind::Field, None)
                    .outcome
                {
                    MemberResolution::Resolved(member) => {
                        let ty = member.ty.as_deref()?;
                        self.graph.resolve_type_name(ty, self.table)
                    }
                    _ => None,
                }
            }
            "method_invocation" => {
                let name = node.child_by_field_name("name")?;
                let receiver = self.receiver_type(node)?;
                let arity = node
                    .child_by_field_name("arguments")
                    .map(argument_count);
                match self
                    .graph
                    .resolve_member(
                        receiver,
                        node_text(name, self.source),
                        MemberKind::Method,
                        arity,
                    )
                    .outcome
                {
                    MemberResolution::Resolved(member) => {
                        let ty = member.ty.as_deref()?;
                        self.graph.resolve_type_name(ty, self.table)
                    }
                    _ => None,
                }
            }
            "object_creation_expression" | "cast_expression" => {
                let ty = node.child_by_field_name("type")?;
                self.graph
                    .resolve_type_name(node_text(ty, self.source), self.table)
            }
            "parenthesized_expression" => {
                let mut cursor = node.walk();
                let inner = node.named_children(&mut cursor).next()?;
                self.expr_type(inner)
            }
            _ => None,
        }
    }

    /// Receiver type of a `method_invocation`: the object expression's
    /// type, or the enclosing type for receiver-less calls.
    pub fn receiver_type(&self, invocation: Node<'a>) -> Option<TypeId> {
        match invocation.child_by_field_name("object") {
            Some(object) => self.expr_type(object),
            None => self.current_type_at(span_of(invocation).start),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
