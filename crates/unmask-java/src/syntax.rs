//! The syntax-tree boundary: a thin wrapper over the tree-sitter Java
//! grammar.
//!
//! The parser is treated as a black box that always produces a tree with
//! byte-offset spans, recovering from malformed input with ERROR and
//! MISSING nodes instead of failing. Everything downstream consumes the
//! tree through this module's helpers; nothing else touches tree-sitter
//! directly.

use thiserror::Error;
use tree_sitter::{Node, Parser, Tree};

use unmask_core::patch::Span;

// ============================================================================
// Errors
// ============================================================================

/// Errors from the parser boundary.
#[derive(Debug, Error)]
pub enum SyntaxError {
    /// The bundled grammar is incompatible with the linked tree-sitter
    /// runtime. A build-configuration problem, not an input problem.
    #[error("failed to load Java grammar: {0}")]
    Grammar(String),

    /// The parser returned no tree (cancelled or misconfigured).
    #[error("parser produced no tree")]
    NoTree,
}

// ============================================================================
// Parser
// ============================================================================

/// A reusable Java parser. One per worker thread; not shared.
pub struct JavaParser {
    parser: Parser,
}

impl JavaParser {
    /// Create a parser with the Java grammar loaded.
    pub fn new() -> Result<Self, SyntaxError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_java::LANGUAGE.into())
            .map_err(|e| SyntaxError::Grammar(e.to_string()))?;
        Ok(JavaParser { parser })
    }

    /// Parse one unit. Always returns a tree for valid UTF-8 input;
    /// malformed Java yields a tree containing error nodes.
    pub fn parse(&mut self, source: &str) -> Result<SyntaxTree, SyntaxError> {
        let tree = self
            .parser
            .parse(source.as_bytes(), None)
            .ok_or(SyntaxError::NoTree)?;
        Ok(SyntaxTree { tree })
    }
}

// ============================================================================
// Tree
// ============================================================================

/// A parsed unit's tree.
pub struct SyntaxTree {
    tree: Tree,
}

impl SyntaxTree {
    /// The root node.
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Byte ranges covered by ERROR or MISSING nodes.
    pub fn error_regions(&self) -> Vec<Span> {
        let mut regions = Vec::new();
        collect_errors(self.root(), &mut regions);
        regions
    }

    /// Fraction of the unit's bytes covered by error regions.
    ///
    /// Units above the caller's threshold are demoted to the regex
    /// fallback rewriter.
    pub fn error_ratio(&self) -> f64 {
        let total = self.root().end_byte().saturating_sub(self.root().start_byte());
        if total == 0 {
            return 0.0;
        }
        let covered: u64 = self.error_regions().iter().map(Span::len).sum();
        (covered as f64 / total as f64).min(1.0)
    }
}

fn collect_errors(node: Node<'_>, regions: &mut Vec<Span>) {
    if node.is_error() || node.is_missing() {
        // Children of an error node are inside its span already.
        regions.push(span_of(node));
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_errors(child, regions);
    }
}

// ============================================================================
// Node Helpers
// ============================================================================

/// The byte span of a node.
pub fn span_of(node: Node<'_>) -> Span {
    Span::new(node.start_byte() as u64, node.end_byte() as u64)
}

/// The source text of a node.
pub fn node_text<'a>(node: Node<'a>, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// Preorder walk over every node in the tree.
pub fn walk_tree<'a>(root: Node<'a>, visit: &mut impl FnMut(Node<'a>)) {
    visit(root);
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        walk_tree(child, visit);
    }
}

/// Named children of a node, collected.
pub fn named_children<'a>(node: Node<'a>) -> Vec<Node<'a>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// First named child with the given kind.
pub fn child_of_kind<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    let found = node.named_children(&mut cursor).find(|c| c.kind() == kind);
    found
}

/// The nearest ancestor with one of the given kinds.
pub fn ancestor_of_kind<'a>(node: Node<'a>, kinds: &[&str]) -> Option<Node<'a>> {
    let mut current = node.parent();
    while let Some(n) = current {
        if kinds.contains(&n.kind()) {
            return Some(n);
        }
        current = n.parent();
    }
    None
}

/// Argument count of an `argument_list` node.
pub fn argument_count(args: Node<'_>) -> usize {
    let mut cursor = args.walk();
    args.named_children(&mut cursor).count()
}

// ============================================================================
// Tests
// ============================================================================
