//! Java analyzer and rewriter for unmask.
//!
//! The pipeline over this crate:
//!
//! 1. [`unit`] discovers source units (directory tree or merged blobs)
//! 2. [`syntax`] parses each unit (fault tolerant, byte-offset spans)
//! 3. [`symbols`] builds one symbol table + scope tree per unit
//! 4. [`typegraph`] merges all units with the [`sigdb`] signature
//!    database into the project-wide inheritance graph
//! 5. [`xref`] indexes call edges, field accesses, and literal keys
//! 6. [`infer`] proposes names for unmapped symbols, layered into the
//!    mapping store
//! 7. [`rewrite`] applies the frozen store back onto each unit
//!    ([`regexfall`] is the degraded fallback for unparseable units)
//!
//! Per-unit phases (2-3 and 7) are embarrassingly parallel; the
//! project-wide phases (4-6) run behind a barrier once every table
//! exists.

pub mod binding;
pub mod infer;
pub mod regexfall;
pub mod rewrite;
pub mod sigdb;
pub mod symbols;
pub mod syntax;
pub mod typegraph;
pub mod unit;
pub mod xref;

use symbols::SymbolTable;
use syntax::SyntaxTree;
use unit::SourceUnit;

/// A unit with its parsed tree and symbol table. Immutable once built;
/// shared read-only across the parallel rewrite phase.
pub struct AnalyzedUnit {
    pub unit: SourceUnit,
    pub tree: SyntaxTree,
    pub table: SymbolTable,
}
