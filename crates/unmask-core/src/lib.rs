//! Core infrastructure for unmask: spans, the edit IR, the layered mapping
//! store, text position utilities, and structured diagnostics.
//!
//! Everything in this crate is language-agnostic; the Java analyzer and
//! rewriter live in `unmask-java`.

pub mod error;
pub mod mapping;
pub mod patch;
pub mod report;
pub mod text;
