//! Edit IR: Span, Edit, EditSet for position-exact source rewriting.
//!
//! Rewriting works by staging byte-exact replacements against a single
//! snapshot of a unit's text, then applying them all at once:
//! - Edits are collected during tree traversal, in tree order
//! - Conflicts (overlapping spans) fail the whole set, never a partial apply
//! - Application happens in descending start-offset order so earlier
//!   replacements never invalidate later offsets
//! - Every replacement carries the expected old text; a mismatch aborts the
//!   set, leaving the unit verbatim

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// ============================================================================
// Core Types
// ============================================================================

/// Stable file identifier within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct FileId(pub u32);

impl FileId {
    /// Create a new file ID.
    pub fn new(id: u32) -> Self {
        FileId(id)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file_{}", self.0)
    }
}

/// Byte offsets into unit content.
///
/// Spans are half-open intervals: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: u64,
    /// End byte offset (exclusive).
    pub end: u64,
}

impl Span {
    /// Create a new span.
    ///
    /// # Panics
    /// Panics if `start > end`.
    pub fn new(start: u64, end: u64) -> Self {
        assert!(
            start <= end,
            "Span start ({}) must be <= end ({})",
            start,
            end
        );
        Span { start, end }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Check if span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Check if this span overlaps with another.
    ///
    /// Adjacent spans (one ends where another starts) do NOT overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Check if this span contains another span entirely.
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Check if this span contains a byte offset.
    pub fn contains_offset(&self, offset: u64) -> bool {
        self.start <= offset && offset < self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

// ============================================================================
// Edits
// ============================================================================

/// A single staged text change within one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    /// The byte range being replaced. Empty spans are insertions.
    pub span: Span,
    /// The bytes expected at `span` before the edit (empty for insertions).
    pub old_text: String,
    /// The replacement text.
    pub new_text: String,
    /// Short provenance label for diagnostics (e.g. "method: a -> drawUnit").
    pub label: String,
}

impl Edit {
    /// Create a replacement edit.
    pub fn replace(
        span: Span,
        old_text: impl Into<String>,
        new_text: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Edit {
            span,
            old_text: old_text.into(),
            new_text: new_text.into(),
            label: label.into(),
        }
    }

    /// Create an insertion edit at `offset`.
    pub fn insert(offset: u64, new_text: impl Into<String>, label: impl Into<String>) -> Self {
        Edit {
            span: Span::new(offset, offset),
            old_text: String::new(),
            new_text: new_text.into(),
            label: label.into(),
        }
    }
}

/// A conflict that prevents an EditSet from applying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditConflict {
    /// Two edits have overlapping spans.
    OverlappingSpans { first: Span, second: Span },
    /// The bytes at an edit's span do not match its expected old text.
    StaleText {
        span: Span,
        expected: String,
        actual: String,
    },
    /// An edit's span extends past the end of the content.
    OutOfBounds { span: Span, content_len: u64 },
}

impl fmt::Display for EditConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditConflict::OverlappingSpans { first, second } => {
                write!(f, "overlapping edits at {first} and {second}")
            }
            EditConflict::StaleText { span, expected, .. } => {
                write!(f, "stale text at {span}: expected {expected:?}")
            }
            EditConflict::OutOfBounds { span, content_len } => {
                write!(f, "edit {span} out of bounds (len {content_len})")
            }
        }
    }
}

/// Result of attempting to apply an EditSet.
#[derive(Debug, Clone)]
pub enum ApplyResult {
    /// All edits applied; the rewritten text.
    Applied(String),
    /// Apply refused; the input must be emitted verbatim.
    Refused(Vec<EditConflict>),
}

/// An ordered set of edits over one unit, applied atomically.
///
/// Duplicate spans are deduplicated on add (the first edit for a span wins),
/// so visiting the same identifier through two tree paths is harmless.
#[derive(Debug, Clone, Default)]
pub struct EditSet {
    edits: Vec<Edit>,
    seen: HashSet<Span>,
}

impl EditSet {
    /// Create an empty edit set.
    pub fn new() -> Self {
        EditSet::default()
    }

    /// Stage an edit. Returns false if an edit for the same span exists.
    pub fn add(&mut self, edit: Edit) -> bool {
        if self.seen.contains(&edit.span) {
            return false;
        }
        self.seen.insert(edit.span);
        self.edits.push(edit);
        true
    }

    /// Number of staged edits.
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// True when no edits are staged.
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// The staged edits in insertion order.
    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    /// Detect conflicts against the given content.
    ///
    /// Checks bounds, expected-text staleness, and pairwise span overlaps.
    #[must_use]
    pub fn detect_conflicts(&self, content: &str) -> Vec<EditConflict> {
        let mut conflicts = Vec::new();
        let content_len = content.len() as u64;

        for edit in &self.edits {
            if edit.span.end > content_len {
                conflicts.push(EditConflict::OutOfBounds {
                    span: edit.span,
                    content_len,
                });
                continue;
            }
            let actual = &content[edit.span.start as usize..edit.span.end as usize];
            if actual != edit.old_text {
                conflicts.push(EditConflict::StaleText {
                    span: edit.span,
                    expected: edit.old_text.clone(),
                    actual: actual.to_string(),
                });
            }
        }

        let mut sorted: Vec<Span> = self.edits.iter().map(|e| e.span).collect();
        sorted.sort();
        for pair in sorted.windows(2) {
            if pair[0].overlaps(&pair[1]) {
                conflicts.push(EditConflict::OverlappingSpans {
                    first: pair[0],
                    second: pair[1],
                });
            }
        }

        conflicts
    }

    /// Apply all edits atomically.
    ///
    /// Either every edit applies, or none do. Edits are applied in
    /// descending start-offset order (insertions at the same offset after
    /// the replacement ending there) so span offsets stay valid throughout.
    #[must_use]
    pub fn apply(&self, content: &str) -> ApplyResult {
        let conflicts = self.detect_conflicts(content);
        if !conflicts.is_empty() {
            return ApplyResult::Refused(conflicts);
        }

        let mut ordered: Vec<&Edit> = self.edits.iter().collect();
        ordered.sort_by(|a, b| b.span.start.cmp(&a.span.start).then(b.span.end.cmp(&a.span.end)));

        let mut out = content.as_bytes().to_vec();
        for edit in ordered {
            let start = edit.span.start as usize;
            let end = edit.span.end as usize;
            out.splice(start..end, edit.new_text.bytes());
        }

        match String::from_utf8(out) {
            Ok(text) => ApplyResult::Applied(text),
            // Replacement texts are Strings and spans sit on node boundaries,
            // so this only trips on a span splitting a multi-byte char.
            Err(_) => ApplyResult::Refused(vec![EditConflict::StaleText {
                span: Span::new(0, 0),
                expected: String::new(),
                actual: "non-UTF-8 result".to_string(),
            }]),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
