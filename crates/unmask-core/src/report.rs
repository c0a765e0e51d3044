//! Structured end-of-run reporting.
//!
//! Per-unit failures are isolated: they become diagnostics in the report and
//! never abort sibling units. The report is the single user-visible record
//! of everything that degraded, conflicted, or was skipped.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Diagnostics
// ============================================================================

/// Kind of per-unit or project-wide diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Malformed unit; rewriting continued on the recovered portion.
    ParseError,
    /// Multiple candidate bindings; the occurrence was left verbatim.
    ResolutionAmbiguous,
    /// Inheritance cycle; the implicated type resolves nothing.
    InheritanceCycle,
    /// Equal-precedence mapping layers disagreed; first entry kept.
    MappingConflict,
    /// Unit payload was not valid UTF-8; unit skipped.
    EncodingError,
    /// Referenced external type missing from the signature database.
    MissingSignatureData,
}

/// One recorded diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Unit path, when the diagnostic is unit-scoped.
    pub unit: Option<String>,
    pub message: String,
}

impl Diagnostic {
    /// Create a unit-scoped diagnostic.
    pub fn unit(kind: DiagnosticKind, unit: impl Into<String>, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            unit: Some(unit.into()),
            message: message.into(),
        }
    }

    /// Create a project-wide diagnostic.
    pub fn project(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            unit: None,
            message: message.into(),
        }
    }
}

// ============================================================================
// Unit Status
// ============================================================================

/// Outcome for one source unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    /// Rewritten by the syntax-aware engine.
    Rewritten,
    /// Rewritten by the regex fallback (weaker guarantees).
    Degraded,
    /// Emitted verbatim (edit set refused or nothing to rewrite).
    Verbatim,
    /// Skipped entirely (e.g. encoding error).
    Skipped,
}

/// Per-unit entry in the run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitReport {
    pub path: String,
    pub status: UnitStatus,
    pub edits_applied: usize,
}

// ============================================================================
// Run Report
// ============================================================================

/// The structured end-of-run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: String,
    pub finished_at: Option<String>,
    pub units: Vec<UnitReport>,
    pub diagnostics: Vec<Diagnostic>,
}

impl RunReport {
    /// Start a new report, stamping the current time.
    pub fn begin() -> Self {
        RunReport {
            started_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            finished_at: None,
            units: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Record a unit outcome.
    pub fn push_unit(&mut self, unit: UnitReport) {
        self.units.push(unit);
    }

    /// Record a diagnostic.
    pub fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Record a batch of diagnostics.
    pub fn extend_diagnostics(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    /// Stamp the finish time and sort units for deterministic output.
    pub fn finish(&mut self) {
        self.units.sort_by(|a, b| a.path.cmp(&b.path));
        self.diagnostics
            .sort_by(|a, b| (a.kind, &a.unit, &a.message).cmp(&(b.kind, &b.unit, &b.message)));
        self.finished_at = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
    }

    /// Diagnostic counts per kind.
    pub fn counts(&self) -> BTreeMap<DiagnosticKind, usize> {
        let mut counts = BTreeMap::new();
        for d in &self.diagnostics {
            *counts.entry(d.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_sorts_units_and_diagnostics() {
        let mut report = RunReport::begin();
        report.push_unit(UnitReport {
            path: "b.java".to_string(),
            status: UnitStatus::Rewritten,
            edits_applied: 3,
        });
        report.push_unit(UnitReport {
            path: "a.java".to_string(),
            status: UnitStatus::Verbatim,
            edits_applied: 0,
        });
        report.push_diagnostic(Diagnostic::unit(
            DiagnosticKind::ParseError,
            "b.java",
            "error node at 12..20",
        ));
        report.push_diagnostic(Diagnostic::project(
            DiagnosticKind::MappingConflict,
            "two layers disagreed",
        ));
        report.finish();

        assert_eq!(report.units[0].path, "a.java");
        assert!(report.finished_at.is_some());
        // Kind order: ParseError < MappingConflict per enum declaration
        assert_eq!(report.diagnostics[0].kind, DiagnosticKind::ParseError);
    }

    #[test]
    fn counts_group_by_kind() {
        let mut report = RunReport::begin();
        report.push_diagnostic(Diagnostic::project(DiagnosticKind::MappingConflict, "a"));
        report.push_diagnostic(Diagnostic::project(DiagnosticKind::MappingConflict, "b"));
        report.push_diagnostic(Diagnostic::project(DiagnosticKind::EncodingError, "c"));

        let counts = report.counts();
        assert_eq!(counts[&DiagnosticKind::MappingConflict], 2);
        assert_eq!(counts[&DiagnosticKind::EncodingError], 1);
    }

    #[test]
    fn report_serializes_to_json() {
        let mut report = RunReport::begin();
        report.push_unit(UnitReport {
            path: "a.java".to_string(),
            status: UnitStatus::Degraded,
            edits_applied: 1,
        });
        report.finish();

        let json = report.to_json().unwrap();
        assert!(json.contains("\"degraded\""));
        assert!(json.contains("a.java"));
    }
}
