//! Pipeline orchestration for the CLI front door.
//!
//! Phases, with the synchronization barrier the data model requires:
//!
//! 1. parse + per-unit symbol tables — parallel, no shared mutable state
//! 2. barrier: project-wide type graph and cross-reference index (a call
//!    in unit A may target a symbol declared in unit B)
//! 3. mapping store population: explicit file, then inference layers;
//!    then a single explicit freeze
//! 4. rewriting — parallel again, over shared immutable state only
//!
//! A unit that fails to read, decode, or parse is reported and skipped;
//! it never aborts its siblings. Only whole-input failures (unreadable
//! mapping file or signature database, missing input root) are fatal.

use std::fs;
use std::path::PathBuf;

use rayon::prelude::*;

use unmask_core::error::UnmaskError;
use unmask_core::mapping::{dump_mapping, parse_mapping, MappingStore};
use unmask_core::report::{Diagnostic, DiagnosticKind, RunReport, UnitReport, UnitStatus};
use unmask_java::infer::run_inference;
use unmask_java::regexfall::{RegexRewriter, DEMOTION_ERROR_RATIO};
use unmask_java::rewrite::{AstRewriter, RewriteOptions, RewriteRequest, Rewriter};
use unmask_java::sigdb::SignatureDb;
use unmask_java::symbols::SymbolTable;
use unmask_java::syntax::JavaParser;
use unmask_java::typegraph::TypeGraph;
use unmask_java::unit::{discover_units, write_outputs, RewrittenUnit, UnitError};
use unmask_java::xref::CallGraphIndex;
use unmask_java::AnalyzedUnit;

// ============================================================================
// Configuration
// ============================================================================

/// One run's configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Input root: a directory of `.java` files and/or merged `.txt` blobs.
    pub input: PathBuf,
    /// Output root for rewritten units (omit to analyze without writing).
    pub output: Option<PathBuf>,
    /// Explicit mapping file (obfuscated -> original).
    pub mapping: Option<PathBuf>,
    /// Signature database (JSON). The built-in interface table is always
    /// merged underneath.
    pub sigdb: Option<PathBuf>,
    /// Write the merged mapping store here, re-loadable as explicit input.
    pub dump_mappings: Option<PathBuf>,
    /// Write the structured run report here.
    pub report: Option<PathBuf>,
    pub rewrite: RewriteOptions,
    /// Force the regex fallback for every unit.
    pub force_regex: bool,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Run the full pipeline. Returns the run report; only whole-input
/// failures surface as errors.
pub fn run_pipeline(cfg: &PipelineConfig) -> Result<RunReport, UnmaskError> {
    let mut report = RunReport::begin();

    // --- Inputs (the only fatal failures) --------------------------------
    let mut store = MappingStore::new();
    if let Some(path) = &cfg.mapping {
        let text = fs::read_to_string(path).map_err(|e| UnmaskError::MappingFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let parsed = parse_mapping(&text);
        tracing::info!(
            classes = parsed.classes.len(),
            records = parsed.entries.len(),
            "explicit mapping loaded"
        );
        store
            .insert_all(parsed.entries)
            .map_err(|e| UnmaskError::internal(e.to_string()))?;
    }

    let db = match &cfg.sigdb {
        Some(path) => SignatureDb::load(path).map_err(|e| UnmaskError::SignatureDb {
            path: path.display().to_string(),
            message: e.to_string(),
        })?,
        None => SignatureDb::builtin(),
    };

    let set = discover_units(&cfg.input).map_err(|e| match e {
        UnitError::InputRoot { path } => UnmaskError::InputRoot { path },
        UnitError::Write { path, source } => UnmaskError::OutputWrite {
            path,
            message: source.to_string(),
        },
    })?;
    for diag in &set.diagnostics {
        if let Some(unit) = &diag.unit {
            report.push_unit(UnitReport {
                path: unit.clone(),
                status: UnitStatus::Skipped,
                edits_applied: 0,
            });
        }
    }
    report.extend_diagnostics(set.diagnostics.clone());
    tracing::info!(units = set.units.len(), blobs = set.blobs.len(), "input discovered");

    // --- Phase 1: parse + symbol tables, one unit per task ---------------
    let parsed: Vec<(Option<AnalyzedUnit>, Vec<Diagnostic>)> = set
        .units
        .par_iter()
        .map(|unit| {
            let mut diags = Vec::new();
            let mut parser = match JavaParser::new() {
                Ok(p) => p,
                Err(e) => {
                    diags.push(Diagnostic::unit(
                        DiagnosticKind::ParseError,
                        unit.path.clone(),
                        e.to_string(),
                    ));
                    return (None, diags);
                }
            };
            let tree = match parser.parse(&unit.content) {
                Ok(t) => t,
                Err(e) => {
                    diags.push(Diagnostic::unit(
                        DiagnosticKind::ParseError,
                        unit.path.clone(),
                        e.to_string(),
                    ));
                    return (None, diags);
                }
            };
            let regions = tree.error_regions();
            if !regions.is_empty() {
                diags.push(Diagnostic::unit(
                    DiagnosticKind::ParseError,
                    unit.path.clone(),
                    format!(
                        "{} parse error region(s); rewriting the recovered portion",
                        regions.len()
                    ),
                ));
            }
            let table = SymbolTable::build(&unit.path, &tree, &unit.content);
            (
                Some(AnalyzedUnit {
                    unit: unit.clone(),
                    tree,
                    table,
                }),
                diags,
            )
        })
        .collect();

    let mut analyzed = Vec::new();
    for (maybe_unit, diags) in parsed {
        match maybe_unit {
            Some(a) => analyzed.push(a),
            None => {
                if let Some(path) = diags.first().and_then(|d| d.unit.clone()) {
                    report.push_unit(UnitReport {
                        path,
                        status: UnitStatus::Skipped,
                        edits_applied: 0,
                    });
                }
            }
        }
        report.extend_diagnostics(diags);
    }

    // --- Phase 2 (barrier): project-wide resolution ----------------------
    let mut diags = Vec::new();
    let graph = TypeGraph::build(analyzed.iter().map(|a| &a.table), &db, &mut diags);
    let xref = CallGraphIndex::build(&analyzed, &graph);
    report.extend_diagnostics(diags);

    // --- Phase 3: inference layers, then freeze --------------------------
    let mut diags = Vec::new();
    run_inference(&analyzed, &graph, &xref, &mut store, &mut diags)
        .map_err(|e| UnmaskError::internal(e.to_string()))?;
    report.extend_diagnostics(diags);
    store.freeze();
    for conflict in store.conflicts() {
        report.push_diagnostic(Diagnostic::project(
            DiagnosticKind::MappingConflict,
            format!(
                "{}: kept '{}' ({}), rejected '{}'",
                conflict.key, conflict.kept, conflict.provenance, conflict.rejected
            ),
        ));
    }
    tracing::info!(entries = store.len(), conflicts = store.conflicts().len(), "mapping store frozen");

    // --- Phase 4: rewrite, one unit per task -----------------------------
    let force_regex = cfg.force_regex;
    let options = cfg.rewrite.clone();
    let results: Vec<(RewrittenUnit, UnitReport, Vec<Diagnostic>)> = analyzed
        .into_par_iter()
        .map(|a| {
            let degrade = force_regex || a.tree.error_ratio() > DEMOTION_ERROR_RATIO;
            let request = RewriteRequest {
                unit: &a.unit,
                tree: &a.tree,
                table: &a.table,
                graph: &graph,
                store: &store,
                options: &options,
            };
            let outcome = if degrade {
                RegexRewriter.rewrite(&request)
            } else {
                AstRewriter.rewrite(&request)
            };
            let status = if outcome.degraded {
                UnitStatus::Degraded
            } else if outcome.edits_applied > 0 {
                UnitStatus::Rewritten
            } else {
                UnitStatus::Verbatim
            };
            (
                RewrittenUnit {
                    id: a.unit.id,
                    text: outcome.text,
                    new_path: outcome.new_unit_path,
                },
                UnitReport {
                    path: a.unit.path.clone(),
                    status,
                    edits_applied: outcome.edits_applied,
                },
                outcome.diagnostics,
            )
        })
        .collect();

    let mut rewritten = Vec::new();
    for (result, unit_report, diags) in results {
        rewritten.push(result);
        report.push_unit(unit_report);
        report.extend_diagnostics(diags);
    }

    // --- Outputs ---------------------------------------------------------
    if let Some(out_root) = &cfg.output {
        write_outputs(out_root, &set, &rewritten).map_err(|e| match e {
            UnitError::Write { path, source } => UnmaskError::OutputWrite {
                path,
                message: source.to_string(),
            },
            UnitError::InputRoot { path } => UnmaskError::InputRoot { path },
        })?;
        tracing::info!(root = %out_root.display(), "rewritten output written");
    }

    if let Some(path) = &cfg.dump_mappings {
        fs::write(path, dump_mapping(&store)).map_err(|e| UnmaskError::OutputWrite {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
    }

    report.finish();
    if let Some(path) = &cfg.report {
        let json = report
            .to_json()
            .map_err(|e| UnmaskError::internal(e.to_string()))?;
        fs::write(path, json).map_err(|e| UnmaskError::OutputWrite {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
    }

    Ok(report)
}
