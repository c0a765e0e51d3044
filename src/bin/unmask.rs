//! unmask CLI binary entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use unmask::cli::{run_pipeline, PipelineConfig};
use unmask::java::rewrite::RewriteOptions;
use unmask::report::UnitStatus;

/// Name recovery engine for decompiled, identifier-obfuscated Java.
#[derive(Parser)]
#[command(name = "unmask")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite obfuscated sources using the mapping and inference layers.
    Run {
        /// Input root: `.java` tree and/or merged `.txt` blobs.
        #[arg(long)]
        input: PathBuf,

        /// Output root for rewritten units.
        #[arg(long)]
        output: PathBuf,

        /// Explicit mapping file (obfuscated -> original).
        #[arg(long)]
        mapping: Option<PathBuf>,

        /// Signature database (JSON).
        #[arg(long)]
        sigdb: Option<PathBuf>,

        /// Also write the merged mapping store here.
        #[arg(long)]
        dump_mappings: Option<PathBuf>,

        /// Write the structured run report here.
        #[arg(long)]
        report: Option<PathBuf>,

        /// Insert provenance comments next to inferred renames.
        #[arg(long)]
        annotate: bool,

        /// Rewrite reflection strings (Class.forName, getMethod).
        #[arg(long)]
        reflection: bool,

        /// Force the regex fallback rewriter for every unit.
        #[arg(long)]
        fallback_regex: bool,
    },

    /// Analyze only: emit the merged mapping store without rewriting.
    #[command(name = "dump-mappings")]
    DumpMappings {
        /// Input root: `.java` tree and/or merged `.txt` blobs.
        #[arg(long)]
        input: PathBuf,

        /// Where to write the merged mapping.
        #[arg(long)]
        output: PathBuf,

        /// Explicit mapping file (obfuscated -> original).
        #[arg(long)]
        mapping: Option<PathBuf>,

        /// Signature database (JSON).
        #[arg(long)]
        sigdb: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let config = match cli.command {
        Commands::Run {
            input,
            output,
            mapping,
            sigdb,
            dump_mappings,
            report,
            annotate,
            reflection,
            fallback_regex,
        } => PipelineConfig {
            input,
            output: Some(output),
            mapping,
            sigdb,
            dump_mappings,
            report,
            rewrite: RewriteOptions {
                annotate,
                reflection,
            },
            force_regex: fallback_regex,
        },
        Commands::DumpMappings {
            input,
            output,
            mapping,
            sigdb,
        } => PipelineConfig {
            input,
            output: None,
            mapping,
            sigdb,
            dump_mappings: Some(output),
            report: None,
            rewrite: RewriteOptions::default(),
            force_regex: false,
        },
    };

    match run_pipeline(&config) {
        Ok(report) => {
            let rewritten = report
                .units
                .iter()
                .filter(|u| u.status == UnitStatus::Rewritten)
                .count();
            let degraded = report
                .units
                .iter()
                .filter(|u| u.status == UnitStatus::Degraded)
                .count();
            let edits: usize = report.units.iter().map(|u| u.edits_applied).sum();
            tracing::info!(
                units = report.units.len(),
                rewritten,
                degraded,
                edits,
                diagnostics = report.diagnostics.len(),
                "run complete"
            );
            for (kind, count) in report.counts() {
                tracing::info!(?kind, count, "diagnostics");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "run failed");
            ExitCode::from(err.exit_code().code())
        }
    }
}

fn init_logging(json: bool) {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
