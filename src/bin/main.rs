//! OSI CLI - Validate and normalize semantic model files
//!
//! Usage:
//!   osi validate <files>... [--config <osi.toml>] [--format text|json]
//!                           [--sql-dialect <dialect>] [--deny-warnings]
//!   osi normalize <file> [--format yaml|json]
//!
//! Examples:
//!   osi validate models/sales.yaml models/finance.yaml
//!   osi validate models/*.yaml --sql-dialect snowflake --format json
//!   osi normalize models/sales.yaml > sales.canonical.yaml
//!
//! Logging goes to stderr and is controlled by `OSI_LOG` (default `warn`).

use ariadne::{Config, IndexType, Label, Report, ReportKind, Source};
use clap::{Parser, Subcommand, ValueEnum};
use osi::batch::{validate_batch, BatchOutcome, CancelToken, Document};
use osi::config::{Settings, SettingsError};
use osi::pipeline::validate_source;
use osi::{Diagnostic, Severity};
use std::fs;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "osi")]
#[command(about = "OSI - Validate and normalize Open Semantic Interchange models")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate one or more semantic model files
    Validate {
        /// Paths to the YAML files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Config file (defaults to OSI_CONFIG, ./osi.toml, then the user config dir)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: ReportFormat,

        /// Also check expressions against this SQL dialect
        #[arg(long)]
        sql_dialect: Option<String>,

        /// Treat warnings as failures
        #[arg(long)]
        deny_warnings: bool,
    },

    /// Print the canonical form of a valid semantic model file
    Normalize {
        /// Path to the YAML file
        file: PathBuf,

        /// Config file (defaults to OSI_CONFIG, ./osi.toml, then the user config dir)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "yaml")]
        format: CanonicalFormat,
    },
}

#[derive(Clone, ValueEnum)]
enum ReportFormat {
    /// Diagnostics with source snippets
    Text,
    /// Machine-readable outcomes
    Json,
}

#[derive(Clone, ValueEnum)]
enum CanonicalFormat {
    Yaml,
    Json,
}

/// Exit code for unreadable inputs and bad configuration.
const USAGE_FAILURE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate {
            files,
            config,
            format,
            sql_dialect,
            deny_warnings,
        } => cmd_validate(files, config, format, sql_dialect, deny_warnings).await,
        Commands::Normalize {
            file,
            config,
            format,
        } => cmd_normalize(file, config, format),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("OSI_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(
    config: Option<PathBuf>,
    sql_dialect: Option<String>,
) -> Result<Settings, SettingsError> {
    let mut settings = match config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::load()?,
    };
    if let Some(dialect) = sql_dialect {
        settings.rules.sql_dialect = Some(dialect);
        settings.validate()?;
    }
    Ok(settings)
}

async fn cmd_validate(
    files: Vec<PathBuf>,
    config: Option<PathBuf>,
    format: ReportFormat,
    sql_dialect: Option<String>,
    deny_warnings: bool,
) -> ExitCode {
    let settings = match load_settings(config, sql_dialect) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::from(USAGE_FAILURE);
        }
    };

    // Read every file; unreadable ones are reported and skipped
    let mut documents = Vec::with_capacity(files.len());
    let mut unreadable = false;
    for file in &files {
        match fs::read_to_string(file) {
            Ok(source) => documents.push(Document::new(file.display().to_string(), source)),
            Err(e) => {
                eprintln!("Error reading file '{}': {}", file.display(), e);
                unreadable = true;
            }
        }
    }
    let sources: Vec<String> = documents.iter().map(|d| d.source.clone()).collect();

    let outcomes = match validate_batch(documents, Arc::new(settings), CancelToken::new()).await {
        Ok(outcomes) => outcomes,
        Err(e) => {
            eprintln!("Validation error: {}", e);
            return ExitCode::from(USAGE_FAILURE);
        }
    };

    let failed = outcomes.iter().any(|outcome| match outcome {
        BatchOutcome::Completed { report, .. } => {
            !report.ok() || (deny_warnings && report.result.has_warnings())
        }
        BatchOutcome::Cancelled { .. } | BatchOutcome::Failed { .. } => true,
    });

    match format {
        ReportFormat::Json => match serde_json::to_string_pretty(&outcomes) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to serialize report: {}", e);
                return ExitCode::FAILURE;
            }
        },
        ReportFormat::Text => {
            for (outcome, source) in outcomes.iter().zip(&sources) {
                print_outcome(outcome, source);
            }
        }
    }

    if unreadable {
        ExitCode::from(USAGE_FAILURE)
    } else if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn print_outcome(outcome: &BatchOutcome, source: &str) {
    match outcome {
        BatchOutcome::Completed { name, report } => {
            render_diagnostics(name, source, &report.result.diagnostics);
            let errors = report.result.error_count();
            let warnings = report.result.warning_count();
            if report.ok() && warnings == 0 {
                println!("OK: {} is valid", name);
            } else if report.ok() {
                println!("OK: {} is valid ({} warning(s))", name, warnings);
            } else {
                println!(
                    "FAILED: {} has {} error(s), {} warning(s)",
                    name, errors, warnings
                );
            }
        }
        BatchOutcome::Cancelled { name } => println!("CANCELLED: {}", name),
        BatchOutcome::Failed { name, error } => {
            println!("FAILED: {} could not be validated: {}", name, error)
        }
    }
}

fn cmd_normalize(file: PathBuf, config: Option<PathBuf>, format: CanonicalFormat) -> ExitCode {
    let settings = match load_settings(config, None) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::from(USAGE_FAILURE);
        }
    };

    // Read the file
    let source = match fs::read_to_string(&file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", file.display(), e);
            return ExitCode::from(USAGE_FAILURE);
        }
    };

    let name = file.display().to_string();
    let report = validate_source(&source, &settings);
    render_diagnostics(&name, &source, &report.result.diagnostics);

    let Some(canonical) = report.canonical else {
        eprintln!(
            "FAILED: {} has {} error(s); not normalized",
            name,
            report.result.error_count()
        );
        return ExitCode::FAILURE;
    };

    let output = match format {
        CanonicalFormat::Yaml => canonical.to_yaml(),
        CanonicalFormat::Json => canonical.to_json(),
    };
    match output {
        Ok(text) => {
            print!("{}", text);
            if !text.ends_with('\n') {
                println!();
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Normalization error: {}", e);
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// Diagnostic rendering
// ============================================================================

fn render_diagnostics(name: &str, source: &str, diagnostics: &[Diagnostic]) {
    let config = Config::default()
        .with_index_type(IndexType::Byte)
        .with_color(std::io::stderr().is_terminal());

    for diagnostic in diagnostics {
        let kind = match diagnostic.severity {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
        };
        let span = byte_span(source, diagnostic);

        let mut report = Report::build(kind, (name, span.clone()))
            .with_config(config)
            .with_code(diagnostic.code)
            .with_message(&diagnostic.message)
            .with_label(Label::new((name, span)).with_message(format!("at {}", diagnostic.location)));
        if let Some(suggestion) = &diagnostic.suggestion {
            report = report.with_help(suggestion);
        }

        if report.finish().eprint((name, Source::from(source))).is_err() {
            // Fall back to the plain form
            eprintln!("{}", diagnostic);
        }
    }
}

/// The source character a diagnostic points at; empty when it has no position.
fn byte_span(source: &str, diagnostic: &Diagnostic) -> std::ops::Range<usize> {
    let Some(position) = diagnostic.position else {
        return 0..0;
    };
    let start = position.offset.min(source.len());
    let end = source
        .get(start..)
        .and_then(|rest| rest.chars().next())
        .map_or(start, |c| start + c.len_utf8());
    start..end
}
