// crates/caseflow-cli/src/main.rs
// ============================================================================
// Module: Operator CLI Entry Point
// Description: Command dispatcher for booting the server, applying SQLite
//              migrations, running an offline pipeline dry-run, and
//              validating domain configuration files.
// Purpose: Give an operator one binary for deployment and local-development
//          tasks.
// Dependencies: axum, caseflow-config, caseflow-core, caseflow-pipeline,
//               caseflow-providers, caseflow-server, caseflow-store-sqlite,
//               caseflow-validator, clap, serde_json, thiserror, tokio,
//               tracing, tracing-subscriber.
// ============================================================================

//! ## Overview
//! Four subcommands, each a thin wrapper over a library crate this
//! workspace already owns: `serve` boots [`caseflow_server`], `migrate`
//! opens the SQLite store (which applies its own schema migrations on
//! open), `dry-run` runs the classification pipeline and validator against
//! a local case fixture with no network or store side effects beyond the
//! LLM call itself, and `config check` validates a domain configuration
//! TOML file. Exit codes: `0` on success, non-zero on any unhandled error.

use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use caseflow_core::ContextPack;
use caseflow_store_sqlite::SqliteStore;
use caseflow_store_sqlite::SqliteStoreConfig;
use clap::Parser;
use clap::Subcommand;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "caseflow", about = "Operator CLI for the Case Intake & Orchestration Engine")]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Boots the HTTP server and worker loop.
    Serve,
    /// Opens the SQLite store, applying any pending schema migration.
    Migrate {
        /// Path to the `SQLite` store file (defaults to `CASEFLOW_SQLITE_PATH`
        /// or `caseflow.db`).
        #[arg(long, value_name = "PATH")]
        sqlite_path: Option<PathBuf>,
    },
    /// Runs the classification pipeline and validator against a local case
    /// fixture, with no `SQLite` store, ServiceNow, or Slack side effects.
    DryRun {
        /// Path to a JSON file containing one `Case`.
        #[arg(long, value_name = "FILE")]
        case: PathBuf,
        /// Path to the domain configuration TOML file.
        #[arg(long, value_name = "PATH")]
        config: PathBuf,
    },
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validates a domain configuration TOML file.
    Check {
        /// Path to the configuration file.
        #[arg(long, value_name = "PATH")]
        path: PathBuf,
    },
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper covering every subcommand's failure modes.
#[derive(Debug, Error)]
enum CliError {
    /// Reading an input file from disk failed.
    #[error("failed to read {path}: {source}")]
    ReadFile {
        /// The path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A JSON input file did not parse into the expected shape.
    #[error("failed to parse {path} as JSON: {source}")]
    ParseJson {
        /// The path that failed to parse.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// Loading or validating the domain configuration failed.
    #[error("configuration error: {0}")]
    Config(#[from] caseflow_config::ConfigLoadError),
    /// Assembling process-level server settings failed.
    #[error("settings error: {0}")]
    Settings(#[from] caseflow_server::SettingsError),
    /// A backend client or pipeline operation failed.
    #[error("{0}")]
    Core(#[from] caseflow_core::CoreError),
    /// Opening or migrating the `SQLite` store failed.
    #[error("store error: {0}")]
    Store(#[from] caseflow_store_sqlite::SqliteStoreError),
    /// The HTTP listener could not bind or serve.
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// CLI result alias for fallible subcommand handlers.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point, returning a process exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    init_tracing();
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = write_stderr_line(&err.to_string());
            ExitCode::FAILURE
        }
    }
}

/// Initializes structured logging from `RUST_LOG`, defaulting to `info`.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .json()
        .init();
}

/// Parses arguments and dispatches to the selected subcommand.
async fn run() -> CliResult<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve => command_serve().await,
        Command::Migrate { sqlite_path } => command_migrate(sqlite_path),
        Command::DryRun { case, config } => command_dry_run(&case, &config),
        Command::Config { command: ConfigCommand::Check { path } } => command_config_check(&path),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Boots [`caseflow_server`]: loads settings and domain configuration,
/// builds [`caseflow_server::AppState`], and serves the HTTP router until
/// the process is terminated.
async fn command_serve() -> CliResult<()> {
    let settings = caseflow_server::ServerSettings::from_env()?;
    let config = caseflow_config::Config::load_from_file(&settings.config_path)?;
    let listen_addr = settings.listen_addr;
    let state = std::sync::Arc::new(caseflow_server::AppState::bootstrap(&settings, config)?);
    let router = caseflow_server::build_router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(%listen_addr, "caseflow-server listening");
    axum::serve(listener, router).await?;
    Ok(())
}

// ============================================================================
// SECTION: Migrate Command
// ============================================================================

/// Opens the `SQLite` store at `sqlite_path`, which applies any pending
/// schema migration as part of `open`, then reports success.
fn command_migrate(sqlite_path: Option<PathBuf>) -> CliResult<()> {
    let path = sqlite_path
        .unwrap_or_else(|| PathBuf::from(std::env::var("CASEFLOW_SQLITE_PATH").unwrap_or_else(|_| "caseflow.db".to_string())));
    let store = SqliteStore::open(&SqliteStoreConfig::file(path.clone()))?;
    drop(store);
    write_stdout_line(&format!("migrated {} to the current schema version", path.display()))?;
    Ok(())
}

// ============================================================================
// SECTION: Dry-Run Command
// ============================================================================

/// Runs the classification pipeline and validator against a local case
/// fixture, using the configured LLM backend but no `SQLite` store,
/// ServiceNow, or Slack side effects, and prints the resulting
/// classification and gate decision as JSON.
fn command_dry_run(case_path: &Path, config_path: &Path) -> CliResult<()> {
    let case: caseflow_core::Case = read_json(case_path)?;
    let config = caseflow_config::Config::load_from_file(config_path)?;
    let settings = caseflow_server::ServerSettings::from_env()?;

    let llm = caseflow_providers::LlmHttpClient::new(caseflow_providers::LlmHttpConfig {
        base_url: settings.llm_base_url,
        api_key: settings.llm_api_key,
        model: settings.llm_model,
        http: caseflow_providers::HttpPolicyConfig::default(),
    })?;

    let pack = ContextPack::bare(case.clone());
    let pipeline = caseflow_pipeline::ClassificationPipeline::new(&llm, &config.pipeline);
    let classification = pipeline.run(&pack).map_err(|err| match err {
        caseflow_pipeline::PipelineError::Core(source) => CliError::Core(source),
        caseflow_pipeline::PipelineError::StageParseError { stage } => CliError::Core(caseflow_core::CoreError::InvalidResponse {
            source: "caseflow_pipeline",
            detail: format!("stage {stage} failed to produce a valid response"),
        }),
    })?;

    let outcome = caseflow_validator::evaluate(&case, &classification, &config.validator);
    let report = serde_json::json!({
        "status": outcome.status,
        "risk_level": outcome.risk_level,
        "forced_escalation": outcome.forced_escalation,
        "requires_human_review": outcome.requires_human_review,
        "checks": outcome.checks,
        "questions": outcome.questions,
        "recommendations": outcome.recommendations,
        "classification": classification,
    });
    write_stdout_line(&serde_json::to_string_pretty(&report).unwrap_or_else(|_| report.to_string()))?;
    Ok(())
}

// ============================================================================
// SECTION: Config Command
// ============================================================================

/// Validates `path` against `caseflow_config`'s schema and thresholds.
fn command_config_check(path: &Path) -> CliResult<()> {
    caseflow_config::Config::load_from_file(path)?;
    write_stdout_line(&format!("{} is valid", path.display()))?;
    Ok(())
}

// ============================================================================
// SECTION: Shared Helpers
// ============================================================================

/// Reads and parses a JSON file at `path`.
fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> CliResult<T> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::ParseJson {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes one line to stdout without the `println!`/`print!` macros this
/// workspace's lints deny.
fn write_stdout_line(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}").map_err(CliError::Io)
}

/// Writes one line to stderr without the `println!`/`eprintln!` macros this
/// workspace's lints deny.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

#[cfg(test)]
mod tests;
