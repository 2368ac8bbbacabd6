// crates/delta-ledger-cli/src/main.rs
// ============================================================================
// Module: Delta Ledger CLI Entry Point
// Description: Command dispatcher for incremental dimension loading.
// Purpose: Run, backfill, inspect, and repair ledgers from configuration.
// Dependencies: clap, delta-ledger-config, delta-ledger-core,
//               delta-ledger-sources, delta-ledger-store-sqlite, serde_json
// ============================================================================

//! ## Overview
//! The CLI wires one `delta-ledger.toml` into a pipeline per source table:
//! JSONL change files feed the merge, the `SQLite` store persists history and
//! checkpoints, and rollups derive from per-table fact files. Commands map
//! one-to-one onto pipeline operations; `run` and `verify` iterate every
//! configured table unless `--table` narrows them. Structured output is JSON
//! by default so runs can be scripted; `--format text` renders for humans.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub(crate) mod alerts;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use delta_ledger_config::AlertSinkKind;
use delta_ledger_config::LedgerConfig;
use delta_ledger_config::SourceEntry;
use delta_ledger_config::config_toml_example;
use delta_ledger_core::DimensionStore;
use delta_ledger_core::DimensionVersion;
use delta_ledger_core::EventTime;
use delta_ledger_core::NaturalKey;
use delta_ledger_core::NullAlertSink;
use delta_ledger_core::Pipeline;
use delta_ledger_core::RollupRunner;
use delta_ledger_core::RunSummary;
use delta_ledger_core::SourceTableId;
use delta_ledger_core::StatusReport;
use delta_ledger_core::VerifyReport;
use delta_ledger_core::Watermark;
use delta_ledger_sources::JsonlChangeSource;
use delta_ledger_sources::JsonlFactSource;
use delta_ledger_sources::JsonlSourceConfig;
use delta_ledger_sources::SourceRegistry;
use delta_ledger_store_sqlite::SqliteLedgerStore;
use serde::Serialize;
use thiserror::Error;

use crate::alerts::CliAlertSink;
use crate::alerts::JsonlAlertSink;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Pipeline assembled from configuration.
type CliPipeline = Pipeline<
    SourceRegistry,
    SqliteLedgerStore,
    SqliteLedgerStore,
    CliAlertSink,
    RollupRunner<JsonlFactSource, SqliteLedgerStore>,
>;

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "delta-ledger", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute one pipeline run per table.
    Run(RunCommand),
    /// Repeat runs until a table's source is drained.
    Backfill(BackfillCommand),
    /// Show the stored watermark and recent runs for a table.
    Status(StatusCommand),
    /// Show the full version history of one natural key.
    History(HistoryCommand),
    /// Check stored history against the ledger invariants.
    Verify(VerifyCommand),
    /// Aggregate maintenance utilities.
    Rollup {
        /// Selected rollup subcommand.
        #[command(subcommand)]
        command: RollupCommand,
    },
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Shared configuration file argument.
#[derive(Args, Debug, Clone)]
struct ConfigArgs {
    /// Optional config file path (defaults to delta-ledger.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Output formats for structured CLI commands.
#[derive(ValueEnum, Copy, Clone, Debug)]
enum OutputFormat {
    /// Pretty JSON output.
    Json,
    /// Human-readable text output.
    Text,
}

/// Arguments for `run`.
#[derive(Args, Debug)]
struct RunCommand {
    /// Configuration file settings.
    #[command(flatten)]
    config: ConfigArgs,
    /// Run only this table (defaults to every configured table).
    #[arg(long, value_name = "TABLE")]
    table: Option<String>,
    /// Output format for run summaries.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

/// Arguments for `backfill`.
#[derive(Args, Debug)]
struct BackfillCommand {
    /// Configuration file settings.
    #[command(flatten)]
    config: ConfigArgs,
    /// Table to backfill.
    #[arg(long, value_name = "TABLE")]
    table: String,
    /// Maximum runs before the loop stops.
    #[arg(long = "max-runs", value_name = "COUNT", default_value_t = 100)]
    max_runs: u64,
    /// Seed cursor: reprocess events at or after this instant.
    #[arg(long = "from-event-time", value_name = "RFC3339", requires = "from_extracted_at")]
    from_event_time: Option<String>,
    /// Seed cursor: reprocess records extracted after this instant.
    #[arg(long = "from-extracted-at", value_name = "RFC3339", requires = "from_event_time")]
    from_extracted_at: Option<String>,
    /// Output format for backfill reports.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

/// Arguments for `status`.
#[derive(Args, Debug)]
struct StatusCommand {
    /// Configuration file settings.
    #[command(flatten)]
    config: ConfigArgs,
    /// Table to describe.
    #[arg(long, value_name = "TABLE")]
    table: String,
    /// Maximum recent runs to include.
    #[arg(long, value_name = "COUNT", default_value_t = 10)]
    limit: usize,
    /// Output format for status reports.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

/// Arguments for `history`.
#[derive(Args, Debug)]
struct HistoryCommand {
    /// Configuration file settings.
    #[command(flatten)]
    config: ConfigArgs,
    /// Table the key belongs to.
    #[arg(long, value_name = "TABLE")]
    table: String,
    /// Natural key to inspect.
    #[arg(long, value_name = "KEY")]
    key: String,
    /// Output format for history listings.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

/// Arguments for `verify`.
#[derive(Args, Debug)]
struct VerifyCommand {
    /// Configuration file settings.
    #[command(flatten)]
    config: ConfigArgs,
    /// Verify only this table (defaults to every configured table).
    #[arg(long, value_name = "TABLE")]
    table: Option<String>,
    /// Output format for verification reports.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

/// Rollup subcommands.
#[derive(Subcommand, Debug)]
enum RollupCommand {
    /// Drop and recompute every aggregate from facts.
    Rebuild(RollupRebuildCommand),
}

/// Arguments for `rollup rebuild`.
#[derive(Args, Debug)]
struct RollupRebuildCommand {
    /// Configuration file settings.
    #[command(flatten)]
    config: ConfigArgs,
    /// Table whose fact stream feeds the rebuild.
    #[arg(long, value_name = "TABLE")]
    table: String,
    /// Output format for rebuild reports.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate a configuration file.
    Validate(ConfigValidateCommand),
    /// Print the annotated example configuration.
    Example,
}

/// Arguments for `config validate`.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Configuration file settings.
    #[command(flatten)]
    config: ConfigArgs,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error carrying a rendered message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&format!("delta-ledger {version}"))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }
    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };
    match command {
        Commands::Run(command) => command_run(&command),
        Commands::Backfill(command) => command_backfill(&command),
        Commands::Status(command) => command_status(&command),
        Commands::History(command) => command_history(&command),
        Commands::Verify(command) => command_verify(&command),
        Commands::Rollup {
            command,
        } => command_rollup(&command),
        Commands::Config {
            command,
        } => command_config(&command),
    }
}

/// Prints top-level help when no subcommand is given.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

// ============================================================================
// SECTION: Run Commands
// ============================================================================

/// Executes the `run` command.
fn command_run(command: &RunCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.config.as_deref())?;
    let tables = resolve_tables(&config, command.table.as_deref())?;
    for table in &tables {
        let pipeline = build_pipeline(&config, table)?;
        let summary = pipeline
            .run_once(table)
            .map_err(|err| CliError::new(format!("run failed for {table}: {err}")))?;
        emit_run_summary(&summary, command.format)?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes the `backfill` command.
fn command_backfill(command: &BackfillCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.config.as_deref())?;
    let table = SourceTableId::new(command.table.clone());
    let pipeline = build_pipeline(&config, &table)?;
    let report = match seed_watermark(command, &table)? {
        Some(from) => pipeline.backfill_from(&table, &from, command.max_runs),
        None => pipeline.backfill(&table, command.max_runs),
    }
    .map_err(|err| CliError::new(format!("backfill failed for {table}: {err}")))?;
    match command.format {
        OutputFormat::Json => emit_json(&report)?,
        OutputFormat::Text => {
            let line = format!(
                "backfill table={table} runs={} extracted={} merged={} late={} exhausted={}",
                report.runs,
                report.records_extracted,
                report.records_merged,
                report.late_corrections,
                report.exhausted,
            );
            emit_line(&line)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Builds the seeded backfill cursor when both `--from` instants are given.
fn seed_watermark(
    command: &BackfillCommand,
    table: &SourceTableId,
) -> CliResult<Option<Watermark>> {
    match (&command.from_event_time, &command.from_extracted_at) {
        (None, None) => Ok(None),
        (Some(event_text), Some(extracted_text)) => Ok(Some(Watermark {
            source_table: table.clone(),
            last_event_time: parse_instant("--from-event-time", event_text)?,
            last_extracted_at: parse_instant("--from-extracted-at", extracted_text)?,
        })),
        _ => Err(CliError::new(
            "seeded backfill requires both --from-event-time and --from-extracted-at".to_string(),
        )),
    }
}

/// Parses one RFC 3339 CLI instant.
fn parse_instant(flag: &str, text: &str) -> CliResult<EventTime> {
    EventTime::from_rfc3339(text).map_err(|err| CliError::new(format!("{flag}: {err}")))
}

// ============================================================================
// SECTION: Inspection Commands
// ============================================================================

/// Executes the `status` command.
fn command_status(command: &StatusCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.config.as_deref())?;
    let table = SourceTableId::new(command.table.clone());
    let pipeline = build_pipeline(&config, &table)?;
    let report = pipeline
        .status(&table, command.limit)
        .map_err(|err| CliError::new(format!("status failed for {table}: {err}")))?;
    match command.format {
        OutputFormat::Json => emit_json(&report)?,
        OutputFormat::Text => emit_lines(&status_lines(&report))?,
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes the `history` command.
fn command_history(command: &HistoryCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.config.as_deref())?;
    let table = SourceTableId::new(command.table.clone());
    let key = NaturalKey::new(command.key.clone());
    let store = open_store(&config)?;
    let versions = store
        .history(&table, &key)
        .map_err(|err| CliError::new(format!("history failed for {table}: {err}")))?;
    let report = HistoryReport {
        source_table: table,
        natural_key: key,
        versions,
    };
    match command.format {
        OutputFormat::Json => emit_json(&report)?,
        OutputFormat::Text => emit_lines(&history_lines(&report))?,
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes the `verify` command.
///
/// Exits with failure when any table's history violates an invariant.
fn command_verify(command: &VerifyCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.config.as_deref())?;
    let tables = resolve_tables(&config, command.table.as_deref())?;
    let mut clean = true;
    for table in &tables {
        let pipeline = build_pipeline(&config, table)?;
        let report = pipeline
            .verify(table)
            .map_err(|err| CliError::new(format!("verify failed for {table}: {err}")))?;
        clean = clean && report.is_clean();
        match command.format {
            OutputFormat::Json => emit_json(&report)?,
            OutputFormat::Text => emit_lines(&verify_lines(&report))?,
        }
    }
    Ok(if clean { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

// ============================================================================
// SECTION: Rollup Commands
// ============================================================================

/// Dispatches rollup subcommands.
fn command_rollup(command: &RollupCommand) -> CliResult<ExitCode> {
    match command {
        RollupCommand::Rebuild(command) => command_rollup_rebuild(command),
    }
}

/// Executes the `rollup rebuild` command.
fn command_rollup_rebuild(command: &RollupRebuildCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.config.as_deref())?;
    let table = SourceTableId::new(command.table.clone());
    let pipeline = build_pipeline(&config, &table)?;
    let periods = pipeline
        .rebuild_rollups()
        .map_err(|err| CliError::new(format!("rollup rebuild failed for {table}: {err}")))?;
    match command.format {
        OutputFormat::Json => emit_json(&periods)?,
        OutputFormat::Text => {
            let mut lines = vec![format!("rebuilt {} period(s)", periods.len())];
            for period in &periods {
                lines.push(format!("  {period}"));
            }
            emit_lines(&lines)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: &ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(command) => {
            let config = load_config(command.config.config.as_deref())?;
            emit_line(&format!("config ok: {} source(s)", config.sources.len()))?;
            Ok(ExitCode::SUCCESS)
        }
        ConfigCommand::Example => {
            write_stdout(config_toml_example())
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ============================================================================
// SECTION: Wiring
// ============================================================================

/// Loads and validates the configuration file.
fn load_config(path: Option<&Path>) -> CliResult<LedgerConfig> {
    LedgerConfig::load(path).map_err(|err| CliError::new(err.to_string()))
}

/// Opens the configured `SQLite` ledger store.
fn open_store(config: &LedgerConfig) -> CliResult<SqliteLedgerStore> {
    let store_config =
        config.store.to_store_config().map_err(|err| CliError::new(err.to_string()))?;
    SqliteLedgerStore::new(store_config)
        .map_err(|err| CliError::new(format!("cannot open store: {err}")))
}

/// Resolves the tables a command operates on.
fn resolve_tables(config: &LedgerConfig, table: Option<&str>) -> CliResult<Vec<SourceTableId>> {
    if let Some(table) = table {
        return Ok(vec![SourceTableId::new(table)]);
    }
    if config.sources.is_empty() {
        return Err(CliError::new("no sources configured".to_string()));
    }
    Ok(config.sources.iter().map(|entry| SourceTableId::new(entry.table.clone())).collect())
}

/// Builds the change source registry from every `[[sources]]` entry.
fn build_registry(config: &LedgerConfig) -> CliResult<SourceRegistry> {
    let mut registry = SourceRegistry::new();
    for entry in &config.sources {
        let source_table = SourceTableId::new(entry.table.clone());
        let source = JsonlChangeSource::new(source_table.clone(), jsonl_config(entry))
            .map_err(|err| CliError::new(err.to_string()))?;
        registry.register(&source_table, source).map_err(|err| CliError::new(err.to_string()))?;
    }
    Ok(registry)
}

/// Builds the JSONL file settings for one source entry.
fn jsonl_config(entry: &SourceEntry) -> JsonlSourceConfig {
    let mut source_config = JsonlSourceConfig::new(entry.path.clone());
    if let Some(limit) = entry.max_line_bytes {
        source_config.max_line_bytes = limit;
    }
    source_config
}

/// Builds the alert sink selected by the `[alerts]` section.
fn build_alert_sink(config: &LedgerConfig) -> CliResult<CliAlertSink> {
    match config.alerts.kind {
        AlertSinkKind::None => Ok(CliAlertSink::Null(NullAlertSink)),
        AlertSinkKind::Jsonl => {
            let path = config
                .alerts
                .path
                .clone()
                .ok_or_else(|| CliError::new("jsonl alert sink requires a path".to_string()))?;
            Ok(CliAlertSink::Jsonl(JsonlAlertSink::new(path)))
        }
    }
}

/// Builds the rollup hook for one table, when rollups apply to it.
fn rollup_hook(
    config: &LedgerConfig,
    entry: &SourceEntry,
    aggregates: SqliteLedgerStore,
) -> CliResult<Option<RollupRunner<JsonlFactSource, SqliteLedgerStore>>> {
    if !config.rollup.enabled {
        return Ok(None);
    }
    let Some(facts_path) = &entry.facts_path else {
        return Ok(None);
    };
    let mut facts_config = JsonlSourceConfig::new(facts_path.clone());
    if let Some(limit) = entry.max_line_bytes {
        facts_config.max_line_bytes = limit;
    }
    let facts = JsonlFactSource::new(facts_config).map_err(|err| CliError::new(err.to_string()))?;
    Ok(Some(RollupRunner::new(config.rollup.to_rollup_config(), facts, aggregates)))
}

/// Assembles the pipeline serving one table.
fn build_pipeline(config: &LedgerConfig, table: &SourceTableId) -> CliResult<CliPipeline> {
    let entry = config
        .source_for(table.as_str())
        .ok_or_else(|| CliError::new(format!("no source configured for table: {table}")))?;
    let store = open_store(config)?;
    let registry = build_registry(config)?;
    let sink = build_alert_sink(config)?;
    let rollup = rollup_hook(config, entry, store.clone())?;
    Pipeline::new(registry, store.clone(), store, sink, rollup, config.pipeline.to_pipeline_config())
        .map_err(|err| CliError::new(err.to_string()))
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Version history of one natural key.
#[derive(Debug, Serialize)]
struct HistoryReport {
    /// Table the key belongs to.
    source_table: SourceTableId,
    /// Inspected natural key.
    natural_key: NaturalKey,
    /// Versions sorted by `valid_from` ascending.
    versions: Vec<DimensionVersion>,
}

/// Renders one run summary in the requested format.
fn emit_run_summary(summary: &RunSummary, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => emit_json(summary),
        OutputFormat::Text => emit_line(&format!(
            "run {} table={} extracted={} merged={} late={} duration_ms={}",
            summary.run_id,
            summary.source_table,
            summary.records_extracted,
            summary.records_merged,
            summary.late_corrections,
            summary.duration_ms,
        )),
    }
}

/// Renders a status report as text lines.
fn status_lines(report: &StatusReport) -> Vec<String> {
    let mut lines = Vec::new();
    match &report.watermark {
        Some(watermark) => lines.push(format!(
            "{} watermark: event_time={} extracted_at={}",
            report.source_table,
            format_instant(watermark.last_event_time),
            format_instant(watermark.last_extracted_at),
        )),
        None => lines.push(format!("{} watermark: none", report.source_table)),
    }
    for record in &report.recent_runs {
        let mut line = format!(
            "{} {} at {} extracted={} merged={} late={}",
            record.status.label(),
            record.run_id,
            format_instant(record.started_at),
            record.records_extracted,
            record.records_merged,
            record.late_corrections,
        );
        if let Some(message) = &record.message {
            line.push_str(": ");
            line.push_str(message);
        }
        lines.push(line);
    }
    lines
}

/// Renders a verification report as text lines.
fn verify_lines(report: &VerifyReport) -> Vec<String> {
    let mut lines = vec![format!(
        "{}: keys={} versions={} violations={}",
        report.source_table,
        report.keys_checked,
        report.versions_checked,
        report.violations.len(),
    )];
    for violation in &report.violations {
        lines.push(format!("  {violation}"));
    }
    lines
}

/// Renders a history report as text lines.
fn history_lines(report: &HistoryReport) -> Vec<String> {
    if report.versions.is_empty() {
        return vec![format!(
            "no versions for key {} in {}",
            report.natural_key, report.source_table
        )];
    }
    report.versions.iter().map(version_line).collect()
}

/// Renders one dimension version as a text line.
fn version_line(version: &DimensionVersion) -> String {
    let end = version.valid_to.map_or_else(|| "open".to_string(), format_instant);
    let marker = if version.is_current { " (current)" } else { "" };
    let attributes =
        serde_json::to_string(&version.attributes).unwrap_or_else(|_| "{}".to_string());
    format!("[{} .. {end}){marker} {attributes}", format_instant(version.valid_from))
}

/// Formats an instant as RFC 3339, falling back to raw milliseconds.
fn format_instant(instant: EventTime) -> String {
    instant.to_rfc3339().unwrap_or_else(|_| instant.as_unix_millis().to_string())
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Writes a value to stdout as pretty JSON.
fn emit_json<T: Serialize>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("cannot encode output: {err}")))?;
    emit_line(&text)
}

/// Writes one line to stdout.
fn emit_line(message: &str) -> CliResult<()> {
    write_stdout_line(message).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes several lines to stdout.
fn emit_lines(lines: &[String]) -> CliResult<()> {
    for line in lines {
        emit_line(line)?;
    }
    Ok(())
}

/// Writes one line to stdout with a trailing newline.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes text to stdout without adding a newline.
fn write_stdout(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    write!(&mut stdout, "{message}")
}

/// Writes one line to stderr with a trailing newline.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output stream failure.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("cannot write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
