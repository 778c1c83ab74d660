// crates/nutri-probe-cli/src/main.rs
// ============================================================================
// Module: Nutri Probe CLI Entry Point
// Description: Command dispatcher for probe runs, ad-hoc probes, and migrations.
// Purpose: Give operators one binary with one exit-code contract.
// Dependencies: clap, nutri-probe, nutri-probe-migrate, serde, serde_json, toml
// ============================================================================

//! ## Overview
//! `nutri-probe` runs the built-in suites against a Nutri Tracker deployment,
//! sends single ad-hoc probes, checks that login works, and manages the
//! application's `SQLite` schema.
//!
//! Exit codes: `0` when every check passed, `1` when a check failed or a probe
//! hit a network error, `2` for configuration and bootstrap errors.
//! Console output goes through explicit writer helpers; the optional event log
//! carries the structured record.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use nutri_probe::Credentials;
use nutri_probe::Method;
use nutri_probe::ProbeConfig;
use nutri_probe::ProbeRequest;
use nutri_probe::ProbeSession;
use nutri_probe::SuiteRunner;
use nutri_probe::catalog;
use nutri_probe::config::ReportFormat;
use nutri_probe::report::EXIT_FAIL;
use nutri_probe::report::render_json;
use nutri_probe::report::render_text;
use nutri_probe::telemetry::EventOutcome;
use nutri_probe::telemetry::JsonlEventSink;
use nutri_probe::telemetry::ProbeEvent;
use nutri_probe::telemetry::SharedSink;
use nutri_probe::telemetry::noop_sink;
use nutri_probe_migrate::DEFAULT_DB_PATH;
use nutri_probe_migrate::MigrationConfig;
use nutri_probe_migrate::MigrationRunner;
use nutri_probe_migrate::StepOutcome;
use nutri_probe_migrate::builtin_migrations;
use nutri_probe_migrate::select_migrations;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Exit code for configuration and bootstrap errors.
const EXIT_USAGE: u8 = 2;
/// Default number of body characters shown by `probe`.
const DEFAULT_EXCERPT_CHARS: usize = 400;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "nutri-probe", version, disable_help_subcommand = true)]
struct Cli {
    /// Probe configuration file (defaults to `NUTRI_PROBE_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run probe suites and print a report.
    Run(RunCommand),
    /// Built-in suite catalog.
    Suites {
        /// Selected suites subcommand.
        #[command(subcommand)]
        command: SuitesCommand,
    },
    /// Perform only the login bootstrap.
    Login(LoginCommand),
    /// Send one ad-hoc probe.
    Probe(ProbeCommand),
    /// Schema migrations for the application database.
    Migrate {
        /// Selected migrate subcommand.
        #[command(subcommand)]
        command: MigrateCommand,
    },
    /// Write a verified copy of the application database.
    Backup(BackupCommand),
    /// Probe configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Suite catalog subcommands.
#[derive(Subcommand, Debug)]
enum SuitesCommand {
    /// List suite ids, titles, and check counts.
    List,
}

/// Migration subcommands.
#[derive(Subcommand, Debug)]
enum MigrateCommand {
    /// List built-in migrations.
    List,
    /// Show which migrations are present in a database.
    Status(MigrateStatusCommand),
    /// Apply migrations.
    Apply(MigrateApplyCommand),
    /// Describe tables and columns.
    Schema(MigrateSchemaCommand),
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate the configuration.
    Validate,
    /// Print the merged configuration with passwords redacted.
    Show,
}

/// Report formats accepted on the command line.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum FormatArg {
    /// Human-readable text.
    Text,
    /// Machine-readable JSON.
    Json,
}

impl From<FormatArg> for ReportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Text => Self::Text,
            FormatArg::Json => Self::Json,
        }
    }
}

/// Identity used for a login or probe.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum IdentityArg {
    /// Administrator identity.
    Admin,
    /// Regular user identity.
    User,
}

impl IdentityArg {
    /// Returns the label used in messages.
    const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

/// HTTP methods accepted by `probe`.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum MethodArg {
    /// GET.
    Get,
    /// POST.
    Post,
    /// PUT.
    Put,
    /// DELETE.
    Delete,
}

impl From<MethodArg> for Method {
    fn from(value: MethodArg) -> Self {
        match value {
            MethodArg::Get => Self::Get,
            MethodArg::Post => Self::Post,
            MethodArg::Put => Self::Put,
            MethodArg::Delete => Self::Delete,
        }
    }
}

/// Arguments for `run`.
#[derive(Args, Debug)]
struct RunCommand {
    /// Suite to run (repeatable; all suites when omitted).
    #[arg(long = "suite", value_name = "ID")]
    suites: Vec<String>,
    /// Report format (overrides `report.format`).
    #[arg(long, value_enum)]
    format: Option<FormatArg>,
    /// JSON-lines event log (overrides `report.log_path`).
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,
}

/// Arguments for `login`.
#[derive(Args, Debug)]
struct LoginCommand {
    /// Identity to log in as.
    #[arg(long = "as", value_enum, default_value_t = IdentityArg::Admin)]
    identity: IdentityArg,
}

/// Arguments for `probe`.
#[derive(Args, Debug)]
struct ProbeCommand {
    /// HTTP method.
    #[arg(long, value_enum, default_value_t = MethodArg::Get)]
    method: MethodArg,
    /// Route path starting with `/`.
    #[arg(long)]
    path: String,
    /// Identity to log in as first (anonymous when omitted).
    #[arg(long = "as", value_enum)]
    identity: Option<IdentityArg>,
    /// Query parameter as `key=value` (repeatable).
    #[arg(long = "query", value_name = "KEY=VALUE")]
    query: Vec<String>,
    /// Form field as `key=value` (repeatable).
    #[arg(long = "form", value_name = "KEY=VALUE", conflicts_with = "json")]
    form: Vec<String>,
    /// JSON request body.
    #[arg(long, value_name = "BODY")]
    json: Option<String>,
    /// Acceptable status code (repeatable).
    #[arg(long = "expect-status", value_name = "CODE")]
    expect_status: Vec<u16>,
    /// Maximum body characters to print.
    #[arg(long, default_value_t = DEFAULT_EXCERPT_CHARS)]
    excerpt: usize,
}

/// Database location shared by migration commands.
#[derive(Args, Debug, Clone)]
struct DbArgs {
    /// `SQLite` database path.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_DB_PATH)]
    db: PathBuf,
}

/// Arguments for `migrate status`.
#[derive(Args, Debug)]
struct MigrateStatusCommand {
    /// Database location.
    #[command(flatten)]
    location: DbArgs,
    /// Output format.
    #[arg(long, value_enum, default_value_t = FormatArg::Text)]
    format: FormatArg,
}

/// Arguments for `migrate apply`.
#[derive(Args, Debug)]
struct MigrateApplyCommand {
    /// Database location.
    #[command(flatten)]
    location: DbArgs,
    /// Migration to apply (repeatable; all when omitted).
    #[arg(long = "only", value_name = "ID")]
    only: Vec<String>,
    /// Write a verified backup here before applying anything.
    #[arg(long, value_name = "PATH")]
    backup: Option<PathBuf>,
    /// JSON-lines event log.
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,
}

/// Arguments for `migrate schema`.
#[derive(Args, Debug)]
struct MigrateSchemaCommand {
    /// Database location.
    #[command(flatten)]
    location: DbArgs,
    /// Table to describe (lists tables when omitted).
    #[arg(long)]
    table: Option<String>,
}

/// Arguments for `backup`.
#[derive(Args, Debug)]
struct BackupCommand {
    /// Database location.
    #[command(flatten)]
    location: DbArgs,
    /// Destination file; must not exist.
    #[arg(long, value_name = "PATH")]
    out: PathBuf,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error carrying a printable message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
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
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Run(command) => command_run(config_path, &command),
        Commands::Suites {
            command: SuitesCommand::List,
        } => command_suites_list(config_path),
        Commands::Login(command) => command_login(config_path, &command),
        Commands::Probe(command) => command_probe(config_path, &command),
        Commands::Migrate {
            command,
        } => command_migrate(command),
        Commands::Backup(command) => command_backup(&command),
        Commands::Config {
            command,
        } => command_config(config_path, &command),
    }
}

// ============================================================================
// SECTION: Run Commands
// ============================================================================

/// Executes `run`.
fn command_run(config_path: Option<&Path>, command: &RunCommand) -> CliResult<ExitCode> {
    let config = load_config(config_path)?;
    let ids = resolve_suite_ids(&command.suites)?;
    let suites: Vec<_> = ids.iter().filter_map(|id| catalog::build(id, &config)).collect();
    let log_path = command.log.clone().or_else(|| config.report.log_path.clone());
    let sink = open_sink(log_path.as_deref())?;
    let format = command.format.map_or(config.report.format, ReportFormat::from);

    let mut runner = SuiteRunner::new(Arc::new(config), sink);
    let report = runner.run_all(&suites);
    let mut stdout = std::io::stdout().lock();
    match format {
        ReportFormat::Text => render_text(&report, &mut stdout),
        ReportFormat::Json => render_json(&report, &mut stdout),
    }
    .map_err(|err| CliError::new(err.to_string()))?;
    Ok(ExitCode::from(report.exit_status()))
}

/// Validates requested suite ids, returning all ids when none are given.
///
/// Repeated ids are kept once, at their first position.
fn resolve_suite_ids(requested: &[String]) -> CliResult<Vec<String>> {
    let known = catalog::suite_ids();
    if requested.is_empty() {
        return Ok(known.iter().map(ToString::to_string).collect());
    }
    let mut resolved: Vec<String> = Vec::with_capacity(requested.len());
    for id in requested {
        if !known.contains(&id.as_str()) {
            return Err(CliError::new(format!(
                "unknown suite {id:?} (known: {})",
                known.join(", ")
            )));
        }
        if !resolved.contains(id) {
            resolved.push(id.clone());
        }
    }
    Ok(resolved)
}

/// Executes `suites list`.
fn command_suites_list(config_path: Option<&Path>) -> CliResult<ExitCode> {
    let config = load_config(config_path)?;
    for suite in catalog::build_all(&config) {
        write_stdout(&format!("{:<14} {} ({} checks)", suite.id, suite.title, suite.checks.len()))?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes `login`.
fn command_login(config_path: Option<&Path>, command: &LoginCommand) -> CliResult<ExitCode> {
    let config = Arc::new(load_config(config_path)?);
    let credentials = identity_credentials(&config, command.identity)?;
    let sink = open_sink(config.report.log_path.as_deref())?;
    match ProbeSession::login(Arc::clone(&config), &credentials, sink.as_ref()) {
        Ok((session, outcome)) => {
            write_stdout(&format!("✅ logged in as {}", credentials.username))?;
            write_stdout(&format!("status: {}", outcome.status))?;
            write_stdout(&format!("location: {}", outcome.location.as_deref().unwrap_or("-")))?;
            write_stdout(&format!(
                "token: {}",
                outcome.token_preview.as_deref().unwrap_or("(not found)")
            ))?;
            write_stdout(&format!("landing verified: {}", yes_no(outcome.landing_verified)))?;
            write_stdout(&format!("session cookie: {}", yes_no(session.has_cookies())))?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            write_stderr(&format!("❌ login as {} failed: {err}", credentials.username))?;
            Ok(ExitCode::from(EXIT_FAIL))
        }
    }
}

/// Executes `probe`.
fn command_probe(config_path: Option<&Path>, command: &ProbeCommand) -> CliResult<ExitCode> {
    let request = build_probe_request(command)?;
    let config = Arc::new(load_config(config_path)?);
    let sink = open_sink(config.report.log_path.as_deref())?;
    let session = match command.identity {
        None => ProbeSession::anonymous(Arc::clone(&config))
            .map_err(|err| CliError::new(err.to_string()))?,
        Some(identity) => {
            let credentials = identity_credentials(&config, identity)?;
            match ProbeSession::login(Arc::clone(&config), &credentials, sink.as_ref()) {
                Ok((session, _)) => session,
                Err(err) => {
                    write_stderr(&format!("❌ login as {} failed: {err}", credentials.username))?;
                    return Ok(ExitCode::from(EXIT_FAIL));
                }
            }
        }
    };

    let response = match session.send(&request, sink.as_ref()) {
        Ok(response) => response,
        Err(err) => {
            write_stderr(&format!("💥 probe failed ({}): {err}", err.kind()))?;
            return Ok(ExitCode::from(EXIT_FAIL));
        }
    };
    write_stdout(&format!("{} {} -> {}", request.method, response.url, response.status))?;
    if let Some(location) = response.location() {
        write_stdout(&format!("location: {location}"))?;
    }
    write_stdout(&format!("content-type: {}", response.content_type().unwrap_or("-")))?;
    write_stdout(&format!("elapsed: {} ms", response.elapsed.as_millis()))?;
    if command.excerpt > 0 && !response.body.is_empty() {
        write_stdout("")?;
        write_stdout(&response.excerpt(command.excerpt))?;
    }
    if !command.expect_status.is_empty() && !command.expect_status.contains(&response.status) {
        write_stderr(&format!(
            "❌ expected status {}, got {}",
            join_codes(&command.expect_status),
            response.status
        ))?;
        return Ok(ExitCode::from(EXIT_FAIL));
    }
    Ok(ExitCode::SUCCESS)
}

/// Builds the request described by `probe` arguments.
fn build_probe_request(command: &ProbeCommand) -> CliResult<ProbeRequest> {
    if !command.path.starts_with('/') {
        return Err(CliError::new(format!("--path must start with '/': {}", command.path)));
    }
    let mut request = ProbeRequest::new(command.method.into(), command.path.clone());
    for raw in &command.query {
        let (key, value) = parse_pair(raw)?;
        request = request.query(key, value);
    }
    if !command.form.is_empty() {
        let pairs = command.form.iter().map(|raw| parse_pair(raw)).collect::<CliResult<_>>()?;
        request = request.form(pairs);
    }
    if let Some(body) = &command.json {
        let value: Value = serde_json::from_str(body)
            .map_err(|err| CliError::new(format!("--json is not valid JSON: {err}")))?;
        request = request.json(value);
    }
    Ok(request)
}

/// Splits `key=value`; the key must be non-empty.
fn parse_pair(raw: &str) -> CliResult<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(CliError::new(format!("expected KEY=VALUE, got {raw:?}"))),
    }
}

/// Joins status codes for messages.
fn join_codes(codes: &[u16]) -> String {
    codes.iter().map(u16::to_string).collect::<Vec<_>>().join(" or ")
}

/// Renders a flag as `yes` or `no`.
const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Returns the configured credentials for an identity.
fn identity_credentials(config: &ProbeConfig, identity: IdentityArg) -> CliResult<Credentials> {
    let credentials = match identity {
        IdentityArg::Admin => config.credentials.admin.clone(),
        IdentityArg::User => config.credentials.user.clone(),
    };
    credentials.ok_or_else(|| {
        CliError::new(format!("no {} credentials configured", identity.as_str()))
    })
}

// ============================================================================
// SECTION: Migration Commands
// ============================================================================

/// Status line for `migrate status`.
#[derive(Debug, Serialize)]
struct MigrationStatusRow {
    /// Migration identifier.
    id: &'static str,
    /// Observed status label.
    status: &'static str,
    /// Migration summary.
    description: &'static str,
}

/// Dispatches migrate subcommands.
fn command_migrate(command: MigrateCommand) -> CliResult<ExitCode> {
    match command {
        MigrateCommand::List => command_migrate_list(),
        MigrateCommand::Status(command) => command_migrate_status(&command),
        MigrateCommand::Apply(command) => command_migrate_apply(&command),
        MigrateCommand::Schema(command) => command_migrate_schema(&command),
    }
}

/// Executes `migrate list`.
fn command_migrate_list() -> CliResult<ExitCode> {
    for migration in builtin_migrations() {
        write_stdout(&format!(
            "{:<26} {} ({} steps)",
            migration.id,
            migration.description,
            migration.steps.len()
        ))?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes `migrate status`.
fn command_migrate_status(command: &MigrateStatusCommand) -> CliResult<ExitCode> {
    let runner = open_runner(&command.location)?;
    let mut rows = Vec::new();
    for migration in builtin_migrations() {
        let status = runner.status(&migration).map_err(|err| CliError::new(err.to_string()))?;
        rows.push(MigrationStatusRow {
            id: migration.id,
            status: status.as_str(),
            description: migration.description,
        });
    }
    match command.format {
        FormatArg::Json => {
            let text = serde_json::to_string_pretty(&rows)
                .map_err(|err| CliError::new(err.to_string()))?;
            write_stdout(&text)?;
        }
        FormatArg::Text => {
            for row in &rows {
                write_stdout(&format!("{:<15} {:<26} {}", row.status, row.id, row.description))?;
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes `migrate apply`.
fn command_migrate_apply(command: &MigrateApplyCommand) -> CliResult<ExitCode> {
    let migrations =
        select_migrations(&command.only).map_err(|err| CliError::new(err.to_string()))?;
    let sink = open_sink(command.log.as_deref())?;
    let mut runner = open_runner(&command.location)?;
    if let Some(dest) = &command.backup {
        let backup = runner.backup_to(dest).map_err(|err| CliError::new(err.to_string()))?;
        write_stdout(&format!(
            "💾 backup written to {} ({} bytes)",
            dest.display(),
            backup.bytes
        ))?;
    }
    for migration in &migrations {
        match runner.apply(migration) {
            Ok(report) => {
                record_event(&sink, &ProbeEvent::Migration {
                    id: report.id.clone(),
                    applied: report.applied(),
                    skipped: report.skipped(),
                    outcome: EventOutcome::Ok,
                });
                write_stdout(&format!(
                    "✅ {}: {} applied, {} skipped",
                    report.id,
                    report.applied(),
                    report.skipped()
                ))?;
                for step in &report.steps {
                    let outcome = match step.outcome {
                        StepOutcome::Applied => "applied",
                        StepOutcome::Skipped => "skipped",
                    };
                    write_stdout(&format!(
                        "   {outcome:<8} {} ({} rows)",
                        step.label, step.rows_updated
                    ))?;
                }
            }
            Err(err) => {
                record_event(&sink, &ProbeEvent::Migration {
                    id: migration.id.to_string(),
                    applied: 0,
                    skipped: 0,
                    outcome: EventOutcome::Error,
                });
                return Err(CliError::new(format!("migration {} failed: {err}", migration.id)));
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes `migrate schema`.
fn command_migrate_schema(command: &MigrateSchemaCommand) -> CliResult<ExitCode> {
    let runner = open_runner(&command.location)?;
    let Some(table) = &command.table else {
        for name in runner.table_names().map_err(|err| CliError::new(err.to_string()))? {
            write_stdout(&name)?;
        }
        return Ok(ExitCode::SUCCESS);
    };
    let columns = runner.table_columns(table).map_err(|err| CliError::new(err.to_string()))?;
    write_stdout(&format!(
        "{:<4} {:<28} {:<14} {:<8} {:<16} pk",
        "cid", "name", "type", "notnull", "default"
    ))?;
    for column in columns {
        write_stdout(&format!(
            "{:<4} {:<28} {:<14} {:<8} {:<16} {}",
            column.cid,
            column.name,
            column.decl_type,
            yes_no(column.not_null),
            column.default_value.as_deref().unwrap_or("-"),
            column.primary_key
        ))?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes `backup`.
fn command_backup(command: &BackupCommand) -> CliResult<ExitCode> {
    let runner = open_runner(&command.location)?;
    let report = runner.backup_to(&command.out).map_err(|err| CliError::new(err.to_string()))?;
    write_stdout(&format!(
        "💾 backup written to {} ({} bytes, {} tables, {} users)",
        report.path.display(),
        report.bytes,
        report.tables.len(),
        report.users
    ))?;
    Ok(ExitCode::SUCCESS)
}

/// Opens a migration runner for an existing database.
fn open_runner(location: &DbArgs) -> CliResult<MigrationRunner> {
    MigrationRunner::open(MigrationConfig::for_path(&location.db))
        .map_err(|err| CliError::new(err.to_string()))
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Executes config subcommands.
fn command_config(config_path: Option<&Path>, command: &ConfigCommand) -> CliResult<ExitCode> {
    let config = load_config(config_path)?;
    match command {
        ConfigCommand::Validate => {
            write_stdout(&format!("✅ config ok: target {}", config.target.base_url))?;
        }
        ConfigCommand::Show => {
            let text = toml::to_string_pretty(&config.redacted())
                .map_err(|err| CliError::new(format!("failed to render config: {err}")))?;
            write_stdout(text.trim_end())?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Loads and validates the probe configuration.
fn load_config(path: Option<&Path>) -> CliResult<ProbeConfig> {
    ProbeConfig::load(path).map_err(|err| CliError::new(err.to_string()))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Opens the JSON-lines event sink, or a no-op sink without a path.
fn open_sink(path: Option<&Path>) -> CliResult<SharedSink> {
    let Some(path) = path else {
        return Ok(noop_sink());
    };
    let file = File::create(path).map_err(|err| {
        CliError::new(format!("failed to open event log {}: {err}", path.display()))
    })?;
    Ok(Arc::new(JsonlEventSink::new(file)))
}

/// Records an event, warning on stderr when the log cannot be written.
fn record_event(sink: &SharedSink, event: &ProbeEvent) {
    if let Err(err) = sink.record(event) {
        let _ = write_stderr_line(&format!("warning: {err}"));
    }
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Writes one line to stdout.
fn write_stdout(message: &str) -> CliResult<()> {
    write_stdout_line(message).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes one line to stderr.
fn write_stderr(message: &str) -> CliResult<()> {
    write_stderr_line(message).map_err(|err| CliError::new(output_error("stderr", &err)))
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message and returns the usage exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(&format!("error: {message}"));
    ExitCode::from(EXIT_USAGE)
}
