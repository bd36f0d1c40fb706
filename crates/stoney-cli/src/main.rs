// crates/stoney-cli/src/main.rs
// ============================================================================
// Module: Stoney CLI Entry Point
// Description: Command dispatcher for suite parsing and contract runs.
// Purpose: Load suites from files and issues, run them, and report for CI.
// Dependencies: clap, glob, serde_json, stoney-config, stoney-core,
//               stoney-issues, stoney-runners, thiserror, tokio
// ============================================================================

//! ## Overview
//! `stoney parse` loads one suite file and re-emits the normalized document
//! as JSON. `stoney run` loads suites from a file glob and/or issue keys,
//! executes the selected scenarios, prints a console summary, and writes the
//! JSON report. Exit codes: `0` all passed, `1` scenario failures or load
//! errors, `2` configuration errors. Ctrl-C cancels the run; the partial
//! report is still written.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use stoney_cli::t;
use stoney_config::ConfigError;
use stoney_config::EventSinkKind;
use stoney_config::StoneyConfig;
use stoney_config::config::BASE_URL_ENV;
use stoney_core::EnvLookup;
use stoney_core::ProcessEnv;
use stoney_core::RunReport;
use stoney_core::ScenarioFilter;
use stoney_core::load_suite_file;
use stoney_issues::IssueClient;
use stoney_issues::IssueError;
use stoney_issues::IssueTrackerConfig;
use stoney_issues::client::TOKEN_ENV;
use stoney_issues::load_suite_from_issue;
use stoney_runners::CancelHandle;
use stoney_runners::FileEventSink;
use stoney_runners::LoadedSuite;
use stoney_runners::NoopEventSink;
use stoney_runners::RunEventSink;
use stoney_runners::RunOptions;
use stoney_runners::RunnerDefaults;
use stoney_runners::StderrEventSink;
use stoney_runners::StepContext;
use stoney_runners::StepRunners;
use stoney_runners::run_suites;
use stoney_runners::selection_needs_base_url;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Exit code for scenario failures and load errors.
const EXIT_FAILURE: u8 = 1;
/// Exit code for configuration errors.
const EXIT_CONFIG: u8 = 2;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "stoney", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Configuration file (overrides `STONEY_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Load a suite file and print the normalized document.
    Parse(ParseCommand),
    /// Run suites and write a report.
    Run(RunCommand),
}

/// Arguments for the `parse` command.
#[derive(Args, Debug)]
struct ParseCommand {
    /// Suite file (`.yaml`, `.yml`, or `.json`).
    #[arg(value_name = "FILE")]
    file: PathBuf,
    /// Pretty-print the JSON output.
    #[arg(long, action = ArgAction::SetTrue)]
    pretty: bool,
}

/// Arguments for the `run` command.
#[derive(Args, Debug)]
struct RunCommand {
    /// Glob selecting suite files.
    #[arg(long, value_name = "GLOB")]
    suite: Option<String>,
    /// Issue keys whose descriptions embed a suite.
    #[arg(long = "issue", value_name = "KEY")]
    issues: Vec<String>,
    /// Target base URL (overrides config and `STONEY_BASE_URL`).
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,
    /// Report output path.
    #[arg(long, value_name = "PATH", default_value = "stoney-report.json")]
    report: PathBuf,
    /// Only run the contract with this name.
    #[arg(long, value_name = "NAME")]
    only_contract: Option<String>,
    /// Only run scenarios with this id.
    #[arg(long, value_name = "ID")]
    only_scenario: Option<String>,
    /// Stop remaining steps and scenarios after the first failure.
    #[arg(long, action = ArgAction::SetTrue)]
    fail_fast: bool,
    /// Stop a scenario's remaining steps after its first failure.
    #[arg(long, action = ArgAction::SetTrue)]
    fail_fast_steps: bool,
    /// Event sink (overrides config and `STONEY_EVENTS`).
    #[arg(long, value_enum, value_name = "SINK")]
    events: Option<EventsArg>,
    /// Event file path for the `file` sink.
    #[arg(long, value_name = "PATH")]
    events_path: Option<PathBuf>,
}

/// Event sink selection flag.
#[derive(ValueEnum, Clone, Copy, Debug)]
enum EventsArg {
    /// Discard events.
    None,
    /// JSON lines on stderr.
    Stderr,
    /// JSON lines appended to a file.
    File,
}

impl From<EventsArg> for EventSinkKind {
    fn from(value: EventsArg) -> Self {
        match value {
            EventsArg::None => Self::None,
            EventsArg::Stderr => Self::Stderr,
            EventsArg::File => Self::File,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error carrying a rendered message and the process exit code.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
    /// Exit code reported for this error.
    code: u8,
}

impl CliError {
    /// Constructs a run or load failure.
    const fn new(message: String) -> Self {
        Self {
            message,
            code: EXIT_FAILURE,
        }
    }

    /// Constructs a configuration error.
    const fn config(message: String) -> Self {
        Self {
            message,
            code: EXIT_CONFIG,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&t!("main.version", version = version))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Parse(command) => command_parse(&command),
        Commands::Run(command) => command_run(command, cli.config.as_deref()).await,
    }
}

/// Prints top-level help.
fn show_help() -> CliResult<()> {
    let help = Cli::command().render_help().to_string();
    write_stdout_line(&help).map_err(|err| CliError::new(output_error("stdout", &err)))
}

// ============================================================================
// SECTION: Parse Command
// ============================================================================

/// Executes the `parse` command.
fn command_parse(command: &ParseCommand) -> CliResult<ExitCode> {
    let suite = load_suite_file(&command.file, &ProcessEnv).map_err(|err| {
        CliError::new(t!("parse.load_failed", path = command.file.display(), error = err))
    })?;
    let rendered = if command.pretty {
        serde_json::to_string_pretty(&suite)
    } else {
        serde_json::to_string(&suite)
    }
    .map_err(|err| CliError::new(t!("parse.serialize_failed", error = err)))?;
    write_stdout_line(&rendered).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Run Command
// ============================================================================

/// Executes the `run` command.
async fn command_run(command: RunCommand, config_path: Option<&Path>) -> CliResult<ExitCode> {
    let mut config =
        StoneyConfig::load_unvalidated(config_path, &ProcessEnv).map_err(config_error)?;
    apply_run_overrides(&mut config, &command);
    config.validate().map_err(config_error)?;

    let defaults = runner_defaults(&config);
    let suites = load_suites(&command, &config, &defaults).await?;
    let options = RunOptions {
        fail_fast_steps: command.fail_fast || command.fail_fast_steps,
        fail_fast_run: command.fail_fast,
        filter: ScenarioFilter {
            contract: command.only_contract.clone(),
            scenario: command.only_scenario.clone(),
        },
    };
    let base_url = config.runner.base_url.clone();
    if base_url.is_none() && selection_needs_base_url(&suites, &options.filter) {
        return Err(CliError::config(t!("run.base_url_required", env = BASE_URL_ENV)));
    }

    let events = open_event_sink(&config)?;
    let runners = StepRunners::new(base_url.clone(), Arc::new(ProcessEnv))
        .map_err(|err| CliError::new(t!("run.runner_failed", error = err)))?;
    let cancel = CancelHandle::new();
    let signal = cancel.signal();
    spawn_interrupt_listener(cancel);

    let target = base_url.as_deref().map_or_else(|| t!("run.base_url.none"), str::to_string);
    write_stdout_line(&t!("run.header", suites = suites.len(), base_url = target))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;

    let ctx = StepContext {
        defaults: &defaults,
        cancel: &signal,
        events: events.as_ref(),
    };
    let report = run_suites(&runners, &suites, &options, base_url, &ctx).await;
    let cancelled = signal.is_cancelled();

    print_report(&report)?;
    if cancelled {
        write_stdout_line(&t!("run.cancelled"))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }
    write_report(&command.report, &report)?;

    if report.ok && !cancelled { Ok(ExitCode::SUCCESS) } else { Ok(ExitCode::from(EXIT_FAILURE)) }
}

/// Applies CLI flag overrides on top of file and env configuration.
fn apply_run_overrides(config: &mut StoneyConfig, command: &RunCommand) {
    if let Some(base_url) = &command.base_url {
        config.runner.base_url = Some(base_url.clone());
    }
    if let Some(sink) = command.events {
        config.events.sink = sink.into();
    }
    if let Some(path) = &command.events_path {
        config.events.path = Some(path.clone());
    }
}

/// Converts runner configuration into step defaults.
const fn runner_defaults(config: &StoneyConfig) -> RunnerDefaults {
    RunnerDefaults {
        timeout: Duration::from_millis(config.runner.timeout_ms),
        http_retries: config.runner.retries,
        backoff: Duration::from_millis(config.runner.backoff_ms),
    }
}

/// Loads suites from the file glob, then from issue keys, in that order.
async fn load_suites(
    command: &RunCommand,
    config: &StoneyConfig,
    defaults: &RunnerDefaults,
) -> CliResult<Vec<LoadedSuite>> {
    let paths = match &command.suite {
        Some(pattern) => expand_suite_glob(pattern)?,
        None => Vec::new(),
    };
    if paths.is_empty() && command.issues.is_empty() {
        let message = command.suite.as_deref().map_or_else(
            || t!("run.no_source"),
            |pattern| t!("run.no_suites", pattern = pattern),
        );
        return Err(CliError::config(message));
    }

    let mut suites = Vec::with_capacity(paths.len() + command.issues.len());
    for path in paths {
        let document = load_suite_file(&path, &ProcessEnv).map_err(|err| {
            CliError::new(t!("run.suite_load_failed", path = path.display(), error = err))
        })?;
        suites.push(LoadedSuite {
            source: path.display().to_string(),
            document,
        });
    }

    if command.issues.is_empty() {
        return Ok(suites);
    }
    let client = issue_client(config, defaults.timeout).map_err(|err| {
        CliError::new(t!("run.issue_load_failed", key = command.issues.join(", "), error = err))
    })?;
    for key in &command.issues {
        let document = load_suite_from_issue(&client, key, &ProcessEnv)
            .await
            .map_err(|err| CliError::new(t!("run.issue_load_failed", key = key, error = err)))?;
        suites.push(LoadedSuite {
            source: format!("issue:{key}"),
            document,
        });
    }
    Ok(suites)
}

/// Expands the suite glob into existing files in sorted order.
fn expand_suite_glob(pattern: &str) -> CliResult<Vec<PathBuf>> {
    let entries = glob::glob(pattern).map_err(|err| {
        CliError::config(t!("run.glob_invalid", pattern = pattern, error = err))
    })?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|err| CliError::new(t!("run.glob_read_failed", error = err)))?;
        if path.is_file() {
            paths.push(path);
        }
    }
    Ok(paths)
}

/// Builds the issue tracker client; the credential is env-only.
fn issue_client(config: &StoneyConfig, timeout: Duration) -> Result<IssueClient, IssueError> {
    let settings = IssueTrackerConfig::new(
        config.issue_tracker.base_url.clone(),
        config.issue_tracker.email.clone(),
        ProcessEnv.var(TOKEN_ENV),
    )?;
    IssueClient::new(settings, timeout)
}

/// Opens the configured event sink.
fn open_event_sink(config: &StoneyConfig) -> CliResult<Box<dyn RunEventSink>> {
    match (config.events.sink, &config.events.path) {
        (EventSinkKind::None, _) => Ok(Box::new(NoopEventSink)),
        (EventSinkKind::Stderr, _) => Ok(Box::new(StderrEventSink)),
        (EventSinkKind::File, Some(path)) => match FileEventSink::new(path) {
            Ok(sink) => Ok(Box::new(sink)),
            Err(err) => Err(CliError::config(t!(
                "run.events_open_failed",
                path = path.display(),
                error = err
            ))),
        },
        (EventSinkKind::File, None) => Err(CliError::config(t!("run.events_path_required"))),
    }
}

/// Cancels the run on the first Ctrl-C.
fn spawn_interrupt_listener(cancel: CancelHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = write_stderr_line(&t!("run.interrupt"));
            cancel.cancel();
        }
    });
}

// ============================================================================
// SECTION: Report Output
// ============================================================================

/// Prints one line per scenario, failure notes, and the summary.
fn print_report(report: &RunReport) -> CliResult<()> {
    let mut output = String::new();
    for entry in &report.results {
        let result = &entry.result;
        let status = result
            .status
            .map_or_else(String::new, |status| t!("run.scenario.status", status = status));
        let line = if result.ok {
            t!(
                "run.scenario.pass",
                suite = entry.suite,
                contract = entry.contract,
                id = result.id,
                status = status
            )
        } else {
            t!(
                "run.scenario.fail",
                suite = entry.suite,
                contract = entry.contract,
                id = result.id,
                status = status
            )
        };
        output.push_str(&line);
        output.push('\n');
        if !result.ok {
            for note in &result.notes {
                output.push_str(&t!("run.scenario.note", note = note));
                output.push('\n');
            }
        }
    }
    output.push_str(&t!(
        "run.summary",
        passed = report.passed,
        failed = report.failed,
        total = report.total
    ));
    output.push('\n');
    write_stdout_bytes(output.as_bytes()).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes the JSON report, creating parent directories as needed.
fn write_report(path: &Path, report: &RunReport) -> CliResult<()> {
    let write_failed = |err: std::io::Error| {
        CliError::new(t!("run.report.write_failed", path = path.display(), error = err))
    };
    let mut bytes = serde_json::to_vec_pretty(report)
        .map_err(|err| CliError::new(t!("run.report.serialize_failed", error = err)))?;
    bytes.push(b'\n');
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_failed)?;
    }
    fs::write(path, bytes).map_err(write_failed)?;
    write_stdout_line(&t!("run.report.written", path = path.display()))
        .map_err(|err| CliError::new(output_error("stdout", &err)))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Maps a configuration error to an exit-code-2 CLI error.
fn config_error(err: ConfigError) -> CliError {
    CliError::config(t!("config.load_failed", error = err))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes raw bytes to stdout without adding a newline.
fn write_stdout_bytes(bytes: &[u8]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(bytes)
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    let stream_label = match stream {
        "stdout" => t!("output.stream.stdout"),
        "stderr" => t!("output.stream.stderr"),
        _ => t!("output.stream.unknown"),
    };
    t!("output.write_failed", stream = stream_label, error = error)
}

/// Emits an error message to stderr and returns its exit code.
fn emit_error(err: &CliError) -> ExitCode {
    let _ = write_stderr_line(&err.message);
    ExitCode::from(err.code)
}
