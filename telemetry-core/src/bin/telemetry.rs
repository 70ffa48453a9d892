//! Telemetry CLI - emit, inspect and summarize JSONL telemetry
//!
//! Usage:
//!     telemetry emit W_EVALUATION_TICK '{"value":0.25}' --session demo
//!     telemetry summarize ProtocolPsiTelemetry/*.jsonl --write-report
//!     telemetry contract --json
//!
//! Diagnostics go to stderr; set `RUST_LOG` to adjust verbosity.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use telemetry_core::analysis;
use telemetry_core::contract::{ContractLoader, LoadedContract};
use telemetry_core::{
    EmitOutcome, Emitter, EmptyContractPolicy, LogSummary, TelemetryConfig, TelemetryError,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "telemetry")]
#[command(about = "Contract-validated JSONL telemetry")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Append one event to the session log
    Emit {
        /// Event name
        event: String,

        /// JSON object payload (anything else is recorded as {})
        payload: Option<String>,

        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output root directory
        #[arg(long)]
        output_root: Option<PathBuf>,

        /// Subfolder below the output root
        #[arg(long)]
        subfolder: Option<String>,

        /// Contract document (default: discovered)
        #[arg(short, long)]
        contract: Option<PathBuf>,

        /// Session id
        #[arg(long)]
        session: Option<String>,

        /// Do not validate event names
        #[arg(long)]
        no_validate: bool,

        /// Reject everything when the contract declares no events
        #[arg(long)]
        fail_closed: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize one or more JSONL logs
    Summarize {
        /// Log files or glob patterns
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Write report_<session>.json next to each input
        #[arg(long)]
        write_report: bool,

        /// Contract to check event names against
        #[arg(short, long)]
        contract: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a contract: version, events, cadence and findings
    Contract {
        /// Contract document (default: discovered)
        path: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "telemetry_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Emit {
            event,
            payload,
            config,
            output_root,
            subfolder,
            contract,
            session,
            no_validate,
            fail_closed,
            json,
        } => {
            let overrides = EmitOverrides {
                output_root,
                subfolder,
                contract,
                session,
                no_validate,
                fail_closed,
            };
            run_emit(&event, payload.as_deref(), config.as_deref(), overrides, json)
        }
        Command::Summarize {
            inputs,
            write_report,
            contract,
            json,
        } => run_summarize(&inputs, write_report, contract.as_deref(), json),
        Command::Contract { path, json } => run_contract(path.as_deref(), json),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Search roots tried when no contract is given
fn default_loader() -> ContractLoader {
    ContractLoader::new()
        .with_search_path(".")
        .with_search_path("..")
        .with_search_path("../..")
}

fn print_json<T: Serialize>(value: &T) -> Result<(), TelemetryError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// emit
// ═══════════════════════════════════════════════════════════════════════════

struct EmitOverrides {
    output_root: Option<PathBuf>,
    subfolder: Option<String>,
    contract: Option<PathBuf>,
    session: Option<String>,
    no_validate: bool,
    fail_closed: bool,
}

fn build_config(
    config_path: Option<&Path>,
    overrides: EmitOverrides,
) -> Result<TelemetryConfig, TelemetryError> {
    let mut config = match config_path {
        Some(path) => TelemetryConfig::from_file(path)?,
        None => TelemetryConfig::default(),
    }
    .with_env_overrides();

    if let Some(root) = overrides.output_root {
        config = config.with_output_root(root);
    }
    if let Some(subfolder) = overrides.subfolder {
        config = config.with_output_subfolder(subfolder);
    }
    if let Some(session) = overrides.session {
        config = config.with_session_override(session);
    }
    if overrides.no_validate {
        config = config.with_validation(false);
    }
    if overrides.fail_closed {
        config = config.with_empty_contract_policy(EmptyContractPolicy::FailClosed);
    }

    match overrides.contract {
        Some(path) => config = config.with_contract_path(path),
        None if config.contract_path.is_none() => {
            if let Some(found) = default_loader().discover() {
                tracing::debug!(contract = %found.display(), "Using discovered contract");
                config = config.with_contract_path(found);
            }
        }
        None => {}
    }

    Ok(config)
}

fn run_emit(
    event: &str,
    payload: Option<&str>,
    config_path: Option<&Path>,
    overrides: EmitOverrides,
    json: bool,
) -> Result<ExitCode, TelemetryError> {
    #[derive(Serialize)]
    struct JsonOutput<'a> {
        written: bool,
        session_id: &'a str,
        output_path: Option<String>,
        error: Option<telemetry_core::ErrorDetail>,
    }

    let config = build_config(config_path, overrides)?;
    let emitter = Emitter::ready(config);
    let outcome = emitter.emit(event, payload);
    emitter.close()?;

    let session_id = emitter.session_id().unwrap_or_default();
    let output_path = emitter.output_path().map(|p| p.display().to_string());

    if json {
        print_json(&JsonOutput {
            written: outcome.is_written(),
            session_id,
            output_path,
            error: outcome.error().map(|e| e.to_error_response().error),
        })?;
    } else {
        match &outcome {
            EmitOutcome::Written { line_bytes } => println!(
                "Wrote {} bytes to {}",
                line_bytes,
                output_path.as_deref().unwrap_or("<sink>")
            ),
            EmitOutcome::Dropped(e) => eprintln!("Dropped [{}]: {}", e.error_code(), e),
        }
    }

    Ok(if outcome.is_written() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// summarize
// ═══════════════════════════════════════════════════════════════════════════

/// Expand glob patterns; plain paths pass through unchanged
fn expand_inputs(inputs: &[String]) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for input in inputs {
        match glob::glob(input) {
            Ok(matches) => {
                let found: Vec<PathBuf> = matches.filter_map(|m| m.ok()).collect();
                if found.is_empty() {
                    paths.push(PathBuf::from(input));
                } else {
                    paths.extend(found);
                }
            }
            Err(_) => paths.push(PathBuf::from(input)),
        }
    }
    paths
}

fn run_summarize(
    inputs: &[String],
    write_report: bool,
    contract: Option<&Path>,
    json: bool,
) -> Result<ExitCode, TelemetryError> {
    #[derive(Serialize)]
    struct JsonEntry {
        input: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        summary: Option<LogSummary>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        unknown_events: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        report: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<telemetry_core::ErrorDetail>,
    }

    let allowed = match contract {
        Some(path) => Some(telemetry_core::contract::load(path)?.allowed),
        None => None,
    };

    let mut entries = Vec::new();
    let mut failed = false;

    for input in expand_inputs(inputs) {
        let mut entry = JsonEntry {
            input: input.display().to_string(),
            summary: None,
            unknown_events: Vec::new(),
            report: None,
            error: None,
        };

        match analysis::summarize_file(&input) {
            Ok(summary) => {
                if let Some(allowed) = &allowed {
                    entry.unknown_events = summary.unknown_events(allowed);
                }
                if write_report {
                    match summary.write_report(&input) {
                        Ok(path) => entry.report = Some(path.display().to_string()),
                        Err(e) => {
                            failed = true;
                            entry.error = Some(e.to_error_response().error);
                        }
                    }
                }
                entry.summary = Some(summary);
            }
            Err(e) => {
                failed = true;
                entry.error = Some(e.to_error_response().error);
            }
        }
        entries.push(entry);
    }

    if json {
        print_json(&entries)?;
    } else {
        for entry in &entries {
            println!("{}", entry.input);
            if let Some(error) = &entry.error {
                println!("  error: [{}] {}", error.code, error.message);
            }
            if let Some(summary) = &entry.summary {
                output_summary(summary);
            }
            if !entry.unknown_events.is_empty() {
                println!("  not in contract: {}", entry.unknown_events.join(", "));
            }
            if let Some(report) = &entry.report {
                println!("  report: {}", report);
            }
            println!();
        }
    }

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn output_summary(summary: &LogSummary) {
    println!(
        "  lines: {} ({} malformed), events: {}, sessions: {}",
        summary.lines,
        summary.malformed_lines,
        summary.total_events(),
        summary.sessions.len()
    );
    if let Some(span) = summary.span_ms() {
        println!("  span: {} ms, out of order: {}", span, summary.out_of_order);
    }
    for (name, count) in &summary.events {
        println!("    {:<32} {}", name, count);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// contract
// ═══════════════════════════════════════════════════════════════════════════

fn run_contract(path: Option<&Path>, json: bool) -> Result<ExitCode, TelemetryError> {
    #[derive(Serialize)]
    struct JsonOutput<'a> {
        source: String,
        version: String,
        events: Vec<&'a str>,
        cadence_ms: Vec<(&'a str, i64)>,
        findings: &'a telemetry_core::contract::ValidationResult,
    }

    let loaded: LoadedContract = match path {
        Some(path) => ContractLoader::new().load_from_file(path)?,
        None => default_loader().load_discovered()?,
    };

    if json {
        print_json(&JsonOutput {
            source: loaded.source(),
            version: loaded.contract.version.to_string(),
            events: loaded.allowed.sorted(),
            cadence_ms: loaded.contract.cadence_entries().collect(),
            findings: &loaded.findings,
        })?;
    } else {
        println!("Contract: {}", loaded.source());
        println!("Version:  {}", loaded.contract.version);
        println!();
        println!("Events ({}):", loaded.allowed.len());
        for name in loaded.allowed.sorted() {
            match loaded.contract.cadence_for(name) {
                Some(cadence) => println!("  {:<32} every {} ms", name, cadence.as_millis()),
                None => println!("  {}", name),
            }
        }
        let findings: Vec<_> = loaded.findings.all().collect();
        if !findings.is_empty() {
            println!();
            println!("Findings:");
            for issue in findings {
                println!("  {}", issue);
            }
        }
    }

    Ok(if loaded.findings.is_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
