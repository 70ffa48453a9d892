//! Emitter - the public entry point of the pipeline
//!
//! ```text
//! emit(name, payload)
//!   │
//!   ├─ lifecycle gate ── Uninitialized / Closed ──► dropped (NotReady / EmitterClosed)
//!   ├─ EventValidator ── rejected ─────────────────► dropped (diagnostic)
//!   ├─ Clock::now_ms
//!   ├─ envelope::encode
//!   └─ TelemetrySink::append_line ── failed ───────► dropped (WriteFailure / WriteTimeout)
//! ```
//!
//! `emit` never panics and never returns an error to the caller: every
//! failure is logged through `tracing`, counted, and reported in the
//! returned [`EmitOutcome`]. Timestamps are taken before the append lock
//! is acquired, so under concurrent callers the file is in append order,
//! not necessarily in `ts_ms` order.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::TelemetryConfig;
use crate::contract::{self, LoadedContract};
use crate::envelope::{self, Payload};
use crate::error::{Result, TelemetryError};
use crate::session::Session;
use crate::storage::{JsonlFileSink, TelemetrySink};
use crate::timing::{Clock, SystemClock};
use crate::validate::EventValidator;

type Listener = Box<dyn Fn(&str, &str) + Send + Sync>;

/// Lifecycle of an emitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmitterState {
    Uninitialized,
    Ready,
    Closed,
}

/// Result of a single `emit` call
#[derive(Debug)]
pub enum EmitOutcome {
    /// The line was appended
    Written { line_bytes: usize },
    /// The event was dropped; the error says why
    Dropped(TelemetryError),
}

impl EmitOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, EmitOutcome::Written { .. })
    }

    pub fn error(&self) -> Option<&TelemetryError> {
        match self {
            EmitOutcome::Written { .. } => None,
            EmitOutcome::Dropped(err) => Some(err),
        }
    }
}

/// How the contract was resolved at initialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ContractStatus {
    /// Validation is switched off; no contract was read
    Disabled,
    /// Validation is on but no contract path is configured
    NotConfigured,
    /// Contract loaded with at least one event
    Loaded { source: String, events: usize },
    /// Contract loaded but declares no usable event names
    Empty { source: String },
    /// Contract file does not exist
    Missing { path: String },
    /// Contract file could not be parsed
    Invalid { path: String, reason: String },
}

/// Summary of a completed initialization
#[derive(Debug, Clone, Serialize)]
pub struct InitReport {
    pub session_id: String,
    pub output_path: Option<PathBuf>,
    pub contract: ContractStatus,
    /// Whether event names are actually restricted
    pub enforcing: bool,
}

/// Counters since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EmitterStats {
    pub written: u64,
    pub rejected: u64,
    pub write_failures: u64,
    /// Dropped before `initialize`
    pub not_ready: u64,
    /// Dropped after `close`
    pub closed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    written: AtomicU64,
    rejected: AtomicU64,
    write_failures: AtomicU64,
    not_ready: AtomicU64,
    closed: AtomicU64,
}

/// State established once by `initialize`
struct Ready {
    session: Session,
    validator: EventValidator,
    contract: Option<LoadedContract>,
    sink: Arc<dyn TelemetrySink>,
    report: InitReport,
}

/// Contract-validated telemetry emitter
///
/// Construct one per session at the application's composition root and
/// share it (e.g. in an `Arc`) with every producer.
pub struct Emitter {
    config: TelemetryConfig,
    clock: Arc<dyn Clock>,
    sink: Option<Arc<dyn TelemetrySink>>,
    listeners: Vec<Listener>,
    ready: OnceLock<Ready>,
    closed: RwLock<bool>,
    counters: Counters,
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("state", &self.state())
            .field("session_id", &self.session_id())
            .field("output_path", &self.output_path())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Emitter {
    /// Create an uninitialized emitter
    pub fn new(config: TelemetryConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock::new()),
            sink: None,
            listeners: Vec::new(),
            ready: OnceLock::new(),
            closed: RwLock::new(false),
            counters: Counters::default(),
        }
    }

    /// Create and initialize in one step
    pub fn ready(config: TelemetryConfig) -> Self {
        let emitter = Self::new(config);
        emitter.initialize();
        emitter
    }

    /// Use a different time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Write through an existing sink instead of opening the session file
    ///
    /// Emitters that must write to the same path share one sink, and with
    /// it one append lock.
    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Register a callback invoked with `(event, line)` after each append
    pub fn with_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.listeners.push(Box::new(listener));
        self
    }

    /// Load the contract, resolve the session and prepare the sink
    ///
    /// Idempotent: only the first call does any work, concurrent callers
    /// wait for it and every call returns the same report.
    pub fn initialize(&self) -> &InitReport {
        &self.ready.get_or_init(|| self.build_ready()).report
    }

    fn build_ready(&self) -> Ready {
        let session = Session::resolve(
            self.config.session_override.as_deref(),
            self.config.session_template.as_ref(),
        );

        let (contract, status) = self.load_contract();
        let allowed = contract
            .as_ref()
            .map(|c| c.allowed.clone())
            .unwrap_or_default();
        let validator = EventValidator::new(allowed, self.config.validate_against_contract)
            .with_policy(self.config.empty_contract_policy);

        let sink: Arc<dyn TelemetrySink> = match &self.sink {
            Some(sink) => Arc::clone(sink),
            None => Arc::new(
                JsonlFileSink::new(self.config.output_dir().join(session.file_name()))
                    .with_lock_timeout(self.config.lock_timeout())
                    .with_sync_on_write(self.config.sync_on_write),
            ),
        };

        if let Err(e) = sink.ensure_ready() {
            // Not fatal: the next append retries
            warn!(code = e.error_code(), error = %e, "Telemetry output is not ready yet");
        }

        let report = InitReport {
            session_id: session.id().to_string(),
            output_path: sink.location().map(Path::to_path_buf),
            contract: status,
            enforcing: validator.is_enforcing(),
        };

        info!(
            session_id = %report.session_id,
            sink = sink.name(),
            output = ?report.output_path,
            enforcing = report.enforcing,
            "Telemetry emitter ready"
        );

        Ready {
            session,
            validator,
            contract,
            sink,
            report,
        }
    }

    fn load_contract(&self) -> (Option<LoadedContract>, ContractStatus) {
        if !self.config.validate_against_contract {
            return (None, ContractStatus::Disabled);
        }

        let Some(path) = &self.config.contract_path else {
            info!("No telemetry contract configured; event names are not validated");
            return (None, ContractStatus::NotConfigured);
        };

        match contract::load(path) {
            Ok(loaded) => {
                let status = if loaded.allowed.is_empty() {
                    ContractStatus::Empty {
                        source: loaded.source(),
                    }
                } else {
                    ContractStatus::Loaded {
                        source: loaded.source(),
                        events: loaded.allowed.len(),
                    }
                };
                (Some(loaded), status)
            }
            Err(e) => {
                error!(code = e.error_code(), error = %e, "Telemetry contract unavailable");
                let status = match e {
                    TelemetryError::ContractNotFound { path } => ContractStatus::Missing { path },
                    TelemetryError::ContractParse { path, reason } => {
                        ContractStatus::Invalid { path, reason }
                    }
                    other => ContractStatus::Invalid {
                        path: path.display().to_string(),
                        reason: other.to_string(),
                    },
                };
                (None, status)
            }
        }
    }

    /// Emit one event
    ///
    /// Validates the name, stamps it with the current time and the session
    /// id, and appends the encoded envelope. Never panics; anything that
    /// prevents the write is logged and returned as [`EmitOutcome::Dropped`].
    pub fn emit<P: Into<Payload>>(&self, event_name: &str, payload: P) -> EmitOutcome {
        let closed = self.closed.read();
        if *closed {
            warn!(event = event_name, "Telemetry emitter is closed; dropping event");
            self.counters.closed.fetch_add(1, Ordering::Relaxed);
            return EmitOutcome::Dropped(TelemetryError::EmitterClosed);
        }

        let Some(ready) = self.ready.get() else {
            warn!(event = event_name, "Telemetry emitter not initialized; dropping event");
            self.counters.not_ready.fetch_add(1, Ordering::Relaxed);
            return EmitOutcome::Dropped(TelemetryError::NotReady);
        };

        let name = match ready.validator.check(event_name) {
            Ok(name) => name,
            Err(e) => {
                warn!(event = event_name, code = e.error_code(), "{}", e);
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                return EmitOutcome::Dropped(e);
            }
        };

        let payload = payload.into();
        let ts_ms = self.clock.now_ms();
        let line = envelope::encode_payload(name, &payload, ready.session.id(), ts_ms);

        match ready.sink.append_line(&line) {
            Ok(()) => {
                drop(closed);
                self.counters.written.fetch_add(1, Ordering::Relaxed);
                debug!(event = name, ts_ms, "Telemetry event written");
                for listener in &self.listeners {
                    listener(name, &line);
                }
                EmitOutcome::Written {
                    line_bytes: line.len() + 1,
                }
            }
            Err(e) => {
                error!(
                    event = name,
                    code = e.error_code(),
                    error = %e,
                    "Failed to append telemetry event; event lost"
                );
                self.counters.write_failures.fetch_add(1, Ordering::Relaxed);
                EmitOutcome::Dropped(e)
            }
        }
    }

    /// Flush the sink to durable storage
    pub fn flush(&self) -> Result<()> {
        match self.ready.get() {
            Some(ready) => ready.sink.flush(),
            None => Ok(()),
        }
    }

    /// Flush and release the output. Later emits are dropped.
    ///
    /// Waits for in-flight emits to finish. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut closed = self.closed.write();
        if *closed {
            return Ok(());
        }
        *closed = true;

        match self.ready.get() {
            Some(ready) => {
                let result = ready.sink.close();
                info!(
                    session_id = ready.session.id(),
                    written = self.counters.written.load(Ordering::Relaxed),
                    "Telemetry emitter closed"
                );
                result
            }
            None => Ok(()),
        }
    }

    pub fn state(&self) -> EmitterState {
        if *self.closed.read() {
            EmitterState::Closed
        } else if self.ready.get().is_some() {
            EmitterState::Ready
        } else {
            EmitterState::Uninitialized
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.ready.get().map(|r| r.session.id())
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.ready.get().and_then(|r| r.sink.location())
    }

    /// The loaded contract, if validation is enabled and it loaded
    pub fn contract(&self) -> Option<&LoadedContract> {
        self.ready.get().and_then(|r| r.contract.as_ref())
    }

    pub fn init_report(&self) -> Option<&InitReport> {
        self.ready.get().map(|r| &r.report)
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    pub fn stats(&self) -> EmitterStats {
        EmitterStats {
            written: self.counters.written.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            write_failures: self.counters.write_failures.load(Ordering::Relaxed),
            not_ready: self.counters.not_ready.load(Ordering::Relaxed),
            closed: self.counters.closed.load(Ordering::Relaxed),
        }
    }
}

impl Drop for Emitter {
    fn drop(&mut self) {
        if *self.closed.get_mut() {
            return;
        }
        if let Some(ready) = self.ready.get() {
            if let Err(e) = ready.sink.flush() {
                warn!(error = %e, "Failed to flush telemetry on drop");
            }
        }
    }
}
