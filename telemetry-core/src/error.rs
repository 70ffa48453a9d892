//! Error types for telemetry operations
//!
//! This module provides the error taxonomy of the pipeline:
//! - Structured error types with descriptive messages
//! - Stable error codes for programmatic handling
//! - Error categories for grouping and filtering
//! - JSON serialization for CLI and tooling output
//!
//! Most of these errors never reach the caller of [`Emitter::emit`]: contract
//! and validation problems are recovered locally (the event is dropped and a
//! diagnostic is logged). They are still typed so that the outcome of every
//! emit can be inspected.
//!
//! # Example
//!
//! ```rust
//! use telemetry_core::error::{TelemetryError, ErrorCategory};
//!
//! fn handle_error(err: TelemetryError) {
//!     match err.category() {
//!         ErrorCategory::Contract => println!("Contract problem"),
//!         ErrorCategory::Validation => println!("Event rejected"),
//!         ErrorCategory::Storage => println!("Could not write"),
//!         _ => println!("Other error"),
//!     }
//!
//!     if err.is_recoverable() {
//!         println!("Retry may succeed");
//!     }
//! }
//! ```
//!
//! [`Emitter::emit`]: crate::Emitter::emit

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for telemetry operations
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Error category for grouping related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration file missing or malformed
    Configuration,
    /// Contract document missing or malformed
    Contract,
    /// Event rejected by the validator
    Validation,
    /// Emitter used outside its `Ready` state
    Lifecycle,
    /// Output file could not be written
    Storage,
    /// Internal error
    Internal,
}

/// Errors that can occur in telemetry operations
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Configuration file could not be read or parsed
    #[error("Invalid configuration '{path}': {reason}")]
    Config { path: String, reason: String },

    // ═══════════════════════════════════════════════════════════════════════
    // Contract errors (loading the event schema)
    // ═══════════════════════════════════════════════════════════════════════

    /// Contract document does not exist at the given location
    #[error("Contract not found at '{path}'. Events will not be validated.")]
    ContractNotFound { path: String },

    /// Contract document exists but could not be parsed
    #[error("Failed to parse contract '{path}': {reason}")]
    ContractParse { path: String, reason: String },

    // ═══════════════════════════════════════════════════════════════════════
    // Validation errors (per event, never fatal)
    // ═══════════════════════════════════════════════════════════════════════

    /// Event name is empty after trimming
    #[error("Event name is empty or whitespace")]
    EmptyEventName,

    /// Event name is not declared in the loaded contract
    #[error("Event name not in contract: '{event}'")]
    EventNotInContract { event: String },

    /// Contract has no events and the fail-closed policy is active
    #[error("Contract declares no events; rejecting '{event}' under the fail-closed policy")]
    EmptyContract { event: String },

    // ═══════════════════════════════════════════════════════════════════════
    // Lifecycle errors
    // ═══════════════════════════════════════════════════════════════════════

    /// Emit was called before `initialize()`
    #[error("Emitter is not ready. Call initialize() before emitting.")]
    NotReady,

    /// Emit was called after `close()`
    #[error("Emitter has been closed.")]
    EmitterClosed,

    // ═══════════════════════════════════════════════════════════════════════
    // Storage errors (appending to the JSONL file)
    // ═══════════════════════════════════════════════════════════════════════

    /// Append lock could not be acquired within the configured bound
    #[error("Timed out after {waited_ms}ms waiting for the write lock on '{path}'")]
    WriteTimeout { path: String, waited_ms: u64 },

    /// Directory or file could not be created or written
    #[error("Write failed for '{path}': {reason}")]
    WriteFailure { path: String, reason: String },

    /// Analysis report could not be produced
    #[error("Report error: {reason}")]
    ReportError { reason: String },

    // ═══════════════════════════════════════════════════════════════════════
    // Infrastructure errors
    // ═══════════════════════════════════════════════════════════════════════

    /// JSON serialization or deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// In-memory sink lock is poisoned (panic occurred while holding lock)
    #[error("Sink lock poisoned. This is a bug; please report it.")]
    StorageLocked,
}

impl TelemetryError {
    /// Create a write failure from an I/O error
    pub(crate) fn write_failure(path: &std::path::Path, err: &std::io::Error) -> Self {
        TelemetryError::WriteFailure {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }

    /// Returns true if this error might succeed on retry
    ///
    /// Only storage conditions are transient. Contract and validation
    /// outcomes are deterministic for a given input.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TelemetryError::WriteTimeout { .. }
                | TelemetryError::WriteFailure { .. }
                | TelemetryError::StorageLocked
        )
    }

    /// Returns the error category for grouping
    pub fn category(&self) -> ErrorCategory {
        match self {
            TelemetryError::Config { .. } => ErrorCategory::Configuration,

            TelemetryError::ContractNotFound { .. } | TelemetryError::ContractParse { .. } => {
                ErrorCategory::Contract
            }

            TelemetryError::EmptyEventName
            | TelemetryError::EventNotInContract { .. }
            | TelemetryError::EmptyContract { .. } => ErrorCategory::Validation,

            TelemetryError::NotReady | TelemetryError::EmitterClosed => ErrorCategory::Lifecycle,

            TelemetryError::WriteTimeout { .. }
            | TelemetryError::WriteFailure { .. }
            | TelemetryError::ReportError { .. } => ErrorCategory::Storage,

            TelemetryError::Json(_) | TelemetryError::StorageLocked => ErrorCategory::Internal,
        }
    }

    /// Returns the stable error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            TelemetryError::Config { .. } => "CONFIG_ERROR",
            TelemetryError::ContractNotFound { .. } => "CONTRACT_NOT_FOUND",
            TelemetryError::ContractParse { .. } => "CONTRACT_PARSE_ERROR",
            TelemetryError::EmptyEventName => "EMPTY_EVENT_NAME",
            TelemetryError::EventNotInContract { .. } => "EVENT_NOT_IN_CONTRACT",
            TelemetryError::EmptyContract { .. } => "EMPTY_CONTRACT",
            TelemetryError::NotReady => "NOT_READY",
            TelemetryError::EmitterClosed => "EMITTER_CLOSED",
            TelemetryError::WriteTimeout { .. } => "WRITE_TIMEOUT",
            TelemetryError::WriteFailure { .. } => "WRITE_FAILURE",
            TelemetryError::ReportError { .. } => "REPORT_ERROR",
            TelemetryError::Json(_) => "JSON_ERROR",
            TelemetryError::StorageLocked => "STORAGE_LOCKED",
        }
    }

    /// Converts this error to a JSON-serializable response object
    ///
    /// ```json
    /// {
    ///   "error": {
    ///     "code": "EVENT_NOT_IN_CONTRACT",
    ///     "message": "Event name not in contract: 'C'",
    ///     "category": "validation",
    ///     "recoverable": false
    ///   }
    /// }
    /// ```
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
                category: self.category(),
                recoverable: self.is_recoverable(),
            },
        }
    }
}

/// JSON-serializable error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
}

/// Error detail for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Stable error code (e.g., "WRITE_TIMEOUT")
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Error category
    pub category: ErrorCategory,
    /// Whether retry might succeed
    pub recoverable: bool,
}
