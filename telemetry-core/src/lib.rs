//! # Telemetry Core - contract-validated event telemetry
//!
//! A synchronous pipeline that turns named events from a running application
//! into newline-delimited JSON records:
//!
//! - **Contract**: a versioned JSON document declaring which event names may
//!   be emitted, with advisory cadences and payload hints
//! - **Validator**: trims names and checks them against the contract's allow
//!   set, fail-open when no contract is configured
//! - **Envelope**: one JSON object per event with the fixed field order
//!   `event`, `ts_ms`, `session_id`, `payload`
//! - **Sink**: an append-only JSONL file (one per session) that never
//!   interleaves lines under concurrent writers
//!
//! ## Core Principle
//!
//! > Emitting telemetry must never take the application down.
//!
//! `Emitter::emit` never panics and never returns an error. Rejected events
//! and failed writes are logged through `tracing` and reported in the
//! returned [`EmitOutcome`].
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use telemetry_core::{Emitter, TelemetryConfig, MemorySink};
//!
//! let sink = Arc::new(MemorySink::new());
//! let emitter = Emitter::new(TelemetryConfig::default().with_session_override("demo"))
//!     .with_sink(sink.clone());
//! emitter.initialize();
//!
//! assert!(emitter.emit("W_EVALUATION_TICK", r#"{"value":0.25}"#).is_written());
//! assert!(!emitter.emit("   ", "{}").is_written());
//!
//! let line = &sink.lines()[0];
//! assert!(line.starts_with(r#"{"event":"W_EVALUATION_TICK","ts_ms":"#));
//! assert!(line.ends_with(r#""session_id":"demo","payload":{"value":0.25}}"#));
//! ```

pub mod analysis;
pub mod config;
pub mod contract;
pub mod emitter;
pub mod envelope;
pub mod error;
pub mod session;
pub mod storage;
pub mod timing;
pub mod validate;

// Re-export main types
pub use analysis::{read_envelopes, summarize_file, LogSummary};
pub use config::TelemetryConfig;
pub use contract::{ContractLoader, EventContract, EventSpec, LoadedContract};
pub use emitter::{ContractStatus, EmitOutcome, Emitter, EmitterState, EmitterStats, InitReport};
pub use envelope::{encode, Payload, TelemetryEnvelope};
pub use error::{ErrorCategory, ErrorDetail, ErrorResponse, Result, TelemetryError};
pub use session::{Session, SessionTemplate};
pub use storage::{JsonlFileSink, MemorySink, NullSink, TelemetrySink};
pub use timing::{Clock, ManualClock, SystemClock};
pub use validate::{is_allowed, AllowSet, EmptyContractPolicy, EventValidator};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn create_test_contract() -> String {
        json!({
            "version": { "major": 1, "minor": 0, "tag": "test" },
            "envelope": {
                "format": "jsonl",
                "required_fields": ["event", "ts_ms", "session_id", "payload"]
            },
            "cadence": { "W_EVALUATION_TICK_ms": 250 },
            "events": [
                { "name": "W_EVALUATION_TICK", "domain": "wx", "payload": { "value": "float" } },
                { "name": "CCS_PRECISION_SAMPLE", "domain": "ccs" }
            ]
        })
        .to_string()
    }

    #[test]
    fn test_full_workflow() {
        let dir = tempfile::tempdir().unwrap();
        let contract_path = dir.path().join("contract.json");
        std::fs::write(&contract_path, create_test_contract()).unwrap();

        let clock = Arc::new(ManualClock::new(10_000).with_step(250));
        let emitter = Emitter::new(
            TelemetryConfig::default()
                .with_output_root(dir.path())
                .with_contract_path(&contract_path)
                .with_session_template(SessionTemplate::new(5, 1337)),
        )
        .with_clock(clock);

        let report = emitter.initialize().clone();
        assert_eq!(report.session_id, "demo_05min_seed1337");
        assert!(matches!(report.contract, ContractStatus::Loaded { events: 2, .. }));

        let cadence = emitter
            .contract()
            .and_then(|c| c.contract.cadence_for("W_EVALUATION_TICK"));
        assert_eq!(cadence, Some(std::time::Duration::from_millis(250)));

        for i in 0..4 {
            emitter.emit("W_EVALUATION_TICK", json!({ "value": i }));
        }
        emitter.emit("CCS_PRECISION_SAMPLE", None::<&str>);
        emitter.emit("UNKNOWN", "{}");
        emitter.close().unwrap();

        let stats = emitter.stats();
        assert_eq!(stats.written, 5);
        assert_eq!(stats.rejected, 1);

        let output = report.output_path.unwrap();
        assert!(output.ends_with("telemetry/telemetry_demo_05min_seed1337.jsonl"));

        let summary = summarize_file(&output).unwrap();
        assert_eq!(summary.total_events(), 5);
        assert_eq!(summary.span_ms(), Some(1_000));
        assert_eq!(summary.out_of_order, 0);
        assert!(summary
            .unknown_events(&emitter.contract().unwrap().allowed)
            .is_empty());
    }
}
