//! Offline analysis of JSONL telemetry logs
//!
//! Reads a log written by the emitter back into [`TelemetryEnvelope`]s and
//! summarizes it: per-event counts, sessions seen, time span, and how many
//! lines were out of timestamp order. Reports are written next to the input
//! as `report_<session>.json`.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::envelope::TelemetryEnvelope;
use crate::error::{Result, TelemetryError};
use crate::validate::AllowSet;

const LOG_PREFIX: &str = "telemetry_";
const REPORT_PREFIX: &str = "report_";

/// Envelopes parsed from one log
#[derive(Debug, Clone, Default)]
pub struct EnvelopeLog {
    pub envelopes: Vec<TelemetryEnvelope>,
    /// Non-blank lines that did not decode as an envelope
    pub malformed_lines: usize,
}

/// Summary of one log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogSummary {
    /// Non-blank lines read
    pub lines: usize,
    pub malformed_lines: usize,
    /// Event name → count
    pub events: BTreeMap<String, u64>,
    pub sessions: BTreeSet<String>,
    pub first_ts_ms: Option<i64>,
    pub last_ts_ms: Option<i64>,
    /// Lines whose `ts_ms` is lower than the line before
    pub out_of_order: usize,
}

/// Parse JSONL text. Blank lines are skipped; malformed lines are counted.
pub fn parse_envelopes(text: &str) -> EnvelopeLog {
    let mut log = EnvelopeLog::default();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<TelemetryEnvelope>(line) {
            Ok(envelope) => log.envelopes.push(envelope),
            Err(e) => {
                debug!(line = index + 1, error = %e, "Skipping malformed telemetry line");
                log.malformed_lines += 1;
            }
        }
    }
    log
}

/// Read and parse a JSONL log file
pub fn read_envelopes<P: AsRef<Path>>(path: P) -> Result<EnvelopeLog> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| TelemetryError::ReportError {
        reason: format!("cannot read '{}': {}", path.display(), e),
    })?;
    Ok(parse_envelopes(&text))
}

/// Summarize a parsed log
pub fn summarize(log: &EnvelopeLog) -> LogSummary {
    let mut summary = LogSummary {
        lines: log.envelopes.len() + log.malformed_lines,
        malformed_lines: log.malformed_lines,
        ..LogSummary::default()
    };

    let mut previous: Option<i64> = None;
    for envelope in &log.envelopes {
        *summary.events.entry(envelope.event.clone()).or_insert(0) += 1;
        summary.sessions.insert(envelope.session_id.clone());

        if previous.is_some_and(|p| envelope.ts_ms < p) {
            summary.out_of_order += 1;
        }
        previous = Some(envelope.ts_ms);

        summary.first_ts_ms = Some(summary.first_ts_ms.map_or(envelope.ts_ms, |t| t.min(envelope.ts_ms)));
        summary.last_ts_ms = Some(summary.last_ts_ms.map_or(envelope.ts_ms, |t| t.max(envelope.ts_ms)));
    }

    summary
}

/// Read and summarize a JSONL log file
pub fn summarize_file<P: AsRef<Path>>(path: P) -> Result<LogSummary> {
    let path = path.as_ref();
    let summary = summarize(&read_envelopes(path)?);
    info!(
        path = %path.display(),
        lines = summary.lines,
        malformed = summary.malformed_lines,
        "Summarized telemetry log"
    );
    Ok(summary)
}

/// Report file for a log: `telemetry_<session>.jsonl` → `report_<session>.json`
pub fn report_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let session = stem.strip_prefix(LOG_PREFIX).unwrap_or(&stem);
    input.with_file_name(format!("{}{}.json", REPORT_PREFIX, session))
}

impl LogSummary {
    /// Total events decoded
    pub fn total_events(&self) -> u64 {
        self.events.values().sum()
    }

    /// Milliseconds between the earliest and latest timestamp
    pub fn span_ms(&self) -> Option<i64> {
        match (self.first_ts_ms, self.last_ts_ms) {
            (Some(first), Some(last)) => Some(last - first),
            _ => None,
        }
    }

    /// Event names in the log that the contract does not declare
    pub fn unknown_events(&self, allowed: &AllowSet) -> Vec<String> {
        self.events
            .keys()
            .filter(|name| !allowed.contains(name))
            .cloned()
            .collect()
    }

    /// Write this summary as pretty JSON next to `input`
    pub fn write_report(&self, input: &Path) -> Result<PathBuf> {
        let path = report_path(input);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json).map_err(|e| TelemetryError::ReportError {
            reason: format!("cannot write '{}': {}", path.display(), e),
        })?;
        info!(report = %path.display(), "Wrote telemetry report");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = concat!(
        r#"{"event":"W_EVALUATION_TICK","ts_ms":100,"session_id":"s1","payload":{"value":0.5}}"#,
        "\n\n",
        r#"{"event":"CCS_PRECISION_SAMPLE","ts_ms":350,"session_id":"s1","payload":{}}"#,
        "\n",
        "not json\n",
        r#"{"event":"W_EVALUATION_TICK","ts_ms":300,"session_id":"s2","payload":{}}"#,
        "\n",
    );

    #[test]
    fn test_parse_skips_blank_and_counts_malformed() {
        let log = parse_envelopes(LOG);
        assert_eq!(log.envelopes.len(), 3);
        assert_eq!(log.malformed_lines, 1);
        assert_eq!(log.envelopes[0].payload["value"], 0.5);
    }

    #[test]
    fn test_summarize() {
        let summary = summarize(&parse_envelopes(LOG));
        assert_eq!(summary.lines, 4);
        assert_eq!(summary.events["W_EVALUATION_TICK"], 2);
        assert_eq!(summary.total_events(), 3);
        assert_eq!(summary.sessions.len(), 2);
        assert_eq!(summary.first_ts_ms, Some(100));
        assert_eq!(summary.last_ts_ms, Some(350));
        assert_eq!(summary.span_ms(), Some(250));
        assert_eq!(summary.out_of_order, 1);
    }

    #[test]
    fn test_empty_log() {
        let summary = summarize(&parse_envelopes(""));
        assert_eq!(summary, LogSummary::default());
        assert_eq!(summary.span_ms(), None);
    }

    #[test]
    fn test_unknown_events() {
        let summary = summarize(&parse_envelopes(LOG));
        let allowed: AllowSet = ["W_EVALUATION_TICK"].into_iter().collect();
        assert_eq!(summary.unknown_events(&allowed), vec!["CCS_PRECISION_SAMPLE"]);
    }

    #[test]
    fn test_report_path() {
        assert_eq!(
            report_path(Path::new("/out/telemetry_demo_05min_seed1337.jsonl")),
            PathBuf::from("/out/report_demo_05min_seed1337.json")
        );
        assert_eq!(
            report_path(Path::new("custom.jsonl")),
            PathBuf::from("report_custom.json")
        );
    }

    #[test]
    fn test_write_report_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("telemetry_s1.jsonl");
        fs::write(&input, LOG).unwrap();

        let summary = summarize_file(&input).unwrap();
        let report = summary.write_report(&input).unwrap();
        assert_eq!(report, dir.path().join("report_s1.json"));

        let parsed: LogSummary =
            serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
        assert_eq!(parsed, summary);
    }

    #[test]
    fn test_missing_input_is_report_error() {
        let err = summarize_file("/definitely/not/here.jsonl").unwrap_err();
        assert_eq!(err.error_code(), "REPORT_ERROR");
    }
}
