//! Contract Loader
//!
//! Loads a contract document from:
//! - JSON files
//! - In-memory JSON strings
//! - Search paths, using the conventional relative location

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::error::{Result, TelemetryError};
use crate::validate::AllowSet;

use super::schema::EventContract;
use super::validator::{ContractValidator, ValidationResult};

/// Conventional location of the contract below a search root
pub const CONTRACT_RELATIVE_PATH: &str = "telemetry/telemetry_events_v1.json";

/// A parsed contract with its derived allow-set and findings
#[derive(Debug, Clone)]
pub struct LoadedContract {
    /// The contract document
    pub contract: EventContract,

    /// Source path (if loaded from file)
    pub source_path: Option<PathBuf>,

    /// Trimmed, non-blank event names
    pub allowed: AllowSet,

    /// Structural findings
    pub findings: ValidationResult,
}

impl LoadedContract {
    fn new(contract: EventContract, source_path: Option<PathBuf>) -> Self {
        let allowed = contract.allowed_event_names();
        let findings = ContractValidator::new().validate(&contract);
        Self {
            contract,
            source_path,
            allowed,
            findings,
        }
    }

    /// Where the contract came from, for diagnostics
    pub fn source(&self) -> String {
        self.source_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<inline>".to_string())
    }

    /// Emit the load-time diagnostics
    fn report(&self) {
        let source = self.source();
        for issue in self.findings.errors.iter().chain(self.findings.warnings.iter()) {
            warn!(contract = %source, code = %issue.code, "{}", issue.message);
        }
        if self.allowed.is_empty() {
            error!(
                contract = %source,
                "Loaded contract but found zero event names; validated events are effectively disabled"
            );
        } else {
            info!(
                contract = %source,
                version = %self.contract.version,
                events = self.allowed.len(),
                "Loaded telemetry contract"
            );
        }
    }
}

/// Contract loader
#[derive(Debug, Clone, Default)]
pub struct ContractLoader {
    /// Search roots for contract discovery
    search_paths: Vec<PathBuf>,
}

impl ContractLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a search root for contract discovery
    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    /// Load a contract from a JSON string
    pub fn load_from_json(&self, json: &str) -> Result<LoadedContract> {
        let contract: EventContract =
            serde_json::from_str(json).map_err(|e| TelemetryError::ContractParse {
                path: "<inline>".to_string(),
                reason: e.to_string(),
            })?;

        let loaded = LoadedContract::new(contract, None);
        loaded.report();
        Ok(loaded)
    }

    /// Load a contract from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<LoadedContract> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => TelemetryError::ContractNotFound {
                path: path.display().to_string(),
            },
            _ => TelemetryError::ContractParse {
                path: path.display().to_string(),
                reason: e.to_string(),
            },
        })?;

        let contract: EventContract =
            serde_json::from_str(&content).map_err(|e| TelemetryError::ContractParse {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let loaded = LoadedContract::new(contract, Some(path.to_path_buf()));
        loaded.report();
        Ok(loaded)
    }

    /// Find the first search root holding a contract at the conventional path
    pub fn discover(&self) -> Option<PathBuf> {
        self.search_paths
            .iter()
            .map(|root| root.join(CONTRACT_RELATIVE_PATH))
            .find(|candidate| candidate.is_file())
    }

    /// Load the first discovered contract
    pub fn load_discovered(&self) -> Result<LoadedContract> {
        match self.discover() {
            Some(path) => self.load_from_file(path),
            None => Err(TelemetryError::ContractNotFound {
                path: CONTRACT_RELATIVE_PATH.to_string(),
            }),
        }
    }
}

/// Load a contract from a file with default settings
pub fn load<P: AsRef<Path>>(path: P) -> Result<LoadedContract> {
    ContractLoader::new().load_from_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTRACT: &str = r#"{
        "version": { "major": 1, "minor": 0, "tag": "test" },
        "envelope": { "format": "jsonl", "required_fields": ["event", "ts_ms", "session_id", "payload"] },
        "cadence": {},
        "events": [
            { "name": "A", "domain": "test", "description": "first", "payload": {} },
            { "name": "B", "domain": "test", "description": "second", "payload": { "x": "int" } }
        ]
    }"#;

    #[test]
    fn test_load_from_json() {
        let loaded = ContractLoader::new().load_from_json(CONTRACT).unwrap();
        assert_eq!(loaded.allowed.len(), 2);
        assert!(loaded.allowed.contains("A"));
        assert!(loaded.findings.is_valid);
        assert_eq!(loaded.source(), "<inline>");
    }

    #[test]
    fn test_load_invalid_json() {
        let err = ContractLoader::new().load_from_json("not valid json").unwrap_err();
        assert!(matches!(err, TelemetryError::ContractParse { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load("/definitely/not/here/contract.json").unwrap_err();
        assert!(matches!(err, TelemetryError::ContractNotFound { .. }));
        assert_eq!(err.error_code(), "CONTRACT_NOT_FOUND");
    }

    #[test]
    fn test_nameless_and_null_fields_do_not_fail_load() {
        let loaded = ContractLoader::new()
            .load_from_json(
                r#"{"events":[{"name":"A"},{"domain":"x"},{"name":"B","description":null}],
                    "cadence":{"A_ms":250.0}}"#,
            )
            .unwrap();
        assert_eq!(loaded.allowed.sorted(), vec!["A", "B"]);
        assert!(loaded
            .findings
            .warnings
            .iter()
            .any(|issue| issue.code == "BLANK_EVENT_NAME"));

        let validator = crate::validate::EventValidator::new(loaded.allowed.clone(), true);
        assert_eq!(validator.check("B").unwrap(), "B");
        assert!(matches!(
            validator.check("C"),
            Err(TelemetryError::EventNotInContract { .. })
        ));
    }

    #[test]
    fn test_empty_contract_loads() {
        let loaded = ContractLoader::new().load_from_json(r#"{"events":[]}"#).unwrap();
        assert!(loaded.allowed.is_empty());
        assert!(!loaded.findings.is_valid);
    }

    #[test]
    fn test_discover_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join(CONTRACT_RELATIVE_PATH);
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, CONTRACT).unwrap();

        let loader = ContractLoader::new()
            .with_search_path(dir.path().join("nope"))
            .with_search_path(dir.path());
        assert_eq!(loader.discover(), Some(target.clone()));

        let loaded = loader.load_discovered().unwrap();
        assert_eq!(loaded.source_path, Some(target));
        assert!(loaded.allowed.contains("B"));
    }

    #[test]
    fn test_discover_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ContractLoader::new().with_search_path(dir.path());
        assert!(loader.discover().is_none());
        assert!(matches!(
            loader.load_discovered(),
            Err(TelemetryError::ContractNotFound { .. })
        ));
    }
}
