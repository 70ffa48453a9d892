//! Contract Validator
//!
//! Structural checks over a parsed contract. Findings are diagnostics only:
//! a contract with errors still loads, since the pipeline degrades to
//! fail-open validation rather than refusing to run.

use std::collections::HashSet;

use serde::Serialize;

use crate::envelope::ENVELOPE_FIELDS;

use super::schema::EventContract;

/// Validation result with detailed findings
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationResult {
    /// Whether validation passed
    pub is_valid: bool,

    /// Error-level issues that must be fixed
    pub errors: Vec<ValidationIssue>,

    /// Warning-level issues that should be addressed
    pub warnings: Vec<ValidationIssue>,

    /// Informational notes
    pub info: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: vec![],
            warnings: vec![],
            info: vec![],
        }
    }

    pub fn add_error(&mut self, issue: ValidationIssue) {
        self.is_valid = false;
        self.errors.push(issue);
    }

    pub fn add_warning(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }

    pub fn add_info(&mut self, issue: ValidationIssue) {
        self.info.push(issue);
    }

    /// Iterate over every finding, most severe first
    pub fn all(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .chain(self.info.iter())
    }

    /// Get a summary string
    pub fn summary(&self) -> String {
        format!(
            "{}: {} errors, {} warnings, {} info",
            if self.is_valid { "VALID" } else { "INVALID" },
            self.errors.len(),
            self.warnings.len(),
            self.info.len()
        )
    }
}

/// A single validation issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Issue code
    pub code: String,

    /// Human-readable message
    pub message: String,

    /// Path to the problematic element (e.g., "events[2].name")
    pub path: Option<String>,
}

impl ValidationIssue {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "[{}] {} ({})", self.code, self.message, path),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

/// Contract validator
#[derive(Debug, Default)]
pub struct ContractValidator {
    /// Skip the envelope field checks
    skip_envelope: bool,
}

impl ContractValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Do not check `envelope.required_fields`
    pub fn skip_envelope_checks(mut self) -> Self {
        self.skip_envelope = true;
        self
    }

    /// Validate a contract
    pub fn validate(&self, contract: &EventContract) -> ValidationResult {
        let mut result = ValidationResult::valid();

        self.validate_events(contract, &mut result);
        if !self.skip_envelope {
            self.validate_envelope(contract, &mut result);
        }
        self.validate_cadence(contract, &mut result);

        result
    }

    fn validate_events(&self, contract: &EventContract, result: &mut ValidationResult) {
        if contract.events.is_empty() {
            result.add_error(
                ValidationIssue::new("NO_EVENTS", "Contract declares no events")
                    .with_path("events"),
            );
            return;
        }

        let mut seen = HashSet::new();
        for (i, event) in contract.events.iter().enumerate() {
            let name = event.name.trim();
            if name.is_empty() {
                result.add_warning(
                    ValidationIssue::new("BLANK_EVENT_NAME", "Event name is blank and will be ignored")
                        .with_path(format!("events[{}].name", i)),
                );
                continue;
            }
            if !seen.insert(name) {
                result.add_warning(
                    ValidationIssue::new(
                        "DUPLICATE_EVENT_NAME",
                        format!("Event '{}' is declared more than once", name),
                    )
                    .with_path(format!("events[{}].name", i)),
                );
            }
        }

        if seen.is_empty() {
            result.add_error(
                ValidationIssue::new("NO_EVENT_NAMES", "Contract has events but no usable names")
                    .with_path("events"),
            );
        }
    }

    fn validate_envelope(&self, contract: &EventContract, result: &mut ValidationResult) {
        let declared = &contract.envelope.required_fields;
        for field in ENVELOPE_FIELDS {
            if !declared.iter().any(|f| f == field) {
                result.add_warning(
                    ValidationIssue::new(
                        "MISSING_ENVELOPE_FIELD",
                        format!("Envelope field '{}' is not listed as required", field),
                    )
                    .with_path("envelope.required_fields"),
                );
            }
        }
    }

    fn validate_cadence(&self, contract: &EventContract, result: &mut ValidationResult) {
        let names = contract.allowed_event_names();
        for (name, ms) in contract.cadence_entries() {
            let path = format!("cadence.{}_ms", name);
            if ms <= 0 {
                result.add_warning(
                    ValidationIssue::new(
                        "NON_POSITIVE_CADENCE",
                        format!("Cadence for '{}' must be positive, got {}", name, ms),
                    )
                    .with_path(path.clone()),
                );
            }
            if !names.contains(name) {
                result.add_info(
                    ValidationIssue::new(
                        "CADENCE_UNKNOWN_EVENT",
                        format!("Cadence names '{}', which the contract does not declare", name),
                    )
                    .with_path(path),
                );
            }
        }
    }
}
