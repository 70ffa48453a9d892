//! Event name validation against a contract allow-set
//!
//! Rules, in order:
//!
//! 1. The name is trimmed; a blank name is always rejected.
//! 2. With validation disabled, every remaining name is permitted.
//! 3. With an empty allow-set, the [`EmptyContractPolicy`] decides:
//!    fail-open permits everything, fail-closed rejects everything.
//! 4. Otherwise the name must be a member of the allow-set, compared
//!    exactly (case-sensitive, ordinal). No prefix or fuzzy matching.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TelemetryError};

/// The set of event names a contract permits
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowSet {
    names: HashSet<String>,
}

impl AllowSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact, case-sensitive membership
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Names in lexical order, for display
    pub fn sorted(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.iter().collect();
        names.sort_unstable();
        names
    }
}

impl<'a> FromIterator<&'a str> for AllowSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(str::to_string).collect(),
        }
    }
}

impl FromIterator<String> for AllowSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

/// What to do when validation is enabled but the contract permits nothing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyContractPolicy {
    /// Permit every non-blank name, as if no contract were configured
    #[default]
    FailOpen,
    /// Reject every name
    FailClosed,
}

/// Event validator bound to one allow-set
#[derive(Debug, Clone, Default)]
pub struct EventValidator {
    allowed: AllowSet,
    enabled: bool,
    policy: EmptyContractPolicy,
}

impl EventValidator {
    pub fn new(allowed: AllowSet, enabled: bool) -> Self {
        Self {
            allowed,
            enabled,
            policy: EmptyContractPolicy::default(),
        }
    }

    /// Set the empty-contract policy
    pub fn with_policy(mut self, policy: EmptyContractPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Whether this validator actually restricts names
    pub fn is_enforcing(&self) -> bool {
        self.enabled && (!self.allowed.is_empty() || self.policy == EmptyContractPolicy::FailClosed)
    }

    /// Validate a candidate name, returning the trimmed name on success
    pub fn check<'a>(&self, name: &'a str) -> Result<&'a str> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TelemetryError::EmptyEventName);
        }
        if !self.enabled {
            return Ok(name);
        }
        if self.allowed.is_empty() {
            return match self.policy {
                EmptyContractPolicy::FailOpen => Ok(name),
                EmptyContractPolicy::FailClosed => Err(TelemetryError::EmptyContract {
                    event: name.to_string(),
                }),
            };
        }
        if self.allowed.contains(name) {
            Ok(name)
        } else {
            Err(TelemetryError::EventNotInContract {
                event: name.to_string(),
            })
        }
    }
}

/// Fail-open membership test over a bare allow-set
pub fn is_allowed(name: &str, allowed: &AllowSet, validation_enabled: bool) -> bool {
    let name = name.trim();
    if name.is_empty() {
        return false;
    }
    !validation_enabled || allowed.is_empty() || allowed.contains(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> AllowSet {
        names.iter().copied().collect()
    }

    #[test]
    fn test_member_names_pass_trimmed() {
        let validator = EventValidator::new(set(&["A", "B"]), true);
        assert_eq!(validator.check("A").unwrap(), "A");
        assert_eq!(validator.check("  B\t").unwrap(), "B");
    }

    #[test]
    fn test_non_members_rejected() {
        let validator = EventValidator::new(set(&["A", "B"]), true);
        let err = validator.check("C").unwrap_err();
        assert!(matches!(err, TelemetryError::EventNotInContract { ref event } if event == "C"));
    }

    #[test]
    fn test_comparison_is_case_sensitive_and_exact() {
        let validator = EventValidator::new(set(&["W_EVALUATION_TICK"]), true);
        assert!(validator.check("w_evaluation_tick").is_err());
        assert!(validator.check("W_EVALUATION").is_err());
        assert!(validator.check("W_EVALUATION_TICK_X").is_err());
    }

    #[test]
    fn test_blank_always_rejected() {
        for validator in [
            EventValidator::new(set(&["A"]), true),
            EventValidator::new(AllowSet::new(), true),
            EventValidator::new(AllowSet::new(), false),
        ] {
            assert!(matches!(
                validator.check("   "),
                Err(TelemetryError::EmptyEventName)
            ));
            assert!(matches!(validator.check(""), Err(TelemetryError::EmptyEventName)));
        }
    }

    #[test]
    fn test_disabled_validation_is_open() {
        let validator = EventValidator::new(set(&["A"]), false);
        assert_eq!(validator.check("anything").unwrap(), "anything");
        assert!(!validator.is_enforcing());
    }

    #[test]
    fn test_empty_contract_policies() {
        let open = EventValidator::new(AllowSet::new(), true);
        assert!(open.check("X").is_ok());
        assert!(!open.is_enforcing());

        let closed = EventValidator::new(AllowSet::new(), true)
            .with_policy(EmptyContractPolicy::FailClosed);
        assert!(matches!(
            closed.check("X"),
            Err(TelemetryError::EmptyContract { .. })
        ));
        assert!(closed.is_enforcing());
    }

    #[test]
    fn test_is_allowed_function() {
        let allowed = set(&["A"]);
        assert!(is_allowed("A", &allowed, true));
        assert!(is_allowed(" A ", &allowed, true));
        assert!(!is_allowed("B", &allowed, true));
        assert!(is_allowed("B", &allowed, false));
        assert!(is_allowed("B", &AllowSet::new(), true));
        assert!(!is_allowed(" ", &allowed, false));
    }

    #[test]
    fn test_policy_serde() {
        let policy: EmptyContractPolicy = serde_json::from_str("\"fail_closed\"").unwrap();
        assert_eq!(policy, EmptyContractPolicy::FailClosed);
        assert_eq!(serde_json::to_string(&EmptyContractPolicy::FailOpen).unwrap(), "\"fail_open\"");
    }
}
