//! Contract document types

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::validate::AllowSet;

/// Suffix carried by every cadence key (`<event_name>_ms`)
pub const CADENCE_SUFFIX: &str = "_ms";

/// A versioned event contract
///
/// Every section is optional in the document. Absent, null or mistyped
/// descriptive values fall back to their defaults so that one bad field
/// never discards the declared event names; only text that is not JSON
/// fails to load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventContract {
    /// Contract version
    #[serde(default, deserialize_with = "lenient::section")]
    pub version: ContractVersion,

    /// Envelope description
    #[serde(default, deserialize_with = "lenient::section")]
    pub envelope: ContractEnvelope,

    /// Advisory emission intervals, keyed `<event_name>_ms`
    ///
    /// Values that are not whole numbers of milliseconds are dropped.
    #[serde(default, deserialize_with = "lenient::cadence")]
    pub cadence: BTreeMap<String, i64>,

    /// Declared events; entries that are not objects are dropped
    #[serde(default, deserialize_with = "lenient::events")]
    pub events: Vec<EventSpec>,
}

/// Contract version triple
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractVersion {
    #[serde(default, deserialize_with = "lenient::number")]
    pub major: u32,
    #[serde(default, deserialize_with = "lenient::number")]
    pub minor: u32,
    #[serde(default, deserialize_with = "lenient::string")]
    pub tag: String,
}

impl std::fmt::Display for ContractVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if !self.tag.trim().is_empty() {
            write!(f, "-{}", self.tag.trim())?;
        }
        Ok(())
    }
}

/// Envelope shape declared by the contract
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractEnvelope {
    /// Serialization format (e.g. "jsonl")
    #[serde(default, deserialize_with = "lenient::string")]
    pub format: String,

    /// Fields every envelope must carry, in order
    #[serde(default, deserialize_with = "lenient::strings")]
    pub required_fields: Vec<String>,
}

/// A single declared event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSpec {
    /// Blank when absent or not a string; blank names are never allowed
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,

    #[serde(default, deserialize_with = "lenient::string")]
    pub domain: String,

    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,

    /// Field name to type hint. Descriptive only, never enforced.
    #[serde(default, rename = "payload", deserialize_with = "lenient::hints")]
    pub payload_schema: BTreeMap<String, String>,
}

/// Tolerant field deserializers
///
/// Each one accepts any JSON value and maps what it cannot use to the
/// field's default.
mod lenient {
    use super::*;

    pub fn section<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Default + serde::de::DeserializeOwned,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => s,
            _ => String::new(),
        })
    }

    pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(whole_number(&value)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or_default())
    }

    pub fn strings<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        })
    }

    pub fn hints<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, String>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Object(map) => map
                .into_iter()
                .map(|(field, hint)| {
                    let hint = match hint {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (field, hint)
                })
                .collect(),
            _ => BTreeMap::new(),
        })
    }

    pub fn cadence<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, i64>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Object(map) => map
                .into_iter()
                .filter_map(|(key, ms)| whole_number(&ms).map(|ms| (key, ms)))
                .collect(),
            _ => BTreeMap::new(),
        })
    }

    pub fn events<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<EventSpec>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => items
                .into_iter()
                .filter(Value::is_object)
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        })
    }

    /// Integers, and floats with no fractional part (`250.0`)
    fn whole_number(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            }),
            _ => None,
        }
    }
}

impl EventContract {
    /// Union of all event names after trimming, blank names excluded
    pub fn allowed_event_names(&self) -> AllowSet {
        self.events
            .iter()
            .map(|e| e.name.trim())
            .filter(|name| !name.is_empty())
            .collect()
    }

    /// Look up an event by its trimmed name
    pub fn spec(&self, name: &str) -> Option<&EventSpec> {
        let name = name.trim();
        self.events.iter().find(|e| e.name.trim() == name)
    }

    /// Advisory emission interval for an event, if the contract declares one
    pub fn cadence_for(&self, event: &str) -> Option<Duration> {
        let key = format!("{}{}", event.trim(), CADENCE_SUFFIX);
        self.cadence
            .get(&key)
            .and_then(|ms| u64::try_from(*ms).ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// Cadence entries as `(event_name, interval)` pairs
    pub fn cadence_entries(&self) -> impl Iterator<Item = (&str, i64)> {
        self.cadence.iter().map(|(key, ms)| {
            let name = key.strip_suffix(CADENCE_SUFFIX).unwrap_or(key);
            (name, *ms)
        })
    }
}
