//! Session identity
//!
//! A session id is resolved once per emitter and never changes afterwards.
//! Resolution order:
//!
//! 1. A non-blank override, trimmed
//! 2. A deterministic template (run length and seed)
//! 3. A random opaque token

use std::borrow::Cow;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pattern used when a template has no explicit pattern
pub const DEFAULT_TEMPLATE: &str = "demo_{minutes:02}min_seed{seed}";

/// Deterministic session id template
///
/// Placeholders are `{minutes}` and `{seed}`; a `:0N` suffix zero-pads the
/// value to width `N`. Unknown placeholders are left as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTemplate {
    #[serde(default = "default_pattern")]
    pub pattern: String,
    #[serde(default)]
    pub minutes: u32,
    #[serde(default)]
    pub seed: u64,
}

fn default_pattern() -> String {
    DEFAULT_TEMPLATE.to_string()
}

impl SessionTemplate {
    pub fn new(minutes: u32, seed: u64) -> Self {
        Self {
            pattern: default_pattern(),
            minutes,
            seed,
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Render the template
    pub fn render(&self) -> String {
        let placeholder = match Regex::new(r"\{([a-z_]+)(?::0(\d+))?\}") {
            Ok(re) => re,
            Err(_) => return self.pattern.clone(),
        };

        placeholder
            .replace_all(&self.pattern, |caps: &Captures<'_>| {
                let value = match &caps[1] {
                    "minutes" => u64::from(self.minutes),
                    "seed" => self.seed,
                    _ => return caps[0].to_string(),
                };
                let width = caps
                    .get(2)
                    .and_then(|w| w.as_str().parse::<usize>().ok())
                    .unwrap_or(0);
                format!("{:0width$}", value, width = width)
            })
            .into_owned()
    }
}

/// Resolve a session id from an override and an optional template
pub fn resolve(session_override: Option<&str>, template: Option<&SessionTemplate>) -> String {
    if let Some(id) = session_override.map(str::trim).filter(|id| !id.is_empty()) {
        return id.to_string();
    }
    match template {
        Some(template) => template.render(),
        None => random_session_id(),
    }
}

/// Generate a fresh opaque session token
pub fn random_session_id() -> String {
    format!("sess_{}", Uuid::new_v4().simple())
}

/// Make a session id safe to embed in a file name
///
/// Characters outside `[A-Za-z0-9._-]` become `_`. An id that would
/// sanitize to nothing maps to `session`.
pub fn file_safe(session_id: &str) -> Cow<'_, str> {
    let safe = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-');
    if !session_id.is_empty() && session_id.chars().all(safe) && !session_id.trim_matches('.').is_empty() {
        return Cow::Borrowed(session_id);
    }
    let cleaned: String = session_id
        .chars()
        .map(|c| if safe(c) { c } else { '_' })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        Cow::Borrowed("session")
    } else {
        Cow::Owned(cleaned)
    }
}

/// A resolved session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: String,
}

impl Session {
    pub fn resolve(session_override: Option<&str>, template: Option<&SessionTemplate>) -> Self {
        Self {
            id: resolve(session_override, template),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// `telemetry_<id>.jsonl`
    pub fn file_name(&self) -> String {
        format!("telemetry_{}.jsonl", file_safe(&self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins_and_is_trimmed() {
        let template = SessionTemplate::new(5, 1337);
        assert_eq!(resolve(Some("  run-42 "), Some(&template)), "run-42");
    }

    #[test]
    fn test_blank_override_falls_through() {
        let template = SessionTemplate::new(5, 1337);
        assert_eq!(resolve(Some("   "), Some(&template)), "demo_05min_seed1337");
    }

    #[test]
    fn test_template_rendering() {
        assert_eq!(SessionTemplate::new(12, 7).render(), "demo_12min_seed7");
        let custom = SessionTemplate::new(3, 9).with_pattern("sandbox_{minutes}m_seed{seed:04}_{other}");
        assert_eq!(custom.render(), "sandbox_3m_seed0009_{other}");
    }

    #[test]
    fn test_template_deserializes_with_default_pattern() {
        let template: SessionTemplate = serde_json::from_str(r#"{"minutes":1,"seed":2}"#).unwrap();
        assert_eq!(template.render(), "demo_01min_seed2");
    }

    #[test]
    fn test_random_ids_are_unique() {
        let a = resolve(None, None);
        let b = resolve(None, None);
        assert_ne!(a, b);
        assert!(a.starts_with("sess_"));
        assert_eq!(a.len(), "sess_".len() + 32);
    }

    #[test]
    fn test_file_safe() {
        assert_eq!(file_safe("demo_05min_seed1337"), "demo_05min_seed1337");
        assert_eq!(file_safe("../etc/passwd"), ".._etc_passwd");
        assert_eq!(file_safe("a b:c"), "a_b_c");
        assert_eq!(file_safe(".."), "session");
        assert_eq!(file_safe(""), "session");
    }

    #[test]
    fn test_session_file_name() {
        let session = Session::resolve(Some("x/y"), None);
        assert_eq!(session.id(), "x/y");
        assert_eq!(session.file_name(), "telemetry_x_y.jsonl");
    }
}
