//! Emitter configuration
//!
//! Supplied once when an emitter is constructed and immutable afterwards.
//! Sources, in increasing precedence: defaults, a JSON file, environment
//! variables, explicit `with_*` calls.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TelemetryError};
use crate::session::SessionTemplate;
use crate::validate::EmptyContractPolicy;

pub const ENV_OUTPUT_ROOT: &str = "TELEMETRY_OUTPUT_ROOT";
pub const ENV_SUBFOLDER: &str = "TELEMETRY_SUBFOLDER";
pub const ENV_CONTRACT: &str = "TELEMETRY_CONTRACT";
pub const ENV_SESSION: &str = "TELEMETRY_SESSION";
pub const ENV_VALIDATE: &str = "TELEMETRY_VALIDATE";

/// Default subfolder below the output root
pub const DEFAULT_SUBFOLDER: &str = "telemetry";

/// Telemetry pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Output root directory
    pub output_root: PathBuf,

    /// Fixed subfolder below the root
    pub output_subfolder: String,

    /// Contract document; `None` runs unvalidated
    pub contract_path: Option<PathBuf>,

    /// Validate event names against the contract
    pub validate_against_contract: bool,

    /// Behavior when the contract permits nothing
    pub empty_contract_policy: EmptyContractPolicy,

    /// Explicit session id
    pub session_override: Option<String>,

    /// Deterministic session id template
    pub session_template: Option<SessionTemplate>,

    /// Bound on the append lock wait; `None` waits indefinitely
    pub lock_timeout_ms: Option<u64>,

    /// `fsync` after every line
    pub sync_on_write: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("."),
            output_subfolder: DEFAULT_SUBFOLDER.to_string(),
            contract_path: None,
            validate_against_contract: true,
            empty_contract_policy: EmptyContractPolicy::FailOpen,
            session_override: None,
            session_template: None,
            lock_timeout_ms: Some(5_000),
            sync_on_write: false,
        }
    }
}

impl TelemetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| TelemetryError::Config {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| TelemetryError::Config {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Apply `TELEMETRY_*` environment variables
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(root) = get(ENV_OUTPUT_ROOT) {
            self.output_root = PathBuf::from(root);
        }
        if let Some(subfolder) = get(ENV_SUBFOLDER) {
            self.output_subfolder = subfolder;
        }
        if let Some(contract) = get(ENV_CONTRACT) {
            self.contract_path = Some(PathBuf::from(contract));
        }
        if let Some(session) = get(ENV_SESSION) {
            self.session_override = Some(session);
        }
        if let Some(flag) = get(ENV_VALIDATE) {
            self.validate_against_contract = !matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            );
        }
        self
    }

    pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = root.into();
        self
    }

    pub fn with_output_subfolder(mut self, subfolder: impl Into<String>) -> Self {
        self.output_subfolder = subfolder.into();
        self
    }

    pub fn with_contract_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.contract_path = Some(path.into());
        self
    }

    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validate_against_contract = enabled;
        self
    }

    pub fn with_empty_contract_policy(mut self, policy: EmptyContractPolicy) -> Self {
        self.empty_contract_policy = policy;
        self
    }

    pub fn with_session_override(mut self, session: impl Into<String>) -> Self {
        self.session_override = Some(session.into());
        self
    }

    pub fn with_session_template(mut self, template: SessionTemplate) -> Self {
        self.session_template = Some(template);
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    pub fn with_sync_on_write(mut self, sync: bool) -> Self {
        self.sync_on_write = sync;
        self
    }

    /// `<output_root>/<output_subfolder>`
    pub fn output_dir(&self) -> PathBuf {
        self.output_root.join(&self.output_subfolder)
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }
}
