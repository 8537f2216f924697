//! User-supplied options, before validation.
//!
//! Options come from an optional JSON file and are then overlaid with
//! `SR_*` environment variables. Every field is optional here; required
//! fields are enforced by [`InspectorConfig::resolve`](crate::InspectorConfig::resolve).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::environment::Environment;
use crate::validate::{ValidationError, ValidationResult};

pub const ENV_API_KEY: &str = "SR_API_KEY";
pub const ENV_APP_VERSION: &str = "SR_APP_VERSION";
pub const ENV_APP_NAME: &str = "SR_APP_NAME";
pub const ENV_ENVIRONMENT: &str = "SR_ENV";
pub const ENV_BATCH_SIZE: &str = "SR_BATCH_SIZE";
pub const ENV_BATCH_FLUSH_SECS: &str = "SR_BATCH_FLUSH_SECS";
pub const ENV_ENDPOINT: &str = "SR_ENDPOINT";
pub const ENV_STORAGE_DIR: &str = "SR_STORAGE_DIR";

/// Raw inspector options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InspectorOptions {
    /// API key identifying the workspace on the collection endpoint.
    pub api_key: Option<String>,

    /// Host application version. Must be comparable (integer or semver).
    pub version: Option<String>,

    /// Host application name.
    pub app_name: Option<String>,

    /// Deployment environment. Defaults to dev with a warning.
    pub env: Option<Environment>,

    /// Queue length that triggers a flush.
    pub batch_size: Option<usize>,

    /// Seconds since the last flush that trigger a flush.
    pub batch_flush_seconds: Option<u64>,

    /// Seconds of inactivity after which a new session starts.
    pub session_inactivity_seconds: Option<u64>,

    /// Maximum nesting depth accepted by schema extraction.
    pub max_schema_depth: Option<usize>,

    /// Collection endpoint URL.
    pub endpoint: Option<String>,

    /// HTTP request timeout in seconds.
    pub delivery_timeout_seconds: Option<u64>,

    /// Directory holding the durable queue and session state.
    pub storage_dir: Option<PathBuf>,

    /// Verbose payload logging. Defaults to on in dev.
    pub log_enabled: Option<bool>,
}

impl InspectorOptions {
    /// Options with only the two required fields set.
    pub fn new(api_key: impl Into<String>, version: impl Into<String>) -> Self {
        InspectorOptions {
            api_key: Some(api_key.into()),
            version: Some(version.into()),
            ..Default::default()
        }
    }

    pub fn with_env(mut self, env: Environment) -> Self {
        self.env = Some(env);
        self
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = Some(dir.into());
        self
    }

    /// Parse options from a JSON string.
    pub fn from_json(json: &str) -> ValidationResult<Self> {
        serde_json::from_str(json).map_err(|e| ValidationError::ParseError(e.to_string()))
    }

    /// Load options from a JSON file.
    pub fn from_file(path: &Path) -> ValidationResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ValidationError::IoError(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Overlay `SR_*` variables from the process environment.
    pub fn apply_env(self) -> ValidationResult<Self> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay `SR_*` variables read through `lookup`.
    ///
    /// Set variables win over values loaded from a file.
    pub fn apply_env_from<F>(mut self, lookup: F) -> ValidationResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_API_KEY) {
            self.api_key = Some(v);
        }
        if let Some(v) = lookup(ENV_APP_VERSION) {
            self.version = Some(v);
        }
        if let Some(v) = lookup(ENV_APP_NAME) {
            self.app_name = Some(v);
        }
        if let Some(v) = lookup(ENV_ENVIRONMENT) {
            let env = v.parse::<Environment>().map_err(|message| ValidationError::InvalidValue {
                field: ENV_ENVIRONMENT.to_string(),
                message,
            })?;
            self.env = Some(env);
        }
        if let Some(v) = lookup(ENV_BATCH_SIZE) {
            self.batch_size = Some(parse_number(ENV_BATCH_SIZE, &v)?);
        }
        if let Some(v) = lookup(ENV_BATCH_FLUSH_SECS) {
            self.batch_flush_seconds = Some(parse_number(ENV_BATCH_FLUSH_SECS, &v)?);
        }
        if let Some(v) = lookup(ENV_ENDPOINT) {
            self.endpoint = Some(v);
        }
        if let Some(v) = lookup(ENV_STORAGE_DIR) {
            self.storage_dir = Some(PathBuf::from(v));
        }
        Ok(self)
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, raw: &str) -> ValidationResult<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| ValidationError::InvalidValue {
            field: field.to_string(),
            message: format!("expected a non-negative integer, got {:?}", raw),
        })
}
