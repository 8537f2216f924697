//! Resolved inspector configuration.
//!
//! [`InspectorConfig`] is the validated, fully defaulted form of
//! [`InspectorOptions`]. It is passed explicitly to every component at
//! construction; runtime tuning (batch size, flush interval) is applied per
//! instance afterwards and never through shared global state.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::environment::Environment;
use crate::options::InspectorOptions;
use crate::validate::{require_non_blank, validate_config, ValidationResult};

/// Default number of queued events that triggers a flush.
pub const DEFAULT_BATCH_SIZE: usize = 30;

/// Default seconds between time-triggered flushes.
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 30;

/// Flush interval forced in dev so events show up quickly.
pub const DEV_FLUSH_INTERVAL_SECS: u64 = 1;

/// Default inactivity after which a new session starts (5 minutes).
pub const DEFAULT_SESSION_INACTIVITY_SECS: u64 = 300;

/// Default nesting limit for schema extraction.
pub const DEFAULT_MAX_SCHEMA_DEPTH: usize = 32;

/// Default collection endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.avo.app/inspector/v1/track";

/// Default HTTP request timeout.
pub const DEFAULT_DELIVERY_TIMEOUT_SECS: u64 = 10;

/// Directory name used under the platform data directory.
const STORAGE_DIR_NAME: &str = "schema_relay";

/// Flush thresholds for the batcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Queue length at or above which a flush triggers.
    pub batch_size_threshold: usize,

    /// Seconds since the last flush at or above which a flush triggers.
    pub flush_interval_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            batch_size_threshold: DEFAULT_BATCH_SIZE,
            flush_interval_secs: DEFAULT_FLUSH_INTERVAL_SECS,
        }
    }
}

impl BatchConfig {
    /// Defaults for `env`: dev flushes every second.
    pub fn for_environment(env: Environment) -> Self {
        let mut config = BatchConfig::default();
        if env.is_dev() {
            config.flush_interval_secs = DEV_FLUSH_INTERVAL_SECS;
        }
        config
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size_threshold = batch_size;
        self
    }

    pub fn with_flush_interval_secs(mut self, secs: u64) -> Self {
        self.flush_interval_secs = secs;
        self
    }

    pub fn flush_interval(&self) -> chrono::Duration {
        seconds(self.flush_interval_secs)
    }
}

/// Session lifecycle settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub inactivity_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            inactivity_secs: DEFAULT_SESSION_INACTIVITY_SECS,
        }
    }
}

impl SessionConfig {
    pub fn inactivity(&self) -> chrono::Duration {
        seconds(self.inactivity_secs)
    }
}

/// Schema extraction settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub max_depth: usize,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        SchemaConfig {
            max_depth: DEFAULT_MAX_SCHEMA_DEPTH,
        }
    }
}

/// Remote delivery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        DeliveryConfig {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: DEFAULT_DELIVERY_TIMEOUT_SECS,
        }
    }
}

impl DeliveryConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

/// Validated configuration for one inspector instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectorConfig {
    pub api_key: String,
    pub app_version: String,
    pub app_name: String,
    pub environment: Environment,
    pub batch: BatchConfig,
    pub session: SessionConfig,
    pub schema: SchemaConfig,
    pub delivery: DeliveryConfig,

    /// Verbose payload logging for this instance.
    pub log_enabled: bool,

    /// Directory for the file-backed durable medium.
    pub storage_dir: PathBuf,
}

impl InspectorConfig {
    /// Resolve raw options into a validated configuration.
    ///
    /// Fails when the API key or version is missing or blank, or when a
    /// numeric option is out of range. A missing environment falls back to
    /// dev with a warning.
    pub fn resolve(options: InspectorOptions) -> ValidationResult<Self> {
        let api_key = require_non_blank("api_key", options.api_key.as_deref())?;
        let app_version = require_non_blank("version", options.version.as_deref())?;

        let environment = match options.env {
            Some(env) => env,
            None => {
                warn!(
                    default = %Environment::Dev,
                    "no environment provided; defaulting to dev, set it to prod before release"
                );
                Environment::Dev
            }
        };

        let mut batch = BatchConfig::for_environment(environment);
        if let Some(size) = options.batch_size {
            batch.batch_size_threshold = size;
        }
        if let Some(secs) = options.batch_flush_seconds {
            batch.flush_interval_secs = secs;
        }

        let mut session = SessionConfig::default();
        if let Some(secs) = options.session_inactivity_seconds {
            session.inactivity_secs = secs;
        }

        let mut schema = SchemaConfig::default();
        if let Some(depth) = options.max_schema_depth {
            schema.max_depth = depth;
        }

        let mut delivery = DeliveryConfig::default();
        if let Some(endpoint) = options.endpoint {
            delivery.endpoint = endpoint.trim().to_string();
        }
        if let Some(secs) = options.delivery_timeout_seconds {
            delivery.timeout_secs = secs;
        }

        let config = InspectorConfig {
            api_key,
            app_version,
            app_name: options.app_name.unwrap_or_default(),
            environment,
            batch,
            session,
            schema,
            delivery,
            log_enabled: options.log_enabled.unwrap_or(environment.is_dev()),
            storage_dir: options.storage_dir.unwrap_or_else(default_storage_dir),
        };

        validate_config(&config)?;
        Ok(config)
    }
}

// chrono panics above i64::MAX milliseconds
fn seconds(secs: u64) -> chrono::Duration {
    let capped = i64::try_from(secs).unwrap_or(i64::MAX).min(i64::MAX / 1000);
    chrono::Duration::seconds(capped)
}

/// Platform data directory for the durable queue and session state.
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(STORAGE_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::ValidationError;

    #[test]
    fn test_resolve_requires_api_key_and_version() {
        let err = InspectorConfig::resolve(InspectorOptions::new("", "1.0")).unwrap_err();
        assert!(matches!(err, ValidationError::MissingField(ref f) if f == "api_key"));

        let err = InspectorConfig::resolve(InspectorOptions::new("key", "  ")).unwrap_err();
        assert!(matches!(err, ValidationError::MissingField(ref f) if f == "version"));
    }

    #[test]
    fn test_missing_env_defaults_to_dev() {
        let config = InspectorConfig::resolve(InspectorOptions::new("key", "1.0")).unwrap();
        assert_eq!(config.environment, Environment::Dev);
        assert_eq!(config.batch.flush_interval_secs, DEV_FLUSH_INTERVAL_SECS);
        assert!(config.log_enabled);
    }

    #[test]
    fn test_prod_defaults() {
        let config =
            InspectorConfig::resolve(InspectorOptions::new("key", "1.0").with_env(Environment::Prod))
                .unwrap();
        assert_eq!(config.batch, BatchConfig::default());
        assert_eq!(config.session.inactivity_secs, 300);
        assert_eq!(config.schema.max_depth, 32);
        assert_eq!(config.delivery.endpoint, DEFAULT_ENDPOINT);
        assert!(!config.log_enabled);
    }

    #[test]
    fn test_explicit_flush_seconds_win_over_dev() {
        let mut opts = InspectorOptions::new("key", "1.0").with_env(Environment::Dev);
        opts.batch_flush_seconds = Some(12);
        opts.log_enabled = Some(false);
        let config = InspectorConfig::resolve(opts).unwrap();
        assert_eq!(config.batch.flush_interval_secs, 12);
        assert!(!config.log_enabled);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut opts = InspectorOptions::new("key", "1.0").with_env(Environment::Prod);
        opts.batch_size = Some(0);
        let err = InspectorConfig::resolve(opts).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { ref field, .. } if field == "batch_size"));
    }

    #[test]
    fn test_batch_config_builders() {
        let batch = BatchConfig::default()
            .with_batch_size(5)
            .with_flush_interval_secs(2);
        assert_eq!(batch.batch_size_threshold, 5);
        assert_eq!(batch.flush_interval(), chrono::Duration::seconds(2));
    }
}
