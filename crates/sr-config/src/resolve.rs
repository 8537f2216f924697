//! Options file discovery and loading.
//!
//! Resolution order: CLI argument → `SR_CONFIG` → XDG config dir → none.
//! Whatever file is found is then overlaid with `SR_*` variables.

use std::path::{Path, PathBuf};

use crate::inspector::InspectorConfig;
use crate::options::InspectorOptions;
use crate::validate::ValidationResult;

/// Where the options file was found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,

    /// Set via `SR_CONFIG`.
    Environment,

    /// Found in the XDG config directory.
    XdgConfig,

    /// No file; options come from the environment only.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Environment variable naming an options file.
pub const ENV_CONFIG_PATH: &str = "SR_CONFIG";

/// Options file name inside the config directory.
const OPTIONS_FILENAME: &str = "options.json";

/// Application name for XDG directories.
const APP_NAME: &str = "schema-relay";

/// Locate the options file.
///
/// A CLI path is returned even when it does not exist so that loading it
/// reports the mistake instead of silently falling through.
pub fn resolve_options_path(cli_path: Option<&Path>) -> (Option<PathBuf>, ConfigSource) {
    resolve_options_path_with(cli_path, |key| std::env::var(key).ok(), xdg_config_dir())
}

/// Resolution with injected environment lookup and config directory.
pub fn resolve_options_path_with<F>(
    cli_path: Option<&Path>,
    lookup: F,
    config_dir: Option<PathBuf>,
) -> (Option<PathBuf>, ConfigSource)
where
    F: Fn(&str) -> Option<String>,
{
    // 1. CLI argument
    if let Some(path) = cli_path {
        return (Some(path.to_path_buf()), ConfigSource::CliArgument);
    }

    // 2. Environment variable
    if let Some(env_path) = lookup(ENV_CONFIG_PATH) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return (Some(path), ConfigSource::Environment);
        }
    }

    // 3. XDG config directory
    if let Some(dir) = config_dir {
        let path = dir.join(OPTIONS_FILENAME);
        if path.exists() {
            return (Some(path), ConfigSource::XdgConfig);
        }
    }

    (None, ConfigSource::BuiltinDefault)
}

/// XDG config directory for schema-relay.
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Load options from the resolved file (if any) and overlay the environment.
pub fn load_options(cli_path: Option<&Path>) -> ValidationResult<(InspectorOptions, ConfigSource)> {
    let (path, source) = resolve_options_path(cli_path);
    let options = match path {
        Some(path) => {
            tracing::debug!(path = %path.display(), source = %source, "loading options file");
            InspectorOptions::from_file(&path)?
        }
        None => InspectorOptions::default(),
    };
    Ok((options.apply_env()?, source))
}

/// Load, overlay, and validate in one step.
pub fn resolve_config(cli_path: Option<&Path>) -> ValidationResult<InspectorConfig> {
    let (options, _source) = load_options(cli_path)?;
    InspectorConfig::resolve(options)
}
