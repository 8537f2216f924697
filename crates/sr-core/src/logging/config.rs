//! Log level and format, resolved from `SR_LOG`, `RUST_LOG`,
//! `SR_LOG_FORMAT`, and the `--log-level` / `--log-format` flags.

use clap::ValueEnum;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

pub const ENV_LOG: &str = "SR_LOG";
pub const ENV_LOG_FORMAT: &str = "SR_LOG_FORMAT";

/// Log output format on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Human,
    /// One JSON object per line.
    #[value(alias = "json")]
    Jsonl,
}

/// Minimum level for schema-relay's own crates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    /// Directive spelling understood by `EnvFilter`.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }

    /// The most verbose level a `RUST_LOG` style filter enables anywhere.
    fn from_rust_log(filter: &str) -> Option<Self> {
        let hint = EnvFilter::try_new(filter).ok()?.max_level_hint()?;
        let level = if hint == LevelFilter::TRACE {
            LogLevel::Trace
        } else if hint == LevelFilter::DEBUG {
            LogLevel::Debug
        } else if hint == LevelFilter::INFO {
            LogLevel::Info
        } else if hint == LevelFilter::WARN {
            LogLevel::Warn
        } else if hint == LevelFilter::ERROR {
            LogLevel::Error
        } else {
            LogLevel::Off
        };
        Some(level)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Whether human output carries timestamps.
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::default(),
            level: LogLevel::default(),
            timestamps: true,
        }
    }
}

impl LogConfig {
    /// Create config from the process environment and CLI overrides.
    pub fn from_env(cli_level: Option<LogLevel>, cli_format: Option<LogFormat>) -> Self {
        Self::from_lookup(|key| std::env::var(key).ok(), cli_level, cli_format)
    }

    /// Create config from variables read through `lookup` and CLI overrides.
    ///
    /// Unparseable values are ignored. `SR_LOG` wins over `RUST_LOG`, and
    /// flags win over both.
    pub fn from_lookup<F>(lookup: F, cli_level: Option<LogLevel>, cli_format: Option<LogFormat>) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_level = match lookup(ENV_LOG) {
            Some(val) => LogLevel::from_str(val.trim(), true).ok(),
            None => lookup("RUST_LOG").and_then(|val| LogLevel::from_rust_log(&val)),
        };
        let env_format = lookup(ENV_LOG_FORMAT).and_then(|val| LogFormat::from_str(val.trim(), true).ok());

        LogConfig {
            level: cli_level.or(env_level).unwrap_or_default(),
            format: cli_format.or(env_format).unwrap_or_default(),
            ..LogConfig::default()
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }
}
