//! Error types for schema-relay.
//!
//! Every failure that crosses a crate boundary is folded into [`Error`],
//! which carries:
//! - a stable numeric code for machine parsing
//! - a category for grouping
//! - a recoverability hint
//! - a remediation sentence for humans
//!
//! Runtime tracking paths never return these to the host application; they
//! are logged at the public boundary. Only construction-time configuration
//! errors reach the caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for schema-relay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Options, environment, and validation errors.
    Config,
    /// Schema extraction errors.
    Schema,
    /// Durable store errors.
    Storage,
    /// Remote delivery errors.
    Delivery,
    /// Session bookkeeping errors.
    Session,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Schema => write!(f, "schema"),
            ErrorCategory::Storage => write!(f, "storage"),
            ErrorCategory::Delivery => write!(f, "delivery"),
            ErrorCategory::Session => write!(f, "session"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for schema-relay.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("missing required option: {field}")]
    MissingOption { field: String },

    #[error("invalid value for {field}: {message}")]
    InvalidOption { field: String, message: String },

    // Schema errors (20-29)
    #[error("schema extraction failed: {0}")]
    Schema(String),

    #[error("schema nesting exceeds the limit of {limit} levels")]
    RecursionLimitExceeded { limit: usize },

    // Storage errors (30-39)
    #[error("storage error: {0}")]
    Storage(String),

    #[error("stored value under {key} is corrupted")]
    StorageCorrupted { key: String },

    // Delivery errors (40-49)
    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("endpoint rejected batch with status {status}")]
    DeliveryRejected { status: u16 },

    // Session errors (50-59)
    #[error("session error: {0}")]
    Session(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Schema errors
    /// - 30-39: Storage errors
    /// - 40-49: Delivery errors
    /// - 50-59: Session errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::MissingOption { .. } => 11,
            Error::InvalidOption { .. } => 12,
            Error::Schema(_) => 20,
            Error::RecursionLimitExceeded { .. } => 21,
            Error::Storage(_) => 30,
            Error::StorageCorrupted { .. } => 31,
            Error::Delivery(_) => 40,
            Error::DeliveryRejected { .. } => 41,
            Error::Session(_) => 50,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::MissingOption { .. } | Error::InvalidOption { .. } => {
                ErrorCategory::Config
            }
            Error::Schema(_) | Error::RecursionLimitExceeded { .. } => ErrorCategory::Schema,
            Error::Storage(_) | Error::StorageCorrupted { .. } => ErrorCategory::Storage,
            Error::Delivery(_) | Error::DeliveryRejected { .. } => ErrorCategory::Delivery,
            Error::Session(_) => ErrorCategory::Session,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable without a code
    /// or configuration change.
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Config: the instance cannot run until the options are fixed
            Error::Config(_) => false,
            Error::MissingOption { .. } => false,
            Error::InvalidOption { .. } => false,

            // Schema: the payload is the problem, the next one may be fine
            Error::Schema(_) => true,
            Error::RecursionLimitExceeded { .. } => true,

            Error::Storage(_) => true,
            Error::StorageCorrupted { .. } => true,

            // Delivery: queued items are retried on the next trigger
            Error::Delivery(_) => true,
            Error::DeliveryRejected { status } => *status >= 500 || *status == 429,

            Error::Session(_) => true,

            Error::Io(_) => true,
            Error::Json(_) => false,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => "Check the options file and SR_* environment variables.",
            Error::MissingOption { .. } => {
                "Provide the option in the options file or through its SR_* environment variable."
            }
            Error::InvalidOption { .. } => "Correct the option value; see the field name above.",
            Error::Schema(_) => "The event payload could not be classified. Check it is a JSON object.",
            Error::RecursionLimitExceeded { .. } => {
                "The payload is nested too deeply (or cyclic). Flatten it or raise schema.max_depth."
            }
            Error::Storage(_) => "Check the storage directory exists and is writable.",
            Error::StorageCorrupted { .. } => {
                "The stored value will be ignored. Delete the storage directory to reset it."
            }
            Error::Delivery(_) => "Queued events are retried automatically on the next flush.",
            Error::DeliveryRejected { .. } => {
                "Verify the API key and endpoint. Queued events stay queued until accepted."
            }
            Error::Session(_) => "A new session will be started on the next tracking call.",
            Error::Io(_) => "Check disk space and permissions, then retry.",
            Error::Json(_) => "Invalid JSON input. Validate it with 'jq .' before retrying.",
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::MissingOption { .. } => "Missing Option",
            Error::InvalidOption { .. } => "Invalid Option",
            Error::Schema(_) => "Schema Extraction Error",
            Error::RecursionLimitExceeded { .. } => "Schema Too Deep",
            Error::Storage(_) => "Storage Error",
            Error::StorageCorrupted { .. } => "Corrupted Stored Value",
            Error::Delivery(_) => "Delivery Failed",
            Error::DeliveryRejected { .. } => "Delivery Rejected",
            Error::Session(_) => "Session Error",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Error",
        }
    }

    /// Format for human consumption: headline, reason, and fix.
    pub fn format_human(&self) -> String {
        format!(
            "\u{2717} {}\n  Reason: {}\n  Fix: {}",
            self.headline(),
            self,
            self.remediation()
        )
    }
}
