//! Options validation errors and semantic validation.

use thiserror::Error;

use crate::inspector::InspectorConfig;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Options validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    ///
    /// Matches the code of the `sr_common::Error` this converts into.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) | ValidationError::ParseError(_) => 10,
            ValidationError::MissingField(_) => 11,
            ValidationError::InvalidValue { .. } => 12,
        }
    }
}

impl From<ValidationError> for sr_common::Error {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::IoError(m) => sr_common::Error::Config(format!("cannot read options: {m}")),
            ValidationError::ParseError(m) => {
                sr_common::Error::Config(format!("cannot parse options: {m}"))
            }
            ValidationError::MissingField(field) => sr_common::Error::MissingOption { field },
            ValidationError::InvalidValue { field, message } => {
                sr_common::Error::InvalidOption { field, message }
            }
        }
    }
}

/// Reject a required string option that is absent or only whitespace.
pub fn require_non_blank(field: &str, value: Option<&str>) -> ValidationResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.to_string()),
        _ => Err(ValidationError::MissingField(field.to_string())),
    }
}

/// Validate a resolved configuration semantically.
pub fn validate_config(config: &InspectorConfig) -> ValidationResult<()> {
    if config.batch.batch_size_threshold == 0 {
        return Err(ValidationError::InvalidValue {
            field: "batch_size".to_string(),
            message: "Must be at least 1".to_string(),
        });
    }

    if config.session.inactivity_secs == 0 {
        return Err(ValidationError::InvalidValue {
            field: "session_inactivity_seconds".to_string(),
            message: "Must be at least 1".to_string(),
        });
    }

    if config.schema.max_depth == 0 {
        return Err(ValidationError::InvalidValue {
            field: "max_schema_depth".to_string(),
            message: "Must be at least 1".to_string(),
        });
    }

    let endpoint = config.delivery.endpoint.as_str();
    if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
        return Err(ValidationError::InvalidValue {
            field: "endpoint".to_string(),
            message: format!("Must be an http(s) URL, got {:?}", endpoint),
        });
    }

    if config.delivery.timeout_secs == 0 {
        return Err(ValidationError::InvalidValue {
            field: "delivery_timeout_seconds".to_string(),
            message: "Must be at least 1".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_non_blank() {
        assert_eq!(require_non_blank("api_key", Some("k")).unwrap(), "k");
        assert!(matches!(
            require_non_blank("api_key", Some("   ")),
            Err(ValidationError::MissingField(f)) if f == "api_key"
        ));
        assert!(require_non_blank("version", None).is_err());
    }

    #[test]
    fn test_validation_error_codes() {
        assert_eq!(ValidationError::MissingField("api_key".into()).code(), 11);
        assert_eq!(
            ValidationError::InvalidValue {
                field: "batch_size".into(),
                message: "zero".into()
            }
            .code(),
            12
        );
        assert_eq!(ValidationError::ParseError("eof".into()).code(), 10);
    }

    #[test]
    fn test_into_common_error() {
        let err: sr_common::Error = ValidationError::MissingField("version".into()).into();
        assert!(matches!(err, sr_common::Error::MissingOption { ref field } if field == "version"));
    }
}
