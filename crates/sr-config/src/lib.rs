//! schema-relay options loading and validation.
//!
//! This crate provides:
//! - Raw `InspectorOptions` from a JSON file and `SR_*` variables
//! - Options file resolution (CLI → env → XDG)
//! - The validated `InspectorConfig` handed to every component

pub mod environment;
pub mod inspector;
pub mod options;
pub mod resolve;
pub mod validate;

pub use environment::Environment;
pub use inspector::{BatchConfig, DeliveryConfig, InspectorConfig, SchemaConfig, SessionConfig};
pub use options::InspectorOptions;
pub use resolve::{load_options, resolve_config, ConfigSource};
pub use validate::{ValidationError, ValidationResult};
