//! schema-relay common types, IDs, and errors.
//!
//! This crate provides foundational types shared across the workspace:
//! - Session and message identity types
//! - The unified error type with stable codes

pub mod error;
pub mod id;

pub use error::{Error, ErrorCategory, Result};
pub use id::{MessageId, SessionId};

/// Library version reported on the wire.
pub const LIB_VERSION: &str = env!("CARGO_PKG_VERSION");
