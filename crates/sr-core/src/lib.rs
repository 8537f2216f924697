//! schema-relay inspector facade.
//!
//! This crate provides:
//! - The `Inspector` tracking surface over the telemetry pipeline
//! - Structured logging setup for binaries
//! - Stable CLI exit codes, payload input, and queue reports

pub mod exit_codes;
pub mod input;
pub mod inspector;
pub mod logging;
pub mod queue_report;

pub use exit_codes::ExitCode;
pub use inspector::Inspector;
pub use queue_report::QueueReport;
