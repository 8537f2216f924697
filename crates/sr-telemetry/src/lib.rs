//! schema-relay event telemetry.
//!
//! This crate provides:
//! - Structural schema inference for event payloads
//! - The durable, capacity-bounded event queue
//! - A persistent key-value store over pluggable durable media
//! - The threshold-triggered batcher with delivery reconciliation
//! - Session lifecycle tracking
//! - Wire bodies and the HTTP delivery client

pub mod batcher;
pub mod delivery;
pub mod queue;
pub mod schema;
pub mod session;
pub mod store;
pub mod wire;

pub use batcher::{evaluate_flush, Batcher, FlushDecision, FlushTrigger};
pub use delivery::{DeliveryClient, DeliveryError, HttpDeliveryClient};
pub use queue::{EventQueue, QueuedEvent, MAX_QUEUE_LEN};
pub use schema::{extract_schema, SchemaEntry, SchemaError, SchemaExtractor, TypeTag};
pub use session::{SessionOutcome, SessionState, SessionTracker};
pub use store::{
    DurableMedium, FileMedium, MemoryMedium, PersistentStore, StorageError, EVENTS_KEY,
    SESSION_KEY,
};
pub use wire::{build_event_schema_body, build_session_started_body, WireBody, WireContext};
