//! Shared helpers for sr-telemetry integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sr_config::BatchConfig;
use sr_telemetry::{DeliveryClient, DeliveryError, QueuedEvent};
use tokio::sync::Semaphore;

/// Delivery client that records every batch it is handed.
///
/// A gated client blocks each delivery until [`RecordingClient::release`].
pub struct RecordingClient {
    batches: Mutex<Vec<Vec<QueuedEvent>>>,
    failing: AtomicBool,
    gate: Option<Semaphore>,
}

impl RecordingClient {
    pub fn new() -> Arc<Self> {
        Arc::new(RecordingClient {
            batches: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            gate: None,
        })
    }

    pub fn gated() -> Arc<Self> {
        Arc::new(RecordingClient {
            batches: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            gate: Some(Semaphore::new(0)),
        })
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn batches(&self) -> Vec<Vec<QueuedEvent>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.batches.lock().unwrap().len()
    }
}

#[async_trait]
impl DeliveryClient for RecordingClient {
    async fn send_batch(&self, items: &[QueuedEvent]) -> Result<(), DeliveryError> {
        self.batches.lock().unwrap().push(items.to_vec());
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError::Rejected { status: 503 });
        }
        Ok(())
    }
}

/// Fixed reference instant.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 14, 30, 0).unwrap()
}

/// Thresholds that never fire on their own.
pub fn quiet_config() -> BatchConfig {
    BatchConfig::default()
        .with_batch_size(100_000)
        .with_flush_interval_secs(86_400)
}

pub fn event_name(event: &QueuedEvent) -> Option<&str> {
    match event {
        QueuedEvent::EventSchema { event_name, .. } => Some(event_name.as_str()),
        QueuedEvent::SessionStarted { .. } => None,
    }
}
