//! Delivery of batches to the collection endpoint.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::Deserialize;
use sr_config::InspectorConfig;
use thiserror::Error;
use tracing::{debug, trace};

use crate::queue::QueuedEvent;
use crate::wire::{build_body, WireBody, WireContext};

/// Errors from a delivery attempt. The batch stays queued on any of them.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("endpoint rejected batch with status {status}")]
    Rejected { status: u16 },

    #[error("failed to encode batch: {0}")]
    Encode(#[from] serde_json::Error),
}

impl DeliveryError {
    /// Code of the `sr_common::Error` this converts into.
    pub fn code(&self) -> u32 {
        match self {
            DeliveryError::Transport(_) => 40,
            DeliveryError::Rejected { .. } => 41,
            DeliveryError::Encode(_) => 61,
        }
    }
}

impl From<DeliveryError> for sr_common::Error {
    fn from(err: DeliveryError) -> Self {
        match err {
            DeliveryError::Rejected { status } => sr_common::Error::DeliveryRejected { status },
            DeliveryError::Encode(e) => sr_common::Error::Json(e),
            other => sr_common::Error::Delivery(other.to_string()),
        }
    }
}

/// Sends one batch of queued events.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    /// Deliver `items` as one batch. `Ok` means every item may be dropped
    /// from the queue.
    async fn send_batch(&self, items: &[QueuedEvent]) -> Result<(), DeliveryError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackResponse {
    sampling_rate: Option<f64>,
}

/// HTTP client posting JSON arrays of [`WireBody`].
///
/// The endpoint may answer with a `samplingRate`; later batches are then
/// dropped with probability `1 - samplingRate` and reported as delivered.
pub struct HttpDeliveryClient {
    http: reqwest::Client,
    endpoint: String,
    context: WireContext,
    sampling_rate_bits: AtomicU64,
}

impl std::fmt::Debug for HttpDeliveryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDeliveryClient")
            .field("endpoint", &self.endpoint)
            .field("sampling_rate", &self.sampling_rate())
            .finish()
    }
}

impl HttpDeliveryClient {
    pub fn new(config: &InspectorConfig) -> Result<Self, DeliveryError> {
        let http = reqwest::Client::builder()
            .timeout(config.delivery.timeout())
            .build()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;
        Ok(HttpDeliveryClient {
            http,
            endpoint: config.delivery.endpoint.clone(),
            context: WireContext::from_config(config),
            sampling_rate_bits: AtomicU64::new(1.0f64.to_bits()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn sampling_rate(&self) -> f64 {
        f64::from_bits(self.sampling_rate_bits.load(Ordering::Relaxed))
    }

    /// Set the sampling rate, clamped to `0.0..=1.0`.
    pub fn set_sampling_rate(&self, rate: f64) {
        let rate = if rate.is_nan() { 1.0 } else { rate.clamp(0.0, 1.0) };
        self.sampling_rate_bits
            .store(rate.to_bits(), Ordering::Relaxed);
    }

    fn sampled_out(&self) -> bool {
        let rate = self.sampling_rate();
        rate < 1.0 && rand::random::<f64>() >= rate
    }

    pub fn bodies(&self, items: &[QueuedEvent]) -> Vec<WireBody> {
        items.iter().map(|item| build_body(item, &self.context)).collect()
    }
}

#[async_trait]
impl DeliveryClient for HttpDeliveryClient {
    async fn send_batch(&self, items: &[QueuedEvent]) -> Result<(), DeliveryError> {
        if items.is_empty() {
            return Ok(());
        }
        if self.sampled_out() {
            debug!(
                items = items.len(),
                sampling_rate = self.sampling_rate(),
                "batch dropped by sampling"
            );
            return Ok(());
        }

        let bodies = self.bodies(items);
        let payload = serde_json::to_vec(&bodies)?;
        trace!(endpoint = %self.endpoint, bytes = payload.len(), "posting batch");

        let response = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
            });
        }

        // The body is optional; anything unparsable keeps the current rate.
        if let Ok(TrackResponse {
            sampling_rate: Some(rate),
        }) = response.json::<TrackResponse>().await
        {
            if rate != self.sampling_rate() {
                debug!(sampling_rate = rate, "endpoint updated sampling rate");
            }
            self.set_sampling_rate(rate);
        }
        Ok(())
    }
}
