//! Durable, threshold-triggered batching.
//!
//! The batcher owns the persisted [`EventQueue`]. Every append evaluates the
//! flush thresholds; a triggered flush hands a snapshot of the whole queue
//! to the [`DeliveryClient`] on a spawned task and returns immediately. When
//! delivery resolves, exactly the delivered message ids are removed from the
//! (possibly grown) queue. Failed batches stay queued and are retried by the
//! next natural trigger.
//!
//! At most one batch is in flight. A trigger that fires while a batch is in
//! flight is reported as pending and does not reset the flush clock.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use sr_common::{MessageId, SessionId};
use sr_config::BatchConfig;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::delivery::{DeliveryClient, DeliveryError};
use crate::queue::{EventQueue, QueuedEvent};
use crate::schema::SchemaEntry;
use crate::store::{PersistentStore, EVENTS_KEY};

// ----------------------------------------------------------------------------
// Threshold evaluation
// ----------------------------------------------------------------------------

/// Why a flush fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// Queue length reached the batch size threshold.
    Size { queued: usize, threshold: usize },
    /// Time since the last flush reached the flush interval.
    Interval { elapsed_secs: i64 },
}

/// Outcome of evaluating the thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushDecision {
    /// Nothing to do.
    Idle,
    /// A threshold is met but a batch is already in flight.
    Pending(FlushTrigger),
    /// Send the queue now.
    Flush(FlushTrigger),
}

/// Evaluate the flush thresholds. Pure; the caller applies the decision.
///
/// An empty queue never flushes. Size is checked before time.
pub fn evaluate_flush(
    config: &BatchConfig,
    last_flush_at: DateTime<Utc>,
    queue_len: usize,
    in_flight: bool,
    now: DateTime<Utc>,
) -> FlushDecision {
    if queue_len == 0 {
        return FlushDecision::Idle;
    }

    let elapsed = now - last_flush_at;
    let trigger = if queue_len >= config.batch_size_threshold {
        FlushTrigger::Size {
            queued: queue_len,
            threshold: config.batch_size_threshold,
        }
    } else if elapsed >= config.flush_interval() {
        FlushTrigger::Interval {
            elapsed_secs: elapsed.num_seconds(),
        }
    } else {
        return FlushDecision::Idle;
    };

    if in_flight {
        FlushDecision::Pending(trigger)
    } else {
        FlushDecision::Flush(trigger)
    }
}

// ----------------------------------------------------------------------------
// Batcher
// ----------------------------------------------------------------------------

#[derive(Debug)]
struct FlushState {
    config: BatchConfig,
    last_flush_at: DateTime<Utc>,
    in_flight: bool,
}

struct BatcherInner {
    store: PersistentStore,
    client: Arc<dyn DeliveryClient>,
    state: Mutex<FlushState>,
    busy: watch::Sender<bool>,
}

/// Queue owner and flush engine. Cheap to clone.
#[derive(Clone)]
pub struct Batcher {
    inner: Arc<BatcherInner>,
}

impl std::fmt::Debug for Batcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock_state();
        f.debug_struct("Batcher")
            .field("config", &state.config)
            .field("last_flush_at", &state.last_flush_at)
            .field("in_flight", &state.in_flight)
            .finish()
    }
}

impl Batcher {
    /// Take ownership of the persisted queue and check it against the thresholds.
    pub fn open(store: PersistentStore, client: Arc<dyn DeliveryClient>, config: BatchConfig) -> Self {
        Self::open_at(store, client, config, Utc::now())
    }

    pub fn open_at(
        store: PersistentStore,
        client: Arc<dyn DeliveryClient>,
        config: BatchConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let (busy, _) = watch::channel(false);
        let batcher = Batcher {
            inner: Arc::new(BatcherInner {
                store,
                client,
                state: Mutex::new(FlushState {
                    config,
                    last_flush_at: now,
                    in_flight: false,
                }),
                busy,
            }),
        };
        debug!(
            queued = batcher.queue_len(),
            batch_size = config.batch_size_threshold,
            flush_interval_secs = config.flush_interval_secs,
            "batcher opened"
        );
        batcher.check_if_batch_needs_to_be_sent_at(now);
        batcher
    }

    fn lock_state(&self) -> MutexGuard<'_, FlushState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load_queue(&self) -> EventQueue {
        self.inner.store.get(EVENTS_KEY).unwrap_or_default()
    }

    /// Number of events currently queued.
    pub fn queue_len(&self) -> usize {
        self.load_queue().len()
    }

    /// Copy of the queued events, oldest first.
    pub fn queued(&self) -> Vec<QueuedEvent> {
        self.load_queue().snapshot()
    }

    pub fn is_flushing(&self) -> bool {
        self.lock_state().in_flight
    }

    pub fn config(&self) -> BatchConfig {
        self.lock_state().config
    }

    pub fn set_batch_size(&self, batch_size: usize) {
        self.lock_state().config.batch_size_threshold = batch_size.max(1);
    }

    pub fn set_flush_interval(&self, secs: u64) {
        self.lock_state().config.flush_interval_secs = secs;
    }

    pub fn handle_session_started(&self, session_id: SessionId) {
        self.handle_session_started_at(session_id, Utc::now());
    }

    pub fn handle_session_started_at(&self, session_id: SessionId, now: DateTime<Utc>) {
        self.enqueue_at(QueuedEvent::session_started(session_id, now), now);
    }

    pub fn handle_track_schema(&self, event_name: &str, schema: Vec<SchemaEntry>) {
        self.handle_track_schema_at(event_name, schema, Utc::now());
    }

    pub fn handle_track_schema_at(&self, event_name: &str, schema: Vec<SchemaEntry>, now: DateTime<Utc>) {
        self.enqueue_at(QueuedEvent::event_schema(event_name, schema, now), now);
    }

    pub fn check_if_batch_needs_to_be_sent(&self) -> FlushDecision {
        self.check_if_batch_needs_to_be_sent_at(Utc::now())
    }

    /// Evaluate the thresholds and dispatch a flush if one fires.
    pub fn check_if_batch_needs_to_be_sent_at(&self, now: DateTime<Utc>) -> FlushDecision {
        let (decision, batch) = {
            let mut state = self.lock_state();
            let queue = self.load_queue();
            self.decide_locked(&mut state, &queue, now)
        };
        if let Some((batch, previous_flush_at)) = batch {
            self.dispatch(batch, previous_flush_at);
        }
        decision
    }

    fn enqueue_at(&self, event: QueuedEvent, now: DateTime<Utc>) {
        let kind = event.kind();
        let (decision, batch) = {
            let mut state = self.lock_state();
            let mut queue = self.load_queue();
            let evicted = queue.push_bounded(event);
            if evicted > 0 {
                warn!(evicted, "event queue full; dropped oldest events");
            }
            self.inner.store.set(EVENTS_KEY, &queue);
            self.decide_locked(&mut state, &queue, now)
        };
        debug!(kind, ?decision, "event queued");
        if let Some((batch, previous_flush_at)) = batch {
            self.dispatch(batch, previous_flush_at);
        }
    }

    fn decide_locked(
        &self,
        state: &mut FlushState,
        queue: &EventQueue,
        now: DateTime<Utc>,
    ) -> (FlushDecision, Option<(Vec<QueuedEvent>, DateTime<Utc>)>) {
        let decision = evaluate_flush(&state.config, state.last_flush_at, queue.len(), state.in_flight, now);
        match decision {
            FlushDecision::Flush(trigger) => {
                debug!(?trigger, queued = queue.len(), "flush triggered");
                let previous_flush_at = std::mem::replace(&mut state.last_flush_at, now);
                self.mark_in_flight(state, true);
                (decision, Some((queue.snapshot(), previous_flush_at)))
            }
            FlushDecision::Pending(trigger) => {
                debug!(?trigger, "flush pending; batch already in flight");
                (decision, None)
            }
            FlushDecision::Idle => (decision, None),
        }
    }

    fn mark_in_flight(&self, state: &mut FlushState, in_flight: bool) {
        state.in_flight = in_flight;
        self.inner.busy.send_replace(in_flight);
    }

    /// Hand `batch` to a delivery task. Without a runtime nothing is sent,
    /// so the flush clock goes back to `previous_flush_at`.
    fn dispatch(&self, batch: Vec<QueuedEvent>, previous_flush_at: DateTime<Utc>) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let this = self.clone();
                handle.spawn(async move {
                    let _ = this.deliver(batch).await;
                });
            }
            Err(_) => {
                warn!(items = batch.len(), "no async runtime available; batch left queued");
                let mut state = self.lock_state();
                state.last_flush_at = previous_flush_at;
                self.mark_in_flight(&mut state, false);
            }
        }
    }

    async fn deliver(&self, batch: Vec<QueuedEvent>) -> Result<usize, DeliveryError> {
        let sent: HashSet<MessageId> = batch.iter().map(QueuedEvent::message_id).collect();
        let result = self.inner.client.send_batch(&batch).await;
        self.reconcile(&sent, result)
    }

    /// Apply a delivery result to the current queue and leave the in-flight state.
    fn reconcile(
        &self,
        sent: &HashSet<MessageId>,
        result: Result<(), DeliveryError>,
    ) -> Result<usize, DeliveryError> {
        let mut state = self.lock_state();
        let outcome = match result {
            Ok(()) => {
                let mut queue = self.load_queue();
                let removed = queue.remove_sent(sent);
                self.inner.store.set(EVENTS_KEY, &queue);
                info!(delivered = removed, remaining = queue.len(), "batch delivered");
                Ok(removed)
            }
            Err(e) => {
                warn!(error = %e, code = e.code(), items = sent.len(), "delivery failed; batch stays queued");
                Err(e)
            }
        };
        self.mark_in_flight(&mut state, false);
        outcome
    }

    /// Resolve once no batch is in flight.
    pub async fn wait_idle(&self) {
        let mut busy = self.inner.busy.subscribe();
        let _ = busy.wait_for(|in_flight| !*in_flight).await;
    }

    /// Send the whole queue now and wait for reconciliation.
    ///
    /// Waits for an in-flight batch first. Returns the number of delivered
    /// events; an empty queue is not sent.
    pub async fn flush_now(&self) -> Result<usize, DeliveryError> {
        self.flush_now_at(Utc::now()).await
    }

    pub async fn flush_now_at(&self, now: DateTime<Utc>) -> Result<usize, DeliveryError> {
        let batch = loop {
            self.wait_idle().await;
            let mut state = self.lock_state();
            if state.in_flight {
                continue;
            }
            let queue = self.load_queue();
            if queue.is_empty() {
                return Ok(0);
            }
            state.last_flush_at = now;
            self.mark_in_flight(&mut state, true);
            break queue.snapshot();
        };
        debug!(items = batch.len(), "forced flush");
        self.deliver(batch).await
    }
}
