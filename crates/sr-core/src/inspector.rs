//! The public tracking surface.
//!
//! An [`Inspector`] owns one configured pipeline: the persistent store, the
//! batcher, the session tracker, and the delivery client. Tracking calls
//! never fail; problems are logged and the call degrades to a no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use sr_common::{Error, SessionId};
use sr_config::{InspectorConfig, InspectorOptions};
use sr_telemetry::{
    Batcher, DeliveryClient, DurableMedium, FileMedium, HttpDeliveryClient, PersistentStore,
    SchemaEntry, SchemaExtractor, SessionTracker,
};
use tracing::{debug, info, warn};

use crate::logging::truncate_for_log;

/// Longest payload rendering written to verbose logs.
const MAX_LOGGED_PAYLOAD_LEN: usize = 2048;

/// A configured event schema inspector.
pub struct Inspector {
    config: InspectorConfig,
    store: PersistentStore,
    batcher: Batcher,
    sessions: SessionTracker,
    extractor: SchemaExtractor,
    should_log: AtomicBool,
}

impl std::fmt::Debug for Inspector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inspector")
            .field("app_name", &self.config.app_name)
            .field("environment", &self.config.environment)
            .field("batcher", &self.batcher)
            .finish()
    }
}

impl Inspector {
    /// Resolve `options` and start an inspector on the configured storage
    /// directory and endpoint.
    pub async fn from_options(options: InspectorOptions) -> sr_common::Result<Self> {
        let config = InspectorConfig::resolve(options)?;
        Self::from_config(config).await
    }

    /// Start an inspector backed by files under `config.storage_dir` and
    /// the HTTP delivery client.
    pub async fn from_config(config: InspectorConfig) -> sr_common::Result<Self> {
        let medium: Arc<dyn DurableMedium> = Arc::new(FileMedium::new(&config.storage_dir));
        let client: Arc<dyn DeliveryClient> = Arc::new(HttpDeliveryClient::new(&config)?);
        Ok(Self::start(config, medium, client).await)
    }

    /// Start an inspector over explicit collaborators.
    ///
    /// Waits for the store to hydrate, then hands the persisted queue to the
    /// batcher, which delivers it at once if it already meets a threshold.
    /// The session is started or prolonged before this returns.
    pub async fn start(
        config: InspectorConfig,
        medium: Arc<dyn DurableMedium>,
        client: Arc<dyn DeliveryClient>,
    ) -> Self {
        let store = PersistentStore::open(medium).await;
        let batcher = Batcher::open(store.clone(), client, config.batch);
        let sessions = SessionTracker::new(store.clone(), batcher.clone(), config.session);
        let extractor = SchemaExtractor::new(config.schema.max_depth);

        info!(
            app_name = %config.app_name,
            app_version = %config.app_version,
            env = %config.environment,
            queued = batcher.queue_len(),
            "inspector started"
        );

        let inspector = Inspector {
            should_log: AtomicBool::new(config.log_enabled),
            config,
            store,
            batcher,
            sessions,
            extractor,
        };
        inspector.sessions.start_or_prolong_session();
        inspector
    }

    pub fn config(&self) -> &InspectorConfig {
        &self.config
    }

    pub fn batcher(&self) -> &Batcher {
        &self.batcher
    }

    /// The current session, if one has been started.
    pub fn session_id(&self) -> Option<SessionId> {
        self.sessions.current().map(|state| state.session_id)
    }

    /// Extract the schema of `properties` and queue it under `event_name`.
    ///
    /// Returns the extracted schema, or an empty one if extraction failed.
    pub fn track_schema_from_event(&self, event_name: &str, properties: &Value) -> Vec<SchemaEntry> {
        if self.should_log() {
            let rendered = serde_json::to_string(properties).unwrap_or_default();
            info!(
                event_name,
                properties = %truncate_for_log(&rendered, MAX_LOGGED_PAYLOAD_LEN),
                "supplied event"
            );
        }
        self.sessions.start_or_prolong_session();
        match self.extractor.extract(properties) {
            Ok(schema) => {
                self.enqueue(event_name, schema.clone());
                schema
            }
            Err(e) => {
                self.report(event_name, e.into());
                Vec::new()
            }
        }
    }

    /// Extract the schema of `properties` without tracking it.
    ///
    /// Counts as activity: the session is prolonged.
    pub fn extract_schema(&self, properties: &Value) -> Vec<SchemaEntry> {
        self.sessions.start_or_prolong_session();
        match self.extractor.extract(properties) {
            Ok(schema) => schema,
            Err(e) => {
                self.report("extract_schema", e.into());
                Vec::new()
            }
        }
    }

    /// Queue an already extracted schema under `event_name`.
    pub fn track_schema(&self, event_name: &str, schema: Vec<SchemaEntry>) {
        self.sessions.start_or_prolong_session();
        self.enqueue(event_name, schema);
    }

    fn enqueue(&self, event_name: &str, schema: Vec<SchemaEntry>) {
        if self.should_log() {
            let rendered = serde_json::to_string(&schema).unwrap_or_default();
            info!(
                event_name,
                schema = %truncate_for_log(&rendered, MAX_LOGGED_PAYLOAD_LEN),
                "tracking event schema"
            );
        }
        self.batcher.handle_track_schema(event_name, schema);
    }

    fn report(&self, context: &str, err: Error) {
        warn!(
            context,
            code = err.code(),
            headline = err.headline(),
            error = %err,
            "tracking call failed; event dropped"
        );
    }

    /// Turn verbose payload logging on or off.
    pub fn enable_logging(&self, enabled: bool) {
        self.should_log.store(enabled, Ordering::Relaxed);
    }

    pub fn should_log(&self) -> bool {
        self.should_log.load(Ordering::Relaxed)
    }

    pub fn set_batch_size(&self, batch_size: usize) {
        self.batcher.set_batch_size(batch_size);
    }

    pub fn set_batch_flush_seconds(&self, secs: u64) {
        self.batcher.set_flush_interval(secs);
    }

    /// Deliver everything queued and wait for the result.
    ///
    /// Returns the number of delivered events. On failure the events stay
    /// queued for the next trigger.
    pub async fn flush(&self) -> sr_common::Result<usize> {
        let delivered = self.batcher.flush_now().await?;
        debug!(delivered, "inspector flushed");
        Ok(delivered)
    }

    /// Flush, then wait until every state change has reached the medium.
    ///
    /// State is persisted even when delivery fails; the delivery error is
    /// returned afterwards.
    pub async fn shutdown(self) -> sr_common::Result<usize> {
        let flushed = self.flush().await;
        self.batcher.wait_idle().await;
        self.store.flush().await;
        info!(queued = self.batcher.queue_len(), "inspector shut down");
        flushed
    }
}
