//! Summary of the persisted queue and session.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use sr_common::SessionId;
use sr_telemetry::{
    EventQueue, FileMedium, PersistentStore, QueuedEvent, SessionState, EVENTS_KEY, SESSION_KEY,
};

/// What is waiting in a storage directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueReport {
    pub storage_dir: PathBuf,
    pub queued: usize,
    pub session_started: usize,
    pub event_schema: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

impl QueueReport {
    /// Read the queue and session under `storage_dir` without delivering.
    pub async fn load(storage_dir: &Path) -> Self {
        let store = PersistentStore::open(Arc::new(FileMedium::new(storage_dir))).await;
        let queue: EventQueue = store.get(EVENTS_KEY).unwrap_or_default();
        let session: Option<SessionState> = store.get(SESSION_KEY);

        let session_started = queue
            .iter()
            .filter(|e| matches!(e, QueuedEvent::SessionStarted { .. }))
            .count();
        let oldest_created_at = queue.iter().next().map(|e| e.created_at().to_rfc3339());

        QueueReport {
            storage_dir: storage_dir.to_path_buf(),
            queued: queue.len(),
            session_started,
            event_schema: queue.len() - session_started,
            oldest_created_at,
            session_id: session.map(|s| s.session_id),
        }
    }
}
