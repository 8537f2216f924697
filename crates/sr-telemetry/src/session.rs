//! Session lifecycle tracking.
//!
//! Every tracking call first goes through
//! [`SessionTracker::start_or_prolong_session`]. A session ends after a
//! period of inactivity; the next call then starts a new one and queues
//! exactly one session-started event.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sr_common::SessionId;
use sr_config::SessionConfig;
use tracing::debug;

use crate::batcher::Batcher;
use crate::store::{PersistentStore, SESSION_KEY};

/// Persisted state of the current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub session_id: SessionId,
    pub last_activity_at: DateTime<Utc>,
}

/// Result of a session check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// A new session began and its start event was queued.
    Started(SessionId),
    /// The current session is still active.
    Prolonged(SessionId),
}

impl SessionOutcome {
    pub fn session_id(&self) -> &SessionId {
        match self {
            SessionOutcome::Started(id) | SessionOutcome::Prolonged(id) => id,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, SessionOutcome::Started(_))
    }
}

/// Owner of [`SessionState`].
#[derive(Debug)]
pub struct SessionTracker {
    store: PersistentStore,
    batcher: Batcher,
    config: SessionConfig,
    // Serializes read-decide-write so concurrent calls cannot both renew.
    guard: Mutex<()>,
}

impl SessionTracker {
    pub fn new(store: PersistentStore, batcher: Batcher, config: SessionConfig) -> Self {
        SessionTracker {
            store,
            batcher,
            config,
            guard: Mutex::new(()),
        }
    }

    /// The persisted session, if any.
    pub fn current(&self) -> Option<SessionState> {
        self.store.get(SESSION_KEY)
    }

    pub fn start_or_prolong_session(&self) -> SessionOutcome {
        self.start_or_prolong_session_at(Utc::now())
    }

    pub fn start_or_prolong_session_at(&self, now: DateTime<Utc>) -> SessionOutcome {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);

        match self.current() {
            Some(state) if now - state.last_activity_at <= self.config.inactivity() => {
                let last_activity_at = state.last_activity_at.max(now);
                self.store.set(
                    SESSION_KEY,
                    &SessionState {
                        session_id: state.session_id.clone(),
                        last_activity_at,
                    },
                );
                SessionOutcome::Prolonged(state.session_id)
            }
            previous => {
                let session_id = SessionId::generate(now);
                debug!(
                    session_id = %session_id,
                    previous = previous.as_ref().map(|s| s.session_id.as_str()),
                    "starting new session"
                );
                self.batcher.handle_session_started_at(session_id.clone(), now);
                self.store.set(
                    SESSION_KEY,
                    &SessionState {
                        session_id: session_id.clone(),
                        last_activity_at: now,
                    },
                );
                SessionOutcome::Started(session_id)
            }
        }
    }
}
