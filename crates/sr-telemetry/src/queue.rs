//! Durable event queue model.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sr_common::{MessageId, SessionId};

use crate::schema::SchemaEntry;

/// Maximum number of queued events. Older events are evicted first.
pub const MAX_QUEUE_LEN: usize = 1000;

/// One item waiting for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum QueuedEvent {
    #[serde(rename_all = "camelCase")]
    SessionStarted {
        message_id: MessageId,
        session_id: SessionId,
        created_at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    EventSchema {
        message_id: MessageId,
        event_name: String,
        schema: Vec<SchemaEntry>,
        created_at: DateTime<Utc>,
    },
}

impl QueuedEvent {
    pub fn session_started(session_id: SessionId, created_at: DateTime<Utc>) -> Self {
        QueuedEvent::SessionStarted {
            message_id: MessageId::new(),
            session_id,
            created_at,
        }
    }

    pub fn event_schema(
        event_name: impl Into<String>,
        schema: Vec<SchemaEntry>,
        created_at: DateTime<Utc>,
    ) -> Self {
        QueuedEvent::EventSchema {
            message_id: MessageId::new(),
            event_name: event_name.into(),
            schema,
            created_at,
        }
    }

    pub fn message_id(&self) -> MessageId {
        match self {
            QueuedEvent::SessionStarted { message_id, .. }
            | QueuedEvent::EventSchema { message_id, .. } => *message_id,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            QueuedEvent::SessionStarted { created_at, .. }
            | QueuedEvent::EventSchema { created_at, .. } => *created_at,
        }
    }

    /// Short name of the variant for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            QueuedEvent::SessionStarted { .. } => "session_started",
            QueuedEvent::EventSchema { .. } => "event_schema",
        }
    }
}

/// Ordered, capacity-bounded queue of pending events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventQueue {
    events: VecDeque<QueuedEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedEvent> {
        self.events.iter()
    }

    /// Append `event`, evicting from the front beyond [`MAX_QUEUE_LEN`].
    ///
    /// Returns the number of evicted events.
    pub fn push_bounded(&mut self, event: QueuedEvent) -> usize {
        self.events.push_back(event);
        self.truncate_front(MAX_QUEUE_LEN)
    }

    /// Keep only the newest `limit` events. Returns how many were dropped.
    pub fn truncate_front(&mut self, limit: usize) -> usize {
        let excess = self.events.len().saturating_sub(limit);
        self.events.drain(..excess);
        excess
    }

    /// Copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<QueuedEvent> {
        self.events.iter().cloned().collect()
    }

    /// Remove every event whose id is in `sent`. Returns how many were removed.
    pub fn remove_sent(&mut self, sent: &HashSet<MessageId>) -> usize {
        let before = self.events.len();
        self.events.retain(|event| !sent.contains(&event.message_id()));
        before - self.events.len()
    }
}

impl FromIterator<QueuedEvent> for EventQueue {
    fn from_iter<I: IntoIterator<Item = QueuedEvent>>(iter: I) -> Self {
        EventQueue {
            events: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TypeTag;

    fn event(n: usize) -> QueuedEvent {
        QueuedEvent::event_schema(format!("e{n}"), vec![], Utc::now())
    }

    #[test]
    fn test_push_bounded_evicts_oldest() {
        let mut queue: EventQueue = (0..MAX_QUEUE_LEN).map(event).collect();
        let first_kept = queue.snapshot()[1].clone();
        let evicted = queue.push_bounded(event(MAX_QUEUE_LEN));
        assert_eq!(evicted, 1);
        assert_eq!(queue.len(), MAX_QUEUE_LEN);
        assert_eq!(queue.snapshot()[0], first_kept);
    }

    #[test]
    fn test_remove_sent_keeps_unsent_in_order() {
        let mut queue: EventQueue = (0..5).map(event).collect();
        let snapshot = queue.snapshot();
        let sent: HashSet<_> = snapshot[..3].iter().map(QueuedEvent::message_id).collect();
        queue.push_bounded(event(5));
        assert_eq!(queue.remove_sent(&sent), 3);
        let names: Vec<_> = queue
            .iter()
            .map(|e| match e {
                QueuedEvent::EventSchema { event_name, .. } => event_name.clone(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(names, vec!["e3", "e4", "e5"]);
    }

    #[test]
    fn test_queued_event_serde_shape() {
        let session_id = SessionId::parse("sr-20260115-143022-a7xqk2mf").unwrap();
        let started = QueuedEvent::session_started(session_id, Utc::now());
        let json = serde_json::to_value(&started).unwrap();
        assert_eq!(json["type"], "sessionStarted");
        assert_eq!(json["sessionId"], "sr-20260115-143022-a7xqk2mf");
        assert!(json["messageId"].is_string());

        let tracked = QueuedEvent::event_schema(
            "Login",
            vec![SchemaEntry::scalar("method", TypeTag::String)],
            Utc::now(),
        );
        let json = serde_json::to_value(&tracked).unwrap();
        assert_eq!(json["type"], "eventSchema");
        assert_eq!(json["eventName"], "Login");
        let back: QueuedEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, tracked);
    }
}
