//! Request bodies sent to the collection endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sr_common::{MessageId, SessionId, LIB_VERSION};
use sr_config::{Environment, InspectorConfig};

use crate::queue::QueuedEvent;
use crate::schema::SchemaEntry;

/// Platform name reported in every body.
pub const LIB_PLATFORM: &str = "rust";

/// Fields shared by every body of one inspector instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireContext {
    pub api_key: String,
    pub app_name: String,
    pub app_version: String,
    pub lib_version: String,
    pub environment: Environment,
}

impl WireContext {
    pub fn from_config(config: &InspectorConfig) -> Self {
        WireContext {
            api_key: config.api_key.clone(),
            app_name: config.app_name.clone(),
            app_version: config.app_version.clone(),
            lib_version: LIB_VERSION.to_string(),
            environment: config.environment,
        }
    }
}

/// One element of the JSON array posted to the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireBody {
    pub api_key: String,
    pub app_name: String,
    pub app_version: String,
    pub lib_version: String,
    pub env: Environment,
    pub lib_platform: String,
    pub message_id: MessageId,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: WirePayload,
}

/// Kind-specific part of a [`WireBody`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WirePayload {
    #[serde(rename = "sessionStarted", rename_all = "camelCase")]
    SessionStarted { session_id: SessionId },

    #[serde(rename = "event", rename_all = "camelCase")]
    Event {
        event_name: String,
        event_properties: Vec<SchemaEntry>,
    },
}

fn body(
    context: &WireContext,
    message_id: MessageId,
    created_at: DateTime<Utc>,
    payload: WirePayload,
) -> WireBody {
    WireBody {
        api_key: context.api_key.clone(),
        app_name: context.app_name.clone(),
        app_version: context.app_version.clone(),
        lib_version: context.lib_version.clone(),
        env: context.environment,
        lib_platform: LIB_PLATFORM.to_string(),
        message_id,
        created_at,
        payload,
    }
}

pub fn build_session_started_body(
    session_id: &SessionId,
    created_at: DateTime<Utc>,
    message_id: MessageId,
    context: &WireContext,
) -> WireBody {
    body(
        context,
        message_id,
        created_at,
        WirePayload::SessionStarted {
            session_id: session_id.clone(),
        },
    )
}

pub fn build_event_schema_body(
    event_name: &str,
    schema: &[SchemaEntry],
    created_at: DateTime<Utc>,
    message_id: MessageId,
    context: &WireContext,
) -> WireBody {
    body(
        context,
        message_id,
        created_at,
        WirePayload::Event {
            event_name: event_name.to_string(),
            event_properties: schema.to_vec(),
        },
    )
}

/// Body for a queued event of either kind.
pub fn build_body(event: &QueuedEvent, context: &WireContext) -> WireBody {
    match event {
        QueuedEvent::SessionStarted {
            message_id,
            session_id,
            created_at,
        } => build_session_started_body(session_id, *created_at, *message_id, context),
        QueuedEvent::EventSchema {
            message_id,
            event_name,
            schema,
            created_at,
        } => build_event_schema_body(event_name, schema, *created_at, *message_id, context),
    }
}
