use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::{joke::JokeSummary, reaction::TallySnapshot};

/// Dispatched payload carried across SSE channels.
#[derive(Clone, Debug)]
pub struct ServerEvent {
    /// Optional SSE event name.
    pub event: Option<String>,
    /// Serialized event payload.
    pub data: String,
}

impl ServerEvent {
    /// Build a plain event carrying pre-rendered data.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

/// Token sent to a freshly connected admin stream.
#[derive(Debug, Serialize, ToSchema)]
pub struct AdminHandshake {
    /// Credential expected in the `X-Admin-Token` header of admin calls.
    pub token: String,
}

/// Broadcast when the backend enters or leaves degraded mode.
#[derive(Debug, Serialize, ToSchema)]
pub struct SystemStatus {
    /// True while no storage backend is installed.
    pub degraded: bool,
}

/// Broadcast when a new joke takes the stage.
#[derive(Debug, Serialize, ToSchema)]
pub struct JokeActivatedEvent {
    /// The joke now shown to every viewer.
    pub joke: JokeSummary,
}

/// Broadcast whenever a reaction counter changes.
///
/// Carries the authoritative total, never a delta, so subscribers that see
/// the same event twice or out of order converge on the same value.
#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct TallyUpdatedEvent(pub TallySnapshot);

/// Broadcast once when a change-notification channel exhausts its reconnect
/// budget and goes terminally down.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChannelDownEvent {
    /// Topic of the failed channel.
    pub topic: String,
    /// Connect attempts that were made before giving up.
    pub attempts: u32,
}
