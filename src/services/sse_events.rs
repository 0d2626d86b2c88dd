//! Typed SSE event builders and broadcast helpers.

use serde::Serialize;
use tracing::warn;

use crate::{
    dao::models::JokeEntity,
    dto::{
        reaction::TallySnapshot,
        sse::{ChannelDownEvent, JokeActivatedEvent, ServerEvent, SystemStatus, TallyUpdatedEvent},
    },
    services::subscription::ChannelFailure,
    state::SharedState,
};

const EVENT_JOKE_ACTIVATED: &str = "joke.activated";
const EVENT_TALLY_UPDATED: &str = "tally.updated";
const EVENT_SYSTEM_STATUS: &str = "system.status";
const EVENT_CHANNEL_DOWN: &str = "channel.down";

/// Broadcast the joke that just took the stage.
pub fn broadcast_joke_activated(state: &SharedState, joke: JokeEntity) {
    let payload = JokeActivatedEvent { joke: joke.into() };
    send_public_event(state, EVENT_JOKE_ACTIVATED, &payload);
    send_admin_event(state, EVENT_JOKE_ACTIVATED, &payload);
}

/// Broadcast the authoritative new total of one reaction counter.
pub fn broadcast_tally_updated(state: &SharedState, snapshot: TallySnapshot) {
    let payload = TallyUpdatedEvent(snapshot);
    send_public_event(state, EVENT_TALLY_UPDATED, &payload);
}

/// Broadcast a degraded-mode transition to every stream.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    let payload = SystemStatus { degraded };
    send_public_event(state, EVENT_SYSTEM_STATUS, &payload);
    send_admin_event(state, EVENT_SYSTEM_STATUS, &payload);
}

/// Surface a terminally failed subscription channel, once.
pub fn broadcast_channel_down(state: &SharedState, failure: &ChannelFailure) {
    let payload = ChannelDownEvent {
        topic: failure.topic.clone(),
        attempts: failure.attempts,
    };
    send_public_event(state, EVENT_CHANNEL_DOWN, &payload);
    send_admin_event(state, EVENT_CHANNEL_DOWN, &payload);
}

fn send_public_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.public_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize public SSE payload"),
    }
}

fn send_admin_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.admin_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize admin SSE payload"),
    }
}
