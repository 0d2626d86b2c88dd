//! Bridges the store's change-notification feed onto the SSE hubs.
//!
//! Whenever a storage backend is installed, the relay opens subscription
//! channels for the active-joke and tally topics and rebroadcasts matching
//! rows as typed SSE events. A terminally failed channel is surfaced once;
//! the relay only subscribes again when storage connectivity cycles, which
//! is the explicit re-subscription the channel contract requires.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::{
    dao::{
        joke_store::{ChangeEvent, ChangeRow, JokeStore},
        storage::StorageResult,
    },
    dto::reaction::TallySnapshot,
    services::{
        sse_events,
        subscription::{ChangeFilter, Subscription, SubscriptionBus},
    },
    state::SharedState,
};

/// Topic name of the active-joke channel.
const TOPIC_ACTIVE_JOKES: &str = "jokes:active";
/// Topic name of the tally channel.
const TOPIC_TALLIES: &str = "tallies";

/// Drive the relay until the application shuts down.
pub async fn run(state: SharedState) {
    let mut degraded = state.degraded_watcher();
    let mut channels: Vec<Subscription> = Vec::new();

    loop {
        let is_degraded = *degraded.borrow_and_update();
        sse_events::broadcast_system_status(&state, is_degraded);

        if is_degraded {
            for channel in channels.drain(..) {
                channel.unsubscribe();
            }
        } else if channels.is_empty() {
            if let Some(store) = state.joke_store().await {
                channels = attach(&state, &store);
                info!("change relay attached to storage feed");
            }
        }

        if degraded.changed().await.is_err() {
            return;
        }
    }
}

/// Open the relay's subscription channels against `store`.
fn attach(state: &SharedState, store: &Arc<dyn JokeStore>) -> Vec<Subscription> {
    let bus = SubscriptionBus::new(state.config().subscription.clone());

    let joke_handler = {
        let state = state.clone();
        move |event: ChangeEvent| {
            if let ChangeRow::Joke(joke) = event.row {
                sse_events::broadcast_joke_activated(&state, joke);
            }
        }
    };
    let jokes = bus.subscribe(
        TOPIC_ACTIVE_JOKES,
        ChangeFilter::ActiveJokes,
        connector(store),
        joke_handler,
        failure_handler(state),
    );

    let tally_handler = {
        let state = state.clone();
        move |event: ChangeEvent| {
            if let ChangeRow::Tally(tally) = event.row {
                sse_events::broadcast_tally_updated(
                    &state,
                    TallySnapshot {
                        joke_id: tally.joke_id,
                        emoji: tally.category,
                        count: tally.count,
                    },
                );
            }
        }
    };
    let tallies = bus.subscribe(
        TOPIC_TALLIES,
        ChangeFilter::AllTallies,
        connector(store),
        tally_handler,
        failure_handler(state),
    );

    vec![jokes, tallies]
}

fn connector(
    store: &Arc<dyn JokeStore>,
) -> impl Fn() -> BoxFuture<'static, StorageResult<broadcast::Receiver<ChangeEvent>>>
+ Send
+ Sync
+ 'static {
    let store = store.clone();
    move || store.watch_changes()
}

fn failure_handler(
    state: &SharedState,
) -> impl FnOnce(crate::services::subscription::ChannelFailure) + Send + 'static {
    let state = state.clone();
    move |failure| {
        error!(topic = %failure.topic, attempts = failure.attempts, "subscription channel is down");
        sse_events::broadcast_channel_down(&state, &failure);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::config::AppConfig;
    use crate::dao::joke_store::memory::MemoryJokeStore;
    use crate::dao::models::Category;
    use crate::dto::sse::ServerEvent;
    use crate::state::AppState;

    async fn next_named_event(
        receiver: &mut broadcast::Receiver<ServerEvent>,
        name: &str,
    ) -> ServerEvent {
        timeout(Duration::from_secs(5), async {
            loop {
                let event = receiver.recv().await.unwrap();
                if event.event.as_deref() == Some(name) {
                    return event;
                }
            }
        })
        .await
        .expect("expected event was not broadcast in time")
    }

    #[tokio::test]
    async fn store_mutations_reach_public_subscribers() {
        let mut config = AppConfig::default();
        config.votes.ledger_path = None;
        config.subscription.backoff = Duration::from_millis(5);
        let state = AppState::new(config);

        let store = MemoryJokeStore::new();
        let joke = store.insert_joke("live wire".into()).await.unwrap();
        let handle: Arc<dyn JokeStore> = Arc::new(store.clone());
        state.install_joke_store(handle).await;

        let mut public = state.public_sse().subscribe();
        let relay = tokio::spawn(run(state.clone()));
        // Give the relay's channels time to come up before mutating.
        tokio::time::sleep(Duration::from_millis(100)).await;

        store
            .increment_tally(joke.id, Category::Laughing)
            .await
            .unwrap();
        let updated = next_named_event(&mut public, "tally.updated").await;
        assert!(updated.data.contains("\"count\":1"));

        store.mark_active(joke.id).await.unwrap();
        let activated = next_named_event(&mut public, "joke.activated").await;
        assert!(activated.data.contains(&joke.id.to_string()));

        // Losing storage flips the system status and detaches the channels.
        state.clear_joke_store().await;
        let status = next_named_event(&mut public, "system.status").await;
        assert!(status.data.contains("\"degraded\":true"));

        relay.abort();
    }
}
