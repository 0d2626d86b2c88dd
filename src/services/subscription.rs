//! Reconnecting change-notification channels.
//!
//! Each subscription owns a background task driving an explicit state
//! machine: `Connecting → Subscribed` on success, `Subscribed → Error` when
//! the transport drops, `Error → Reconnecting` automatically after a fixed
//! backoff, and `Reconnecting → Subscribed` (attempt counter reset) or
//! `Reconnecting → Failed` once the attempt budget is exhausted. `Failed` is
//! terminal: the failure handler fires exactly once and no further attempt
//! is made until the caller subscribes again.
//!
//! Delivery is at-least-once and unordered-safe; handlers receive
//! authoritative row snapshots, so duplicates and reordering are harmless.

use std::fmt;

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::time::sleep;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::SubscriptionSettings;
use crate::dao::joke_store::{ChangeEvent, ChangeRow};
use crate::dao::storage::StorageResult;

/// Connection state of one subscription channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// First connection attempt is in flight.
    Connecting,
    /// The channel is live and events flow to the handler.
    Subscribed,
    /// The transport just failed; a reconnect decision is imminent.
    Error,
    /// Waiting out the backoff before the next connection attempt.
    Reconnecting,
    /// The attempt budget is exhausted; terminal until re-subscribed.
    Failed,
}

/// Observable status of a subscription channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStatus {
    /// Current connection state.
    pub state: ChannelState,
    /// Consecutive failed connection attempts (0 once subscribed).
    pub attempt: u32,
}

/// Server-side predicate selecting which change events a channel delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFilter {
    /// Joke rows whose active flag is raised — "what is on stage now".
    ActiveJokes,
    /// Every joke row change.
    AllJokes,
    /// Tally rows for one specific joke.
    JokeTallies(Uuid),
    /// Every tally row change.
    AllTallies,
}

impl ChangeFilter {
    /// Whether `event` passes this filter.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        match (self, &event.row) {
            (ChangeFilter::ActiveJokes, ChangeRow::Joke(joke)) => joke.is_active,
            (ChangeFilter::AllJokes, ChangeRow::Joke(_)) => true,
            (ChangeFilter::JokeTallies(id), ChangeRow::Tally(tally)) => tally.joke_id == *id,
            (ChangeFilter::AllTallies, ChangeRow::Tally(_)) => true,
            _ => false,
        }
    }
}

/// Reported exactly once when a channel goes terminally down.
#[derive(Debug, Clone, Error)]
#[error("subscription channel `{topic}` failed after {attempts} connection attempts")]
pub struct ChannelFailure {
    /// Topic of the channel that failed.
    pub topic: String,
    /// Connection attempts made before giving up.
    pub attempts: u32,
}

/// Factory for subscription channels sharing one backoff schedule.
pub struct SubscriptionBus {
    settings: SubscriptionSettings,
}

impl SubscriptionBus {
    /// Build a bus from the configured backoff schedule.
    pub fn new(settings: SubscriptionSettings) -> Self {
        Self { settings }
    }

    /// Open a channel on `topic`, delivering filtered events to `handler`.
    ///
    /// `connect` opens the underlying change feed and is retried on the
    /// fixed backoff schedule; `on_failure` fires exactly once if the
    /// attempt budget runs out. The returned [`Subscription`] keeps the
    /// channel alive; `unsubscribe` (or dropping it) releases the transport,
    /// including while a reconnect sleep is pending.
    pub fn subscribe<C, H, F>(
        &self,
        topic: impl Into<String>,
        filter: ChangeFilter,
        connect: C,
        handler: H,
        on_failure: F,
    ) -> Subscription
    where
        C: Fn() -> BoxFuture<'static, StorageResult<broadcast::Receiver<ChangeEvent>>>
            + Send
            + Sync
            + 'static,
        H: Fn(ChangeEvent) + Send + 'static,
        F: FnOnce(ChannelFailure) + Send + 'static,
    {
        let topic = topic.into();
        let settings = self.settings.clone();
        let (status_tx, status_rx) = watch::channel(ChannelStatus {
            state: ChannelState::Connecting,
            attempt: 0,
        });
        let (cancel_tx, cancel_rx) = watch::channel(false);

        tokio::spawn(run_channel(
            topic.clone(),
            filter,
            settings,
            connect,
            handler,
            on_failure,
            status_tx,
            cancel_rx,
        ));

        Subscription {
            topic,
            status: status_rx,
            cancel: cancel_tx,
        }
    }
}

/// Handle on a live subscription channel.
pub struct Subscription {
    topic: String,
    status: watch::Receiver<ChannelStatus>,
    cancel: watch::Sender<bool>,
}

impl Subscription {
    /// Topic this channel was opened on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Current channel status.
    pub fn status(&self) -> ChannelStatus {
        *self.status.borrow()
    }

    /// Watch channel mirroring every status change, usable from tests and
    /// any caller that wants to await a specific state.
    pub fn status_watcher(&self) -> watch::Receiver<ChannelStatus> {
        self.status.clone()
    }

    /// Tear the channel down and release the transport.
    ///
    /// Idempotent, and safe to call while a reconnect attempt is pending:
    /// the backoff sleep is interrupted and no further attempt is made.
    pub fn unsubscribe(&self) {
        let _ = self.cancel.send(true);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("status", &*self.status.borrow())
            .finish()
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_channel<C, H, F>(
    topic: String,
    filter: ChangeFilter,
    settings: SubscriptionSettings,
    connect: C,
    handler: H,
    on_failure: F,
    status: watch::Sender<ChannelStatus>,
    mut cancel: watch::Receiver<bool>,
) where
    C: Fn() -> BoxFuture<'static, StorageResult<broadcast::Receiver<ChangeEvent>>> + Send + Sync,
    H: Fn(ChangeEvent) + Send,
    F: FnOnce(ChannelFailure) + Send,
{
    // FnOnce behind an Option so the exactly-once contract is structural.
    let mut on_failure = Some(on_failure);
    let mut attempt: u32 = 0;

    loop {
        if *cancel.borrow() {
            return;
        }

        match connect().await {
            Ok(mut feed) => {
                attempt = 0;
                let _ = status.send(ChannelStatus {
                    state: ChannelState::Subscribed,
                    attempt,
                });
                debug!(topic, "subscription channel live");

                loop {
                    tokio::select! {
                        _ = cancel.changed() => return,
                        received = feed.recv() => match received {
                            Ok(event) => {
                                if filter.matches(&event) {
                                    handler(event);
                                }
                            }
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                // At-least-once with authoritative snapshots:
                                // missing intermediate events is safe.
                                warn!(topic, skipped, "subscription channel lagged");
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                let _ = status.send(ChannelStatus {
                                    state: ChannelState::Error,
                                    attempt,
                                });
                                warn!(topic, "subscription transport closed");
                                break;
                            }
                        }
                    }
                }
            }
            Err(err) => {
                let _ = status.send(ChannelStatus {
                    state: ChannelState::Error,
                    attempt,
                });
                warn!(topic, error = %err, "subscription connect failed");
            }
        }

        attempt += 1;
        if attempt >= settings.max_attempts {
            let _ = status.send(ChannelStatus {
                state: ChannelState::Failed,
                attempt,
            });
            if let Some(report) = on_failure.take() {
                report(ChannelFailure {
                    topic: topic.clone(),
                    attempts: attempt,
                });
            }
            return;
        }

        let _ = status.send(ChannelStatus {
            state: ChannelState::Reconnecting,
            attempt,
        });
        tokio::select! {
            _ = cancel.changed() => return,
            _ = sleep(settings.backoff) => {}
        }
    }
}
