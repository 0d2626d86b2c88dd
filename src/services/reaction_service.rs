//! Reaction aggregation: the one write path for tally counters.
//!
//! The increment is delegated to the store as a single atomic "add one";
//! reading the current value, adding one here and writing it back would lose
//! updates under concurrent viewers. Contended backends surface conflicts,
//! which are retried a bounded number of times before the caller is told.

use tracing::warn;

use crate::{
    dao::storage::StorageError,
    dto::reaction::{ReactionRequest, TallySnapshot},
    error::ServiceError,
    state::SharedState,
};

/// Accept one viewer reaction and return the new authoritative tally.
///
/// The guard is consulted first: a viewer that already reacted to the joke
/// is vetoed without any mutation. On success the vote is recorded locally
/// so later calls from the same viewer are rejected.
pub async fn submit_reaction(
    state: &SharedState,
    request: ReactionRequest,
) -> Result<TallySnapshot, ServiceError> {
    let store = state.require_joke_store().await?;
    let ReactionRequest {
        joke_id,
        emoji,
        viewer_id,
    } = request;

    if store.find_joke(joke_id).await?.is_none() {
        return Err(ServiceError::NotFound(format!("joke `{joke_id}` not found")));
    }

    if state.votes().has_voted(&viewer_id, joke_id) {
        return Err(ServiceError::AlreadyVoted { joke_id });
    }

    let max_attempts = state.config().reaction.max_increment_attempts;
    let mut attempt = 0;
    let count = loop {
        match store.increment_tally(joke_id, emoji).await {
            Ok(count) => break count,
            Err(StorageError::Conflict { .. }) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(ServiceError::Conflict(format!(
                        "counter for joke `{joke_id}` stayed contended after {max_attempts} attempts"
                    )));
                }
            }
            Err(other) => return Err(other.into()),
        }
    };

    if let Err(already) = state.votes().record(&viewer_id, joke_id, emoji) {
        // Two in-flight calls from the same viewer can both pass the guard
        // check; the counter keeps both, the guard keeps the first entry.
        warn!(
            viewer = %viewer_id,
            joke = %joke_id,
            existing = %already.existing,
            "vote was recorded concurrently; keeping the first entry"
        );
    }

    Ok(TallySnapshot {
        joke_id,
        emoji,
        count,
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::config::AppConfig;
    use crate::dao::joke_store::memory::MemoryJokeStore;
    use crate::dao::joke_store::test_support::FlakyStore;
    use crate::dao::joke_store::JokeStore;
    use crate::dao::models::Category;
    use crate::state::AppState;

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.votes.ledger_path = None::<PathBuf>;
        config
    }

    async fn state_with_store(store: Arc<dyn JokeStore>) -> SharedState {
        let state = AppState::new(test_config());
        state.install_joke_store(store).await;
        state
    }

    fn request(joke_id: Uuid, emoji: Category, viewer: &str) -> ReactionRequest {
        ReactionRequest {
            joke_id,
            emoji,
            viewer_id: viewer.to_string(),
        }
    }

    #[tokio::test]
    async fn accepted_reaction_returns_the_new_count() {
        let store = MemoryJokeStore::new();
        let joke = store.insert_joke("setup".into()).await.unwrap();
        let state = state_with_store(Arc::new(store)).await;

        let snapshot = submit_reaction(&state, request(joke.id, Category::Laughing, "viewer-aaa"))
            .await
            .unwrap();
        assert_eq!(snapshot.count, 1);
        assert_eq!(snapshot.emoji, Category::Laughing);

        let snapshot = submit_reaction(&state, request(joke.id, Category::Laughing, "viewer-bbb"))
            .await
            .unwrap();
        assert_eq!(snapshot.count, 2);
    }

    #[tokio::test]
    async fn second_reaction_from_the_same_viewer_is_vetoed() {
        let store = MemoryJokeStore::new();
        let joke = store.insert_joke("setup".into()).await.unwrap();
        let handle: Arc<dyn JokeStore> = Arc::new(store.clone());
        let state = state_with_store(handle).await;

        submit_reaction(&state, request(joke.id, Category::Laughing, "viewer-aaa"))
            .await
            .unwrap();

        let err = submit_reaction(&state, request(joke.id, Category::Annoyed, "viewer-aaa"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyVoted { joke_id } if joke_id == joke.id));

        // Neither counter moved: the veto happened before any mutation.
        let counts = store.tallies(joke.id).await.unwrap();
        assert_eq!(counts.get(&Category::Laughing), Some(&1));
        assert_eq!(counts.get(&Category::Annoyed), None);
    }

    #[tokio::test]
    async fn unknown_joke_is_not_found() {
        let store = MemoryJokeStore::new();
        let state = state_with_store(Arc::new(store)).await;

        let err = submit_reaction(
            &state,
            request(Uuid::now_v7(), Category::Neutral, "viewer-aaa"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn exhausted_increment_retries_surface_a_conflict() {
        let memory = MemoryJokeStore::new();
        let joke = memory.insert_joke("contended".into()).await.unwrap();
        let flaky = FlakyStore::wrap(Arc::new(memory.clone()));
        flaky
            .conflicting_increments
            .store(u32::MAX, std::sync::atomic::Ordering::SeqCst);
        let state = state_with_store(Arc::new(flaky)).await;

        let err = submit_reaction(&state, request(joke.id, Category::Smirking, "viewer-aaa"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        // The whole call failed, so the viewer may retry it later.
        assert!(!state.votes().has_voted("viewer-aaa", joke.id));
    }

    #[tokio::test]
    async fn transient_conflicts_within_the_budget_are_retried() {
        let memory = MemoryJokeStore::new();
        let joke = memory.insert_joke("briefly contended".into()).await.unwrap();
        let flaky = FlakyStore::wrap(Arc::new(memory.clone()));
        flaky
            .conflicting_increments
            .store(2, std::sync::atomic::Ordering::SeqCst);
        let state = state_with_store(Arc::new(flaky)).await;

        let snapshot = submit_reaction(&state, request(joke.id, Category::Neutral, "viewer-aaa"))
            .await
            .unwrap();
        assert_eq!(snapshot.count, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_viewers_all_land_exactly_once() {
        let store = MemoryJokeStore::new();
        let joke = store.insert_joke("popular".into()).await.unwrap();
        let handle: Arc<dyn JokeStore> = Arc::new(store.clone());
        let state = state_with_store(handle).await;

        let viewers = 24;
        let mut handles = Vec::new();
        for index in 0..viewers {
            let state = state.clone();
            let joke_id = joke.id;
            handles.push(tokio::spawn(async move {
                submit_reaction(
                    &state,
                    ReactionRequest {
                        joke_id,
                        emoji: Category::Laughing,
                        viewer_id: format!("viewer-{index:04}"),
                    },
                )
                .await
                .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let counts = store.tallies(joke.id).await.unwrap();
        assert_eq!(counts.get(&Category::Laughing), Some(&(viewers as u64)));
    }
}
