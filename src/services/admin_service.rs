//! Operator-facing catalog management.

use tracing::warn;

use crate::{
    dto::{admin::CreateJokeRequest, joke::JokeSummary},
    error::ServiceError,
    services::rotation,
    state::SharedState,
};

/// Add a joke to the catalog.
///
/// The text was validated at the HTTP boundary; it is stored trimmed. When
/// the catalog has no active joke yet — a fresh show, or an interrupted
/// rotation — the repair pass runs so the stage is never left empty.
pub async fn create_joke(
    state: &SharedState,
    request: CreateJokeRequest,
) -> Result<JokeSummary, ServiceError> {
    let store = state.require_joke_store().await?;
    let joke = store.insert_joke(request.text.trim().to_string()).await?;

    if let Err(err) = rotation::repair_on(&store).await {
        warn!(error = %err, "opportunistic repair after insert failed");
    }

    // The repair pass may have put the fresh joke on stage; report the
    // current flag rather than the pre-repair row.
    let joke = store.find_joke(joke.id).await?.unwrap_or(joke);
    Ok(joke.into())
}

/// Rotate the stage to the next joke.
pub async fn next_joke(state: &SharedState) -> Result<JokeSummary, ServiceError> {
    rotation::advance(state).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::AppConfig;
    use crate::dao::joke_store::JokeStore;
    use crate::dao::joke_store::memory::MemoryJokeStore;
    use crate::state::AppState;

    async fn empty_state() -> (SharedState, MemoryJokeStore) {
        let mut config = AppConfig::default();
        config.votes.ledger_path = None;
        let state = AppState::new(config);
        let store = MemoryJokeStore::new();
        let handle: Arc<dyn JokeStore> = Arc::new(store.clone());
        state.install_joke_store(handle).await;
        (state, store)
    }

    #[tokio::test]
    async fn first_joke_takes_the_stage_immediately() {
        let (state, _store) = empty_state().await;
        let created = create_joke(
            &state,
            CreateJokeRequest {
                text: "  opening number  ".into(),
            },
        )
        .await
        .unwrap();

        assert_eq!(created.text, "opening number");
        assert!(created.is_active);
    }

    #[tokio::test]
    async fn later_jokes_wait_in_the_wings() {
        let (state, store) = empty_state().await;
        create_joke(&state, CreateJokeRequest { text: "one".into() })
            .await
            .unwrap();
        let second = create_joke(&state, CreateJokeRequest { text: "two".into() })
            .await
            .unwrap();

        assert!(!second.is_active);
        let active = store.find_active().await.unwrap().unwrap();
        assert_eq!(active.text, "one");
    }

    #[tokio::test]
    async fn rotation_then_concurrent_reactions_compose() {
        use crate::dao::models::Category;
        use crate::dto::reaction::ReactionRequest;
        use crate::services::reaction_service::submit_reaction;

        let (state, store) = empty_state().await;
        for text in ["first", "second", "third"] {
            create_joke(&state, CreateJokeRequest { text: text.into() })
                .await
                .unwrap();
        }

        let rotated = next_joke(&state).await.unwrap();
        assert_eq!(rotated.text, "second");
        let actives: Vec<_> = store
            .list_by_creation()
            .await
            .unwrap()
            .into_iter()
            .filter(|joke| joke.is_active)
            .collect();
        assert_eq!(actives.len(), 1);
        assert_eq!(actives[0].id, rotated.id);

        let mut handles = Vec::new();
        for viewer in ["viewer-one-1", "viewer-two-2"] {
            let state = state.clone();
            let joke_id = rotated.id;
            handles.push(tokio::spawn(async move {
                submit_reaction(
                    &state,
                    ReactionRequest {
                        joke_id,
                        emoji: Category::Laughing,
                        viewer_id: viewer.to_string(),
                    },
                )
                .await
                .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let counts = store.tallies(rotated.id).await.unwrap();
        assert_eq!(counts.get(&Category::Laughing), Some(&2));
    }
}
