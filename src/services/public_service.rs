//! Service helpers exposing read-only projections of the show.

use indexmap::IndexMap;
use uuid::Uuid;

use crate::{
    dao::models::Category,
    dto::joke::{CurrentJokeResponse, JokeListResponse, TalliesResponse, TallyCount},
    error::ServiceError,
    state::SharedState,
};

/// Return the joke currently on stage together with its full tally map.
pub async fn get_current_joke(state: &SharedState) -> Result<CurrentJokeResponse, ServiceError> {
    let store = state.require_joke_store().await?;
    let joke = store
        .find_active()
        .await?
        .ok_or_else(|| ServiceError::NotFound("no active joke".into()))?;
    let counts = store.tallies(joke.id).await?;

    Ok(CurrentJokeResponse {
        joke: joke.into(),
        tallies: full_counts(counts),
    })
}

/// Return the whole catalog in creation order.
pub async fn list_jokes(state: &SharedState) -> Result<JokeListResponse, ServiceError> {
    let store = state.require_joke_store().await?;
    let jokes = store
        .list_by_creation()
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(JokeListResponse { jokes })
}

/// Return the reaction counters for one joke.
pub async fn get_tallies(state: &SharedState, id: Uuid) -> Result<TalliesResponse, ServiceError> {
    let store = state.require_joke_store().await?;
    let counts = store.tallies(id).await?;
    Ok(TalliesResponse {
        joke_id: id,
        tallies: full_counts(counts),
    })
}

/// Expand stored counters into one entry per category, zeros included.
fn full_counts(present: IndexMap<Category, u64>) -> Vec<TallyCount> {
    Category::ALL
        .iter()
        .map(|category| TallyCount {
            emoji: *category,
            count: present.get(category).copied().unwrap_or(0),
        })
        .collect()
}
