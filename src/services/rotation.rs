//! Active-joke rotation.
//!
//! The "at most one active joke" invariant is maintained across a two-step
//! transition: a conditional deactivate of the current joke followed by a
//! conditional activate of its successor. Either write fails with a conflict
//! when another operator moved the flag first, which is what serializes
//! concurrent rotations without a cross-row transaction. A failed second
//! step leaves the catalog with zero active jokes; the repair pass heals
//! that by activating the smallest-id joke and is safe to run at any time.

use std::future::Future;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        joke_store::JokeStore,
        models::JokeEntity,
        storage::{StorageError, StorageResult},
    },
    dto::joke::JokeSummary,
    error::ServiceError,
    state::SharedState,
};

/// Rotate the stage to the next joke and return it.
pub async fn advance(state: &SharedState) -> Result<JokeSummary, ServiceError> {
    let store = state.require_joke_store().await?;
    let attempts = state.config().rotation.max_storage_attempts;
    advance_on(&store, attempts).await.map(Into::into)
}

/// Rotation against an explicit store handle.
pub(crate) async fn advance_on(
    store: &Arc<dyn JokeStore>,
    attempts: u32,
) -> Result<JokeEntity, ServiceError> {
    let jokes = store.list_by_creation().await?;
    if jokes.is_empty() {
        return Err(ServiceError::NoJokesAvailable);
    }

    let Some(current) = store.find_active().await? else {
        // Zero active jokes means a previous transition was interrupted;
        // heal instead of advancing from nowhere.
        let healed = repair_on(store).await?;
        return healed.ok_or(ServiceError::NoJokesAvailable);
    };

    let Some(next_id) = next_in_rotation(&jokes, current.id) else {
        return Err(ServiceError::NoJokesAvailable);
    };
    if next_id == current.id {
        // Single-joke catalog: the call is a no-op that still reports the
        // joke on stage.
        return Ok(current);
    }

    match retry_transient(attempts, || store.clear_active(current.id)).await {
        Ok(()) => {}
        Err(StorageError::Conflict { message }) => {
            // Another operator already moved the flag; reread and retry if
            // still desired.
            return Err(ServiceError::Conflict(message));
        }
        Err(other) => return Err(other.into()),
    }

    if let Err(err) = retry_transient(attempts, || store.mark_active(next_id)).await {
        warn!(joke = %next_id, error = %err, "activation failed mid-rotation; repairing");
        match repair_on(store).await {
            Ok(Some(healed)) => info!(joke = %healed.id, "catalog repaired after failed activation"),
            Ok(None) => warn!("catalog emptied while repairing"),
            Err(repair_err) => {
                warn!(error = %repair_err, "repair after failed activation also failed");
            }
        }
        return Err(err.into());
    }

    store
        .find_joke(next_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("joke `{next_id}` vanished mid-rotation")))
}

/// Heal the "zero active jokes" state by activating the smallest-id joke.
///
/// Idempotent: with an active joke already present this only reads. Returns
/// the active joke after the pass, or `None` on an empty catalog.
pub(crate) async fn repair_on(
    store: &Arc<dyn JokeStore>,
) -> Result<Option<JokeEntity>, ServiceError> {
    if let Some(active) = store.find_active().await? {
        return Ok(Some(active));
    }

    let jokes = store.list_by_creation().await?;
    let Some(first) = jokes.first() else {
        return Ok(None);
    };

    match store.mark_active(first.id).await {
        Ok(()) => {
            info!(joke = %first.id, "activated smallest-id joke during repair");
            store.find_active().await.map_err(Into::into)
        }
        // A concurrent caller repaired or rotated first; accept its outcome.
        Err(StorageError::Conflict { .. }) => store.find_active().await.map_err(Into::into),
        Err(other) => Err(other.into()),
    }
}

/// The joke to activate after `current`: smallest id strictly greater,
/// wrapping to the smallest id in the catalog. `None` only when `jokes` is
/// empty. The current joke is only returned when it is the sole entry.
fn next_in_rotation(jokes: &[JokeEntity], current: Uuid) -> Option<Uuid> {
    jokes
        .iter()
        .map(|joke| joke.id)
        .find(|id| *id > current)
        .or_else(|| jokes.first().map(|joke| joke.id))
}

async fn retry_transient<F, Fut>(attempts: u32, mut write: F) -> StorageResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StorageResult<()>>,
{
    let mut attempt = 0;
    loop {
        match write().await {
            // Conflicts are decisions, not noise; only transport-level
            // failures are worth another try.
            Err(StorageError::Unavailable { .. }) if attempt + 1 < attempts => attempt += 1,
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::SystemTime;

    use super::*;
    use crate::dao::joke_store::memory::MemoryJokeStore;
    use crate::dao::joke_store::test_support::FlakyStore;

    fn entity(id: u128) -> JokeEntity {
        JokeEntity {
            id: Uuid::from_u128(id),
            text: format!("joke {id}"),
            created_at: SystemTime::now(),
            is_active: false,
        }
    }

    #[test]
    fn next_walks_ascending_and_wraps() {
        let jokes = vec![entity(1), entity(2), entity(5)];
        assert_eq!(
            next_in_rotation(&jokes, Uuid::from_u128(1)),
            Some(Uuid::from_u128(2))
        );
        assert_eq!(
            next_in_rotation(&jokes, Uuid::from_u128(2)),
            Some(Uuid::from_u128(5))
        );
        assert_eq!(
            next_in_rotation(&jokes, Uuid::from_u128(5)),
            Some(Uuid::from_u128(1))
        );
    }

    #[test]
    fn next_on_a_single_entry_returns_that_entry() {
        let jokes = vec![entity(7)];
        assert_eq!(
            next_in_rotation(&jokes, Uuid::from_u128(7)),
            Some(Uuid::from_u128(7))
        );
    }

    #[test]
    fn next_on_an_empty_catalog_is_none() {
        assert_eq!(next_in_rotation(&[], Uuid::from_u128(1)), None);
    }

    async fn seeded_store(count: usize) -> (Arc<dyn JokeStore>, Vec<JokeEntity>) {
        let store = MemoryJokeStore::new();
        let mut jokes = Vec::new();
        for index in 0..count {
            jokes.push(store.insert_joke(format!("joke {index}")).await.unwrap());
        }
        (Arc::new(store), jokes)
    }

    async fn active_id(store: &Arc<dyn JokeStore>) -> Option<Uuid> {
        store.find_active().await.unwrap().map(|joke| joke.id)
    }

    async fn count_active(store: &Arc<dyn JokeStore>) -> usize {
        store
            .list_by_creation()
            .await
            .unwrap()
            .iter()
            .filter(|joke| joke.is_active)
            .count()
    }

    #[tokio::test]
    async fn full_cycle_visits_every_joke_once_and_wraps() {
        let (store, jokes) = seeded_store(4).await;
        store.mark_active(jokes[0].id).await.unwrap();

        let mut visited = Vec::new();
        for _ in 0..jokes.len() {
            let next = advance_on(&store, 3).await.unwrap();
            assert_eq!(count_active(&store).await, 1);
            visited.push(next.id);
        }

        let expected: Vec<Uuid> = jokes[1..]
            .iter()
            .map(|joke| joke.id)
            .chain([jokes[0].id])
            .collect();
        assert_eq!(visited, expected);
        // The (K+1)-th call lands back on the second joke.
        assert_eq!(advance_on(&store, 3).await.unwrap().id, jokes[1].id);
    }

    #[tokio::test]
    async fn single_joke_catalog_is_a_no_op() {
        let (store, jokes) = seeded_store(1).await;
        store.mark_active(jokes[0].id).await.unwrap();

        let result = advance_on(&store, 3).await.unwrap();
        assert_eq!(result.id, jokes[0].id);
        assert!(result.is_active);
        assert_eq!(active_id(&store).await, Some(jokes[0].id));
    }

    #[tokio::test]
    async fn empty_catalog_fails_without_mutation() {
        let (store, _) = seeded_store(0).await;
        let err = advance_on(&store, 3).await.unwrap_err();
        assert!(matches!(err, ServiceError::NoJokesAvailable));
        assert!(store.list_by_creation().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lost_race_surfaces_a_conflict() {
        let (store, jokes) = seeded_store(3).await;
        store.mark_active(jokes[0].id).await.unwrap();

        // Simulate the other operator winning the conditional deactivate.
        let flaky = FlakyStore::wrap(store.clone());
        flaky.conflicting_deactivations.store(true, Ordering::SeqCst);
        let contended: Arc<dyn JokeStore> = Arc::new(flaky);

        let err = advance_on(&contended, 3).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        // The loser changed nothing.
        assert_eq!(active_id(&store).await, Some(jokes[0].id));
    }

    #[tokio::test]
    async fn failed_activation_is_repaired_to_the_smallest_id() {
        let (store, jokes) = seeded_store(3).await;
        store.mark_active(jokes[1].id).await.unwrap();

        // The deactivate lands, every activate attempt fails: without repair
        // the catalog would be left with zero active jokes.
        let flaky = FlakyStore::wrap(store.clone());
        flaky.failing_activations.store(3, Ordering::SeqCst);
        let failing: Arc<dyn JokeStore> = Arc::new(flaky);

        let err = advance_on(&failing, 3).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));

        assert_eq!(count_active(&store).await, 1);
        assert_eq!(active_id(&store).await, Some(jokes[0].id));
    }

    #[tokio::test]
    async fn advance_with_no_active_joke_heals_first() {
        let (store, jokes) = seeded_store(2).await;

        let result = advance_on(&store, 3).await.unwrap();
        assert_eq!(result.id, jokes[0].id);
        assert_eq!(count_active(&store).await, 1);
    }

    #[tokio::test]
    async fn repair_is_idempotent() {
        let (store, jokes) = seeded_store(2).await;

        let healed = repair_on(&store).await.unwrap().unwrap();
        assert_eq!(healed.id, jokes[0].id);

        let again = repair_on(&store).await.unwrap().unwrap();
        assert_eq!(again.id, jokes[0].id);
        assert_eq!(count_active(&store).await, 1);
    }

    #[tokio::test]
    async fn repair_on_an_empty_catalog_is_none() {
        let (store, _) = seeded_store(0).await;
        assert!(repair_on(&store).await.unwrap().is_none());
    }
}
