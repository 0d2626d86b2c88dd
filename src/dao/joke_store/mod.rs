pub mod memory;

use futures::future::BoxFuture;
use indexmap::IndexMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dao::models::{Category, JokeEntity, TallyEntity};
use crate::dao::storage::StorageResult;

/// Which kind of mutation produced a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The row did not exist before the write.
    Insert,
    /// An existing row was updated in place.
    Update,
}

/// The row carried by a change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeRow {
    /// A joke row changed (insertion or active-flag flip).
    Joke(JokeEntity),
    /// A tally row changed; `count` is the authoritative new total.
    Tally(TallyEntity),
}

/// A single entry on the store's change-notification feed.
///
/// Delivery is at-least-once: entries may arrive duplicated or reordered
/// within a short window, so consumers must treat tally rows as authoritative
/// replacements rather than increments to apply locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Whether the row was inserted or updated.
    pub kind: ChangeKind,
    /// The row after the mutation.
    pub row: ChangeRow,
}

/// Abstraction over the persistence layer for the joke catalog and its
/// reaction counters.
///
/// Two families of writes matter for correctness:
///
/// * `increment_tally` is an atomic storage-level "add one" — callers never
///   read a count, add one and write it back, which would lose updates under
///   concurrent writers.
/// * `clear_active` / `mark_active` are single-row conditional writes that
///   fail with a conflict when the row's active flag is not in the expected
///   state, which is what serializes concurrent rotations.
pub trait JokeStore: Send + Sync {
    /// Append a joke to the catalog, assigning it a creation-ordered id.
    fn insert_joke(&self, text: String) -> BoxFuture<'static, StorageResult<JokeEntity>>;
    /// Fetch a joke by id.
    fn find_joke(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<JokeEntity>>>;
    /// Fetch the joke currently flagged active, if any.
    fn find_active(&self) -> BoxFuture<'static, StorageResult<Option<JokeEntity>>>;
    /// List the whole catalog in ascending creation order.
    fn list_by_creation(&self) -> BoxFuture<'static, StorageResult<Vec<JokeEntity>>>;
    /// Drop the active flag on `id`, failing with a conflict unless the row
    /// is currently active.
    fn clear_active(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>>;
    /// Raise the active flag on `id`, failing with a conflict if the row is
    /// already active.
    fn mark_active(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>>;
    /// Atomically add one to the `(id, category)` counter and return the new
    /// authoritative total.
    fn increment_tally(
        &self,
        id: Uuid,
        category: Category,
    ) -> BoxFuture<'static, StorageResult<u64>>;
    /// Fetch the counters recorded for a joke (absent pairs are zero).
    fn tallies(&self, id: Uuid)
    -> BoxFuture<'static, StorageResult<IndexMap<Category, u64>>>;
    /// Open a channel onto the store's change-notification feed.
    fn watch_changes(
        &self,
    ) -> BoxFuture<'static, StorageResult<broadcast::Receiver<ChangeEvent>>>;
    /// Cheap liveness probe used by the storage supervisor.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Attempt to re-establish connectivity after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use super::*;
    use crate::dao::storage::StorageError;

    /// Test double wrapping a real store with injectable failures, used to
    /// exercise retry and repair paths without a flaky backend.
    pub(crate) struct FlakyStore {
        inner: Arc<dyn JokeStore>,
        /// Remaining `increment_tally` calls to fail with a conflict.
        pub(crate) conflicting_increments: AtomicU32,
        /// Remaining `mark_active` calls to fail as unavailable.
        pub(crate) failing_activations: AtomicU32,
        /// When set, every `clear_active` call fails with a conflict.
        pub(crate) conflicting_deactivations: AtomicBool,
    }

    impl FlakyStore {
        pub(crate) fn wrap(inner: Arc<dyn JokeStore>) -> Self {
            Self {
                inner,
                conflicting_increments: AtomicU32::new(0),
                failing_activations: AtomicU32::new(0),
                conflicting_deactivations: AtomicBool::new(false),
            }
        }

        fn take_failure(counter: &AtomicU32) -> bool {
            counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                    remaining.checked_sub(1)
                })
                .is_ok()
        }
    }

    impl JokeStore for FlakyStore {
        fn insert_joke(&self, text: String) -> BoxFuture<'static, StorageResult<JokeEntity>> {
            self.inner.insert_joke(text)
        }

        fn find_joke(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<JokeEntity>>> {
            self.inner.find_joke(id)
        }

        fn find_active(&self) -> BoxFuture<'static, StorageResult<Option<JokeEntity>>> {
            self.inner.find_active()
        }

        fn list_by_creation(&self) -> BoxFuture<'static, StorageResult<Vec<JokeEntity>>> {
            self.inner.list_by_creation()
        }

        fn clear_active(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
            if self.conflicting_deactivations.load(Ordering::SeqCst) {
                return Box::pin(async move {
                    Err(StorageError::conflict(format!(
                        "joke `{id}` is no longer active"
                    )))
                });
            }
            self.inner.clear_active(id)
        }

        fn mark_active(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
            if Self::take_failure(&self.failing_activations) {
                return Box::pin(async {
                    Err(StorageError::unavailable(
                        "injected activation outage".into(),
                        std::io::Error::new(std::io::ErrorKind::ConnectionReset, "injected"),
                    ))
                });
            }
            self.inner.mark_active(id)
        }

        fn increment_tally(
            &self,
            id: Uuid,
            category: Category,
        ) -> BoxFuture<'static, StorageResult<u64>> {
            if Self::take_failure(&self.conflicting_increments) {
                return Box::pin(async move {
                    Err(StorageError::conflict(format!(
                        "counter `{id}`/{category} is contended"
                    )))
                });
            }
            self.inner.increment_tally(id, category)
        }

        fn tallies(
            &self,
            id: Uuid,
        ) -> BoxFuture<'static, StorageResult<IndexMap<Category, u64>>> {
            self.inner.tallies(id)
        }

        fn watch_changes(
            &self,
        ) -> BoxFuture<'static, StorageResult<broadcast::Receiver<ChangeEvent>>> {
            self.inner.watch_changes()
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.try_reconnect()
        }
    }
}
