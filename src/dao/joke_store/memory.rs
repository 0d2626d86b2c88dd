//! In-memory reference implementation of the [`JokeStore`] contract.
//!
//! Counters live in a sharded map and are bumped under the shard lock, so an
//! increment is a single atomic read-modify-write at the storage level. The
//! active flag is flipped through single-row compare-then-set writes under
//! the catalog lock; cross-row atomicity is deliberately absent, mirroring
//! backends that cannot offer multi-row transactions.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use crate::dao::joke_store::{ChangeEvent, ChangeKind, ChangeRow, JokeStore};
use crate::dao::models::{Category, JokeEntity, TallyEntity};
use crate::dao::storage::{StorageError, StorageResult};

/// Buffered change notifications per subscriber before lagging kicks in.
const CHANGE_FEED_CAPACITY: usize = 64;

struct Inner {
    /// Catalog keyed by UUIDv7, so iteration order is creation order.
    jokes: RwLock<BTreeMap<Uuid, JokeEntity>>,
    tallies: DashMap<(Uuid, Category), u64>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl Inner {
    fn publish(&self, kind: ChangeKind, row: ChangeRow) {
        // Nobody listening is fine; the feed is best-effort at this level.
        let _ = self.changes.send(ChangeEvent { kind, row });
    }
}

/// Single-process store backing the joke catalog, reaction counters and the
/// change-notification feed.
#[derive(Clone)]
pub struct MemoryJokeStore {
    inner: Arc<Inner>,
}

impl MemoryJokeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                jokes: RwLock::new(BTreeMap::new()),
                tallies: DashMap::new(),
                changes,
            }),
        }
    }
}

impl Default for MemoryJokeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JokeStore for MemoryJokeStore {
    fn insert_joke(&self, text: String) -> BoxFuture<'static, StorageResult<JokeEntity>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut jokes = inner.jokes.write().await;

            // UUIDv7 is time-ordered; regenerate on a same-instant collision
            // so the catalog key stays strictly creation-ordered.
            let mut id = Uuid::now_v7();
            while jokes.last_key_value().is_some_and(|(last, _)| *last >= id) {
                id = Uuid::now_v7();
            }

            let joke = JokeEntity {
                id,
                text,
                created_at: SystemTime::now(),
                is_active: false,
            };
            jokes.insert(joke.id, joke.clone());
            inner.publish(ChangeKind::Insert, ChangeRow::Joke(joke.clone()));
            Ok(joke)
        })
    }

    fn find_joke(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<JokeEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.jokes.read().await.get(&id).cloned()) })
    }

    fn find_active(&self) -> BoxFuture<'static, StorageResult<Option<JokeEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let jokes = inner.jokes.read().await;
            Ok(jokes.values().find(|joke| joke.is_active).cloned())
        })
    }

    fn list_by_creation(&self) -> BoxFuture<'static, StorageResult<Vec<JokeEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.jokes.read().await.values().cloned().collect()) })
    }

    fn clear_active(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut jokes = inner.jokes.write().await;
            let joke = jokes
                .get_mut(&id)
                .ok_or_else(|| StorageError::not_found(format!("joke `{id}` does not exist")))?;
            if !joke.is_active {
                return Err(StorageError::conflict(format!(
                    "joke `{id}` is not the active joke"
                )));
            }
            joke.is_active = false;
            let row = joke.clone();
            inner.publish(ChangeKind::Update, ChangeRow::Joke(row));
            Ok(())
        })
    }

    fn mark_active(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut jokes = inner.jokes.write().await;
            let joke = jokes
                .get_mut(&id)
                .ok_or_else(|| StorageError::not_found(format!("joke `{id}` does not exist")))?;
            if joke.is_active {
                return Err(StorageError::conflict(format!(
                    "joke `{id}` is already active"
                )));
            }
            joke.is_active = true;
            let row = joke.clone();
            inner.publish(ChangeKind::Update, ChangeRow::Joke(row));
            Ok(())
        })
    }

    fn increment_tally(
        &self,
        id: Uuid,
        category: Category,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            if !inner.jokes.read().await.contains_key(&id) {
                return Err(StorageError::not_found(format!(
                    "joke `{id}` does not exist"
                )));
            }

            // The add-one happens under the counter's shard lock, and the
            // notification is published before the lock is released so the
            // feed carries authoritative totals in per-key order.
            let mut entry = inner.tallies.entry((id, category)).or_insert(0);
            *entry += 1;
            let count = *entry;
            inner.publish(
                if count == 1 {
                    ChangeKind::Insert
                } else {
                    ChangeKind::Update
                },
                ChangeRow::Tally(TallyEntity {
                    joke_id: id,
                    category,
                    count,
                }),
            );
            drop(entry);

            Ok(count)
        })
    }

    fn tallies(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<IndexMap<Category, u64>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            if !inner.jokes.read().await.contains_key(&id) {
                return Err(StorageError::not_found(format!(
                    "joke `{id}` does not exist"
                )));
            }

            let mut counts = IndexMap::new();
            for category in Category::ALL {
                if let Some(count) = inner.tallies.get(&(id, category)) {
                    counts.insert(category, *count);
                }
            }
            Ok(counts)
        })
    }

    fn watch_changes(
        &self,
    ) -> BoxFuture<'static, StorageResult<broadcast::Receiver<ChangeEvent>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.changes.subscribe()) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded(texts: &[&str]) -> (MemoryJokeStore, Vec<JokeEntity>) {
        let store = MemoryJokeStore::new();
        let mut jokes = Vec::new();
        for text in texts {
            jokes.push(store.insert_joke((*text).into()).await.unwrap());
        }
        (store, jokes)
    }

    #[tokio::test]
    async fn catalog_lists_in_creation_order() {
        let (store, jokes) = seeded(&["first", "second", "third"]).await;
        let listed = store.list_by_creation().await.unwrap();
        let ids: Vec<_> = listed.iter().map(|joke| joke.id).collect();
        let expected: Vec<_> = jokes.iter().map(|joke| joke.id).collect();
        assert_eq!(ids, expected);
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test]
    async fn conditional_writes_enforce_the_active_flag() {
        let (store, jokes) = seeded(&["one", "two"]).await;

        store.mark_active(jokes[0].id).await.unwrap();
        assert!(matches!(
            store.mark_active(jokes[0].id).await,
            Err(StorageError::Conflict { .. })
        ));

        assert!(matches!(
            store.clear_active(jokes[1].id).await,
            Err(StorageError::Conflict { .. })
        ));
        store.clear_active(jokes[0].id).await.unwrap();
        assert!(store.find_active().await.unwrap().is_none());

        assert!(matches!(
            store.clear_active(Uuid::now_v7()).await,
            Err(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_never_lose_updates() {
        let (store, jokes) = seeded(&["contended"]).await;
        let id = jokes[0].id;

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..4 {
                    store
                        .increment_tally(id, Category::Laughing)
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let counts = store.tallies(id).await.unwrap();
        assert_eq!(counts.get(&Category::Laughing), Some(&128));
    }

    #[tokio::test]
    async fn change_feed_carries_authoritative_totals() {
        let (store, jokes) = seeded(&["observed"]).await;
        let id = jokes[0].id;
        let mut feed = store.watch_changes().await.unwrap();

        store.increment_tally(id, Category::Neutral).await.unwrap();
        store.increment_tally(id, Category::Neutral).await.unwrap();

        let first = feed.recv().await.unwrap();
        assert_eq!(first.kind, ChangeKind::Insert);
        let ChangeRow::Tally(tally) = first.row else {
            panic!("expected a tally row");
        };
        assert_eq!((tally.category, tally.count), (Category::Neutral, 1));

        let second = feed.recv().await.unwrap();
        assert_eq!(second.kind, ChangeKind::Update);
        let ChangeRow::Tally(tally) = second.row else {
            panic!("expected a tally row");
        };
        assert_eq!(tally.count, 2);
    }

    #[tokio::test]
    async fn unknown_joke_is_rejected() {
        let store = MemoryJokeStore::new();
        assert!(matches!(
            store.increment_tally(Uuid::now_v7(), Category::Laughing).await,
            Err(StorageError::NotFound { .. })
        ));
        assert!(matches!(
            store.tallies(Uuid::now_v7()).await,
            Err(StorageError::NotFound { .. })
        ));
    }
}
