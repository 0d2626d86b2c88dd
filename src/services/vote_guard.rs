//! Advisory per-viewer reaction dedup.
//!
//! Each viewer gets one reaction per joke. The guard is local bookkeeping
//! keyed by the identifier the viewer's device generated for itself, backed
//! by a device-style key→value ledger; it intentionally does not pretend to
//! be an identity system. A viewer that clears its ledger (or picks a new
//! identifier) can react again — an accepted limitation.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::dao::models::Category;

/// Returned when a second reaction for the same joke is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("a reaction for joke `{joke_id}` is already recorded ({existing})")]
pub struct AlreadyVoted {
    /// Joke the viewer already reacted to.
    pub joke_id: Uuid,
    /// The reaction that was recorded first.
    pub existing: Category,
}

/// One viewer's vote records: at most one entry per joke, immutable once set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoteGuard {
    entries: HashMap<Uuid, Category>,
}

impl VoteGuard {
    /// Whether this viewer already reacted to `joke_id`.
    pub fn has_voted(&self, joke_id: Uuid) -> bool {
        self.entries.contains_key(&joke_id)
    }

    /// The reaction recorded for `joke_id`, if any.
    pub fn vote(&self, joke_id: Uuid) -> Option<Category> {
        self.entries.get(&joke_id).copied()
    }

    /// Record a first vote for `joke_id`.
    ///
    /// A second call for the same joke is rejected without touching the
    /// existing entry, whatever category it carries.
    pub fn record_vote(&mut self, joke_id: Uuid, category: Category) -> Result<(), AlreadyVoted> {
        if let Some(existing) = self.entries.get(&joke_id) {
            return Err(AlreadyVoted {
                joke_id,
                existing: *existing,
            });
        }
        self.entries.insert(joke_id, category);
        Ok(())
    }
}

/// Durable key→value storage for vote records.
pub trait VoteLedger: Send + Sync {
    /// Read every viewer's records back from the ledger.
    fn load(&self) -> io::Result<HashMap<String, VoteGuard>>;
    /// Replace the ledger contents with the given snapshot.
    fn persist(&self, guards: &HashMap<String, VoteGuard>) -> io::Result<()>;
}

/// JSON-file ledger, the on-disk analogue of a browser's local storage:
/// a map of viewer id to `{ joke_id: emoji }`.
pub struct JsonFileLedger {
    path: PathBuf,
}

impl JsonFileLedger {
    /// Build a ledger that reads and writes `path`.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl VoteLedger for JsonFileLedger {
    fn load(&self) -> io::Result<HashMap<String, VoteGuard>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(err) => Err(err),
        }
    }

    fn persist(&self, guards: &HashMap<String, VoteGuard>) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(guards)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        fs::write(&self.path, contents)
    }
}

/// Shared registry of per-viewer guards, persisted through the ledger after
/// every accepted vote.
pub struct VoteGuardRegistry {
    guards: DashMap<String, VoteGuard>,
    ledger: Option<Box<dyn VoteLedger>>,
}

impl VoteGuardRegistry {
    /// Build the registry, loading existing records from the ledger.
    ///
    /// An unreadable ledger starts the registry empty rather than refusing
    /// to boot; reactions are advisory state, not show data.
    pub fn new(ledger: Option<Box<dyn VoteLedger>>) -> Self {
        let guards = DashMap::new();
        if let Some(ledger) = &ledger {
            match ledger.load() {
                Ok(records) => {
                    for (viewer, guard) in records {
                        guards.insert(viewer, guard);
                    }
                }
                Err(err) => {
                    warn!(error = %err, "could not load vote ledger; starting empty");
                }
            }
        }
        Self { guards, ledger }
    }

    /// Whether `viewer` already reacted to `joke_id`.
    pub fn has_voted(&self, viewer: &str, joke_id: Uuid) -> bool {
        self.guards
            .get(viewer)
            .map(|guard| guard.has_voted(joke_id))
            .unwrap_or(false)
    }

    /// Record `viewer`'s first vote for `joke_id`, then persist the ledger.
    pub fn record(
        &self,
        viewer: &str,
        joke_id: Uuid,
        category: Category,
    ) -> Result<(), AlreadyVoted> {
        {
            let mut guard = self.guards.entry(viewer.to_string()).or_default();
            guard.record_vote(joke_id, category)?;
        }
        self.persist();
        Ok(())
    }

    fn persist(&self) {
        let Some(ledger) = &self.ledger else {
            return;
        };
        let snapshot: HashMap<String, VoteGuard> = self
            .guards
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        if let Err(err) = ledger.persist(&snapshot) {
            warn!(error = %err, "failed to persist vote ledger");
        }
    }
}
