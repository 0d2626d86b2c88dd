mod sse;

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, watch};

use crate::{
    config::AppConfig,
    dao::joke_store::JokeStore,
    error::ServiceError,
    services::vote_guard::{JsonFileLedger, VoteGuardRegistry, VoteLedger},
};

pub use self::sse::SseHub;
use self::sse::SseState;

/// Cheaply clonable handle on the central application state.
pub type SharedState = Arc<AppState>;

/// Central application state: the storage slot, the SSE hubs, the vote
/// registry and the degraded-mode flag.
pub struct AppState {
    config: AppConfig,
    joke_store: RwLock<Option<Arc<dyn JokeStore>>>,
    sse: SseState,
    votes: VoteGuardRegistry,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let ledger = config
            .votes
            .ledger_path
            .clone()
            .map(|path| Box::new(JsonFileLedger::new(path)) as Box<dyn VoteLedger>);
        Arc::new(Self {
            sse: SseState::new(&config.sse),
            votes: VoteGuardRegistry::new(ledger),
            joke_store: RwLock::new(None),
            degraded: degraded_tx,
            config,
        })
    }

    /// Runtime configuration shared across services.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current joke store, if one is installed.
    pub async fn joke_store(&self) -> Option<Arc<dyn JokeStore>> {
        let guard = self.joke_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the joke store or fail with the degraded-mode error.
    pub async fn require_joke_store(&self) -> Result<Arc<dyn JokeStore>, ServiceError> {
        self.joke_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new joke store implementation and leave degraded mode.
    pub async fn install_joke_store(&self, store: Arc<dyn JokeStore>) {
        {
            let mut guard = self.joke_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current joke store and enter degraded mode.
    pub async fn clear_joke_store(&self) {
        {
            let mut guard = self.joke_store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.joke_store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        if *self.degraded.borrow() == value {
            return;
        }

        let _ = self.degraded.send(value);
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        self.sse.public()
    }

    /// Broadcast hub used for the admin SSE stream.
    pub fn admin_sse(&self) -> &SseHub {
        self.sse.admin().hub()
    }

    /// Token guard that ensures a single admin SSE subscriber at a time.
    pub fn admin_token(&self) -> &Mutex<Option<String>> {
        self.sse.admin().token()
    }

    /// Per-viewer vote dedup registry.
    pub fn votes(&self) -> &VoteGuardRegistry {
        &self.votes
    }
}
