//! Application-level configuration loading for the synchronization tunables.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PUNCHLINE_BACK_CONFIG_PATH";

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Reaction aggregation tunables.
    pub reaction: ReactionSettings,
    /// Rotation controller tunables.
    pub rotation: RotationSettings,
    /// Subscription channel tunables.
    pub subscription: SubscriptionSettings,
    /// SSE broadcast channel capacities.
    pub sse: SseSettings,
    /// Vote ledger persistence.
    pub votes: VoteSettings,
}

/// Bounds for the atomic-increment retry loop.
#[derive(Debug, Clone)]
pub struct ReactionSettings {
    /// Attempts before a contended counter surfaces a conflict to the caller.
    pub max_increment_attempts: u32,
}

/// Bounds for transient storage retries during rotation.
#[derive(Debug, Clone)]
pub struct RotationSettings {
    /// Attempts per conditional write before the failure is surfaced.
    pub max_storage_attempts: u32,
}

/// Backoff schedule for reconnecting subscription channels.
#[derive(Debug, Clone)]
pub struct SubscriptionSettings {
    /// Fixed delay between reconnect attempts.
    pub backoff: Duration,
    /// Connect attempts before a channel becomes terminally failed.
    pub max_attempts: u32,
}

/// Capacities of the SSE broadcast hubs.
#[derive(Debug, Clone)]
pub struct SseSettings {
    /// Buffered events per public subscriber.
    pub public_capacity: usize,
    /// Buffered events per admin subscriber.
    pub admin_capacity: usize,
}

/// Where viewer vote records are persisted between restarts.
#[derive(Debug, Clone)]
pub struct VoteSettings {
    /// JSON ledger file; `None` keeps vote records in memory only.
    pub ledger_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            reaction: ReactionSettings {
                max_increment_attempts: 3,
            },
            rotation: RotationSettings {
                max_storage_attempts: 3,
            },
            subscription: SubscriptionSettings {
                backoff: Duration::from_millis(2_000),
                max_attempts: 5,
            },
            sse: SseSettings {
                public_capacity: 16,
                admin_capacity: 16,
            },
            votes: VoteSettings {
                ledger_path: Some(PathBuf::from("data/votes.json")),
            },
        }
    }
}

/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
///
/// Every field is optional; omitted sections keep their defaults.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    max_increment_attempts: Option<u32>,
    max_rotation_storage_attempts: Option<u32>,
    subscription_backoff_ms: Option<u64>,
    subscription_max_attempts: Option<u32>,
    sse_public_capacity: Option<usize>,
    sse_admin_capacity: Option<usize>,
    vote_ledger_path: Option<PathBuf>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            reaction: ReactionSettings {
                max_increment_attempts: raw
                    .max_increment_attempts
                    .unwrap_or(defaults.reaction.max_increment_attempts),
            },
            rotation: RotationSettings {
                max_storage_attempts: raw
                    .max_rotation_storage_attempts
                    .unwrap_or(defaults.rotation.max_storage_attempts),
            },
            subscription: SubscriptionSettings {
                backoff: raw
                    .subscription_backoff_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.subscription.backoff),
                max_attempts: raw
                    .subscription_max_attempts
                    .unwrap_or(defaults.subscription.max_attempts),
            },
            sse: SseSettings {
                public_capacity: raw
                    .sse_public_capacity
                    .unwrap_or(defaults.sse.public_capacity),
                admin_capacity: raw
                    .sse_admin_capacity
                    .unwrap_or(defaults.sse.admin_capacity),
            },
            votes: VoteSettings {
                ledger_path: raw.vote_ledger_path.or(defaults.votes.ledger_path),
            },
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
