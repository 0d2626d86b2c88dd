//! Projections of the joke catalog exposed over REST and SSE.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::{Category, JokeEntity};
use crate::dto::format_system_time;

/// A joke as shown to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JokeSummary {
    /// Creation-ordered identifier.
    pub id: Uuid,
    /// The joke itself.
    pub text: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// Whether this joke is the one currently on stage.
    pub is_active: bool,
}

impl From<JokeEntity> for JokeSummary {
    fn from(joke: JokeEntity) -> Self {
        Self {
            id: joke.id,
            text: joke.text,
            created_at: format_system_time(joke.created_at),
            is_active: joke.is_active,
        }
    }
}

/// One reaction counter inside a tally listing; zero when no reaction of
/// that kind has been recorded yet.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TallyCount {
    /// Reaction kind.
    pub emoji: Category,
    /// Accepted reactions of this kind.
    pub count: u64,
}

/// The active joke together with its complete tally map.
#[derive(Debug, Serialize, ToSchema)]
pub struct CurrentJokeResponse {
    /// Joke currently on stage.
    pub joke: JokeSummary,
    /// One entry per reaction kind, absent pairs reported as zero.
    pub tallies: Vec<TallyCount>,
}

/// The whole catalog in creation order.
#[derive(Debug, Serialize, ToSchema)]
pub struct JokeListResponse {
    /// Jokes sorted by creation-ordered id.
    pub jokes: Vec<JokeSummary>,
}

/// Tallies for one specific joke.
#[derive(Debug, Serialize, ToSchema)]
pub struct TalliesResponse {
    /// Joke the counters belong to.
    pub joke_id: Uuid,
    /// One entry per reaction kind, absent pairs reported as zero.
    pub tallies: Vec<TallyCount>,
}
