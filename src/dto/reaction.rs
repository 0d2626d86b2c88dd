//! Reaction submission payloads and the authoritative tally snapshot.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::dao::models::Category;
use crate::dto::validation::validate_viewer_id;

/// A viewer's reaction to a joke.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReactionRequest {
    /// Joke being reacted to.
    pub joke_id: Uuid,
    /// Which of the five reaction kinds was clicked.
    pub emoji: Category,
    /// Opaque identifier the viewer's device generated for itself.
    ///
    /// This is advisory dedup only: a viewer that resets its identifier can
    /// react again, the same way clearing device-local state would.
    pub viewer_id: String,
}

impl Validate for ReactionRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_viewer_id(&self.viewer_id) {
            errors.add("viewer_id", e);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Authoritative state of one reaction counter after a mutation.
///
/// Consumers replace their local value with `count`; they never add to it,
/// so duplicated or reordered delivery cannot double-count.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TallySnapshot {
    /// Joke the counter belongs to.
    pub joke_id: Uuid,
    /// Reaction kind being counted.
    pub emoji: Category,
    /// New authoritative total.
    pub count: u64,
}
