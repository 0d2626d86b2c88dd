//! DTO definitions used by the operator REST API.

use serde::Deserialize;
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::dto::validation::validate_joke_text;

/// Payload submitted when an operator adds a joke to the catalog.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateJokeRequest {
    /// The joke text; must not be blank and is capped at 500 characters.
    pub text: String,
}

impl Validate for CreateJokeRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_joke_text(&self.text) {
            errors.add("text", e);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}
