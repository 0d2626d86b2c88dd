//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest joke text accepted by the catalog.
const MAX_JOKE_CHARS: usize = 500;
/// Bounds for the viewer-generated identifier.
const MIN_VIEWER_ID_CHARS: usize = 8;
const MAX_VIEWER_ID_CHARS: usize = 64;

/// Validates that a joke text is non-blank and within the length cap.
pub fn validate_joke_text(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        let mut err = ValidationError::new("joke_text_blank");
        err.message = Some("Joke text must not be blank".into());
        return Err(err);
    }

    let chars = text.chars().count();
    if chars > MAX_JOKE_CHARS {
        let mut err = ValidationError::new("joke_text_length");
        err.message = Some(
            format!("Joke text must be at most {MAX_JOKE_CHARS} characters (got {chars})").into(),
        );
        return Err(err);
    }

    Ok(())
}

/// Validates a viewer identifier: 8 to 64 characters drawn from
/// `[A-Za-z0-9_-]`.
pub fn validate_viewer_id(id: &str) -> Result<(), ValidationError> {
    let chars = id.chars().count();
    if !(MIN_VIEWER_ID_CHARS..=MAX_VIEWER_ID_CHARS).contains(&chars) {
        let mut err = ValidationError::new("viewer_id_length");
        err.message = Some(
            format!(
                "Viewer ID must be {MIN_VIEWER_ID_CHARS} to {MAX_VIEWER_ID_CHARS} characters (got {chars})"
            )
            .into(),
        );
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        let mut err = ValidationError::new("viewer_id_format");
        err.message =
            Some("Viewer ID must contain only letters, digits, dashes or underscores".into());
        return Err(err);
    }

    Ok(())
}
