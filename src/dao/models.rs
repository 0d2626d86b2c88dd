use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// The fixed set of emoji reactions a viewer can apply to a joke.
///
/// The set is closed: every layer (storage, services, SSE payloads) shares
/// these five kinds and nothing is user-extensible. Each variant serializes
/// as the emoji itself so wire payloads carry the glyph directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Category {
    /// 🤣 — the joke landed.
    #[serde(rename = "🤣")]
    Laughing,
    /// 😅 — close enough.
    #[serde(rename = "😅")]
    Smirking,
    /// 😐 — no reaction earned.
    #[serde(rename = "😐")]
    Neutral,
    /// 😝 — groan-worthy.
    #[serde(rename = "😝")]
    Annoyed,
    /// 🤔 — still thinking about it.
    #[serde(rename = "🤔")]
    Surprised,
}

impl Category {
    /// Every reaction kind, in display order.
    pub const ALL: [Category; 5] = [
        Category::Laughing,
        Category::Smirking,
        Category::Neutral,
        Category::Annoyed,
        Category::Surprised,
    ];

    /// The emoji glyph this category serializes to.
    pub fn emoji(&self) -> &'static str {
        match self {
            Category::Laughing => "🤣",
            Category::Smirking => "😅",
            Category::Neutral => "😐",
            Category::Annoyed => "😝",
            Category::Surprised => "🤔",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.emoji())
    }
}

/// A joke row as stored and shared across layers.
///
/// Ids are UUIDv7, so the id itself is the creation-ordered rotation key:
/// the store hands them out in strictly increasing order and rotation walks
/// them ascending.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JokeEntity {
    /// Creation-ordered identifier of the joke.
    pub id: Uuid,
    /// The joke itself.
    pub text: String,
    /// When the joke was added to the catalog.
    pub created_at: SystemTime,
    /// Whether this joke is the one currently shown to viewers.
    ///
    /// At most one row carries `true` at any externally observable instant;
    /// a transient zero-active window during rotation is healed by repair.
    pub is_active: bool,
}

/// One reaction counter row, keyed by `(joke, category)`.
///
/// A row exists only once the pair has received at least one reaction;
/// absent pairs count as zero. The count carried here is always the
/// authoritative total after the write that produced the row, never a delta.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TallyEntity {
    /// Joke the counter belongs to.
    pub joke_id: Uuid,
    /// Reaction kind being counted.
    pub category: Category,
    /// Total accepted reactions for this pair.
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_serialize_as_emoji() {
        let json = serde_json::to_string(&Category::Laughing).unwrap();
        assert_eq!(json, "\"🤣\"");

        let parsed: Category = serde_json::from_str("\"😝\"").unwrap();
        assert_eq!(parsed, Category::Annoyed);
    }

    #[test]
    fn unknown_emoji_is_rejected() {
        assert!(serde_json::from_str::<Category>("\"💩\"").is_err());
    }

    #[test]
    fn all_lists_every_kind_once() {
        let mut seen = std::collections::HashSet::new();
        for category in Category::ALL {
            assert!(seen.insert(category.emoji()));
        }
        assert_eq!(seen.len(), 5);
    }
}
