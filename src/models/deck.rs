//! Deck and flashcard models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

string_enum! {
    pub enum DeckStatus {
        Active => "ACTIVE",
        Archived => "ARCHIVED",
    }
    default = Active;
}

/// A user's collection of flashcards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deck {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub tags: Vec<String>,
    pub cover_image_url: Option<String>,
    pub status: DeckStatus,
    /// Denormalized; kept in step with flashcard inserts and deletes
    pub flashcard_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDeckInput {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    pub cover_image_url: Option<String>,
}

impl CreateDeckInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            is_public: false,
            tags: Vec::new(),
            cover_image_url: None,
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn public(mut self) -> Self {
        self.is_public = true;
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDeckInput {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub description: Option<Option<String>>,
    pub is_public: Option<bool>,
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub cover_image_url: Option<Option<String>>,
    pub status: Option<DeckStatus>,
}

/// Per-user deck statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeckStats {
    pub total_decks: i64,
    pub public_decks: i64,
    pub total_flashcards: i64,
    pub favorite_decks: i64,
}

string_enum! {
    pub enum FlashcardStatus {
        Learning => "LEARNING",
        Review => "REVIEW",
        Suspended => "SUSPENDED",
    }
    default = Learning;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: i64,
    pub user_id: i64,
    pub deck_id: i64,
    pub front_content: String,
    pub back_content: String,
    pub personal_notes: Option<String>,
    pub tags: Vec<String>,
    pub status: FlashcardStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFlashcardInput {
    pub deck_id: i64,
    pub front_content: String,
    pub back_content: String,
    pub personal_notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CreateFlashcardInput {
    pub fn new(deck_id: i64, front: impl Into<String>, back: impl Into<String>) -> Self {
        Self {
            deck_id,
            front_content: front.into(),
            back_content: back.into(),
            personal_notes: None,
            tags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateFlashcardInput {
    pub front_content: Option<String>,
    pub back_content: Option<String>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub personal_notes: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub status: Option<FlashcardStatus>,
}
