//! Spaced-repetition models
//!
//! Every reviewable item (flashcard, question, error note) is tracked by one
//! [`FsrsCard`] per user. Reviews append a [`ReviewLog`] holding the state
//! before the review and a [`ReviewHistoryEntry`] holding the state after.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

string_enum! {
    pub enum ReviewContentType {
        Flashcard => "FLASHCARD",
        Question => "QUESTION",
        ErrorNotebook => "ERROR_NOTEBOOK",
    }
    default = Flashcard;
}

string_enum! {
    /// Memory state of a card
    pub enum CardState {
        New => "NEW",
        Learning => "LEARNING",
        Review => "REVIEW",
        Relearning => "RELEARNING",
    }
    default = New;
}

/// Review rating.
///
/// Clients send 0..=3; the scheduler works with 1..=4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Grade {
    Again = 1,
    Hard = 2,
    Good = 3,
    Easy = 4,
}

impl Grade {
    /// Map the 0..=3 rating used by clients
    pub fn from_client(value: i64) -> Option<Self> {
        match value {
            0 => Some(Grade::Again),
            1 => Some(Grade::Hard),
            2 => Some(Grade::Good),
            3 => Some(Grade::Easy),
            _ => None,
        }
    }

    /// Scheduler value, 1..=4
    pub fn value(self) -> i32 {
        self as i32
    }

    /// Index into the initial-stability weights w0..w3
    pub fn index(self) -> usize {
        self as usize - 1
    }
}

impl TryFrom<u8> for Grade {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Grade::Again),
            2 => Ok(Grade::Hard),
            3 => Ok(Grade::Good),
            4 => Ok(Grade::Easy),
            _ => Err(format!("Invalid grade: {}", value)),
        }
    }
}

impl From<Grade> for u8 {
    fn from(grade: Grade) -> Self {
        grade as u8
    }
}

/// Scheduling state for one (user, content) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsrsCard {
    pub id: i64,
    pub user_id: i64,
    pub content_type: ReviewContentType,
    pub content_id: i64,
    /// Deck of a flashcard item
    pub deck_id: Option<i64>,
    /// Subject used for summary breakdowns
    pub subject: Option<String>,
    pub due: DateTime<Utc>,
    pub stability: f64,
    pub difficulty: f64,
    pub elapsed_days: i64,
    pub scheduled_days: i64,
    pub reps: i64,
    pub lapses: i64,
    pub state: CardState,
    pub last_review: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot of a card before a review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewLog {
    pub id: i64,
    pub card_id: i64,
    pub grade: Grade,
    pub state: CardState,
    pub due: DateTime<Utc>,
    pub stability: f64,
    pub difficulty: f64,
    pub elapsed_days: i64,
    pub last_elapsed_days: i64,
    pub scheduled_days: i64,
    pub review_time_ms: i64,
    pub reviewed_at: DateTime<Utc>,
}

/// Outcome of a review as recorded in the user's history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewHistoryEntry {
    pub id: i64,
    pub user_id: i64,
    pub card_id: i64,
    pub content_type: ReviewContentType,
    pub content_id: i64,
    pub grade: Grade,
    pub state: CardState,
    pub stability: f64,
    pub difficulty: f64,
    pub scheduled_days: i64,
    pub review_time_ms: i64,
    pub reviewed_at: DateTime<Utc>,
}

/// Registration of a new reviewable item
#[derive(Debug, Clone)]
pub struct NewReviewItem {
    pub user_id: i64,
    pub content_type: ReviewContentType,
    pub content_id: i64,
    pub deck_id: Option<i64>,
    pub subject: Option<String>,
}

impl NewReviewItem {
    pub fn new(user_id: i64, content_type: ReviewContentType, content_id: i64) -> Self {
        Self {
            user_id,
            content_type,
            content_id,
            deck_id: None,
            subject: None,
        }
    }

    pub fn with_deck(mut self, deck_id: i64) -> Self {
        self.deck_id = Some(deck_id);
        self
    }

    pub fn with_subject(mut self, subject: Option<String>) -> Self {
        self.subject = subject;
        self
    }
}

/// Position of the last card of a page in `due ASC, id ASC` order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueCursor {
    pub due: DateTime<Utc>,
    pub id: i64,
}

impl From<&FsrsCard> for DueCursor {
    fn from(card: &FsrsCard) -> Self {
        Self {
            due: card.due,
            id: card.id,
        }
    }
}

/// Keyset-paginated query over a user's cards, earliest due first
#[derive(Debug, Clone)]
pub struct DueQuery {
    pub page_size: u32,
    /// Last card of the previous page
    pub cursor: Option<DueCursor>,
    /// Only cards whose due date has passed
    pub due_only: bool,
    pub content_type: Option<ReviewContentType>,
    pub deck_id: Option<i64>,
}

impl Default for DueQuery {
    fn default() -> Self {
        Self {
            page_size: 20,
            cursor: None,
            due_only: true,
            content_type: None,
            deck_id: None,
        }
    }
}

/// One page of cards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuePage {
    pub items: Vec<FsrsCard>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_grade_mapping() {
        assert_eq!(Grade::from_client(0), Some(Grade::Again));
        assert_eq!(Grade::from_client(3), Some(Grade::Easy));
        assert_eq!(Grade::from_client(4), None);
        assert_eq!(Grade::from_client(-1), None);
        assert_eq!(Grade::Good.value(), 3);
        assert_eq!(Grade::Hard.index(), 1);
    }

    #[test]
    fn test_grade_serde() {
        assert_eq!(serde_json::to_string(&Grade::Easy).unwrap(), "4");
        let grade: Grade = serde_json::from_str("2").unwrap();
        assert_eq!(grade, Grade::Hard);
        assert!(serde_json::from_str::<Grade>("7").is_err());
    }

    #[test]
    fn test_content_type_parsing() {
        assert_eq!(
            "error_notebook".parse::<ReviewContentType>().unwrap(),
            ReviewContentType::ErrorNotebook
        );
    }
}
