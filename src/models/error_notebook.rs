//! Error notebook ("caderno de erros") model
//!
//! An entry records a question the student got wrong together with their
//! own note on why, and is scheduled for review like any other item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Difficulty;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorNotebookEntry {
    pub id: i64,
    pub user_id: i64,
    pub question_id: i64,
    /// Copied from the question when the entry is created
    pub question_statement: String,
    pub correct_answer: Option<String>,
    pub subject: Option<String>,
    pub user_note: String,
    pub user_explanation: String,
    pub key_points: Vec<String>,
    pub tags: Vec<String>,
    pub difficulty: Difficulty,
    /// Self-assessed, 1..=5
    pub confidence: i32,
    pub is_in_review_system: bool,
    pub review_count: i64,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateErrorNotebookInput {
    pub question_id: i64,
    pub user_note: String,
    pub user_explanation: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub difficulty: Option<Difficulty>,
    pub confidence: Option<i32>,
}

impl CreateErrorNotebookInput {
    pub fn new(question_id: i64, user_note: impl Into<String>, user_explanation: impl Into<String>) -> Self {
        Self {
            question_id,
            user_note: user_note.into(),
            user_explanation: user_explanation.into(),
            key_points: Vec::new(),
            tags: Vec::new(),
            difficulty: None,
            confidence: None,
        }
    }

    pub fn with_key_points(mut self, key_points: Vec<String>) -> Self {
        self.key_points = key_points;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_confidence(mut self, confidence: i32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateErrorNotebookInput {
    pub user_note: Option<String>,
    pub user_explanation: Option<String>,
    pub key_points: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub difficulty: Option<Difficulty>,
    pub confidence: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorNotebookFilter {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default = "default_page")]
    pub page: u32,
    pub difficulty: Option<Difficulty>,
    pub is_in_review_system: Option<bool>,
    /// Entries carrying any of these tags
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Default for ErrorNotebookFilter {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            page: default_page(),
            difficulty: None,
            is_in_review_system: None,
            tags: Vec::new(),
        }
    }
}

fn default_limit() -> u32 {
    20
}

fn default_page() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorNotebookPage {
    pub entries: Vec<ErrorNotebookEntry>,
    pub total: i64,
    pub has_more: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorNotebookStats {
    pub total: i64,
    pub in_review_system: i64,
    pub by_difficulty: BTreeMap<String, i64>,
    pub by_subject: BTreeMap<String, i64>,
    pub average_confidence: f64,
    pub last_entry_at: Option<DateTime<Utc>>,
}
