//! Review session model
//!
//! A session pins the list of items a user works through for one content
//! type on one day, so a reload resumes where they stopped.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::ReviewContentType;

string_enum! {
    pub enum ReviewSessionStatus {
        Active => "active",
        Completed => "completed",
    }
    default = Active;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewSession {
    pub id: i64,
    pub user_id: i64,
    pub content_type: ReviewContentType,
    pub review_ids: Vec<i64>,
    pub session_date: NaiveDate,
    pub status: ReviewSessionStatus,
    pub current_index: i32,
    pub total_items: i32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReviewSessionInput {
    pub content_type: ReviewContentType,
    #[serde(default)]
    pub review_ids: Vec<i64>,
    /// Defaults to today (UTC)
    pub date: Option<NaiveDate>,
}
