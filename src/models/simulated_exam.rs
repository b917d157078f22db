//! Simulated exam ("simulado") model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Difficulty;

string_enum! {
    pub enum ExamStatus {
        Draft => "DRAFT",
        Published => "PUBLISHED",
        Archived => "ARCHIVED",
    }
    default = Draft;
}

string_enum! {
    /// Attempt state; stored lower-case
    pub enum ResultStatus {
        InProgress => "in_progress",
        Completed => "completed",
    }
    default = InProgress;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedExam {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub time_limit_minutes: Option<i32>,
    pub difficulty: Option<Difficulty>,
    pub tags: Vec<String>,
    pub status: ExamStatus,
    pub is_public: bool,
    pub randomize_questions: bool,
    pub total_questions: i32,
    pub total_points: f64,
    pub created_by: i64,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Loaded on detail reads only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<ExamQuestion>,
}

/// A question's slot in an exam
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamQuestion {
    pub question_id: i64,
    pub points: f64,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamQuestionInput {
    pub question_id: i64,
    #[serde(default = "default_points")]
    pub points: f64,
}

fn default_points() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateExamInput {
    pub title: String,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub time_limit_minutes: Option<i32>,
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: Option<ExamStatus>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default = "default_randomize")]
    pub randomize_questions: bool,
    pub questions: Vec<ExamQuestionInput>,
}

fn default_randomize() -> bool {
    true
}

impl CreateExamInput {
    pub fn new(title: impl Into<String>, questions: Vec<ExamQuestionInput>) -> Self {
        Self {
            title: title.into(),
            description: None,
            instructions: None,
            time_limit_minutes: None,
            difficulty: None,
            tags: Vec::new(),
            status: None,
            is_public: false,
            randomize_questions: true,
            questions,
        }
    }

    pub fn with_status(mut self, status: ExamStatus) -> Self {
        self.status = Some(status);
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateExamInput {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub instructions: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub time_limit_minutes: Option<Option<i32>>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub difficulty: Option<Option<Difficulty>>,
    pub tags: Option<Vec<String>>,
    pub status: Option<ExamStatus>,
    pub is_public: Option<bool>,
    pub randomize_questions: Option<bool>,
    pub questions: Option<Vec<ExamQuestionInput>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExamFilter {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default = "default_page")]
    pub page: u32,
    pub status: Option<ExamStatus>,
    pub difficulty: Option<Difficulty>,
    pub created_by: Option<i64>,
    pub is_public: Option<bool>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub query: Option<String>,
}

impl Default for ExamFilter {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            page: default_page(),
            status: None,
            difficulty: None,
            created_by: None,
            is_public: None,
            tags: Vec::new(),
            query: None,
        }
    }
}

fn default_limit() -> u32 {
    20
}

fn default_page() -> u32 {
    1
}

/// One attempt at an exam
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamResult {
    pub id: i64,
    pub exam_id: i64,
    pub user_id: i64,
    pub status: ResultStatus,
    pub score: f64,
    pub total_points: f64,
    pub correct_count: i32,
    pub total_questions: i32,
    pub percentage: i32,
    pub time_spent_seconds: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub answers: Vec<ExamAnswer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamAnswer {
    pub id: i64,
    pub result_id: i64,
    pub question_id: i64,
    pub answer: String,
    pub is_correct: bool,
    pub points_awarded: f64,
    pub answered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserExamStats {
    pub exams_taken: i64,
    pub exams_completed: i64,
    pub average_percentage: f64,
    pub best_percentage: i32,
    pub total_time_spent_seconds: i64,
}
