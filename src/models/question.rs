//! Question bank model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

string_enum! {
    /// Difficulty scale shared by questions, exams and error notes
    pub enum Difficulty {
        Easy => "EASY",
        Medium => "MEDIUM",
        Hard => "HARD",
        VeryHard => "VERY_HARD",
    }
    default = Medium;
}

/// One answer option of a multiple-choice question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    /// Short label such as "A"
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub statement: String,
    pub alternatives: Vec<Alternative>,
    pub correct_alternative_id: String,
    pub explanation: Option<String>,
    pub subject: Option<String>,
    pub difficulty: Difficulty,
    pub tags: Vec<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Question {
    pub fn correct_alternative(&self) -> Option<&Alternative> {
        self.alternatives
            .iter()
            .find(|a| a.id == self.correct_alternative_id)
    }

    /// "A) text" for the correct option, or the bare id if it is missing
    pub fn correct_answer_text(&self) -> String {
        match self.correct_alternative() {
            Some(alt) => format!("{}) {}", alt.id, alt.text),
            None => self.correct_alternative_id.clone(),
        }
    }

    pub fn is_correct(&self, answer: &str) -> bool {
        answer.trim().eq_ignore_ascii_case(&self.correct_alternative_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateQuestionInput {
    pub statement: String,
    pub alternatives: Vec<Alternative>,
    pub correct_alternative_id: String,
    pub explanation: Option<String>,
    pub subject: Option<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateQuestionInput {
    pub statement: Option<String>,
    pub alternatives: Option<Vec<Alternative>>,
    pub correct_alternative_id: Option<String>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub explanation: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub subject: Option<Option<String>>,
    pub difficulty: Option<Difficulty>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionFilter {
    pub subject: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub tag: Option<String>,
    pub query: Option<String>,
}
