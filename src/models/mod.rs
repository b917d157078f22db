//! Data models
//!
//! Database entities, their input types and the read models returned by
//! the services. Enumerations are stored as their canonical strings.

/// Declares a string-backed enum.
///
/// Generates `as_str`, `ALL`, `Display`, case-insensitive `FromStr` and
/// serde impls that read and write the canonical string.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $value:literal ),+ $(,)?
        }
        default = $default:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl $name {
            /// Every variant, in declaration order
            pub const ALL: &'static [$name] = &[$( $name::$variant ),+];

            /// Canonical string stored in the database and sent over the wire
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $value ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                $(
                    if s.eq_ignore_ascii_case($value) {
                        return Ok($name::$variant);
                    }
                )+
                Err(anyhow::anyhow!("Invalid {}: {}", stringify!($name), s))
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

mod category;
mod comment;
mod content;
mod deck;
mod error_notebook;
mod mentorship;
mod planner;
mod question;
mod review;
mod review_session;
mod session;
mod simulated_exam;
mod user;

pub use category::{Category, CategoryTree, CreateCategoryInput, UpdateCategoryInput};
pub use comment::{Comment, CommentStatus, CommentWithMeta, CreateCommentInput, LikeStatus, LikeTargetType};
pub use content::{
    Content, ContentFilter, ContentStatus, CreateContentInput, ListParams, PagedResult, UpdateContentInput,
};
pub use deck::{
    CreateDeckInput, CreateFlashcardInput, Deck, DeckStats, DeckStatus, Flashcard, FlashcardStatus,
    UpdateDeckInput, UpdateFlashcardInput,
};
pub use error_notebook::{
    CreateErrorNotebookInput, ErrorNotebookEntry, ErrorNotebookFilter, ErrorNotebookPage, ErrorNotebookStats,
    UpdateErrorNotebookInput,
};
pub use mentorship::{
    CreateMentorshipInput, MeetingFrequency, MentorProfile, Mentorship, MentorshipFilter, MentorshipStatus,
    MentorshipSummary, UpsertMentorProfileInput,
};
pub use planner::{
    CreatePlannerTaskInput, PlannerTask, TaskPriority, TaskSource, TaskStatus, TaskType, UpdatePlannerTaskInput,
};
pub use question::{Alternative, CreateQuestionInput, Difficulty, Question, QuestionFilter, UpdateQuestionInput};
pub use review::{
    CardState, DueCursor, DuePage, DueQuery, FsrsCard, Grade, NewReviewItem, ReviewContentType, ReviewHistoryEntry, ReviewLog,
};
pub use review_session::{CreateReviewSessionInput, ReviewSession, ReviewSessionStatus};
pub use session::Session;
pub use simulated_exam::{
    CreateExamInput, ExamAnswer, ExamFilter, ExamQuestion, ExamQuestionInput, ExamResult, ExamStatus,
    ResultStatus, SimulatedExam, UpdateExamInput, UserExamStats,
};
pub use user::{CreateUserInput, User, UserRole, UserStatus};

/// Decode a JSON string column into a list, treating bad data as empty
pub(crate) fn parse_string_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

/// Encode a list for a JSON string column
pub(crate) fn encode_string_list(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

/// Distinguishes an explicit `null` (clear the field) from a missing key
/// (leave it untouched) on `Option<Option<T>>` update fields.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    <Option<T> as serde::Deserialize>::deserialize(deserializer).map(Some)
}

/// Trim every entry and drop the empty ones
pub(crate) fn normalize_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_enum_roundtrip() {
        for status in ContentStatus::ALL {
            let parsed: ContentStatus = status.as_str().parse().unwrap();
            assert_eq!(&parsed, status);
        }
        assert_eq!("published".parse::<ContentStatus>().unwrap(), ContentStatus::Published);
        assert!("unknown".parse::<ContentStatus>().is_err());
    }

    #[test]
    fn test_string_enum_serde_is_case_insensitive() {
        let status: ContentStatus = serde_json::from_str("\"archived\"").unwrap();
        assert_eq!(status, ContentStatus::Archived);
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"ARCHIVED\"");
    }

    #[test]
    fn test_double_option_distinguishes_null_from_missing() {
        let cleared: UpdateContentInput = serde_json::from_str(r#"{"summary": null}"#).unwrap();
        assert_eq!(cleared.summary, Some(None));

        let untouched: UpdateContentInput = serde_json::from_str("{}").unwrap();
        assert_eq!(untouched.summary, None);
    }

    #[test]
    fn test_string_list_helpers() {
        let list = normalize_list(vec![" cardio ".into(), "".into(), "neuro".into()]);
        assert_eq!(list, vec!["cardio", "neuro"]);
        assert_eq!(parse_string_list(&encode_string_list(&list)), list);
        assert!(parse_string_list("not json").is_empty());
    }
}
