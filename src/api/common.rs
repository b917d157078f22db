//! Common API utilities and shared types
//!
//! Pagination defaults, query helpers and the conversions from service
//! errors into [`ApiError`].

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::api::middleware::ApiError;
use crate::models::ListParams;
use crate::services::{
    CategoryServiceError, CommentServiceError, ContentServiceError, DeckServiceError, ErrorNotebookError,
    ExamServiceError, MentorshipServiceError, PlannerServiceError, QuestionServiceError, ReviewSessionError,
    UnifiedReviewError, UserServiceError,
};

// ============================================================================
// Pagination
// ============================================================================

pub fn default_page() -> u32 {
    1
}

pub fn default_page_size() -> u32 {
    10
}

pub fn default_per_page() -> u32 {
    20
}

/// Basic pagination query parameters
#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl PaginationQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.page_size)
    }
}

/// Admin pagination query parameters
#[derive(Debug, Deserialize)]
pub struct AdminPaginationQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// `start` / `end` bounds of a calendar view
#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Comma-separated query value as a list; blanks dropped
pub fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

// ============================================================================
// Service error conversions
// ============================================================================

/// Map the listed variants to an `ApiError` constructor; anything else is
/// an internal error.
macro_rules! api_error_from {
    ($error:ident { $($variant:ident => $ctor:ident),* $(,)? }) => {
        impl From<$error> for ApiError {
            fn from(err: $error) -> Self {
                match err {
                    $( $error::$variant { .. } => ApiError::$ctor(err.to_string()), )*
                    #[allow(unreachable_patterns)]
                    _ => ApiError::internal(&err),
                }
            }
        }
    };
}

api_error_from!(UserServiceError {
    AuthenticationError => unauthorized,
    Forbidden => forbidden,
    ValidationError => validation_error,
    UserExists => conflict,
    NotFound => not_found,
});

api_error_from!(CategoryServiceError {
    DuplicateSlug => conflict,
    NotFound => not_found,
    ParentNotFound => validation_error,
    HasChildren => conflict,
    CircularReference => validation_error,
    ValidationError => validation_error,
});

api_error_from!(ContentServiceError {
    NotFound => not_found,
    Forbidden => forbidden,
    ValidationError => validation_error,
});

api_error_from!(CommentServiceError {
    NotFound => not_found,
    Forbidden => forbidden,
    ValidationError => validation_error,
});

api_error_from!(DeckServiceError {
    NotFound => not_found,
    Forbidden => forbidden,
    ValidationError => validation_error,
});

api_error_from!(QuestionServiceError {
    NotFound => not_found,
    Forbidden => forbidden,
    ValidationError => validation_error,
});

api_error_from!(UnifiedReviewError {
    NotFound => not_found,
    ValidationError => validation_error,
});

api_error_from!(ErrorNotebookError {
    NotFound => not_found,
    Forbidden => forbidden,
    ValidationError => validation_error,
});

api_error_from!(ExamServiceError {
    NotFound => not_found,
    Forbidden => forbidden,
    ValidationError => validation_error,
});

api_error_from!(MentorshipServiceError {
    NotFound => not_found,
    Forbidden => forbidden,
    ValidationError => validation_error,
    Conflict => conflict,
});

api_error_from!(PlannerServiceError {
    NotFound => not_found,
    Forbidden => forbidden,
    ValidationError => validation_error,
});

api_error_from!(ReviewSessionError {
    NotFound => not_found,
    Forbidden => forbidden,
    ValidationError => validation_error,
});

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(Some("cardio, pneumo,,")), vec!["cardio", "pneumo"]);
        assert!(split_list(Some(" ")).is_empty());
        assert!(split_list(None).is_empty());
    }

    #[test]
    fn test_service_error_mapping() {
        let err: ApiError = CategoryServiceError::HasChildren(3).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: ApiError = UserServiceError::UserExists("ana".into()).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: ApiError = DeckServiceError::NotFound("deck 9".into()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert!(err.error.message.contains("deck 9"));

        let err: ApiError = UnifiedReviewError::ValidationError("grade".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: ApiError = PlannerServiceError::InternalError(anyhow::anyhow!("disk")).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.error.message.contains("disk"));
    }
}
