//! API middleware
//!
//! Contains middleware for:
//! - Authentication (session token validation)
//! - Authorization (admin-only routes)
//! - Request statistics

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::Cache;
use crate::config::Config;
use crate::db::repositories::{
    SqlxCategoryRepository, SqlxCommentRepository, SqlxContentRepository, SqlxDeckRepository,
    SqlxErrorNotebookRepository, SqlxFlashcardRepository, SqlxMentorshipRepository, SqlxPlannerRepository,
    SqlxQuestionRepository, SqlxReviewRepository, SqlxReviewSessionRepository, SqlxSessionRepository,
    SqlxSimulatedExamRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{
    CategoryService, CommentService, ContentService, DeckService, ErrorNotebookService, FlashcardService,
    FsrsParameters, FsrsScheduler, LoginRateLimiter, MarkdownRenderer, MentorshipService, PlannerService,
    QuestionService, ReviewSessionService, SimulatedExamService, UnifiedReviewService, UserService,
};

// ============================================================================
// Request Statistics
// ============================================================================

/// Lightweight request statistics using atomic operations (no locks)
pub struct RequestStats {
    total_requests: AtomicU64,
    /// Sum of response times in microseconds
    total_response_time_us: AtomicU64,
    start_time: Instant,
}

impl RequestStats {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a request with its response time
    pub fn record(&self, duration_us: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us.fetch_add(duration_us, Ordering::Relaxed);
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Average response time in microseconds
    pub fn avg_response_time_us(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        let total_time = self.total_response_time_us.load(Ordering::Relaxed);
        total_time as f64 / total as f64
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Application State
// ============================================================================

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub category_service: Arc<CategoryService>,
    pub content_service: Arc<ContentService>,
    pub comment_service: Arc<CommentService>,
    pub deck_service: Arc<DeckService>,
    pub flashcard_service: Arc<FlashcardService>,
    pub question_service: Arc<QuestionService>,
    pub review_service: Arc<UnifiedReviewService>,
    pub error_notebook_service: Arc<ErrorNotebookService>,
    pub exam_service: Arc<SimulatedExamService>,
    pub mentorship_service: Arc<MentorshipService>,
    pub planner_service: Arc<PlannerService>,
    pub review_session_service: Arc<ReviewSessionService>,
    pub rate_limiter: Arc<LoginRateLimiter>,
    pub request_stats: Arc<RequestStats>,
    pub pool: DynDatabasePool,
}

impl AppState {
    /// Wire every repository and service on top of one pool and cache
    pub fn new(pool: DynDatabasePool, cache: Arc<Cache>, config: &Config) -> Self {
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let category_repo = SqlxCategoryRepository::boxed(pool.clone());
        let content_repo = SqlxContentRepository::boxed(pool.clone());
        let comment_repo = SqlxCommentRepository::boxed(pool.clone());
        let deck_repo = SqlxDeckRepository::boxed(pool.clone());
        let question_repo = SqlxQuestionRepository::boxed(pool.clone());
        let cache_ttl = Duration::from_secs(config.cache.ttl_seconds);

        let user_service = UserService::with_session_days(
            user_repo.clone(),
            SqlxSessionRepository::boxed(pool.clone()),
            config.auth.session_days,
        );

        let scheduler = FsrsScheduler::new(FsrsParameters::from_config(&config.review));
        let review_service = Arc::new(
            UnifiedReviewService::new(
                SqlxReviewRepository::boxed(pool.clone()),
                deck_repo.clone(),
                cache.clone(),
                scheduler,
            )
            .with_summary_ttl(Duration::from_secs(config.cache.summary_ttl_seconds)),
        );

        Self {
            user_service: Arc::new(user_service),
            category_service: Arc::new(
                CategoryService::new(category_repo.clone(), cache.clone()).with_cache_ttl(cache_ttl),
            ),
            content_service: Arc::new(
                ContentService::new(
                    content_repo.clone(),
                    category_repo,
                    comment_repo.clone(),
                    MarkdownRenderer::new(),
                    cache.clone(),
                )
                .with_cache_ttl(cache_ttl),
            ),
            comment_service: Arc::new(CommentService::new(comment_repo, content_repo, cache.clone())),
            deck_service: Arc::new(DeckService::new(
                deck_repo.clone(),
                SqlxFlashcardRepository::boxed(pool.clone()),
                review_service.clone(),
                cache.clone(),
                cache_ttl,
            )),
            flashcard_service: Arc::new(FlashcardService::new(
                SqlxFlashcardRepository::boxed(pool.clone()),
                deck_repo,
                review_service.clone(),
                cache,
            )),
            question_service: Arc::new(QuestionService::new(question_repo.clone(), review_service.clone())),
            error_notebook_service: Arc::new(ErrorNotebookService::new(
                SqlxErrorNotebookRepository::boxed(pool.clone()),
                question_repo.clone(),
                review_service.clone(),
            )),
            exam_service: Arc::new(SimulatedExamService::new(
                SqlxSimulatedExamRepository::boxed(pool.clone()),
                question_repo,
            )),
            mentorship_service: Arc::new(MentorshipService::new(
                SqlxMentorshipRepository::boxed(pool.clone()),
                user_repo,
            )),
            planner_service: Arc::new(PlannerService::new(
                SqlxPlannerRepository::boxed(pool.clone()),
                review_service.clone(),
            )),
            review_session_service: Arc::new(ReviewSessionService::new(SqlxReviewSessionRepository::boxed(
                pool.clone(),
            ))),
            review_service,
            rate_limiter: Arc::new(LoginRateLimiter::new()),
            request_stats: Arc::new(RequestStats::new()),
            pool,
        }
    }
}

// ============================================================================
// Extractors
// ============================================================================

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Signed-in user when the request carried a valid session
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<User>);

impl OptionalUser {
    pub fn as_ref(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

impl<S> FromRequestParts<S> for OptionalUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalUser(
            parts.extensions.get::<AuthenticatedUser>().map(|u| u.0.clone()),
        ))
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(code: impl Into<String>, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn rate_limited(message: impl Into<String>, retry_after_secs: u64) -> Self {
        Self::with_details(
            "RATE_LIMIT",
            message,
            serde_json::json!({ "retry_after": retry_after_secs }),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    /// Log the cause and hide it from the client
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {}", cause);
        Self::internal_error("Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMIT" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Session token from the `Authorization: Bearer` header or the `session` cookie
pub(crate) fn extract_session_token<B>(request: &axum::http::Request<B>) -> Option<String> {
    token_from_headers(request.headers())
}

pub(crate) fn token_from_headers(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                if let Some(token) = cookie.trim().strip_prefix("session=") {
                    if !token.is_empty() {
                        return Some(token.to_string());
                    }
                }
            }
        }
    }

    None
}

/// Authentication middleware
pub async fn require_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response, ApiError> {
    let token = extract_session_token(&request).ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state
        .user_service
        .validate_session(&token)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Attach the user when a valid session is present, never reject
pub async fn optional_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    if let Some(token) = extract_session_token(&request) {
        match state.user_service.validate_session(&token).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(AuthenticatedUser(user));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Session lookup failed: {}", e),
        }
    }
    next.run(request).await
}

/// Admin authorization middleware; runs after `require_auth`
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_admin() {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}

/// Records request count and response time
pub async fn request_stats_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;
    state.request_stats.record(start.elapsed().as_micros() as u64);
    response
}


#[cfg(test)]
mod property_tests {
    use crate::models::{User, UserRole};
    use proptest::prelude::*;

    fn user(id: i64, role: UserRole) -> User {
        let mut user = User::new("u".to_string(), "u@med.br".to_string(), "hash".to_string(), role);
        user.id = id;
        user
    }

    fn role_strategy() -> impl Strategy<Value = UserRole> {
        prop_oneof![Just(UserRole::Admin), Just(UserRole::Mentor), Just(UserRole::Student)]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn only_admins_pass_admin_check(role in role_strategy()) {
            prop_assert_eq!(user(1, role).is_admin(), role == UserRole::Admin);
        }

        #[test]
        fn mentors_include_admins(role in role_strategy()) {
            prop_assert_eq!(user(1, role).is_mentor(), role != UserRole::Student);
        }

        #[test]
        fn owners_and_admins_manage(user_id in 1i64..100, owner_id in 1i64..100, role in role_strategy()) {
            let expected = role == UserRole::Admin || user_id == owner_id;
            prop_assert_eq!(user(user_id, role).can_manage(owner_id), expected);
        }
    }
}
