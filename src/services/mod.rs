//! Services layer - Business logic
//!
//! Services enforce business rules and permissions, coordinate the
//! repositories and the cache, and translate failures into typed errors
//! that the API layer maps to HTTP responses.

pub mod category;
pub mod comment;
pub mod content;
pub mod deck;
pub mod error_notebook;
pub mod flashcard;
pub mod fsrs;
pub mod markdown;
pub mod mentorship;
pub mod password;
pub mod planner;
pub mod question;
pub mod rate_limiter;
pub mod review_session;
pub mod simulated_exam;
pub mod unified_review;
pub mod user;

pub use category::{generate_slug, CategoryService, CategoryServiceError};
pub use comment::{CommentService, CommentServiceError};
pub use content::{ContentService, ContentServiceError};
pub use deck::{DeckService, DeckServiceError};
pub use error_notebook::{ErrorNotebookError, ErrorNotebookService};
pub use flashcard::FlashcardService;
pub use fsrs::{FsrsParameters, FsrsScheduler};
pub use markdown::MarkdownRenderer;
pub use mentorship::{MentorshipService, MentorshipServiceError};
pub use password::{hash_password, verify_password};
pub use planner::{PlannerService, PlannerServiceError};
pub use question::{QuestionService, QuestionServiceError};
pub use rate_limiter::LoginRateLimiter;
pub use review_session::{ReviewSessionError, ReviewSessionService};
pub use simulated_exam::{ExamServiceError, SimulatedExamService};
pub use unified_review::{UnifiedReviewError, UnifiedReviewService};
pub use user::{LoginInput, RegisterInput, UserService, UserServiceError};
