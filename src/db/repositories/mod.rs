//! Database repositories
//!
//! One repository per aggregate. Each exposes an async trait and a
//! `Sqlx*Repository` implementation that dispatches on the configured
//! backend. Query bodies are shared between SQLite and MySQL through
//! [`on_pool!`]; rows are decoded through [`DbRow`].

/// Run a block against the concrete pool of the active backend.
///
/// The block is expanded once per driver, with `$conn` bound to the
/// `SqlitePool`/`MySqlPool` and `$db` aliased to the matching
/// `sqlx::Database` type.
macro_rules! on_pool {
    ($pool:expr, |$conn:ident, $db:ident| $body:block) => {{
        match $pool.driver() {
            $crate::config::DatabaseDriver::Sqlite => {
                #[allow(dead_code)]
                type $db = sqlx::Sqlite;
                let $conn = $pool
                    .as_sqlite()
                    .ok_or_else(|| anyhow::anyhow!("SQLite pool not available"))?;
                $body
            }
            $crate::config::DatabaseDriver::Mysql => {
                #[allow(dead_code)]
                type $db = sqlx::MySql;
                let $conn = $pool
                    .as_mysql()
                    .ok_or_else(|| anyhow::anyhow!("MySQL pool not available"))?;
                $body
            }
        }
    }};
}

/// Bind a slice of [`SqlArg`] values onto a query, in order
macro_rules! bind_args {
    ($query:expr, $args:expr) => {{
        let mut query = $query;
        for arg in $args.iter() {
            query = match arg {
                $crate::db::repositories::SqlArg::Int(v) => query.bind(*v),
                $crate::db::repositories::SqlArg::Float(v) => query.bind(*v),
                $crate::db::repositories::SqlArg::Bool(v) => query.bind(*v),
                $crate::db::repositories::SqlArg::Text(v) => query.bind(v.clone()),
                $crate::db::repositories::SqlArg::Time(v) => query.bind(*v),
            };
        }
        query
    }};
}

mod row;

pub mod category;
pub mod comment;
pub mod content;
pub mod deck;
pub mod error_notebook;
pub mod flashcard;
pub mod mentorship;
pub mod planner;
pub mod question;
pub mod review;
pub mod review_session;
pub mod session;
pub mod simulated_exam;
pub mod user;

pub(crate) use row::{contains_pattern, tag_pattern, Conditions, DbRow, InsertId, SqlArg};

pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use content::{ContentRepository, SqlxContentRepository};
pub use deck::{DeckRepository, SqlxDeckRepository};
pub use error_notebook::{ErrorNotebookRepository, SqlxErrorNotebookRepository};
pub use flashcard::{FlashcardRepository, SqlxFlashcardRepository};
pub use mentorship::{MentorshipRepository, SqlxMentorshipRepository};
pub use planner::{PlannerRepository, SqlxPlannerRepository};
pub use question::{QuestionRepository, SqlxQuestionRepository};
pub use review::{ReviewRepository, SqlxReviewRepository};
pub use review_session::{ReviewSessionRepository, SqlxReviewSessionRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use simulated_exam::{SimulatedExamRepository, SqlxSimulatedExamRepository};
pub use user::{SqlxUserRepository, UserRepository};

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixtures shared by the repository and service tests

    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use chrono::Utc;

    /// Fresh in-memory database with the full schema applied
    pub async fn migrated_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool
    }

    /// Insert a bare user row and return its id
    pub async fn insert_user(pool: &DynDatabasePool, username: &str) -> i64 {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, email, password_hash, role, status, created_at, updated_at)
            VALUES (?, ?, 'hash', 'STUDENT', 'ACTIVE', ?, ?)
            "#,
        )
        .bind(username)
        .bind(format!("{}@example.com", username))
        .bind(now)
        .bind(now)
        .execute(pool.as_sqlite().unwrap())
        .await
        .expect("Failed to insert test user");
        result.last_insert_rowid()
    }
}
