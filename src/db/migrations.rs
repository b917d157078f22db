//! Database migrations
//!
//! Migrations are embedded as SQL strings, one variant per backend, and
//! tracked in a `_migrations` table so every version is applied once.
//!
//! ```ignore
//! use medstudy::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (unique, ascending)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

impl Migration {
    /// SQL for the given backend
    pub fn sql_for(&self, driver: DatabaseDriver) -> &'static str {
        match driver {
            DatabaseDriver::Sqlite => self.up_sqlite,
            DatabaseDriver::Mysql => self.up_mysql,
        }
    }
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// All schema migrations, in application order
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users_and_sessions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username VARCHAR(50) NOT NULL UNIQUE,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                display_name VARCHAR(100),
                role VARCHAR(20) NOT NULL DEFAULT 'STUDENT',
                status VARCHAR(20) NOT NULL DEFAULT 'ACTIVE',
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id INTEGER NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                username VARCHAR(50) NOT NULL UNIQUE,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                display_name VARCHAR(100),
                role VARCHAR(20) NOT NULL DEFAULT 'STUDENT',
                status VARCHAR(20) NOT NULL DEFAULT 'ACTIVE',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id BIGINT NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX idx_sessions_expires_at ON sessions(expires_at);
        "#,
    },
    Migration {
        version: 2,
        name: "create_categories_and_contents",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                slug VARCHAR(100) NOT NULL UNIQUE,
                name VARCHAR(100) NOT NULL,
                description TEXT,
                parent_id INTEGER,
                sort_order INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL,
                FOREIGN KEY (parent_id) REFERENCES categories(id) ON DELETE SET NULL
            );
            CREATE INDEX IF NOT EXISTS idx_categories_parent_id ON categories(parent_id);
            CREATE TABLE IF NOT EXISTS contents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                slug VARCHAR(200) NOT NULL UNIQUE,
                title VARCHAR(200) NOT NULL,
                body TEXT NOT NULL,
                body_html TEXT NOT NULL,
                summary TEXT,
                category_id INTEGER,
                tags TEXT NOT NULL DEFAULT '[]',
                author_id INTEGER NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'DRAFT',
                published_at TIMESTAMP,
                view_count INTEGER NOT NULL DEFAULT 0,
                like_count INTEGER NOT NULL DEFAULT 0,
                comment_count INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE SET NULL,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_contents_status ON contents(status);
            CREATE INDEX IF NOT EXISTS idx_contents_category_id ON contents(category_id);
            CREATE INDEX IF NOT EXISTS idx_contents_author_id ON contents(author_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS categories (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                slug VARCHAR(100) NOT NULL UNIQUE,
                name VARCHAR(100) NOT NULL,
                description TEXT,
                parent_id BIGINT,
                sort_order INT NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (parent_id) REFERENCES categories(id) ON DELETE SET NULL
            );
            CREATE INDEX idx_categories_parent_id ON categories(parent_id);
            CREATE TABLE IF NOT EXISTS contents (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                slug VARCHAR(200) NOT NULL UNIQUE,
                title VARCHAR(200) NOT NULL,
                body LONGTEXT NOT NULL,
                body_html LONGTEXT NOT NULL,
                summary TEXT,
                category_id BIGINT,
                tags TEXT NOT NULL,
                author_id BIGINT NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'DRAFT',
                published_at TIMESTAMP NULL,
                view_count BIGINT NOT NULL DEFAULT 0,
                like_count BIGINT NOT NULL DEFAULT 0,
                comment_count BIGINT NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE SET NULL,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_contents_status ON contents(status);
            CREATE INDEX idx_contents_category_id ON contents(category_id);
            CREATE INDEX idx_contents_author_id ON contents(author_id);
        "#,
    },
    Migration {
        version: 3,
        name: "create_comments_and_likes",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                parent_id INTEGER,
                body TEXT NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'APPROVED',
                like_count INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL,
                FOREIGN KEY (content_id) REFERENCES contents(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (parent_id) REFERENCES comments(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_comments_content_id ON comments(content_id);
            CREATE TABLE IF NOT EXISTS likes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                target_type VARCHAR(20) NOT NULL,
                target_id INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL,
                UNIQUE (user_id, target_type, target_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_likes_target ON likes(target_type, target_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS comments (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                content_id BIGINT NOT NULL,
                user_id BIGINT NOT NULL,
                parent_id BIGINT,
                body TEXT NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'APPROVED',
                like_count BIGINT NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (content_id) REFERENCES contents(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (parent_id) REFERENCES comments(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_comments_content_id ON comments(content_id);
            CREATE TABLE IF NOT EXISTS likes (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                user_id BIGINT NOT NULL,
                target_type VARCHAR(20) NOT NULL,
                target_id BIGINT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE KEY uq_likes_user_target (user_id, target_type, target_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_likes_target ON likes(target_type, target_id);
        "#,
    },
    Migration {
        version: 4,
        name: "create_questions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS questions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                statement TEXT NOT NULL,
                alternatives TEXT NOT NULL DEFAULT '[]',
                correct_alternative_id VARCHAR(20) NOT NULL,
                explanation TEXT,
                subject VARCHAR(100),
                difficulty VARCHAR(20) NOT NULL DEFAULT 'MEDIUM',
                tags TEXT NOT NULL DEFAULT '[]',
                created_by INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (created_by) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_questions_subject ON questions(subject);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS questions (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                statement TEXT NOT NULL,
                alternatives TEXT NOT NULL,
                correct_alternative_id VARCHAR(20) NOT NULL,
                explanation TEXT,
                subject VARCHAR(100),
                difficulty VARCHAR(20) NOT NULL DEFAULT 'MEDIUM',
                tags TEXT NOT NULL,
                created_by BIGINT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                FOREIGN KEY (created_by) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_questions_subject ON questions(subject);
        "#,
    },
    Migration {
        version: 5,
        name: "create_decks_and_flashcards",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS decks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name VARCHAR(200) NOT NULL,
                description TEXT,
                is_public BOOLEAN NOT NULL DEFAULT 0,
                tags TEXT NOT NULL DEFAULT '[]',
                cover_image_url VARCHAR(500),
                status VARCHAR(20) NOT NULL DEFAULT 'ACTIVE',
                flashcard_count INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_decks_user_id ON decks(user_id);
            CREATE TABLE IF NOT EXISTS deck_favorites (
                user_id INTEGER NOT NULL,
                deck_id INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL,
                PRIMARY KEY (user_id, deck_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (deck_id) REFERENCES decks(id) ON DELETE CASCADE
            );
            CREATE TABLE IF NOT EXISTS flashcards (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                deck_id INTEGER NOT NULL,
                front_content TEXT NOT NULL,
                back_content TEXT NOT NULL,
                personal_notes TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                status VARCHAR(20) NOT NULL DEFAULT 'LEARNING',
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (deck_id) REFERENCES decks(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_flashcards_deck_id ON flashcards(deck_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS decks (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                user_id BIGINT NOT NULL,
                name VARCHAR(200) NOT NULL,
                description TEXT,
                is_public BOOLEAN NOT NULL DEFAULT FALSE,
                tags TEXT NOT NULL,
                cover_image_url VARCHAR(500),
                status VARCHAR(20) NOT NULL DEFAULT 'ACTIVE',
                flashcard_count BIGINT NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_decks_user_id ON decks(user_id);
            CREATE TABLE IF NOT EXISTS deck_favorites (
                user_id BIGINT NOT NULL,
                deck_id BIGINT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (user_id, deck_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (deck_id) REFERENCES decks(id) ON DELETE CASCADE
            );
            CREATE TABLE IF NOT EXISTS flashcards (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                user_id BIGINT NOT NULL,
                deck_id BIGINT NOT NULL,
                front_content TEXT NOT NULL,
                back_content TEXT NOT NULL,
                personal_notes TEXT,
                tags TEXT NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'LEARNING',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (deck_id) REFERENCES decks(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_flashcards_deck_id ON flashcards(deck_id);
        "#,
    },
    Migration {
        version: 6,
        name: "create_fsrs_tables",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS fsrs_cards (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                content_type VARCHAR(20) NOT NULL,
                content_id INTEGER NOT NULL,
                deck_id INTEGER,
                subject VARCHAR(100),
                due TIMESTAMP NOT NULL,
                stability REAL NOT NULL,
                difficulty REAL NOT NULL,
                elapsed_days INTEGER NOT NULL DEFAULT 0,
                scheduled_days INTEGER NOT NULL DEFAULT 0,
                reps INTEGER NOT NULL DEFAULT 0,
                lapses INTEGER NOT NULL DEFAULT 0,
                state VARCHAR(20) NOT NULL DEFAULT 'NEW',
                last_review TIMESTAMP,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                UNIQUE (user_id, content_type, content_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_fsrs_cards_user_due ON fsrs_cards(user_id, due);
            CREATE TABLE IF NOT EXISTS fsrs_review_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                card_id INTEGER NOT NULL,
                grade INTEGER NOT NULL,
                state VARCHAR(20) NOT NULL,
                due TIMESTAMP NOT NULL,
                stability REAL NOT NULL,
                difficulty REAL NOT NULL,
                elapsed_days INTEGER NOT NULL,
                last_elapsed_days INTEGER NOT NULL,
                scheduled_days INTEGER NOT NULL,
                review_time_ms INTEGER NOT NULL DEFAULT 0,
                reviewed_at TIMESTAMP NOT NULL,
                FOREIGN KEY (card_id) REFERENCES fsrs_cards(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_fsrs_review_logs_card_id ON fsrs_review_logs(card_id);
            CREATE TABLE IF NOT EXISTS review_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                card_id INTEGER NOT NULL,
                content_type VARCHAR(20) NOT NULL,
                content_id INTEGER NOT NULL,
                grade INTEGER NOT NULL,
                state VARCHAR(20) NOT NULL,
                stability REAL NOT NULL,
                difficulty REAL NOT NULL,
                scheduled_days INTEGER NOT NULL,
                review_time_ms INTEGER NOT NULL DEFAULT 0,
                reviewed_at TIMESTAMP NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (card_id) REFERENCES fsrs_cards(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_review_history_user ON review_history(user_id, reviewed_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS fsrs_cards (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                user_id BIGINT NOT NULL,
                content_type VARCHAR(20) NOT NULL,
                content_id BIGINT NOT NULL,
                deck_id BIGINT,
                subject VARCHAR(100),
                due TIMESTAMP NOT NULL,
                stability DOUBLE NOT NULL,
                difficulty DOUBLE NOT NULL,
                elapsed_days BIGINT NOT NULL DEFAULT 0,
                scheduled_days BIGINT NOT NULL DEFAULT 0,
                reps BIGINT NOT NULL DEFAULT 0,
                lapses BIGINT NOT NULL DEFAULT 0,
                state VARCHAR(20) NOT NULL DEFAULT 'NEW',
                last_review TIMESTAMP NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                UNIQUE KEY uq_fsrs_cards_item (user_id, content_type, content_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_fsrs_cards_user_due ON fsrs_cards(user_id, due);
            CREATE TABLE IF NOT EXISTS fsrs_review_logs (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                card_id BIGINT NOT NULL,
                grade INT NOT NULL,
                state VARCHAR(20) NOT NULL,
                due TIMESTAMP NOT NULL,
                stability DOUBLE NOT NULL,
                difficulty DOUBLE NOT NULL,
                elapsed_days BIGINT NOT NULL,
                last_elapsed_days BIGINT NOT NULL,
                scheduled_days BIGINT NOT NULL,
                review_time_ms BIGINT NOT NULL DEFAULT 0,
                reviewed_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (card_id) REFERENCES fsrs_cards(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_fsrs_review_logs_card_id ON fsrs_review_logs(card_id);
            CREATE TABLE IF NOT EXISTS review_history (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                user_id BIGINT NOT NULL,
                card_id BIGINT NOT NULL,
                content_type VARCHAR(20) NOT NULL,
                content_id BIGINT NOT NULL,
                grade INT NOT NULL,
                state VARCHAR(20) NOT NULL,
                stability DOUBLE NOT NULL,
                difficulty DOUBLE NOT NULL,
                scheduled_days BIGINT NOT NULL,
                review_time_ms BIGINT NOT NULL DEFAULT 0,
                reviewed_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (card_id) REFERENCES fsrs_cards(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_review_history_user ON review_history(user_id, reviewed_at);
        "#,
    },
    Migration {
        version: 7,
        name: "create_error_notebook",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS error_notebook_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                question_id INTEGER NOT NULL,
                question_statement TEXT NOT NULL,
                correct_answer TEXT,
                subject VARCHAR(100),
                user_note TEXT NOT NULL,
                user_explanation TEXT NOT NULL,
                key_points TEXT NOT NULL DEFAULT '[]',
                tags TEXT NOT NULL DEFAULT '[]',
                difficulty VARCHAR(20) NOT NULL DEFAULT 'MEDIUM',
                confidence INTEGER NOT NULL DEFAULT 3,
                is_in_review_system BOOLEAN NOT NULL DEFAULT 0,
                review_count INTEGER NOT NULL DEFAULT 0,
                last_reviewed_at TIMESTAMP,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_error_notebook_user ON error_notebook_entries(user_id, created_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS error_notebook_entries (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                user_id BIGINT NOT NULL,
                question_id BIGINT NOT NULL,
                question_statement TEXT NOT NULL,
                correct_answer TEXT,
                subject VARCHAR(100),
                user_note TEXT NOT NULL,
                user_explanation TEXT NOT NULL,
                key_points TEXT NOT NULL,
                tags TEXT NOT NULL,
                difficulty VARCHAR(20) NOT NULL DEFAULT 'MEDIUM',
                confidence INT NOT NULL DEFAULT 3,
                is_in_review_system BOOLEAN NOT NULL DEFAULT FALSE,
                review_count BIGINT NOT NULL DEFAULT 0,
                last_reviewed_at TIMESTAMP NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_error_notebook_user ON error_notebook_entries(user_id, created_at);
        "#,
    },
    Migration {
        version: 8,
        name: "create_simulated_exams",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS simulated_exams (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(200) NOT NULL,
                description TEXT,
                instructions TEXT,
                time_limit_minutes INTEGER,
                difficulty VARCHAR(20),
                tags TEXT NOT NULL DEFAULT '[]',
                status VARCHAR(20) NOT NULL DEFAULT 'DRAFT',
                is_public BOOLEAN NOT NULL DEFAULT 0,
                randomize_questions BOOLEAN NOT NULL DEFAULT 1,
                total_questions INTEGER NOT NULL DEFAULT 0,
                total_points REAL NOT NULL DEFAULT 0,
                created_by INTEGER NOT NULL,
                published_at TIMESTAMP,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (created_by) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE TABLE IF NOT EXISTS simulated_exam_questions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                exam_id INTEGER NOT NULL,
                question_id INTEGER NOT NULL,
                points REAL NOT NULL DEFAULT 1,
                position INTEGER NOT NULL DEFAULT 0,
                UNIQUE (exam_id, question_id),
                FOREIGN KEY (exam_id) REFERENCES simulated_exams(id) ON DELETE CASCADE,
                FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE
            );
            CREATE TABLE IF NOT EXISTS simulated_exam_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                exam_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'in_progress',
                score REAL NOT NULL DEFAULT 0,
                total_points REAL NOT NULL DEFAULT 0,
                correct_count INTEGER NOT NULL DEFAULT 0,
                total_questions INTEGER NOT NULL DEFAULT 0,
                percentage INTEGER NOT NULL DEFAULT 0,
                time_spent_seconds INTEGER NOT NULL DEFAULT 0,
                started_at TIMESTAMP NOT NULL,
                finished_at TIMESTAMP,
                FOREIGN KEY (exam_id) REFERENCES simulated_exams(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_exam_results_user ON simulated_exam_results(user_id);
            CREATE TABLE IF NOT EXISTS simulated_exam_answers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                result_id INTEGER NOT NULL,
                question_id INTEGER NOT NULL,
                answer VARCHAR(20) NOT NULL,
                is_correct BOOLEAN NOT NULL,
                points_awarded REAL NOT NULL DEFAULT 0,
                answered_at TIMESTAMP NOT NULL,
                UNIQUE (result_id, question_id),
                FOREIGN KEY (result_id) REFERENCES simulated_exam_results(id) ON DELETE CASCADE
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS simulated_exams (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(200) NOT NULL,
                description TEXT,
                instructions TEXT,
                time_limit_minutes INT,
                difficulty VARCHAR(20),
                tags TEXT NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'DRAFT',
                is_public BOOLEAN NOT NULL DEFAULT FALSE,
                randomize_questions BOOLEAN NOT NULL DEFAULT TRUE,
                total_questions INT NOT NULL DEFAULT 0,
                total_points DOUBLE NOT NULL DEFAULT 0,
                created_by BIGINT NOT NULL,
                published_at TIMESTAMP NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                FOREIGN KEY (created_by) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE TABLE IF NOT EXISTS simulated_exam_questions (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                exam_id BIGINT NOT NULL,
                question_id BIGINT NOT NULL,
                points DOUBLE NOT NULL DEFAULT 1,
                position INT NOT NULL DEFAULT 0,
                UNIQUE KEY uq_exam_question (exam_id, question_id),
                FOREIGN KEY (exam_id) REFERENCES simulated_exams(id) ON DELETE CASCADE,
                FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE
            );
            CREATE TABLE IF NOT EXISTS simulated_exam_results (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                exam_id BIGINT NOT NULL,
                user_id BIGINT NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'in_progress',
                score DOUBLE NOT NULL DEFAULT 0,
                total_points DOUBLE NOT NULL DEFAULT 0,
                correct_count INT NOT NULL DEFAULT 0,
                total_questions INT NOT NULL DEFAULT 0,
                percentage INT NOT NULL DEFAULT 0,
                time_spent_seconds BIGINT NOT NULL DEFAULT 0,
                started_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                finished_at TIMESTAMP NULL,
                FOREIGN KEY (exam_id) REFERENCES simulated_exams(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_exam_results_user ON simulated_exam_results(user_id);
            CREATE TABLE IF NOT EXISTS simulated_exam_answers (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                result_id BIGINT NOT NULL,
                question_id BIGINT NOT NULL,
                answer VARCHAR(20) NOT NULL,
                is_correct BOOLEAN NOT NULL,
                points_awarded DOUBLE NOT NULL DEFAULT 0,
                answered_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE KEY uq_result_question (result_id, question_id),
                FOREIGN KEY (result_id) REFERENCES simulated_exam_results(id) ON DELETE CASCADE
            );
        "#,
    },
    Migration {
        version: 9,
        name: "create_mentorship",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS mentor_profiles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL UNIQUE,
                specialties TEXT NOT NULL DEFAULT '[]',
                bio TEXT,
                max_mentees INTEGER NOT NULL DEFAULT 5,
                is_available BOOLEAN NOT NULL DEFAULT 1,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE TABLE IF NOT EXISTS mentorships (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                mentor_id INTEGER NOT NULL,
                mentee_id INTEGER NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'PENDING',
                objectives TEXT NOT NULL DEFAULT '[]',
                meeting_frequency VARCHAR(20) NOT NULL DEFAULT 'WEEKLY',
                custom_frequency_days INTEGER,
                total_meetings INTEGER,
                completed_meetings INTEGER NOT NULL DEFAULT 0,
                start_date TIMESTAMP,
                end_date TIMESTAMP,
                last_meeting_date TIMESTAMP,
                next_meeting_date TIMESTAMP,
                rating INTEGER,
                feedback TEXT,
                cancel_reason TEXT,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (mentor_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (mentee_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_mentorships_mentor ON mentorships(mentor_id);
            CREATE INDEX IF NOT EXISTS idx_mentorships_mentee ON mentorships(mentee_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS mentor_profiles (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                user_id BIGINT NOT NULL UNIQUE,
                specialties TEXT NOT NULL,
                bio TEXT,
                max_mentees INT NOT NULL DEFAULT 5,
                is_available BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE TABLE IF NOT EXISTS mentorships (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                mentor_id BIGINT NOT NULL,
                mentee_id BIGINT NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'PENDING',
                objectives TEXT NOT NULL,
                meeting_frequency VARCHAR(20) NOT NULL DEFAULT 'WEEKLY',
                custom_frequency_days INT,
                total_meetings INT,
                completed_meetings INT NOT NULL DEFAULT 0,
                start_date TIMESTAMP NULL,
                end_date TIMESTAMP NULL,
                last_meeting_date TIMESTAMP NULL,
                next_meeting_date TIMESTAMP NULL,
                rating INT,
                feedback TEXT,
                cancel_reason TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                FOREIGN KEY (mentor_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (mentee_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_mentorships_mentor ON mentorships(mentor_id);
            CREATE INDEX idx_mentorships_mentee ON mentorships(mentee_id);
        "#,
    },
    Migration {
        version: 10,
        name: "create_planner_and_review_sessions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS planner_tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                title VARCHAR(200) NOT NULL,
                description TEXT,
                scheduled_date TIMESTAMP NOT NULL,
                task_type VARCHAR(20) NOT NULL DEFAULT 'MANUAL',
                status VARCHAR(20) NOT NULL DEFAULT 'PENDING',
                priority VARCHAR(20) NOT NULL DEFAULT 'MEDIUM',
                source VARCHAR(30) NOT NULL DEFAULT 'USER',
                manual_type VARCHAR(50),
                target_url VARCHAR(500),
                metadata TEXT,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_planner_tasks_user_date ON planner_tasks(user_id, scheduled_date);
            CREATE TABLE IF NOT EXISTS review_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                content_type VARCHAR(20) NOT NULL,
                review_ids TEXT NOT NULL DEFAULT '[]',
                session_date DATE NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'active',
                current_index INTEGER NOT NULL DEFAULT 0,
                total_items INTEGER NOT NULL DEFAULT 0,
                started_at TIMESTAMP NOT NULL,
                completed_at TIMESTAMP,
                updated_at TIMESTAMP NOT NULL,
                UNIQUE (user_id, content_type, session_date),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS planner_tasks (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                user_id BIGINT NOT NULL,
                title VARCHAR(200) NOT NULL,
                description TEXT,
                scheduled_date TIMESTAMP NOT NULL,
                task_type VARCHAR(20) NOT NULL DEFAULT 'MANUAL',
                status VARCHAR(20) NOT NULL DEFAULT 'PENDING',
                priority VARCHAR(20) NOT NULL DEFAULT 'MEDIUM',
                source VARCHAR(30) NOT NULL DEFAULT 'USER',
                manual_type VARCHAR(50),
                target_url VARCHAR(500),
                metadata TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_planner_tasks_user_date ON planner_tasks(user_id, scheduled_date);
            CREATE TABLE IF NOT EXISTS review_sessions (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                user_id BIGINT NOT NULL,
                content_type VARCHAR(20) NOT NULL,
                review_ids TEXT NOT NULL,
                session_date DATE NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'active',
                current_index INT NOT NULL DEFAULT 0,
                total_items INT NOT NULL DEFAULT 0,
                started_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                completed_at TIMESTAMP NULL,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                UNIQUE KEY uq_review_session_day (user_id, content_type, session_date),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
        "#,
    },
];

/// Run all pending migrations and return how many were applied
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i32> = applied.iter().map(|m| m.version as i32).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if applied_versions.contains(&migration.version) {
            continue;
        }
        tracing::info!("Applying migration {}: {}", migration.version, migration.name);
        apply_migration(pool, migration)
            .await
            .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
        count += 1;
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    if let Some(sqlite) = pool.as_sqlite() {
        get_applied_migrations_sqlite(sqlite).await
    } else if let Some(mysql) = pool.as_mysql() {
        get_applied_migrations_mysql(mysql).await
    } else {
        anyhow::bail!("Unsupported database pool")
    }
}

async fn get_applied_migrations_sqlite(pool: &SqlitePool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

async fn get_applied_migrations_mysql(pool: &MySqlPool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| MigrationRecord {
            version: row.get::<i32, _>("version") as i64,
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

/// Execute every statement of a migration, then record it
async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    for statement in split_sql_statements(migration.sql_for(pool.driver())) {
        pool.execute(statement)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    const RECORD_SQL: &str = "INSERT INTO _migrations (version, name, applied_at) VALUES (?, ?, ?)";
    let now = Utc::now();
    if let Some(sqlite) = pool.as_sqlite() {
        sqlx::query(RECORD_SQL)
            .bind(migration.version)
            .bind(migration.name)
            .bind(now)
            .execute(sqlite)
            .await?;
    } else if let Some(mysql) = pool.as_mysql() {
        sqlx::query(RECORD_SQL)
            .bind(migration.version)
            .bind(migration.name)
            .bind(now)
            .execute(mysql)
            .await?;
    }

    Ok(())
}

fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split a migration body into statements, dropping comment-only chunks
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

/// Check if all migrations have been applied
pub async fn is_up_to_date(pool: &DynDatabasePool) -> Result<bool> {
    Ok(pending_count(pool).await? == 0)
}

/// Number of migrations not yet applied
pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;
    let applied = get_applied_migrations(pool).await?;
    Ok(MIGRATIONS.len().saturating_sub(applied.len()))
}

/// Get migration by version
pub fn get_migration(version: i32) -> Option<&'static Migration> {
    MIGRATIONS.iter().find(|m| m.version == version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    async fn migrated_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        pool
    }

    async fn insert_user(pool: &SqlitePool, username: &str) -> i64 {
        sqlx::query(
            "INSERT INTO users (username, email, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, 'STUDENT', ?, ?)",
        )
        .bind(username)
        .bind(format!("{}@example.com", username))
        .bind("hash")
        .bind(Utc::now())
        .bind(Utc::now())
        .execute(pool)
        .await
        .expect("Failed to insert user")
        .last_insert_rowid()
    }

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, MIGRATIONS.len());

        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_is_up_to_date_and_pending_count() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        assert!(!is_up_to_date(&pool).await.unwrap());
        assert_eq!(pending_count(&pool).await.unwrap(), MIGRATIONS.len());

        run_migrations(&pool).await.unwrap();

        assert!(is_up_to_date(&pool).await.unwrap());
        assert_eq!(pending_count(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_all_tables_created() {
        let pool = migrated_pool().await;
        let sqlite_pool = pool.as_sqlite().unwrap();

        for table in [
            "users",
            "sessions",
            "categories",
            "contents",
            "comments",
            "likes",
            "questions",
            "decks",
            "deck_favorites",
            "flashcards",
            "fsrs_cards",
            "fsrs_review_logs",
            "review_history",
            "error_notebook_entries",
            "simulated_exams",
            "simulated_exam_questions",
            "simulated_exam_results",
            "simulated_exam_answers",
            "mentor_profiles",
            "mentorships",
            "planner_tasks",
            "review_sessions",
        ] {
            let row: (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(table)
            .fetch_one(sqlite_pool)
            .await
            .unwrap();
            assert_eq!(row.0, 1, "table {} missing", table);
        }
    }

    #[tokio::test]
    async fn test_foreign_key_constraints() {
        let pool = migrated_pool().await;

        let result = sqlx::query("INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)")
            .bind("session123")
            .bind(999i64)
            .bind(Utc::now())
            .bind(Utc::now())
            .execute(pool.as_sqlite().unwrap())
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fsrs_card_item_is_unique_per_user() {
        let pool = migrated_pool().await;
        let sqlite_pool = pool.as_sqlite().unwrap();
        let user_id = insert_user(sqlite_pool, "student").await;

        let insert = || {
            sqlx::query(
                "INSERT INTO fsrs_cards (user_id, content_type, content_id, due, stability, difficulty, created_at, updated_at) VALUES (?, 'FLASHCARD', 1, ?, 8.0, 6.0, ?, ?)",
            )
            .bind(user_id)
            .bind(Utc::now())
            .bind(Utc::now())
            .bind(Utc::now())
            .execute(sqlite_pool)
        };

        assert!(insert().await.is_ok());
        assert!(insert().await.is_err());
    }

    #[tokio::test]
    async fn test_deleting_deck_cascades_to_flashcards() {
        let pool = migrated_pool().await;
        let sqlite_pool = pool.as_sqlite().unwrap();
        let user_id = insert_user(sqlite_pool, "owner").await;

        let deck_id = sqlx::query(
            "INSERT INTO decks (user_id, name, created_at, updated_at) VALUES (?, 'Cardio', ?, ?)",
        )
        .bind(user_id)
        .bind(Utc::now())
        .bind(Utc::now())
        .execute(sqlite_pool)
        .await
        .unwrap()
        .last_insert_rowid();

        sqlx::query(
            "INSERT INTO flashcards (user_id, deck_id, front_content, back_content, created_at, updated_at) VALUES (?, ?, 'Q', 'A', ?, ?)",
        )
        .bind(user_id)
        .bind(deck_id)
        .bind(Utc::now())
        .bind(Utc::now())
        .execute(sqlite_pool)
        .await
        .unwrap();

        sqlx::query("DELETE FROM decks WHERE id = ?")
            .bind(deck_id)
            .execute(sqlite_pool)
            .await
            .unwrap();

        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM flashcards")
            .fetch_one(sqlite_pool)
            .await
            .unwrap();
        assert_eq!(row.0, 0);
    }

    #[test]
    fn test_get_migration() {
        assert_eq!(get_migration(1).unwrap().name, "create_users_and_sessions");
        assert!(get_migration(999).is_none());
    }

    #[test]
    fn test_versions_are_ascending() {
        for pair in MIGRATIONS.windows(2) {
            assert!(pair[0].version < pair[1].version);
        }
    }

    #[test]
    fn test_split_sql_statements() {
        let sql = "CREATE TABLE a (id INT); CREATE TABLE b (id INT);";
        assert_eq!(split_sql_statements(sql).len(), 2);

        let sql_with_comments = "-- Comment\nCREATE TABLE a (id INT);\n-- trailing";
        assert_eq!(split_sql_statements(sql_with_comments).len(), 1);
    }

    #[test]
    fn test_is_comment_only() {
        assert!(is_comment_only("-- This is a comment"));
        assert!(is_comment_only("-- Line 1\n-- Line 2"));
        assert!(!is_comment_only("CREATE TABLE test"));
        assert!(!is_comment_only("-- Comment\nCREATE TABLE test"));
    }
}
