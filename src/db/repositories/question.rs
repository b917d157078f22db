//! Question repository
//!
//! Database operations for the multiple-choice question bank.

use super::{contains_pattern, tag_pattern, Conditions, DbRow, InsertId, SqlArg};
use crate::db::DynDatabasePool;
use crate::models::{encode_string_list, Alternative, ListParams, Question, QuestionFilter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

const QUESTION_COLUMNS: &str = "id, statement, alternatives, correct_alternative_id, explanation, subject, \
     difficulty, tags, created_by, created_at, updated_at";

/// Question repository trait
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Insert a question; `id` and timestamps on the argument are ignored
    async fn create(&self, question: &Question) -> Result<Question>;

    /// Get question by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Question>>;

    /// Fetch several questions; missing ids are skipped
    async fn get_many(&self, ids: &[i64]) -> Result<Vec<Question>>;

    /// Filtered page ordered by id, plus the total match count
    async fn list(&self, filter: &QuestionFilter, params: &ListParams) -> Result<(Vec<Question>, i64)>;

    /// Persist editable fields
    async fn update(&self, question: &Question) -> Result<Question>;

    /// Delete a question with the error notebook entries and exam slots that
    /// reference it, refreshing the totals of the affected exams. Returns the
    /// ids of the removed error notebook entries.
    async fn delete(&self, id: i64) -> Result<Vec<i64>>;

    /// Distinct non-empty subjects, sorted
    async fn list_subjects(&self) -> Result<Vec<String>>;
}

/// SQLx-based question repository implementation
pub struct SqlxQuestionRepository {
    pool: DynDatabasePool,
}

impl SqlxQuestionRepository {
    /// Create a new SQLx question repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn QuestionRepository> {
        Arc::new(Self::new(pool))
    }
}

fn filter_conditions(filter: &QuestionFilter) -> Conditions {
    let mut conditions = Conditions::new();
    if let Some(subject) = filter.subject.as_deref().filter(|s| !s.trim().is_empty()) {
        conditions.push("LOWER(subject) = LOWER(?)", [SqlArg::Text(subject.trim().to_string())]);
    }
    if let Some(difficulty) = filter.difficulty {
        conditions.push("difficulty = ?", [SqlArg::Text(difficulty.as_str().to_string())]);
    }
    if let Some(tag) = filter.tag.as_deref().filter(|t| !t.trim().is_empty()) {
        conditions.push("tags LIKE ?", [SqlArg::Text(tag_pattern(tag.trim()))]);
    }
    if let Some(query) = filter.query.as_deref().filter(|q| !q.trim().is_empty()) {
        conditions.push(
            "LOWER(statement) LIKE ?",
            [SqlArg::Text(contains_pattern(&query.to_lowercase()))],
        );
    }
    conditions
}

fn encode_alternatives(alternatives: &[Alternative]) -> Result<String> {
    serde_json::to_string(alternatives).context("Failed to encode alternatives")
}

#[async_trait]
impl QuestionRepository for SqlxQuestionRepository {
    async fn create(&self, question: &Question) -> Result<Question> {
        let now = Utc::now();
        let alternatives = encode_alternatives(&question.alternatives)?;
        let id = on_pool!(self.pool, |pool, Db| {
            sqlx::query(
                r#"
                INSERT INTO questions (statement, alternatives, correct_alternative_id, explanation, subject,
                                       difficulty, tags, created_by, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&question.statement)
            .bind(&alternatives)
            .bind(&question.correct_alternative_id)
            .bind(&question.explanation)
            .bind(&question.subject)
            .bind(question.difficulty.as_str())
            .bind(encode_string_list(&question.tags))
            .bind(question.created_by)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create question")?
            .insert_id()
        });

        self.get_by_id(id)
            .await?
            .context("Failed to fetch created question")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Question>> {
        on_pool!(self.pool, |pool, Db| {
            let sql = format!("SELECT {} FROM questions WHERE id = ?", QUESTION_COLUMNS);
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get question")?;
            row.as_ref().map(row_to_question).transpose()
        })
    }

    async fn get_many(&self, ids: &[i64]) -> Result<Vec<Question>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM questions WHERE id IN ({}) ORDER BY id",
            QUESTION_COLUMNS, placeholders
        );
        let args: Vec<SqlArg> = ids.iter().map(|id| SqlArg::Int(*id)).collect();

        on_pool!(self.pool, |pool, Db| {
            let rows = bind_args!(sqlx::query::<Db>(&sql), args)
                .fetch_all(pool)
                .await
                .context("Failed to get questions")?;
            rows.iter().map(row_to_question).collect()
        })
    }

    async fn list(&self, filter: &QuestionFilter, params: &ListParams) -> Result<(Vec<Question>, i64)> {
        let conditions = filter_conditions(filter);
        let count_sql = format!("SELECT COUNT(*) AS count FROM questions {}", conditions.where_sql());
        let list_sql = format!(
            "SELECT {} FROM questions {} ORDER BY id DESC LIMIT ? OFFSET ?",
            QUESTION_COLUMNS,
            conditions.where_sql()
        );

        on_pool!(self.pool, |pool, Db| {
            let total = bind_args!(sqlx::query::<Db>(&count_sql), conditions.args)
                .fetch_one(pool)
                .await
                .context("Failed to count questions")?
                .int("count")?;

            let rows = bind_args!(sqlx::query::<Db>(&list_sql), conditions.args)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
                .context("Failed to list questions")?;

            let items = rows.iter().map(row_to_question).collect::<Result<Vec<_>>>()?;
            Ok((items, total))
        })
    }

    async fn update(&self, question: &Question) -> Result<Question> {
        let alternatives = encode_alternatives(&question.alternatives)?;
        on_pool!(self.pool, |pool, Db| {
            sqlx::query(
                r#"
                UPDATE questions
                SET statement = ?, alternatives = ?, correct_alternative_id = ?, explanation = ?, subject = ?,
                    difficulty = ?, tags = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&question.statement)
            .bind(&alternatives)
            .bind(&question.correct_alternative_id)
            .bind(&question.explanation)
            .bind(&question.subject)
            .bind(question.difficulty.as_str())
            .bind(encode_string_list(&question.tags))
            .bind(Utc::now())
            .bind(question.id)
            .execute(pool)
            .await
            .context("Failed to update question")?;
        });

        self.get_by_id(question.id)
            .await?
            .context("Failed to fetch updated question")
    }

    async fn delete(&self, id: i64) -> Result<Vec<i64>> {
        on_pool!(self.pool, |pool, Db| {
            let mut tx = pool.begin().await.context("Failed to begin transaction")?;

            let entry_ids = sqlx::query("SELECT id FROM error_notebook_entries WHERE question_id = ? ORDER BY id")
                .bind(id)
                .fetch_all(&mut *tx)
                .await
                .context("Failed to find error notebook entries of question")?
                .iter()
                .map(|row| row.int("id"))
                .collect::<Result<Vec<_>>>()?;
            let exam_ids = sqlx::query("SELECT DISTINCT exam_id FROM simulated_exam_questions WHERE question_id = ?")
                .bind(id)
                .fetch_all(&mut *tx)
                .await
                .context("Failed to find exams using question")?
                .iter()
                .map(|row| row.int("exam_id"))
                .collect::<Result<Vec<_>>>()?;

            sqlx::query("DELETE FROM error_notebook_entries WHERE question_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .context("Failed to delete error notebook entries of question")?;
            sqlx::query("DELETE FROM simulated_exam_questions WHERE question_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .context("Failed to remove question from exams")?;
            sqlx::query("DELETE FROM questions WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .context("Failed to delete question")?;

            let now = Utc::now();
            for &exam_id in &exam_ids {
                sqlx::query(
                    r#"
                    UPDATE simulated_exams
                    SET total_questions = (SELECT COUNT(*) FROM simulated_exam_questions WHERE exam_id = ?),
                        total_points = (SELECT COALESCE(SUM(points), 0) FROM simulated_exam_questions WHERE exam_id = ?),
                        updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(exam_id)
                .bind(exam_id)
                .bind(now)
                .bind(exam_id)
                .execute(&mut *tx)
                .await
                .context("Failed to refresh exam totals")?;
            }

            tx.commit().await.context("Failed to commit question deletion")?;
            Ok(entry_ids)
        })
    }

    async fn list_subjects(&self) -> Result<Vec<String>> {
        on_pool!(self.pool, |pool, Db| {
            let rows = sqlx::query(
                "SELECT DISTINCT subject FROM questions WHERE subject IS NOT NULL AND subject <> '' ORDER BY subject",
            )
            .fetch_all(pool)
            .await
            .context("Failed to list subjects")?;
            rows.iter().map(|row| row.text("subject")).collect()
        })
    }
}

fn row_to_question(row: &impl DbRow) -> Result<Question> {
    Ok(Question {
        id: row.int("id")?,
        statement: row.text("statement")?,
        alternatives: serde_json::from_str(&row.text("alternatives")?).unwrap_or_default(),
        correct_alternative_id: row.text("correct_alternative_id")?,
        explanation: row.opt_text("explanation")?,
        subject: row.opt_text("subject")?,
        difficulty: row.parsed("difficulty")?,
        tags: row.list("tags")?,
        created_by: row.int("created_by")?,
        created_at: row.time("created_at")?,
        updated_at: row.time("updated_at")?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, migrated_pool};
    use crate::models::Difficulty;

    /// Question with alternatives A..D, B correct
    pub(crate) fn sample_question(created_by: i64, subject: &str) -> Question {
        let now = Utc::now();
        Question {
            id: 0,
            statement: format!("Questao de {}", subject),
            alternatives: ["A", "B", "C", "D"]
                .iter()
                .map(|id| Alternative {
                    id: id.to_string(),
                    text: format!("Opcao {}", id),
                })
                .collect(),
            correct_alternative_id: "B".into(),
            explanation: Some("Porque sim".into()),
            subject: Some(subject.to_string()),
            difficulty: Difficulty::Medium,
            tags: vec!["residencia".into()],
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_question_keeps_alternatives() {
        let pool = migrated_pool().await;
        let author = insert_user(&pool, "prof").await;
        let repo = SqlxQuestionRepository::new(pool);

        let created = repo
            .create(&sample_question(author, "Cardiologia"))
            .await
            .expect("Failed to create question");

        assert_eq!(created.alternatives.len(), 4);
        assert_eq!(created.correct_answer_text(), "B) Opcao B");
    }

    #[tokio::test]
    async fn test_list_and_get_many() {
        let pool = migrated_pool().await;
        let author = insert_user(&pool, "prof").await;
        let repo = SqlxQuestionRepository::new(pool);
        let a = repo.create(&sample_question(author, "Cardiologia")).await.unwrap();
        let b = repo.create(&sample_question(author, "Pediatria")).await.unwrap();

        let filter = QuestionFilter {
            subject: Some("cardiologia".into()),
            ..Default::default()
        };
        let (items, total) = repo.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].id, a.id);

        let many = repo.get_many(&[b.id, a.id, 999]).await.unwrap();
        assert_eq!(many.len(), 2);
        assert_eq!(repo.list_subjects().await.unwrap(), vec!["Cardiologia", "Pediatria"]);
    }
}
