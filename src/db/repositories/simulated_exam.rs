//! Simulated exam repository
//!
//! Exams, their question slots, attempts (results) and the answers of
//! each attempt.

use super::{contains_pattern, tag_pattern, Conditions, DbRow, InsertId, SqlArg};
use crate::db::DynDatabasePool;
use crate::models::{
    encode_string_list, ExamAnswer, ExamFilter, ExamQuestion, ExamResult, ResultStatus, SimulatedExam,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

const EXAM_COLUMNS: &str = "id, title, description, instructions, time_limit_minutes, difficulty, tags, status, \
     is_public, randomize_questions, total_questions, total_points, created_by, published_at, created_at, updated_at";

const RESULT_COLUMNS: &str = "id, exam_id, user_id, status, score, total_points, correct_count, total_questions, \
     percentage, time_spent_seconds, started_at, finished_at";

/// Simulated exam repository trait
#[async_trait]
pub trait SimulatedExamRepository: Send + Sync {
    /// Insert an exam together with its question slots
    async fn create(&self, exam: &SimulatedExam) -> Result<SimulatedExam>;

    /// Get exam by ID, question slots included
    async fn get_by_id(&self, id: i64) -> Result<Option<SimulatedExam>>;

    /// Filtered page, newest first, plus the total match count
    async fn list(&self, filter: &ExamFilter) -> Result<(Vec<SimulatedExam>, i64)>;

    /// Persist exam fields; question slots are replaced when `replace_questions` is set
    async fn update(&self, exam: &SimulatedExam, replace_questions: bool) -> Result<SimulatedExam>;

    /// Delete an exam; results and answers cascade
    async fn delete(&self, id: i64) -> Result<()>;

    /// Start an attempt
    async fn create_result(&self, exam: &SimulatedExam, user_id: i64) -> Result<ExamResult>;

    /// Get result by ID, answers included
    async fn get_result(&self, id: i64) -> Result<Option<ExamResult>>;

    /// Results of a user, most recent first
    async fn results_for_user(&self, user_id: i64) -> Result<Vec<ExamResult>>;

    /// Persist the scoring of an attempt
    async fn update_result(&self, result: &ExamResult) -> Result<()>;

    /// Store an answer, replacing any earlier answer to the same question
    async fn save_answer(&self, answer: &ExamAnswer) -> Result<ExamAnswer>;
}

/// SQLx-based simulated exam repository implementation
pub struct SqlxSimulatedExamRepository {
    pool: DynDatabasePool,
}

impl SqlxSimulatedExamRepository {
    /// Create a new SQLx simulated exam repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SimulatedExamRepository> {
        Arc::new(Self::new(pool))
    }

    async fn questions_of(&self, exam_id: i64) -> Result<Vec<ExamQuestion>> {
        on_pool!(self.pool, |pool, Db| {
            let rows = sqlx::query(
                "SELECT question_id, points, position FROM simulated_exam_questions WHERE exam_id = ? ORDER BY position, id",
            )
            .bind(exam_id)
            .fetch_all(pool)
            .await
            .context("Failed to list exam questions")?;
            rows.iter()
                .map(|row| {
                    Ok(ExamQuestion {
                        question_id: row.int("question_id")?,
                        points: row.float("points")?,
                        position: row.small("position")?,
                    })
                })
                .collect()
        })
    }

    async fn answers_of(&self, result_id: i64) -> Result<Vec<ExamAnswer>> {
        on_pool!(self.pool, |pool, Db| {
            let rows = sqlx::query(
                r#"
                SELECT id, result_id, question_id, answer, is_correct, points_awarded, answered_at
                FROM simulated_exam_answers WHERE result_id = ? ORDER BY id
                "#,
            )
            .bind(result_id)
            .fetch_all(pool)
            .await
            .context("Failed to list exam answers")?;
            rows.iter().map(row_to_answer).collect()
        })
    }
}

fn filter_conditions(filter: &ExamFilter) -> Conditions {
    let mut conditions = Conditions::new();
    if let Some(status) = filter.status {
        conditions.push("status = ?", [SqlArg::Text(status.as_str().to_string())]);
    }
    if let Some(difficulty) = filter.difficulty {
        conditions.push("difficulty = ?", [SqlArg::Text(difficulty.as_str().to_string())]);
    }
    if let Some(created_by) = filter.created_by {
        conditions.push("created_by = ?", [SqlArg::Int(created_by)]);
    }
    if let Some(is_public) = filter.is_public {
        conditions.push("is_public = ?", [SqlArg::Bool(is_public)]);
    }
    let tags: Vec<&str> = filter.tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()).collect();
    if !tags.is_empty() {
        let clause = format!("({})", vec!["tags LIKE ?"; tags.len()].join(" OR "));
        conditions.push(clause, tags.iter().map(|t| SqlArg::Text(tag_pattern(t))));
    }
    if let Some(query) = filter.query.as_deref().filter(|q| !q.trim().is_empty()) {
        let pattern = contains_pattern(&query.to_lowercase());
        conditions.push(
            "(LOWER(title) LIKE ? OR LOWER(COALESCE(description, '')) LIKE ?)",
            [SqlArg::Text(pattern.clone()), SqlArg::Text(pattern)],
        );
    }
    conditions
}

#[async_trait]
impl SimulatedExamRepository for SqlxSimulatedExamRepository {
    async fn create(&self, exam: &SimulatedExam) -> Result<SimulatedExam> {
        let now = Utc::now();
        let id = on_pool!(self.pool, |pool, Db| {
            let mut tx = pool.begin().await.context("Failed to begin transaction")?;
            let id = sqlx::query(
                r#"
                INSERT INTO simulated_exams (title, description, instructions, time_limit_minutes, difficulty, tags,
                                             status, is_public, randomize_questions, total_questions, total_points,
                                             created_by, published_at, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&exam.title)
            .bind(&exam.description)
            .bind(&exam.instructions)
            .bind(exam.time_limit_minutes)
            .bind(exam.difficulty.map(|d| d.as_str()))
            .bind(encode_string_list(&exam.tags))
            .bind(exam.status.as_str())
            .bind(exam.is_public)
            .bind(exam.randomize_questions)
            .bind(exam.total_questions)
            .bind(exam.total_points)
            .bind(exam.created_by)
            .bind(exam.published_at)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to create exam")?
            .insert_id();

            for slot in &exam.questions {
                sqlx::query("INSERT INTO simulated_exam_questions (exam_id, question_id, points, position) VALUES (?, ?, ?, ?)")
                    .bind(id)
                    .bind(slot.question_id)
                    .bind(slot.points)
                    .bind(slot.position)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to add exam question")?;
            }

            tx.commit().await.context("Failed to commit exam")?;
            id
        });

        self.get_by_id(id).await?.context("Failed to fetch created exam")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<SimulatedExam>> {
        let exam = on_pool!(self.pool, |pool, Db| {
            let sql = format!("SELECT {} FROM simulated_exams WHERE id = ?", EXAM_COLUMNS);
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get exam")?;
            row.as_ref().map(row_to_exam).transpose()?
        });

        match exam {
            Some(mut exam) => {
                exam.questions = self.questions_of(exam.id).await?;
                Ok(Some(exam))
            }
            None => Ok(None),
        }
    }

    async fn list(&self, filter: &ExamFilter) -> Result<(Vec<SimulatedExam>, i64)> {
        let conditions = filter_conditions(filter);
        let limit = filter.limit.clamp(1, 100) as i64;
        let offset = (filter.page.max(1) as i64 - 1) * limit;
        let count_sql = format!("SELECT COUNT(*) AS count FROM simulated_exams {}", conditions.where_sql());
        let list_sql = format!(
            "SELECT {} FROM simulated_exams {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            EXAM_COLUMNS,
            conditions.where_sql()
        );

        on_pool!(self.pool, |pool, Db| {
            let total = bind_args!(sqlx::query::<Db>(&count_sql), conditions.args)
                .fetch_one(pool)
                .await
                .context("Failed to count exams")?
                .int("count")?;

            let rows = bind_args!(sqlx::query::<Db>(&list_sql), conditions.args)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await
                .context("Failed to list exams")?;

            let exams = rows.iter().map(row_to_exam).collect::<Result<Vec<_>>>()?;
            Ok((exams, total))
        })
    }

    async fn update(&self, exam: &SimulatedExam, replace_questions: bool) -> Result<SimulatedExam> {
        on_pool!(self.pool, |pool, Db| {
            let mut tx = pool.begin().await.context("Failed to begin transaction")?;
            sqlx::query(
                r#"
                UPDATE simulated_exams
                SET title = ?, description = ?, instructions = ?, time_limit_minutes = ?, difficulty = ?, tags = ?,
                    status = ?, is_public = ?, randomize_questions = ?, total_questions = ?, total_points = ?,
                    published_at = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&exam.title)
            .bind(&exam.description)
            .bind(&exam.instructions)
            .bind(exam.time_limit_minutes)
            .bind(exam.difficulty.map(|d| d.as_str()))
            .bind(encode_string_list(&exam.tags))
            .bind(exam.status.as_str())
            .bind(exam.is_public)
            .bind(exam.randomize_questions)
            .bind(exam.total_questions)
            .bind(exam.total_points)
            .bind(exam.published_at)
            .bind(Utc::now())
            .bind(exam.id)
            .execute(&mut *tx)
            .await
            .context("Failed to update exam")?;

            if replace_questions {
                sqlx::query("DELETE FROM simulated_exam_questions WHERE exam_id = ?")
                    .bind(exam.id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to clear exam questions")?;
                for slot in &exam.questions {
                    sqlx::query("INSERT INTO simulated_exam_questions (exam_id, question_id, points, position) VALUES (?, ?, ?, ?)")
                        .bind(exam.id)
                        .bind(slot.question_id)
                        .bind(slot.points)
                        .bind(slot.position)
                        .execute(&mut *tx)
                        .await
                        .context("Failed to add exam question")?;
                }
            }

            tx.commit().await.context("Failed to commit exam")?;
        });

        self.get_by_id(exam.id).await?.context("Failed to fetch updated exam")
    }

    async fn delete(&self, id: i64) -> Result<()> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query("DELETE FROM simulated_exams WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete exam")?;
        });
        Ok(())
    }

    async fn create_result(&self, exam: &SimulatedExam, user_id: i64) -> Result<ExamResult> {
        let id = on_pool!(self.pool, |pool, Db| {
            sqlx::query(
                r#"
                INSERT INTO simulated_exam_results (exam_id, user_id, status, score, total_points, correct_count,
                                                    total_questions, percentage, time_spent_seconds, started_at)
                VALUES (?, ?, ?, 0, ?, 0, ?, 0, 0, ?)
                "#,
            )
            .bind(exam.id)
            .bind(user_id)
            .bind(ResultStatus::InProgress.as_str())
            .bind(exam.total_points)
            .bind(exam.total_questions)
            .bind(Utc::now())
            .execute(pool)
            .await
            .context("Failed to start exam")?
            .insert_id()
        });

        self.get_result(id).await?.context("Failed to fetch created result")
    }

    async fn get_result(&self, id: i64) -> Result<Option<ExamResult>> {
        let result = on_pool!(self.pool, |pool, Db| {
            let sql = format!("SELECT {} FROM simulated_exam_results WHERE id = ?", RESULT_COLUMNS);
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get exam result")?;
            row.as_ref().map(row_to_result).transpose()?
        });

        match result {
            Some(mut result) => {
                result.answers = self.answers_of(result.id).await?;
                Ok(Some(result))
            }
            None => Ok(None),
        }
    }

    async fn results_for_user(&self, user_id: i64) -> Result<Vec<ExamResult>> {
        on_pool!(self.pool, |pool, Db| {
            let sql = format!(
                "SELECT {} FROM simulated_exam_results WHERE user_id = ? ORDER BY started_at DESC, id DESC",
                RESULT_COLUMNS
            );
            let rows = sqlx::query(&sql)
                .bind(user_id)
                .fetch_all(pool)
                .await
                .context("Failed to list exam results")?;
            rows.iter().map(row_to_result).collect()
        })
    }

    async fn update_result(&self, result: &ExamResult) -> Result<()> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query(
                r#"
                UPDATE simulated_exam_results
                SET status = ?, score = ?, correct_count = ?, percentage = ?, time_spent_seconds = ?, finished_at = ?
                WHERE id = ?
                "#,
            )
            .bind(result.status.as_str())
            .bind(result.score)
            .bind(result.correct_count)
            .bind(result.percentage)
            .bind(result.time_spent_seconds)
            .bind(result.finished_at)
            .bind(result.id)
            .execute(pool)
            .await
            .context("Failed to update exam result")?;
        });
        Ok(())
    }

    async fn save_answer(&self, answer: &ExamAnswer) -> Result<ExamAnswer> {
        let id = on_pool!(self.pool, |pool, Db| {
            let mut tx = pool.begin().await.context("Failed to begin transaction")?;
            sqlx::query("DELETE FROM simulated_exam_answers WHERE result_id = ? AND question_id = ?")
                .bind(answer.result_id)
                .bind(answer.question_id)
                .execute(&mut *tx)
                .await
                .context("Failed to replace exam answer")?;
            let id = sqlx::query(
                r#"
                INSERT INTO simulated_exam_answers (result_id, question_id, answer, is_correct, points_awarded, answered_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(answer.result_id)
            .bind(answer.question_id)
            .bind(&answer.answer)
            .bind(answer.is_correct)
            .bind(answer.points_awarded)
            .bind(answer.answered_at)
            .execute(&mut *tx)
            .await
            .context("Failed to save exam answer")?
            .insert_id();
            tx.commit().await.context("Failed to commit exam answer")?;
            id
        });

        Ok(ExamAnswer { id, ..answer.clone() })
    }
}

fn row_to_exam(row: &impl DbRow) -> Result<SimulatedExam> {
    Ok(SimulatedExam {
        id: row.int("id")?,
        title: row.text("title")?,
        description: row.opt_text("description")?,
        instructions: row.opt_text("instructions")?,
        time_limit_minutes: row.opt_small("time_limit_minutes")?,
        difficulty: row.opt_parsed("difficulty")?,
        tags: row.list("tags")?,
        status: row.parsed("status")?,
        is_public: row.flag("is_public")?,
        randomize_questions: row.flag("randomize_questions")?,
        total_questions: row.small("total_questions")?,
        total_points: row.float("total_points")?,
        created_by: row.int("created_by")?,
        published_at: row.opt_time("published_at")?,
        created_at: row.time("created_at")?,
        updated_at: row.time("updated_at")?,
        questions: Vec::new(),
    })
}

fn row_to_result(row: &impl DbRow) -> Result<ExamResult> {
    Ok(ExamResult {
        id: row.int("id")?,
        exam_id: row.int("exam_id")?,
        user_id: row.int("user_id")?,
        status: row.parsed("status")?,
        score: row.float("score")?,
        total_points: row.float("total_points")?,
        correct_count: row.small("correct_count")?,
        total_questions: row.small("total_questions")?,
        percentage: row.small("percentage")?,
        time_spent_seconds: row.int("time_spent_seconds")?,
        started_at: row.time("started_at")?,
        finished_at: row.opt_time("finished_at")?,
        answers: Vec::new(),
    })
}

fn row_to_answer(row: &impl DbRow) -> Result<ExamAnswer> {
    Ok(ExamAnswer {
        id: row.int("id")?,
        result_id: row.int("result_id")?,
        question_id: row.int("question_id")?,
        answer: row.text("answer")?,
        is_correct: row.flag("is_correct")?,
        points_awarded: row.float("points_awarded")?,
        answered_at: row.time("answered_at")?,
    })
}

/// Answer row for `save_answer`
pub fn new_answer(
    result_id: i64,
    question_id: i64,
    answer: &str,
    is_correct: bool,
    points_awarded: f64,
    answered_at: DateTime<Utc>,
) -> ExamAnswer {
    ExamAnswer {
        id: 0,
        result_id,
        question_id,
        answer: answer.to_string(),
        is_correct,
        points_awarded,
        answered_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::question::tests::sample_question;
    use crate::db::repositories::test_support::{insert_user, migrated_pool};
    use crate::db::repositories::{QuestionRepository, SqlxQuestionRepository};
    use crate::models::ExamStatus;

    async fn setup_exam() -> (SqlxSimulatedExamRepository, i64, SimulatedExam) {
        let pool = migrated_pool().await;
        let user = insert_user(&pool, "residente").await;
        let questions = SqlxQuestionRepository::new(pool.clone());
        let q1 = questions.create(&sample_question(user, "Clinica")).await.unwrap();
        let q2 = questions.create(&sample_question(user, "Cirurgia")).await.unwrap();
        let repo = SqlxSimulatedExamRepository::new(pool);
        let now = Utc::now();
        let exam = repo
            .create(&SimulatedExam {
                id: 0,
                title: "Simulado R1".into(),
                description: Some("Prova geral".into()),
                instructions: None,
                time_limit_minutes: Some(120),
                difficulty: None,
                tags: vec!["r1".into()],
                status: ExamStatus::Published,
                is_public: true,
                randomize_questions: true,
                total_questions: 2,
                total_points: 3.0,
                created_by: user,
                published_at: Some(now),
                created_at: now,
                updated_at: now,
                questions: vec![
                    ExamQuestion { question_id: q1.id, points: 1.0, position: 0 },
                    ExamQuestion { question_id: q2.id, points: 2.0, position: 1 },
                ],
            })
            .await
            .expect("Failed to create exam");
        (repo, user, exam)
    }

    #[tokio::test]
    async fn test_create_exam_with_questions() {
        let (repo, user, exam) = setup_exam().await;

        assert_eq!(exam.questions.len(), 2);
        assert_eq!(exam.questions[1].points, 2.0);

        let filter = ExamFilter {
            query: Some("geral".into()),
            created_by: Some(user),
            ..Default::default()
        };
        let (exams, total) = repo.list(&filter).await.unwrap();
        assert_eq!(total, 1);
        assert!(exams[0].questions.is_empty());
    }

    #[tokio::test]
    async fn test_deleting_question_refreshes_exam_totals() {
        let (repo, _user, exam) = setup_exam().await;
        let removed = exam.questions[1].question_id;

        SqlxQuestionRepository::new(repo.pool.clone())
            .delete(removed)
            .await
            .expect("Failed to delete question");

        let refreshed = repo.get_by_id(exam.id).await.unwrap().unwrap();
        assert_eq!(refreshed.questions.len(), 1);
        assert_eq!(refreshed.questions[0].question_id, exam.questions[0].question_id);
        assert_eq!(refreshed.total_questions, 1);
        assert_eq!(refreshed.total_points, 1.0);
    }

    #[tokio::test]
    async fn test_update_replaces_questions() {
        let (repo, _, exam) = setup_exam().await;
        let mut edited = exam.clone();
        edited.questions.truncate(1);
        edited.total_questions = 1;
        edited.total_points = 1.0;

        let updated = repo.update(&edited, true).await.unwrap();
        assert_eq!(updated.questions.len(), 1);
        assert_eq!(updated.total_questions, 1);
    }

    #[tokio::test]
    async fn test_answers_replace_previous() {
        let (repo, user, exam) = setup_exam().await;
        let result = repo.create_result(&exam, user).await.unwrap();
        assert_eq!(result.status, ResultStatus::InProgress);

        let question = exam.questions[0].question_id;
        repo.save_answer(&new_answer(result.id, question, "A", false, 0.0, Utc::now()))
            .await
            .unwrap();
        repo.save_answer(&new_answer(result.id, question, "B", true, 1.0, Utc::now()))
            .await
            .unwrap();

        let loaded = repo.get_result(result.id).await.unwrap().unwrap();
        assert_eq!(loaded.answers.len(), 1);
        assert_eq!(loaded.answers[0].answer, "B");

        repo.delete(exam.id).await.unwrap();
        assert!(repo.get_result(result.id).await.unwrap().is_none());
    }
}
