//! Simulated exam service
//!
//! Mentors assemble exams from the question bank. Students start an
//! attempt on a published exam, answer question by question (a new answer
//! replaces the previous one) and finish to get scored.

use crate::db::repositories::simulated_exam::new_answer;
use crate::db::repositories::{QuestionRepository, SimulatedExamRepository};
use crate::models::{
    normalize_list, CreateExamInput, ExamAnswer, ExamFilter, ExamQuestion, ExamQuestionInput, ExamResult,
    ExamStatus, ResultStatus, SimulatedExam, UpdateExamInput, User, UserExamStats,
};
use crate::services::deck::non_empty;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

const MAX_TITLE_LENGTH: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum ExamServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct ExamPage {
    pub exams: Vec<SimulatedExam>,
    pub total: i64,
    pub has_more: bool,
}

pub struct SimulatedExamService {
    repo: Arc<dyn SimulatedExamRepository>,
    questions: Arc<dyn QuestionRepository>,
}

impl SimulatedExamService {
    pub fn new(repo: Arc<dyn SimulatedExamRepository>, questions: Arc<dyn QuestionRepository>) -> Self {
        Self { repo, questions }
    }

    pub async fn create(&self, actor: &User, input: CreateExamInput) -> Result<SimulatedExam, ExamServiceError> {
        if !actor.is_mentor() {
            return Err(ExamServiceError::Forbidden(
                "Only mentors and admins can create exams".to_string(),
            ));
        }

        let title = validate_title(&input.title)?;
        validate_time_limit(input.time_limit_minutes)?;
        let questions = self.resolve_questions(input.questions).await?;

        let now = Utc::now();
        let status = input.status.unwrap_or_default();
        let mut exam = SimulatedExam {
            id: 0,
            title,
            description: non_empty(input.description),
            instructions: non_empty(input.instructions),
            time_limit_minutes: input.time_limit_minutes,
            difficulty: input.difficulty,
            tags: normalize_list(input.tags),
            status,
            is_public: input.is_public,
            randomize_questions: input.randomize_questions,
            total_questions: 0,
            total_points: 0.0,
            created_by: actor.id,
            published_at: (status == ExamStatus::Published).then_some(now),
            created_at: now,
            updated_at: now,
            questions: Vec::new(),
        };
        set_questions(&mut exam, questions);

        let created = self.repo.create(&exam).await?;
        tracing::info!(
            "User {} created exam {} with {} questions",
            actor.id,
            created.id,
            created.total_questions
        );
        Ok(created)
    }

    /// Exam visible to `viewer`: published ones, or any the viewer manages
    pub async fn get(&self, viewer: &User, id: i64) -> Result<SimulatedExam, ExamServiceError> {
        let exam = self.find(id).await?;
        if exam.status != ExamStatus::Published && !viewer.can_manage(exam.created_by) {
            return Err(ExamServiceError::Forbidden("Exam is not published".to_string()));
        }
        Ok(exam)
    }

    pub async fn list(&self, mut filter: ExamFilter) -> Result<ExamPage, ExamServiceError> {
        filter.limit = filter.limit.clamp(1, 100);
        filter.page = filter.page.max(1);
        filter.tags = normalize_list(filter.tags);
        filter.query = non_empty(filter.query);

        let (exams, total) = self.repo.list(&filter).await?;
        let seen = (filter.page as i64 - 1) * filter.limit as i64 + exams.len() as i64;
        Ok(ExamPage {
            has_more: seen < total,
            exams,
            total,
        })
    }

    pub async fn update(
        &self,
        actor: &User,
        id: i64,
        input: UpdateExamInput,
    ) -> Result<SimulatedExam, ExamServiceError> {
        let mut exam = self.managed(actor, id).await?;

        if let Some(title) = input.title {
            exam.title = validate_title(&title)?;
        }
        if let Some(description) = input.description {
            exam.description = non_empty(description);
        }
        if let Some(instructions) = input.instructions {
            exam.instructions = non_empty(instructions);
        }
        if let Some(limit) = input.time_limit_minutes {
            validate_time_limit(limit)?;
            exam.time_limit_minutes = limit;
        }
        if let Some(difficulty) = input.difficulty {
            exam.difficulty = difficulty;
        }
        if let Some(tags) = input.tags {
            exam.tags = normalize_list(tags);
        }
        if let Some(is_public) = input.is_public {
            exam.is_public = is_public;
        }
        if let Some(randomize) = input.randomize_questions {
            exam.randomize_questions = randomize;
        }
        if let Some(status) = input.status {
            if status == ExamStatus::Published && exam.published_at.is_none() {
                exam.published_at = Some(Utc::now());
            }
            exam.status = status;
        }

        let replace_questions = input.questions.is_some();
        if let Some(questions) = input.questions {
            let questions = self.resolve_questions(questions).await?;
            set_questions(&mut exam, questions);
        }
        exam.updated_at = Utc::now();

        Ok(self.repo.update(&exam, replace_questions).await?)
    }

    pub async fn delete(&self, actor: &User, id: i64) -> Result<(), ExamServiceError> {
        let exam = self.managed(actor, id).await?;
        self.repo.delete(exam.id).await?;
        tracing::info!("User {} deleted exam {}", actor.id, exam.id);
        Ok(())
    }

    /// Begin an attempt on a published exam
    pub async fn start(&self, user_id: i64, exam_id: i64) -> Result<ExamResult, ExamServiceError> {
        let exam = self.find(exam_id).await?;
        if exam.status != ExamStatus::Published {
            return Err(ExamServiceError::ValidationError(
                "Only published exams can be started".to_string(),
            ));
        }
        let result = self.repo.create_result(&exam, user_id).await?;
        tracing::debug!("User {} started exam {} (result {})", user_id, exam.id, result.id);
        Ok(result)
    }

    pub async fn submit_answer(
        &self,
        user_id: i64,
        result_id: i64,
        question_id: i64,
        answer: &str,
    ) -> Result<ExamAnswer, ExamServiceError> {
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(ExamServiceError::ValidationError("Answer is required".to_string()));
        }

        let result = self.owned_result(user_id, result_id).await?;
        ensure_in_progress(&result)?;

        let exam = self.find(result.exam_id).await?;
        let slot = exam
            .questions
            .iter()
            .find(|q| q.question_id == question_id)
            .ok_or_else(|| ExamServiceError::NotFound(format!("question {} in exam {}", question_id, exam.id)))?;
        let question = self
            .questions
            .get_by_id(question_id)
            .await?
            .ok_or_else(|| ExamServiceError::NotFound(format!("question {}", question_id)))?;

        let is_correct = question.is_correct(answer);
        let points = if is_correct { slot.points } else { 0.0 };
        let saved = self
            .repo
            .save_answer(&new_answer(result.id, question_id, answer, is_correct, points, Utc::now()))
            .await?;
        Ok(saved)
    }

    /// Score the attempt and close it
    pub async fn finish(&self, user_id: i64, result_id: i64) -> Result<ExamResult, ExamServiceError> {
        let mut result = self.owned_result(user_id, result_id).await?;
        ensure_in_progress(&result)?;

        let now = Utc::now();
        score(&mut result);
        result.time_spent_seconds = (now - result.started_at).num_seconds().max(0);
        result.status = ResultStatus::Completed;
        result.finished_at = Some(now);

        self.repo.update_result(&result).await?;
        tracing::info!(
            "User {} finished result {} with {}%",
            user_id,
            result.id,
            result.percentage
        );
        Ok(result)
    }

    /// Result readable by its owner or an admin
    pub async fn get_result(&self, viewer: &User, result_id: i64) -> Result<ExamResult, ExamServiceError> {
        let result = self.find_result(result_id).await?;
        if !viewer.can_manage(result.user_id) {
            return Err(ExamServiceError::Forbidden("Result belongs to another user".to_string()));
        }
        Ok(result)
    }

    pub async fn results_for_user(&self, user_id: i64) -> Result<Vec<ExamResult>, ExamServiceError> {
        Ok(self.repo.results_for_user(user_id).await?)
    }

    pub async fn user_stats(&self, user_id: i64) -> Result<UserExamStats, ExamServiceError> {
        let results = self.repo.results_for_user(user_id).await?;
        Ok(compute_stats(&results))
    }

    /// Existing questions in input order, duplicates dropped
    async fn resolve_questions(&self, input: Vec<ExamQuestionInput>) -> Result<Vec<ExamQuestionInput>, ExamServiceError> {
        let ids: Vec<i64> = input.iter().map(|q| q.question_id).collect();
        let existing: HashSet<i64> = self
            .questions
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|q| q.id)
            .collect();

        let mut seen = HashSet::new();
        let valid: Vec<ExamQuestionInput> = input
            .into_iter()
            .filter(|q| existing.contains(&q.question_id) && seen.insert(q.question_id))
            .map(|q| ExamQuestionInput {
                points: if q.points > 0.0 { q.points } else { 1.0 },
                ..q
            })
            .collect();

        if valid.is_empty() {
            return Err(ExamServiceError::ValidationError(
                "An exam needs at least one valid question".to_string(),
            ));
        }
        Ok(valid)
    }

    async fn find(&self, id: i64) -> Result<SimulatedExam, ExamServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ExamServiceError::NotFound(format!("exam {}", id)))
    }

    async fn managed(&self, actor: &User, id: i64) -> Result<SimulatedExam, ExamServiceError> {
        let exam = self.find(id).await?;
        if !actor.can_manage(exam.created_by) {
            return Err(ExamServiceError::Forbidden(
                "Only the author or an admin can change this exam".to_string(),
            ));
        }
        Ok(exam)
    }

    async fn find_result(&self, id: i64) -> Result<ExamResult, ExamServiceError> {
        self.repo
            .get_result(id)
            .await?
            .ok_or_else(|| ExamServiceError::NotFound(format!("result {}", id)))
    }

    async fn owned_result(&self, user_id: i64, id: i64) -> Result<ExamResult, ExamServiceError> {
        let result = self.find_result(id).await?;
        if result.user_id != user_id {
            return Err(ExamServiceError::Forbidden("Result belongs to another user".to_string()));
        }
        Ok(result)
    }
}

fn validate_title(title: &str) -> Result<String, ExamServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ExamServiceError::ValidationError("Exam title is required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ExamServiceError::ValidationError(format!(
            "Exam title must be at most {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(title.to_string())
}

fn validate_time_limit(limit: Option<i32>) -> Result<(), ExamServiceError> {
    match limit {
        Some(minutes) if minutes <= 0 => Err(ExamServiceError::ValidationError(
            "time_limit_minutes must be positive".to_string(),
        )),
        _ => Ok(()),
    }
}

fn ensure_in_progress(result: &ExamResult) -> Result<(), ExamServiceError> {
    if result.status != ResultStatus::InProgress {
        return Err(ExamServiceError::ValidationError(
            "Exam attempt is already finished".to_string(),
        ));
    }
    Ok(())
}

fn set_questions(exam: &mut SimulatedExam, questions: Vec<ExamQuestionInput>) {
    exam.questions = questions
        .into_iter()
        .enumerate()
        .map(|(i, q)| ExamQuestion {
            question_id: q.question_id,
            points: q.points,
            position: i as i32,
        })
        .collect();
    exam.total_questions = exam.questions.len() as i32;
    exam.total_points = exam.questions.iter().map(|q| q.points).sum();
}

fn score(result: &mut ExamResult) {
    result.score = result.answers.iter().map(|a| a.points_awarded).sum();
    result.correct_count = result.answers.iter().filter(|a| a.is_correct).count() as i32;
    result.percentage = percentage(result.score, result.total_points);
}

fn percentage(score: f64, total_points: f64) -> i32 {
    if total_points <= 0.0 {
        return 0;
    }
    (score / total_points * 100.0).round() as i32
}

fn compute_stats(results: &[ExamResult]) -> UserExamStats {
    let completed: Vec<&ExamResult> = results
        .iter()
        .filter(|r| r.status == ResultStatus::Completed)
        .collect();

    let average_percentage = if completed.is_empty() {
        0.0
    } else {
        let sum: i64 = completed.iter().map(|r| r.percentage as i64).sum();
        (sum as f64 / completed.len() as f64 * 100.0).round() / 100.0
    };

    UserExamStats {
        exams_taken: results.len() as i64,
        exams_completed: completed.len() as i64,
        average_percentage,
        best_percentage: completed.iter().map(|r| r.percentage).max().unwrap_or(0),
        total_time_spent_seconds: completed.iter().map(|r| r.time_spent_seconds).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::question::tests::sample_question;
    use crate::db::repositories::{SqlxQuestionRepository, SqlxSimulatedExamRepository};
    use crate::models::Question;
    use crate::services::user::tests::setup_test_service;
    use crate::services::user::RegisterInput;

    struct Fixture {
        service: SimulatedExamService,
        mentor: User,
        student: User,
        questions: Vec<Question>,
    }

    async fn setup() -> Fixture {
        let (pool, users) = setup_test_service().await;
        let mentor = users
            .register(RegisterInput::new("preceptor", "preceptor@med.br", "senha-forte"))
            .await
            .unwrap();
        let student = users
            .register(RegisterInput::new("r1", "r1@med.br", "senha-forte"))
            .await
            .unwrap();

        let question_repo = SqlxQuestionRepository::boxed(pool.clone());
        let mut questions = Vec::new();
        for subject in ["Cardiologia", "Pediatria", "Cirurgia"] {
            questions.push(question_repo.create(&sample_question(mentor.id, subject)).await.unwrap());
        }

        Fixture {
            service: SimulatedExamService::new(SqlxSimulatedExamRepository::boxed(pool), question_repo),
            mentor,
            student,
            questions,
        }
    }

    fn slots(questions: &[Question], points: f64) -> Vec<ExamQuestionInput> {
        questions
            .iter()
            .map(|q| ExamQuestionInput {
                question_id: q.id,
                points,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_create_filters_unknown_questions() {
        let f = setup().await;
        let mut input = slots(&f.questions[..2], 2.0);
        input.push(ExamQuestionInput {
            question_id: 9999,
            points: 5.0,
        });
        input.push(ExamQuestionInput {
            question_id: f.questions[0].id,
            points: 1.0,
        });

        let exam = f
            .service
            .create(&f.mentor, CreateExamInput::new("Simulado R1", input))
            .await
            .unwrap();
        assert_eq!(exam.total_questions, 2);
        assert_eq!(exam.total_points, 4.0);
        assert_eq!(exam.status, ExamStatus::Draft);
        assert!(exam.published_at.is_none());

        let err = f
            .service
            .create(
                &f.mentor,
                CreateExamInput::new(
                    "Vazio",
                    vec![ExamQuestionInput {
                        question_id: 4242,
                        points: 1.0,
                    }],
                ),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ExamServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_start_requires_published_exam() {
        let f = setup().await;
        let exam = f
            .service
            .create(&f.mentor, CreateExamInput::new("Rascunho", slots(&f.questions, 1.0)))
            .await
            .unwrap();

        let err = f.service.start(f.student.id, exam.id).await.unwrap_err();
        assert!(matches!(err, ExamServiceError::ValidationError(_)));
        assert!(matches!(
            f.service.get(&f.student, exam.id).await.unwrap_err(),
            ExamServiceError::Forbidden(_)
        ));

        let published = f
            .service
            .update(
                &f.mentor,
                exam.id,
                UpdateExamInput {
                    status: Some(ExamStatus::Published),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(published.published_at.is_some());
        assert!(f.service.start(f.student.id, exam.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_attempt_scoring() {
        let f = setup().await;
        let exam = f
            .service
            .create(
                &f.mentor,
                CreateExamInput::new("Prova", slots(&f.questions, 2.0)).with_status(ExamStatus::Published),
            )
            .await
            .unwrap();
        let result = f.service.start(f.student.id, exam.id).await.unwrap();
        assert_eq!(result.status, ResultStatus::InProgress);

        let first = f
            .service
            .submit_answer(f.student.id, result.id, f.questions[0].id, "A")
            .await
            .unwrap();
        assert!(!first.is_correct);
        // resubmission replaces the wrong answer
        let first = f
            .service
            .submit_answer(f.student.id, result.id, f.questions[0].id, "b")
            .await
            .unwrap();
        assert!(first.is_correct);
        assert_eq!(first.points_awarded, 2.0);
        f.service
            .submit_answer(f.student.id, result.id, f.questions[1].id, "B")
            .await
            .unwrap();

        let err = f
            .service
            .submit_answer(f.student.id, result.id, 9999, "B")
            .await
            .unwrap_err();
        assert!(matches!(err, ExamServiceError::NotFound(_)));
        let err = f
            .service
            .submit_answer(f.mentor.id, result.id, f.questions[1].id, "B")
            .await
            .unwrap_err();
        assert!(matches!(err, ExamServiceError::Forbidden(_)));

        let finished = f.service.finish(f.student.id, result.id).await.unwrap();
        assert_eq!(finished.status, ResultStatus::Completed);
        assert_eq!(finished.score, 4.0);
        assert_eq!(finished.correct_count, 2);
        assert_eq!(finished.percentage, 67);

        let err = f
            .service
            .submit_answer(f.student.id, result.id, f.questions[2].id, "B")
            .await
            .unwrap_err();
        assert!(matches!(err, ExamServiceError::ValidationError(_)));

        let stats = f.service.user_stats(f.student.id).await.unwrap();
        assert_eq!(stats.exams_taken, 1);
        assert_eq!(stats.exams_completed, 1);
        assert_eq!(stats.best_percentage, 67);

        let stored = f.service.get_result(&f.mentor, result.id).await.unwrap();
        assert_eq!(stored.answers.len(), 2);
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let f = setup().await;
        for title in ["Simulado A", "Simulado B", "Outro"] {
            f.service
                .create(
                    &f.mentor,
                    CreateExamInput::new(title, slots(&f.questions, 1.0)).with_status(ExamStatus::Published),
                )
                .await
                .unwrap();
        }

        let page = f
            .service
            .list(ExamFilter {
                limit: 1,
                query: Some("simulado".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert!(page.has_more);

        let target = page.exams[0].id;
        assert!(matches!(
            f.service.delete(&f.student, target).await.unwrap_err(),
            ExamServiceError::Forbidden(_)
        ));
        f.service.delete(&f.mentor, target).await.unwrap();
        assert_eq!(
            f.service
                .list(ExamFilter::default())
                .await
                .unwrap()
                .total,
            2
        );
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(1.0, 3.0), 33);
        assert_eq!(percentage(2.0, 3.0), 67);
        assert_eq!(percentage(5.0, 0.0), 0);
    }
}
