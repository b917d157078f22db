//! Question bank service
//!
//! Mentors and admins author questions; any user may read them and add
//! them to their review queue.

use crate::db::repositories::QuestionRepository;
use crate::models::{
    normalize_list, Alternative, CreateQuestionInput, FsrsCard, ListParams, NewReviewItem, PagedResult, Question,
    QuestionFilter, ReviewContentType, UpdateQuestionInput, User,
};
use crate::services::deck::non_empty;
use crate::services::unified_review::{UnifiedReviewError, UnifiedReviewService};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;

const MIN_ALTERNATIVES: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum QuestionServiceError {
    #[error("Question not found: {0}")]
    NotFound(i64),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<UnifiedReviewError> for QuestionServiceError {
    fn from(err: UnifiedReviewError) -> Self {
        match err {
            UnifiedReviewError::ValidationError(msg) => QuestionServiceError::ValidationError(msg),
            other => QuestionServiceError::InternalError(other.into()),
        }
    }
}

pub struct QuestionService {
    repo: Arc<dyn QuestionRepository>,
    reviews: Arc<UnifiedReviewService>,
}

impl QuestionService {
    pub fn new(repo: Arc<dyn QuestionRepository>, reviews: Arc<UnifiedReviewService>) -> Self {
        Self { repo, reviews }
    }

    pub async fn create(&self, actor: &User, input: CreateQuestionInput) -> Result<Question, QuestionServiceError> {
        if !actor.is_mentor() {
            return Err(QuestionServiceError::Forbidden(
                "Only mentors and admins can create questions".to_string(),
            ));
        }

        let statement = required_statement(&input.statement)?;
        let alternatives = validate_alternatives(input.alternatives, &input.correct_alternative_id)?;

        let now = Utc::now();
        let question = Question {
            id: 0,
            statement,
            alternatives,
            correct_alternative_id: input.correct_alternative_id.trim().to_string(),
            explanation: non_empty(input.explanation),
            subject: non_empty(input.subject),
            difficulty: input.difficulty,
            tags: normalize_list(input.tags),
            created_by: actor.id,
            created_at: now,
            updated_at: now,
        };

        let created = self.repo.create(&question).await?;
        tracing::info!("User {} created question {}", actor.id, created.id);
        Ok(created)
    }

    pub async fn get(&self, id: i64) -> Result<Question, QuestionServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or(QuestionServiceError::NotFound(id))
    }

    pub async fn list(
        &self,
        filter: QuestionFilter,
        params: ListParams,
    ) -> Result<PagedResult<Question>, QuestionServiceError> {
        let params = ListParams::new(params.page, params.per_page);
        let (items, total) = self.repo.list(&filter, &params).await?;
        Ok(PagedResult::new(items, total, &params))
    }

    pub async fn subjects(&self) -> Result<Vec<String>, QuestionServiceError> {
        Ok(self.repo.list_subjects().await?)
    }

    pub async fn update(
        &self,
        actor: &User,
        id: i64,
        input: UpdateQuestionInput,
    ) -> Result<Question, QuestionServiceError> {
        let mut question = self.get(id).await?;
        if !actor.can_manage(question.created_by) {
            return Err(QuestionServiceError::Forbidden(
                "Only the author or an admin can edit this question".to_string(),
            ));
        }

        if let Some(statement) = input.statement {
            question.statement = required_statement(&statement)?;
        }
        if let Some(correct) = input.correct_alternative_id {
            question.correct_alternative_id = correct.trim().to_string();
        }
        let alternatives = input.alternatives.unwrap_or_else(|| question.alternatives.clone());
        question.alternatives = validate_alternatives(alternatives, &question.correct_alternative_id)?;
        if let Some(explanation) = input.explanation {
            question.explanation = non_empty(explanation);
        }
        if let Some(subject) = input.subject {
            question.subject = non_empty(subject);
        }
        if let Some(difficulty) = input.difficulty {
            question.difficulty = difficulty;
        }
        if let Some(tags) = input.tags {
            question.tags = normalize_list(tags);
        }
        question.updated_at = Utc::now();

        Ok(self.repo.update(&question).await?)
    }

    pub async fn delete(&self, actor: &User, id: i64) -> Result<(), QuestionServiceError> {
        let question = self.get(id).await?;
        if !actor.can_manage(question.created_by) {
            return Err(QuestionServiceError::Forbidden(
                "Only the author or an admin can delete this question".to_string(),
            ));
        }
        // Error notes copied from the question go with it
        let removed_notes = self.repo.delete(question.id).await?;
        self.reviews
            .remove_content(ReviewContentType::Question, question.id)
            .await?;
        for note_id in &removed_notes {
            self.reviews
                .remove_content(ReviewContentType::ErrorNotebook, *note_id)
                .await?;
        }
        tracing::info!(
            "User {} deleted question {} ({} error notes removed)",
            actor.id,
            question.id,
            removed_notes.len()
        );
        Ok(())
    }

    /// Put a question in the user's review queue
    pub async fn add_to_review(&self, user_id: i64, id: i64) -> Result<FsrsCard, QuestionServiceError> {
        let question = self.get(id).await?;
        let item = NewReviewItem::new(user_id, ReviewContentType::Question, question.id)
            .with_subject(question.subject.clone());
        Ok(self.reviews.create_review_item(item).await?)
    }
}

fn required_statement(statement: &str) -> Result<String, QuestionServiceError> {
    let statement = statement.trim();
    if statement.is_empty() {
        return Err(QuestionServiceError::ValidationError(
            "Question statement is required".to_string(),
        ));
    }
    Ok(statement.to_string())
}

/// Trimmed alternatives with unique ids, one of which is the correct one
fn validate_alternatives(
    alternatives: Vec<Alternative>,
    correct_id: &str,
) -> Result<Vec<Alternative>, QuestionServiceError> {
    let alternatives: Vec<Alternative> = alternatives
        .into_iter()
        .map(|a| Alternative {
            id: a.id.trim().to_string(),
            text: a.text.trim().to_string(),
        })
        .collect();

    if alternatives.len() < MIN_ALTERNATIVES {
        return Err(QuestionServiceError::ValidationError(format!(
            "A question needs at least {} alternatives",
            MIN_ALTERNATIVES
        )));
    }
    if alternatives.iter().any(|a| a.id.is_empty() || a.text.is_empty()) {
        return Err(QuestionServiceError::ValidationError(
            "Alternatives need an id and a text".to_string(),
        ));
    }
    let mut ids = HashSet::new();
    if !alternatives.iter().all(|a| ids.insert(a.id.as_str())) {
        return Err(QuestionServiceError::ValidationError(
            "Alternative ids must be unique".to_string(),
        ));
    }
    if !ids.contains(correct_id.trim()) {
        return Err(QuestionServiceError::ValidationError(
            "Correct alternative must be one of the alternatives".to_string(),
        ));
    }
    Ok(alternatives)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxErrorNotebookRepository, SqlxQuestionRepository};
    use crate::db::DynDatabasePool;
    use crate::models::{CreateErrorNotebookInput, Difficulty, UserRole};
    use crate::services::error_notebook::{ErrorNotebookError, ErrorNotebookService};
    use crate::services::unified_review::tests::review_service;
    use crate::services::user::tests::setup_test_service;
    use crate::services::user::RegisterInput;

    fn input() -> CreateQuestionInput {
        CreateQuestionInput {
            statement: "Qual o agente mais comum da pneumonia comunitaria?".into(),
            alternatives: vec![
                Alternative { id: "A".into(), text: "S. pneumoniae".into() },
                Alternative { id: "B".into(), text: "S. aureus".into() },
            ],
            correct_alternative_id: "A".into(),
            explanation: Some("  Pneumococo  ".into()),
            subject: Some("Pneumologia".into()),
            difficulty: Difficulty::Easy,
            tags: vec!["infecto".into()],
        }
    }

    async fn setup() -> (QuestionService, User, User) {
        let (service, _, _, admin, student) = setup_with_reviews().await;
        (service, admin, student)
    }

    async fn setup_with_reviews() -> (QuestionService, Arc<UnifiedReviewService>, DynDatabasePool, User, User) {
        let (pool, users) = setup_test_service().await;
        let admin = users
            .register(RegisterInput::new("admin", "admin@med.br", "senha-forte"))
            .await
            .unwrap();
        let student = users
            .register(RegisterInput::new("aluno", "aluno@med.br", "senha-forte"))
            .await
            .unwrap();
        assert_eq!(admin.role, UserRole::Admin);

        let reviews = Arc::new(review_service(&pool).await);
        (
            QuestionService::new(SqlxQuestionRepository::boxed(pool.clone()), reviews.clone()),
            reviews,
            pool,
            admin,
            student,
        )
    }

    #[tokio::test]
    async fn test_only_mentors_create() {
        let (service, admin, student) = setup().await;

        let err = service.create(&student, input()).await.unwrap_err();
        assert!(matches!(err, QuestionServiceError::Forbidden(_)));

        let question = service.create(&admin, input()).await.unwrap();
        assert_eq!(question.explanation.as_deref(), Some("Pneumococo"));
        assert_eq!(service.subjects().await.unwrap(), vec!["Pneumologia"]);
    }

    #[tokio::test]
    async fn test_alternatives_are_validated() {
        let (service, admin, _) = setup().await;

        let mut bad = input();
        bad.correct_alternative_id = "Z".into();
        assert!(matches!(
            service.create(&admin, bad).await.unwrap_err(),
            QuestionServiceError::ValidationError(_)
        ));

        let mut duplicated = input();
        duplicated.alternatives[1].id = "A".into();
        assert!(matches!(
            service.create(&admin, duplicated).await.unwrap_err(),
            QuestionServiceError::ValidationError(_)
        ));
    }

    #[tokio::test]
    async fn test_update_delete_and_review() {
        let (service, admin, student) = setup().await;
        let question = service.create(&admin, input()).await.unwrap();

        let err = service
            .update(&student, question.id, UpdateQuestionInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, QuestionServiceError::Forbidden(_)));

        let updated = service
            .update(
                &admin,
                question.id,
                UpdateQuestionInput {
                    correct_alternative_id: Some("B".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.correct_alternative_id, "B");

        let card = service.add_to_review(student.id, question.id).await.unwrap();
        assert_eq!(card.subject.as_deref(), Some("Pneumologia"));

        service.delete(&admin, question.id).await.unwrap();
        assert!(matches!(
            service.get(question.id).await.unwrap_err(),
            QuestionServiceError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_delete_drops_error_notes_from_review() {
        let (service, reviews, pool, admin, student) = setup_with_reviews().await;
        let question = service.create(&admin, input()).await.unwrap();
        let notes = ErrorNotebookService::new(
            SqlxErrorNotebookRepository::boxed(pool.clone()),
            SqlxQuestionRepository::boxed(pool),
            reviews.clone(),
        );
        let created = notes
            .create(
                student.id,
                CreateErrorNotebookInput::new(question.id, "Marquei S. aureus", "Pneumococo e o mais comum"),
            )
            .await
            .unwrap();
        assert!(created.added_to_review);

        service.delete(&admin, question.id).await.unwrap();

        assert!(matches!(
            notes.get(student.id, created.entry.id).await.unwrap_err(),
            ErrorNotebookError::NotFound(_)
        ));
        assert!(reviews.due(student.id, Utc::now()).await.unwrap().is_empty());
        assert!(reviews
            .get_item(student.id, ReviewContentType::ErrorNotebook, created.entry.id)
            .await
            .unwrap()
            .is_none());
    }
}
