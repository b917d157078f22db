//! Error notebook service
//!
//! Entries copy the context of the missed question so they stay readable
//! if the question changes later. Each entry is registered as an
//! `ERROR_NOTEBOOK` review item; a failed registration is logged and
//! leaves the entry outside the review system.

use crate::db::repositories::{ErrorNotebookRepository, QuestionRepository};
use crate::models::{
    normalize_list, CreateErrorNotebookInput, ErrorNotebookEntry, ErrorNotebookFilter, ErrorNotebookPage,
    ErrorNotebookStats, NewReviewItem, ReviewContentType, UpdateErrorNotebookInput,
};
use crate::services::unified_review::{ReviewOutcome, UnifiedReviewError, UnifiedReviewService};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

const DEFAULT_CONFIDENCE: i32 = 3;
const NO_SUBJECT: &str = "Sem assunto";

#[derive(Debug, thiserror::Error)]
pub enum ErrorNotebookError {
    #[error("Error notebook entry not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<UnifiedReviewError> for ErrorNotebookError {
    fn from(err: UnifiedReviewError) -> Self {
        match err {
            UnifiedReviewError::NotFound(msg) => ErrorNotebookError::NotFound(msg),
            UnifiedReviewError::ValidationError(msg) => ErrorNotebookError::ValidationError(msg),
            UnifiedReviewError::InternalError(e) => ErrorNotebookError::InternalError(e),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedErrorNote {
    pub entry: ErrorNotebookEntry,
    pub added_to_review: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionContext {
    pub statement: String,
    pub correct_answer: Option<String>,
    pub subject: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserContent {
    pub note: String,
    pub explanation: String,
    pub key_points: Vec<String>,
}

/// Material shown when an entry comes up for review
#[derive(Debug, Clone, Serialize)]
pub struct ErrorNoteReviewData {
    pub entry_id: i64,
    pub question_context: QuestionContext,
    pub user_content: UserContent,
    pub review_prompt: String,
}

pub struct ErrorNotebookService {
    repo: Arc<dyn ErrorNotebookRepository>,
    questions: Arc<dyn QuestionRepository>,
    reviews: Arc<UnifiedReviewService>,
}

impl ErrorNotebookService {
    pub fn new(
        repo: Arc<dyn ErrorNotebookRepository>,
        questions: Arc<dyn QuestionRepository>,
        reviews: Arc<UnifiedReviewService>,
    ) -> Self {
        Self {
            repo,
            questions,
            reviews,
        }
    }

    pub async fn create(
        &self,
        user_id: i64,
        input: CreateErrorNotebookInput,
    ) -> Result<CreatedErrorNote, ErrorNotebookError> {
        let user_note = required(&input.user_note, "user_note")?;
        let user_explanation = required(&input.user_explanation, "user_explanation")?;

        let question = self
            .questions
            .get_by_id(input.question_id)
            .await?
            .ok_or_else(|| ErrorNotebookError::NotFound(format!("question {}", input.question_id)))?;

        let now = Utc::now();
        let entry = ErrorNotebookEntry {
            id: 0,
            user_id,
            question_id: question.id,
            question_statement: question.statement.clone(),
            correct_answer: Some(question.correct_answer_text()),
            subject: question.subject.clone(),
            user_note,
            user_explanation,
            key_points: normalize_list(input.key_points),
            tags: normalize_list(input.tags),
            difficulty: input.difficulty.unwrap_or_default(),
            confidence: clamp_confidence(input.confidence.unwrap_or(DEFAULT_CONFIDENCE)),
            is_in_review_system: false,
            review_count: 0,
            last_reviewed_at: None,
            created_at: now,
            updated_at: now,
        };
        let mut entry = self.repo.create(&entry).await?;

        let item = NewReviewItem::new(user_id, ReviewContentType::ErrorNotebook, entry.id)
            .with_subject(entry.subject.clone());
        let added_to_review = match self.reviews.create_review_item(item).await {
            Ok(_) => {
                self.repo.mark_in_review(entry.id).await?;
                entry.is_in_review_system = true;
                true
            }
            Err(e) => {
                tracing::warn!("Failed to add error note {} to review: {}", entry.id, e);
                false
            }
        };

        tracing::info!("User {} added error note {} for question {}", user_id, entry.id, question.id);
        Ok(CreatedErrorNote { entry, added_to_review })
    }

    /// Entry owned by the user
    pub async fn get(&self, user_id: i64, id: i64) -> Result<ErrorNotebookEntry, ErrorNotebookError> {
        let entry = self
            .repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ErrorNotebookError::NotFound(id.to_string()))?;
        if entry.user_id != user_id {
            return Err(ErrorNotebookError::Forbidden(
                "Error note belongs to another user".to_string(),
            ));
        }
        Ok(entry)
    }

    pub async fn list(
        &self,
        user_id: i64,
        mut filter: ErrorNotebookFilter,
    ) -> Result<ErrorNotebookPage, ErrorNotebookError> {
        filter.limit = filter.limit.clamp(1, 100);
        filter.page = filter.page.max(1);
        filter.tags = normalize_list(filter.tags);

        let (entries, total) = self.repo.list(user_id, &filter).await?;
        let seen = (filter.page as i64 - 1) * filter.limit as i64 + entries.len() as i64;
        Ok(ErrorNotebookPage {
            has_more: seen < total,
            entries,
            total,
        })
    }

    pub async fn prepare_for_review(&self, user_id: i64, id: i64) -> Result<ErrorNoteReviewData, ErrorNotebookError> {
        let entry = self.get(user_id, id).await?;
        let review_prompt = review_prompt(&entry);
        Ok(ErrorNoteReviewData {
            entry_id: entry.id,
            question_context: QuestionContext {
                statement: entry.question_statement,
                correct_answer: entry.correct_answer,
                subject: entry.subject,
            },
            user_content: UserContent {
                note: entry.user_note,
                explanation: entry.user_explanation,
                key_points: entry.key_points,
            },
            review_prompt,
        })
    }

    /// Record a review with a client grade in 0..=3.
    ///
    /// Entries left out of the review system at creation are registered
    /// on their first review.
    pub async fn record_review(
        &self,
        user_id: i64,
        id: i64,
        grade: i64,
        review_time_ms: i64,
    ) -> Result<ReviewOutcome, ErrorNotebookError> {
        if !(0..=3).contains(&grade) {
            return Err(ErrorNotebookError::ValidationError(format!(
                "Grade must be between 0 and 3, got {}",
                grade
            )));
        }
        let entry = self.get(user_id, id).await?;

        if !entry.is_in_review_system {
            let item = NewReviewItem::new(user_id, ReviewContentType::ErrorNotebook, entry.id)
                .with_subject(entry.subject.clone());
            self.reviews.create_review_item(item).await?;
            self.repo.mark_in_review(entry.id).await?;
        }

        let now = Utc::now();
        let outcome = self
            .reviews
            .record(user_id, ReviewContentType::ErrorNotebook, entry.id, grade, review_time_ms, now)
            .await?;
        self.repo.record_review(entry.id, now).await?;
        Ok(outcome)
    }

    pub async fn update(
        &self,
        user_id: i64,
        id: i64,
        input: UpdateErrorNotebookInput,
    ) -> Result<ErrorNotebookEntry, ErrorNotebookError> {
        let mut entry = self.get(user_id, id).await?;

        if let Some(note) = input.user_note {
            entry.user_note = required(&note, "user_note")?;
        }
        if let Some(explanation) = input.user_explanation {
            entry.user_explanation = required(&explanation, "user_explanation")?;
        }
        if let Some(key_points) = input.key_points {
            entry.key_points = normalize_list(key_points);
        }
        if let Some(tags) = input.tags {
            entry.tags = normalize_list(tags);
        }
        if let Some(difficulty) = input.difficulty {
            entry.difficulty = difficulty;
        }
        if let Some(confidence) = input.confidence {
            entry.confidence = clamp_confidence(confidence);
        }
        entry.updated_at = Utc::now();

        Ok(self.repo.update(&entry).await?)
    }

    pub async fn delete(&self, user_id: i64, id: i64) -> Result<(), ErrorNotebookError> {
        let entry = self.get(user_id, id).await?;
        self.repo.delete(entry.id).await?;
        self.reviews
            .remove_content(ReviewContentType::ErrorNotebook, entry.id)
            .await?;
        Ok(())
    }

    pub async fn stats(&self, user_id: i64) -> Result<ErrorNotebookStats, ErrorNotebookError> {
        let entries = self.repo.list_all(user_id).await?;
        Ok(compute_stats(&entries))
    }
}

fn required(value: &str, field: &str) -> Result<String, ErrorNotebookError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ErrorNotebookError::ValidationError(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn clamp_confidence(value: i32) -> i32 {
    value.clamp(1, 5)
}

fn review_prompt(entry: &ErrorNotebookEntry) -> String {
    let subject = entry.subject.as_deref().unwrap_or(NO_SUBJECT);
    let mut prompt = format!(
        "Revise sua anotação sobre {}.\n\n**Questão:** {}\n\n**Resposta correta:** {}\n\n**Sua anotação:** {}\n\n**Sua explicação:** {}",
        subject,
        entry.question_statement,
        entry.correct_answer.as_deref().unwrap_or("-"),
        entry.user_note,
        entry.user_explanation,
    );
    if !entry.key_points.is_empty() {
        prompt.push_str(&format!("\n\n**Pontos-chave:** {}", entry.key_points.join(", ")));
    }
    prompt.push_str("\n\nAvalie seu entendimento atual sobre este tópico.");
    prompt
}

fn compute_stats(entries: &[ErrorNotebookEntry]) -> ErrorNotebookStats {
    let mut stats = ErrorNotebookStats {
        total: entries.len() as i64,
        ..ErrorNotebookStats::default()
    };
    if entries.is_empty() {
        return stats;
    }

    let mut confidence_sum = 0i64;
    for entry in entries {
        if entry.is_in_review_system {
            stats.in_review_system += 1;
        }
        *stats
            .by_difficulty
            .entry(entry.difficulty.as_str().to_string())
            .or_default() += 1;
        let subject = entry
            .subject
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(NO_SUBJECT);
        *stats.by_subject.entry(subject.to_string()).or_default() += 1;
        confidence_sum += entry.confidence as i64;
        stats.last_entry_at = stats.last_entry_at.max(Some(entry.created_at));
    }

    let average = confidence_sum as f64 / entries.len() as f64;
    stats.average_confidence = (average * 100.0).round() / 100.0;
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::question::tests::sample_question;
    use crate::db::repositories::test_support::{insert_user, migrated_pool};
    use crate::db::repositories::{SqlxErrorNotebookRepository, SqlxQuestionRepository};
    use crate::models::{Difficulty, Question};
    use crate::services::unified_review::tests::review_service;

    struct Fixture {
        service: ErrorNotebookService,
        reviews: Arc<UnifiedReviewService>,
        user: i64,
        other: i64,
        question: Question,
    }

    async fn setup() -> Fixture {
        let pool = migrated_pool().await;
        let user = insert_user(&pool, "interna").await;
        let other = insert_user(&pool, "outra").await;
        let questions = SqlxQuestionRepository::boxed(pool.clone());
        let question = questions
            .create(&sample_question(user, "Nefrologia"))
            .await
            .unwrap();
        let reviews = Arc::new(review_service(&pool).await);
        let service = ErrorNotebookService::new(
            SqlxErrorNotebookRepository::boxed(pool.clone()),
            questions,
            reviews.clone(),
        );
        Fixture {
            service,
            reviews,
            user,
            other,
            question,
        }
    }

    #[tokio::test]
    async fn test_create_copies_question_and_joins_review() {
        let f = setup().await;

        let created = f
            .service
            .create(
                f.user,
                CreateErrorNotebookInput::new(f.question.id, "  confundi  ", " acidose vs alcalose ")
                    .with_confidence(9)
                    .with_key_points(vec!["anion gap".into(), " ".into()]),
            )
            .await
            .unwrap();

        assert!(created.added_to_review);
        let entry = created.entry;
        assert!(entry.is_in_review_system);
        assert_eq!(entry.user_note, "confundi");
        assert_eq!(entry.user_explanation, "acidose vs alcalose");
        assert_eq!(entry.confidence, 5);
        assert_eq!(entry.key_points, vec!["anion gap"]);
        assert_eq!(entry.difficulty, Difficulty::Medium);
        assert_eq!(entry.subject.as_deref(), Some("Nefrologia"));
        assert_eq!(entry.correct_answer.as_deref(), Some("B) Opcao B"));

        let card = f
            .reviews
            .get_item(f.user, ReviewContentType::ErrorNotebook, entry.id)
            .await
            .unwrap();
        assert!(card.is_some());
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let f = setup().await;

        let err = f
            .service
            .create(f.user, CreateErrorNotebookInput::new(f.question.id, "   ", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ErrorNotebookError::ValidationError(_)));

        let err = f
            .service
            .create(f.user, CreateErrorNotebookInput::new(999, "nota", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ErrorNotebookError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_ownership_and_review() {
        let f = setup().await;
        let entry = f
            .service
            .create(f.user, CreateErrorNotebookInput::new(f.question.id, "nota", "explicacao"))
            .await
            .unwrap()
            .entry;

        let err = f.service.prepare_for_review(f.other, entry.id).await.unwrap_err();
        assert!(matches!(err, ErrorNotebookError::Forbidden(_)));

        let data = f.service.prepare_for_review(f.user, entry.id).await.unwrap();
        assert!(data.review_prompt.contains("Nefrologia"));

        let err = f.service.record_review(f.user, entry.id, 5, 0).await.unwrap_err();
        assert!(matches!(err, ErrorNotebookError::ValidationError(_)));

        f.service.record_review(f.user, entry.id, 2, 1000).await.unwrap();
        let reviewed = f.service.get(f.user, entry.id).await.unwrap();
        assert_eq!(reviewed.review_count, 1);
        assert!(reviewed.last_reviewed_at.is_some());
    }

    #[tokio::test]
    async fn test_list_update_delete_and_stats() {
        let f = setup().await;
        for i in 0..3 {
            f.service
                .create(
                    f.user,
                    CreateErrorNotebookInput::new(f.question.id, format!("nota {}", i), "explicacao")
                        .with_confidence(i + 1),
                )
                .await
                .unwrap();
        }

        let page = f
            .service
            .list(
                f.user,
                ErrorNotebookFilter {
                    limit: 2,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.total, 3);
        assert!(page.has_more);

        let target = page.entries[0].id;
        let updated = f
            .service
            .update(
                f.user,
                target,
                UpdateErrorNotebookInput {
                    user_note: Some("  revisada ".into()),
                    confidence: Some(0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.user_note, "revisada");
        assert_eq!(updated.confidence, 1);

        let stats = f.service.stats(f.user).await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.in_review_system, 3);
        assert_eq!(stats.by_subject.get("Nefrologia"), Some(&3));
        assert!(stats.last_entry_at.is_some());

        f.service.delete(f.user, target).await.unwrap();
        assert!(matches!(
            f.service.get(f.user, target).await.unwrap_err(),
            ErrorNotebookError::NotFound(_)
        ));
        assert!(f
            .reviews
            .get_item(f.user, ReviewContentType::ErrorNotebook, target)
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_stats_default_subject() {
        let now = Utc::now();
        let entry = ErrorNotebookEntry {
            id: 1,
            user_id: 1,
            question_id: 1,
            question_statement: "q".into(),
            correct_answer: None,
            subject: None,
            user_note: "n".into(),
            user_explanation: "e".into(),
            key_points: vec![],
            tags: vec![],
            difficulty: Difficulty::Hard,
            confidence: 4,
            is_in_review_system: false,
            review_count: 0,
            last_reviewed_at: None,
            created_at: now,
            updated_at: now,
        };
        let mut second = entry.clone();
        second.confidence = 1;

        let stats = compute_stats(&[entry, second]);
        assert_eq!(stats.by_subject.get(NO_SUBJECT), Some(&2));
        assert_eq!(stats.by_difficulty.get("HARD"), Some(&2));
        assert_eq!(stats.average_confidence, 2.5);
        assert_eq!(stats.in_review_system, 0);
    }
}
