//! Planner service
//!
//! The calendar is the user's manual tasks plus one generated review task
//! per day and content type that has items due.

use crate::db::repositories::PlannerRepository;
use crate::models::{
    CreatePlannerTaskInput, FsrsCard, PlannerTask, ReviewContentType, TaskPriority, TaskSource, TaskStatus,
    TaskType, UpdatePlannerTaskInput,
};
use crate::services::deck::non_empty;
use crate::services::unified_review::{UnifiedReviewError, UnifiedReviewService};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Widest calendar window served in one request
const MAX_RANGE_DAYS: i64 = 366;
const MAX_TITLE_LENGTH: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum PlannerServiceError {
    #[error("Task not found: {0}")]
    NotFound(i64),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<UnifiedReviewError> for PlannerServiceError {
    fn from(err: UnifiedReviewError) -> Self {
        match err {
            UnifiedReviewError::ValidationError(msg) => PlannerServiceError::ValidationError(msg),
            other => PlannerServiceError::InternalError(other.into()),
        }
    }
}

pub struct PlannerService {
    repo: Arc<dyn PlannerRepository>,
    reviews: Arc<UnifiedReviewService>,
}

impl PlannerService {
    pub fn new(repo: Arc<dyn PlannerRepository>, reviews: Arc<UnifiedReviewService>) -> Self {
        Self { repo, reviews }
    }

    pub async fn create(
        &self,
        user_id: i64,
        input: CreatePlannerTaskInput,
    ) -> Result<PlannerTask, PlannerServiceError> {
        let now = Utc::now();
        let task = PlannerTask {
            id: None,
            user_id,
            title: validate_title(&input.title)?,
            description: non_empty(input.description),
            scheduled_date: input.scheduled_date,
            task_type: TaskType::Manual,
            status: TaskStatus::Pending,
            priority: input.priority.unwrap_or_default(),
            source: TaskSource::User,
            manual_type: non_empty(input.manual_type),
            target_url: non_empty(input.target_url),
            metadata: input.metadata,
            created_at: now,
            updated_at: now,
        };
        Ok(self.repo.create(&task).await?)
    }

    pub async fn update(
        &self,
        user_id: i64,
        id: i64,
        input: UpdatePlannerTaskInput,
    ) -> Result<PlannerTask, PlannerServiceError> {
        let mut task = self.owned(user_id, id).await?;

        if let Some(title) = input.title {
            task.title = validate_title(&title)?;
        }
        if let Some(description) = input.description {
            task.description = non_empty(description);
        }
        if let Some(date) = input.scheduled_date {
            task.scheduled_date = date;
        }
        if let Some(status) = input.status {
            task.status = status;
        }
        if let Some(priority) = input.priority {
            task.priority = priority;
        }
        if let Some(manual_type) = input.manual_type {
            task.manual_type = non_empty(manual_type);
        }
        if let Some(target_url) = input.target_url {
            task.target_url = non_empty(target_url);
        }
        if let Some(metadata) = input.metadata {
            task.metadata = metadata;
        }
        task.updated_at = Utc::now();

        Ok(self.repo.update(&task).await?)
    }

    pub async fn delete(&self, user_id: i64, id: i64) -> Result<(), PlannerServiceError> {
        let task = self.owned(user_id, id).await?;
        self.repo.delete(id).await?;
        tracing::debug!("User {} deleted planner task {:?}", user_id, task.id);
        Ok(())
    }

    /// Manual tasks only, scheduled in `[start, end)`
    pub async fn list_manual(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PlannerTask>, PlannerServiceError> {
        validate_range(start, end)?;
        Ok(self.repo.list_between(user_id, start, end).await?)
    }

    /// Manual and generated review tasks in `[start, end)`, by date
    pub async fn get_planner_tasks(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PlannerTask>, PlannerServiceError> {
        validate_range(start, end)?;
        let due = self.reviews.due_between(user_id, start, end).await?;
        let mut tasks = review_tasks(user_id, &due, Utc::now());
        tasks.extend(self.repo.list_between(user_id, start, end).await?);
        tasks.sort_by_key(|t| t.scheduled_date);
        Ok(tasks)
    }

    async fn owned(&self, user_id: i64, id: i64) -> Result<PlannerTask, PlannerServiceError> {
        let task = self
            .repo
            .get_by_id(id)
            .await?
            .ok_or(PlannerServiceError::NotFound(id))?;
        if task.user_id != user_id {
            return Err(PlannerServiceError::Forbidden(
                "Task belongs to another user".to_string(),
            ));
        }
        Ok(task)
    }
}

fn validate_title(title: &str) -> Result<String, PlannerServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(PlannerServiceError::ValidationError("Title is required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(PlannerServiceError::ValidationError(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(title.to_string())
}

fn validate_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), PlannerServiceError> {
    if end <= start {
        return Err(PlannerServiceError::ValidationError(
            "end must be after start".to_string(),
        ));
    }
    if (end - start).num_days() > MAX_RANGE_DAYS {
        return Err(PlannerServiceError::ValidationError(format!(
            "Range cannot exceed {} days",
            MAX_RANGE_DAYS
        )));
    }
    Ok(())
}

/// Hour of the day a generated review task is placed at
fn review_hour(content_type: ReviewContentType) -> Option<u32> {
    match content_type {
        ReviewContentType::Flashcard => Some(9),
        ReviewContentType::Question => Some(10),
        ReviewContentType::ErrorNotebook => None,
    }
}

fn review_title(content_type: ReviewContentType, count: usize) -> String {
    match content_type {
        ReviewContentType::Question => format!("{} Questões para revisar", count),
        _ => format!("{} Flashcards para revisar", count),
    }
}

/// Group due cards by day and type into calendar tasks
fn review_tasks(user_id: i64, due: &[FsrsCard], now: DateTime<Utc>) -> Vec<PlannerTask> {
    let mut groups: BTreeMap<(NaiveDate, u32), (ReviewContentType, Vec<i64>)> = BTreeMap::new();
    for card in due {
        let Some(hour) = review_hour(card.content_type) else {
            continue;
        };
        groups
            .entry((card.due.date_naive(), hour))
            .or_insert_with(|| (card.content_type, Vec::new()))
            .1
            .push(card.id);
    }

    groups
        .into_iter()
        .filter_map(|((date, hour), (content_type, ids))| {
            let time = NaiveTime::from_hms_opt(hour, 0, 0)?;
            Some(PlannerTask {
                id: None,
                user_id,
                title: review_title(content_type, ids.len()),
                description: None,
                scheduled_date: date.and_time(time).and_utc(),
                task_type: TaskType::FsrsReview,
                status: TaskStatus::Pending,
                priority: TaskPriority::High,
                source: TaskSource::UnifiedReview,
                manual_type: None,
                target_url: Some(format!(
                    "/reviews?type={}&date={}",
                    content_type.as_str().to_lowercase(),
                    date
                )),
                metadata: Some(json!({
                    "content_type": content_type,
                    "count": ids.len(),
                    "review_ids": ids,
                })),
                created_at: now,
                updated_at: now,
            })
        })
        .collect()
}
