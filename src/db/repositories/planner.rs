//! Planner repository
//!
//! Only manual tasks are stored; review tasks are generated by the service.

use super::{DbRow, InsertId};
use crate::db::DynDatabasePool;
use crate::models::PlannerTask;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

const TASK_COLUMNS: &str = "id, user_id, title, description, scheduled_date, task_type, status, priority, source, \
     manual_type, target_url, metadata, created_at, updated_at";

/// Planner repository trait
#[async_trait]
pub trait PlannerRepository: Send + Sync {
    /// Insert a task; `id` and timestamps on the argument are ignored
    async fn create(&self, task: &PlannerTask) -> Result<PlannerTask>;

    /// Get task by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<PlannerTask>>;

    /// A user's tasks scheduled in `[start, end)`, earliest first
    async fn list_between(&self, user_id: i64, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<PlannerTask>>;

    /// Persist editable fields
    async fn update(&self, task: &PlannerTask) -> Result<PlannerTask>;

    /// Delete a task
    async fn delete(&self, id: i64) -> Result<()>;
}

/// SQLx-based planner repository implementation
pub struct SqlxPlannerRepository {
    pool: DynDatabasePool,
}

impl SqlxPlannerRepository {
    /// Create a new SQLx planner repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PlannerRepository> {
        Arc::new(Self::new(pool))
    }
}

fn encode_metadata(metadata: &Option<serde_json::Value>) -> Option<String> {
    metadata.as_ref().map(|value| value.to_string())
}

#[async_trait]
impl PlannerRepository for SqlxPlannerRepository {
    async fn create(&self, task: &PlannerTask) -> Result<PlannerTask> {
        let now = Utc::now();
        let id = on_pool!(self.pool, |pool, Db| {
            sqlx::query(
                r#"
                INSERT INTO planner_tasks (user_id, title, description, scheduled_date, task_type, status, priority,
                                           source, manual_type, target_url, metadata, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(task.user_id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.scheduled_date)
            .bind(task.task_type.as_str())
            .bind(task.status.as_str())
            .bind(task.priority.as_str())
            .bind(task.source.as_str())
            .bind(&task.manual_type)
            .bind(&task.target_url)
            .bind(encode_metadata(&task.metadata))
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create planner task")?
            .insert_id()
        });

        self.get_by_id(id)
            .await?
            .context("Failed to fetch created planner task")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<PlannerTask>> {
        on_pool!(self.pool, |pool, Db| {
            let sql = format!("SELECT {} FROM planner_tasks WHERE id = ?", TASK_COLUMNS);
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get planner task")?;
            row.as_ref().map(row_to_task).transpose()
        })
    }

    async fn list_between(&self, user_id: i64, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<PlannerTask>> {
        on_pool!(self.pool, |pool, Db| {
            let sql = format!(
                "SELECT {} FROM planner_tasks WHERE user_id = ? AND scheduled_date >= ? AND scheduled_date < ? \
                 ORDER BY scheduled_date, id",
                TASK_COLUMNS
            );
            let rows = sqlx::query(&sql)
                .bind(user_id)
                .bind(start)
                .bind(end)
                .fetch_all(pool)
                .await
                .context("Failed to list planner tasks")?;
            rows.iter().map(row_to_task).collect()
        })
    }

    async fn update(&self, task: &PlannerTask) -> Result<PlannerTask> {
        let id = task.id.context("Planner task has no id")?;
        on_pool!(self.pool, |pool, Db| {
            sqlx::query(
                r#"
                UPDATE planner_tasks
                SET title = ?, description = ?, scheduled_date = ?, status = ?, priority = ?, manual_type = ?,
                    target_url = ?, metadata = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.scheduled_date)
            .bind(task.status.as_str())
            .bind(task.priority.as_str())
            .bind(&task.manual_type)
            .bind(&task.target_url)
            .bind(encode_metadata(&task.metadata))
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to update planner task")?;
        });

        self.get_by_id(id)
            .await?
            .context("Failed to fetch updated planner task")
    }

    async fn delete(&self, id: i64) -> Result<()> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query("DELETE FROM planner_tasks WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete planner task")?;
        });
        Ok(())
    }
}

fn row_to_task(row: &impl DbRow) -> Result<PlannerTask> {
    Ok(PlannerTask {
        id: Some(row.int("id")?),
        user_id: row.int("user_id")?,
        title: row.text("title")?,
        description: row.opt_text("description")?,
        scheduled_date: row.time("scheduled_date")?,
        task_type: row.parsed("task_type")?,
        status: row.parsed("status")?,
        priority: row.parsed("priority")?,
        source: row.parsed("source")?,
        manual_type: row.opt_text("manual_type")?,
        target_url: row.opt_text("target_url")?,
        metadata: row
            .opt_text("metadata")?
            .and_then(|raw| serde_json::from_str(&raw).ok()),
        created_at: row.time("created_at")?,
        updated_at: row.time("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, migrated_pool};
    use crate::models::{TaskPriority, TaskSource, TaskStatus, TaskType};
    use chrono::{Duration, TimeZone};

    fn task(user_id: i64, title: &str, at: DateTime<Utc>) -> PlannerTask {
        PlannerTask {
            id: None,
            user_id,
            title: title.to_string(),
            description: None,
            scheduled_date: at,
            task_type: TaskType::Manual,
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            source: TaskSource::User,
            manual_type: Some("LEITURA".into()),
            target_url: None,
            metadata: Some(serde_json::json!({"capitulo": 3})),
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn test_list_between_is_half_open() {
        let pool = migrated_pool().await;
        let user = insert_user(&pool, "planejador").await;
        let repo = SqlxPlannerRepository::new(pool);
        let monday = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();

        repo.create(&task(user, "Ler cardio", monday + Duration::hours(8))).await.unwrap();
        repo.create(&task(user, "Ler pneumo", monday + Duration::days(1))).await.unwrap();

        let day = repo.list_between(user, monday, monday + Duration::days(1)).await.unwrap();
        assert_eq!(day.len(), 1);
        assert_eq!(day[0].title, "Ler cardio");
        assert_eq!(day[0].metadata, Some(serde_json::json!({"capitulo": 3})));
    }

    #[tokio::test]
    async fn test_update_clears_metadata() {
        let pool = migrated_pool().await;
        let user = insert_user(&pool, "planejador").await;
        let repo = SqlxPlannerRepository::new(pool);
        let created = repo.create(&task(user, "Simulado", Utc::now())).await.unwrap();

        let mut edited = created.clone();
        edited.metadata = None;
        edited.status = TaskStatus::Completed;
        let updated = repo.update(&edited).await.unwrap();

        assert_eq!(updated.metadata, None);
        assert_eq!(updated.status, TaskStatus::Completed);
        repo.delete(created.id.unwrap()).await.unwrap();
        assert!(repo.get_by_id(created.id.unwrap()).await.unwrap().is_none());
    }
}
