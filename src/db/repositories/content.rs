//! Content repository
//!
//! Database operations for published study material (articles, guides,
//! clinical summaries).

use super::{contains_pattern, tag_pattern, Conditions, DbRow, InsertId, SqlArg};
use crate::db::DynDatabasePool;
use crate::models::{encode_string_list, Content, ContentFilter, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

const CONTENT_COLUMNS: &str = "id, slug, title, body, body_html, summary, category_id, tags, author_id, status, \
     published_at, view_count, like_count, comment_count, created_at, updated_at";

/// Content repository trait
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Insert a prepared content row; `id` and counters on the argument are ignored
    async fn create(&self, content: &Content) -> Result<Content>;

    /// Get content by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Content>>;

    /// Get content by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Content>>;

    /// Filtered page, newest first, plus the total match count
    async fn list(&self, filter: &ContentFilter, params: &ListParams) -> Result<(Vec<Content>, i64)>;

    /// Persist editable fields
    async fn update(&self, content: &Content) -> Result<Content>;

    /// Delete a content and its comments
    async fn delete(&self, id: i64) -> Result<()>;

    /// Whether a slug is taken, optionally ignoring one content
    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// Bump the view counter
    async fn increment_views(&self, id: i64) -> Result<()>;

    /// Add `delta` to the like counter, never going below zero
    async fn adjust_like_count(&self, id: i64, delta: i64) -> Result<()>;

    /// Add `delta` to the comment counter, never going below zero
    async fn adjust_comment_count(&self, id: i64, delta: i64) -> Result<()>;
}

/// SQLx-based content repository implementation
pub struct SqlxContentRepository {
    pool: DynDatabasePool,
}

impl SqlxContentRepository {
    /// Create a new SQLx content repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ContentRepository> {
        Arc::new(Self::new(pool))
    }

    async fn adjust_counter(&self, column: &str, id: i64, delta: i64) -> Result<()> {
        let sql = format!(
            "UPDATE contents SET {col} = CASE WHEN {col} + ? < 0 THEN 0 ELSE {col} + ? END WHERE id = ?",
            col = column
        );
        on_pool!(self.pool, |pool, Db| {
            sqlx::query(&sql)
                .bind(delta)
                .bind(delta)
                .bind(id)
                .execute(pool)
                .await
                .with_context(|| format!("Failed to update {}", column))?;
        });
        Ok(())
    }
}

fn filter_conditions(filter: &ContentFilter) -> Conditions {
    let mut conditions = Conditions::new();
    if let Some(status) = filter.status {
        conditions.push("status = ?", [SqlArg::Text(status.as_str().to_string())]);
    }
    if let Some(category_id) = filter.category_id {
        conditions.push("category_id = ?", [SqlArg::Int(category_id)]);
    }
    if !filter.category_ids.is_empty() {
        let placeholders = vec!["?"; filter.category_ids.len()].join(", ");
        conditions.push(
            format!("category_id IN ({})", placeholders),
            filter.category_ids.iter().map(|id| SqlArg::Int(*id)),
        );
    }
    if let Some(author_id) = filter.author_id {
        conditions.push("author_id = ?", [SqlArg::Int(author_id)]);
    }
    if let Some(tag) = filter.tag.as_deref().filter(|t| !t.trim().is_empty()) {
        conditions.push("tags LIKE ?", [SqlArg::Text(tag_pattern(tag.trim()))]);
    }
    if let Some(query) = filter.query.as_deref().filter(|q| !q.trim().is_empty()) {
        let pattern = contains_pattern(&query.to_lowercase());
        conditions.push(
            "(LOWER(title) LIKE ? OR LOWER(body) LIKE ?)",
            [SqlArg::Text(pattern.clone()), SqlArg::Text(pattern)],
        );
    }
    conditions
}

#[async_trait]
impl ContentRepository for SqlxContentRepository {
    async fn create(&self, content: &Content) -> Result<Content> {
        let now = Utc::now();
        let id = on_pool!(self.pool, |pool, Db| {
            sqlx::query(
                r#"
                INSERT INTO contents (slug, title, body, body_html, summary, category_id, tags, author_id,
                                      status, published_at, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&content.slug)
            .bind(&content.title)
            .bind(&content.body)
            .bind(&content.body_html)
            .bind(&content.summary)
            .bind(content.category_id)
            .bind(encode_string_list(&content.tags))
            .bind(content.author_id)
            .bind(content.status.as_str())
            .bind(content.published_at)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create content")?
            .insert_id()
        });

        self.get_by_id(id)
            .await?
            .context("Failed to fetch created content")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Content>> {
        on_pool!(self.pool, |pool, Db| {
            let sql = format!("SELECT {} FROM contents WHERE id = ?", CONTENT_COLUMNS);
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get content by ID")?;
            row.as_ref().map(row_to_content).transpose()
        })
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Content>> {
        on_pool!(self.pool, |pool, Db| {
            let sql = format!("SELECT {} FROM contents WHERE slug = ?", CONTENT_COLUMNS);
            let row = sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(pool)
                .await
                .context("Failed to get content by slug")?;
            row.as_ref().map(row_to_content).transpose()
        })
    }

    async fn list(&self, filter: &ContentFilter, params: &ListParams) -> Result<(Vec<Content>, i64)> {
        let conditions = filter_conditions(filter);
        let count_sql = format!("SELECT COUNT(*) AS count FROM contents {}", conditions.where_sql());
        let list_sql = format!(
            "SELECT {} FROM contents {} ORDER BY COALESCE(published_at, created_at) DESC, id DESC LIMIT ? OFFSET ?",
            CONTENT_COLUMNS,
            conditions.where_sql()
        );

        on_pool!(self.pool, |pool, Db| {
            let total = bind_args!(sqlx::query::<Db>(&count_sql), conditions.args)
                .fetch_one(pool)
                .await
                .context("Failed to count contents")?
                .int("count")?;

            let rows = bind_args!(sqlx::query::<Db>(&list_sql), conditions.args)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
                .context("Failed to list contents")?;

            let items = rows.iter().map(row_to_content).collect::<Result<Vec<_>>>()?;
            Ok((items, total))
        })
    }

    async fn update(&self, content: &Content) -> Result<Content> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query(
                r#"
                UPDATE contents
                SET slug = ?, title = ?, body = ?, body_html = ?, summary = ?, category_id = ?, tags = ?,
                    status = ?, published_at = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&content.slug)
            .bind(&content.title)
            .bind(&content.body)
            .bind(&content.body_html)
            .bind(&content.summary)
            .bind(content.category_id)
            .bind(encode_string_list(&content.tags))
            .bind(content.status.as_str())
            .bind(content.published_at)
            .bind(Utc::now())
            .bind(content.id)
            .execute(pool)
            .await
            .context("Failed to update content")?;
        });

        self.get_by_id(content.id)
            .await?
            .context("Failed to fetch updated content")
    }

    async fn delete(&self, id: i64) -> Result<()> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query("DELETE FROM contents WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete content")?;
        });
        Ok(())
    }

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        on_pool!(self.pool, |pool, Db| {
            let row = sqlx::query("SELECT COUNT(*) AS count FROM contents WHERE slug = ? AND id <> ?")
                .bind(slug)
                .bind(exclude_id.unwrap_or(0))
                .fetch_one(pool)
                .await
                .context("Failed to check content slug")?;
            Ok(row.int("count")? > 0)
        })
    }

    async fn increment_views(&self, id: i64) -> Result<()> {
        self.adjust_counter("view_count", id, 1).await
    }

    async fn adjust_like_count(&self, id: i64, delta: i64) -> Result<()> {
        self.adjust_counter("like_count", id, delta).await
    }

    async fn adjust_comment_count(&self, id: i64, delta: i64) -> Result<()> {
        self.adjust_counter("comment_count", id, delta).await
    }
}

fn row_to_content(row: &impl DbRow) -> Result<Content> {
    Ok(Content {
        id: row.int("id")?,
        slug: row.text("slug")?,
        title: row.text("title")?,
        body: row.text("body")?,
        body_html: row.text("body_html")?,
        summary: row.opt_text("summary")?,
        category_id: row.opt_int("category_id")?,
        tags: row.list("tags")?,
        author_id: row.int("author_id")?,
        status: row.parsed("status")?,
        published_at: row.opt_time("published_at")?,
        view_count: row.int("view_count")?,
        like_count: row.int("like_count")?,
        comment_count: row.int("comment_count")?,
        created_at: row.time("created_at")?,
        updated_at: row.time("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, migrated_pool};
    use crate::models::ContentStatus;

    fn content(author_id: i64, slug: &str, status: ContentStatus, tags: &[&str]) -> Content {
        let now = Utc::now();
        Content {
            id: 0,
            slug: slug.to_string(),
            title: format!("Titulo {}", slug),
            body: format!("Corpo sobre {}", slug),
            body_html: format!("<p>Corpo sobre {}</p>", slug),
            summary: None,
            category_id: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            author_id,
            status,
            published_at: (status == ContentStatus::Published).then_some(now),
            view_count: 0,
            like_count: 0,
            comment_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    async fn setup_test_repo() -> (SqlxContentRepository, i64) {
        let pool = migrated_pool().await;
        let author = insert_user(&pool, "autor").await;
        (SqlxContentRepository::new(pool), author)
    }

    #[tokio::test]
    async fn test_create_and_get_by_slug() {
        let (repo, author) = setup_test_repo().await;

        let created = repo
            .create(&content(author, "sepse", ContentStatus::Published, &["infecto"]))
            .await
            .expect("Failed to create content");
        let found = repo.get_by_slug("sepse").await.unwrap().expect("Content not found");

        assert_eq!(found.id, created.id);
        assert_eq!(found.tags, vec!["infecto"]);
        assert!(found.is_published());
    }

    #[tokio::test]
    async fn test_list_filters() {
        let (repo, author) = setup_test_repo().await;
        repo.create(&content(author, "iam", ContentStatus::Published, &["cardio"])).await.unwrap();
        repo.create(&content(author, "icc", ContentStatus::Published, &["cardio", "clinica"])).await.unwrap();
        repo.create(&content(author, "rascunho", ContentStatus::Draft, &["cardio"])).await.unwrap();

        let published = ContentFilter {
            status: Some(ContentStatus::Published),
            ..Default::default()
        };
        let (items, total) = repo.list(&published, &ListParams::new(1, 10)).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(items.len(), 2);

        let tagged = ContentFilter {
            tag: Some("clinica".into()),
            ..Default::default()
        };
        let (items, _) = repo.list(&tagged, &ListParams::default()).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].slug, "icc");

        let search = ContentFilter {
            query: Some("RASCUNHO".into()),
            ..Default::default()
        };
        let (_, total) = repo.list(&search, &ListParams::default()).await.unwrap();
        assert_eq!(total, 1);

        let uncategorized = ContentFilter {
            category_ids: vec![41, 42],
            ..Default::default()
        };
        let (_, total) = repo.list(&uncategorized, &ListParams::default()).await.unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_counters_never_go_negative() {
        let (repo, author) = setup_test_repo().await;
        let created = repo.create(&content(author, "dpoc", ContentStatus::Published, &[])).await.unwrap();

        repo.increment_views(created.id).await.unwrap();
        repo.adjust_like_count(created.id, 1).await.unwrap();
        repo.adjust_comment_count(created.id, -3).await.unwrap();

        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.view_count, 1);
        assert_eq!(found.like_count, 1);
        assert_eq!(found.comment_count, 0);
    }

    #[tokio::test]
    async fn test_slug_exists() {
        let (repo, author) = setup_test_repo().await;
        let created = repo.create(&content(author, "asma", ContentStatus::Draft, &[])).await.unwrap();

        assert!(repo.slug_exists("asma", None).await.unwrap());
        assert!(!repo.slug_exists("asma", Some(created.id)).await.unwrap());
        assert!(!repo.slug_exists("outra", None).await.unwrap());
    }
}
