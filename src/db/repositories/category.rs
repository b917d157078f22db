//! Category repository
//!
//! Database operations for content categories.

use super::{DbRow, InsertId};
use crate::db::DynDatabasePool;
use crate::models::Category;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

const CATEGORY_COLUMNS: &str = "id, slug, name, description, parent_id, sort_order, created_at";

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Create a new category; `id` and `created_at` on the argument are ignored
    async fn create(&self, category: &Category) -> Result<Category>;

    /// Get category by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    /// Get category by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>>;

    /// List all categories (flat list)
    async fn list(&self) -> Result<Vec<Category>>;

    /// Update a category
    async fn update(&self, category: &Category) -> Result<Category>;

    /// Delete a category; children and content are detached
    async fn delete(&self, id: i64) -> Result<()>;

    /// Number of contents filed under a category
    async fn count_contents(&self, id: i64) -> Result<i64>;
}

/// SQLx-based category repository implementation
pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    /// Create a new SQLx category repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, category: &Category) -> Result<Category> {
        let id = on_pool!(self.pool, |pool, Db| {
            sqlx::query(
                r#"
                INSERT INTO categories (slug, name, description, parent_id, sort_order, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&category.slug)
            .bind(&category.name)
            .bind(&category.description)
            .bind(category.parent_id)
            .bind(category.sort_order)
            .bind(Utc::now())
            .execute(pool)
            .await
            .context("Failed to create category")?
            .insert_id()
        });

        self.get_by_id(id)
            .await?
            .context("Failed to fetch created category")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        on_pool!(self.pool, |pool, Db| {
            let sql = format!("SELECT {} FROM categories WHERE id = ?", CATEGORY_COLUMNS);
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get category by ID")?;
            row.as_ref().map(row_to_category).transpose()
        })
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        on_pool!(self.pool, |pool, Db| {
            let sql = format!("SELECT {} FROM categories WHERE slug = ?", CATEGORY_COLUMNS);
            let row = sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(pool)
                .await
                .context("Failed to get category by slug")?;
            row.as_ref().map(row_to_category).transpose()
        })
    }

    async fn list(&self) -> Result<Vec<Category>> {
        on_pool!(self.pool, |pool, Db| {
            let sql = format!("SELECT {} FROM categories ORDER BY sort_order, name", CATEGORY_COLUMNS);
            let rows = sqlx::query(&sql)
                .fetch_all(pool)
                .await
                .context("Failed to list categories")?;
            rows.iter().map(row_to_category).collect()
        })
    }

    async fn update(&self, category: &Category) -> Result<Category> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query(
                r#"
                UPDATE categories
                SET slug = ?, name = ?, description = ?, parent_id = ?, sort_order = ?
                WHERE id = ?
                "#,
            )
            .bind(&category.slug)
            .bind(&category.name)
            .bind(&category.description)
            .bind(category.parent_id)
            .bind(category.sort_order)
            .bind(category.id)
            .execute(pool)
            .await
            .context("Failed to update category")?;
        });

        self.get_by_id(category.id)
            .await?
            .context("Failed to fetch updated category")
    }

    async fn delete(&self, id: i64) -> Result<()> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query("DELETE FROM categories WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete category")?;
        });
        Ok(())
    }

    async fn count_contents(&self, id: i64) -> Result<i64> {
        on_pool!(self.pool, |pool, Db| {
            let row = sqlx::query("SELECT COUNT(*) AS count FROM contents WHERE category_id = ?")
                .bind(id)
                .fetch_one(pool)
                .await
                .context("Failed to count category contents")?;
            row.int("count")
        })
    }
}

fn row_to_category(row: &impl DbRow) -> Result<Category> {
    Ok(Category {
        id: row.int("id")?,
        slug: row.text("slug")?,
        name: row.text("name")?,
        description: row.opt_text("description")?,
        parent_id: row.opt_int("parent_id")?,
        sort_order: row.small("sort_order")?,
        created_at: row.time("created_at")?,
    })
}
