//! User repository
//!
//! Database operations for user accounts.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use super::{DbRow, InsertId};
use crate::db::DynDatabasePool;
use crate::models::{CreateUserInput, User, UserRole, UserStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

const USER_COLUMNS: &str =
    "id, username, email, password_hash, display_name, role, status, created_at, updated_at";

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, input: &CreateUserInput) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by username (case-insensitive)
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Get user by email (case-insensitive)
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Update display name, email, role and status
    async fn update(&self, user: &User) -> Result<User>;

    /// Replace the password hash
    async fn update_password(&self, id: i64, password_hash: &str) -> Result<()>;

    /// Delete a user and everything they own
    async fn delete(&self, id: i64) -> Result<()>;

    /// Count all users
    async fn count(&self) -> Result<i64>;

    /// List users with pagination, newest first
    async fn list(&self, page: i64, per_page: i64) -> Result<(Vec<User>, i64)>;

    /// Users holding a given role
    async fn list_by_role(&self, role: UserRole) -> Result<Vec<User>>;
}

/// SQLx-based user repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, input: &CreateUserInput) -> Result<User> {
        let now = Utc::now();
        let id = on_pool!(self.pool, |pool, Db| {
            sqlx::query(
                r#"
                INSERT INTO users (username, email, password_hash, display_name, role, status, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&input.username)
            .bind(&input.email)
            .bind(&input.password_hash)
            .bind(&input.display_name)
            .bind(input.role.as_str())
            .bind(UserStatus::Active.as_str())
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create user")?
            .insert_id()
        });

        self.get_by_id(id)
            .await?
            .context("Failed to fetch created user")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        on_pool!(self.pool, |pool, Db| {
            let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get user by ID")?;
            row.as_ref().map(row_to_user).transpose()
        })
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        on_pool!(self.pool, |pool, Db| {
            let sql = format!("SELECT {} FROM users WHERE LOWER(username) = LOWER(?)", USER_COLUMNS);
            let row = sqlx::query(&sql)
                .bind(username)
                .fetch_optional(pool)
                .await
                .context("Failed to get user by username")?;
            row.as_ref().map(row_to_user).transpose()
        })
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        on_pool!(self.pool, |pool, Db| {
            let sql = format!("SELECT {} FROM users WHERE LOWER(email) = LOWER(?)", USER_COLUMNS);
            let row = sqlx::query(&sql)
                .bind(email)
                .fetch_optional(pool)
                .await
                .context("Failed to get user by email")?;
            row.as_ref().map(row_to_user).transpose()
        })
    }

    async fn update(&self, user: &User) -> Result<User> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query(
                r#"
                UPDATE users
                SET email = ?, display_name = ?, role = ?, status = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&user.email)
            .bind(&user.display_name)
            .bind(user.role.as_str())
            .bind(user.status.as_str())
            .bind(Utc::now())
            .bind(user.id)
            .execute(pool)
            .await
            .context("Failed to update user")?;
        });

        self.get_by_id(user.id)
            .await?
            .context("Failed to fetch updated user")
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<()> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
                .bind(password_hash)
                .bind(Utc::now())
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to update password")?;
        });
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete user")?;
        });
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        on_pool!(self.pool, |pool, Db| {
            let row = sqlx::query("SELECT COUNT(*) AS count FROM users")
                .fetch_one(pool)
                .await
                .context("Failed to count users")?;
            row.int("count")
        })
    }

    async fn list(&self, page: i64, per_page: i64) -> Result<(Vec<User>, i64)> {
        let offset = (page.max(1) - 1) * per_page;
        let total = self.count().await?;

        let users = on_pool!(self.pool, |pool, Db| {
            let sql = format!(
                "SELECT {} FROM users ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
                USER_COLUMNS
            );
            let rows = sqlx::query(&sql)
                .bind(per_page)
                .bind(offset)
                .fetch_all(pool)
                .await
                .context("Failed to list users")?;
            rows.iter().map(row_to_user).collect::<Result<Vec<_>>>()?
        });

        Ok((users, total))
    }

    async fn list_by_role(&self, role: UserRole) -> Result<Vec<User>> {
        on_pool!(self.pool, |pool, Db| {
            let sql = format!("SELECT {} FROM users WHERE role = ? ORDER BY username", USER_COLUMNS);
            let rows = sqlx::query(&sql)
                .bind(role.as_str())
                .fetch_all(pool)
                .await
                .context("Failed to list users by role")?;
            rows.iter().map(row_to_user).collect()
        })
    }
}

fn row_to_user(row: &impl DbRow) -> Result<User> {
    Ok(User {
        id: row.int("id")?,
        username: row.text("username")?,
        email: row.text("email")?,
        password_hash: row.text("password_hash")?,
        display_name: row.opt_text("display_name")?,
        role: row.parsed("role")?,
        status: row.parsed("status")?,
        created_at: row.time("created_at")?,
        updated_at: row.time("updated_at")?,
    })
}
