//! Mentorship repository

use super::{Conditions, DbRow, InsertId, SqlArg};
use crate::db::DynDatabasePool;
use crate::models::{encode_string_list, MentorProfile, Mentorship, MentorshipFilter, MentorshipStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

const MENTORSHIP_COLUMNS: &str = "id, mentor_id, mentee_id, status, objectives, meeting_frequency, \
     custom_frequency_days, total_meetings, completed_meetings, start_date, end_date, last_meeting_date, \
     next_meeting_date, rating, feedback, cancel_reason, created_at, updated_at";

const PROFILE_COLUMNS: &str = "id, user_id, specialties, bio, max_mentees, is_available, created_at, updated_at";

/// Mentorship repository trait
#[async_trait]
pub trait MentorshipRepository: Send + Sync {
    /// Create or replace the mentor profile of `profile.user_id`
    async fn upsert_profile(&self, profile: &MentorProfile) -> Result<MentorProfile>;

    /// Mentor profile of a user
    async fn get_profile(&self, user_id: i64) -> Result<Option<MentorProfile>>;

    /// Profiles of mentors currently taking mentees
    async fn list_available_profiles(&self) -> Result<Vec<MentorProfile>>;

    /// Insert a mentorship; `id` and timestamps on the argument are ignored
    async fn create(&self, mentorship: &Mentorship) -> Result<Mentorship>;

    /// Get mentorship by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Mentorship>>;

    /// Filtered list, newest first
    async fn list(&self, filter: &MentorshipFilter) -> Result<Vec<Mentorship>>;

    /// Pending or active mentorship between the pair, if any
    async fn find_open(&self, mentor_id: i64, mentee_id: i64) -> Result<Option<Mentorship>>;

    /// Persist every mutable field
    async fn update(&self, mentorship: &Mentorship) -> Result<Mentorship>;

    /// Delete a mentorship
    async fn delete(&self, id: i64) -> Result<()>;
}

/// SQLx-based mentorship repository implementation
pub struct SqlxMentorshipRepository {
    pool: DynDatabasePool,
}

impl SqlxMentorshipRepository {
    /// Create a new SQLx mentorship repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn MentorshipRepository> {
        Arc::new(Self::new(pool))
    }

    async fn select(&self, conditions: &Conditions) -> Result<Vec<Mentorship>> {
        let sql = format!(
            "SELECT {} FROM mentorships {} ORDER BY created_at DESC, id DESC",
            MENTORSHIP_COLUMNS,
            conditions.where_sql()
        );
        on_pool!(self.pool, |pool, Db| {
            let rows = bind_args!(sqlx::query::<Db>(&sql), conditions.args)
                .fetch_all(pool)
                .await
                .context("Failed to list mentorships")?;
            rows.iter().map(row_to_mentorship).collect()
        })
    }
}

#[async_trait]
impl MentorshipRepository for SqlxMentorshipRepository {
    async fn upsert_profile(&self, profile: &MentorProfile) -> Result<MentorProfile> {
        let now = Utc::now();
        let existing = self.get_profile(profile.user_id).await?;
        on_pool!(self.pool, |pool, Db| {
            if existing.is_some() {
                sqlx::query(
                    r#"
                    UPDATE mentor_profiles
                    SET specialties = ?, bio = ?, max_mentees = ?, is_available = ?, updated_at = ?
                    WHERE user_id = ?
                    "#,
                )
                .bind(encode_string_list(&profile.specialties))
                .bind(&profile.bio)
                .bind(profile.max_mentees)
                .bind(profile.is_available)
                .bind(now)
                .bind(profile.user_id)
                .execute(pool)
                .await
                .context("Failed to update mentor profile")?;
            } else {
                sqlx::query(
                    r#"
                    INSERT INTO mentor_profiles (user_id, specialties, bio, max_mentees, is_available, created_at,
                                                 updated_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(profile.user_id)
                .bind(encode_string_list(&profile.specialties))
                .bind(&profile.bio)
                .bind(profile.max_mentees)
                .bind(profile.is_available)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create mentor profile")?;
            }
        });

        self.get_profile(profile.user_id)
            .await?
            .context("Failed to fetch mentor profile")
    }

    async fn get_profile(&self, user_id: i64) -> Result<Option<MentorProfile>> {
        on_pool!(self.pool, |pool, Db| {
            let sql = format!("SELECT {} FROM mentor_profiles WHERE user_id = ?", PROFILE_COLUMNS);
            let row = sqlx::query(&sql)
                .bind(user_id)
                .fetch_optional(pool)
                .await
                .context("Failed to get mentor profile")?;
            row.as_ref().map(row_to_profile).transpose()
        })
    }

    async fn list_available_profiles(&self) -> Result<Vec<MentorProfile>> {
        on_pool!(self.pool, |pool, Db| {
            let sql = format!(
                "SELECT {} FROM mentor_profiles WHERE is_available = TRUE ORDER BY user_id",
                PROFILE_COLUMNS
            );
            let rows = sqlx::query(&sql)
                .fetch_all(pool)
                .await
                .context("Failed to list mentor profiles")?;
            rows.iter().map(row_to_profile).collect()
        })
    }

    async fn create(&self, mentorship: &Mentorship) -> Result<Mentorship> {
        let now = Utc::now();
        let id = on_pool!(self.pool, |pool, Db| {
            sqlx::query(
                r#"
                INSERT INTO mentorships (mentor_id, mentee_id, status, objectives, meeting_frequency,
                                         custom_frequency_days, total_meetings, completed_meetings, created_at,
                                         updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
                "#,
            )
            .bind(mentorship.mentor_id)
            .bind(mentorship.mentee_id)
            .bind(mentorship.status.as_str())
            .bind(encode_string_list(&mentorship.objectives))
            .bind(mentorship.meeting_frequency.as_str())
            .bind(mentorship.custom_frequency_days)
            .bind(mentorship.total_meetings)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create mentorship")?
            .insert_id()
        });

        self.get_by_id(id)
            .await?
            .context("Failed to fetch created mentorship")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Mentorship>> {
        on_pool!(self.pool, |pool, Db| {
            let sql = format!("SELECT {} FROM mentorships WHERE id = ?", MENTORSHIP_COLUMNS);
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get mentorship")?;
            row.as_ref().map(row_to_mentorship).transpose()
        })
    }

    async fn list(&self, filter: &MentorshipFilter) -> Result<Vec<Mentorship>> {
        let mut conditions = Conditions::new();
        if let Some(mentor_id) = filter.mentor_id {
            conditions.push("mentor_id = ?", [SqlArg::Int(mentor_id)]);
        }
        if let Some(mentee_id) = filter.mentee_id {
            conditions.push("mentee_id = ?", [SqlArg::Int(mentee_id)]);
        }
        if let Some(status) = filter.status {
            conditions.push("status = ?", [SqlArg::Text(status.as_str().to_string())]);
        }
        self.select(&conditions).await
    }

    async fn find_open(&self, mentor_id: i64, mentee_id: i64) -> Result<Option<Mentorship>> {
        let mut conditions = Conditions::new();
        conditions.push(
            "mentor_id = ? AND mentee_id = ?",
            [SqlArg::Int(mentor_id), SqlArg::Int(mentee_id)],
        );
        conditions.push(
            "status IN (?, ?)",
            [
                SqlArg::Text(MentorshipStatus::Pending.as_str().to_string()),
                SqlArg::Text(MentorshipStatus::Active.as_str().to_string()),
            ],
        );
        Ok(self.select(&conditions).await?.into_iter().next())
    }

    async fn update(&self, mentorship: &Mentorship) -> Result<Mentorship> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query(
                r#"
                UPDATE mentorships
                SET status = ?, objectives = ?, meeting_frequency = ?, custom_frequency_days = ?, total_meetings = ?,
                    completed_meetings = ?, start_date = ?, end_date = ?, last_meeting_date = ?,
                    next_meeting_date = ?, rating = ?, feedback = ?, cancel_reason = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(mentorship.status.as_str())
            .bind(encode_string_list(&mentorship.objectives))
            .bind(mentorship.meeting_frequency.as_str())
            .bind(mentorship.custom_frequency_days)
            .bind(mentorship.total_meetings)
            .bind(mentorship.completed_meetings)
            .bind(mentorship.start_date)
            .bind(mentorship.end_date)
            .bind(mentorship.last_meeting_date)
            .bind(mentorship.next_meeting_date)
            .bind(mentorship.rating)
            .bind(&mentorship.feedback)
            .bind(&mentorship.cancel_reason)
            .bind(Utc::now())
            .bind(mentorship.id)
            .execute(pool)
            .await
            .context("Failed to update mentorship")?;
        });

        self.get_by_id(mentorship.id)
            .await?
            .context("Failed to fetch updated mentorship")
    }

    async fn delete(&self, id: i64) -> Result<()> {
        on_pool!(self.pool, |pool, Db| {
            sqlx::query("DELETE FROM mentorships WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete mentorship")?;
        });
        Ok(())
    }
}

fn row_to_profile(row: &impl DbRow) -> Result<MentorProfile> {
    Ok(MentorProfile {
        id: row.int("id")?,
        user_id: row.int("user_id")?,
        specialties: row.list("specialties")?,
        bio: row.opt_text("bio")?,
        max_mentees: row.small("max_mentees")?,
        is_available: row.flag("is_available")?,
        created_at: row.time("created_at")?,
        updated_at: row.time("updated_at")?,
    })
}

fn row_to_mentorship(row: &impl DbRow) -> Result<Mentorship> {
    Ok(Mentorship {
        id: row.int("id")?,
        mentor_id: row.int("mentor_id")?,
        mentee_id: row.int("mentee_id")?,
        status: row.parsed("status")?,
        objectives: row.list("objectives")?,
        meeting_frequency: row.parsed("meeting_frequency")?,
        custom_frequency_days: row.opt_small("custom_frequency_days")?,
        total_meetings: row.opt_small("total_meetings")?,
        completed_meetings: row.small("completed_meetings")?,
        start_date: row.opt_time("start_date")?,
        end_date: row.opt_time("end_date")?,
        last_meeting_date: row.opt_time("last_meeting_date")?,
        next_meeting_date: row.opt_time("next_meeting_date")?,
        rating: row.opt_small("rating")?,
        feedback: row.opt_text("feedback")?,
        cancel_reason: row.opt_text("cancel_reason")?,
        created_at: row.time("created_at")?,
        updated_at: row.time("updated_at")?,
    })
}
