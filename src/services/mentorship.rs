//! Mentorship service
//!
//! Lifecycle: PENDING -> ACTIVE -> COMPLETED, with CANCELLED reachable
//! from either open state. Only participants (or an admin) may see or
//! change a mentorship.

use crate::db::repositories::{MentorshipRepository, UserRepository};
use crate::models::{
    normalize_list, CreateMentorshipInput, MeetingFrequency, MentorProfile, Mentorship, MentorshipFilter,
    MentorshipStatus, MentorshipSummary, UpsertMentorProfileInput, User,
};
use crate::services::deck::non_empty;
use chrono::{DateTime, Utc};
use std::sync::Arc;

const DEFAULT_MAX_MENTEES: i32 = 5;
const MAX_MENTEES_LIMIT: i32 = 50;

#[derive(Debug, thiserror::Error)]
pub enum MentorshipServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct MentorshipService {
    repo: Arc<dyn MentorshipRepository>,
    users: Arc<dyn UserRepository>,
}

impl MentorshipService {
    pub fn new(repo: Arc<dyn MentorshipRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { repo, users }
    }

    pub async fn upsert_profile(
        &self,
        actor: &User,
        input: UpsertMentorProfileInput,
    ) -> Result<MentorProfile, MentorshipServiceError> {
        if !actor.is_mentor() {
            return Err(MentorshipServiceError::Forbidden(
                "Only mentors can publish a mentor profile".to_string(),
            ));
        }

        let max_mentees = input.max_mentees.unwrap_or(DEFAULT_MAX_MENTEES);
        if !(1..=MAX_MENTEES_LIMIT).contains(&max_mentees) {
            return Err(MentorshipServiceError::ValidationError(format!(
                "max_mentees must be between 1 and {}",
                MAX_MENTEES_LIMIT
            )));
        }

        let now = Utc::now();
        let profile = MentorProfile {
            id: 0,
            user_id: actor.id,
            specialties: normalize_list(input.specialties),
            bio: non_empty(input.bio),
            max_mentees,
            is_available: input.is_available.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };
        Ok(self.repo.upsert_profile(&profile).await?)
    }

    pub async fn get_profile(&self, user_id: i64) -> Result<MentorProfile, MentorshipServiceError> {
        self.repo
            .get_profile(user_id)
            .await?
            .ok_or_else(|| MentorshipServiceError::NotFound(format!("mentor profile of user {}", user_id)))
    }

    pub async fn available_mentors(&self) -> Result<Vec<MentorProfile>, MentorshipServiceError> {
        Ok(self.repo.list_available_profiles().await?)
    }

    pub async fn create(
        &self,
        actor: &User,
        input: CreateMentorshipInput,
    ) -> Result<Mentorship, MentorshipServiceError> {
        if input.mentor_id == input.mentee_id {
            return Err(MentorshipServiceError::ValidationError(
                "Mentor and mentee must be different users".to_string(),
            ));
        }
        if !actor.is_admin() && actor.id != input.mentor_id && actor.id != input.mentee_id {
            return Err(MentorshipServiceError::Forbidden(
                "Only participants can request a mentorship".to_string(),
            ));
        }
        if input.meeting_frequency == MeetingFrequency::Custom && input.custom_frequency_days.unwrap_or(0) <= 0 {
            return Err(MentorshipServiceError::ValidationError(
                "Custom frequency needs a positive number of days".to_string(),
            ));
        }
        if input.total_meetings.is_some_and(|total| total <= 0) {
            return Err(MentorshipServiceError::ValidationError(
                "total_meetings must be positive".to_string(),
            ));
        }

        for (role, id) in [("mentor", input.mentor_id), ("mentee", input.mentee_id)] {
            if self.users.get_by_id(id).await?.is_none() {
                return Err(MentorshipServiceError::NotFound(format!("{} {}", role, id)));
            }
        }
        if self.repo.find_open(input.mentor_id, input.mentee_id).await?.is_some() {
            return Err(MentorshipServiceError::Conflict(
                "An open mentorship already exists for this pair".to_string(),
            ));
        }

        let now = Utc::now();
        let mentorship = Mentorship {
            id: 0,
            mentor_id: input.mentor_id,
            mentee_id: input.mentee_id,
            status: MentorshipStatus::Pending,
            objectives: normalize_list(input.objectives),
            meeting_frequency: input.meeting_frequency,
            custom_frequency_days: match input.meeting_frequency {
                MeetingFrequency::Custom => input.custom_frequency_days,
                _ => None,
            },
            total_meetings: input.total_meetings,
            completed_meetings: 0,
            start_date: None,
            end_date: None,
            last_meeting_date: None,
            next_meeting_date: None,
            rating: None,
            feedback: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        };

        let created = self.repo.create(&mentorship).await?;
        tracing::info!(
            "Mentorship {} requested: mentor {} mentee {}",
            created.id,
            created.mentor_id,
            created.mentee_id
        );
        Ok(created)
    }

    pub async fn get(&self, actor: &User, id: i64) -> Result<Mentorship, MentorshipServiceError> {
        let mentorship = self.find(id).await?;
        ensure_participant(actor, &mentorship)?;
        Ok(mentorship)
    }

    /// Mentorships matching the filter; non-admins only see their own
    pub async fn list(
        &self,
        actor: &User,
        filter: MentorshipFilter,
    ) -> Result<Vec<Mentorship>, MentorshipServiceError> {
        let mut mentorships = self.repo.list(&filter).await?;
        if !actor.is_admin() {
            mentorships.retain(|m| m.mentor_id == actor.id || m.mentee_id == actor.id);
        }
        Ok(mentorships)
    }

    /// PENDING -> ACTIVE; done by the mentor
    pub async fn accept(&self, actor: &User, id: i64) -> Result<Mentorship, MentorshipServiceError> {
        let mut mentorship = self.find(id).await?;
        ensure_mentor(actor, &mentorship)?;
        ensure_status(&mentorship, &[MentorshipStatus::Pending], "accept")?;

        let now = Utc::now();
        mentorship.status = MentorshipStatus::Active;
        mentorship.start_date = Some(now);
        mentorship.next_meeting_date = mentorship.next_meeting_after(now);
        mentorship.updated_at = now;
        Ok(self.repo.update(&mentorship).await?)
    }

    pub async fn cancel(
        &self,
        actor: &User,
        id: i64,
        reason: Option<String>,
    ) -> Result<Mentorship, MentorshipServiceError> {
        let mut mentorship = self.find(id).await?;
        ensure_participant(actor, &mentorship)?;
        ensure_status(
            &mentorship,
            &[MentorshipStatus::Pending, MentorshipStatus::Active],
            "cancel",
        )?;

        let now = Utc::now();
        mentorship.status = MentorshipStatus::Cancelled;
        mentorship.cancel_reason = non_empty(reason);
        mentorship.end_date = Some(now);
        mentorship.next_meeting_date = None;
        mentorship.updated_at = now;
        Ok(self.repo.update(&mentorship).await?)
    }

    pub async fn complete(
        &self,
        actor: &User,
        id: i64,
        rating: Option<i32>,
        feedback: Option<String>,
    ) -> Result<Mentorship, MentorshipServiceError> {
        if rating.is_some_and(|r| !(1..=5).contains(&r)) {
            return Err(MentorshipServiceError::ValidationError(
                "Rating must be between 1 and 5".to_string(),
            ));
        }
        let mut mentorship = self.find(id).await?;
        ensure_participant(actor, &mentorship)?;
        ensure_status(&mentorship, &[MentorshipStatus::Active], "complete")?;

        finish(&mut mentorship, Utc::now());
        mentorship.rating = rating;
        mentorship.feedback = non_empty(feedback);
        Ok(self.repo.update(&mentorship).await?)
    }

    /// Count a meeting held on `date` (now when absent)
    pub async fn record_meeting(
        &self,
        actor: &User,
        id: i64,
        date: Option<DateTime<Utc>>,
    ) -> Result<Mentorship, MentorshipServiceError> {
        let mut mentorship = self.find(id).await?;
        ensure_mentor(actor, &mentorship)?;
        ensure_status(&mentorship, &[MentorshipStatus::Active], "record a meeting on")?;

        let date = date.unwrap_or_else(Utc::now);
        mentorship.completed_meetings += 1;
        mentorship.last_meeting_date = Some(date);
        mentorship.next_meeting_date = mentorship.next_meeting_after(date);
        mentorship.updated_at = Utc::now();

        if mentorship
            .total_meetings
            .is_some_and(|total| mentorship.completed_meetings >= total)
        {
            finish(&mut mentorship, date);
            tracing::info!("Mentorship {} completed after its last meeting", mentorship.id);
        }
        Ok(self.repo.update(&mentorship).await?)
    }

    pub async fn update_objectives(
        &self,
        actor: &User,
        id: i64,
        objectives: Vec<String>,
    ) -> Result<Mentorship, MentorshipServiceError> {
        let mut mentorship = self.find(id).await?;
        ensure_participant(actor, &mentorship)?;
        mentorship.objectives = normalize_list(objectives);
        mentorship.updated_at = Utc::now();
        Ok(self.repo.update(&mentorship).await?)
    }

    pub async fn summary(&self, actor: &User, id: i64) -> Result<MentorshipSummary, MentorshipServiceError> {
        let mentorship = self.get(actor, id).await?;
        Ok(MentorshipSummary {
            progress: mentorship.progress(),
            duration_days: mentorship.duration_days(Utc::now()),
            remaining_meetings: mentorship.remaining_meetings(),
            mentorship,
        })
    }

    pub async fn delete(&self, actor: &User, id: i64) -> Result<(), MentorshipServiceError> {
        let mentorship = self.find(id).await?;
        if !actor.is_admin() && actor.id != mentorship.mentor_id {
            return Err(MentorshipServiceError::Forbidden(
                "Only the mentor or an admin can delete a mentorship".to_string(),
            ));
        }
        self.repo.delete(mentorship.id).await?;
        Ok(())
    }

    async fn find(&self, id: i64) -> Result<Mentorship, MentorshipServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| MentorshipServiceError::NotFound(format!("mentorship {}", id)))
    }
}

fn finish(mentorship: &mut Mentorship, at: DateTime<Utc>) {
    mentorship.status = MentorshipStatus::Completed;
    mentorship.end_date = Some(at);
    mentorship.next_meeting_date = None;
    mentorship.updated_at = Utc::now();
}

fn ensure_participant(actor: &User, mentorship: &Mentorship) -> Result<(), MentorshipServiceError> {
    if actor.is_admin() || actor.id == mentorship.mentor_id || actor.id == mentorship.mentee_id {
        Ok(())
    } else {
        Err(MentorshipServiceError::Forbidden(
            "Not a participant of this mentorship".to_string(),
        ))
    }
}

fn ensure_mentor(actor: &User, mentorship: &Mentorship) -> Result<(), MentorshipServiceError> {
    if actor.is_admin() || actor.id == mentorship.mentor_id {
        Ok(())
    } else {
        Err(MentorshipServiceError::Forbidden(
            "Only the mentor can do this".to_string(),
        ))
    }
}

fn ensure_status(
    mentorship: &Mentorship,
    allowed: &[MentorshipStatus],
    action: &str,
) -> Result<(), MentorshipServiceError> {
    if allowed.contains(&mentorship.status) {
        Ok(())
    } else {
        Err(MentorshipServiceError::ValidationError(format!(
            "Cannot {} a {} mentorship",
            action,
            mentorship.status.as_str().to_lowercase()
        )))
    }
}
