//! Mentorship model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

string_enum! {
    pub enum MentorshipStatus {
        Pending => "PENDING",
        Active => "ACTIVE",
        Completed => "COMPLETED",
        Cancelled => "CANCELLED",
    }
    default = Pending;
}

impl MentorshipStatus {
    /// Pending and active mentorships block a new request for the same pair
    pub fn is_open(&self) -> bool {
        matches!(self, MentorshipStatus::Pending | MentorshipStatus::Active)
    }
}

string_enum! {
    pub enum MeetingFrequency {
        Weekly => "WEEKLY",
        Biweekly => "BIWEEKLY",
        Monthly => "MONTHLY",
        Custom => "CUSTOM",
    }
    default = Weekly;
}

impl MeetingFrequency {
    /// Days between meetings; `Custom` uses the mentorship's own interval
    pub fn interval_days(&self, custom_days: Option<i32>) -> Option<i64> {
        match self {
            MeetingFrequency::Weekly => Some(7),
            MeetingFrequency::Biweekly => Some(14),
            MeetingFrequency::Monthly => Some(30),
            MeetingFrequency::Custom => custom_days.filter(|d| *d > 0).map(i64::from),
        }
    }
}

/// Mentor availability and focus areas
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentorProfile {
    pub id: i64,
    pub user_id: i64,
    pub specialties: Vec<String>,
    pub bio: Option<String>,
    pub max_mentees: i32,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpsertMentorProfileInput {
    #[serde(default)]
    pub specialties: Vec<String>,
    pub bio: Option<String>,
    pub max_mentees: Option<i32>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mentorship {
    pub id: i64,
    pub mentor_id: i64,
    pub mentee_id: i64,
    pub status: MentorshipStatus,
    pub objectives: Vec<String>,
    pub meeting_frequency: MeetingFrequency,
    pub custom_frequency_days: Option<i32>,
    pub total_meetings: Option<i32>,
    pub completed_meetings: i32,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub last_meeting_date: Option<DateTime<Utc>>,
    pub next_meeting_date: Option<DateTime<Utc>>,
    pub rating: Option<i32>,
    pub feedback: Option<String>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Mentorship {
    /// Completion percentage, 0..=100
    pub fn progress(&self) -> i32 {
        match self.total_meetings {
            Some(total) if total > 0 => {
                let pct = (self.completed_meetings as f64 / total as f64 * 100.0).round() as i32;
                pct.min(100)
            }
            _ if self.status == MentorshipStatus::Completed => 100,
            _ => 0,
        }
    }

    pub fn remaining_meetings(&self) -> Option<i32> {
        self.total_meetings
            .map(|total| (total - self.completed_meetings).max(0))
    }

    /// Days from start to end, or to `now` while still running
    pub fn duration_days(&self, now: DateTime<Utc>) -> Option<i64> {
        let start = self.start_date?;
        let end = self.end_date.unwrap_or(now);
        Some((end - start).num_days().max(0))
    }

    /// Next meeting after one held on `date`
    pub fn next_meeting_after(&self, date: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.meeting_frequency
            .interval_days(self.custom_frequency_days)
            .map(|days| date + Duration::days(days))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMentorshipInput {
    pub mentor_id: i64,
    pub mentee_id: i64,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub meeting_frequency: MeetingFrequency,
    pub custom_frequency_days: Option<i32>,
    pub total_meetings: Option<i32>,
}

impl CreateMentorshipInput {
    pub fn new(mentor_id: i64, mentee_id: i64) -> Self {
        Self {
            mentor_id,
            mentee_id,
            objectives: Vec::new(),
            meeting_frequency: MeetingFrequency::Weekly,
            custom_frequency_days: None,
            total_meetings: None,
        }
    }

    pub fn with_frequency(mut self, frequency: MeetingFrequency, custom_days: Option<i32>) -> Self {
        self.meeting_frequency = frequency;
        self.custom_frequency_days = custom_days;
        self
    }

    pub fn with_total_meetings(mut self, total: i32) -> Self {
        self.total_meetings = Some(total);
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MentorshipFilter {
    pub mentor_id: Option<i64>,
    pub mentee_id: Option<i64>,
    pub status: Option<MentorshipStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentorshipSummary {
    pub mentorship: Mentorship,
    pub progress: i32,
    pub duration_days: Option<i64>,
    pub remaining_meetings: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mentorship(completed: i32, total: Option<i32>, status: MentorshipStatus) -> Mentorship {
        Mentorship {
            id: 1,
            mentor_id: 1,
            mentee_id: 2,
            status,
            objectives: vec![],
            meeting_frequency: MeetingFrequency::Weekly,
            custom_frequency_days: None,
            total_meetings: total,
            completed_meetings: completed,
            start_date: None,
            end_date: None,
            last_meeting_date: None,
            next_meeting_date: None,
            rating: None,
            feedback: None,
            cancel_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_progress() {
        assert_eq!(mentorship(1, Some(3), MentorshipStatus::Active).progress(), 33);
        assert_eq!(mentorship(2, Some(3), MentorshipStatus::Active).progress(), 67);
        assert_eq!(mentorship(5, Some(3), MentorshipStatus::Active).progress(), 100);
        assert_eq!(mentorship(0, None, MentorshipStatus::Completed).progress(), 100);
        assert_eq!(mentorship(4, None, MentorshipStatus::Active).progress(), 0);
    }

    #[test]
    fn test_remaining_meetings() {
        assert_eq!(mentorship(1, Some(3), MentorshipStatus::Active).remaining_meetings(), Some(2));
        assert_eq!(mentorship(4, Some(3), MentorshipStatus::Active).remaining_meetings(), Some(0));
        assert_eq!(mentorship(1, None, MentorshipStatus::Active).remaining_meetings(), None);
    }

    #[test]
    fn test_interval_days() {
        assert_eq!(MeetingFrequency::Biweekly.interval_days(None), Some(14));
        assert_eq!(MeetingFrequency::Monthly.interval_days(Some(3)), Some(30));
        assert_eq!(MeetingFrequency::Custom.interval_days(Some(10)), Some(10));
        assert_eq!(MeetingFrequency::Custom.interval_days(Some(0)), None);
    }
}
