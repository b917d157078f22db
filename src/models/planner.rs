//! Planner model
//!
//! Manual tasks are stored; review tasks are generated from the FSRS
//! schedule when the calendar is read and never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

string_enum! {
    pub enum TaskType {
        Manual => "MANUAL",
        FsrsReview => "FSRS_REVIEW",
    }
    default = Manual;
}

string_enum! {
    pub enum TaskStatus {
        Pending => "PENDING",
        InProgress => "IN_PROGRESS",
        Completed => "COMPLETED",
        Cancelled => "CANCELLED",
    }
    default = Pending;
}

string_enum! {
    pub enum TaskPriority {
        Low => "LOW",
        Medium => "MEDIUM",
        High => "HIGH",
    }
    default = Medium;
}

string_enum! {
    pub enum TaskSource {
        User => "USER",
        UnifiedReview => "UNIFIED_REVIEW",
    }
    default = User;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerTask {
    /// Generated review tasks carry no id
    pub id: Option<i64>,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub scheduled_date: DateTime<Utc>,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub source: TaskSource,
    pub manual_type: Option<String>,
    pub target_url: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePlannerTaskInput {
    pub title: String,
    pub description: Option<String>,
    pub scheduled_date: DateTime<Utc>,
    pub priority: Option<TaskPriority>,
    pub manual_type: Option<String>,
    pub target_url: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl CreatePlannerTaskInput {
    pub fn new(title: impl Into<String>, scheduled_date: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            description: None,
            scheduled_date,
            priority: None,
            manual_type: None,
            target_url: None,
            metadata: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePlannerTaskInput {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub description: Option<Option<String>>,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub manual_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub target_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub metadata: Option<Option<serde_json::Value>>,
}
