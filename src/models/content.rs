//! Content model
//!
//! Study articles written in Markdown. Also hosts the pagination types
//! shared by every list endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Article entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub id: i64,
    pub slug: String,
    pub title: String,
    /// Markdown source
    pub body: String,
    /// Rendered HTML
    pub body_html: String,
    pub summary: Option<String>,
    pub category_id: Option<i64>,
    pub tags: Vec<String>,
    pub author_id: i64,
    pub status: ContentStatus,
    /// Set the first time the content is published and never cleared
    pub published_at: Option<DateTime<Utc>>,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Content {
    pub fn is_published(&self) -> bool {
        self.status == ContentStatus::Published
    }
}

string_enum! {
    /// Publication status
    pub enum ContentStatus {
        /// Visible only to its author and admins
        Draft => "DRAFT",
        Published => "PUBLISHED",
        /// Hidden but kept
        Archived => "ARCHIVED",
    }
    default = Draft;
}

/// Input for creating content
#[derive(Debug, Clone, Deserialize)]
pub struct CreateContentInput {
    pub title: String,
    pub body: String,
    pub summary: Option<String>,
    pub category_id: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: Option<ContentStatus>,
}

impl CreateContentInput {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            summary: None,
            category_id: None,
            tags: Vec::new(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: ContentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// Partial update; `Some(None)` clears a nullable field
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateContentInput {
    pub title: Option<String>,
    pub body: Option<String>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub summary: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub category_id: Option<Option<i64>>,
    pub tags: Option<Vec<String>>,
    pub status: Option<ContentStatus>,
}

impl UpdateContentInput {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_status(mut self, status: ContentStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Filters for content listings
#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    pub status: Option<ContentStatus>,
    pub category_id: Option<i64>,
    /// Any of these categories, e.g. a category and its subcategories
    pub category_ids: Vec<i64>,
    pub tag: Option<String>,
    pub author_id: Option<i64>,
    /// Case-insensitive match on title and body
    pub query: Option<String>,
}

/// Pagination parameters for list queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListParams {
    /// 1-indexed page number
    pub page: u32,
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

impl ListParams {
    /// Page is at least 1; page size is clamped to 1..=100
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 || self.total <= 0 {
            return 0;
        }
        ((self.total as u64 + self.per_page as u64 - 1) / self.per_page as u64) as u32
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// Convert the items while keeping the pagination metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}
