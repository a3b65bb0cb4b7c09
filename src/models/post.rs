//! Post model
//!
//! This module provides:
//! - `Post` entity and the `PostStatus` publication state
//! - Input types for creating and updating posts
//! - Filters and pagination types for list queries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Topic;

/// Post entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    /// Unique identifier
    pub id: i64,
    /// Post title
    pub title: String,
    /// URL-friendly slug (unique)
    pub slug: String,
    /// Markdown content, may be empty
    pub content: String,
    /// Author user ID
    pub author_id: i64,
    /// Publication status
    pub status: PostStatus,
    /// Set when first published, cleared when moved back to draft
    pub published_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Public URL of the post page
    pub fn absolute_url(&self) -> String {
        format!("/post/{}", self.slug)
    }

    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }
}

impl std::fmt::Display for Post {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title)
    }
}

/// Post publication status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    /// Not visible to the public
    #[default]
    Draft,
    /// Visible to the public
    Published,
}

impl PostStatus {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
        }
    }

    /// Parse from database string representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(PostStatus::Draft),
            "published" => Some(PostStatus::Published),
            _ => None,
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Post together with its topics, as returned by the admin API
#[derive(Debug, Clone, Serialize)]
pub struct PostWithTopics {
    #[serde(flatten)]
    pub post: Post,
    pub topics: Vec<Topic>,
}

/// Input for creating a new post
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePostInput {
    pub title: String,
    /// Derived from the title when absent or blank
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub content: String,
    pub author_id: i64,
    #[serde(default)]
    pub status: PostStatus,
    #[serde(default)]
    pub topic_ids: Vec<i64>,
}

/// Input for updating an existing post; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePostInput {
    #[serde(default)]
    pub title: Option<String>,
    /// A blank slug is regenerated from the title
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub author_id: Option<i64>,
    #[serde(default)]
    pub status: Option<PostStatus>,
    /// Replaces the whole topic set when present
    #[serde(default)]
    pub topic_ids: Option<Vec<i64>>,
}

/// Admin list filter for posts
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub status: Option<PostStatus>,
    pub topic_id: Option<i64>,
    /// Matches title, author username and author display name
    pub search: Option<String>,
}

/// Pagination parameters for list queries
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

impl ListParams {
    /// Create new pagination parameters
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    /// Calculate the offset for database queries
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    /// Get the limit for database queries
    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    /// Total number of items across all pages
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

    /// Calculate the total number of pages
    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 || self.total <= 0 {
            return 0;
        }
        (self.total as u64).div_ceil(self.per_page as u64) as u32
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}
