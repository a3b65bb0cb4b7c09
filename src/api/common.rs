//! Common API utilities and shared types
//!
//! Pagination defaults and query parsing, response views shared by the public and admin
//! APIs, and the mapping from service errors to `ApiError`.

use serde::Serialize;

use crate::api::middleware::ApiError;
use crate::models::{Post, PostStatus};
use crate::services::{
    CommentServiceError, ContestServiceError, PostServiceError, TopicServiceError,
    UserServiceError,
};

// ============================================================================
// Query parameters
// ============================================================================

pub fn default_page() -> u32 {
    1
}

pub fn default_per_page() -> u32 {
    20
}

/// Treat empty query values (`?status=`) as absent
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn parse_status(value: Option<&str>) -> Result<Option<PostStatus>, ApiError> {
    value
        .map(|s| {
            PostStatus::from_str(s)
                .ok_or_else(|| ApiError::validation_error(format!("Invalid status: {}", s)))
        })
        .transpose()
}

pub fn parse_bool(name: &str, value: Option<&str>) -> Result<Option<bool>, ApiError> {
    value
        .map(|s| match s.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ApiError::validation_error(format!("Invalid {}: {}", name, s))),
        })
        .transpose()
}

// ============================================================================
// Response views
// ============================================================================

/// Post as listed in topic pages and the public API
#[derive(Debug, Serialize)]
pub struct PostSummary {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub url: String,
    pub published_at: Option<String>,
}

impl From<Post> for PostSummary {
    fn from(post: Post) -> Self {
        Self {
            url: post.absolute_url(),
            published_at: post.published_at.map(|t| t.to_rfc3339()),
            id: post.id,
            title: post.title,
            slug: post.slug,
        }
    }
}

// ============================================================================
// Service error mapping
// ============================================================================

impl From<TopicServiceError> for ApiError {
    fn from(err: TopicServiceError) -> Self {
        match err {
            TopicServiceError::NotFound(id) => ApiError::not_found(format!("Topic not found: {}", id)),
            TopicServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            e @ (TopicServiceError::DuplicateName(_) | TopicServiceError::DuplicateSlug(_)) => {
                ApiError::conflict(e.to_string())
            }
            TopicServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<PostServiceError> for ApiError {
    fn from(err: PostServiceError) -> Self {
        match err {
            PostServiceError::NotFound(id) => ApiError::not_found(format!("Post not found: {}", id)),
            PostServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            e @ PostServiceError::DuplicateSlug(_) => ApiError::conflict(e.to_string()),
            PostServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<CommentServiceError> for ApiError {
    fn from(err: CommentServiceError) -> Self {
        match err {
            CommentServiceError::NotFound(id) => {
                ApiError::not_found(format!("Comment not found: {}", id))
            }
            CommentServiceError::PostNotFound(slug) => {
                ApiError::not_found(format!("Post not found: {}", slug))
            }
            CommentServiceError::InvalidForm(errors) => {
                ApiError::with_details("VALIDATION_ERROR", "Invalid comment", errors.to_json())
            }
            CommentServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<ContestServiceError> for ApiError {
    fn from(err: ContestServiceError) -> Self {
        match err {
            ContestServiceError::NotFound(id) => {
                ApiError::not_found(format!("Submission not found: {}", id))
            }
            ContestServiceError::InvalidForm(errors) => {
                ApiError::with_details("VALIDATION_ERROR", "Invalid submission", errors.to_json())
            }
            ContestServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            e @ UserServiceError::UserExists(_) => ApiError::conflict(e.to_string()),
            UserServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}
