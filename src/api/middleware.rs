//! API middleware and shared state
//!
//! Contains:
//! - `AppState`, the services shared by every handler
//! - `ApiError`, the JSON error body of the public and admin APIs
//! - Bearer-token guard for the admin API

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::cache::{create_cache, Cache};
use crate::config::Config;
use crate::db::repositories::{
    SqlxCommentRepository, SqlxPhotoSubmissionRepository, SqlxPostRepository,
    SqlxTopicRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::services::{
    CommentService, ContestService, DynClock, MarkdownRenderer, PostService, TopicService,
    UserService,
};
use crate::theme::ThemeEngine;

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub config: Arc<Config>,
    pub cache: Cache,
    pub clock: DynClock,
    pub topic_service: Arc<TopicService>,
    pub post_service: Arc<PostService>,
    pub comment_service: Arc<CommentService>,
    pub contest_service: Arc<ContestService>,
    pub user_service: Arc<UserService>,
    pub markdown: Arc<MarkdownRenderer>,
    pub theme_engine: Arc<RwLock<ThemeEngine>>,
}

impl AppState {
    /// Wire repositories and services on top of a migrated pool
    pub fn new(pool: DynDatabasePool, config: Config, clock: DynClock, theme_engine: ThemeEngine) -> Self {
        let cache = create_cache(&config.cache);
        let cache_ttl = Duration::from_secs(config.cache.ttl_seconds);

        let users = SqlxUserRepository::boxed(pool.clone());
        let topics = SqlxTopicRepository::boxed(pool.clone());
        let posts = SqlxPostRepository::boxed(pool.clone());
        let comments = SqlxCommentRepository::boxed(pool.clone());
        let submissions = SqlxPhotoSubmissionRepository::boxed(pool.clone());

        let topic_service = TopicService::new(topics.clone(), cache.clone(), cache_ttl);
        let post_service = PostService::new(
            posts.clone(),
            topics,
            users.clone(),
            cache.clone(),
            clock.clone(),
        );
        let comment_service = CommentService::new(comments, posts, clock.clone());
        let contest_service =
            ContestService::new(submissions, config.upload.clone(), clock.clone());
        let user_service = UserService::new(users, clock.clone());

        Self {
            pool,
            config: Arc::new(config),
            cache,
            clock,
            topic_service: Arc::new(topic_service),
            post_service: Arc::new(post_service),
            comment_service: Arc::new(comment_service),
            contest_service: Arc::new(contest_service),
            user_service: Arc::new(user_service),
            markdown: Arc::new(MarkdownRenderer::new()),
            theme_engine: Arc::new(RwLock::new(theme_engine)),
        }
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("API error: {}", self.error.message);
        }
        (status, Json(self)).into_response()
    }
}

/// Extract a bearer token from the Authorization header
fn extract_bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Compare without short-circuiting on the first differing byte
fn tokens_match(given: &str, expected: &str) -> bool {
    given.len() == expected.len()
        && given
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Admin authorization middleware
///
/// 403 when no admin token is configured, 401 for a missing or wrong token.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.config.admin.token.as_deref() else {
        return Err(ApiError::forbidden("Admin API is disabled: no admin token configured"));
    };

    let token = extract_bearer_token(&request)
        .ok_or_else(|| ApiError::unauthorized("Missing admin token"))?;
    if !tokens_match(token, expected) {
        tracing::warn!("Rejected admin request to {}", request.uri().path());
        return Err(ApiError::unauthorized("Invalid admin token"));
    }

    Ok(next.run(request).await)
}
