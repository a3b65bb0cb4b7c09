//! Admin API endpoints
//!
//! Token-protected JSON management API:
//! - Topics and posts CRUD
//! - Comment moderation
//! - Photo contest submissions (list, view, delete)
//! - Authors

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::api::common::{default_page, default_per_page, non_empty, parse_bool, parse_status};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{
    Comment, CommentFilter, CreatePostInput, CreateTopicInput, CreateUserInput, ListParams,
    PagedResult, PhotoSubmission, Post, PostFilter, PostWithTopics, SubmissionFilter, Topic,
    UpdatePostInput, UpdateTopicInput, User,
};

/// Build the admin router
pub fn router() -> Router<AppState> {
    Router::new()
        // Topics
        .route("/topics", get(list_topics).post(create_topic))
        .route("/topics/{id}", get(get_topic).put(update_topic).delete(delete_topic))
        // Posts
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/{id}", get(get_post).put(update_post).delete(delete_post))
        .route("/posts/{id}/comments", get(list_post_comments))
        // Comments
        .route("/comments", get(list_comments))
        .route("/comments/{id}", get(get_comment).delete(delete_comment))
        .route("/comments/{id}/approve", put(approve_comment))
        // Contest submissions
        .route("/submissions", get(list_submissions))
        .route("/submissions/{id}", get(get_submission).delete(delete_submission))
        // Authors
        .route("/users", get(list_users).post(create_user))
}

// ============================================================================
// Topics
// ============================================================================

#[derive(Debug, Serialize)]
pub struct TopicListResponse {
    pub topics: Vec<Topic>,
}

/// GET /admin/topics
async fn list_topics(State(state): State<AppState>) -> Result<Json<TopicListResponse>, ApiError> {
    let topics = state.topic_service.list().await?;
    Ok(Json(TopicListResponse { topics }))
}

/// POST /admin/topics
async fn create_topic(
    State(state): State<AppState>,
    Json(input): Json<CreateTopicInput>,
) -> Result<(StatusCode, Json<Topic>), ApiError> {
    let topic = state.topic_service.create(input).await?;
    Ok((StatusCode::CREATED, Json(topic)))
}

/// GET /admin/topics/{id}
async fn get_topic(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Topic>, ApiError> {
    state
        .topic_service
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Topic not found: {}", id)))
}

/// PUT /admin/topics/{id}
async fn update_topic(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateTopicInput>,
) -> Result<Json<Topic>, ApiError> {
    Ok(Json(state.topic_service.update(id, input).await?))
}

/// DELETE /admin/topics/{id}
async fn delete_topic(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.topic_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Posts
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PostListQuery {
    pub status: Option<String>,
    pub topic: Option<i64>,
    pub q: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// GET /admin/posts
async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PostListQuery>,
) -> Result<Json<PagedResult<Post>>, ApiError> {
    let filter = PostFilter {
        status: parse_status(non_empty(&query.status))?,
        topic_id: query.topic,
        search: non_empty(&query.q).map(String::from),
    };
    let posts = state
        .post_service
        .list_admin(&filter, &ListParams::new(query.page, query.per_page))
        .await?;
    Ok(Json(posts))
}

/// POST /admin/posts
async fn create_post(
    State(state): State<AppState>,
    Json(input): Json<CreatePostInput>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state.post_service.create(input).await?;
    let topics = state.post_service.topics_for_post(post.id).await?;
    Ok((StatusCode::CREATED, Json(PostWithTopics { post, topics })))
}

/// GET /admin/posts/{id}
async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PostWithTopics>, ApiError> {
    state
        .post_service
        .get_with_topics(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Post not found: {}", id)))
}

/// PUT /admin/posts/{id}
async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdatePostInput>,
) -> Result<Json<PostWithTopics>, ApiError> {
    let post = state.post_service.update(id, input).await?;
    let topics = state.post_service.topics_for_post(post.id).await?;
    Ok(Json(PostWithTopics { post, topics }))
}

/// DELETE /admin/posts/{id}
async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.post_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct CommentListResponse {
    pub comments: Vec<Comment>,
}

/// GET /admin/posts/{id}/comments - every comment of a post, pending included
async fn list_post_comments(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<CommentListResponse>, ApiError> {
    if state.post_service.get_by_id(id).await?.is_none() {
        return Err(ApiError::not_found(format!("Post not found: {}", id)));
    }
    let comments = state.comment_service.list_for_post(id).await?;
    Ok(Json(CommentListResponse { comments }))
}

// ============================================================================
// Comments
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CommentListQuery {
    pub approved: Option<String>,
    pub post: Option<i64>,
    pub q: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub approved: bool,
}

/// GET /admin/comments
async fn list_comments(
    State(state): State<AppState>,
    Query(query): Query<CommentListQuery>,
) -> Result<Json<PagedResult<Comment>>, ApiError> {
    let filter = CommentFilter {
        approved: parse_bool("approved", non_empty(&query.approved))?,
        post_id: query.post,
        search: non_empty(&query.q).map(String::from),
    };
    let comments = state
        .comment_service
        .list_admin(&filter, &ListParams::new(query.page, query.per_page))
        .await?;
    Ok(Json(comments))
}

/// GET /admin/comments/{id}
async fn get_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Comment>, ApiError> {
    state
        .comment_service
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Comment not found: {}", id)))
}

/// PUT /admin/comments/{id}/approve
async fn approve_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ApproveRequest>,
) -> Result<Json<Comment>, ApiError> {
    Ok(Json(state.comment_service.set_approved(id, body.approved).await?))
}

/// DELETE /admin/comments/{id}
async fn delete_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.comment_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Contest submissions
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SubmissionListQuery {
    pub q: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// Submission with the URL its photo is served from
#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    #[serde(flatten)]
    pub submission: PhotoSubmission,
    pub photo_url: String,
    pub label: String,
}

impl From<PhotoSubmission> for SubmissionResponse {
    fn from(submission: PhotoSubmission) -> Self {
        Self {
            photo_url: submission.photo_url(),
            label: submission.to_string(),
            submission,
        }
    }
}

fn parse_date(name: &str, value: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    value
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
                ApiError::validation_error(format!("Invalid {} date (expected YYYY-MM-DD): {}", name, s))
            })
        })
        .transpose()
}

/// GET /admin/submissions
async fn list_submissions(
    State(state): State<AppState>,
    Query(query): Query<SubmissionListQuery>,
) -> Result<Json<PagedResult<SubmissionResponse>>, ApiError> {
    let filter = SubmissionFilter {
        search: non_empty(&query.q).map(String::from),
        from: parse_date("from", non_empty(&query.from))?,
        to: parse_date("to", non_empty(&query.to))?,
    };
    let submissions = state
        .contest_service
        .list_admin(&filter, &ListParams::new(query.page, query.per_page))
        .await?;
    Ok(Json(submissions.map(SubmissionResponse::from)))
}

/// GET /admin/submissions/{id}
async fn get_submission(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    state
        .contest_service
        .get_by_id(id)
        .await?
        .map(|s| Json(SubmissionResponse::from(s)))
        .ok_or_else(|| ApiError::not_found(format!("Submission not found: {}", id)))
}

/// DELETE /admin/submissions/{id}
async fn delete_submission(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.contest_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Authors
// ============================================================================

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<User>,
}

/// GET /admin/users
async fn list_users(State(state): State<AppState>) -> Result<Json<UserListResponse>, ApiError> {
    let users = state.user_service.list().await?;
    Ok(Json(UserListResponse { users }))
}

/// POST /admin/users
async fn create_user(
    State(state): State<AppState>,
    Json(input): Json<CreateUserInput>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state.user_service.create(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}
