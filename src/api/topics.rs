//! Public topic API
//!
//! Read-only JSON endpoints:
//! - `GET /topics` all topics with post counts, or `?top=N` for the ranking
//! - `GET /topics/{slug}/posts` published posts of a topic
//! - `GET /health` database check

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::PostSummary;
use crate::api::middleware::{ApiError, AppState};
use crate::models::{Topic, TopicWithCount};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/topics", get(list_topics))
        .route("/topics/{slug}/posts", get(list_topic_posts))
        .route("/health", get(health))
}

#[derive(Debug, Deserialize)]
pub struct TopicsQuery {
    pub top: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum TopicsResponse {
    Counted { topics: Vec<TopicWithCount> },
    Ranked { topics: Vec<Topic> },
}

#[derive(Debug, Serialize)]
pub struct TopicPostsResponse {
    pub topic: Topic,
    pub posts: Vec<PostSummary>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: String,
}

/// GET /api/v1/topics
async fn list_topics(
    State(state): State<AppState>,
    Query(query): Query<TopicsQuery>,
) -> Result<Json<TopicsResponse>, ApiError> {
    let response = match query.top {
        Some(limit) => TopicsResponse::Ranked {
            topics: state.topic_service.top_topics(limit).await?,
        },
        None => TopicsResponse::Counted {
            topics: state.topic_service.list_with_counts().await?,
        },
    };
    Ok(Json(response))
}

/// GET /api/v1/topics/{slug}/posts
async fn list_topic_posts(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<TopicPostsResponse>, ApiError> {
    let topic = state
        .topic_service
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Topic not found: {}", slug)))?;

    let posts = state.post_service.published_for_topic(topic.id).await?;
    Ok(Json(TopicPostsResponse {
        topic,
        posts: posts.into_iter().map(PostSummary::from).collect(),
    }))
}

/// GET /api/v1/health
async fn health(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    let database = state.pool.driver().to_string();
    match state.pool.ping().await {
        Ok(()) => Ok(Json(HealthResponse {
            status: "ok",
            database,
        })),
        Err(e) => {
            tracing::error!("Health check failed: {:#}", e);
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                    database,
                }),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::api::testing::test_app;
    use crate::models::PostStatus;
    use serde_json::Value;

    #[tokio::test]
    async fn test_topics_with_counts_are_alphabetical() {
        let app = test_app(None).await;
        let theros = app.topic("Theros").await;
        let amonkhet = app.topic("Amonkhet").await;
        app.post("Gods of Theros", PostStatus::Published, &[&theros]).await;
        app.post("Hidden Tombs", PostStatus::Draft, &[&theros, &amonkhet]).await;

        let body: Value = app.server.get("/api/v1/topics").await.json();
        let topics = body["topics"].as_array().unwrap();
        assert_eq!(topics[0]["name"], "Amonkhet");
        assert_eq!(topics[0]["post_count"], 1);
        assert_eq!(topics[1]["name"], "Theros");
        assert_eq!(topics[1]["post_count"], 2);
    }

    #[tokio::test]
    async fn test_top_topics_ranking() {
        let app = test_app(None).await;
        let a = app.topic("Alara").await;
        let b = app.topic("Bant").await;
        app.topic("Capenna").await;
        app.post("One", PostStatus::Published, &[&a]).await;
        app.post("Two", PostStatus::Published, &[&b]).await;
        app.post("Three", PostStatus::Published, &[&b]).await;

        let body: Value = app
            .server
            .get("/api/v1/topics")
            .add_query_param("top", 1)
            .await
            .json();
        let topics = body["topics"].as_array().unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0]["name"], "Bant");
        assert!(topics[0].get("post_count").is_none());
    }

    #[tokio::test]
    async fn test_topic_posts_exclude_drafts() {
        let app = test_app(None).await;
        let lore = app.topic("Lore").await;
        app.post("Published Story", PostStatus::Published, &[&lore]).await;
        app.post("Draft Story", PostStatus::Draft, &[&lore]).await;

        let body: Value = app.server.get("/api/v1/topics/lore/posts").await.json();
        assert_eq!(body["topic"]["slug"], "lore");
        let posts = body["posts"].as_array().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0]["title"], "Published Story");
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app(None).await;
        let body: Value = app.server.get("/api/v1/health").await.json();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], "sqlite");
    }
}
