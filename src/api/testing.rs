//! In-process application for HTTP tests

use axum_test::TestServer;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use tempfile::TempDir;

use crate::api::{build_router, AppState};
use crate::config::Config;
use crate::db::{create_test_pool, migrations};
use crate::models::{CreatePostInput, CreateTopicInput, CreateUserInput, Post, PostStatus, Topic};
use crate::services::ManualClock;
use crate::theme::ThemeEngine;

pub(crate) const ADMIN_TOKEN: &str = "test-admin-token";

pub(crate) struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub clock: ManualClock,
    pub author_id: i64,
    _upload_dir: TempDir,
}

/// Fresh database, temporary upload root and the built-in templates
pub(crate) async fn test_app(admin_token: Option<&str>) -> TestApp {
    let pool = create_test_pool().await.unwrap();
    migrations::run_migrations(&pool).await.unwrap();

    let upload_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.upload.path = upload_dir.path().to_path_buf();
    config.admin.token = admin_token.map(String::from);

    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
    let state = AppState::new(
        pool,
        config,
        Arc::new(clock.clone()),
        ThemeEngine::embedded().unwrap(),
    );

    let author = state
        .user_service
        .create(CreateUserInput {
            username: "jace".to_string(),
            email: "jace@ravnica.example".to_string(),
            display_name: Some("Jace Beleren".to_string()),
        })
        .await
        .unwrap();

    let server = TestServer::new(build_router(state.clone())).unwrap();
    TestApp {
        server,
        state,
        clock,
        author_id: author.id,
        _upload_dir: upload_dir,
    }
}

impl TestApp {
    pub async fn topic(&self, name: &str) -> Topic {
        self.state
            .topic_service
            .create(CreateTopicInput {
                name: name.to_string(),
                slug: None,
            })
            .await
            .unwrap()
    }

    pub async fn post(&self, title: &str, status: PostStatus, topics: &[&Topic]) -> Post {
        self.state
            .post_service
            .create(CreatePostInput {
                title: title.to_string(),
                slug: None,
                content: format!("All about **{}**.", title),
                author_id: self.author_id,
                status,
                topic_ids: topics.iter().map(|t| t.id).collect(),
            })
            .await
            .unwrap()
    }
}
