//! Topic repository
//!
//! Database operations for topics and the `post_topics` junction table.
//!
//! This module provides:
//! - `TopicRepository` trait defining the interface for topic data access
//! - `SqlxTopicRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Topic, TopicWithCount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Topic repository trait
#[async_trait]
pub trait TopicRepository: Send + Sync {
    /// Create a new topic
    async fn create(&self, topic: &Topic) -> Result<Topic>;

    /// Overwrite name and slug of an existing topic
    async fn update(&self, topic: &Topic) -> Result<Topic>;

    /// Delete a topic; returns false when no row matched
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Get topic by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Topic>>;

    /// Get topic by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Topic>>;

    /// Get topic by exact name
    async fn get_by_name(&self, name: &str) -> Result<Option<Topic>>;

    /// List all topics alphabetically by name
    async fn list(&self) -> Result<Vec<Topic>>;

    /// Every topic with the number of linked posts of any status,
    /// in insertion (id) order
    async fn list_with_counts(&self) -> Result<Vec<TopicWithCount>>;

    /// Topics attached to a post, alphabetically
    async fn get_by_post_id(&self, post_id: i64) -> Result<Vec<Topic>>;
}

/// SQLx-based topic repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxTopicRepository {
    pool: DynDatabasePool,
}

impl SqlxTopicRepository {
    /// Create a new SQLx topic repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TopicRepository> {
        Arc::new(Self::new(pool))
    }
}

const INSERT_TOPIC: &str = "INSERT INTO topics (name, slug) VALUES (?, ?)";

const UPDATE_TOPIC: &str = "UPDATE topics SET name = ?, slug = ? WHERE id = ?";

const DELETE_TOPIC: &str = "DELETE FROM topics WHERE id = ?";

const SELECT_TOPIC_BY_ID: &str = "SELECT id, name, slug FROM topics WHERE id = ?";

const SELECT_TOPIC_BY_SLUG: &str = "SELECT id, name, slug FROM topics WHERE slug = ?";

const SELECT_TOPIC_BY_NAME: &str = "SELECT id, name, slug FROM topics WHERE name = ?";

const LIST_TOPICS: &str = "SELECT id, name, slug FROM topics ORDER BY name, id";

const LIST_TOPICS_WITH_COUNTS: &str = r#"
    SELECT t.id, t.name, t.slug, COUNT(pt.post_id) AS post_count
    FROM topics t
    LEFT JOIN post_topics pt ON pt.topic_id = t.id
    GROUP BY t.id, t.name, t.slug
    ORDER BY t.id
"#;

const LIST_TOPICS_FOR_POST: &str = r#"
    SELECT t.id, t.name, t.slug
    FROM topics t
    INNER JOIN post_topics pt ON pt.topic_id = t.id
    WHERE pt.post_id = ?
    ORDER BY t.name, t.id
"#;

#[async_trait]
impl TopicRepository for SqlxTopicRepository {
    async fn create(&self, topic: &Topic) -> Result<Topic> {
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_TOPIC)
                .bind(&topic.name)
                .bind(&topic.slug)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create topic")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(INSERT_TOPIC)
                .bind(&topic.name)
                .bind(&topic.slug)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create topic")?
                .last_insert_id() as i64,
        };

        Ok(Topic {
            id,
            ..topic.clone()
        })
    }

    async fn update(&self, topic: &Topic) -> Result<Topic> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(UPDATE_TOPIC)
                    .bind(&topic.name)
                    .bind(&topic.slug)
                    .bind(topic.id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update topic")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(UPDATE_TOPIC)
                    .bind(&topic.name)
                    .bind(&topic.slug)
                    .bind(topic.id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update topic")?;
            }
        }
        Ok(topic.clone())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        // post_topics rows go with it (ON DELETE CASCADE)
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(DELETE_TOPIC)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete topic")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(DELETE_TOPIC)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete topic")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Topic>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(SELECT_TOPIC_BY_ID)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get topic by ID")?;
                Ok(row.as_ref().map(row_to_topic_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(SELECT_TOPIC_BY_ID)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get topic by ID")?;
                Ok(row.as_ref().map(row_to_topic_mysql))
            }
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Topic>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_one_sqlite(self.pool.sqlite()?, SELECT_TOPIC_BY_SLUG, slug).await
            }
            DatabaseDriver::Mysql => {
                get_one_mysql(self.pool.mysql()?, SELECT_TOPIC_BY_SLUG, slug).await
            }
        }
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Topic>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_one_sqlite(self.pool.sqlite()?, SELECT_TOPIC_BY_NAME, name).await
            }
            DatabaseDriver::Mysql => {
                get_one_mysql(self.pool.mysql()?, SELECT_TOPIC_BY_NAME, name).await
            }
        }
    }

    async fn list(&self) -> Result<Vec<Topic>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(LIST_TOPICS)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list topics")?;
                Ok(rows.iter().map(row_to_topic_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(LIST_TOPICS)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list topics")?;
                Ok(rows.iter().map(row_to_topic_mysql).collect())
            }
        }
    }

    async fn list_with_counts(&self) -> Result<Vec<TopicWithCount>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(LIST_TOPICS_WITH_COUNTS)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to count posts per topic")?;
                Ok(rows
                    .iter()
                    .map(|row| TopicWithCount::new(row_to_topic_sqlite(row), row.get("post_count")))
                    .collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(LIST_TOPICS_WITH_COUNTS)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to count posts per topic")?;
                Ok(rows
                    .iter()
                    .map(|row| TopicWithCount::new(row_to_topic_mysql(row), row.get("post_count")))
                    .collect())
            }
        }
    }

    async fn get_by_post_id(&self, post_id: i64) -> Result<Vec<Topic>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(LIST_TOPICS_FOR_POST)
                    .bind(post_id)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to get topics for post")?;
                Ok(rows.iter().map(row_to_topic_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(LIST_TOPICS_FOR_POST)
                    .bind(post_id)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to get topics for post")?;
                Ok(rows.iter().map(row_to_topic_mysql).collect())
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn get_one_sqlite(pool: &SqlitePool, sql: &str, key: &str) -> Result<Option<Topic>> {
    let row = sqlx::query(sql)
        .bind(key)
        .fetch_optional(pool)
        .await
        .context("Failed to get topic")?;
    Ok(row.as_ref().map(row_to_topic_sqlite))
}

fn row_to_topic_sqlite(row: &sqlx::sqlite::SqliteRow) -> Topic {
    Topic {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn get_one_mysql(pool: &MySqlPool, sql: &str, key: &str) -> Result<Option<Topic>> {
    let row = sqlx::query(sql)
        .bind(key)
        .fetch_optional(pool)
        .await
        .context("Failed to get topic")?;
    Ok(row.as_ref().map(row_to_topic_mysql))
}

fn row_to_topic_mysql(row: &sqlx::mysql::MySqlRow) -> Topic {
    Topic {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
    }
}
