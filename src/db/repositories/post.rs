//! Post repository
//!
//! Database operations for posts. A post row and its `post_topics` rows are
//! always written in the same transaction.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ListParams, Post, PostFilter, PostStatus};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

use super::like_pattern;

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a post and link it to `topic_ids`
    async fn create(&self, post: &Post, topic_ids: &[i64]) -> Result<Post>;

    /// Overwrite a post; when `topic_ids` is given the topic set is replaced
    async fn update(&self, post: &Post, topic_ids: Option<&[i64]>) -> Result<Post>;

    /// Delete a post; returns false when no row matched
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Get post by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    /// Get post by slug, any status
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>>;

    /// Check whether a slug is taken, optionally ignoring one post
    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// Filtered admin listing ordered by creation time (oldest first),
    /// together with the total number of matches
    async fn list_admin(&self, filter: &PostFilter, params: &ListParams) -> Result<(Vec<Post>, i64)>;

    /// Published posts of a topic, newest publication first
    async fn list_published_by_topic(&self, topic_id: i64) -> Result<Vec<Post>>;
}

/// SQLx-based post repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    /// Create a new SQLx post repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

const INSERT_POST: &str = r#"
    INSERT INTO posts (title, slug, content, author_id, status, published_at, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_POST: &str = r#"
    UPDATE posts
    SET title = ?, slug = ?, content = ?, author_id = ?, status = ?, published_at = ?, updated_at = ?
    WHERE id = ?
"#;

const DELETE_POST: &str = "DELETE FROM posts WHERE id = ?";

const DELETE_POST_TOPICS: &str = "DELETE FROM post_topics WHERE post_id = ?";

const INSERT_POST_TOPIC_SQLITE: &str =
    "INSERT OR IGNORE INTO post_topics (post_id, topic_id) VALUES (?, ?)";

const INSERT_POST_TOPIC_MYSQL: &str =
    "INSERT IGNORE INTO post_topics (post_id, topic_id) VALUES (?, ?)";

const SELECT_POST_BY_ID: &str = r#"
    SELECT id, title, slug, content, author_id, status, published_at, created_at, updated_at
    FROM posts
    WHERE id = ?
"#;

const SELECT_POST_BY_SLUG: &str = r#"
    SELECT id, title, slug, content, author_id, status, published_at, created_at, updated_at
    FROM posts
    WHERE slug = ?
"#;

const COUNT_SLUG: &str =
    "SELECT COUNT(*) AS count FROM posts WHERE slug = ? AND (? IS NULL OR id <> ?)";

// Bind order for both admin queries: status x2, topic x2, pattern x4.
const LIST_ADMIN: &str = r#"
    SELECT p.id, p.title, p.slug, p.content, p.author_id, p.status, p.published_at,
           p.created_at, p.updated_at
    FROM posts p
    INNER JOIN users u ON u.id = p.author_id
    WHERE (? IS NULL OR p.status = ?)
      AND (? IS NULL OR EXISTS (
            SELECT 1 FROM post_topics pt WHERE pt.post_id = p.id AND pt.topic_id = ?))
      AND (? IS NULL OR p.title LIKE ? ESCAPE '!' OR u.username LIKE ? ESCAPE '!' OR u.display_name LIKE ? ESCAPE '!')
    ORDER BY p.created_at ASC, p.id ASC
    LIMIT ? OFFSET ?
"#;

const COUNT_ADMIN: &str = r#"
    SELECT COUNT(*) AS count
    FROM posts p
    INNER JOIN users u ON u.id = p.author_id
    WHERE (? IS NULL OR p.status = ?)
      AND (? IS NULL OR EXISTS (
            SELECT 1 FROM post_topics pt WHERE pt.post_id = p.id AND pt.topic_id = ?))
      AND (? IS NULL OR p.title LIKE ? ESCAPE '!' OR u.username LIKE ? ESCAPE '!' OR u.display_name LIKE ? ESCAPE '!')
"#;

const LIST_PUBLISHED_BY_TOPIC: &str = r#"
    SELECT p.id, p.title, p.slug, p.content, p.author_id, p.status, p.published_at,
           p.created_at, p.updated_at
    FROM posts p
    INNER JOIN post_topics pt ON pt.post_id = p.id
    WHERE pt.topic_id = ? AND p.status = 'published'
    ORDER BY p.published_at DESC, p.id DESC
"#;

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, post: &Post, topic_ids: &[i64]) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_post_sqlite(self.pool.sqlite()?, post, topic_ids).await,
            DatabaseDriver::Mysql => create_post_mysql(self.pool.mysql()?, post, topic_ids).await,
        }
    }

    async fn update(&self, post: &Post, topic_ids: Option<&[i64]>) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_post_sqlite(self.pool.sqlite()?, post, topic_ids).await,
            DatabaseDriver::Mysql => update_post_mysql(self.pool.mysql()?, post, topic_ids).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        // Junction rows and comments cascade.
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(DELETE_POST)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete post")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(DELETE_POST)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete post")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(SELECT_POST_BY_ID)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get post by ID")?;
                row.as_ref().map(row_to_post_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(SELECT_POST_BY_ID)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get post by ID")?;
                row.as_ref().map(row_to_post_mysql).transpose()
            }
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(SELECT_POST_BY_SLUG)
                    .bind(slug)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get post by slug")?;
                row.as_ref().map(row_to_post_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(SELECT_POST_BY_SLUG)
                    .bind(slug)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get post by slug")?;
                row.as_ref().map(row_to_post_mysql).transpose()
            }
        }
    }

    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(COUNT_SLUG)
                .bind(slug)
                .bind(exclude_id)
                .bind(exclude_id)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to check post slug")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(COUNT_SLUG)
                .bind(slug)
                .bind(exclude_id)
                .bind(exclude_id)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to check post slug")?
                .get("count"),
        };
        Ok(count > 0)
    }

    async fn list_admin(&self, filter: &PostFilter, params: &ListParams) -> Result<(Vec<Post>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_admin_sqlite(self.pool.sqlite()?, filter, params).await,
            DatabaseDriver::Mysql => list_admin_mysql(self.pool.mysql()?, filter, params).await,
        }
    }

    async fn list_published_by_topic(&self, topic_id: i64) -> Result<Vec<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(LIST_PUBLISHED_BY_TOPIC)
                    .bind(topic_id)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list published posts for topic")?;
                rows.iter().map(row_to_post_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(LIST_PUBLISHED_BY_TOPIC)
                    .bind(topic_id)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list published posts for topic")?;
                rows.iter().map(row_to_post_mysql).collect()
            }
        }
    }
}

fn parse_status(raw: &str) -> Result<PostStatus> {
    PostStatus::from_str(raw).ok_or_else(|| anyhow!("Invalid post status in database: {}", raw))
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(pool: &SqlitePool, post: &Post, topic_ids: &[i64]) -> Result<Post> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let id = sqlx::query(INSERT_POST)
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.content)
        .bind(post.author_id)
        .bind(post.status.as_str())
        .bind(post.published_at)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&mut *tx)
        .await
        .context("Failed to create post")?
        .last_insert_rowid();

    for topic_id in topic_ids {
        sqlx::query(INSERT_POST_TOPIC_SQLITE)
            .bind(id)
            .bind(topic_id)
            .execute(&mut *tx)
            .await
            .context("Failed to link topic to post")?;
    }

    tx.commit().await.context("Failed to commit post")?;

    Ok(Post {
        id,
        ..post.clone()
    })
}

async fn update_post_sqlite(
    pool: &SqlitePool,
    post: &Post,
    topic_ids: Option<&[i64]>,
) -> Result<Post> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query(UPDATE_POST)
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.content)
        .bind(post.author_id)
        .bind(post.status.as_str())
        .bind(post.published_at)
        .bind(post.updated_at)
        .bind(post.id)
        .execute(&mut *tx)
        .await
        .context("Failed to update post")?;

    if let Some(topic_ids) = topic_ids {
        sqlx::query(DELETE_POST_TOPICS)
            .bind(post.id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear post topics")?;
        for topic_id in topic_ids {
            sqlx::query(INSERT_POST_TOPIC_SQLITE)
                .bind(post.id)
                .bind(topic_id)
                .execute(&mut *tx)
                .await
                .context("Failed to link topic to post")?;
        }
    }

    tx.commit().await.context("Failed to commit post")?;
    Ok(post.clone())
}

async fn list_admin_sqlite(
    pool: &SqlitePool,
    filter: &PostFilter,
    params: &ListParams,
) -> Result<(Vec<Post>, i64)> {
    let status = filter.status.map(|s| s.as_str());
    let pattern = like_pattern(filter.search.as_deref());

    let rows = sqlx::query(LIST_ADMIN)
        .bind(status)
        .bind(status)
        .bind(filter.topic_id)
        .bind(filter.topic_id)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list posts")?;

    let total: i64 = sqlx::query(COUNT_ADMIN)
        .bind(status)
        .bind(status)
        .bind(filter.topic_id)
        .bind(filter.topic_id)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?
        .get("count");

    let posts = rows.iter().map(row_to_post_sqlite).collect::<Result<Vec<_>>>()?;
    Ok((posts, total))
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
    let status: String = row.get("status");
    Ok(Post {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        content: row.get("content"),
        author_id: row.get("author_id"),
        status: parse_status(&status)?,
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_post_mysql(pool: &MySqlPool, post: &Post, topic_ids: &[i64]) -> Result<Post> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let id = sqlx::query(INSERT_POST)
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.content)
        .bind(post.author_id)
        .bind(post.status.as_str())
        .bind(post.published_at)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&mut *tx)
        .await
        .context("Failed to create post")?
        .last_insert_id() as i64;

    for topic_id in topic_ids {
        sqlx::query(INSERT_POST_TOPIC_MYSQL)
            .bind(id)
            .bind(topic_id)
            .execute(&mut *tx)
            .await
            .context("Failed to link topic to post")?;
    }

    tx.commit().await.context("Failed to commit post")?;

    Ok(Post {
        id,
        ..post.clone()
    })
}

async fn update_post_mysql(
    pool: &MySqlPool,
    post: &Post,
    topic_ids: Option<&[i64]>,
) -> Result<Post> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query(UPDATE_POST)
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.content)
        .bind(post.author_id)
        .bind(post.status.as_str())
        .bind(post.published_at)
        .bind(post.updated_at)
        .bind(post.id)
        .execute(&mut *tx)
        .await
        .context("Failed to update post")?;

    if let Some(topic_ids) = topic_ids {
        sqlx::query(DELETE_POST_TOPICS)
            .bind(post.id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear post topics")?;
        for topic_id in topic_ids {
            sqlx::query(INSERT_POST_TOPIC_MYSQL)
                .bind(post.id)
                .bind(topic_id)
                .execute(&mut *tx)
                .await
                .context("Failed to link topic to post")?;
        }
    }

    tx.commit().await.context("Failed to commit post")?;
    Ok(post.clone())
}

async fn list_admin_mysql(
    pool: &MySqlPool,
    filter: &PostFilter,
    params: &ListParams,
) -> Result<(Vec<Post>, i64)> {
    let status = filter.status.map(|s| s.as_str());
    let pattern = like_pattern(filter.search.as_deref());

    let rows = sqlx::query(LIST_ADMIN)
        .bind(status)
        .bind(status)
        .bind(filter.topic_id)
        .bind(filter.topic_id)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list posts")?;

    let total: i64 = sqlx::query(COUNT_ADMIN)
        .bind(status)
        .bind(status)
        .bind(filter.topic_id)
        .bind(filter.topic_id)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?
        .get("count");

    let posts = rows.iter().map(row_to_post_mysql).collect::<Result<Vec<_>>>()?;
    Ok((posts, total))
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Post> {
    let status: String = row.get("status");
    Ok(Post {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        content: row.get("content"),
        author_id: row.get("author_id"),
        status: parse_status(&status)?,
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
