//! Comment repository
//!
//! Database operations for reader comments and their moderation flag.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Comment, CommentFilter, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

use super::like_pattern;

#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Insert a comment
    async fn create(&self, comment: &Comment) -> Result<Comment>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// Comments of a post, newest first; `approved_only` hides pending ones
    async fn list_by_post(&self, post_id: i64, approved_only: bool) -> Result<Vec<Comment>>;

    /// Filtered admin listing, newest first, with the total number of matches
    async fn list_admin(&self, filter: &CommentFilter, params: &ListParams) -> Result<(Vec<Comment>, i64)>;

    /// Set the moderation flag; returns false when no row matched
    async fn set_approved(&self, id: i64, approved: bool, updated_at: DateTime<Utc>) -> Result<bool>;

    /// Delete a comment; returns false when no row matched
    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

const INSERT_COMMENT: &str = r#"
    INSERT INTO comments (post_id, name, email, text, approved, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?)
"#;

const SELECT_COMMENT_BY_ID: &str = r#"
    SELECT id, post_id, name, email, text, approved, created_at, updated_at
    FROM comments
    WHERE id = ?
"#;

const LIST_BY_POST: &str = r#"
    SELECT id, post_id, name, email, text, approved, created_at, updated_at
    FROM comments
    WHERE post_id = ? AND (? = 0 OR approved = ?)
    ORDER BY created_at DESC, id DESC
"#;

// Bind order: approved x2, post x2, pattern x4.
const LIST_ADMIN: &str = r#"
    SELECT id, post_id, name, email, text, approved, created_at, updated_at
    FROM comments
    WHERE (? IS NULL OR approved = ?)
      AND (? IS NULL OR post_id = ?)
      AND (? IS NULL OR name LIKE ? ESCAPE '!' OR email LIKE ? ESCAPE '!' OR text LIKE ? ESCAPE '!')
    ORDER BY created_at DESC, id DESC
    LIMIT ? OFFSET ?
"#;

const COUNT_ADMIN: &str = r#"
    SELECT COUNT(*) AS count
    FROM comments
    WHERE (? IS NULL OR approved = ?)
      AND (? IS NULL OR post_id = ?)
      AND (? IS NULL OR name LIKE ? ESCAPE '!' OR email LIKE ? ESCAPE '!' OR text LIKE ? ESCAPE '!')
"#;

const SET_APPROVED: &str = "UPDATE comments SET approved = ?, updated_at = ? WHERE id = ?";

const DELETE_COMMENT: &str = "DELETE FROM comments WHERE id = ?";

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, comment: &Comment) -> Result<Comment> {
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_COMMENT)
                .bind(comment.post_id)
                .bind(&comment.name)
                .bind(&comment.email)
                .bind(&comment.text)
                .bind(comment.approved)
                .bind(comment.created_at)
                .bind(comment.updated_at)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create comment")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(INSERT_COMMENT)
                .bind(comment.post_id)
                .bind(&comment.name)
                .bind(&comment.email)
                .bind(&comment.text)
                .bind(comment.approved)
                .bind(comment.created_at)
                .bind(comment.updated_at)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create comment")?
                .last_insert_id() as i64,
        };

        Ok(Comment {
            id,
            ..comment.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(SELECT_COMMENT_BY_ID)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get comment")?;
                Ok(row.as_ref().map(row_to_comment_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(SELECT_COMMENT_BY_ID)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get comment")?;
                Ok(row.as_ref().map(row_to_comment_mysql))
            }
        }
    }

    async fn list_by_post(&self, post_id: i64, approved_only: bool) -> Result<Vec<Comment>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(LIST_BY_POST)
                    .bind(post_id)
                    .bind(approved_only)
                    .bind(true)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list comments for post")?;
                Ok(rows.iter().map(row_to_comment_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(LIST_BY_POST)
                    .bind(post_id)
                    .bind(approved_only)
                    .bind(true)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list comments for post")?;
                Ok(rows.iter().map(row_to_comment_mysql).collect())
            }
        }
    }

    async fn list_admin(&self, filter: &CommentFilter, params: &ListParams) -> Result<(Vec<Comment>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_admin_sqlite(self.pool.sqlite()?, filter, params).await,
            DatabaseDriver::Mysql => list_admin_mysql(self.pool.mysql()?, filter, params).await,
        }
    }

    async fn set_approved(&self, id: i64, approved: bool, updated_at: DateTime<Utc>) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SET_APPROVED)
                .bind(approved)
                .bind(updated_at)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to update comment approval")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(SET_APPROVED)
                .bind(approved)
                .bind(updated_at)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to update comment approval")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(DELETE_COMMENT)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete comment")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(DELETE_COMMENT)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete comment")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn list_admin_sqlite(
    pool: &SqlitePool,
    filter: &CommentFilter,
    params: &ListParams,
) -> Result<(Vec<Comment>, i64)> {
    let pattern = like_pattern(filter.search.as_deref());

    let rows = sqlx::query(LIST_ADMIN)
        .bind(filter.approved)
        .bind(filter.approved)
        .bind(filter.post_id)
        .bind(filter.post_id)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list comments")?;

    let total: i64 = sqlx::query(COUNT_ADMIN)
        .bind(filter.approved)
        .bind(filter.approved)
        .bind(filter.post_id)
        .bind(filter.post_id)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .fetch_one(pool)
        .await
        .context("Failed to count comments")?
        .get("count");

    Ok((rows.iter().map(row_to_comment_sqlite).collect(), total))
}

fn row_to_comment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        name: row.get("name"),
        email: row.get("email"),
        text: row.get("text"),
        approved: row.get("approved"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn list_admin_mysql(
    pool: &MySqlPool,
    filter: &CommentFilter,
    params: &ListParams,
) -> Result<(Vec<Comment>, i64)> {
    let pattern = like_pattern(filter.search.as_deref());

    let rows = sqlx::query(LIST_ADMIN)
        .bind(filter.approved)
        .bind(filter.approved)
        .bind(filter.post_id)
        .bind(filter.post_id)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list comments")?;

    let total: i64 = sqlx::query(COUNT_ADMIN)
        .bind(filter.approved)
        .bind(filter.approved)
        .bind(filter.post_id)
        .bind(filter.post_id)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .fetch_one(pool)
        .await
        .context("Failed to count comments")?
        .get("count");

    Ok((rows.iter().map(row_to_comment_mysql).collect(), total))
}

fn row_to_comment_mysql(row: &sqlx::mysql::MySqlRow) -> Comment {
    Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        name: row.get("name"),
        email: row.get("email"),
        text: row.get("text"),
        approved: row.get("approved"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
