//! User repository
//!
//! Database operations for post authors.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::User;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by username
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// List all users ordered by username
    async fn list(&self) -> Result<Vec<User>>;
}

/// SQLx-based user repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

const INSERT_USER: &str = r#"
    INSERT INTO users (username, email, display_name, created_at)
    VALUES (?, ?, ?, ?)
"#;

const SELECT_USER_BY_ID: &str = r#"
    SELECT id, username, email, display_name, created_at
    FROM users
    WHERE id = ?
"#;

const SELECT_USER_BY_USERNAME: &str = r#"
    SELECT id, username, email, display_name, created_at
    FROM users
    WHERE username = ?
"#;

const LIST_USERS: &str = r#"
    SELECT id, username, email, display_name, created_at
    FROM users
    ORDER BY username
"#;

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_user_sqlite(self.pool.sqlite()?, user).await,
            DatabaseDriver::Mysql => create_user_mysql(self.pool.mysql()?, user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(SELECT_USER_BY_ID)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get user by ID")?;
                Ok(row.as_ref().map(row_to_user_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(SELECT_USER_BY_ID)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get user by ID")?;
                Ok(row.as_ref().map(row_to_user_mysql))
            }
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(SELECT_USER_BY_USERNAME)
                    .bind(username)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get user by username")?;
                Ok(row.as_ref().map(row_to_user_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(SELECT_USER_BY_USERNAME)
                    .bind(username)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get user by username")?;
                Ok(row.as_ref().map(row_to_user_mysql))
            }
        }
    }

    async fn list(&self) -> Result<Vec<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(LIST_USERS)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list users")?;
                Ok(rows.iter().map(row_to_user_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(LIST_USERS)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list users")?;
                Ok(rows.iter().map(row_to_user_mysql).collect())
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let result = sqlx::query(INSERT_USER)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(user.created_at)
        .execute(pool)
        .await
        .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        ..user.clone()
    })
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        display_name: row.get("display_name"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let result = sqlx::query(INSERT_USER)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(user.created_at)
        .execute(pool)
        .await
        .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_id() as i64,
        ..user.clone()
    })
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        display_name: row.get("display_name"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::Utc;

    async fn setup_test_repo() -> SqlxUserRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxUserRepository::new(pool)
    }

    fn new_user(username: &str) -> User {
        User {
            id: 0,
            username: username.to_string(),
            email: format!("{}@multiverse.example", username),
            display_name: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let repo = setup_test_repo().await;

        let created = repo.create(&new_user("liliana")).await.expect("Failed to create user");
        assert!(created.id > 0);

        let by_id = repo.get_by_id(created.id).await.expect("Failed to get user");
        assert_eq!(by_id.map(|u| u.username), Some("liliana".to_string()));

        let by_name = repo.get_by_username("liliana").await.expect("Failed to get user");
        assert_eq!(by_name.map(|u| u.id), Some(created.id));

        assert!(repo.get_by_id(999).await.expect("Failed to get user").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let repo = setup_test_repo().await;
        repo.create(&new_user("gideon")).await.expect("Failed to create user");
        assert!(repo.create(&new_user("gideon")).await.is_err());
    }

    #[tokio::test]
    async fn test_list_users_ordered_by_username() {
        let repo = setup_test_repo().await;
        for name in ["sorin", "ajani", "nahiri"] {
            repo.create(&new_user(name)).await.expect("Failed to create user");
        }

        let names: Vec<String> = repo
            .list()
            .await
            .expect("Failed to list users")
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["ajani", "nahiri", "sorin"]);
    }
}
