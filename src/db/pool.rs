//! Database connection pool abstraction
//!
//! Repositories hold a `DynDatabasePool` and branch on its driver. SQLite
//! is the default single-file deployment; MySQL is selected by config.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    mysql::{MySqlPool, MySqlPoolOptions},
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
};
use std::str::FromStr;
use std::sync::Arc;

use crate::config::{DatabaseConfig, DatabaseDriver};

/// Database pool trait that abstracts over different database backends.
///
/// Repositories match on [`DatabasePool::driver`] and then borrow the
/// concrete pool through [`DatabasePool::sqlite`] or [`DatabasePool::mysql`].
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Execute a raw SQL query that doesn't return rows
    async fn execute(&self, query: &str) -> Result<u64>;

    /// Check if the database connection is healthy
    async fn ping(&self) -> Result<()>;

    /// Close the connection pool
    async fn close(&self);

    /// Get the database driver type
    fn driver(&self) -> DatabaseDriver;

    /// Get the underlying SQLite pool if this is a SQLite connection
    fn as_sqlite(&self) -> Option<&SqlitePool>;

    /// Get the underlying MySQL pool if this is a MySQL connection
    fn as_mysql(&self) -> Option<&MySqlPool>;

    /// The SQLite pool, or an error when the backend is something else
    fn sqlite(&self) -> Result<&SqlitePool> {
        self.as_sqlite()
            .context("Database driver mismatch: expected SQLite pool")
    }

    /// The MySQL pool, or an error when the backend is something else
    fn mysql(&self) -> Result<&MySqlPool> {
        self.as_mysql()
            .context("Database driver mismatch: expected MySQL pool")
    }
}

/// Normalised SQLite location from a configured URL
#[derive(Debug, PartialEq, Eq)]
struct SqliteTarget {
    url: String,
    in_memory: bool,
}

impl SqliteTarget {
    /// Accepts `:memory:`, `sqlite:` URLs and bare file paths
    fn parse(url: &str) -> Self {
        let in_memory = url.starts_with(":memory:") || url.starts_with("sqlite::memory:");
        let url = if url == ":memory:" {
            "sqlite::memory:".to_string()
        } else if url.starts_with("sqlite:") {
            url.to_string()
        } else {
            format!("sqlite:{}", url)
        };
        Self { url, in_memory }
    }

    /// Database file on disk, without URL prefix or query string
    fn file_path(&self) -> Option<&std::path::Path> {
        if self.in_memory {
            return None;
        }
        let path = self.url.trim_start_matches("sqlite:").trim_start_matches("//");
        let path = path.split('?').next().unwrap_or(path);
        Some(std::path::Path::new(path))
    }
}

/// SQLite connection pool implementation
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Open a SQLite pool, creating the file and its parent directories
    /// when missing.
    pub async fn new(url: &str) -> Result<Self> {
        let target = SqliteTarget::parse(url);
        if let Some(parent) = target.file_path().and_then(|p| p.parent()) {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory: {:?}", parent)
                })?;
            }
        }

        // Foreign keys are a per-connection pragma; cascades depend on it.
        let options = SqliteConnectOptions::from_str(&target.url)
            .with_context(|| format!("Invalid SQLite URL: {}", url))?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to `:memory:` opens a separate database
        let pool_options = if target.in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(20)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to SQLite database: {}", url))?;

        Ok(Self { pool })
    }

    /// Get a reference to the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DatabasePool for SqliteDatabase {
    async fn execute(&self, query: &str) -> Result<u64> {
        let result = sqlx::query(query)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to execute query: {}", query))?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Database ping failed")?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn driver(&self) -> DatabaseDriver {
        DatabaseDriver::Sqlite
    }

    fn as_sqlite(&self) -> Option<&SqlitePool> {
        Some(&self.pool)
    }

    fn as_mysql(&self) -> Option<&MySqlPool> {
        None
    }
}

/// MySQL connection pool implementation
pub struct MysqlDatabase {
    pool: MySqlPool,
}

impl MysqlDatabase {
    /// Create a new MySQL connection pool
    pub async fn new(url: &str) -> Result<Self> {
        let connection_url = if url.starts_with("mysql://") {
            url.to_string()
        } else {
            format!("mysql://{}", url)
        };

        let pool = MySqlPoolOptions::new()
            .max_connections(30)
            .connect(&connection_url)
            .await
            .with_context(|| format!("Failed to connect to MySQL database: {}", url))?;

        Ok(Self { pool })
    }

    /// Get a reference to the underlying pool
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl DatabasePool for MysqlDatabase {
    async fn execute(&self, query: &str) -> Result<u64> {
        let result = sqlx::query(query)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to execute query: {}", query))?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Database ping failed")?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn driver(&self) -> DatabaseDriver {
        DatabaseDriver::Mysql
    }

    fn as_sqlite(&self) -> Option<&SqlitePool> {
        None
    }

    fn as_mysql(&self) -> Option<&MySqlPool> {
        Some(&self.pool)
    }
}

/// Type alias for a shared database pool
pub type DynDatabasePool = Arc<dyn DatabasePool>;

/// Create a database connection pool based on configuration.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn create_pool(config: &DatabaseConfig) -> Result<DynDatabasePool> {
    match config.driver {
        DatabaseDriver::Sqlite => {
            let db = SqliteDatabase::new(&config.url).await?;
            Ok(Arc::new(db))
        }
        DatabaseDriver::Mysql => {
            let db = MysqlDatabase::new(&config.url).await?;
            Ok(Arc::new(db))
        }
    }
}

/// Create a SQLite in-memory database pool for testing
pub async fn create_test_pool() -> Result<DynDatabasePool> {
    let config = DatabaseConfig {
        driver: DatabaseDriver::Sqlite,
        url: ":memory:".to_string(),
    };
    create_pool(&config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_pool_creation() {
        let pool = create_test_pool().await.expect("Failed to create pool");
        assert_eq!(pool.driver(), DatabaseDriver::Sqlite);
        assert!(pool.as_sqlite().is_some());
        assert!(pool.as_mysql().is_none());
        assert!(pool.sqlite().is_ok());
        assert!(pool.mysql().is_err());
    }

    #[tokio::test]
    async fn test_sqlite_pool_ping() {
        let pool = create_test_pool().await.expect("Failed to create pool");
        pool.ping().await.expect("Ping should succeed");
    }

    #[test]
    fn test_sqlite_target_parsing() {
        let memory = SqliteTarget::parse(":memory:");
        assert_eq!(memory.url, "sqlite::memory:");
        assert!(memory.in_memory);
        assert_eq!(memory.file_path(), None);

        let bare = SqliteTarget::parse("data/blog.db");
        assert_eq!(bare.url, "sqlite:data/blog.db");
        assert_eq!(bare.file_path(), Some(std::path::Path::new("data/blog.db")));

        let prefixed = SqliteTarget::parse("sqlite://data/blog.db?mode=rwc");
        assert!(!prefixed.in_memory);
        assert_eq!(prefixed.file_path(), Some(std::path::Path::new("data/blog.db")));
    }

    #[tokio::test]
    async fn test_in_memory_pool_keeps_its_data() {
        let pool = create_test_pool().await.expect("Failed to create pool");

        pool.execute("CREATE TABLE decks (id INTEGER PRIMARY KEY, name TEXT)")
            .await
            .expect("Failed to create table");
        let affected = pool
            .execute("INSERT INTO decks (name) VALUES ('Mono-Red Burn')")
            .await
            .expect("Failed to insert");
        assert_eq!(affected, 1);

        let sqlite = pool.sqlite().unwrap();
        assert_eq!(sqlite.options().get_max_connections(), 1);
        for _ in 0..3 {
            let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM decks")
                .fetch_one(sqlite)
                .await
                .expect("Failed to count");
            assert_eq!(count.0, 1);
        }
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let pool = create_test_pool().await.expect("Failed to create pool");
        let row: (i64,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(pool.sqlite().unwrap())
            .await
            .expect("Failed to read pragma");
        assert_eq!(row.0, 1);
    }

    #[tokio::test]
    async fn test_sqlite_nested_directory_creation() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("nested").join("dir").join("blog.db");

        let config = DatabaseConfig {
            driver: DatabaseDriver::Sqlite,
            url: db_path.to_string_lossy().to_string(),
        };

        let pool = create_pool(&config).await.expect("Failed to create pool");
        pool.ping().await.expect("Ping should succeed");

        assert!(db_path.exists());
    }

    #[tokio::test]
    #[ignore = "Requires MySQL server"]
    async fn test_mysql_pool_ping() {
        let url = std::env::var("MYSQL_TEST_URL")
            .unwrap_or_else(|_| "mysql://root@localhost/test".to_string());

        let config = DatabaseConfig {
            driver: DatabaseDriver::Mysql,
            url,
        };

        let pool = create_pool(&config).await.expect("Failed to create pool");
        assert_eq!(pool.driver(), DatabaseDriver::Mysql);
        pool.ping().await.expect("Ping should succeed");
    }
}
