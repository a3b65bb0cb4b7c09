//! Photo submission repository
//!
//! Contest entries are insert-only; there is no update operation.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ListParams, NewPhotoSubmission, PhotoSubmission, SubmissionFilter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

use super::like_pattern;

#[async_trait]
pub trait PhotoSubmissionRepository: Send + Sync {
    async fn create(&self, submission: &NewPhotoSubmission) -> Result<PhotoSubmission>;

    async fn get_by_id(&self, id: i64) -> Result<Option<PhotoSubmission>>;

    /// Filtered admin listing, newest first, with the total number of matches
    async fn list_admin(
        &self,
        filter: &SubmissionFilter,
        params: &ListParams,
    ) -> Result<(Vec<PhotoSubmission>, i64)>;

    /// Delete an entry; returns false when no row matched
    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxPhotoSubmissionRepository {
    pool: DynDatabasePool,
}

impl SqlxPhotoSubmissionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PhotoSubmissionRepository> {
        Arc::new(Self::new(pool))
    }
}

const INSERT_SUBMISSION: &str = r#"
    INSERT INTO photo_submissions (name, email, photo, submission_date)
    VALUES (?, ?, ?, ?)
"#;

const SELECT_SUBMISSION_BY_ID: &str = r#"
    SELECT id, name, email, photo, submission_date
    FROM photo_submissions
    WHERE id = ?
"#;

// Bind order: pattern x3, from x2, to x2.
const LIST_ADMIN: &str = r#"
    SELECT id, name, email, photo, submission_date
    FROM photo_submissions
    WHERE (? IS NULL OR name LIKE ? ESCAPE '!' OR email LIKE ? ESCAPE '!')
      AND (? IS NULL OR submission_date >= ?)
      AND (? IS NULL OR submission_date < ?)
    ORDER BY submission_date DESC, id DESC
    LIMIT ? OFFSET ?
"#;

const COUNT_ADMIN: &str = r#"
    SELECT COUNT(*) AS count
    FROM photo_submissions
    WHERE (? IS NULL OR name LIKE ? ESCAPE '!' OR email LIKE ? ESCAPE '!')
      AND (? IS NULL OR submission_date >= ?)
      AND (? IS NULL OR submission_date < ?)
"#;

const DELETE_SUBMISSION: &str = "DELETE FROM photo_submissions WHERE id = ?";

/// Half-open `[from, to)` timestamp window covering whole days
fn day_bounds(filter: &SubmissionFilter) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    let start_of = |day: NaiveDate| day.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    let from = filter.from.and_then(start_of);
    let to = filter.to.and_then(|day| day.succ_opt()).and_then(start_of);
    (from, to)
}

#[async_trait]
impl PhotoSubmissionRepository for SqlxPhotoSubmissionRepository {
    async fn create(&self, submission: &NewPhotoSubmission) -> Result<PhotoSubmission> {
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_SUBMISSION)
                .bind(&submission.name)
                .bind(&submission.email)
                .bind(&submission.photo)
                .bind(submission.submission_date)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create photo submission")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(INSERT_SUBMISSION)
                .bind(&submission.name)
                .bind(&submission.email)
                .bind(&submission.photo)
                .bind(submission.submission_date)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create photo submission")?
                .last_insert_id() as i64,
        };

        Ok(PhotoSubmission {
            id,
            name: submission.name.clone(),
            email: submission.email.clone(),
            photo: submission.photo.clone(),
            submission_date: submission.submission_date,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<PhotoSubmission>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(SELECT_SUBMISSION_BY_ID)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get photo submission")?;
                Ok(row.as_ref().map(row_to_submission_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(SELECT_SUBMISSION_BY_ID)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get photo submission")?;
                Ok(row.as_ref().map(row_to_submission_mysql))
            }
        }
    }

    async fn list_admin(
        &self,
        filter: &SubmissionFilter,
        params: &ListParams,
    ) -> Result<(Vec<PhotoSubmission>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_admin_sqlite(self.pool.sqlite()?, filter, params).await,
            DatabaseDriver::Mysql => list_admin_mysql(self.pool.mysql()?, filter, params).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(DELETE_SUBMISSION)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete photo submission")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(DELETE_SUBMISSION)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete photo submission")?
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
    filter: &SubmissionFilter,
    params: &ListParams,
) -> Result<(Vec<PhotoSubmission>, i64)> {
    let pattern = like_pattern(filter.search.as_deref());
    let (from, to) = day_bounds(filter);

    let rows = sqlx::query(LIST_ADMIN)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(from)
        .bind(from)
        .bind(to)
        .bind(to)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list photo submissions")?;

    let total: i64 = sqlx::query(COUNT_ADMIN)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(from)
        .bind(from)
        .bind(to)
        .bind(to)
        .fetch_one(pool)
        .await
        .context("Failed to count photo submissions")?
        .get("count");

    Ok((rows.iter().map(row_to_submission_sqlite).collect(), total))
}

fn row_to_submission_sqlite(row: &sqlx::sqlite::SqliteRow) -> PhotoSubmission {
    PhotoSubmission {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        photo: row.get("photo"),
        submission_date: row.get("submission_date"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn list_admin_mysql(
    pool: &MySqlPool,
    filter: &SubmissionFilter,
    params: &ListParams,
) -> Result<(Vec<PhotoSubmission>, i64)> {
    let pattern = like_pattern(filter.search.as_deref());
    let (from, to) = day_bounds(filter);

    let rows = sqlx::query(LIST_ADMIN)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(from)
        .bind(from)
        .bind(to)
        .bind(to)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list photo submissions")?;

    let total: i64 = sqlx::query(COUNT_ADMIN)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(from)
        .bind(from)
        .bind(to)
        .bind(to)
        .fetch_one(pool)
        .await
        .context("Failed to count photo submissions")?
        .get("count");

    Ok((rows.iter().map(row_to_submission_mysql).collect(), total))
}

fn row_to_submission_mysql(row: &sqlx::mysql::MySqlRow) -> PhotoSubmission {
    PhotoSubmission {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        photo: row.get("photo"),
        submission_date: row.get("submission_date"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::TimeZone;

    async fn setup_test_repo() -> SqlxPhotoSubmissionRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxPhotoSubmissionRepository::new(pool)
    }

    fn entry(name: &str, day: u32, hour: u32) -> NewPhotoSubmission {
        NewPhotoSubmission {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            photo: format!("contest_photos/{}.png", name.to_lowercase()),
            submission_date: Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_create_get_delete() {
        let repo = setup_test_repo().await;
        let created = repo.create(&entry("Elspeth", 1, 10)).await.expect("Failed to create submission");
        assert!(created.id > 0);

        let loaded = repo.get_by_id(created.id).await.unwrap().expect("Submission should exist");
        assert_eq!(loaded, created);

        assert!(repo.delete(created.id).await.unwrap());
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
        assert!(!repo.delete(created.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_admin_orders_newest_first_and_filters() {
        let repo = setup_test_repo().await;
        repo.create(&entry("First", 1, 9)).await.unwrap();
        repo.create(&entry("Second", 2, 23)).await.unwrap();
        repo.create(&entry("Third", 3, 0)).await.unwrap();

        let params = ListParams::new(1, 20);
        let (items, total) = repo.list_admin(&SubmissionFilter::default(), &params).await.unwrap();
        assert_eq!(total, 3);
        let names: Vec<&str> = items.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Third", "Second", "First"]);

        let day_two = SubmissionFilter {
            from: NaiveDate::from_ymd_opt(2024, 6, 2),
            to: NaiveDate::from_ymd_opt(2024, 6, 2),
            ..Default::default()
        };
        let (items, total) = repo.list_admin(&day_two, &params).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].name, "Second");

        let search = SubmissionFilter {
            search: Some("third@".to_string()),
            ..Default::default()
        };
        let (items, _) = repo.list_admin(&search, &params).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Third");
    }

    #[test]
    fn test_day_bounds_cover_the_whole_last_day() {
        let filter = SubmissionFilter {
            from: NaiveDate::from_ymd_opt(2024, 2, 28),
            to: NaiveDate::from_ymd_opt(2024, 2, 29),
            ..Default::default()
        };
        let (from, to) = day_bounds(&filter);
        assert_eq!(from, Some(Utc.with_ymd_and_hms(2024, 2, 28, 0, 0, 0).unwrap()));
        assert_eq!(to, Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()));
    }
}
