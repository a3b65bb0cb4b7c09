//! Topic service
//!
//! Business logic for topics:
//! - Create/update with slug derivation and uniqueness checks
//! - Ranked "top topics" for the home page and sidebar, cached
//! - Topic listings with post counts for the public API

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{top_topics_key, Cache, CacheLayer, TOPICS_PATTERN};
use crate::db::repositories::TopicRepository;
use crate::models::{CreateTopicInput, Topic, TopicWithCount, UpdateTopicInput};
use crate::services::ranking::rank_topics;
use crate::services::slug::{slug_or_derive, slugify};

/// Longest topic name and slug
pub const TOPIC_NAME_MAX_LEN: usize = 100;

/// Error types for topic service operations
#[derive(Debug, thiserror::Error)]
pub enum TopicServiceError {
    #[error("Topic not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Topic name already exists: {0}")]
    DuplicateName(String),

    #[error("Topic slug already exists: {0}")]
    DuplicateSlug(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Drop every cached topic ranking. Failures are logged, never returned.
pub async fn invalidate_topic_cache(cache: &Cache) {
    if let Err(e) = cache.delete_pattern(TOPICS_PATTERN).await {
        tracing::warn!("Failed to invalidate topic cache: {}", e);
    }
}

/// Ranked topics as cached, stamped with the cache generation they were
/// computed under
#[derive(Debug, Serialize, Deserialize)]
struct CachedRanking {
    generation: u64,
    topics: Vec<Topic>,
}

pub struct TopicService {
    repo: Arc<dyn TopicRepository>,
    cache: Cache,
    cache_ttl: Duration,
}

impl TopicService {
    pub fn new(repo: Arc<dyn TopicRepository>, cache: Cache, cache_ttl: Duration) -> Self {
        Self {
            repo,
            cache,
            cache_ttl,
        }
    }

    /// Create a topic. The slug is taken from the input or derived from the name.
    ///
    /// # Errors
    /// - `ValidationError` for a blank or too long name, or an unusable slug
    /// - `DuplicateName` / `DuplicateSlug` when another topic already uses them
    pub async fn create(&self, input: CreateTopicInput) -> Result<Topic, TopicServiceError> {
        let name = validate_name(&input.name)?;
        let slug = validate_slug(slug_or_derive(input.slug.as_deref(), &name))?;

        self.ensure_unique(&name, &slug, None).await?;

        let created = self
            .repo
            .create(&Topic::new(name, slug))
            .await
            .context("Failed to create topic")?;

        tracing::info!("Created topic {} ({})", created.name, created.slug);
        invalidate_topic_cache(&self.cache).await;
        Ok(created)
    }

    /// Update a topic. Absent fields are kept; a blank slug is re-derived from the name.
    pub async fn update(&self, id: i64, input: UpdateTopicInput) -> Result<Topic, TopicServiceError> {
        let mut topic = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get topic by ID")?
            .ok_or_else(|| TopicServiceError::NotFound(id.to_string()))?;

        if let Some(name) = input.name.as_deref() {
            topic.name = validate_name(name)?;
        }
        match input.slug.as_deref().map(str::trim) {
            Some("") => topic.slug = validate_slug(slugify(&topic.name))?,
            Some(slug) => topic.slug = validate_slug(slugify(slug))?,
            None => {}
        }

        self.ensure_unique(&topic.name, &topic.slug, Some(id)).await?;

        let updated = self
            .repo
            .update(&topic)
            .await
            .context("Failed to update topic")?;

        invalidate_topic_cache(&self.cache).await;
        Ok(updated)
    }

    /// Delete a topic; its post associations go with it
    pub async fn delete(&self, id: i64) -> Result<(), TopicServiceError> {
        let deleted = self
            .repo
            .delete(id)
            .await
            .context("Failed to delete topic")?;
        if !deleted {
            return Err(TopicServiceError::NotFound(id.to_string()));
        }

        tracing::info!("Deleted topic {}", id);
        invalidate_topic_cache(&self.cache).await;
        Ok(())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Topic>, TopicServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get topic by ID")
            .map_err(Into::into)
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Topic>, TopicServiceError> {
        self.repo
            .get_by_slug(slug)
            .await
            .context("Failed to get topic by slug")
            .map_err(Into::into)
    }

    /// All topics, alphabetical by name
    pub async fn list(&self) -> Result<Vec<Topic>, TopicServiceError> {
        self.repo
            .list()
            .await
            .context("Failed to list topics")
            .map_err(Into::into)
    }

    /// All topics with their post counts, alphabetical by name
    pub async fn list_with_counts(&self) -> Result<Vec<TopicWithCount>, TopicServiceError> {
        let mut topics = self
            .repo
            .list_with_counts()
            .await
            .context("Failed to list topics with counts")?;
        topics.sort_by(|a, b| a.topic.name.cmp(&b.topic.name).then(a.topic.id.cmp(&b.topic.id)));
        Ok(topics)
    }

    /// The `limit` most-used topics, most posts first
    ///
    /// Rankings computed while an invalidation runs are written back with
    /// the generation read before counting, so the next read ignores them.
    pub async fn top_topics(&self, limit: usize) -> Result<Vec<Topic>, TopicServiceError> {
        let key = top_topics_key(limit);
        let generation = self.cache.generation();

        match self.cache.get::<CachedRanking>(&key).await {
            Ok(Some(cached)) if cached.generation == generation => return Ok(cached.topics),
            Ok(_) => {}
            Err(e) => tracing::warn!("Failed to read topic cache {}: {}", key, e),
        }

        let counts = self
            .repo
            .list_with_counts()
            .await
            .context("Failed to count posts per topic")?;
        let ranking = CachedRanking {
            generation,
            topics: rank_topics(counts, limit),
        };

        if let Err(e) = self.cache.set(&key, &ranking, self.cache_ttl).await {
            tracing::warn!("Failed to cache {}: {}", key, e);
        }
        Ok(ranking.topics)
    }

    async fn ensure_unique(
        &self,
        name: &str,
        slug: &str,
        exclude_id: Option<i64>,
    ) -> Result<(), TopicServiceError> {
        let is_other = |topic: &Topic| Some(topic.id) != exclude_id;

        if let Some(existing) = self
            .repo
            .get_by_name(name)
            .await
            .context("Failed to check topic name")?
        {
            if is_other(&existing) {
                return Err(TopicServiceError::DuplicateName(name.to_string()));
            }
        }

        if let Some(existing) = self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to check topic slug")?
        {
            if is_other(&existing) {
                return Err(TopicServiceError::DuplicateSlug(slug.to_string()));
            }
        }

        Ok(())
    }
}

fn validate_name(name: &str) -> Result<String, TopicServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TopicServiceError::ValidationError(
            "Topic name cannot be empty".to_string(),
        ));
    }
    if name.chars().count() > TOPIC_NAME_MAX_LEN {
        return Err(TopicServiceError::ValidationError(format!(
            "Topic name must be at most {} characters",
            TOPIC_NAME_MAX_LEN
        )));
    }
    Ok(name.to_string())
}

fn validate_slug(slug: String) -> Result<String, TopicServiceError> {
    if slug.is_empty() {
        return Err(TopicServiceError::ValidationError(
            "Topic slug cannot be empty".to_string(),
        ));
    }
    if slug.len() > TOPIC_NAME_MAX_LEN {
        return Err(TopicServiceError::ValidationError(format!(
            "Topic slug must be at most {} characters",
            TOPIC_NAME_MAX_LEN
        )));
    }
    Ok(slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::SqlxTopicRepository;
    use crate::db::{create_test_pool, migrations, DynDatabasePool};

    async fn setup() -> (DynDatabasePool, TopicService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let service = TopicService::new(
            SqlxTopicRepository::boxed(pool.clone()),
            Arc::new(MemoryCache::new()),
            Duration::from_secs(60),
        );
        (pool, service)
    }

    async fn add_post(pool: &DynDatabasePool, slug: &str, topic_ids: &[i64]) {
        let sqlite = pool.sqlite().unwrap();
        sqlx::query("INSERT OR IGNORE INTO users (username, email) VALUES ('teferi', 'teferi@zhalfir.example')")
            .execute(sqlite)
            .await
            .unwrap();
        let post_id = sqlx::query(
            "INSERT INTO posts (title, slug, author_id) SELECT ?, ?, id FROM users WHERE username = 'teferi'",
        )
        .bind(slug)
        .bind(slug)
        .execute(sqlite)
        .await
        .unwrap()
        .last_insert_rowid();
        for topic_id in topic_ids {
            sqlx::query("INSERT INTO post_topics (post_id, topic_id) VALUES (?, ?)")
                .bind(post_id)
                .bind(topic_id)
                .execute(sqlite)
                .await
                .unwrap();
        }
    }

    fn input(name: &str) -> CreateTopicInput {
        CreateTopicInput {
            name: name.to_string(),
            slug: None,
        }
    }

    #[tokio::test]
    async fn test_create_derives_slug() {
        let (_pool, service) = setup().await;
        let topic = service.create(input("  Modern Horizons 3 ")).await.unwrap();
        assert_eq!(topic.name, "Modern Horizons 3");
        assert_eq!(topic.slug, "modern-horizons-3");
    }

    #[tokio::test]
    async fn test_create_rejects_blank_and_duplicates() {
        let (_pool, service) = setup().await;
        assert!(matches!(
            service.create(input("   ")).await,
            Err(TopicServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.create(input("!!!")).await,
            Err(TopicServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.create(input(&"x".repeat(101))).await,
            Err(TopicServiceError::ValidationError(_))
        ));

        service.create(input("Commander")).await.unwrap();
        assert!(matches!(
            service.create(input("Commander")).await,
            Err(TopicServiceError::DuplicateName(_))
        ));
        let clash = CreateTopicInput {
            name: "EDH".to_string(),
            slug: Some("commander".to_string()),
        };
        assert!(matches!(
            service.create(clash).await,
            Err(TopicServiceError::DuplicateSlug(_))
        ));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (_pool, service) = setup().await;
        let topic = service.create(input("Pauper")).await.unwrap();
        let other = service.create(input("Legacy")).await.unwrap();

        let renamed = service
            .update(
                topic.id,
                UpdateTopicInput {
                    name: Some("Pauper Cube".to_string()),
                    slug: Some(String::new()),
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.slug, "pauper-cube");

        // Keeping its own name is not a duplicate
        service
            .update(topic.id, UpdateTopicInput { name: Some("Pauper Cube".to_string()), slug: None })
            .await
            .unwrap();

        assert!(matches!(
            service
                .update(other.id, UpdateTopicInput { name: Some("Pauper Cube".to_string()), slug: None })
                .await,
            Err(TopicServiceError::DuplicateName(_))
        ));

        service.delete(topic.id).await.unwrap();
        assert!(service.get_by_id(topic.id).await.unwrap().is_none());
        assert!(matches!(
            service.delete(topic.id).await,
            Err(TopicServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.update(topic.id, UpdateTopicInput::default()).await,
            Err(TopicServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_top_topics_ranks_and_skips_empty() {
        let (pool, service) = setup().await;
        let python = service.create(input("Python")).await.unwrap();
        let django = service.create(input("Django")).await.unwrap();
        service.create(input("Empty")).await.unwrap();

        for i in 0..5 {
            add_post(&pool, &format!("py-{}", i), &[python.id]).await;
        }
        for i in 0..3 {
            add_post(&pool, &format!("dj-{}", i), &[django.id]).await;
        }

        let top = service.top_topics(10).await.unwrap();
        let names: Vec<&str> = top.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Python", "Django"]);

        assert_eq!(service.top_topics(1).await.unwrap().len(), 1);
        assert!(service.top_topics(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_top_topics_cache_is_invalidated_by_topic_changes() {
        let (pool, service) = setup().await;
        let vintage = service.create(input("Vintage")).await.unwrap();
        add_post(&pool, "moxen", &[vintage.id]).await;

        let first = service.top_topics(5).await.unwrap();
        assert_eq!(first[0].name, "Vintage");

        // Served from cache until a topic mutation
        add_post(&pool, "lotus", &[]).await;
        service
            .update(vintage.id, UpdateTopicInput { name: Some("Vintage Cube".to_string()), slug: None })
            .await
            .unwrap();

        let refreshed = service.top_topics(5).await.unwrap();
        assert_eq!(refreshed[0].name, "Vintage Cube");
    }

    #[tokio::test]
    async fn test_ranking_written_back_after_invalidation_is_ignored() {
        let (pool, service) = setup().await;
        let legacy = service.create(input("Legacy")).await.unwrap();
        let pauper = service.create(input("Pauper")).await.unwrap();
        add_post(&pool, "wasteland", &[legacy.id]).await;

        // A reader counted before the invalidation and stores its result after it
        let stale_generation = service.cache.generation();
        let stale = service.top_topics(5).await.unwrap();
        assert_eq!(stale.len(), 1);

        add_post(&pool, "kor-skyfisher", &[pauper.id]).await;
        add_post(&pool, "spellstutter", &[pauper.id]).await;
        invalidate_topic_cache(&service.cache).await;

        let write_back = CachedRanking {
            generation: stale_generation,
            topics: stale,
        };
        service
            .cache
            .set(&top_topics_key(5), &write_back, Duration::from_secs(60))
            .await
            .unwrap();

        let names: Vec<String> = service
            .top_topics(5)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, ["Pauper", "Legacy"]);
    }

    #[tokio::test]
    async fn test_list_with_counts_is_alphabetical() {
        let (pool, service) = setup().await;
        let zen = service.create(input("Zendikar")).await.unwrap();
        service.create(input("Alara")).await.unwrap();
        add_post(&pool, "landfall", &[zen.id]).await;

        let listed = service.list_with_counts().await.unwrap();
        assert_eq!(listed[0].topic.name, "Alara");
        assert_eq!(listed[0].post_count, 0);
        assert_eq!(listed[1].topic.name, "Zendikar");
        assert_eq!(listed[1].post_count, 1);
    }
}
