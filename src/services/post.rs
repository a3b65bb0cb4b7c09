//! Post service
//!
//! Implements business logic for posts:
//! - Create/update with slug derivation and the publish lifecycle
//! - Topic associations, written together with the post row
//! - Admin listing with filters and public lookups of published posts

use anyhow::Context;
use std::sync::Arc;

use crate::cache::Cache;
use crate::db::repositories::{PostRepository, TopicRepository, UserRepository};
use crate::models::{
    CreatePostInput, ListParams, PagedResult, Post, PostFilter, PostStatus, PostWithTopics,
    Topic, UpdatePostInput, User,
};
use crate::services::clock::DynClock;
use crate::services::lifecycle::apply_status_transition;
use crate::services::slug::{slug_or_derive, slugify};
use crate::services::topic::invalidate_topic_cache;

/// Longest post title and slug
pub const POST_TITLE_MAX_LEN: usize = 250;

/// Error types for post service operations
#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    #[error("Post not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Post slug already exists: {0}")]
    DuplicateSlug(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct PostService {
    posts: Arc<dyn PostRepository>,
    topics: Arc<dyn TopicRepository>,
    users: Arc<dyn UserRepository>,
    cache: Cache,
    clock: DynClock,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        topics: Arc<dyn TopicRepository>,
        users: Arc<dyn UserRepository>,
        cache: Cache,
        clock: DynClock,
    ) -> Self {
        Self {
            posts,
            topics,
            users,
            cache,
            clock,
        }
    }

    /// Create a post
    ///
    /// # Errors
    /// - `ValidationError` for a bad title or slug, an unknown author or an unknown topic
    /// - `DuplicateSlug` when the slug is taken
    pub async fn create(&self, input: CreatePostInput) -> Result<Post, PostServiceError> {
        let title = validate_title(&input.title)?;
        let slug = validate_slug(slug_or_derive(input.slug.as_deref(), &title))?;
        self.ensure_author(input.author_id).await?;
        let topic_ids = self.validate_topics(&input.topic_ids).await?;

        if self
            .posts
            .exists_by_slug(&slug, None)
            .await
            .context("Failed to check post slug")?
        {
            return Err(PostServiceError::DuplicateSlug(slug));
        }

        let now = self.clock.now();
        let post = Post {
            id: 0,
            title,
            slug,
            content: input.content,
            author_id: input.author_id,
            status: input.status,
            published_at: apply_status_transition(input.status, None, self.clock.as_ref()),
            created_at: now,
            updated_at: now,
        };

        let created = self
            .posts
            .create(&post, &topic_ids)
            .await
            .context("Failed to create post")?;

        tracing::info!("Created post {} ({})", created.slug, created.status);
        invalidate_topic_cache(&self.cache).await;
        Ok(created)
    }

    /// Update a post. Absent fields are left unchanged.
    ///
    /// A blank slug is regenerated from the (possibly new) title, and the
    /// topic set is only replaced when `topic_ids` is given.
    pub async fn update(&self, id: i64, input: UpdatePostInput) -> Result<Post, PostServiceError> {
        let mut post = self.require(id).await?;
        let previous_status = post.status;

        if let Some(title) = input.title.as_deref() {
            post.title = validate_title(title)?;
        }
        match input.slug.as_deref().map(str::trim) {
            Some("") => post.slug = validate_slug(slugify(&post.title))?,
            Some(slug) => post.slug = validate_slug(slugify(slug))?,
            None => {}
        }
        if let Some(content) = input.content {
            post.content = content;
        }
        if let Some(author_id) = input.author_id {
            self.ensure_author(author_id).await?;
            post.author_id = author_id;
        }
        if let Some(status) = input.status {
            post.status = status;
        }

        let topic_ids = match input.topic_ids.as_deref() {
            Some(ids) => Some(self.validate_topics(ids).await?),
            None => None,
        };

        if self
            .posts
            .exists_by_slug(&post.slug, Some(id))
            .await
            .context("Failed to check post slug")?
        {
            return Err(PostServiceError::DuplicateSlug(post.slug));
        }

        post.published_at =
            apply_status_transition(post.status, post.published_at, self.clock.as_ref());
        post.updated_at = self.clock.now();

        let updated = self
            .posts
            .update(&post, topic_ids.as_deref())
            .await
            .context("Failed to update post")?;

        if previous_status != updated.status {
            tracing::info!(
                "Post {} moved from {} to {}",
                updated.slug,
                previous_status,
                updated.status
            );
        }
        invalidate_topic_cache(&self.cache).await;
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), PostServiceError> {
        let deleted = self
            .posts
            .delete(id)
            .await
            .context("Failed to delete post")?;
        if !deleted {
            return Err(PostServiceError::NotFound(id.to_string()));
        }

        tracing::info!("Deleted post {}", id);
        invalidate_topic_cache(&self.cache).await;
        Ok(())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Post>, PostServiceError> {
        self.posts
            .get_by_id(id)
            .await
            .context("Failed to get post by ID")
            .map_err(Into::into)
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>, PostServiceError> {
        self.posts
            .get_by_slug(slug)
            .await
            .context("Failed to get post by slug")
            .map_err(Into::into)
    }

    /// A post together with its topics
    pub async fn get_with_topics(&self, id: i64) -> Result<Option<PostWithTopics>, PostServiceError> {
        match self.get_by_id(id).await? {
            Some(post) => {
                let topics = self.topics_for_post(post.id).await?;
                Ok(Some(PostWithTopics { post, topics }))
            }
            None => Ok(None),
        }
    }

    /// Topics of a post, alphabetical
    pub async fn topics_for_post(&self, post_id: i64) -> Result<Vec<Topic>, PostServiceError> {
        self.topics
            .get_by_post_id(post_id)
            .await
            .context("Failed to get topics for post")
            .map_err(Into::into)
    }

    /// Author of a post, if the user still exists
    pub async fn author(&self, post: &Post) -> Result<Option<User>, PostServiceError> {
        self.users
            .get_by_id(post.author_id)
            .await
            .context("Failed to get post author")
            .map_err(Into::into)
    }

    /// Admin listing, oldest first
    pub async fn list_admin(
        &self,
        filter: &PostFilter,
        params: &ListParams,
    ) -> Result<PagedResult<Post>, PostServiceError> {
        let (items, total) = self
            .posts
            .list_admin(filter, params)
            .await
            .context("Failed to list posts")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Published posts of a topic, most recently published first
    pub async fn published_for_topic(&self, topic_id: i64) -> Result<Vec<Post>, PostServiceError> {
        self.posts
            .list_published_by_topic(topic_id)
            .await
            .context("Failed to list posts for topic")
            .map_err(Into::into)
    }

    /// Public lookup; drafts are reported as missing
    pub async fn published_by_slug(&self, slug: &str) -> Result<Option<Post>, PostServiceError> {
        Ok(self
            .get_by_slug(slug)
            .await?
            .filter(|post| post.status == PostStatus::Published))
    }

    async fn require(&self, id: i64) -> Result<Post, PostServiceError> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| PostServiceError::NotFound(id.to_string()))
    }

    async fn ensure_author(&self, author_id: i64) -> Result<(), PostServiceError> {
        let author = self
            .users
            .get_by_id(author_id)
            .await
            .context("Failed to get author")?;
        if author.is_none() {
            return Err(PostServiceError::ValidationError(format!(
                "Unknown author: {}",
                author_id
            )));
        }
        Ok(())
    }

    /// Deduplicate topic ids, keeping order, and reject unknown ones
    async fn validate_topics(&self, ids: &[i64]) -> Result<Vec<i64>, PostServiceError> {
        let mut unique = Vec::with_capacity(ids.len());
        for &id in ids {
            if unique.contains(&id) {
                continue;
            }
            let topic = self
                .topics
                .get_by_id(id)
                .await
                .context("Failed to get topic")?;
            if topic.is_none() {
                return Err(PostServiceError::ValidationError(format!(
                    "Unknown topic: {}",
                    id
                )));
            }
            unique.push(id);
        }
        Ok(unique)
    }
}

fn validate_title(title: &str) -> Result<String, PostServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(PostServiceError::ValidationError(
            "Post title cannot be empty".to_string(),
        ));
    }
    if title.chars().count() > POST_TITLE_MAX_LEN {
        return Err(PostServiceError::ValidationError(format!(
            "Post title must be at most {} characters",
            POST_TITLE_MAX_LEN
        )));
    }
    Ok(title.to_string())
}

fn validate_slug(slug: String) -> Result<String, PostServiceError> {
    if slug.is_empty() {
        return Err(PostServiceError::ValidationError(
            "Post slug cannot be empty".to_string(),
        ));
    }
    if slug.len() > POST_TITLE_MAX_LEN {
        return Err(PostServiceError::ValidationError(format!(
            "Post slug must be at most {} characters",
            POST_TITLE_MAX_LEN
        )));
    }
    Ok(slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::{SqlxPostRepository, SqlxTopicRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::services::clock::ManualClock;
    use crate::services::topic::TopicService;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    struct Fixture {
        service: PostService,
        topics: TopicService,
        clock: ManualClock,
        author_id: i64,
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::boxed(pool.clone());
        let author = users
            .create(&User {
                id: 0,
                username: "jace".to_string(),
                email: "jace@ravnica.example".to_string(),
                display_name: Some("Jace Beleren".to_string()),
                created_at: t0(),
            })
            .await
            .unwrap();

        let cache: Cache = Arc::new(MemoryCache::new());
        let clock = ManualClock::new(t0());
        let topic_repo = SqlxTopicRepository::boxed(pool.clone());
        let service = PostService::new(
            SqlxPostRepository::boxed(pool.clone()),
            topic_repo.clone(),
            users,
            cache.clone(),
            Arc::new(clock.clone()),
        );
        let topics = TopicService::new(topic_repo, cache, std::time::Duration::from_secs(60));

        Fixture {
            service,
            topics,
            clock,
            author_id: author.id,
        }
    }

    fn draft(title: &str, author_id: i64) -> CreatePostInput {
        CreatePostInput {
            title: title.to_string(),
            author_id,
            ..Default::default()
        }
    }

    async fn topic(fx: &Fixture, name: &str) -> Topic {
        fx.topics
            .create(crate::models::CreateTopicInput {
                name: name.to_string(),
                slug: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_draft_derives_slug_and_leaves_unpublished() {
        let fx = setup().await;
        let post = fx
            .service
            .create(draft("Top 8: Pro Tour Thunder Junction", fx.author_id))
            .await
            .unwrap();
        assert_eq!(post.slug, "top-8-pro-tour-thunder-junction");
        assert_eq!(post.status, PostStatus::Draft);
        assert!(post.published_at.is_none());
        assert_eq!(post.created_at, t0());
    }

    #[tokio::test]
    async fn test_create_published_stamps_now() {
        let fx = setup().await;
        let post = fx
            .service
            .create(CreatePostInput {
                status: PostStatus::Published,
                ..draft("Set Review", fx.author_id)
            })
            .await
            .unwrap();
        assert_eq!(post.published_at, Some(t0()));
    }

    #[tokio::test]
    async fn test_create_validation() {
        let fx = setup().await;
        assert!(matches!(
            fx.service.create(draft("  ", fx.author_id)).await,
            Err(PostServiceError::ValidationError(_))
        ));
        assert!(matches!(
            fx.service.create(draft(&"t".repeat(251), fx.author_id)).await,
            Err(PostServiceError::ValidationError(_))
        ));
        assert!(matches!(
            fx.service.create(draft("Orphan", 9999)).await,
            Err(PostServiceError::ValidationError(_))
        ));
        assert!(matches!(
            fx.service
                .create(CreatePostInput {
                    topic_ids: vec![4242],
                    ..draft("Unknown topic", fx.author_id)
                })
                .await,
            Err(PostServiceError::ValidationError(_))
        ));

        fx.service.create(draft("Same Title", fx.author_id)).await.unwrap();
        assert!(matches!(
            fx.service.create(draft("Same Title", fx.author_id)).await,
            Err(PostServiceError::DuplicateSlug(_))
        ));
    }

    #[tokio::test]
    async fn test_publish_lifecycle_across_updates() {
        let fx = setup().await;
        let post = fx.service.create(draft("Spoilers", fx.author_id)).await.unwrap();

        fx.clock.advance(Duration::hours(1));
        let published = fx
            .service
            .update(
                post.id,
                UpdatePostInput {
                    status: Some(PostStatus::Published),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let first_publish = t0() + Duration::hours(1);
        assert_eq!(published.published_at, Some(first_publish));

        // Re-saving a published post keeps the original stamp
        fx.clock.advance(Duration::hours(1));
        let resaved = fx
            .service
            .update(
                post.id,
                UpdatePostInput {
                    content: Some("More spoilers".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(resaved.published_at, Some(first_publish));
        assert_eq!(resaved.updated_at, t0() + Duration::hours(2));

        let unpublished = fx
            .service
            .update(
                post.id,
                UpdatePostInput {
                    status: Some(PostStatus::Draft),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(unpublished.published_at.is_none());

        fx.clock.advance(Duration::hours(1));
        let republished = fx
            .service
            .update(
                post.id,
                UpdatePostInput {
                    status: Some(PostStatus::Published),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(republished.published_at, Some(t0() + Duration::hours(3)));
    }

    #[tokio::test]
    async fn test_blank_slug_is_regenerated_from_title() {
        let fx = setup().await;
        let post = fx.service.create(draft("Old Title", fx.author_id)).await.unwrap();
        let updated = fx
            .service
            .update(
                post.id,
                UpdatePostInput {
                    title: Some("New Title".to_string()),
                    slug: Some("  ".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.slug, "new-title");

        let kept = fx
            .service
            .update(
                post.id,
                UpdatePostInput {
                    title: Some("Another Title".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(kept.slug, "new-title");
    }

    #[tokio::test]
    async fn test_topics_replaced_only_when_given() {
        let fx = setup().await;
        let burn = topic(&fx, "Burn").await;
        let control = topic(&fx, "Control").await;

        let post = fx
            .service
            .create(CreatePostInput {
                topic_ids: vec![burn.id, burn.id],
                ..draft("Lightning Bolt", fx.author_id)
            })
            .await
            .unwrap();
        assert_eq!(fx.service.topics_for_post(post.id).await.unwrap(), vec![burn.clone()]);

        fx.service
            .update(post.id, UpdatePostInput { content: Some("x".to_string()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(fx.service.topics_for_post(post.id).await.unwrap().len(), 1);

        fx.service
            .update(
                post.id,
                UpdatePostInput {
                    topic_ids: Some(vec![control.id]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let with_topics = fx.service.get_with_topics(post.id).await.unwrap().unwrap();
        assert_eq!(with_topics.topics, vec![control]);
    }

    #[tokio::test]
    async fn test_published_lookups_hide_drafts() {
        let fx = setup().await;
        let storm = topic(&fx, "Storm").await;

        let older = fx
            .service
            .create(CreatePostInput {
                status: PostStatus::Published,
                topic_ids: vec![storm.id],
                ..draft("Older", fx.author_id)
            })
            .await
            .unwrap();
        fx.clock.advance(Duration::days(1));
        let newer = fx
            .service
            .create(CreatePostInput {
                status: PostStatus::Published,
                topic_ids: vec![storm.id],
                ..draft("Newer", fx.author_id)
            })
            .await
            .unwrap();
        fx.service
            .create(CreatePostInput {
                topic_ids: vec![storm.id],
                ..draft("Hidden", fx.author_id)
            })
            .await
            .unwrap();

        let listed = fx.service.published_for_topic(storm.id).await.unwrap();
        let ids: Vec<i64> = listed.iter().map(|p| p.id).collect();
        assert_eq!(ids, [newer.id, older.id]);

        assert!(fx.service.published_by_slug("newer").await.unwrap().is_some());
        assert!(fx.service.published_by_slug("hidden").await.unwrap().is_none());
        assert!(fx.service.get_by_slug("hidden").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_post_changes_refresh_top_topics() {
        let fx = setup().await;
        let elves = topic(&fx, "Elves").await;
        assert!(fx.topics.top_topics(5).await.unwrap().is_empty());

        fx.service
            .create(CreatePostInput {
                topic_ids: vec![elves.id],
                ..draft("Llanowar", fx.author_id)
            })
            .await
            .unwrap();
        assert_eq!(fx.topics.top_topics(5).await.unwrap(), vec![elves]);
    }

    #[tokio::test]
    async fn test_list_admin_and_delete() {
        let fx = setup().await;
        let a = fx.service.create(draft("Alpha", fx.author_id)).await.unwrap();
        fx.clock.advance(Duration::minutes(5));
        fx.service
            .create(CreatePostInput {
                status: PostStatus::Published,
                ..draft("Beta", fx.author_id)
            })
            .await
            .unwrap();

        let all = fx
            .service
            .list_admin(&PostFilter::default(), &ListParams::default())
            .await
            .unwrap();
        assert_eq!(all.total, 2);
        assert_eq!(all.items[0].id, a.id);

        let published = fx
            .service
            .list_admin(
                &PostFilter {
                    status: Some(PostStatus::Published),
                    ..Default::default()
                },
                &ListParams::default(),
            )
            .await
            .unwrap();
        assert_eq!(published.total, 1);

        let by_author = fx
            .service
            .list_admin(
                &PostFilter {
                    search: Some("Beleren".to_string()),
                    ..Default::default()
                },
                &ListParams::default(),
            )
            .await
            .unwrap();
        assert_eq!(by_author.total, 2);

        fx.service.delete(a.id).await.unwrap();
        assert!(matches!(
            fx.service.delete(a.id).await,
            Err(PostServiceError::NotFound(_))
        ));
    }
}
