//! Comment service
//!
//! Readers submit comments on published posts; they stay hidden until an
//! administrator approves them.

use anyhow::Context;
use std::sync::Arc;

use crate::db::repositories::{CommentRepository, PostRepository};
use crate::models::{
    Comment, CommentFilter, CommentWithMeta, CreateCommentInput, ListParams, PagedResult,
    PostStatus,
};
use crate::services::clock::DynClock;
use crate::services::forms::{required_email, required_text, FormErrors};

pub const COMMENT_NAME_MAX_LEN: usize = 100;
pub const COMMENT_TEXT_MAX_LEN: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    #[error("Comment not found: {0}")]
    NotFound(String),

    #[error("Post not found: {0}")]
    PostNotFound(String),

    #[error("Invalid comment: {0}")]
    InvalidForm(FormErrors),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CommentService {
    comments: Arc<dyn CommentRepository>,
    posts: Arc<dyn PostRepository>,
    clock: DynClock,
}

impl CommentService {
    pub fn new(
        comments: Arc<dyn CommentRepository>,
        posts: Arc<dyn PostRepository>,
        clock: DynClock,
    ) -> Self {
        Self {
            comments,
            posts,
            clock,
        }
    }

    /// Submit a reader comment on the published post `post_slug`.
    ///
    /// The comment is stored unapproved.
    ///
    /// # Errors
    /// - `PostNotFound` when no published post has that slug
    /// - `InvalidForm` with per-field messages
    pub async fn submit(
        &self,
        post_slug: &str,
        input: CreateCommentInput,
    ) -> Result<Comment, CommentServiceError> {
        let post = self
            .posts
            .get_by_slug(post_slug)
            .await
            .context("Failed to get post by slug")?
            .filter(|post| post.status == PostStatus::Published)
            .ok_or_else(|| CommentServiceError::PostNotFound(post_slug.to_string()))?;

        let comment = validate_comment(post.id, input, self.clock.now())
            .map_err(CommentServiceError::InvalidForm)?;

        let created = self
            .comments
            .create(&comment)
            .await
            .context("Failed to create comment")?;

        tracing::info!(
            "Comment {} by {} awaiting moderation on {}",
            created.id,
            created.name,
            post.slug
        );
        Ok(created)
    }

    /// Approved comments of a post, newest first, ready for display
    pub async fn approved_for_post(
        &self,
        post_id: i64,
    ) -> Result<Vec<CommentWithMeta>, CommentServiceError> {
        let comments = self
            .comments
            .list_by_post(post_id, true)
            .await
            .context("Failed to list approved comments")?;
        Ok(comments.into_iter().map(CommentWithMeta::from).collect())
    }

    /// Every comment of a post, pending ones included
    pub async fn list_for_post(&self, post_id: i64) -> Result<Vec<Comment>, CommentServiceError> {
        self.comments
            .list_by_post(post_id, false)
            .await
            .context("Failed to list comments")
            .map_err(Into::into)
    }

    pub async fn list_admin(
        &self,
        filter: &CommentFilter,
        params: &ListParams,
    ) -> Result<PagedResult<Comment>, CommentServiceError> {
        let (items, total) = self
            .comments
            .list_admin(filter, params)
            .await
            .context("Failed to list comments")?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Comment>, CommentServiceError> {
        self.comments
            .get_by_id(id)
            .await
            .context("Failed to get comment by ID")
            .map_err(Into::into)
    }

    /// Approve or hide a comment and return it
    pub async fn set_approved(&self, id: i64, approved: bool) -> Result<Comment, CommentServiceError> {
        let updated = self
            .comments
            .set_approved(id, approved, self.clock.now())
            .await
            .context("Failed to update comment approval")?;
        if !updated {
            return Err(CommentServiceError::NotFound(id.to_string()));
        }

        tracing::info!(
            "Comment {} {}",
            id,
            if approved { "approved" } else { "unapproved" }
        );
        self.get_by_id(id)
            .await?
            .ok_or_else(|| CommentServiceError::NotFound(id.to_string()))
    }

    pub async fn delete(&self, id: i64) -> Result<(), CommentServiceError> {
        let deleted = self
            .comments
            .delete(id)
            .await
            .context("Failed to delete comment")?;
        if !deleted {
            return Err(CommentServiceError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

fn validate_comment(
    post_id: i64,
    input: CreateCommentInput,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<Comment, FormErrors> {
    let mut errors = FormErrors::new();
    let name = required_text(&mut errors, "name", &input.name, COMMENT_NAME_MAX_LEN);
    let email = required_email(&mut errors, "email", &input.email);
    let text = required_text(&mut errors, "text", &input.text, COMMENT_TEXT_MAX_LEN);
    errors.into_result()?;

    Ok(Comment {
        id: 0,
        post_id,
        name,
        email,
        text,
        approved: false,
        created_at: now,
        updated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxCommentRepository, SqlxPostRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::services::clock::ManualClock;
    use chrono::{Duration, TimeZone, Utc};

    struct Fixture {
        service: CommentService,
        clock: ManualClock,
        post_id: i64,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let sqlite = pool.sqlite().unwrap();
        sqlx::query("INSERT INTO users (username, email) VALUES ('liliana', 'liliana@innistrad.example')")
            .execute(sqlite)
            .await
            .unwrap();
        let post_id = sqlx::query(
            "INSERT INTO posts (title, slug, author_id, status, published_at) VALUES ('Reanimator', 'reanimator', 1, 'published', '2024-01-01T00:00:00Z')",
        )
        .execute(sqlite)
        .await
        .unwrap()
        .last_insert_rowid();
        sqlx::query("INSERT INTO posts (title, slug, author_id) VALUES ('Draft', 'draft-post', 1)")
            .execute(sqlite)
            .await
            .unwrap();

        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 5, 8, 0, 0).unwrap());
        let service = CommentService::new(
            SqlxCommentRepository::boxed(pool.clone()),
            SqlxPostRepository::boxed(pool.clone()),
            Arc::new(clock.clone()),
        );
        Fixture {
            service,
            clock,
            post_id,
        }
    }

    fn form(name: &str, email: &str, text: &str) -> CreateCommentInput {
        CreateCommentInput {
            name: name.to_string(),
            email: email.to_string(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_submit_stores_unapproved() {
        let fx = setup().await;
        let comment = fx
            .service
            .submit("reanimator", form(" Gerry ", "gerry@thraben.example", "Entomb is the best"))
            .await
            .unwrap();
        assert!(!comment.approved);
        assert_eq!(comment.name, "Gerry");
        assert_eq!(comment.post_id, fx.post_id);

        assert!(fx.service.approved_for_post(fx.post_id).await.unwrap().is_empty());
        assert_eq!(fx.service.list_for_post(fx.post_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_rejects_unknown_or_draft_post() {
        let fx = setup().await;
        let good = form("A", "a@b.example", "hi");
        assert!(matches!(
            fx.service.submit("missing", good.clone()).await,
            Err(CommentServiceError::PostNotFound(_))
        ));
        assert!(matches!(
            fx.service.submit("draft-post", good).await,
            Err(CommentServiceError::PostNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_submit_collects_field_errors() {
        let fx = setup().await;
        let result = fx
            .service
            .submit("reanimator", form("", "not-an-email", &"x".repeat(501)))
            .await;
        match result {
            Err(CommentServiceError::InvalidForm(errors)) => {
                assert!(errors.has("name"));
                assert!(errors.has("email"));
                assert!(errors.has("text"));
            }
            other => panic!("expected form errors, got {:?}", other.map(|c| c.id)),
        }
        assert!(fx.service.list_for_post(fx.post_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_only_approved_comments_are_public() {
        let fx = setup().await;
        let first = fx
            .service
            .submit("reanimator", form("One", "one@x.example", "first"))
            .await
            .unwrap();
        fx.clock.advance(Duration::minutes(1));
        let second = fx
            .service
            .submit("reanimator", form("Two", "two@x.example", "second"))
            .await
            .unwrap();
        fx.service
            .submit("reanimator", form("Three", "three@x.example", "pending"))
            .await
            .unwrap();

        fx.service.set_approved(first.id, true).await.unwrap();
        let approved = fx.service.set_approved(second.id, true).await.unwrap();
        assert!(approved.approved);

        let public = fx.service.approved_for_post(fx.post_id).await.unwrap();
        let ids: Vec<i64> = public.iter().map(|c| c.id).collect();
        assert_eq!(ids, [second.id, first.id]);
        assert!(public[0].avatar_url.starts_with("https://www.gravatar.com/avatar/"));

        fx.service.set_approved(second.id, false).await.unwrap();
        assert_eq!(fx.service.approved_for_post(fx.post_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_moderation_on_missing_comment() {
        let fx = setup().await;
        assert!(matches!(
            fx.service.set_approved(77, true).await,
            Err(CommentServiceError::NotFound(_))
        ));
        assert!(matches!(
            fx.service.delete(77).await,
            Err(CommentServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_admin_filters_by_approval() {
        let fx = setup().await;
        let c = fx
            .service
            .submit("reanimator", form("Sorin", "sorin@markov.example", "Lifelink"))
            .await
            .unwrap();
        fx.service
            .submit("reanimator", form("Olivia", "olivia@voldaren.example", "Flying"))
            .await
            .unwrap();
        fx.service.set_approved(c.id, true).await.unwrap();

        let pending = fx
            .service
            .list_admin(
                &CommentFilter {
                    approved: Some(false),
                    ..Default::default()
                },
                &ListParams::default(),
            )
            .await
            .unwrap();
        assert_eq!(pending.total, 1);
        assert_eq!(pending.items[0].name, "Olivia");

        let search = fx
            .service
            .list_admin(
                &CommentFilter {
                    search: Some("markov".to_string()),
                    ..Default::default()
                },
                &ListParams::default(),
            )
            .await
            .unwrap();
        assert_eq!(search.items.len(), 1);

        fx.service.delete(c.id).await.unwrap();
        assert!(fx.service.get_by_id(c.id).await.unwrap().is_none());
    }
}
