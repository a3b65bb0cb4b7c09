//! Data models
//!
//! Database entities (Topic, Post, Comment, PhotoSubmission, User), their
//! input types for create/update operations, and list filters.

mod comment;
mod photo_submission;
mod post;
mod topic;
mod user;

pub use comment::{Comment, CommentFilter, CommentWithMeta, CreateCommentInput};
pub use photo_submission::{NewPhotoSubmission, PhotoSubmission, SubmissionFilter};
pub use post::{
    CreatePostInput, ListParams, PagedResult, Post, PostFilter, PostStatus, PostWithTopics,
    UpdatePostInput,
};
pub use topic::{CreateTopicInput, Topic, TopicWithCount, UpdateTopicInput};
pub use user::{CreateUserInput, User};
