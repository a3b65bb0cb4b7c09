//! Services layer - Business logic
//!
//! Services implement the blog's rules on top of the repositories:
//! validation, slug derivation, the publish lifecycle, comment moderation,
//! contest uploads and cache invalidation. The pure pieces (ranking,
//! lifecycle, slugs, forms) have no I/O at all.

pub mod clock;
pub mod comment;
pub mod contest;
pub mod forms;
pub mod lifecycle;
pub mod markdown;
pub mod post;
pub mod ranking;
pub mod slug;
pub mod topic;
pub mod user;

pub use clock::{Clock, DynClock, ManualClock, SystemClock};
pub use comment::{CommentService, CommentServiceError};
pub use contest::{ContestForm, ContestService, ContestServiceError, PhotoUpload};
pub use forms::FormErrors;
pub use lifecycle::apply_status_transition;
pub use markdown::MarkdownRenderer;
pub use post::{PostService, PostServiceError};
pub use ranking::{rank_topics, HOME_TOPIC_LIMIT, SIDEBAR_TOPIC_LIMIT};
pub use slug::slugify;
pub use topic::{TopicService, TopicServiceError};
pub use user::{UserService, UserServiceError};
