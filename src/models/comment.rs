//! Comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reader comment on a post; hidden from the public until approved
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub name: String,
    pub email: String,
    pub text: String,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    /// Admin-facing label, e.g. "Comment by Chandra on Burn in Modern"
    pub fn describe(&self, post_title: &str) -> String {
        format!("Comment by {} on {}", self.name, post_title)
    }
}

/// Comment with display info for public pages
#[derive(Debug, Clone, Serialize)]
pub struct CommentWithMeta {
    pub id: i64,
    pub name: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub avatar_url: String,
}

impl CommentWithMeta {
    /// Gravatar URL for an e-mail address (md5 of the trimmed, lowercased address)
    pub fn gravatar_url(email: &str) -> String {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return "https://www.gravatar.com/avatar/?d=mp&s=80".to_string();
        }
        let hash = format!("{:x}", md5::compute(email.as_bytes()));
        format!("https://www.gravatar.com/avatar/{}?d=mp&s=80", hash)
    }
}

impl From<Comment> for CommentWithMeta {
    fn from(comment: Comment) -> Self {
        Self {
            avatar_url: Self::gravatar_url(&comment.email),
            id: comment.id,
            name: comment.name,
            text: comment.text,
            created_at: comment.created_at,
        }
    }
}

/// Input for submitting a comment
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCommentInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub text: String,
}

/// Admin list filter for comments
#[derive(Debug, Clone, Default)]
pub struct CommentFilter {
    pub approved: Option<bool>,
    pub post_id: Option<i64>,
    /// Matches name, email and text
    pub search: Option<String>,
}
