//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles CRUD operations for a specific entity.

pub mod comment;
pub mod photo_submission;
pub mod post;
pub mod topic;
pub mod user;

pub use comment::{CommentRepository, SqlxCommentRepository};
pub use photo_submission::{PhotoSubmissionRepository, SqlxPhotoSubmissionRepository};
pub use post::{PostRepository, SqlxPostRepository};
pub use topic::{SqlxTopicRepository, TopicRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// Escape character for the `LIKE` clauses built from [`like_pattern`]
pub(crate) const LIKE_ESCAPE: char = '!';

/// Build a `LIKE` pattern for a free-text search, or `None` when blank
///
/// `%` and `_` in the search text match literally. Queries using the
/// pattern must declare `ESCAPE '!'`.
pub(crate) fn like_pattern(search: Option<&str>) -> Option<String> {
    let search = search.map(str::trim).filter(|s| !s.is_empty())?;

    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_') || c == LIKE_ESCAPE {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    Some(pattern)
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn test_like_pattern() {
        assert_eq!(like_pattern(None), None);
        assert_eq!(like_pattern(Some("   ")), None);
        assert_eq!(like_pattern(Some(" urza ")), Some("%urza%".to_string()));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(Some("_")), Some("%!_%".to_string()));
        assert_eq!(like_pattern(Some("100%")), Some("%100!%%".to_string()));
        assert_eq!(like_pattern(Some("wow!")), Some("%wow!!%".to_string()));
    }
}
