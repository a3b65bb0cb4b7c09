//! Topic ranking
//!
//! Picks the most-used topics for the home page and the sidebar.

use crate::models::{Topic, TopicWithCount};

/// Number of topics shown on the home page
pub const HOME_TOPIC_LIMIT: usize = 10;

/// Number of topics shown in the sidebar of every page
pub const SIDEBAR_TOPIC_LIMIT: usize = 5;

/// Rank topics by post count.
///
/// Topics without posts are dropped, the rest are ordered by descending
/// count and cut to `limit`. Equal counts keep their input order.
pub fn rank_topics(topics: Vec<TopicWithCount>, limit: usize) -> Vec<Topic> {
    let mut ranked: Vec<TopicWithCount> = topics
        .into_iter()
        .filter(|entry| entry.post_count > 0)
        .collect();

    // sort_by is stable
    ranked.sort_by(|a, b| b.post_count.cmp(&a.post_count));

    ranked
        .into_iter()
        .take(limit)
        .map(|entry| entry.topic)
        .collect()
}
