//! Topic model
//!
//! Topics group posts by subject (formats, lore, deck techs). A post can
//! carry any number of topics and a topic any number of posts.

use serde::{Deserialize, Serialize};

/// Topic entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Topic {
    /// Unique identifier
    pub id: i64,
    /// Display name (unique)
    pub name: String,
    /// URL-friendly slug (unique)
    pub slug: String,
}

impl Topic {
    /// Create a new Topic; the ID is assigned by the database.
    pub fn new(name: String, slug: String) -> Self {
        Self { id: 0, name, slug }
    }

    /// Public URL of the topic page
    pub fn absolute_url(&self) -> String {
        format!("/topic/{}", self.slug)
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Topic paired with the number of posts linked to it (any status)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicWithCount {
    #[serde(flatten)]
    pub topic: Topic,
    pub post_count: i64,
}

impl TopicWithCount {
    pub fn new(topic: Topic, post_count: i64) -> Self {
        Self { topic, post_count }
    }
}

/// Input for creating a topic
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTopicInput {
    pub name: String,
    /// Derived from the name when absent or blank
    #[serde(default)]
    pub slug: Option<String>,
}

/// Input for updating a topic
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTopicInput {
    #[serde(default)]
    pub name: Option<String>,
    /// A blank slug is regenerated from the (new) name
    #[serde(default)]
    pub slug: Option<String>,
}
