//! User model
//!
//! Users are post authors. They are managed through the admin API and carry
//! no credentials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Post author
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Name shown on post bylines, falling back to the username
    pub fn byline(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.username)
    }
}

/// Input for creating a new author
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateUserInput {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(display_name: Option<&str>) -> User {
        User {
            id: 1,
            username: "teferi".to_string(),
            email: "teferi@zhalfir.example".to_string(),
            display_name: display_name.map(String::from),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_byline_prefers_display_name() {
        assert_eq!(user(Some("Teferi Akosa")).byline(), "Teferi Akosa");
        assert_eq!(user(None).byline(), "teferi");
        assert_eq!(user(Some("  ")).byline(), "teferi");
    }
}
