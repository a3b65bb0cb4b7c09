//! User service
//!
//! Authors are created through the admin API. They have no credentials;
//! admin access is guarded by the configured token instead.

use anyhow::Context;
use std::sync::Arc;

use crate::db::repositories::UserRepository;
use crate::models::{CreateUserInput, User};
use crate::services::clock::DynClock;
use crate::services::forms::is_valid_email;

pub const USERNAME_MAX_LEN: usize = 50;
pub const DISPLAY_NAME_MAX_LEN: usize = 100;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct UserService {
    repo: Arc<dyn UserRepository>,
    clock: DynClock,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>, clock: DynClock) -> Self {
        Self { repo, clock }
    }

    /// Create an author
    ///
    /// # Errors
    /// - `ValidationError` for a bad username, e-mail or display name
    /// - `UserExists` when the username is taken
    pub async fn create(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        let username = validate_username(&input.username)?;

        let email = input.email.trim().to_string();
        if !is_valid_email(&email) {
            return Err(UserServiceError::ValidationError(
                "Invalid email format".to_string(),
            ));
        }

        let display_name = input
            .display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        if display_name
            .as_deref()
            .is_some_and(|name| name.chars().count() > DISPLAY_NAME_MAX_LEN)
        {
            return Err(UserServiceError::ValidationError(format!(
                "Display name must be at most {} characters",
                DISPLAY_NAME_MAX_LEN
            )));
        }

        if self
            .repo
            .get_by_username(&username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(username));
        }

        let user = User {
            id: 0,
            username,
            email,
            display_name,
            created_at: self.clock.now(),
        };
        let created = self
            .repo
            .create(&user)
            .await
            .context("Failed to create user")?;

        tracing::info!("Created author {}", created.username);
        Ok(created)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")
            .map_err(Into::into)
    }

    /// All authors, ordered by username
    pub async fn list(&self) -> Result<Vec<User>, UserServiceError> {
        self.repo
            .list()
            .await
            .context("Failed to list users")
            .map_err(Into::into)
    }
}

fn validate_username(username: &str) -> Result<String, UserServiceError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(UserServiceError::ValidationError(
            "Username cannot be empty".to_string(),
        ));
    }
    if username.len() > USERNAME_MAX_LEN {
        return Err(UserServiceError::ValidationError(format!(
            "Username must be at most {} characters",
            USERNAME_MAX_LEN
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(UserServiceError::ValidationError(
            "Username can only contain letters, digits, '_', '.' and '-'".to_string(),
        ));
    }
    Ok(username.to_string())
}
