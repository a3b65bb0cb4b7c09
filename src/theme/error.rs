//! Theme engine error types

use thiserror::Error;

/// Theme-specific errors
#[derive(Debug, Error)]
pub enum ThemeError {
    /// Theme directory not found
    #[error("Theme not found: {0}")]
    NotFound(String),

    /// Template loading or rendering error
    #[error("Template error: {0}")]
    TemplateError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
