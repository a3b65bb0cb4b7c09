//! Photo contest submission model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A stored contest entry. Submissions are never edited after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhotoSubmission {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// Path of the stored photo relative to the upload root
    pub photo: String,
    pub submission_date: DateTime<Utc>,
}

impl PhotoSubmission {
    /// Public URL the stored photo is served from
    pub fn photo_url(&self) -> String {
        format!("/media/{}", self.photo)
    }
}

impl std::fmt::Display for PhotoSubmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Photo Submission by {} on {}",
            self.name,
            self.submission_date.format("%Y-%m-%d")
        )
    }
}

/// Validated submission ready to be inserted
#[derive(Debug, Clone)]
pub struct NewPhotoSubmission {
    pub name: String,
    pub email: String,
    pub photo: String,
    pub submission_date: DateTime<Utc>,
}

/// Admin list filter for submissions
#[derive(Debug, Clone, Default)]
pub struct SubmissionFilter {
    /// Matches name and email
    pub search: Option<String>,
    /// Inclusive lower bound on the submission day
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on the submission day
    pub to: Option<NaiveDate>,
}
