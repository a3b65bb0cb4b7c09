//! Photo contest service
//!
//! Validates contest entries, stores the photo under the upload directory
//! and records the submission. Entries can be listed and deleted by an
//! administrator but never edited.

use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::db::repositories::PhotoSubmissionRepository;
use crate::models::{ListParams, NewPhotoSubmission, PagedResult, PhotoSubmission, SubmissionFilter};
use crate::services::clock::DynClock;
use crate::services::forms::{required_email, required_text, FormErrors};

pub const CONTEST_NAME_MAX_LEN: usize = 100;

const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

const NOT_AN_IMAGE: &str = "Image file must be an image file";

/// Uploaded file as received from a multipart form
#[derive(Debug, Clone, Default)]
pub struct PhotoUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Raw contest form fields
#[derive(Debug, Clone, Default)]
pub struct ContestForm {
    pub name: String,
    pub email: String,
    pub photo: Option<PhotoUpload>,
}

#[derive(Debug, thiserror::Error)]
pub enum ContestServiceError {
    #[error("Submission not found: {0}")]
    NotFound(String),

    #[error("Invalid submission: {0}")]
    InvalidForm(FormErrors),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct ContestService {
    repo: Arc<dyn PhotoSubmissionRepository>,
    upload: UploadConfig,
    clock: DynClock,
}

impl ContestService {
    pub fn new(repo: Arc<dyn PhotoSubmissionRepository>, upload: UploadConfig, clock: DynClock) -> Self {
        Self { repo, upload, clock }
    }

    /// Validate and store a contest entry.
    ///
    /// Nothing is written when any field is invalid. A stored photo is
    /// removed again if the row cannot be inserted.
    pub async fn submit(&self, form: ContestForm) -> Result<PhotoSubmission, ContestServiceError> {
        let mut errors = FormErrors::new();
        let name = required_text(&mut errors, "name", &form.name, CONTEST_NAME_MAX_LEN);
        let email = required_email(&mut errors, "email", &form.email);
        let extension = self.validate_photo(&mut errors, form.photo.as_ref());
        errors.into_result().map_err(ContestServiceError::InvalidForm)?;

        let (Some(photo), Some(extension)) = (form.photo, extension) else {
            return Err(anyhow::anyhow!("Validated photo missing").into());
        };

        let relative = format!("{}/{}.{}", self.upload.contest_dir, Uuid::new_v4(), extension);
        let dir = self.upload.contest_path();
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create contest directory {:?}", dir))?;
        let file_path = self.upload.path.join(&relative);
        fs::write(&file_path, &photo.bytes)
            .await
            .with_context(|| format!("Failed to save contest photo {:?}", file_path))?;

        let submission = NewPhotoSubmission {
            name,
            email,
            photo: relative,
            submission_date: self.clock.now(),
        };

        match self.repo.create(&submission).await {
            Ok(created) => {
                tracing::info!(
                    "Contest entry {} from {} stored as {}",
                    created.id,
                    created.name,
                    created.photo
                );
                Ok(created)
            }
            Err(e) => {
                if let Err(remove_err) = fs::remove_file(&file_path).await {
                    tracing::warn!("Failed to remove orphaned photo {:?}: {}", file_path, remove_err);
                }
                Err(e.context("Failed to create photo submission").into())
            }
        }
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<PhotoSubmission>, ContestServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get photo submission")
            .map_err(Into::into)
    }

    /// Admin listing, newest first
    pub async fn list_admin(
        &self,
        filter: &SubmissionFilter,
        params: &ListParams,
    ) -> Result<PagedResult<PhotoSubmission>, ContestServiceError> {
        let (items, total) = self
            .repo
            .list_admin(filter, params)
            .await
            .context("Failed to list photo submissions")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Delete a submission and its stored photo
    pub async fn delete(&self, id: i64) -> Result<(), ContestServiceError> {
        let submission = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| ContestServiceError::NotFound(id.to_string()))?;

        let deleted = self
            .repo
            .delete(id)
            .await
            .context("Failed to delete photo submission")?;
        if !deleted {
            return Err(ContestServiceError::NotFound(id.to_string()));
        }

        let file_path = self.stored_path(&submission);
        match fs::remove_file(&file_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove contest photo {:?}: {}", file_path, e),
        }

        tracing::info!("Deleted contest entry {}", id);
        Ok(())
    }

    /// On-disk location of a submission's photo
    pub fn stored_path(&self, submission: &PhotoSubmission) -> PathBuf {
        self.upload.path.join(&submission.photo)
    }

    /// Record photo errors and return the extension to store the file under
    fn validate_photo(&self, errors: &mut FormErrors, photo: Option<&PhotoUpload>) -> Option<&'static str> {
        let photo = match photo {
            Some(photo) if !photo.bytes.is_empty() => photo,
            Some(photo) if photo.file_name.as_deref().is_some_and(|n| !n.is_empty()) => {
                errors.add("photo", "The submitted file is empty.");
                return None;
            }
            _ => {
                errors.add("photo", "This field is required.");
                return None;
            }
        };

        let extension = match infer::get(&photo.bytes) {
            Some(kind) if kind.matcher_type() == infer::MatcherType::Image => {
                match self.upload.get_extension(kind.mime_type()) {
                    "bin" => kind.extension(),
                    ext => ext,
                }
            }
            _ => {
                errors.add("photo", INVALID_IMAGE);
                return None;
            }
        };

        if photo.bytes.len() as u64 > self.upload.max_file_size {
            errors.add(
                "photo",
                format!(
                    "Image file too large ({} limit)",
                    format_size_limit(self.upload.max_file_size)
                ),
            );
            return None;
        }

        let declared = photo.content_type.as_deref().unwrap_or("application/octet-stream");
        if !declared.starts_with("image/") {
            errors.add("photo", NOT_AN_IMAGE);
            return None;
        }

        Some(extension)
    }
}

/// `5MB`, `512KB` or `1500 bytes`, whichever unit divides the limit exactly
fn format_size_limit(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    match bytes {
        b if b >= MB && b % MB == 0 => format!("{}MB", b / MB),
        b if b >= KB && b % KB == 0 => format!("{}KB", b / KB),
        b => format!("{} bytes", b),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::repositories::SqlxPhotoSubmissionRepository;
    use crate::db::{create_test_pool, migrations};
    use crate::services::clock::ManualClock;
    use chrono::{TimeZone, Utc};

    /// Smallest valid PNG: 1x1 transparent pixel
    pub(crate) const TINY_PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
        0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
        0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    async fn setup(max_file_size: u64) -> (tempfile::TempDir, ContestService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let media = tempfile::tempdir().expect("Failed to create temp dir");
        let upload = UploadConfig {
            path: media.path().to_path_buf(),
            max_file_size,
            ..Default::default()
        };
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 8, 15, 9, 30, 0).unwrap());
        let service = ContestService::new(
            SqlxPhotoSubmissionRepository::boxed(pool),
            upload,
            Arc::new(clock),
        );
        (media, service)
    }

    fn png_form() -> ContestForm {
        ContestForm {
            name: "Elspeth".to_string(),
            email: "elspeth@theros.example".to_string(),
            photo: Some(PhotoUpload {
                file_name: Some("cube.png".to_string()),
                content_type: Some("image/png".to_string()),
                bytes: TINY_PNG.to_vec(),
            }),
        }
    }

    fn photo_errors(result: Result<PhotoSubmission, ContestServiceError>) -> Vec<String> {
        match result {
            Err(ContestServiceError::InvalidForm(errors)) => errors.get("photo").to_vec(),
            other => panic!("expected form errors, got {:?}", other.map(|s| s.id)),
        }
    }

    #[tokio::test]
    async fn test_submit_stores_photo_and_row() {
        let (media, service) = setup(5 * 1024 * 1024).await;
        let submission = service.submit(png_form()).await.unwrap();

        assert!(submission.photo.starts_with("contest_photos/"));
        assert!(submission.photo.ends_with(".png"));
        assert_eq!(submission.submission_date.format("%Y-%m-%d").to_string(), "2024-08-15");
        assert_eq!(
            std::fs::read(media.path().join(&submission.photo)).unwrap(),
            TINY_PNG
        );
        assert!(service.get_by_id(submission.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_missing_photo_and_bad_fields() {
        let (_media, service) = setup(5 * 1024 * 1024).await;
        let result = service
            .submit(ContestForm {
                name: String::new(),
                email: "bad".to_string(),
                photo: None,
            })
            .await;
        match result {
            Err(ContestServiceError::InvalidForm(errors)) => {
                assert!(errors.has("name"));
                assert!(errors.has("email"));
                assert_eq!(errors.get("photo"), ["This field is required."]);
            }
            other => panic!("expected form errors, got {:?}", other.map(|s| s.id)),
        }

        let listed = service
            .list_admin(&SubmissionFilter::default(), &ListParams::default())
            .await
            .unwrap();
        assert_eq!(listed.total, 0);
    }

    #[tokio::test]
    async fn test_rejects_non_image_content() {
        let (media, service) = setup(5 * 1024 * 1024).await;

        let mut form = png_form();
        form.photo = Some(PhotoUpload {
            file_name: Some("notes.txt".to_string()),
            content_type: Some("text/plain".to_string()),
            bytes: b"just some text".to_vec(),
        });
        assert_eq!(photo_errors(service.submit(form).await), [INVALID_IMAGE]);

        // Declared as an image but the bytes are not one
        let mut form = png_form();
        form.photo = Some(PhotoUpload {
            file_name: Some("fake.png".to_string()),
            content_type: Some("image/png".to_string()),
            bytes: b"definitely not a png".to_vec(),
        });
        assert_eq!(photo_errors(service.submit(form).await), [INVALID_IMAGE]);

        assert!(!media.path().join("contest_photos").exists());
    }

    #[tokio::test]
    async fn test_rejects_oversized_photo() {
        let (_media, service) = setup(16).await;
        let errors = photo_errors(service.submit(png_form()).await);
        assert_eq!(errors, ["Image file too large (16 bytes limit)"]);
    }

    #[tokio::test]
    async fn test_rejects_image_declared_with_other_content_type() {
        let (_media, service) = setup(5 * 1024 * 1024).await;
        let mut form = png_form();
        if let Some(photo) = form.photo.as_mut() {
            photo.content_type = Some("application/octet-stream".to_string());
        }
        assert_eq!(photo_errors(service.submit(form).await), [NOT_AN_IMAGE]);
    }

    #[test]
    fn test_format_size_limit() {
        assert_eq!(format_size_limit(5 * 1024 * 1024), "5MB");
        assert_eq!(format_size_limit(512 * 1024), "512KB");
        assert_eq!(format_size_limit(1500), "1500 bytes");
        assert_eq!(format_size_limit(0), "0 bytes");
    }

    #[tokio::test]
    async fn test_delete_removes_file() {
        let (_media, service) = setup(5 * 1024 * 1024).await;
        let submission = service.submit(png_form()).await.unwrap();
        let path = service.stored_path(&submission);
        assert!(path.exists());

        service.delete(submission.id).await.unwrap();
        assert!(!path.exists());
        assert!(service.get_by_id(submission.id).await.unwrap().is_none());
        assert!(matches!(
            service.delete(submission.id).await,
            Err(ContestServiceError::NotFound(_))
        ));
    }
}
