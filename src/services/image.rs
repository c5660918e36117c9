//! Image lifecycle: temp files from AI generation, promotion to
//! recipe-owned files, and the cleanup sweeps.
//!
//! Every image on disk has a matching metadata record; this service is the
//! only writer to the upload directories. Deletion is best-effort and never
//! aborts the caller, only `save_temp` surfaces filesystem failures because
//! the caller needs the URL.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

use crate::config::ImagesConfig;
use crate::db::{ImagePromotion, ImageRecord, NewImage, Store, rfc3339_from_now};

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("temporary image not found: {0}")]
    TempNotFound(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct ImageService {
    store: Store,
    config: ImagesConfig,
}

impl ImageService {
    #[must_use]
    pub const fn new(store: Store, config: ImagesConfig) -> Self {
        Self { store, config }
    }

    fn temp_dir(&self) -> PathBuf {
        Path::new(&self.config.upload_base_path).join(&self.config.temp_subdir)
    }

    fn recipe_dir(&self) -> PathBuf {
        Path::new(&self.config.upload_base_path).join(&self.config.recipe_subdir)
    }

    fn item_dir(&self) -> PathBuf {
        Path::new(&self.config.upload_base_path).join(&self.config.item_subdir)
    }

    fn temp_url(&self, filename: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.public_base_url, self.config.temp_subdir, filename
        )
    }

    fn recipe_url(&self, filename: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.public_base_url, self.config.recipe_subdir, filename
        )
    }

    /// Map a public URL back to the file on disk by prefix. URLs that match
    /// no known subdirectory fall back to the legacy item directory.
    fn path_for_url(&self, url: &str) -> PathBuf {
        let base = &self.config.public_base_url;
        let temp_prefix = format!("{base}/{}/", self.config.temp_subdir);
        let recipe_prefix = format!("{base}/{}/", self.config.recipe_subdir);

        if let Some(name) = url.strip_prefix(&temp_prefix) {
            self.temp_dir().join(name)
        } else if let Some(name) = url.strip_prefix(&recipe_prefix) {
            self.recipe_dir().join(name)
        } else {
            let name = url.rsplit('/').next().unwrap_or(url);
            self.item_dir().join(name)
        }
    }

    fn extension_of(name: &str) -> &str {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("png")
    }

    /// Write bytes to the temp directory and insert a `temp` record.
    /// This is the one path where a filesystem failure must reach the
    /// caller, so it propagates instead of being swallowed.
    pub async fn save_temp(&self, bytes: &[u8], suggested_name: &str) -> Result<ImageRecord> {
        let extension = Self::extension_of(suggested_name);
        let filename = format!(
            "temp-{}.{}",
            chrono::Utc::now().timestamp_millis(),
            extension
        );

        let dir = self.temp_dir();
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let filepath = dir.join(&filename);
        fs::write(&filepath, bytes)
            .await
            .with_context(|| format!("Failed to write image to {}", filepath.display()))?;

        let record = self
            .store
            .insert_image(NewImage {
                filename: filename.clone(),
                filepath: filepath.to_string_lossy().into_owned(),
                url: self.temp_url(&filename),
                image_type: "temp".to_string(),
                recipe_id: None,
                used: false,
            })
            .await?;

        info!(url = %record.url, "Saved temporary image");

        Ok(record)
    }

    /// Download an image from a remote URL into the temp directory.
    pub async fn save_temp_from_url(&self, url: &str) -> Result<ImageRecord> {
        let response = reqwest::get(url)
            .await
            .with_context(|| format!("Failed to fetch image from {url}"))?;
        let bytes = response
            .bytes()
            .await
            .context("Failed to read image response body")?;

        let suggested = url.rsplit('/').next().unwrap_or("image.png");
        self.save_temp(&bytes, suggested).await
    }

    /// Promote a temp image to recipe ownership. The file is copied into
    /// the recipe directory and the original removed afterwards; source and
    /// destination may sit on distinct volumes, so no atomic rename.
    pub async fn promote_to_recipe(
        &self,
        temp_url: &str,
        recipe_id: i32,
    ) -> Result<String, ImageError> {
        let source = self.path_for_url(temp_url);
        if !fs::try_exists(&source).await.unwrap_or(false) {
            return Err(ImageError::TempNotFound(temp_url.to_string()));
        }

        let source_name = source.to_string_lossy().into_owned();
        let extension = Self::extension_of(&source_name);
        let filename = format!(
            "recipe-{recipe_id}-{}.{extension}",
            chrono::Utc::now().timestamp_millis()
        );

        let dir = self.recipe_dir();
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let destination = dir.join(&filename);
        fs::copy(&source, &destination)
            .await
            .with_context(|| format!("Failed to copy image to {}", destination.display()))?;

        if let Err(e) = fs::remove_file(&source).await {
            warn!(path = %source.display(), error = %e, "Failed to remove promoted temp file");
        }

        let new_url = self.recipe_url(&filename);

        self.store
            .promote_image(
                temp_url,
                ImagePromotion {
                    filename,
                    filepath: destination.to_string_lossy().into_owned(),
                    url: new_url.clone(),
                    recipe_id,
                },
            )
            .await?;

        info!(old = %temp_url, new = %new_url, recipe_id, "Promoted image to recipe");

        Ok(new_url)
    }

    /// Best-effort delete of file and record. Failures are logged and
    /// swallowed; a missing file is not an error.
    pub async fn delete_image(&self, url: &str) {
        let path = self.path_for_url(url);

        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete image file"),
        }

        if let Err(e) = self.store.delete_image_by_url(url).await {
            warn!(url = %url, error = %e, "Failed to delete image record");
        }
    }

    /// Delete unused temp images older than the cutoff. Records created
    /// during the sweep are newer than the cutoff and untouched.
    pub async fn cleanup_temp(&self, older_than_hours: i64) -> Result<u64> {
        // Clamp so the cutoff arithmetic cannot overflow on extreme input
        let hours = older_than_hours.clamp(-1_000_000, 1_000_000);
        let cutoff = rfc3339_from_now(-hours * 3600);
        let stale = self.store.unused_temp_images_before(&cutoff).await?;

        let mut deleted = 0u64;
        for record in stale {
            self.delete_image(&record.url).await;
            deleted += 1;
        }

        if deleted > 0 {
            info!(count = deleted, older_than_hours, "Cleaned up temporary images");
        }

        Ok(deleted)
    }

    /// Bulk-delete every recipe-typed image. Startup/maintenance only.
    pub async fn cleanup_all_recipe_images(&self) -> Result<u64> {
        let records = self.store.all_recipe_images().await?;

        let mut deleted = 0u64;
        for record in records {
            self.delete_image(&record.url).await;
            deleted += 1;
        }

        if deleted > 0 {
            info!(count = deleted, "Cleaned up recipe images");
        }

        Ok(deleted)
    }

    /// Boot-time sweep: recipe images are regenerated on demand, so all are
    /// purged, along with temp images past the startup age limit.
    pub async fn startup_cleanup(&self, temp_max_age_hours: i64) {
        if let Err(e) = self.cleanup_all_recipe_images().await {
            warn!(error = %e, "Startup recipe image cleanup failed");
        }
        if let Err(e) = self.cleanup_temp(temp_max_age_hours).await {
            warn!(error = %e, "Startup temp image cleanup failed");
        }
    }
}
