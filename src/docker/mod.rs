//! Docker image cache controller
//!
//! `load` runs at job start: it restores the image archive for the key, or
//! records which images already exist when there is nothing to restore.
//! `save` runs at job end: it archives only the images created since the
//! load step and uploads them under the same key.
//!
//! The two phases run as separate processes and share nothing but the
//! `cache-hit` and `docker-images-list` state slots.

pub mod images;

pub use images::{new_images, LIST_COMMAND};

use crate::actions::{ActionsContext, InputOptions};
use crate::cache::{CacheBackend, RestoreOptions};
use crate::error::{ImageCacheError, ImageCacheResult};
use crate::shell::CommandRunner;
use std::path::PathBuf;
use tracing::info;

/// State slot and output recording whether the exact key was restored
pub const CACHE_HIT: &str = "cache-hit";

/// State slot holding the images present at a cache miss
pub const DOCKER_IMAGES_LIST: &str = "docker-images-list";

/// Input naming the cache entry
pub const KEY_INPUT: &str = "key";

/// Input that disables saving
pub const READ_ONLY_INPUT: &str = "read-only";

/// Restores and saves Docker images for one job
pub struct ImageCache<'a> {
    actions: &'a dyn ActionsContext,
    backend: &'a dyn CacheBackend,
    runner: &'a dyn CommandRunner,
    archive_path: PathBuf,
}

impl<'a> ImageCache<'a> {
    /// Create a controller staging images at `archive_path`
    pub fn new(
        actions: &'a dyn ActionsContext,
        backend: &'a dyn CacheBackend,
        runner: &'a dyn CommandRunner,
        archive_path: PathBuf,
    ) -> Self {
        Self {
            actions,
            backend,
            runner,
            archive_path,
        }
    }

    fn paths(&self) -> Vec<PathBuf> {
        vec![self.archive_path.clone()]
    }

    /// Restore the image archive for the key, or record the existing images
    pub async fn load(&self) -> ImageCacheResult<()> {
        self.try_load().await.map_err(ImageCacheError::load)
    }

    /// Archive and upload images created since [`load`](Self::load)
    pub async fn save(&self) -> ImageCacheResult<()> {
        self.try_save().await.map_err(ImageCacheError::save)
    }

    async fn try_load(&self) -> ImageCacheResult<()> {
        let requested_key = self.actions.get_input(KEY_INPUT, InputOptions::required())?;
        let restored_key = self
            .backend
            .restore(&self.paths(), &requested_key, &[], RestoreOptions::default())
            .await?;

        // A restore-key match is not a hit: the images under a different key
        // may not be the ones this job builds.
        let cache_hit = restored_key.as_deref() == Some(requested_key.as_str());
        self.actions.save_state(CACHE_HIT, &cache_hit.to_string())?;
        self.actions.set_output(CACHE_HIT, &cache_hit.to_string())?;

        if cache_hit {
            info!(
                "Cache hit: Restoring Docker images from {}.",
                self.archive_path.display()
            );
            self.runner
                .execute(&images::load_command(&self.archive_path))
                .await;
        } else {
            info!("Cache miss: Recording existing Docker images, including those pre-cached by GitHub Actions.");
            let docker_images = self.runner.execute(LIST_COMMAND).await;
            self.actions.save_state(DOCKER_IMAGES_LIST, &docker_images)?;
        }

        Ok(())
    }

    async fn try_save(&self) -> ImageCacheResult<()> {
        let key = self.actions.get_input(KEY_INPUT, InputOptions::required())?;

        if self.actions.get_state(CACHE_HIT) == "true" {
            info!("Cache hit on key {}, skipping cache save.", key);
            return Ok(());
        }

        if self.actions.get_input(READ_ONLY_INPUT, InputOptions::default())? == "true" {
            info!(
                "Cache miss on key {}, but skipping cache save due to read-only mode.",
                key
            );
            return Ok(());
        }

        // Advisory only: another job can still save between this probe and
        // our upload, in which case our reservation fails with a warning.
        let existing_key = self
            .backend
            .restore(&self.paths(), &key, &[], RestoreOptions::lookup_only())
            .await?;
        if existing_key.as_deref() == Some(key.as_str()) {
            info!(
                "Cache miss occurred earlier, but another process has since saved a cache with key {}. Skipping save.",
                key
            );
            return Ok(());
        }

        let preexisting_images = self.actions.get_state(DOCKER_IMAGES_LIST);

        info!("Fetching current Docker images...");
        let current_images = self.runner.execute(LIST_COMMAND).await;

        let new_images = new_images(&current_images, &preexisting_images);
        if new_images.is_empty() {
            info!("No new Docker images detected. Skipping cache save.");
            return Ok(());
        }

        info!(
            "Saving {} new Docker images (excluding preexisting images).",
            new_images.len()
        );
        self.runner
            .execute(&images::save_command(&self.archive_path, &new_images))
            .await;

        self.backend.save(&self.paths(), &key).await
    }
}
