//! Directory-backed cache
//!
//! Layout: `<root>/<version>/<hex key>/archive.tar.gz` with an `entry.json`
//! beside it. An entry directory is only visible once its metadata has been
//! renamed into place, so a crashed save never looks like a hit.

use super::{
    archive, blocking, cache_version, restore_or_miss, save_or_warn, validate_request,
    CacheBackend, RestoreOptions,
};
use crate::error::{ImageCacheError, ImageCacheResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

const ARCHIVE_NAME: &str = "archive.tar.gz";
const ENTRY_NAME: &str = "entry.json";

/// Metadata stored next to each archive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalEntry {
    /// Cache key the entry was saved under
    pub key: String,
    /// Cache version (see [`cache_version`])
    pub version: String,
    /// When the entry was saved
    pub created_at: DateTime<Utc>,
    /// Archive size in bytes
    pub size_bytes: u64,
}

/// Cache backend storing entries in a local directory
#[derive(Debug, Clone)]
pub struct LocalCache {
    root: PathBuf,
    restore_root: PathBuf,
}

impl LocalCache {
    /// Create a cache rooted at `root`
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            restore_root: archive::filesystem_root(),
        }
    }

    /// Unpack restored archives under `dir` instead of the filesystem root
    pub fn with_restore_root(mut self, dir: PathBuf) -> Self {
        self.restore_root = dir;
        self
    }

    fn entry_dir(&self, version: &str, key: &str) -> PathBuf {
        self.root.join(version).join(hex::encode(key))
    }

    fn read_entry(dir: &Path) -> Option<LocalEntry> {
        let content = fs::read_to_string(dir.join(ENTRY_NAME)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Find the entry for `key`, or the newest entry matching a restore key
    /// prefix, trying restore keys in order.
    fn find(
        &self,
        version: &str,
        key: &str,
        restore_keys: &[String],
    ) -> ImageCacheResult<Option<LocalEntry>> {
        if let Some(entry) = Self::read_entry(&self.entry_dir(version, key)) {
            return Ok(Some(entry));
        }
        if restore_keys.is_empty() {
            return Ok(None);
        }

        let version_dir = self.root.join(version);
        if !version_dir.exists() {
            return Ok(None);
        }

        let mut entries = Vec::new();
        for dir in fs::read_dir(&version_dir)
            .map_err(|e| ImageCacheError::io(format!("reading {}", version_dir.display()), e))?
        {
            let dir = dir.map_err(|e| ImageCacheError::io("reading cache entry", e))?;
            if let Some(entry) = Self::read_entry(&dir.path()) {
                entries.push(entry);
            }
        }
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(restore_keys.iter().find_map(|prefix| {
            entries
                .iter()
                .find(|entry| entry.key.starts_with(prefix.as_str()))
                .cloned()
        }))
    }

    fn restore_blocking(
        &self,
        paths: &[PathBuf],
        key: &str,
        restore_keys: &[String],
        options: RestoreOptions,
    ) -> ImageCacheResult<Option<String>> {
        let version = cache_version(paths);
        let Some(entry) = self.find(&version, key, restore_keys)? else {
            debug!("No local cache entry for key {}", key);
            return Ok(None);
        };

        if options.lookup_only {
            info!("Cache found for key: {}", entry.key);
            return Ok(Some(entry.key));
        }

        let archive_path = self.entry_dir(&version, &entry.key).join(ARCHIVE_NAME);
        archive::extract(&archive_path, &self.restore_root)?;

        info!("Cache restored from key: {}", entry.key);
        Ok(Some(entry.key))
    }

    fn save_blocking(&self, paths: &[PathBuf], key: &str) -> ImageCacheResult<()> {
        let version = cache_version(paths);
        let entry_dir = self.entry_dir(&version, key);
        if entry_dir.join(ENTRY_NAME).exists() {
            return Err(ImageCacheError::CacheReserve(key.to_string()));
        }

        fs::create_dir_all(&entry_dir)
            .map_err(|e| ImageCacheError::io(format!("creating {}", entry_dir.display()), e))?;

        let staging = entry_dir.join(format!("{}.tmp", Uuid::new_v4()));
        let size = match archive::create(paths, &staging) {
            Ok(size) => size,
            Err(e) => {
                let _ = fs::remove_file(&staging);
                return Err(e);
            }
        };
        fs::rename(&staging, entry_dir.join(ARCHIVE_NAME))
            .map_err(|e| ImageCacheError::io("moving archive into place", e))?;

        let entry = LocalEntry {
            key: key.to_string(),
            version,
            created_at: Utc::now(),
            size_bytes: size,
        };
        let staging = entry_dir.join(format!("{}.json.tmp", Uuid::new_v4()));
        fs::write(&staging, serde_json::to_string_pretty(&entry)?)
            .map_err(|e| ImageCacheError::io("writing cache entry", e))?;
        fs::rename(&staging, entry_dir.join(ENTRY_NAME))
            .map_err(|e| ImageCacheError::io("moving cache entry into place", e))?;

        info!("Cache saved with key: {}", key);
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for LocalCache {
    async fn restore(
        &self,
        paths: &[PathBuf],
        key: &str,
        restore_keys: &[String],
        options: RestoreOptions,
    ) -> ImageCacheResult<Option<String>> {
        validate_request(paths, key, restore_keys)?;

        let cache = self.clone();
        let paths = paths.to_vec();
        let key = key.to_string();
        let restore_keys = restore_keys.to_vec();
        restore_or_miss(
            blocking(move || cache.restore_blocking(&paths, &key, &restore_keys, options)).await,
        )
    }

    async fn save(&self, paths: &[PathBuf], key: &str) -> ImageCacheResult<()> {
        validate_request(paths, key, &[])?;

        let cache = self.clone();
        let paths = paths.to_vec();
        let key = key.to_string();
        save_or_warn(blocking(move || cache.save_blocking(&paths, &key)).await)
    }

    fn backend_name(&self) -> &'static str {
        "local directory"
    }
}
