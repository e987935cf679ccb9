//! Remote cache backends
//!
//! A cache entry is a gzip'd tar of one or more local paths, addressed by a
//! user key and a version derived from the paths. Entries are immutable: the
//! first save of a (key, version) wins and later saves fail to reserve it.
//!
//! Like the hosted cache SDK, backends treat service trouble as non-fatal:
//! a failed restore is a miss and a failed save is a warning. Only key and
//! path validation errors reach the caller.

pub mod archive;
mod github;
mod local;

pub use github::GithubCache;
pub use local::LocalCache;

use crate::config::Config;
use crate::error::{ImageCacheError, ImageCacheResult};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tracing::{info, warn};

/// Maximum key length accepted by the cache service
pub const MAX_KEY_LENGTH: usize = 512;

/// Compression recorded in the cache version
pub const COMPRESSION_METHOD: &str = "gzip";

const VERSION_SALT: &str = "1.0";

/// Options for [`CacheBackend::restore`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RestoreOptions {
    /// Only check whether an entry exists; do not download it
    pub lookup_only: bool,
}

impl RestoreOptions {
    /// Options for an existence probe
    pub fn lookup_only() -> Self {
        Self { lookup_only: true }
    }
}

/// Remote key/value store for cache archives
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Restore the entry for `key`, falling back to the newest entry whose key
    /// starts with one of `restore_keys`.
    ///
    /// Returns the key that matched, or `None` on a miss.
    async fn restore(
        &self,
        paths: &[PathBuf],
        key: &str,
        restore_keys: &[String],
        options: RestoreOptions,
    ) -> ImageCacheResult<Option<String>>;

    /// Save `paths` under `key`
    async fn save(&self, paths: &[PathBuf], key: &str) -> ImageCacheResult<()>;

    /// Get the human-readable backend name for display
    fn backend_name(&self) -> &'static str;
}

/// Create the backend selected by the configuration
///
/// An explicit cache directory wins; otherwise the GitHub cache service is
/// used when the runner exposes it.
pub fn create_backend(config: &Config) -> ImageCacheResult<Box<dyn CacheBackend>> {
    if let Some(dir) = &config.cache_dir {
        return Ok(Box::new(LocalCache::new(dir.clone())));
    }

    match (&config.results_url, &config.runtime_token) {
        (Some(url), Some(token)) => Ok(Box::new(GithubCache::new(
            url.clone(),
            token.clone(),
            config.temp_dir.clone(),
        ))),
        _ => Err(ImageCacheError::CacheServiceUnavailable),
    }
}

/// Check a cache key against the service limits
pub fn validate_key(key: &str) -> ImageCacheResult<()> {
    if key.chars().count() > MAX_KEY_LENGTH {
        return Err(ImageCacheError::InvalidKey {
            key: key.to_string(),
            reason: format!("cannot be larger than {} characters.", MAX_KEY_LENGTH),
        });
    }
    if key.contains(',') {
        return Err(ImageCacheError::InvalidKey {
            key: key.to_string(),
            reason: "cannot contain commas.".to_string(),
        });
    }
    Ok(())
}

/// Validate the primary key, every restore key, and the path list
pub(crate) fn validate_request(
    paths: &[PathBuf],
    key: &str,
    restore_keys: &[String],
) -> ImageCacheResult<()> {
    if paths.is_empty() {
        return Err(ImageCacheError::NoPaths);
    }
    validate_key(key)?;
    for restore_key in restore_keys {
        validate_key(restore_key)?;
    }
    Ok(())
}

/// Version of a cache entry: SHA-256 over the paths, the compression method,
/// a Windows marker and a salt, joined with `|`.
pub fn cache_version(paths: &[PathBuf]) -> String {
    let mut components: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    components.push(COMPRESSION_METHOD.to_string());
    if cfg!(windows) {
        components.push("windows-only".to_string());
    }
    components.push(VERSION_SALT.to_string());

    let mut hasher = Sha256::new();
    hasher.update(components.join("|").as_bytes());
    hex::encode(hasher.finalize())
}

/// Downgrade a failed restore to a miss unless it is a validation error
pub(crate) fn restore_or_miss(
    result: ImageCacheResult<Option<String>>,
) -> ImageCacheResult<Option<String>> {
    match result {
        Err(e) if !e.is_validation() => {
            warn!("Failed to restore: {}", e);
            Ok(None)
        }
        other => other,
    }
}

/// Downgrade a failed save to a warning unless it is a validation error
pub(crate) fn save_or_warn(result: ImageCacheResult<()>) -> ImageCacheResult<()> {
    match result {
        Err(e @ ImageCacheError::CacheReserve(_)) => {
            info!("Failed to save: {}", e);
            Ok(())
        }
        Err(e) if !e.is_validation() => {
            warn!("Failed to save: {}", e);
            Ok(())
        }
        other => other,
    }
}

/// Run blocking backend work off the async runtime
pub(crate) async fn blocking<T, F>(work: F) -> ImageCacheResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> ImageCacheResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ImageCacheError::Internal(format!("Cache task failed: {}", e)))?
}
