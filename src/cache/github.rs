//! GitHub Actions cache service client
//!
//! Talks to the cache service's twirp JSON API with the runner's bearer token
//! and moves archives through the signed blob URLs it hands out. The HTTP
//! client is blocking (`ureq`) and always runs on the blocking pool.

use super::{
    archive, blocking, cache_version, restore_or_miss, save_or_warn, validate_request,
    CacheBackend, RestoreOptions,
};
use crate::error::{ImageCacheError, ImageCacheResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use ureq::{Agent, SendBody};
use uuid::Uuid;

const SERVICE_PATH: &str = "twirp/github.actions.results.api.v1.CacheService";
const USER_AGENT: &str = concat!("docker-image-cache/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct GetDownloadUrlRequest<'a> {
    key: &'a str,
    restore_keys: &'a [String],
    version: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GetDownloadUrlResponse {
    ok: bool,
    signed_download_url: String,
    matched_key: String,
}

#[derive(Debug, Serialize)]
struct CreateEntryRequest<'a> {
    key: &'a str,
    version: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CreateEntryResponse {
    ok: bool,
    signed_upload_url: String,
}

#[derive(Debug, Serialize)]
struct FinalizeUploadRequest<'a> {
    key: &'a str,
    size_bytes: u64,
    version: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FinalizeUploadResponse {
    ok: bool,
}

/// Twirp error body
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TwirpError {
    code: String,
    msg: String,
}

struct Inner {
    agent: Agent,
    base_url: String,
    token: String,
    temp_dir: PathBuf,
    restore_root: PathBuf,
}

/// Cache backend for the GitHub-hosted cache service
#[derive(Clone)]
pub struct GithubCache {
    inner: Arc<Inner>,
}

impl GithubCache {
    /// Create a client for the service at `base_url` (`ACTIONS_RESULTS_URL`)
    pub fn new(base_url: String, token: String, temp_dir: PathBuf) -> Self {
        let config = Agent::config_builder()
            .http_status_as_error(false)
            .build();

        Self {
            inner: Arc::new(Inner {
                agent: Agent::new_with_config(config),
                base_url,
                token,
                temp_dir,
                restore_root: archive::filesystem_root(),
            }),
        }
    }
}

/// Build the URL of a twirp method
fn method_url(base_url: &str, method: &str) -> String {
    format!("{}/{}/{}", base_url.trim_end_matches('/'), SERVICE_PATH, method)
}

/// Extract a readable message from a twirp error body
fn twirp_message(body: &str) -> String {
    match serde_json::from_str::<TwirpError>(body) {
        Ok(err) if !err.msg.is_empty() => format!("{} ({})", err.msg, err.code),
        _ => body.trim().to_string(),
    }
}

impl Inner {
    fn call<Req, Resp>(&self, method: &str, request: &Req) -> ImageCacheResult<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let url = method_url(&self.base_url, method);
        debug!("Cache service request: {}", method);

        let body = serde_json::to_vec(request)?;
        let mut response = self
            .agent
            .post(url.as_str())
            .header("User-Agent", USER_AGENT)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/json")
            .send(&body[..])?;

        let status = response.status().as_u16();
        let text = response.body_mut().read_to_string()?;
        if !(200..300).contains(&status) {
            return Err(ImageCacheError::CacheService {
                method: method.to_string(),
                status,
                message: twirp_message(&text),
            });
        }

        Ok(serde_json::from_str(&text)?)
    }

    fn download(&self, url: &str, dest: &Path) -> ImageCacheResult<u64> {
        let response = self.agent.get(url).call()?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(ImageCacheError::CacheService {
                method: "download".to_string(),
                status,
                message: "unexpected status downloading cache archive".to_string(),
            });
        }

        let mut file = File::create(dest)
            .map_err(|e| ImageCacheError::io(format!("creating {}", dest.display()), e))?;
        let mut reader = response.into_body().into_reader();
        std::io::copy(&mut reader, &mut file)
            .map_err(|e| ImageCacheError::io("downloading cache archive", e))
    }

    fn upload(&self, url: &str, source: &Path, size: u64) -> ImageCacheResult<()> {
        let mut file = File::open(source)
            .map_err(|e| ImageCacheError::io(format!("opening {}", source.display()), e))?;

        let response = self
            .agent
            .put(url)
            .header("x-ms-blob-type", "BlockBlob")
            .header("Content-Length", size.to_string())
            .send(SendBody::from_reader(&mut file))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(ImageCacheError::CacheService {
                method: "upload".to_string(),
                status,
                message: "unexpected status uploading cache archive".to_string(),
            });
        }
        Ok(())
    }

    fn temp_archive(&self) -> PathBuf {
        self.temp_dir.join(format!("{}.tar.gz", Uuid::new_v4()))
    }

    fn restore_blocking(
        &self,
        paths: &[PathBuf],
        key: &str,
        restore_keys: &[String],
        options: RestoreOptions,
    ) -> ImageCacheResult<Option<String>> {
        let version = cache_version(paths);
        let response: GetDownloadUrlResponse = self.call(
            "GetCacheEntryDownloadURL",
            &GetDownloadUrlRequest {
                key,
                restore_keys,
                version: &version,
            },
        )?;

        if !response.ok {
            debug!("Cache not found for key {}, version {}", key, version);
            return Ok(None);
        }

        let matched_key = if response.matched_key.is_empty() {
            key.to_string()
        } else {
            response.matched_key
        };

        if options.lookup_only {
            info!("Cache found for key: {}", matched_key);
            return Ok(Some(matched_key));
        }

        let archive_path = self.temp_archive();
        let result = self
            .download(&response.signed_download_url, &archive_path)
            .and_then(|size| {
                info!("Cache size: ~{} MB ({} B)", size / (1024 * 1024), size);
                archive::extract(&archive_path, &self.restore_root)
            });
        let _ = fs::remove_file(&archive_path);
        result?;

        info!("Cache restored from key: {}", matched_key);
        Ok(Some(matched_key))
    }

    fn save_blocking(&self, paths: &[PathBuf], key: &str) -> ImageCacheResult<()> {
        let version = cache_version(paths);
        let archive_path = self.temp_archive();

        let result = self.upload_entry(paths, key, &version, &archive_path);
        let _ = fs::remove_file(&archive_path);
        result
    }

    fn upload_entry(
        &self,
        paths: &[PathBuf],
        key: &str,
        version: &str,
        archive_path: &Path,
    ) -> ImageCacheResult<()> {
        let size = archive::create(paths, archive_path)?;
        info!("Cache size: ~{} MB ({} B)", size / (1024 * 1024), size);

        let reserved: ImageCacheResult<CreateEntryResponse> =
            self.call("CreateCacheEntry", &CreateEntryRequest { key, version });
        let reserved = match reserved {
            Ok(response) if response.ok => response,
            Ok(_) | Err(ImageCacheError::CacheService { status: 409, .. }) => {
                return Err(ImageCacheError::CacheReserve(key.to_string()))
            }
            Err(e) => return Err(e),
        };

        self.upload(&reserved.signed_upload_url, archive_path, size)?;

        let finalized: FinalizeUploadResponse = self.call(
            "FinalizeCacheEntryUpload",
            &FinalizeUploadRequest {
                key,
                size_bytes: size,
                version,
            },
        )?;
        if !finalized.ok {
            return Err(ImageCacheError::CacheService {
                method: "FinalizeCacheEntryUpload".to_string(),
                status: 200,
                message: format!("cache entry for key {} was not finalized", key),
            });
        }

        info!("Cache saved with key: {}", key);
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for GithubCache {
    async fn restore(
        &self,
        paths: &[PathBuf],
        key: &str,
        restore_keys: &[String],
        options: RestoreOptions,
    ) -> ImageCacheResult<Option<String>> {
        validate_request(paths, key, restore_keys)?;

        let inner = Arc::clone(&self.inner);
        let paths = paths.to_vec();
        let key = key.to_string();
        let restore_keys = restore_keys.to_vec();
        restore_or_miss(
            blocking(move || inner.restore_blocking(&paths, &key, &restore_keys, options)).await,
        )
    }

    async fn save(&self, paths: &[PathBuf], key: &str) -> ImageCacheResult<()> {
        validate_request(paths, key, &[])?;

        let inner = Arc::clone(&self.inner);
        let paths = paths.to_vec();
        let key = key.to_string();
        save_or_warn(blocking(move || inner.save_blocking(&paths, &key)).await)
    }

    fn backend_name(&self) -> &'static str {
        "GitHub cache service"
    }
}
