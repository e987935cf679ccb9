//! Configuration for docker-image-cache
//!
//! There is no config file: the workflow configures the action through
//! inputs, and the runner describes the job through environment variables.
//! `Config` gathers the latter once at startup.

use std::env;
use std::path::{Path, PathBuf};

/// File name of the image archive inside the home directory
pub const ARCHIVE_FILE_NAME: &str = ".docker-images.tar";

/// Resolved runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Local path of the Docker image archive, used for both save and load
    pub archive_path: PathBuf,

    /// Directory backing a local cache, instead of the GitHub cache service
    pub cache_dir: Option<PathBuf>,

    /// Base URL of the GitHub cache service (`ACTIONS_RESULTS_URL`)
    pub results_url: Option<String>,

    /// Bearer token for the cache service (`ACTIONS_RUNTIME_TOKEN`)
    pub runtime_token: Option<String>,

    /// Scratch directory for compressed cache archives (`RUNNER_TEMP`)
    pub temp_dir: PathBuf,
}

impl Config {
    /// Build a configuration from the runner environment
    pub fn from_env() -> Self {
        Self {
            archive_path: Self::default_archive_path(),
            cache_dir: None,
            results_url: non_empty_var("ACTIONS_RESULTS_URL"),
            runtime_token: non_empty_var("ACTIONS_RUNTIME_TOKEN"),
            temp_dir: non_empty_var("RUNNER_TEMP")
                .map(PathBuf::from)
                .unwrap_or_else(env::temp_dir),
        }
    }

    /// Default archive location: `~/.docker-images.tar`
    pub fn default_archive_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(ARCHIVE_FILE_NAME)
    }

    /// Override the archive path; a leading `~` expands to the home directory
    ///
    /// Relative paths are resolved against the working directory, since the
    /// archive is restored relative to the filesystem root.
    pub fn with_archive_path(mut self, path: &Path) -> Self {
        let path = expand_home(path);
        self.archive_path = std::path::absolute(&path).unwrap_or(path);
        self
    }

    /// Use a local directory as the cache backend
    pub fn with_cache_dir(mut self, dir: &Path) -> Self {
        self.cache_dir = Some(expand_home(dir));
        self
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Expand a leading `~` component to the home directory
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
