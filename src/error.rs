//! Error types for docker-image-cache
//!
//! All modules use `ImageCacheResult<T>` as their return type. Shell command
//! failures are not errors here: they are reported through
//! [`ActionsContext::set_failed`](crate::actions::ActionsContext::set_failed).

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for docker-image-cache operations
pub type ImageCacheResult<T> = Result<T, ImageCacheError>;

/// All errors that can occur while caching Docker images
#[derive(Error, Debug)]
pub enum ImageCacheError {
    // Phase errors
    #[error("Failed to load Docker images: {0}")]
    Load(Box<ImageCacheError>),

    #[error("Failed to save Docker images: {0}")]
    Save(Box<ImageCacheError>),

    // Runner protocol errors
    #[error("Input required and not supplied: {0}")]
    InputRequired(String),

    #[error("Unexpected input: {name} must not contain the delimiter \"{delimiter}\"")]
    CommandDelimiter { name: String, delimiter: String },

    #[error("Failed to write {kind} file {path}: {source}")]
    CommandFile {
        kind: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Validation errors
    #[error("Key Validation Error: {key} {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Path Validation Error: at least one path is required")]
    NoPaths,

    #[error("Path Validation Error: Path(s) specified in the action for caching do(es) not exist, hence no cache is being saved.")]
    PathsMissing,

    // Cache service errors
    #[error("Cache service is unavailable")]
    CacheServiceUnavailable,

    #[error("Cache service request {method} failed with status {status}: {message}")]
    CacheService {
        method: String,
        status: u16,
        message: String,
    },

    #[error("Unable to reserve cache with key {0}, another job may be creating this cache.")]
    CacheReserve(String),

    #[error("HTTP error: {0}")]
    Http(#[from] ureq::Error),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command failed: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ImageCacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error (the process could not be spawned)
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error (the process exited unsuccessfully)
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Wrap an error raised during the load phase
    pub fn load(source: Self) -> Self {
        Self::Load(Box::new(source))
    }

    /// Wrap an error raised during the save phase
    pub fn save(source: Self) -> Self {
        Self::Save(Box::new(source))
    }

    /// Validation errors are caller mistakes and always propagate, while
    /// every other cache backend failure is downgraded to a warning.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidKey { .. } | Self::NoPaths)
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Load(inner) | Self::Save(inner) => inner.hint(),
            Self::InputRequired(_) => Some("Set the input under `with:` on the workflow step"),
            Self::CacheServiceUnavailable => Some(
                "Run inside GitHub Actions (ACTIONS_RESULTS_URL and ACTIONS_RUNTIME_TOKEN) or pass --cache-dir",
            ),
            _ => None,
        }
    }
}
