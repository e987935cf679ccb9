//! docker-image-cache - Docker image caching for GitHub Actions
//!
//! Restores a cached image archive at job start and saves the images a job
//! created at job end, keyed by a user-supplied cache key.

pub mod actions;
pub mod cache;
pub mod cli;
pub mod config;
pub mod docker;
pub mod error;
pub mod shell;

pub use error::{ImageCacheError, ImageCacheResult};
