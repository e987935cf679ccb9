//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// docker-image-cache - cache Docker images across CI workflow runs
///
/// Run `load` at the start of a job and `save` at the end. The step inputs
/// `key` and `read-only` are read from the runner environment.
#[derive(Parser, Debug)]
#[command(name = "docker-image-cache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Store cache entries in this directory instead of the GitHub cache service
    #[arg(long, global = true, env = "DOCKER_IMAGE_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Local path of the Docker image archive [default: ~/.docker-images.tar]
    #[arg(long, global = true, env = "DOCKER_IMAGE_CACHE_ARCHIVE")]
    pub archive_path: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Restore cached Docker images, or record the existing ones on a miss
    Load,

    /// Save Docker images created since `load` to the cache
    Save,
}

impl Commands {
    /// Name of the phase, for log messages
    pub fn phase(&self) -> &'static str {
        match self {
            Commands::Load => "load",
            Commands::Save => "save",
        }
    }
}
