//! docker-image-cache - Docker image caching for GitHub Actions
//!
//! CLI entry point that dispatches to the load and save phases.

use clap::Parser;
use docker_image_cache::actions::{ActionsContext, GithubActions, WorkflowCommandFormat};
use docker_image_cache::cli::{Cli, Commands};
use docker_image_cache::config::Config;
use docker_image_cache::error::ImageCacheResult;
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging: 0 = info, 1+ = debug; the runner's debug mode also enables debug
    let debug_enabled = cli.verbose > 0 || std::env::var("RUNNER_DEBUG").is_ok_and(|v| v == "1");
    let filter = if debug_enabled {
        EnvFilter::new("docker_image_cache=debug")
    } else {
        EnvFilter::new("docker_image_cache=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .event_format(WorkflowCommandFormat)
        .with_writer(std::io::stdout)
        .init();

    let actions = GithubActions::from_env();

    match run(cli, &actions).await {
        Ok(()) if actions.is_failed() => ExitCode::FAILURE,
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            if let Some(hint) = e.hint() {
                info!("Hint: {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, actions: &GithubActions) -> ImageCacheResult<()> {
    let mut config = Config::from_env();
    if let Some(path) = &cli.archive_path {
        config = config.with_archive_path(path);
    }
    if let Some(dir) = &cli.cache_dir {
        config = config.with_cache_dir(dir);
    }
    debug!(
        "Running {} phase with archive {}",
        cli.command.phase(),
        config.archive_path.display()
    );

    match cli.command {
        Commands::Load => docker_image_cache::cli::commands::load(&config, actions).await,
        Commands::Save => docker_image_cache::cli::commands::save(&config, actions).await,
    }
}
