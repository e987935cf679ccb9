//! Save command - upload newly created images at job end

use crate::actions::ActionsContext;
use crate::cache::create_backend;
use crate::config::Config;
use crate::docker::ImageCache;
use crate::error::{ImageCacheError, ImageCacheResult};
use crate::shell::ShellExecutor;
use tracing::debug;

/// Execute the save command
pub async fn execute(config: &Config, actions: &dyn ActionsContext) -> ImageCacheResult<()> {
    let backend = create_backend(config).map_err(ImageCacheError::save)?;
    debug!("Using {} cache backend", backend.backend_name());

    let shell = ShellExecutor::new(actions);
    ImageCache::new(actions, &*backend, &shell, config.archive_path.clone())
        .save()
        .await
}
