//! Docker image listing and diffing

use crate::shell::quote;
use std::collections::HashSet;
use std::path::Path;

/// Lists every local image with exactly one identifier per line:
/// `repository:tag`, `repository` for an untagged named image, or the image
/// ID when the repository is `<none>`.
pub const LIST_COMMAND: &str = concat!(
    "docker image list --format '",
    r#"{{ if ne .Repository "<none>" }}{{ .Repository }}"#,
    r#"{{ if ne .Tag "<none>" }}:{{ .Tag }}{{ end }}{{ else }}{{ .ID }}{{ end }}'"#,
);

/// Command loading an image archive into the local image store
pub fn load_command(archive: &Path) -> String {
    format!("docker load --input {}", quote(&archive.display().to_string()))
}

/// Command writing `images` into an image archive
pub fn save_command(archive: &Path, images: &[String]) -> String {
    format!(
        "docker save --output {} {}",
        quote(&archive.display().to_string()),
        images.join(" ")
    )
}

/// Images in `current` that are neither in `baseline` nor blank
///
/// Keeps the order of `current`.
pub fn new_images(current: &str, baseline: &str) -> Vec<String> {
    let baseline: HashSet<&str> = baseline.split('\n').collect();

    current
        .split('\n')
        .filter(|image| !image.is_empty() && !baseline.contains(image))
        .map(str::to_string)
        .collect()
}
