//! Workflow command and environment file encoding

use crate::error::{ImageCacheError, ImageCacheResult};
use uuid::Uuid;

/// Escape the data part of a workflow command (`::name::data`)
pub fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Escape a property value of a workflow command (`::name key=value::`)
pub fn escape_property(value: &str) -> String {
    escape_data(value).replace(':', "%3A").replace(',', "%2C")
}

/// Format a workflow command with a single `name` property, as used by the
/// legacy `save-state` and `set-output` commands.
pub fn named_command(command: &str, name: &str, value: &str) -> String {
    format!(
        "::{} name={}::{}",
        command,
        escape_property(name),
        escape_data(value)
    )
}

/// Format a `name<<delimiter` record for the `GITHUB_STATE`/`GITHUB_OUTPUT`
/// environment files, using a fresh random delimiter.
pub fn env_file_record(name: &str, value: &str) -> ImageCacheResult<String> {
    env_file_record_with(name, value, &format!("ghadelimiter_{}", Uuid::new_v4()))
}

fn env_file_record_with(name: &str, value: &str, delimiter: &str) -> ImageCacheResult<String> {
    if name.contains(delimiter) {
        return Err(ImageCacheError::CommandDelimiter {
            name: "name".to_string(),
            delimiter: delimiter.to_string(),
        });
    }
    if value.contains(delimiter) {
        return Err(ImageCacheError::CommandDelimiter {
            name: "value".to_string(),
            delimiter: delimiter.to_string(),
        });
    }

    Ok(format!(
        "{name}<<{delimiter}\n{value}\n{delimiter}\n",
    ))
}
