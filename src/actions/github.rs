//! Actions context backed by the GitHub runner environment

use super::command::{env_file_record, named_command};
use super::{input_env_name, state_env_name, ActionsContext, InputOptions};
use crate::error::{ImageCacheError, ImageCacheResult};
use std::env;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error};

/// Context for a step running under the GitHub Actions runner
#[derive(Debug, Default)]
pub struct GithubActions {
    state_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
    failed: AtomicBool,
}

impl GithubActions {
    /// Read the env file locations from `GITHUB_STATE` and `GITHUB_OUTPUT`
    pub fn from_env() -> Self {
        Self::with_files(env_path("GITHUB_STATE"), env_path("GITHUB_OUTPUT"))
    }

    /// Create a context writing to explicit env files
    pub fn with_files(state_file: Option<PathBuf>, output_file: Option<PathBuf>) -> Self {
        Self {
            state_file,
            output_file,
            failed: AtomicBool::new(false),
        }
    }

    /// Write a `name=value` pair to an env file, or fall back to the legacy
    /// workflow command when the runner did not provide one.
    fn issue(
        file: Option<&Path>,
        kind: &'static str,
        command: &str,
        name: &str,
        value: &str,
    ) -> ImageCacheResult<()> {
        let Some(path) = file else {
            println!("{}", named_command(command, name, value));
            return Ok(());
        };

        let record = env_file_record(name, value)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| ImageCacheError::CommandFile {
                kind,
                path: path.to_path_buf(),
                source,
            })?;

        file.write_all(record.as_bytes())
            .map_err(|source| ImageCacheError::CommandFile {
                kind,
                path: path.to_path_buf(),
                source,
            })
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

impl ActionsContext for GithubActions {
    fn get_input(&self, name: &str, options: InputOptions) -> ImageCacheResult<String> {
        let value = env::var(input_env_name(name)).unwrap_or_default();
        let value = value.trim();

        if options.required && value.is_empty() {
            return Err(ImageCacheError::InputRequired(name.to_string()));
        }

        Ok(value.to_string())
    }

    fn get_state(&self, name: &str) -> String {
        env::var(state_env_name(name)).unwrap_or_default()
    }

    fn save_state(&self, name: &str, value: &str) -> ImageCacheResult<()> {
        debug!("Saving state {}", name);
        Self::issue(self.state_file.as_deref(), "state", "save-state", name, value)
    }

    fn set_output(&self, name: &str, value: &str) -> ImageCacheResult<()> {
        debug!("Setting output {}={}", name, value);
        Self::issue(self.output_file.as_deref(), "output", "set-output", name, value)
    }

    fn set_failed(&self, message: &str) {
        self.failed.store(true, Ordering::SeqCst);
        error!("{}", message);
    }

    fn is_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn reads_trimmed_inputs() {
        env::set_var("INPUT_KEY", "  docker-linux-abc \n");
        let actions = GithubActions::with_files(None, None);

        let key = actions.get_input("key", InputOptions::required()).unwrap();
        assert_eq!(key, "docker-linux-abc");

        env::remove_var("INPUT_KEY");
    }

    #[test]
    #[serial]
    fn missing_required_input_fails() {
        env::remove_var("INPUT_KEY");
        let actions = GithubActions::with_files(None, None);

        let err = actions.get_input("key", InputOptions::required()).unwrap_err();
        assert!(matches!(err, ImageCacheError::InputRequired(ref name) if name == "key"));

        let optional = actions.get_input("key", InputOptions::default()).unwrap();
        assert_eq!(optional, "");
    }

    #[test]
    #[serial]
    fn reads_hyphenated_inputs() {
        env::set_var("INPUT_READ-ONLY", "true");
        let actions = GithubActions::with_files(None, None);

        assert_eq!(
            actions.get_input("read-only", InputOptions::default()).unwrap(),
            "true"
        );

        env::remove_var("INPUT_READ-ONLY");
    }

    #[test]
    #[serial]
    fn reads_state_from_environment() {
        env::set_var("STATE_cache-hit", "true");
        let actions = GithubActions::with_files(None, None);

        assert_eq!(actions.get_state("cache-hit"), "true");
        assert_eq!(actions.get_state("docker-images-list"), "");

        env::remove_var("STATE_cache-hit");
    }

    #[test]
    fn appends_state_and_outputs_to_files() {
        let temp = TempDir::new().unwrap();
        let state = temp.path().join("state");
        let output = temp.path().join("output");
        let actions = GithubActions::with_files(Some(state.clone()), Some(output.clone()));

        actions.save_state("cache-hit", "false").unwrap();
        actions
            .save_state("docker-images-list", "a:1\nb:2")
            .unwrap();
        actions.set_output("cache-hit", "false").unwrap();

        let state = std::fs::read_to_string(state).unwrap();
        assert!(state.starts_with("cache-hit<<ghadelimiter_"));
        assert!(state.contains("\na:1\nb:2\n"));
        assert_eq!(state.matches("<<ghadelimiter_").count(), 2);

        let output = std::fs::read_to_string(output).unwrap();
        assert!(output.starts_with("cache-hit<<"));
        assert!(output.contains("\nfalse\n"));
    }

    #[test]
    fn unwritable_env_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing").join("state");
        let actions = GithubActions::with_files(Some(missing), None);

        let err = actions.save_state("cache-hit", "true").unwrap_err();
        assert!(err.to_string().contains("state file"));
    }

    #[test]
    fn set_failed_latches() {
        let actions = GithubActions::with_files(None, None);
        assert!(!actions.is_failed());

        actions.set_failed("Command execution failed: boom");
        assert!(actions.is_failed());
    }
}
