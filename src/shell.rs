//! Shell command execution
//!
//! Runs a single command line through a platform-appropriate shell. A failed
//! command never surfaces as an `Err`: it marks the job failed through the
//! actions context and yields an empty string, so the calling phase carries
//! on with whatever it has.

use crate::actions::ActionsContext;
use crate::error::{ImageCacheError, ImageCacheResult};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error, info};

/// Default shell on Linux and macOS runners
pub const POSIX_DEFAULT_SHELL: &str = "/usr/bin/bash";

/// Default shell on Windows runners (Git for Windows)
pub const WINDOWS_DEFAULT_SHELL: &str = r"C:\Program Files\Git\bin\bash.exe";

/// Runner platform, as far as shell selection is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Windows runners
    Windows,
    /// Linux and macOS runners
    Posix,
}

impl Platform {
    /// Detect the current platform
    pub fn detect() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Posix
        }
    }

    /// Get a human-readable platform name
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Windows => "Windows",
            Platform::Posix => "POSIX",
        }
    }
}

/// Pick the shell for a platform: `$SHELL` wins on POSIX, otherwise the
/// fixed default for the platform.
pub fn select_shell(platform: Platform, env_shell: Option<&str>) -> String {
    match (platform, env_shell) {
        (Platform::Posix, Some(shell)) if !shell.is_empty() => shell.to_string(),
        (Platform::Posix, _) => POSIX_DEFAULT_SHELL.to_string(),
        (Platform::Windows, _) => WINDOWS_DEFAULT_SHELL.to_string(),
    }
}

/// Quote a single word for a POSIX shell
pub fn quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', r"'\''"))
}

/// Something that runs command lines and returns their trimmed stdout
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command line to completion
    ///
    /// Returns trimmed stdout, or `""` when the command could not run or
    /// exited unsuccessfully. An empty result means "no usable output", not
    /// necessarily "the command printed nothing".
    async fn execute(&self, command: &str) -> String;
}

/// Executes commands through the runner's shell
pub struct ShellExecutor<'a> {
    actions: &'a dyn ActionsContext,
    platform: Platform,
    env_shell: Option<String>,
}

impl<'a> ShellExecutor<'a> {
    /// Create an executor for the current platform, honouring `$SHELL`
    pub fn new(actions: &'a dyn ActionsContext) -> Self {
        Self {
            actions,
            platform: Platform::detect(),
            env_shell: std::env::var("SHELL").ok(),
        }
    }

    /// Override the detected platform
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Override the `$SHELL` value seen by shell selection
    pub fn with_env_shell(mut self, shell: Option<String>) -> Self {
        self.env_shell = shell;
        self
    }

    /// The shell commands will run through
    pub fn shell(&self) -> String {
        select_shell(self.platform, self.env_shell.as_deref())
    }

    async fn run(&self, shell: &str, command: &str) -> ImageCacheResult<(String, String)> {
        let output = Command::new(shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ImageCacheError::command_failed(command, e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            let stderr = match output.status.code() {
                Some(code) => format!("exit code {}: {}", code, stderr),
                None => format!("terminated by signal: {}", stderr),
            };
            return Err(ImageCacheError::command_exec(command, stderr));
        }

        Ok((stdout, stderr))
    }
}

#[async_trait]
impl CommandRunner for ShellExecutor<'_> {
    async fn execute(&self, command: &str) -> String {
        info!("Executing command: {}", command);

        let shell = self.shell();
        debug!("Selecting shell for {}", self.platform.name());
        info!("Using shell: {}", shell);

        match self.run(&shell, command).await {
            Ok((stdout, stderr)) => {
                if !stdout.is_empty() {
                    info!("stdout: {}", stdout);
                }
                if !stderr.is_empty() {
                    error!("stderr: {}", stderr);
                }
                stdout
            }
            Err(e) => {
                self.actions
                    .set_failed(&format!("Command execution failed: {}", e));
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::MemoryActions;

    #[test]
    fn shell_from_env_on_posix() {
        assert_eq!(select_shell(Platform::Posix, Some("/bin/zsh")), "/bin/zsh");
        assert_eq!(select_shell(Platform::Posix, None), POSIX_DEFAULT_SHELL);
        assert_eq!(select_shell(Platform::Posix, Some("")), POSIX_DEFAULT_SHELL);
    }

    #[test]
    fn windows_ignores_env_shell() {
        assert_eq!(
            select_shell(Platform::Windows, Some("/bin/zsh")),
            WINDOWS_DEFAULT_SHELL
        );
        assert_eq!(select_shell(Platform::Windows, None), WINDOWS_DEFAULT_SHELL);
    }

    #[test]
    fn platform_name() {
        assert_eq!(Platform::Windows.name(), "Windows");
        assert_eq!(Platform::Posix.name(), "POSIX");
    }

    #[test]
    fn quotes_words() {
        assert_eq!(quote("/home/runner/.docker-images.tar"), "'/home/runner/.docker-images.tar'");
        assert_eq!(quote("it's"), r"'it'\''s'");
    }

    #[cfg(unix)]
    fn sh_executor(actions: &MemoryActions) -> ShellExecutor<'_> {
        ShellExecutor::new(actions)
            .with_platform(Platform::Posix)
            .with_env_shell(Some("/bin/sh".to_string()))
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn returns_trimmed_stdout() {
        let actions = MemoryActions::new();
        let output = sh_executor(&actions).execute("printf '  a:1\\nb:2\\n\\n'").await;

        assert_eq!(output, "a:1\nb:2");
        assert!(!actions.is_failed());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stderr_alone_is_not_a_failure() {
        let actions = MemoryActions::new();
        let output = sh_executor(&actions).execute("echo warning >&2").await;

        assert_eq!(output, "");
        assert!(!actions.is_failed());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_marks_job_failed() {
        let actions = MemoryActions::new();
        let output = sh_executor(&actions)
            .execute("echo partial; echo broken >&2; exit 3")
            .await;

        assert_eq!(output, "");
        let failures = actions.failures();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].starts_with("Command execution failed: "));
        assert!(failures[0].contains("exit code 3: broken"));
    }

    #[tokio::test]
    async fn missing_shell_marks_job_failed() {
        let actions = MemoryActions::new();
        let executor = ShellExecutor::new(&actions)
            .with_platform(Platform::Posix)
            .with_env_shell(Some("/nonexistent/shell".to_string()));

        assert_eq!(executor.execute("true").await, "");
        assert!(actions.is_failed());
    }
}
