//! GitHub Actions runner context
//!
//! Inputs, state slots, outputs and the job failure flag, expressed through
//! the runner protocol:
//! - inputs arrive as `INPUT_<NAME>` environment variables
//! - state saved by one step process is handed to the next as `STATE_<name>`
//! - state and outputs are written to the files named by `GITHUB_STATE`
//!   and `GITHUB_OUTPUT`, or as workflow commands on older runners
//!
//! The [`ActionsContext`] trait is the seam the cache controller depends on,
//! so tests can substitute [`MemoryActions`].

pub mod command;
mod github;
pub mod log;
mod memory;

pub use github::GithubActions;
pub use log::WorkflowCommandFormat;
pub use memory::MemoryActions;

use crate::error::ImageCacheResult;

/// Options for [`ActionsContext::get_input`]
#[derive(Debug, Clone, Copy, Default)]
pub struct InputOptions {
    /// Fail when the input is missing or blank
    pub required: bool,
}

impl InputOptions {
    /// Options for a required input
    pub fn required() -> Self {
        Self { required: true }
    }
}

/// Access to the CI job context of the current step
pub trait ActionsContext: Send + Sync {
    /// Read an action input, trimmed. Missing optional inputs are `""`.
    fn get_input(&self, name: &str, options: InputOptions) -> ImageCacheResult<String>;

    /// Read a state slot written by an earlier phase of this action, `""` if unset
    fn get_state(&self, name: &str) -> String;

    /// Persist a state slot for later phases of this action
    fn save_state(&self, name: &str, value: &str) -> ImageCacheResult<()>;

    /// Set a step output
    fn set_output(&self, name: &str, value: &str) -> ImageCacheResult<()>;

    /// Report a fatal failure without interrupting the caller
    ///
    /// The message is logged at error level and the job is marked failed;
    /// the process exits unsuccessfully once the current phase returns.
    fn set_failed(&self, message: &str);

    /// Whether [`set_failed`](Self::set_failed) has been called
    fn is_failed(&self) -> bool;
}

/// Environment variable carrying an input: `INPUT_` + upper-cased name with
/// spaces replaced by underscores. Hyphens are kept (`INPUT_READ-ONLY`).
pub fn input_env_name(name: &str) -> String {
    format!("INPUT_{}", name.replace(' ', "_").to_uppercase())
}

/// Environment variable carrying a state slot saved by an earlier phase
pub fn state_env_name(name: &str) -> String {
    format!("STATE_{}", name)
}
