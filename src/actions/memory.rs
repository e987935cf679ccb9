//! In-process actions context
//!
//! Holds inputs, state and outputs in memory so the load and save phases can
//! be driven without a runner. State saved by one phase is visible to
//! [`get_state`](ActionsContext::get_state) immediately, which mirrors what the
//! runner does between the two step processes.

use super::{ActionsContext, InputOptions};
use crate::error::{ImageCacheError, ImageCacheResult};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::error;

/// Actions context kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryActions {
    inputs: Mutex<HashMap<String, String>>,
    state: Mutex<HashMap<String, String>>,
    outputs: Mutex<HashMap<String, String>>,
    failures: Mutex<Vec<String>>,
}

impl MemoryActions {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an input (builder style)
    pub fn with_input(self, name: &str, value: &str) -> Self {
        lock(&self.inputs).insert(name.to_string(), value.to_string());
        self
    }

    /// Set a state slot as if an earlier phase had saved it (builder style)
    pub fn with_state(self, name: &str, value: &str) -> Self {
        lock(&self.state).insert(name.to_string(), value.to_string());
        self
    }

    /// Current value of a state slot, if any phase saved it
    pub fn state(&self, name: &str) -> Option<String> {
        lock(&self.state).get(name).cloned()
    }

    /// Current value of a step output
    pub fn output(&self, name: &str) -> Option<String> {
        lock(&self.outputs).get(name).cloned()
    }

    /// Messages passed to `set_failed`, in order
    pub fn failures(&self) -> Vec<String> {
        lock(&self.failures).clone()
    }
}

// A poisoned map only means another test thread panicked mid-insert; the data
// is still usable.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl ActionsContext for MemoryActions {
    fn get_input(&self, name: &str, options: InputOptions) -> ImageCacheResult<String> {
        let value = lock(&self.inputs)
            .get(name)
            .map(|v| v.trim().to_string())
            .unwrap_or_default();

        if options.required && value.is_empty() {
            return Err(ImageCacheError::InputRequired(name.to_string()));
        }
        Ok(value)
    }

    fn get_state(&self, name: &str) -> String {
        self.state(name).unwrap_or_default()
    }

    fn save_state(&self, name: &str, value: &str) -> ImageCacheResult<()> {
        lock(&self.state).insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn set_output(&self, name: &str, value: &str) -> ImageCacheResult<()> {
        lock(&self.outputs).insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn set_failed(&self, message: &str) {
        error!("{}", message);
        lock(&self.failures).push(message.to_string());
    }

    fn is_failed(&self) -> bool {
        !lock(&self.failures).is_empty()
    }
}
