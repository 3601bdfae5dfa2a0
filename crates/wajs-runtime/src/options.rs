use serde::{Deserialize, Serialize};

/// Limits for the in-process host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeOptions {
    /// Interpreter steps allowed per entry into host code.
    pub step_limit: u64,
    /// Timers one call to `advance` or `run_until_idle` runs before giving up.
    pub max_tasks: usize,
    /// Initial pages of the memory a [`crate::ScriptHost`] owns.
    pub native_pages: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            step_limit: wajs_script::DEFAULT_STEP_LIMIT,
            max_tasks: 100_000,
            native_pages: 1,
        }
    }
}
