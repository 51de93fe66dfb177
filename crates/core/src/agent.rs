//! Agent loop limits.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounds applied to every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum steps per run (safety limit)
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Per-attempt bound on a model call
    #[serde(default = "default_model_timeout_secs")]
    pub model_timeout_secs: u64,

    /// Per-invocation bound on a tool call
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// Total model call attempts per iteration before the run fails
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Delay before the second attempt; doubles for each further attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_max_iterations() -> usize {
    10
}
fn default_model_timeout_secs() -> u64 {
    60
}
fn default_tool_timeout_secs() -> u64 {
    30
}
fn default_retry_count() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    500
}

const MAX_BACKOFF: Duration = Duration::from_secs(30);

impl AgentConfig {
    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    /// Delay to wait after `failed_attempts` consecutive failures.
    pub fn backoff_for(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(16);
        let delay = Duration::from_millis(self.retry_backoff_ms).saturating_mul(1 << exponent);
        delay.min(MAX_BACKOFF)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            model_timeout_secs: default_model_timeout_secs(),
            tool_timeout_secs: default_tool_timeout_secs(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}
