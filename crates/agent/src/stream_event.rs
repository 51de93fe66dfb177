//! Live run events.
//!
//! `AgentEvent` mirrors the scratchpad as it grows so a front-end can show
//! the thought / action / observation trace while the run is still going.

use serde::{Deserialize, Serialize};
use toolloop_core::action::Arguments;
use toolloop_core::run::RunStatus;

/// Events emitted by the dispatcher during a streamed run.
///
/// - `started`      run accepted
/// - `thought`      reasoning text parsed from a completion
/// - `tool_call`    a tool is about to be invoked
/// - `observation`  the tool's result (or error) as fed back to the model
/// - `malformed`    the completion could not be parsed
/// - `model_retry`  a model call failed and will be retried
/// - `final_answer` the run produced its answer
/// - `finished`     the run reached a terminal status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Started { run_id: String, input: String },

    Thought { iteration: usize, content: String },

    ToolCall {
        iteration: usize,
        tool: String,
        arguments: Arguments,
    },

    Observation {
        iteration: usize,
        tool: String,
        content: String,
    },

    Malformed { iteration: usize, reason: String },

    ModelRetry {
        iteration: usize,
        attempt: u32,
        delay_ms: u64,
        error: String,
    },

    FinalAnswer { text: String },

    Finished {
        status: RunStatus,
        steps: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl AgentEvent {
    /// Wire name of this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::Thought { .. } => "thought",
            Self::ToolCall { .. } => "tool_call",
            Self::Observation { .. } => "observation",
            Self::Malformed { .. } => "malformed",
            Self::ModelRetry { .. } => "model_retry",
            Self::FinalAnswer { .. } => "final_answer",
            Self::Finished { .. } => "finished",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished { .. })
    }
}
