//! Run and scratchpad types.
//!
//! A [`Run`] is one user request lifecycle. Its [`Scratchpad`] is the
//! ordered, append-only trace of (thought, action, observation) steps that
//! is replayed into every subsequent prompt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::ActionDecision;

/// Unique identifier for a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a run. Everything but `Running` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
    Exhausted,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Failed => "failed",
            Self::Exhausted => "exhausted",
        };
        f.write_str(s)
    }
}

/// One iteration of the agent loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub thought: String,
    pub action: ActionDecision,
    /// Empty for a final answer.
    pub observation: String,
    pub timestamp: DateTime<Utc>,
}

impl Step {
    pub fn new(thought: impl Into<String>, action: ActionDecision, observation: impl Into<String>) -> Self {
        Self {
            thought: thought.into(),
            action,
            observation: observation.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Append-only step log. Steps cannot be edited or removed once pushed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scratchpad {
    steps: Vec<Step>,
}

impl Scratchpad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }


    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of steps that called a tool.
    pub fn tool_calls(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.action, ActionDecision::ToolCall { .. }))
            .count()
    }
}

/// One user request lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub input: String,
    pub scratchpad: Scratchpad,
    pub status: RunStatus,
}

impl Run {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            id: RunId::new(),
            input: input.into(),
            scratchpad: Scratchpad::new(),
            status: RunStatus::Running,
        }
    }

    pub fn steps(&self) -> &[Step] {
        self.scratchpad.steps()
    }
}
