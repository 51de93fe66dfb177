//! The decision extracted from one model response.

use serde::{Deserialize, Serialize};

/// Tool arguments: parameter name → value.
pub type Arguments = serde_json::Map<String, serde_json::Value>;

/// The `action` value the model uses to finish a run.
pub const FINAL_ANSWER_ACTION: &str = "Final Answer";

/// What the model asked for in a single response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionDecision {
    /// Invoke a tool with the given arguments.
    ToolCall {
        tool_name: String,
        arguments: Arguments,
    },

    /// Finish the run with this answer.
    FinalAnswer { text: String },

    /// The response did not follow the action grammar.
    Malformed { raw_text: String, reason: String },
}

impl ActionDecision {
    pub fn is_final(&self) -> bool {
        matches!(self, Self::FinalAnswer { .. })
    }

    /// The canonical `{"action": …, "action_input": …}` blob for this decision.
    ///
    /// `Malformed` has no blob; it is replayed as raw text instead.
    pub fn to_blob(&self) -> Option<serde_json::Value> {
        match self {
            Self::ToolCall {
                tool_name,
                arguments,
            } => Some(serde_json::json!({
                "action": tool_name,
                "action_input": arguments,
            })),
            Self::FinalAnswer { text } => Some(serde_json::json!({
                "action": FINAL_ANSWER_ACTION,
                "action_input": text,
            })),
            Self::Malformed { .. } => None,
        }
    }
}

/// Parser output: the model's reasoning plus its decision.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAction {
    pub thought: String,
    pub decision: ActionDecision,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_call_blob_shape() {
        let mut arguments = Arguments::new();
        arguments.insert("expression".into(), "2+2".into());
        let decision = ActionDecision::ToolCall {
            tool_name: "calculator".into(),
            arguments,
        };
        let blob = decision.to_blob().unwrap();
        assert_eq!(blob["action"], "calculator");
        assert_eq!(blob["action_input"]["expression"], "2+2");
        assert!(!decision.is_final());
    }

    #[test]
    fn malformed_has_no_blob() {
        let decision = ActionDecision::Malformed {
            raw_text: "hmm".into(),
            reason: "no action".into(),
        };
        assert!(decision.to_blob().is_none());
    }

    #[test]
    fn final_answer_serializes_with_kind_tag() {
        let decision = ActionDecision::FinalAnswer { text: "4".into() };
        let json = serde_json::to_string(&decision).unwrap();
        assert!(json.contains(r#""kind":"final_answer""#));
        assert!(decision.is_final());
    }
}
