//! Shared test doubles for the agent loop.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use toolloop_core::action::Arguments;
use toolloop_core::error::{ToolError, TransportError};
use toolloop_core::model::ModelClient;
use toolloop_core::tool::{Parameter, ParameterKind, ParameterSchema, Tool, ToolOutput, ToolRegistry};

/// A model client that replays scripted completions.
///
/// Each call to `generate` pops the next response. Once the script is
/// exhausted the `repeat` response (if any) is returned forever; otherwise
/// the call panics.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, TransportError>>>,
    repeat: Option<Result<String, TransportError>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<Result<String, TransportError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            repeat: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Script of successful completions.
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    /// Return the same response on every call.
    pub fn always(response: Result<String, TransportError>) -> Self {
        Self {
            repeat: Some(response),
            ..Self::new(vec![])
        }
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// Every prompt received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String, TransportError> {
        let call = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            prompts.len()
        };
        if let Some(next) = self.responses.lock().unwrap().pop_front() {
            return next;
        }
        match &self.repeat {
            Some(response) => response.clone(),
            None => panic!("ScriptedModel: no more responses (call #{call})"),
        }
    }
}

/// Routes each prompt to the script whose key it contains, after a short
/// delay so concurrent runs interleave.
pub struct RoutedModel {
    routes: Vec<(String, ScriptedModel)>,
}

impl RoutedModel {
    pub fn new(routes: Vec<(&str, ScriptedModel)>) -> Self {
        Self {
            routes: routes.into_iter().map(|(key, model)| (key.to_string(), model)).collect(),
        }
    }

    pub fn script(&self, key: &str) -> &ScriptedModel {
        &self.routes.iter().find(|(k, _)| k == key).unwrap().1
    }
}

#[async_trait]
impl ModelClient for RoutedModel {
    fn name(&self) -> &str {
        "routed"
    }

    async fn generate(&self, prompt: &str) -> Result<String, TransportError> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let (_, model) = self
            .routes
            .iter()
            .find(|(key, _)| prompt.contains(key.as_str()))
            .unwrap_or_else(|| panic!("RoutedModel: no route for prompt"));
        model.generate(prompt).await
    }
}

/// A model that never answers; every call runs into the model timeout.
#[derive(Default)]
pub struct HangingModel {
    calls: Mutex<usize>,
}

impl HangingModel {
    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ModelClient for HangingModel {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, TransportError> {
        *self.calls.lock().unwrap() += 1;
        std::future::pending().await
    }
}

/// Completion text for a fenced tool call.
pub fn tool_call_text(thought: &str, tool: &str, input: serde_json::Value) -> String {
    format!(
        "Thought: {thought}\nAction:\n```json\n{}\n```",
        serde_json::json!({ "action": tool, "action_input": input })
    )
}

/// Completion text for a fenced final answer.
pub fn final_answer_text(thought: &str, answer: &str) -> String {
    tool_call_text(thought, "Final Answer", serde_json::Value::String(answer.into()))
}

pub fn calculator_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry
        .register(Box::new(toolloop_tools::calculator::CalculatorTool))
        .unwrap();
    registry
}

/// `repeat(text, times = 1, loud?)`: exercises every parameter kind.
pub struct ArgsTool;

#[async_trait]
impl Tool for ArgsTool {
    fn name(&self) -> &str {
        "repeat"
    }

    fn description(&self) -> &str {
        "Repeats text"
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new(vec![
            Parameter::required("text", ParameterKind::String, "Text to repeat"),
            Parameter::optional("times", ParameterKind::Integer, "Repetitions").with_default(1),
            Parameter::optional("loud", ParameterKind::Boolean, "Upper-case the result"),
        ])
    }

    async fn invoke(&self, arguments: &Arguments) -> Result<ToolOutput, ToolError> {
        let text = arguments["text"].as_str().unwrap_or_default();
        let times = arguments["times"].as_u64().unwrap_or(1) as usize;
        let out = text.repeat(times);
        let loud = arguments.get("loud").and_then(|v| v.as_bool()).unwrap_or(false);
        Ok(ToolOutput::Text(if loud { out.to_uppercase() } else { out }))
    }
}

/// A tool that always fails.
pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "flaky"
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::default()
    }

    async fn invoke(&self, _arguments: &Arguments) -> Result<ToolOutput, ToolError> {
        Err(ToolError::ExecutionFailed {
            tool_name: "flaky".into(),
            reason: "upstream exploded".into(),
        })
    }
}

/// A tool that takes an hour.
pub struct SlowTool;

#[async_trait]
impl Tool for SlowTool {
    fn name(&self) -> &str {
        "slow"
    }

    fn description(&self) -> &str {
        "Sleeps for an hour"
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::default()
    }

    async fn invoke(&self, _arguments: &Arguments) -> Result<ToolOutput, ToolError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(ToolOutput::Text("done".into()))
    }
}
