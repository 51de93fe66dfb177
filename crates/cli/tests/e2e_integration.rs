//! End-to-end integration tests for the toolloop agent.
//!
//! These tests exercise the full pipeline from a question to an answer:
//! configuration, the built-in tool registry, prompt rendering, action
//! parsing and the dispatcher loop, with a scripted model in place of a
//! real backend.

use std::sync::{Arc, Mutex};

use serde_json::json;
use toolloop_agent::{AgentEvent, CancellationToken, Dispatcher};
use toolloop_config::{AppConfig, ToolsConfig};
use toolloop_core::error::{RunError, TransportError};
use toolloop_core::model::ModelClient;
use toolloop_core::run::RunStatus;
use toolloop_core::AgentConfig;
use toolloop_tools::default_registry;

// ── Mock Model ───────────────────────────────────────────────────────────

/// A model client that returns scripted completions in sequence.
struct ScriptedModel {
    responses: Vec<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn prompt(&self, index: usize) -> String {
        self.prompts.lock().unwrap()[index].clone()
    }
}

#[async_trait::async_trait]
impl ModelClient for ScriptedModel {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn generate(&self, prompt: &str) -> Result<String, TransportError> {
        let mut prompts = self.prompts.lock().unwrap();
        let call = prompts.len();
        prompts.push(prompt.to_string());
        // Past the end of the script, keep repeating the last completion.
        let response = self
            .responses
            .get(call)
            .or_else(|| self.responses.last())
            .unwrap_or_else(|| panic!("ScriptedModel has no responses (call #{call})"));
        Ok(response.clone())
    }
}

fn action(thought: &str, tool: &str, input: serde_json::Value) -> String {
    format!(
        "Thought: {thought}\nAction:\n```json\n{}\n```",
        json!({ "action": tool, "action_input": input })
    )
}

fn final_answer(thought: &str, answer: &str) -> String {
    action(thought, "Final Answer", json!(answer))
}

fn tools_config(enabled: &[&str]) -> ToolsConfig {
    ToolsConfig {
        enabled: enabled.iter().map(|s| s.to_string()).collect(),
        ..ToolsConfig::default()
    }
}

fn dispatcher(model: Arc<ScriptedModel>, tools: ToolsConfig, agent: AgentConfig) -> Dispatcher {
    let registry = default_registry(&tools).unwrap();
    Dispatcher::new(model, Arc::new(registry), agent)
}

fn observations(report: &toolloop_agent::RunReport) -> Vec<&str> {
    report
        .run
        .steps()
        .iter()
        .map(|s| s.observation.as_str())
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn calculator_question_end_to_end() {
    let model = Arc::new(ScriptedModel::new(vec![
        action("I should compute this", "calculator", json!({"expression": "12 * (3 + 4)"})),
        final_answer("I now know the final answer", "84"),
    ]));
    let dispatcher = dispatcher(
        model.clone(),
        tools_config(&["calculator"]),
        AgentConfig::default(),
    );

    let report = dispatcher
        .run("What is 12 times the sum of 3 and 4?", &CancellationToken::new())
        .await;

    assert_eq!(report.outcome.as_deref(), Ok("84"));
    assert_eq!(report.status(), RunStatus::Finished);
    assert_eq!(observations(&report), vec!["84", ""]);
    assert_eq!(model.calls(), 2);

    let first = model.prompt(0);
    assert!(first.contains("calculator: "));
    assert!(first.contains("Question: What is 12 times the sum of 3 and 4?\nThought:"));
    assert!(model.prompt(1).contains("Observation: 84\nThought:"));
}

#[tokio::test]
async fn scalar_action_input_binds_to_first_parameter() {
    let model = Arc::new(ScriptedModel::new(vec![
        action("compute", "calculator", json!("2 ** 10")),
        final_answer("done", "1024"),
    ]));
    let dispatcher = dispatcher(model, tools_config(&["calculator"]), AgentConfig::default());

    let report = dispatcher.run("2 to the 10th?", &CancellationToken::new()).await;

    assert_eq!(report.outcome.as_deref(), Ok("1024"));
    assert_eq!(observations(&report)[0], "1024");
}

#[tokio::test]
async fn calculator_errors_are_observations() {
    let model = Arc::new(ScriptedModel::new(vec![
        action("divide", "calculator", json!({"expression": "1 / 0"})),
        final_answer("cannot divide by zero", "undefined"),
    ]));
    let dispatcher = dispatcher(model, tools_config(&["calculator"]), AgentConfig::default());

    let report = dispatcher.run("What is 1/0?", &CancellationToken::new()).await;

    assert_eq!(report.status(), RunStatus::Finished);
    assert!(observations(&report)[0].starts_with("Error: Tool execution failed: calculator"));
}

#[tokio::test]
async fn unknown_tool_lists_valid_tools() {
    let model = Arc::new(ScriptedModel::new(vec![
        action("search the web", "web_search", json!({"query": "rust"})),
        final_answer("no search tool", "I can't search."),
    ]));
    let dispatcher = dispatcher(
        model,
        tools_config(&["calculator", "get_disk_usage"]),
        AgentConfig::default(),
    );

    let report = dispatcher.run("Search for rust", &CancellationToken::new()).await;

    assert_eq!(report.status(), RunStatus::Finished);
    assert_eq!(
        observations(&report)[0],
        "Error: Unknown tool: web_search. Valid tools are: calculator, get_disk_usage"
    );
}

#[tokio::test]
async fn weather_without_key_is_reported_to_the_model() {
    let model = Arc::new(ScriptedModel::new(vec![
        action("look it up", "get_weather", json!({"city": "Paris"})),
        final_answer("the weather tool is unavailable", "Unknown"),
    ]));
    let dispatcher = dispatcher(
        model,
        tools_config(&["get_weather"]),
        AgentConfig::default(),
    );

    let report = dispatcher.run("Weather in Paris?", &CancellationToken::new()).await;

    assert_eq!(report.outcome.as_deref(), Ok("Unknown"));
    assert!(observations(&report)[0].starts_with("Error: Tool not configured: get_weather"));
}

#[tokio::test]
async fn disk_usage_reports_structured_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().to_string_lossy().to_string();
    let model = Arc::new(ScriptedModel::new(vec![
        action("check the disk", "get_disk_usage", json!({"path": path})),
        final_answer("read the report", "plenty of space"),
    ]));
    let dispatcher = dispatcher(
        model,
        tools_config(&["get_disk_usage"]),
        AgentConfig::default(),
    );

    let report = dispatcher.run("How full is my disk?", &CancellationToken::new()).await;

    let observation: serde_json::Value =
        serde_json::from_str(observations(&report)[0]).unwrap();
    assert_eq!(observation["Path"], json!(path));
    assert!(observation["Total Space (GB)"].as_f64().unwrap() > 0.0);
    assert!(observation["Usage Percentage (%)"].as_f64().unwrap() <= 100.0);
}

#[tokio::test]
async fn endless_tool_calls_exhaust_the_budget() {
    let model = Arc::new(ScriptedModel::new(vec![action(
        "again",
        "calculator",
        json!({"expression": "1+1"}),
    )]));
    let agent = AgentConfig {
        max_iterations: 3,
        ..AgentConfig::default()
    };
    let dispatcher = dispatcher(model.clone(), tools_config(&["calculator"]), agent);

    let report = dispatcher.run("loop forever", &CancellationToken::new()).await;

    assert_eq!(report.status(), RunStatus::Exhausted);
    assert_eq!(
        report.outcome,
        Err(RunError::IterationLimitExceeded { max_iterations: 3 })
    );
    assert_eq!(observations(&report), vec!["2", "2", "2"]);
    assert_eq!(model.calls(), 3);
}

#[tokio::test]
async fn malformed_reply_gets_corrected() {
    let model = Arc::new(ScriptedModel::new(vec![
        "The answer is probably 4.".to_string(),
        final_answer("use the format", "4"),
    ]));
    let dispatcher = dispatcher(model.clone(), tools_config(&["calculator"]), AgentConfig::default());

    let report = dispatcher.run("What is 2+2?", &CancellationToken::new()).await;

    assert_eq!(report.outcome.as_deref(), Ok("4"));
    assert!(observations(&report)[0].starts_with("Invalid or incomplete response"));
    assert!(model.prompt(1).contains("The answer is probably 4.\nObservation: Invalid"));
}

#[tokio::test]
async fn streamed_run_emits_trace_in_order() {
    let model = Arc::new(ScriptedModel::new(vec![
        action("add", "calculator", json!({"expression": "2+2"})),
        final_answer("done", "4"),
    ]));
    let dispatcher = dispatcher(model, tools_config(&["calculator"]), AgentConfig::default());

    let mut rx = dispatcher.run_stream("What is 2+2?", CancellationToken::new());
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    let kinds: Vec<&str> = events.iter().map(AgentEvent::event_type).collect();
    assert_eq!(
        kinds,
        vec![
            "started",
            "thought",
            "tool_call",
            "observation",
            "thought",
            "final_answer",
            "finished"
        ]
    );
    assert!(matches!(
        &events[3],
        AgentEvent::Observation { tool, content, .. } if tool == "calculator" && content == "4"
    ));
    assert_eq!(
        events.last(),
        Some(&AgentEvent::Finished {
            status: RunStatus::Finished,
            steps: 2,
            error: None,
        })
    );
}

#[tokio::test]
async fn config_file_drives_the_registry_and_limits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[agent]
max_iterations = 2

[tools]
enabled = ["get_disk_usage", "calculator"]
"#,
    )
    .unwrap();

    let config = AppConfig::load_from(&path).unwrap();
    assert_eq!(config.agent.max_iterations, 2);

    let model = Arc::new(ScriptedModel::new(vec!["no format".to_string()]));
    let dispatcher = dispatcher(model.clone(), config.tools.clone(), config.agent.clone());

    assert_eq!(dispatcher.tools().names(), vec!["get_disk_usage", "calculator"]);
    assert!(model.prompts.lock().unwrap().is_empty());

    let report = dispatcher.run("anything", &CancellationToken::new()).await;
    assert_eq!(report.status(), RunStatus::Exhausted);
    assert!(model
        .prompt(0)
        .contains(r#"Valid "action" values: "Final Answer" or get_disk_usage, calculator"#));
}

#[tokio::test]
async fn cancelled_run_stops_before_the_model() {
    let model = Arc::new(ScriptedModel::new(vec![final_answer("x", "y")]));
    let dispatcher = dispatcher(model.clone(), tools_config(&["calculator"]), AgentConfig::default());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = dispatcher.run("What is 2+2?", &cancel).await;

    assert_eq!(report.status(), RunStatus::Failed);
    assert_eq!(report.outcome, Err(RunError::Cancelled));
    assert_eq!(model.calls(), 0);
}
