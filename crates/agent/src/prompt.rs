//! Prompt rendering for the structured-chat grammar.
//!
//! The prompt lists every tool, teaches the model the
//! `Thought:` / `Action:` / `Observation:` format with a fenced JSON blob,
//! then replays the run so far and ends on a `Thought:` cue.
//!
//! Rendering is a pure function of the run state: the same input, tool list
//! and steps always produce byte-identical text.

use toolloop_core::action::{ActionDecision, FINAL_ANSWER_ACTION};
use toolloop_core::run::{Run, Step};
use toolloop_core::tool::ToolDescription;

const PREFIX: &str =
    "Respond to the human as helpfully and accurately as possible. You have access to the following tools:";

const FORMAT_INTRO: &str = "Use a json blob to specify a tool by providing an action key (tool name) and an action_input key (tool input).";

const FORMAT_BODY: &str = r#"Provide only ONE action per $JSON_BLOB, as shown:

```
{
  "action": $TOOL_NAME,
  "action_input": $INPUT
}
```

Follow this format:

Question: input question to answer
Thought: consider previous and subsequent steps
Action:
```
$JSON_BLOB
```
Observation: action result
... (repeat Thought/Action/Observation N times)
Thought: I know what to respond
Action:
```
{
  "action": "Final Answer",
  "action_input": "Final response to human"
}
```"#;

const SUFFIX: &str = "Begin! Reminder to ALWAYS respond with a valid json blob of a single action. Use tools if necessary. Respond directly if appropriate. Format is Action:```$JSON_BLOB```then Observation:.";

/// Render the full prompt for the next model call of `run`.
pub fn render(run: &Run, tools: &[ToolDescription]) -> String {
    render_parts(&run.input, tools, run.steps())
}

/// Render from the individual parts of a run.
pub fn render_parts(input: &str, tools: &[ToolDescription], steps: &[Step]) -> String {
    let mut out = String::new();

    out.push_str(PREFIX);
    out.push_str("\n\n");
    out.push_str(&render_tools(tools));
    out.push_str("\n\n");
    out.push_str(FORMAT_INTRO);
    out.push_str("\n\n");
    out.push_str(&valid_actions(tools));
    out.push_str("\n\n");
    out.push_str(FORMAT_BODY);
    out.push_str("\n\n");
    out.push_str(SUFFIX);
    out.push_str("\n\nQuestion: ");
    out.push_str(input.trim());
    out.push('\n');

    for step in steps {
        out.push_str(&render_step(step));
    }

    out.push_str("Thought:");
    out
}

/// One line per tool: `name: description, args: {...}`.
pub fn render_tools(tools: &[ToolDescription]) -> String {
    tools
        .iter()
        .map(|t| {
            format!(
                "{}: {}, args: {}",
                t.name,
                t.description,
                t.parameters.to_json_schema()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn valid_actions(tools: &[ToolDescription]) -> String {
    let mut line = format!("Valid \"action\" values: \"{FINAL_ANSWER_ACTION}\"");
    if !tools.is_empty() {
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        line.push_str(" or ");
        line.push_str(&names.join(", "));
    }
    line
}

/// Replay one step in the same grammar the model is asked to produce.
pub fn render_step(step: &Step) -> String {
    let mut out = String::new();
    match step.action.to_blob() {
        Some(blob) => {
            out.push_str("Thought: ");
            out.push_str(step.thought.trim());
            out.push_str("\nAction:\n```\n");
            out.push_str(&blob.to_string());
            out.push_str("\n```\n");
        }
        None => {
            let raw = match &step.action {
                ActionDecision::Malformed { raw_text, .. } => raw_text.as_str(),
                _ => "",
            };
            let raw = raw.trim();
            let raw = raw.strip_prefix("Thought:").unwrap_or(raw).trim_start();
            out.push_str("Thought: ");
            out.push_str(raw);
            out.push('\n');
        }
    }
    out.push_str("Observation: ");
    out.push_str(step.observation.trim());
    out.push('\n');
    out
}
