//! Action parser: raw model text → [`ParsedAction`].
//!
//! Accepted shapes, in order of preference:
//!
//! ````text
//! Thought: <reasoning>
//! Action:
//! ```json
//! {"action": "<tool name | Final Answer>", "action_input": <object | scalar>}
//! ```
//! ````
//!
//! then a bare `{...}` object anywhere in the text, then the classic
//! `Action: name` / `Action Input: ...` lines. Without an `Action:` marker a
//! `Final Answer: ...` line is taken as-is, braces and all.
//! Anything else becomes [`ActionDecision::Malformed`] so the loop can ask
//! the model to try again. Parsing never panics and never fails.

use regex_lite::{Captures, Regex};
use serde_json::Value;
use toolloop_core::action::{ActionDecision, Arguments, ParsedAction, FINAL_ANSWER_ACTION};
use toolloop_core::tool::ToolRegistry;

const OBSERVATION_LINE: &str = r"(?m)^[ \t]*Observation[ \t]*:";
const ACTION_LINE: &str = r"(?m)^[ \t]*Action[ \t]*:";
const FENCED_BLOCK: &str = r"(?s)```[ \t]*(?:json|JSON)?[ \t]*\r?\n?(.*?)```";
const FINAL_ANSWER_LINE: &str = r"(?ms)^[ \t]*Final Answer[ \t]*:(.*)";
const CLASSIC_ACTION: &str = r"(?m)^[ \t]*Action[ \t]*:[ \t]*([^\s{\[`][^\r\n]*)$";
const CLASSIC_ACTION_INPUT: &str = r"(?ms)^[ \t]*Action Input[ \t]*:(.*)";

/// Parameter name a scalar input binds to when the tool is not registered.
const FALLBACK_PARAMETER: &str = "input";

fn find<'h>(pattern: &str, text: &'h str) -> Option<Captures<'h>> {
    Regex::new(pattern).ok()?.captures(text)
}

/// Parse one model completion.
pub fn parse(raw: &str, registry: &ToolRegistry) -> ParsedAction {
    let text = truncate_at_observation(raw).trim();

    if text.is_empty() {
        return malformed(String::new(), text, "the response was empty");
    }

    let action_start = find(ACTION_LINE, text).and_then(|c| c.get(0)).map(|m| m.start());

    // A plain `Final Answer:` line may itself contain braces.
    if action_start.is_none()
        && let Some(answer) = final_answer_line(text)
    {
        return answer;
    }

    match locate_blob(text, action_start) {
        BlobSearch::Found { start, json } => {
            let thought = thought_before(text, action_start.unwrap_or(start));
            match serde_json::from_str::<Value>(json) {
                // `Action: name` + `Action Input: {...}`
                Ok(Value::Object(map))
                    if !map.contains_key("action") && find(CLASSIC_ACTION, text).is_some() =>
                {
                    parse_classic(text, action_start, registry)
                }
                Ok(value) => decide(thought, text, value, registry),
                Err(e) => malformed(thought, text, &format!("the action blob is not valid JSON ({e})")),
            }
        }
        BlobSearch::Unterminated { start } => {
            let thought = thought_before(text, action_start.unwrap_or(start));
            malformed(thought, text, "the action blob is not closed")
        }
        BlobSearch::Missing => parse_classic(text, action_start, registry),
    }
}

/// The model must not write its own observations; drop everything from the
/// first `Observation:` line on.
fn truncate_at_observation(raw: &str) -> &str {
    match find(OBSERVATION_LINE, raw).and_then(|c| c.get(0)) {
        Some(m) => &raw[..m.start()],
        None => raw,
    }
}

fn thought_before(text: &str, end: usize) -> String {
    let head = text[..end].trim();
    head.strip_prefix("Thought:")
        .unwrap_or(head)
        .trim()
        .to_string()
}

fn malformed(thought: String, text: &str, reason: &str) -> ParsedAction {
    ParsedAction {
        thought,
        decision: ActionDecision::Malformed {
            raw_text: text.to_string(),
            reason: reason.to_string(),
        },
    }
}

enum BlobSearch<'a> {
    Found { start: usize, json: &'a str },
    Unterminated { start: usize },
    Missing,
}

/// Look for the JSON blob after `Action:` (or anywhere, without a marker):
/// a fenced block first, then the first balanced `{...}`.
fn locate_blob(text: &str, action_start: Option<usize>) -> BlobSearch<'_> {
    let from = action_start.unwrap_or(0);
    let region = &text[from..];

    if let Some(caps) = find(FENCED_BLOCK, region)
        && let (Some(whole), Some(body)) = (caps.get(0), caps.get(1))
        && body.as_str().trim_start().starts_with(['{', '['])
    {
        return BlobSearch::Found {
            start: from + whole.start(),
            json: body.as_str().trim(),
        };
    }

    let Some(open) = region.find('{') else {
        return BlobSearch::Missing;
    };
    match balanced_object(&region[open..]) {
        Some(json) => BlobSearch::Found {
            start: from + open,
            json,
        },
        None => BlobSearch::Unterminated { start: from + open },
    }
}

/// The shortest prefix of `s` (which starts with `{`) that closes the
/// object, honouring JSON string escapes.
fn balanced_object(s: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn is_final_answer(action: &str) -> bool {
    let action = action.trim();
    action.eq_ignore_ascii_case(FINAL_ANSWER_ACTION) || action.eq_ignore_ascii_case("final_answer")
}

/// Turn a decoded blob into a decision.
fn decide(thought: String, text: &str, blob: Value, registry: &ToolRegistry) -> ParsedAction {
    let Value::Object(mut blob) = blob else {
        return malformed(thought, text, "the action blob must be a single JSON object");
    };

    let action = match blob.get("action") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
        Some(_) => return malformed(thought, text, "\"action\" must be a non-empty string"),
        None => return malformed(thought, text, "the action blob has no \"action\" key"),
    };
    let input = blob.remove("action_input").unwrap_or(Value::Null);

    if is_final_answer(&action) {
        return ParsedAction {
            thought,
            decision: ActionDecision::FinalAnswer {
                text: answer_text(input),
            },
        };
    }

    tool_call(thought, text, action, input, registry)
}

fn answer_text(input: Value) -> String {
    match input {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn tool_call(
    thought: String,
    text: &str,
    tool_name: String,
    input: Value,
    registry: &ToolRegistry,
) -> ParsedAction {
    let schema = registry.lookup(&tool_name).ok().map(|tool| tool.parameters());

    let raw_arguments = match input {
        Value::Object(map) => map,
        Value::Null => Arguments::new(),
        // Some models double-encode the input object as a string.
        Value::String(s) if s.trim_start().starts_with('{') => {
            match serde_json::from_str::<Value>(&s) {
                Ok(Value::Object(map)) => map,
                _ => bind_scalar(schema.as_ref(), Value::String(s)),
            }
        }
        scalar => bind_scalar(schema.as_ref(), scalar),
    };

    let arguments = match &schema {
        Some(schema) => match schema.coerce(&tool_name, &raw_arguments) {
            Ok(arguments) => arguments,
            Err(e) => return malformed(thought, text, &e.to_string()),
        },
        // Unknown tools are reported by the dispatcher with the valid names.
        None => raw_arguments,
    };

    ParsedAction {
        thought,
        decision: ActionDecision::ToolCall {
            tool_name,
            arguments,
        },
    }
}

fn bind_scalar(schema: Option<&toolloop_core::tool::ParameterSchema>, value: Value) -> Arguments {
    let name = schema
        .and_then(|s| s.first())
        .map(|p| p.name.clone())
        .unwrap_or_else(|| FALLBACK_PARAMETER.to_string());
    let mut arguments = Arguments::new();
    arguments.insert(name, value);
    arguments
}

/// Blob-less fallbacks: `Final Answer:` or `Action:` + `Action Input:` lines.
fn parse_classic(text: &str, action_start: Option<usize>, registry: &ToolRegistry) -> ParsedAction {
    if let Some(answer) = final_answer_line(text) {
        return answer;
    }

    if let Some(caps) = find(CLASSIC_ACTION, text)
        && let (Some(whole), Some(name)) = (caps.get(0), caps.get(1))
    {
        let thought = thought_before(text, whole.start());
        let name = name.as_str().trim().trim_matches(['`', '"', '\'']).to_string();
        let input = find(CLASSIC_ACTION_INPUT, text)
            .and_then(|c| c.get(1))
            .map(|m| classic_input(m.as_str()))
            .unwrap_or(Value::Null);

        if is_final_answer(&name) {
            return ParsedAction {
                thought,
                decision: ActionDecision::FinalAnswer {
                    text: answer_text(input),
                },
            };
        }
        return tool_call(thought, text, name, input, registry);
    }

    match action_start {
        Some(start) => malformed(
            thought_before(text, start),
            text,
            "no JSON action blob found after 'Action:'",
        ),
        // Without any marker there is no telling reasoning from noise.
        None => malformed(String::new(), text, "no action or final answer found"),
    }
}

fn final_answer_line(text: &str) -> Option<ParsedAction> {
    let caps = find(FINAL_ANSWER_LINE, text)?;
    let (whole, answer) = (caps.get(0)?, caps.get(1)?);
    Some(ParsedAction {
        thought: thought_before(text, whole.start()),
        decision: ActionDecision::FinalAnswer {
            text: answer.as_str().trim().to_string(),
        },
    })
}

fn classic_input(raw: &str) -> Value {
    let raw = raw.trim();
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return value;
    }
    let unquoted = raw
        .strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .unwrap_or(raw);
    Value::String(unquoted.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{calculator_registry, ArgsTool};
    use serde_json::json;

    fn registry() -> ToolRegistry {
        calculator_registry()
    }

    fn tool_call_of(parsed: &ParsedAction) -> (&str, &Arguments) {
        match &parsed.decision {
            ActionDecision::ToolCall {
                tool_name,
                arguments,
            } => (tool_name.as_str(), arguments),
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    fn reason_of(parsed: &ParsedAction) -> &str {
        match &parsed.decision {
            ActionDecision::Malformed { reason, .. } => reason,
            other => panic!("expected malformed, got {other:?}"),
        }
    }

    #[test]
    fn fenced_tool_call() {
        let raw = "Thought: I should add the numbers\nAction:\n```json\n{\"action\": \"calculator\", \"action_input\": {\"expression\": \"2+2\"}}\n```";
        let parsed = parse(raw, &registry());
        assert_eq!(parsed.thought, "I should add the numbers");
        let (name, args) = tool_call_of(&parsed);
        assert_eq!(name, "calculator");
        assert_eq!(args["expression"], "2+2");
    }

    #[test]
    fn fenced_final_answer_is_case_insensitive() {
        let raw = "I know the answer\nAction:\n```\n{\"action\": \"final answer\", \"action_input\": \"4\"}\n```";
        let parsed = parse(raw, &registry());
        assert_eq!(parsed.thought, "I know the answer");
        assert_eq!(parsed.decision, ActionDecision::FinalAnswer { text: "4".into() });
    }

    #[test]
    fn structured_final_answer_renders_as_json() {
        let raw = "Action:\n```\n{\"action\": \"Final Answer\", \"action_input\": {\"price\": 12}}\n```";
        let parsed = parse(raw, &registry());
        assert_eq!(
            parsed.decision,
            ActionDecision::FinalAnswer {
                text: r#"{"price":12}"#.into()
            }
        );
    }

    #[test]
    fn bare_object_without_fence() {
        let raw = r#"Thought: compute {"action": "calculator", "action_input": "3 * 3"} and done"#;
        let parsed = parse(raw, &registry());
        let (name, args) = tool_call_of(&parsed);
        assert_eq!(name, "calculator");
        assert_eq!(args["expression"], "3 * 3");
        assert_eq!(parsed.thought, "compute");
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_the_scanner() {
        let raw = r#"Action: {"action": "calculator", "action_input": {"expression": "(1 + 2) } {"}}"#;
        let parsed = parse(raw, &registry());
        let (_, args) = tool_call_of(&parsed);
        assert_eq!(args["expression"], "(1 + 2) } {");
    }

    #[test]
    fn invented_observations_are_discarded() {
        let raw = "Thought: add\nAction:\n```\n{\"action\": \"calculator\", \"action_input\": \"2+2\"}\n```\nObservation: 4\nThought: done\nAction:\n```\n{\"action\": \"Final Answer\", \"action_input\": \"4\"}\n```";
        let parsed = parse(raw, &registry());
        let (name, _) = tool_call_of(&parsed);
        assert_eq!(name, "calculator");
    }

    #[test]
    fn scalar_input_for_unknown_tool_binds_to_input() {
        let raw = r#"Action: {"action": "translate", "action_input": "bonjour"}"#;
        let parsed = parse(raw, &registry());
        let (name, args) = tool_call_of(&parsed);
        assert_eq!(name, "translate");
        assert_eq!(args["input"], "bonjour");
    }

    #[test]
    fn null_input_gives_empty_arguments() {
        let raw = r#"Action: {"action": "calculator", "action_input": null}"#;
        let parsed = parse(raw, &registry());
        let (_, args) = tool_call_of(&parsed);
        assert!(args.is_empty());
    }

    #[test]
    fn double_encoded_input_is_decoded() {
        let raw = r#"Action: {"action": "calculator", "action_input": "{\"expression\": \"5-1\"}"}"#;
        let parsed = parse(raw, &registry());
        let (_, args) = tool_call_of(&parsed);
        assert_eq!(args["expression"], "5-1");
    }

    #[test]
    fn arguments_are_coerced_to_declared_kinds() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(ArgsTool)).unwrap();
        let raw = r#"Action: {"action": "repeat", "action_input": {"text": 7, "times": "3", "loud": "true"}}"#;
        let parsed = parse(raw, &registry);
        let (_, args) = tool_call_of(&parsed);
        assert_eq!(args["text"], json!("7"));
        assert_eq!(args["times"], json!(3));
        assert_eq!(args["loud"], json!(true));
    }

    #[test]
    fn coercion_failure_is_malformed() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(ArgsTool)).unwrap();
        let raw = r#"Action: {"action": "repeat", "action_input": {"text": "a", "times": "many"}}"#;
        let parsed = parse(raw, &registry);
        assert!(reason_of(&parsed).contains("times"));
    }

    #[test]
    fn classic_final_answer_line() {
        let parsed = parse("Thought: easy\nFinal Answer: 42", &registry());
        assert_eq!(parsed.thought, "easy");
        assert_eq!(parsed.decision, ActionDecision::FinalAnswer { text: "42".into() });
    }

    #[test]
    fn final_answer_line_may_contain_json() {
        let raw = "Thought: I have the quote\nFinal Answer: {\"symbol\": \"IBM\", \"price\": \"166.45\"}";
        let parsed = parse(raw, &registry());
        assert_eq!(parsed.thought, "I have the quote");
        assert_eq!(
            parsed.decision,
            ActionDecision::FinalAnswer {
                text: r#"{"symbol": "IBM", "price": "166.45"}"#.into()
            }
        );
    }

    #[test]
    fn final_answer_line_may_contain_braces() {
        let parsed = parse("Thought: done\nFinal Answer: The solution set is {1, 2}.", &registry());
        assert_eq!(parsed.thought, "done");
        assert_eq!(
            parsed.decision,
            ActionDecision::FinalAnswer {
                text: "The solution set is {1, 2}.".into()
            }
        );
    }

    #[test]
    fn action_marker_still_wins_over_final_answer_text() {
        let raw = "Thought: check first\nFinal Answer: not yet\nAction:\n```\n{\"action\": \"calculator\", \"action_input\": \"1+1\"}\n```";
        let parsed = parse(raw, &registry());
        let (name, _) = tool_call_of(&parsed);
        assert_eq!(name, "calculator");
    }

    #[test]
    fn classic_action_lines() {
        let raw = "Thought: need math\nAction: calculator\nAction Input: 6 * 7";
        let parsed = parse(raw, &registry());
        assert_eq!(parsed.thought, "need math");
        let (name, args) = tool_call_of(&parsed);
        assert_eq!(name, "calculator");
        assert_eq!(args["expression"], "6 * 7");
    }

    #[test]
    fn classic_action_with_json_input() {
        let raw = "Action: calculator\nAction Input: {\"expression\": \"1+1\"}";
        let parsed = parse(raw, &registry());
        let (_, args) = tool_call_of(&parsed);
        assert_eq!(args["expression"], "1+1");
    }

    #[test]
    fn malformed_cases() {
        let registry = registry();
        assert!(reason_of(&parse("", &registry)).contains("empty"));
        assert!(reason_of(&parse("I think the answer is four.", &registry)).contains("no action"));
        assert!(reason_of(&parse("Action:\n", &registry)).contains("no JSON action blob"));
        assert!(reason_of(&parse("Action: {\"action\": \"calc", &registry)).contains("not closed"));
        assert!(reason_of(&parse("Action:\n```\n{\"action\": }\n```", &registry)).contains("not valid JSON"));
        assert!(reason_of(&parse("Action: {\"action_input\": 1}", &registry)).contains("no \"action\""));
        assert!(reason_of(&parse("Action: {\"action\": 5}", &registry)).contains("non-empty string"));
        assert!(reason_of(&parse("Action:\n```\n[1, 2]\n```", &registry)).contains("single JSON object"));
    }

    #[test]
    fn malformed_keeps_truncated_raw_text() {
        let parsed = parse("rambling\nObservation: fake", &registry());
        match parsed.decision {
            ActionDecision::Malformed { raw_text, .. } => assert_eq!(raw_text, "rambling"),
            other => panic!("expected malformed, got {other:?}"),
        }
    }

    #[test]
    fn never_panics_on_odd_input() {
        let registry = registry();
        for raw in [
            "{",
            "}",
            "```",
            "```json\n",
            "Action: ```{```",
            "\u{1F600} Action: {\"action\": \"\u{1F600}\"}",
            "Observation:",
            "Final Answer:",
            "{\"action\": \"calculator\", \"action_input\": \"\\\"}",
        ] {
            let _ = parse(raw, &registry);
        }
    }
}
