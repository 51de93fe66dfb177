//! `toolloop ask`: one-shot or interactive question answering.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use toolloop_agent::{AgentEvent, CancellationToken, Dispatcher};
use toolloop_config::AppConfig;

pub async fn run(
    config_path: Option<&Path>,
    message: Option<String>,
    trace: bool,
    max_iterations: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;

    if let Some(max) = max_iterations {
        if max == 0 {
            return Err("--max-iterations must be at least 1".into());
        }
        config.agent.max_iterations = max;
    }

    if config.model.needs_api_key() && !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No model API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    TOOLLOOP_API_KEY   (any provider)");
        eprintln!("    GOOGLE_API_KEY     (gemini)");
        eprintln!("    OPENAI_API_KEY     (openai)");
        eprintln!();
        eprintln!("  Or add api_key under [model] in:");
        eprintln!("    {}", super::config_path(config_path).display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let dispatcher = build_dispatcher(&config)?;

    if let Some(question) = message {
        match answer(&dispatcher, &question, trace).await {
            Ok(text) => println!("{text}"),
            Err(e) => return Err(e.into()),
        }
        return Ok(());
    }

    println!();
    println!("  toolloop: interactive mode");
    println!();
    println!("  Provider:  {}", config.model.provider);
    println!("  Model:     {}", config.model.model);
    println!("  Tools:     {}", dispatcher.tools().names().join(", "));
    println!();
    println!("  Type your question and press Enter.");
    println!("  Type 'exit' or press Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }

        match answer(&dispatcher, question, trace).await {
            Ok(text) => {
                println!();
                for line in text.lines() {
                    println!("  Agent > {line}");
                }
                println!();
            }
            Err(e) => {
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

pub fn build_dispatcher(config: &AppConfig) -> Result<Dispatcher, Box<dyn std::error::Error>> {
    let model = toolloop_providers::build_from_config(&config.model)?;
    let tools = toolloop_tools::default_registry(&config.tools)?;
    Ok(Dispatcher::new(model, Arc::new(tools), config.agent.clone()))
}

/// Run one question; Ctrl+C cancels it.
async fn answer(dispatcher: &Dispatcher, question: &str, trace: bool) -> Result<String, String> {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let outcome = if trace {
        traced(dispatcher, question, cancel).await
    } else {
        if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
            eprint!("  Thinking...");
        }
        let report = dispatcher.run(question, &cancel).await;
        if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
            eprint!("\r              \r");
        }
        report.outcome.map_err(|e| e.to_string())
    };

    watcher.abort();
    outcome
}

async fn traced(dispatcher: &Dispatcher, question: &str, cancel: CancellationToken) -> Result<String, String> {
    let mut events = dispatcher.run_stream(question, cancel);
    let mut final_answer = None;
    let mut failure = None;

    while let Some(event) = events.recv().await {
        if let Some(line) = format_event(&event) {
            eprintln!("{line}");
        }
        let terminal = event.is_terminal();
        match event {
            AgentEvent::FinalAnswer { text } => final_answer = Some(text),
            AgentEvent::Finished { error, .. } => failure = error,
            _ => {}
        }
        if terminal {
            break;
        }
    }

    match (final_answer, failure) {
        (Some(text), None) => Ok(text),
        (_, Some(error)) => Err(error),
        (None, None) => Err("run ended without an answer".into()),
    }
}

/// Trace line for an event, if it has one.
pub fn format_event(event: &AgentEvent) -> Option<String> {
    match event {
        AgentEvent::Thought { iteration, content } if !content.is_empty() => {
            Some(format!("  [{iteration}] Thought: {content}"))
        }
        AgentEvent::ToolCall {
            iteration,
            tool,
            arguments,
        } => Some(format!(
            "  [{iteration}] Action: {tool} {}",
            serde_json::Value::Object(arguments.clone())
        )),
        AgentEvent::Observation {
            iteration, content, ..
        } => Some(format!("  [{iteration}] Observation: {content}")),
        AgentEvent::Malformed { iteration, reason } => {
            Some(format!("  [{iteration}] Unparseable response: {reason}"))
        }
        AgentEvent::ModelRetry {
            attempt,
            delay_ms,
            error,
            ..
        } => Some(format!(
            "  Model call {attempt} failed ({error}); retrying in {delay_ms}ms"
        )),
        AgentEvent::Finished { status, steps, .. } => {
            Some(format!("  Run {status} after {steps} step(s)"))
        }
        _ => None,
    }
}
