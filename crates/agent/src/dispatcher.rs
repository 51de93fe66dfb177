//! The dispatcher: drives one run through Thought → Action → Observation
//! iterations until the model gives a final answer, the iteration budget is
//! spent, the model backend gives up, or the caller cancels.
//!
//! Each iteration renders the prompt from the run so far, asks the model
//! for a completion (bounded by the model timeout, with retries), parses it
//! and appends exactly one step to the scratchpad. Tool failures, unknown
//! tools and unparseable completions become observations the model can
//! react to; only transport exhaustion and cancellation end a run early.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use toolloop_core::action::{ActionDecision, Arguments};
use toolloop_core::agent::AgentConfig;
use toolloop_core::error::{RunError, ToolError, TransportError};
use toolloop_core::model::ModelClient;
use toolloop_core::run::{Run, RunId, RunStatus, Step};
use toolloop_core::tool::ToolRegistry;

use crate::parser;
use crate::prompt;
use crate::stream_event::AgentEvent;

/// Buffered events per streamed run.
const EVENT_BUFFER: usize = 128;

/// Observation fed back after a completion that could not be parsed.
pub fn corrective_observation(reason: &str) -> String {
    format!(
        "Invalid or incomplete response: {reason}. Respond with a single json blob \
         inside ``` fences after 'Action:', using an \"action\" key (a tool name or \
         \"Final Answer\") and an \"action_input\" key."
    )
}

/// The result of a run together with its full trace.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run: Run,
    pub outcome: Result<String, RunError>,
}

impl RunReport {
    pub fn status(&self) -> RunStatus {
        self.run.status
    }
}

/// Drives runs against a model client and a tool registry.
///
/// Cheap to clone; every clone shares the same model client and registry.
#[derive(Clone)]
pub struct Dispatcher {
    model: Arc<dyn ModelClient>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Dispatcher {
    pub fn new(model: Arc<dyn ModelClient>, tools: Arc<ToolRegistry>, config: AgentConfig) -> Self {
        Self {
            model,
            tools,
            config,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run `input` to completion and return only the answer.
    pub async fn submit(&self, input: &str) -> Result<String, RunError> {
        self.run(input, &CancellationToken::new()).await.outcome
    }

    /// Run `input` to completion, returning the answer and the trace.
    pub async fn run(&self, input: &str, cancel: &CancellationToken) -> RunReport {
        self.drive(input, cancel, None).await
    }

    /// Run `input` on a background task, streaming [`AgentEvent`]s.
    ///
    /// The last event is always `Finished`. Must be called from within a
    /// tokio runtime.
    pub fn run_stream(
        &self,
        input: impl Into<String>,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<AgentEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let dispatcher = self.clone();
        let input = input.into();

        tokio::spawn(async move {
            dispatcher.drive(&input, &cancel, Some(&tx)).await;
        });

        rx
    }

    async fn drive(
        &self,
        input: &str,
        cancel: &CancellationToken,
        events: Option<&mpsc::Sender<AgentEvent>>,
    ) -> RunReport {
        let mut run = Run::new(input);
        let descriptions = self.tools.describe_all();

        info!(
            run_id = %run.id,
            max_iterations = self.config.max_iterations,
            tools = descriptions.len(),
            "Run started"
        );
        emit(
            events,
            AgentEvent::Started {
                run_id: run.id.to_string(),
                input: run.input.clone(),
            },
        )
        .await;

        let outcome = loop {
            if run.scratchpad.len() >= self.config.max_iterations {
                warn!(
                    run_id = %run.id,
                    max_iterations = self.config.max_iterations,
                    "Iteration limit reached without a final answer"
                );
                break Err(RunError::IterationLimitExceeded {
                    max_iterations: self.config.max_iterations,
                });
            }
            if cancel.is_cancelled() {
                info!(run_id = %run.id, "Run cancelled");
                break Err(RunError::Cancelled);
            }

            let iteration = run.scratchpad.len() + 1;
            debug!(run_id = %run.id, iteration, "Iteration");

            let prompt = prompt::render(&run, &descriptions);
            let completion = match self
                .generate(&run.id, iteration, &prompt, cancel, events)
                .await
            {
                Ok(text) => text,
                Err(e) => break Err(e),
            };

            let parsed = parser::parse(&completion, &self.tools);
            if !parsed.thought.is_empty() {
                emit(
                    events,
                    AgentEvent::Thought {
                        iteration,
                        content: parsed.thought.clone(),
                    },
                )
                .await;
            }

            match parsed.decision {
                ActionDecision::FinalAnswer { text } => {
                    emit(events, AgentEvent::FinalAnswer { text: text.clone() }).await;
                    run.scratchpad.push(Step::new(
                        parsed.thought,
                        ActionDecision::FinalAnswer { text: text.clone() },
                        "",
                    ));
                    break Ok(text);
                }
                ActionDecision::ToolCall {
                    tool_name,
                    arguments,
                } => {
                    emit(
                        events,
                        AgentEvent::ToolCall {
                            iteration,
                            tool: tool_name.clone(),
                            arguments: arguments.clone(),
                        },
                    )
                    .await;
                    let observation = self
                        .observe_tool_call(&run.id, iteration, &tool_name, &arguments)
                        .await;
                    emit(
                        events,
                        AgentEvent::Observation {
                            iteration,
                            tool: tool_name.clone(),
                            content: observation.clone(),
                        },
                    )
                    .await;
                    run.scratchpad.push(Step::new(
                        parsed.thought,
                        ActionDecision::ToolCall {
                            tool_name,
                            arguments,
                        },
                        observation,
                    ));
                }
                ActionDecision::Malformed { raw_text, reason } => {
                    warn!(run_id = %run.id, iteration, %reason, "Malformed model output");
                    emit(
                        events,
                        AgentEvent::Malformed {
                            iteration,
                            reason: reason.clone(),
                        },
                    )
                    .await;
                    let observation = corrective_observation(&reason);
                    run.scratchpad.push(Step::new(
                        parsed.thought,
                        ActionDecision::Malformed { raw_text, reason },
                        observation,
                    ));
                }
            }
        };

        run.status = match &outcome {
            Ok(_) => RunStatus::Finished,
            Err(RunError::IterationLimitExceeded { .. }) => RunStatus::Exhausted,
            Err(_) => RunStatus::Failed,
        };

        info!(
            run_id = %run.id,
            status = %run.status,
            steps = run.scratchpad.len(),
            tool_calls = run.scratchpad.tool_calls(),
            "Run finished"
        );
        emit(
            events,
            AgentEvent::Finished {
                status: run.status,
                steps: run.scratchpad.len(),
                error: outcome.as_ref().err().map(|e| e.to_string()),
            },
        )
        .await;

        RunReport { run, outcome }
    }

    /// One model completion, bounded by the model timeout and retried with
    /// exponential backoff.
    async fn generate(
        &self,
        run_id: &RunId,
        iteration: usize,
        prompt: &str,
        cancel: &CancellationToken,
        events: Option<&mpsc::Sender<AgentEvent>>,
    ) -> Result<String, RunError> {
        let max_attempts = self.config.retry_count.max(1);
        let model_timeout = self.config.model_timeout();
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RunError::Cancelled),
                r = tokio::time::timeout(model_timeout, self.model.generate(prompt)) => r,
            };

            let error = match result {
                Ok(Ok(text)) => {
                    debug!(%run_id, iteration, attempt, chars = text.len(), "Model replied");
                    return Ok(text);
                }
                Ok(Err(e)) => e,
                Err(_) => TransportError::Timeout(format!(
                    "no response from {} within {}s",
                    self.model.name(),
                    model_timeout.as_secs()
                )),
            };

            if !error.is_retryable() || attempt >= max_attempts {
                warn!(%run_id, iteration, attempt, error = %error, "Model backend unavailable");
                return Err(RunError::UpstreamUnavailable {
                    attempts: attempt,
                    last_error: error,
                });
            }

            let delay = self.config.backoff_for(attempt);
            warn!(
                %run_id,
                iteration,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Model call failed, retrying"
            );
            emit(
                events,
                AgentEvent::ModelRetry {
                    iteration,
                    attempt,
                    delay_ms: delay.as_millis() as u64,
                    error: error.to_string(),
                },
            )
            .await;

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RunError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Look up, validate and invoke a tool; every failure becomes the
    /// observation text.
    async fn observe_tool_call(
        &self,
        run_id: &RunId,
        iteration: usize,
        tool_name: &str,
        arguments: &Arguments,
    ) -> String {
        let tool = match self.tools.lookup(tool_name) {
            Ok(tool) => tool,
            Err(e) => {
                warn!(%run_id, iteration, tool = tool_name, "Model requested an unknown tool");
                return format!(
                    "Error: {e}. Valid tools are: {}",
                    self.tools.names().join(", ")
                );
            }
        };

        let arguments = match tool.parameters().validate(tool_name, arguments) {
            Ok(arguments) => arguments,
            Err(e) => {
                warn!(%run_id, iteration, tool = tool_name, error = %e, "Invalid tool arguments");
                return format!("Error: {e}");
            }
        };

        let tool_timeout = self.config.tool_timeout();
        let started = std::time::Instant::now();
        let result = match tokio::time::timeout(tool_timeout, tool.invoke(&arguments)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout {
                tool_name: tool_name.to_string(),
                timeout_secs: tool_timeout.as_secs(),
            }),
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(output) => {
                debug!(%run_id, iteration, tool = tool_name, duration_ms, "Tool succeeded");
                output.to_string()
            }
            Err(e) => {
                warn!(%run_id, iteration, tool = tool_name, duration_ms, error = %e, "Tool failed");
                format!("Error: {e}")
            }
        }
    }
}

async fn emit(events: Option<&mpsc::Sender<AgentEvent>>, event: AgentEvent) {
    if let Some(tx) = events {
        // A dropped receiver only stops the live view, not the run.
        let _ = tx.send(event).await;
    }
}
