//! The agent loop of toolloop.
//!
//! A run follows a **Thought → Action → Observation** cycle:
//!
//! 1. **Render** the prompt: tools, format instructions, the question and
//!    every step so far
//! 2. **Ask the model** for a completion (timeout + retries)
//! 3. **Parse** the completion into a tool call, a final answer, or a
//!    malformed reply
//! 4. **Observe**: run the tool (or explain what was wrong) and append
//!    the step to the scratchpad, then loop back to step 1
//!
//! The loop ends on a final answer, after `max_iterations` steps, when the
//! model backend stays unavailable, or when the caller cancels.

pub mod dispatcher;
pub mod parser;
pub mod prompt;
pub mod stream_event;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use dispatcher::{Dispatcher, RunReport, corrective_observation};
pub use parser::parse;
pub use stream_event::AgentEvent;
pub use tokio_util::sync::CancellationToken;
