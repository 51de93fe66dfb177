//! Model client trait: the abstraction over language model backends.
//!
//! The agent loop only ever needs one thing from a model: turn a prompt
//! into text. Implementations: Gemini, OpenAI-compatible endpoints.

use async_trait::async_trait;

use crate::error::TransportError;

/// The core ModelClient trait.
///
/// The dispatcher calls `generate()` without knowing which backend is
/// being used. Timeouts and retries are applied by the caller.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// A human-readable name for this backend (e.g., "gemini", "openrouter").
    fn name(&self) -> &str;

    /// Send a prompt and get the raw completion text.
    async fn generate(&self, prompt: &str) -> Result<String, TransportError>;

    /// Health check: can we reach the backend?
    async fn health_check(&self) -> Result<bool, TransportError> {
        Ok(true)
    }
}
