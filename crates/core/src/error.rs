//! Error types for the toolloop domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; only [`RunError`] is ever
//! shown to the end user. Configuration errors live in the config crate.

use thiserror::Error;

// --- Bounded context errors ---

/// Failures talking to the language model backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by model backend, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model client not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response from model backend: {0}")]
    InvalidResponse(String),
}

impl TransportError {
    /// Whether another attempt could succeed. Credential and configuration
    /// failures are final.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::AuthenticationFailed(_) | Self::NotConfigured(_)
        )
    }
}

/// Tool registration, lookup, validation and execution failures.
///
/// Inside a run every variant except `DuplicateTool` is recoverable: the
/// dispatcher renders it as an observation for the model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Invalid arguments for {tool_name}: {reason}")]
    InvalidArguments { tool_name: String, reason: String },

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Tool not configured: {tool_name}: {reason}")]
    NotConfigured { tool_name: String, reason: String },
}

/// Why a run ended without a final answer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunError {
    #[error("Model backend unavailable after {attempts} attempt(s): {last_error}")]
    UpstreamUnavailable {
        attempts: u32,
        last_error: TransportError,
    },

    #[error("Unable to complete the request within {max_iterations} iterations")]
    IterationLimitExceeded { max_iterations: usize },

    #[error("Run cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_displays_correctly() {
        let err = TransportError::ApiError {
            status_code: 503,
            message: "Service unavailable".into(),
        };
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("Service unavailable"));
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = ToolError::InvalidArguments {
            tool_name: "calculator".into(),
            reason: "missing required parameter 'expression'".into(),
        };
        assert!(err.to_string().contains("calculator"));
        assert!(err.to_string().contains("expression"));
    }

    #[test]
    fn auth_failures_are_not_retryable() {
        assert!(!TransportError::AuthenticationFailed("bad key".into()).is_retryable());
        assert!(!TransportError::NotConfigured("no key".into()).is_retryable());
        assert!(TransportError::Timeout("60s".into()).is_retryable());
        assert!(TransportError::Network("reset".into()).is_retryable());
    }

    #[test]
    fn exhausted_message_mentions_budget() {
        let err = RunError::IterationLimitExceeded { max_iterations: 10 };
        assert!(err.to_string().contains("Unable to complete"));
        assert!(err.to_string().contains("10"));
    }
}
