//! Language model clients for toolloop.
//!
//! All clients implement the `toolloop_core::ModelClient` trait.
//! The router builds the configured client from `[model]` settings.

pub mod gemini;
pub mod openai_compat;
pub mod router;

pub use gemini::GeminiClient;
pub use openai_compat::OpenAiCompatClient;
pub use router::build_from_config;

use toolloop_core::TransportError;

/// Stop sequence sent to every backend: the model must never write its own
/// observations.
pub(crate) const OBSERVATION_STOP: &str = "\nObservation:";

/// Map a non-success HTTP status to a transport error.
pub(crate) fn status_error(status: u16, body: String) -> TransportError {
    match status {
        429 => TransportError::RateLimited {
            retry_after_secs: 5,
        },
        401 | 403 => TransportError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ),
        _ => TransportError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

/// Map a reqwest send/read failure to a transport error.
pub(crate) fn request_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else {
        TransportError::Network(e.to_string())
    }
}
