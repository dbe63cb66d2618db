//! Typed errors for SQL generation.

use thiserror::Error;

/// Errors that can occur while asking the LLM for a query.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// No provider credential was configured at startup.
    #[error("No LLM API key configured. Set OPENAI_API_KEY or ANTHROPIC_API_KEY")]
    MissingCredential,

    /// The HTTP request to the provider could not be completed.
    #[error("LLM request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("{provider} API error ({status}): {body}")]
    Provider {
        provider: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    /// The provider answered with a body we could not decode.
    #[error("Invalid response from {provider}: {message}")]
    Decode {
        provider: &'static str,
        message: String,
    },

    /// The provider answered without any completion text.
    #[error("No response from {0}")]
    EmptyResponse(&'static str),
}
