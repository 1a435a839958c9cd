// ABOUTME: Errors from talking to the VM agent over the message bus.
// ABOUTME: Agent-side exceptions keep the agent's message.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Invalid mbus URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("Invalid CA certificate: {0}")]
    InvalidCertificate(#[source] reqwest::Error),

    #[error("Building HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Sending '{method}' to the agent: {source}")]
    Http {
        method: String,
        source: reqwest::Error,
    },

    #[error("Agent responded to '{method}' with status {status}")]
    Status {
        method: String,
        status: reqwest::StatusCode,
    },

    #[error("Agent responded with error: {message}")]
    Exception { method: String, message: String },

    #[error("Unexpected response to '{method}': {response}")]
    UnexpectedResponse { method: String, response: String },
}
