pub use reqwest::StatusCode;

/// Errors raised at the generative-AI boundary.
///
/// Transport and upstream failures come from the concrete client; `Validation` is
/// raised when a structured reply does not fit the requested schema. Pipelines treat
/// every variant the same way for fallback purposes, so callers rarely need to match.
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream returned error: status={status} message={message}")]
    Upstream { status: StatusCode, message: String },

    #[error("upstream returned non-JSON error: status={status} body={body}")]
    UpstreamBody { status: StatusCode, body: String },

    #[error("response contained no candidate text")]
    EmptyResponse,

    #[error("response did not match schema {schema}: {message}")]
    Validation { schema: String, message: String },

    #[error("config error: {0}")]
    Config(String),
}
