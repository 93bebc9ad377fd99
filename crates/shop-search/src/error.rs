use search_common::error::AiError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("extraction error: {0}")]
    Extraction(#[from] regex::Error),

    #[error(transparent)]
    Ai(#[from] AiError),
}
