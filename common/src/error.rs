use async_openai::error::OpenAIError;
use thiserror::Error;
use tokio::task::JoinError;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("LLM parsing error: {0}")]
    LLMParsing(String),
    #[error("No usable records in response: {0}")]
    ValidationEmpty(String),
    #[error("External call failed: {0}")]
    ExternalCall(String),
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    /// Whether the caller may reasonably retry the failed operation.
    ///
    /// Parsing and empty-validation failures are retryable because a fresh
    /// generation call can produce usable output. Configuration and not-found
    /// failures need operator action or a fallback instead.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::LLMParsing(_)
                | Self::ValidationEmpty(_)
                | Self::ExternalCall(_)
                | Self::OpenAI(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification_follows_taxonomy() {
        assert!(AppError::LLMParsing("bad json".into()).is_retryable());
        assert!(AppError::ValidationEmpty("no cards".into()).is_retryable());
        assert!(AppError::ExternalCall("timed out".into()).is_retryable());
        assert!(!AppError::Configuration("no api key".into()).is_retryable());
        assert!(!AppError::NotFound("doc-1".into()).is_retryable());
        assert!(!AppError::Validation("bad input".into()).is_retryable());
    }
}
