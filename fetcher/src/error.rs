use citegraph_core::error::{CitegraphError, ErrorCode};
use citegraph_core::model::Identifier;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("identifier not resolvable: {0}")]
    NotFound(Identifier),
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl FetchError {
    /// Only transient failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

impl CitegraphError for FetchError {
    fn error_code(&self) -> ErrorCode {
        match self {
            FetchError::NotFound(_) => ErrorCode::NotFound,
            FetchError::RateLimited => ErrorCode::ResourceExhausted,
            FetchError::Transient(_) => ErrorCode::Unavailable,
            FetchError::MalformedResponse(_) => ErrorCode::Internal,
        }
    }
}
