use builder::BuildError;
use citegraph_core::config::ConfigError;
use citegraph_core::error::{CitegraphError, ErrorCode};
use fetcher::{ClientError, FetchError};
use storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("build error: {0}")]
    Build(#[from] BuildError),
    #[error("export error: {0}")]
    Export(#[from] serde_json::Error),
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),
    #[error("http client error: {0}")]
    Client(#[from] ClientError),
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),
}

impl CitegraphError for SdkError {
    fn error_code(&self) -> ErrorCode {
        match self {
            SdkError::Config(_) => ErrorCode::InvalidArgument,
            SdkError::Store(err) => err.error_code(),
            SdkError::Build(err) => err.error_code(),
            SdkError::Export(_) => ErrorCode::Internal,
            SdkError::Fetch(err) => err.error_code(),
            SdkError::Client(ClientError::Endpoint { .. }) => ErrorCode::InvalidArgument,
            SdkError::Client(ClientError::Http(_)) => ErrorCode::Internal,
            SdkError::InvalidIdentifier(_) => ErrorCode::InvalidArgument,
        }
    }
}
