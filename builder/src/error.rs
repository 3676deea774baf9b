use citegraph_core::error::{CitegraphError, ErrorCode};
use citegraph_core::model::Identifier;
use fetcher::FetchError;
use storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("seed {identifier} could not be resolved: {source}")]
    SeedNotFound {
        identifier: Identifier,
        #[source]
        source: FetchError,
    },
    #[error("fetch failed: {0}")]
    Fetch(#[source] FetchError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl CitegraphError for BuildError {
    fn error_code(&self) -> ErrorCode {
        match self {
            BuildError::SeedNotFound { source, .. } => source.error_code(),
            BuildError::Fetch(err) => err.error_code(),
            BuildError::Store(err) => err.error_code(),
        }
    }
}
