use crate::error::FetchError;
use async_trait::async_trait;
use citegraph_core::model::{Identifier, Paper};

/// One resolved lookup: the paper plus its relationship lists in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedWork {
    pub paper: Paper,
    pub reference_ids: Vec<Identifier>,
    pub citation_ids: Vec<Identifier>,
    /// Partial metadata for referenced works, taken from the reference entries.
    pub reference_summaries: Vec<Paper>,
    /// False when the citing list could not be retrieved and may be short.
    pub citations_complete: bool,
}

impl FetchedWork {
    pub fn new(paper: Paper) -> Self {
        Self {
            paper,
            reference_ids: Vec::new(),
            citation_ids: Vec::new(),
            reference_summaries: Vec::new(),
            citations_complete: true,
        }
    }
}

/// Resolves an identifier to metadata. Implementations perform I/O only and
/// never persist anything.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, id: &Identifier) -> Result<FetchedWork, FetchError>;
}

#[async_trait]
impl<T: MetadataFetcher + ?Sized> MetadataFetcher for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn fetch(&self, id: &Identifier) -> Result<FetchedWork, FetchError> {
        (**self).fetch(id).await
    }
}
