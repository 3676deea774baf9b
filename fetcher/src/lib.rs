pub mod budget;
pub mod crossref;
pub mod error;
pub mod limited;
pub mod mock;
pub mod retry;
pub mod source;

pub use budget::{FixedBudget, GovernorBudget, RateBudget};
pub use crossref::{ClientError, CrossrefFetcher};
pub use error::FetchError;
pub use limited::RateLimitedFetcher;
pub use mock::MockFetcher;
pub use retry::{RetryPolicy, RetryingFetcher};
pub use source::{FetchedWork, MetadataFetcher};
