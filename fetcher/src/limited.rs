use crate::budget::RateBudget;
use crate::error::FetchError;
use crate::source::{FetchedWork, MetadataFetcher};
use async_trait::async_trait;
use citegraph_core::config::RateLimitPolicy;
use citegraph_core::model::Identifier;
use std::sync::Arc;
use tracing::warn;

/// Consults a shared [`RateBudget`] before every call to the inner fetcher.
pub struct RateLimitedFetcher<F> {
    inner: F,
    budget: Arc<dyn RateBudget>,
    policy: RateLimitPolicy,
}

impl<F: MetadataFetcher> RateLimitedFetcher<F> {
    pub fn new(inner: F, budget: Arc<dyn RateBudget>, policy: RateLimitPolicy) -> Self {
        Self {
            inner,
            budget,
            policy,
        }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

#[async_trait]
impl<F: MetadataFetcher> MetadataFetcher for RateLimitedFetcher<F> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn fetch(&self, id: &Identifier) -> Result<FetchedWork, FetchError> {
        let granted = match self.policy {
            RateLimitPolicy::FailFast => self.budget.try_acquire(),
            RateLimitPolicy::Wait => self.budget.acquire().await,
        };
        if !granted {
            warn!(identifier = %id, policy = ?self.policy, "rate budget exhausted");
            return Err(FetchError::RateLimited);
        }
        self.inner.fetch(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::FixedBudget;
    use crate::mock::MockFetcher;
    use citegraph_core::model::Paper;

    fn id(raw: &str) -> Identifier {
        Identifier::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn denies_without_calling_inner_once_budget_is_spent() {
        let mock = Arc::new(MockFetcher::new());
        mock.insert(FetchedWork::new(Paper::new(id("10.1/a"))));
        let budget = Arc::new(FixedBudget::new(1));
        let fetcher = RateLimitedFetcher::new(mock.clone(), budget, RateLimitPolicy::FailFast);

        assert!(fetcher.fetch(&id("10.1/a")).await.is_ok());
        assert_eq!(fetcher.fetch(&id("10.1/a")).await, Err(FetchError::RateLimited));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn wait_policy_with_unreplenishable_budget_fails() {
        let mock = Arc::new(MockFetcher::new());
        let fetcher = RateLimitedFetcher::new(
            mock.clone(),
            Arc::new(FixedBudget::exhausted()),
            RateLimitPolicy::Wait,
        );
        assert_eq!(fetcher.fetch(&id("10.1/a")).await, Err(FetchError::RateLimited));
        assert_eq!(mock.call_count(), 0);
    }
}
