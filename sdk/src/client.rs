use crate::error::SdkError;
use analytics::{AnalysisReport, Analytics, RankedPaper};
use builder::{BuilderConfig, CancelHandle, Expansion, GraphBuilder};
use chrono::{Datelike, Utc};
use citegraph_core::config::{AppConfig, ConfigError};
use citegraph_core::metrics::{MetricsCollector, MetricsSnapshot};
use citegraph_core::model::{CacheRecord, EdgeKind, Identifier, Paper, PaperFilter};
use citegraph_core::CitationGraph;
use fetcher::{
    CrossrefFetcher, GovernorBudget, MetadataFetcher, RateBudget, RateLimitedFetcher,
    RetryPolicy, RetryingFetcher,
};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use storage::{LocalStore, StoreStats};
use tracing::info;

/// Entry point tying the store, the fetcher stack, the builder and analytics
/// together under one [`AppConfig`].
pub struct CiteGraph {
    config: AppConfig,
    store: Arc<LocalStore>,
    builder: GraphBuilder,
}

impl CiteGraph {
    /// Opens the store at `config.store.path` and wires the HTTP fetcher
    /// behind the configured rate budget and retry policy.
    pub async fn open(config: AppConfig) -> Result<Self, SdkError> {
        config.validate()?;

        let store = LocalStore::open(&config.store.path).await?;
        if config.store.compact_on_open {
            store.compact().await?;
        }

        let http = CrossrefFetcher::new(&config.fetcher)?;
        let requests = NonZeroU32::new(config.fetcher.requests_per_interval).ok_or_else(|| {
            ConfigError::Message("fetcher.requests_per_interval must be positive".into())
        })?;
        let budget: Arc<dyn RateBudget> = Arc::new(GovernorBudget::new(
            requests,
            Duration::from_millis(config.fetcher.interval_ms),
        ));
        let limited = RateLimitedFetcher::new(http, budget, config.fetcher.rate_limit_policy);
        let fetcher = RetryingFetcher::new(limited, RetryPolicy::from_config(&config.fetcher));

        info!(
            store = %config.store.path,
            endpoint = %config.fetcher.base_url,
            requests_per_interval = config.fetcher.requests_per_interval,
            interval_ms = config.fetcher.interval_ms,
            "citegraph opened"
        );
        Ok(Self::with_fetcher(config, Arc::new(store), Arc::new(fetcher)))
    }

    /// Uses an already opened store and any fetcher implementation.
    pub fn with_fetcher(
        config: AppConfig,
        store: Arc<LocalStore>,
        fetcher: Arc<dyn MetadataFetcher>,
    ) -> Self {
        let builder = GraphBuilder::new(
            store.clone(),
            fetcher,
            BuilderConfig::from(&config.expansion),
        );
        Self {
            config,
            store,
            builder,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    pub fn metrics(&self) -> &MetricsCollector {
        self.builder.metrics()
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.builder.metrics().snapshot()
    }

    /// Builds the citation graph around `seed`. `depth` defaults to
    /// `expansion.default_depth`.
    pub async fn expand(
        &self,
        seed: &str,
        depth: Option<usize>,
        filters: PaperFilter,
    ) -> Result<Expansion, SdkError> {
        self.expand_with_cancel(seed, depth, filters, &CancelHandle::new())
            .await
    }

    pub async fn expand_with_cancel(
        &self,
        seed: &str,
        depth: Option<usize>,
        filters: PaperFilter,
        cancel: &CancelHandle,
    ) -> Result<Expansion, SdkError> {
        let seed = parse_identifier(seed)?;
        let depth = depth.unwrap_or(self.config.expansion.default_depth);
        Ok(self
            .builder
            .expand_with_cancel(&seed, depth, filters, cancel)
            .await?)
    }

    /// Re-fetches one paper and overwrites its cached record.
    pub async fn refresh(&self, identifier: &str) -> Result<CacheRecord, SdkError> {
        let identifier = parse_identifier(identifier)?;
        Ok(self.builder.refresh(&identifier).await?)
    }

    pub fn analytics<'a>(&self, graph: &'a CitationGraph) -> Analytics<'a> {
        Analytics::with_config(graph, self.config.analytics.clone())
    }

    pub fn analyze(&self, graph: &CitationGraph) -> AnalysisReport {
        self.analytics(graph).report()
    }

    /// Ranks the papers of `graph` against the root's keywords, measuring age
    /// from the current year.
    pub fn most_relevant(&self, graph: &CitationGraph, limit: usize) -> Vec<RankedPaper> {
        let keywords = graph
            .paper(graph.root())
            .map(|root| root.keywords.clone())
            .unwrap_or_default();
        self.analytics(graph)
            .rank_by_relevance(&keywords, Utc::now().year(), limit)
    }

    pub async fn lookup(&self, identifier: &str) -> Result<Option<CacheRecord>, SdkError> {
        let identifier = parse_identifier(identifier)?;
        Ok(self.store.lookup(&identifier).await)
    }

    pub async fn neighbors(
        &self,
        identifier: &str,
        kind: EdgeKind,
    ) -> Result<Vec<Identifier>, SdkError> {
        let identifier = parse_identifier(identifier)?;
        Ok(self.store.query_neighbors(&identifier, kind).await)
    }

    /// Cached papers whose title, authors or keywords contain `query`.
    pub async fn search(&self, query: &str, limit: usize) -> Vec<Paper> {
        self.store.search(query, limit).await
    }

    /// Cached papers sharing references or citers with `identifier`, with the
    /// number of shared neighbors.
    pub async fn related(
        &self,
        identifier: &str,
        limit: usize,
    ) -> Result<Vec<(Identifier, usize)>, SdkError> {
        let identifier = parse_identifier(identifier)?;
        Ok(self.store.related(&identifier, limit).await)
    }

    pub async fn store_stats(&self) -> StoreStats {
        self.store.stats().await
    }

    /// Every cached paper matching `filter`, in identifier order.
    pub async fn papers(&self, filter: PaperFilter) -> Vec<Paper> {
        self.store.all_papers(filter).await.collect()
    }

    pub async fn compact(&self) -> Result<(), SdkError> {
        Ok(self.store.compact().await?)
    }
}

fn parse_identifier(raw: &str) -> Result<Identifier, SdkError> {
    Identifier::parse(raw).ok_or_else(|| SdkError::InvalidIdentifier(raw.to_string()))
}
