use crate::cancel::CancelHandle;
use crate::error::BuildError;
use citegraph_core::config::ExpansionConfig;
use citegraph_core::metrics::MetricsCollector;
use citegraph_core::model::{CacheRecord, EdgeKind, Identifier, PaperFilter};
use citegraph_core::CitationGraph;
use fetcher::{FetchError, MetadataFetcher};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use storage::{LocalStore, StoreError, StoreMutation};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuilderConfig {
    /// Maximum neighbors admitted per node and per kind, in source order.
    pub fan_out_cap: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self { fan_out_cap: 15 }
    }
}

impl From<&ExpansionConfig> for BuilderConfig {
    fn from(config: &ExpansionConfig) -> Self {
        Self {
            fan_out_cap: config.fan_out_cap,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    NotFound,
    RateLimited,
    Transient,
    MalformedResponse,
}

impl From<&FetchError> for UnresolvedReason {
    fn from(err: &FetchError) -> Self {
        match err {
            FetchError::NotFound(_) => UnresolvedReason::NotFound,
            FetchError::RateLimited => UnresolvedReason::RateLimited,
            FetchError::Transient(_) => UnresolvedReason::Transient,
            FetchError::MalformedResponse(_) => UnresolvedReason::MalformedResponse,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedNode {
    pub identifier: Identifier,
    pub reason: UnresolvedReason,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionStats {
    pub cache_hits: usize,
    pub fetches: usize,
    pub levels_completed: usize,
}

#[derive(Debug, Clone)]
pub struct Expansion {
    pub graph: CitationGraph,
    /// Requested nodes that could not be resolved, in the order they were attempted.
    pub unresolved: Vec<UnresolvedNode>,
    pub stats: ExpansionStats,
    /// True when the expansion stopped early at a level boundary.
    pub cancelled: bool,
}

impl Expansion {
    pub fn unresolved_ids(&self) -> Vec<&Identifier> {
        self.unresolved.iter().map(|node| &node.identifier).collect()
    }
}

enum ResolveError {
    Fetch(FetchError),
    Store(StoreError),
}

/// Breadth-first, depth-bounded expansion over the local store, falling back
/// to the fetcher on cache misses.
pub struct GraphBuilder {
    store: Arc<LocalStore>,
    fetcher: Arc<dyn MetadataFetcher>,
    config: BuilderConfig,
    metrics: MetricsCollector,
}

impl GraphBuilder {
    pub fn new(
        store: Arc<LocalStore>,
        fetcher: Arc<dyn MetadataFetcher>,
        config: BuilderConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            config,
            metrics: MetricsCollector::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn config(&self) -> BuilderConfig {
        self.config
    }

    pub async fn expand(
        &self,
        seed: &Identifier,
        max_depth: usize,
        filters: PaperFilter,
    ) -> Result<Expansion, BuildError> {
        self.expand_with_cancel(seed, max_depth, filters, &CancelHandle::new())
            .await
    }

    /// Like [`GraphBuilder::expand`], stopping at the next level boundary once
    /// `cancel` is set. The seed level always runs.
    pub async fn expand_with_cancel(
        &self,
        seed: &Identifier,
        max_depth: usize,
        filters: PaperFilter,
        cancel: &CancelHandle,
    ) -> Result<Expansion, BuildError> {
        let started = Instant::now();
        let mut stats = ExpansionStats::default();
        let mut unresolved = Vec::new();
        let mut cancelled = false;

        let root = match self.resolve(seed, &mut stats).await {
            Ok(record) => record,
            Err(ResolveError::Store(err)) => return Err(err.into()),
            Err(ResolveError::Fetch(err)) => {
                warn!(identifier = %seed, error = %err, "seed could not be resolved");
                return Err(BuildError::SeedNotFound {
                    identifier: seed.clone(),
                    source: err,
                });
            }
        };
        stats.levels_completed = 1;

        let mut graph = CitationGraph::new(root.paper.clone());
        let mut visited: HashSet<Identifier> = HashSet::from([seed.clone()]);
        let mut frontier = next_frontier(&[&root], &visited, self.config.fan_out_cap);
        let mut resolved: HashMap<Identifier, CacheRecord> =
            HashMap::from([(seed.clone(), root)]);
        let mut depth = 1;

        while !frontier.is_empty() && depth <= max_depth {
            if cancel.is_cancelled() {
                info!(identifier = %seed, depth, "expansion cancelled");
                cancelled = true;
                break;
            }
            debug!(depth, frontier = frontier.len(), "expanding level");

            let mut level = Vec::with_capacity(frontier.len());
            for id in frontier {
                if !visited.insert(id.clone()) {
                    continue;
                }
                match self.resolve(&id, &mut stats).await {
                    Ok(record) => {
                        graph.add_node(record.paper.clone());
                        level.push(id.clone());
                        resolved.insert(id, record);
                    }
                    Err(ResolveError::Store(err)) => return Err(err.into()),
                    Err(ResolveError::Fetch(err)) => {
                        warn!(identifier = %id, depth, error = %err, "node unresolved");
                        unresolved.push(UnresolvedNode {
                            identifier: id,
                            reason: UnresolvedReason::from(&err),
                        });
                    }
                }
            }

            stats.levels_completed += 1;
            frontier = if depth < max_depth {
                let records: Vec<&CacheRecord> =
                    level.iter().filter_map(|id| resolved.get(id)).collect();
                next_frontier(&records, &visited, self.config.fan_out_cap)
            } else {
                Vec::new()
            };
            depth += 1;
        }

        // Edges from the full neighbor lists, kept only where both ends made it in.
        for record in resolved.values() {
            for edge in record.edges() {
                graph.add_edge(&edge.citing, &edge.cited);
            }
        }

        if !filters.is_empty() {
            let rejected: Vec<Identifier> = graph
                .papers()
                .filter(|paper| paper.identifier != *seed && !filters.matches(paper))
                .map(|paper| paper.identifier.clone())
                .collect();
            for id in &rejected {
                graph.remove_node(id);
            }
            debug!(removed = rejected.len(), "applied node filters");
        }

        self.metrics.record_expansion(unresolved.len());
        info!(
            identifier = %seed,
            max_depth,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            unresolved = unresolved.len(),
            cache_hits = stats.cache_hits,
            fetches = stats.fetches,
            cancelled,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "expansion finished"
        );

        Ok(Expansion {
            graph,
            unresolved,
            stats,
            cancelled,
        })
    }

    /// Cache first; only fully expanded records count as hits. A fetched
    /// record is persisted before it is returned.
    async fn resolve(
        &self,
        id: &Identifier,
        stats: &mut ExpansionStats,
    ) -> Result<CacheRecord, ResolveError> {
        if let Some(record) = self.store.lookup(id).await {
            if record.fully_expanded {
                debug!(identifier = %id, "cache hit");
                stats.cache_hits += 1;
                self.metrics.record_cache_hit();
                return Ok(record);
            }
            debug!(identifier = %id, "cached summary only, refetching");
        }

        self.fetch_and_store(id, stats).await
    }

    /// Fetches `id` regardless of what is cached and overwrites its record.
    pub async fn refresh(&self, id: &Identifier) -> Result<CacheRecord, BuildError> {
        let mut stats = ExpansionStats::default();
        match self.fetch_and_store(id, &mut stats).await {
            Ok(record) => {
                info!(identifier = %id, "record refreshed");
                Ok(record)
            }
            Err(ResolveError::Fetch(err)) => Err(BuildError::Fetch(err)),
            Err(ResolveError::Store(err)) => Err(err.into()),
        }
    }

    async fn fetch_and_store(
        &self,
        id: &Identifier,
        stats: &mut ExpansionStats,
    ) -> Result<CacheRecord, ResolveError> {
        stats.fetches += 1;
        let started = Instant::now();
        let result = self.fetcher.fetch(id).await;
        self.metrics
            .record_fetch(started.elapsed().as_millis() as u64, result.is_ok());
        let work = result.map_err(ResolveError::Fetch)?;

        let mut paper = work.paper;
        paper.identifier = id.clone();
        let mut record = CacheRecord::expanded(paper, work.reference_ids, work.citation_ids);
        if !work.citations_complete {
            // Stays a cache miss until a fetch returns the full citing list.
            debug!(identifier = %id, "citing list incomplete");
            record.fully_expanded = false;
        }

        let mut batch = vec![
            StoreMutation::Upsert(record.clone()),
            StoreMutation::Edges(record.edges()),
        ];
        batch.extend(
            work.reference_summaries
                .into_iter()
                .filter(|summary| summary.identifier != *id)
                .map(|summary| StoreMutation::InsertIfAbsent(CacheRecord::summary(summary))),
        );
        self.store.commit(batch).await.map_err(ResolveError::Store)?;

        Ok(record)
    }
}

/// Capped references then capped citations of each record, unvisited and deduplicated.
fn next_frontier(
    records: &[&CacheRecord],
    visited: &HashSet<Identifier>,
    fan_out_cap: usize,
) -> Vec<Identifier> {
    let mut seen = HashSet::new();
    let mut next = Vec::new();
    for record in records {
        for kind in [EdgeKind::Reference, EdgeKind::Citation] {
            for neighbor in record.neighbors(kind).iter().take(fan_out_cap) {
                if !visited.contains(neighbor) && seen.insert(neighbor.clone()) {
                    next.push(neighbor.clone());
                }
            }
        }
    }
    next
}
