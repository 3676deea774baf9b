pub mod centrality;
pub mod community;
mod indexed;
pub mod relevance;
pub mod structure;
pub mod temporal;

pub use centrality::{centrality, CentralityKind, PageRankParams, Scores};
pub use community::{communities, community_groups, modularity, CommunityId};
pub use relevance::{rank_by_relevance, RankedPaper, DEFAULT_RELEVANCE_LIMIT};
pub use structure::{
    clustering_coefficient, connected_components, density, diameter, statistics,
    GraphStatistics,
};
pub use temporal::{year_histogram, YearHistogram};

use citegraph_core::config::AnalyticsConfig;
use citegraph_core::model::Identifier;
use citegraph_core::CitationGraph;
use indexed::IndexedGraph;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use tracing::info;

/// Everything [`Analytics::report`] computes, in one serializable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub statistics: GraphStatistics,
    pub pagerank: Scores,
    pub betweenness: Scores,
    pub in_degree: Scores,
    pub out_degree: Scores,
    pub communities: BTreeMap<Identifier, CommunityId>,
    pub community_count: usize,
    pub modularity: f64,
    pub year_histogram: YearHistogram,
}

/// Read-only metrics over one built graph. The dense index is built once and
/// shared by every metric.
pub struct Analytics<'a> {
    graph: &'a CitationGraph,
    indexed: IndexedGraph<'a>,
    config: AnalyticsConfig,
}

impl<'a> Analytics<'a> {
    pub fn new(graph: &'a CitationGraph) -> Self {
        Self::with_config(graph, AnalyticsConfig::default())
    }

    pub fn with_config(graph: &'a CitationGraph, config: AnalyticsConfig) -> Self {
        Self {
            graph,
            indexed: IndexedGraph::new(graph),
            config,
        }
    }

    pub fn graph(&self) -> &CitationGraph {
        self.graph
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn density(&self) -> f64 {
        structure::density(self.graph)
    }

    pub fn diameter(&self) -> Option<usize> {
        structure::diameter_of(&self.indexed)
    }

    pub fn clustering_coefficient(&self) -> f64 {
        structure::clustering_of(&self.indexed)
    }

    pub fn connected_components(&self) -> Vec<BTreeSet<Identifier>> {
        structure::components_of(&self.indexed)
    }

    pub fn centrality(&self, kind: CentralityKind) -> Scores {
        centrality::scores_of(&self.indexed, kind, PageRankParams::from(&self.config))
    }

    /// Community per node, using the configured seed.
    pub fn communities(&self) -> BTreeMap<Identifier, CommunityId> {
        community::communities_of(&self.indexed, self.config.community_seed)
    }

    pub fn community_groups(&self) -> BTreeMap<CommunityId, Vec<Identifier>> {
        community::community_groups(&self.communities())
    }

    pub fn year_histogram(&self) -> YearHistogram {
        temporal::year_histogram(self.graph)
    }

    pub fn statistics(&self) -> GraphStatistics {
        GraphStatistics {
            node_count: self.graph.node_count(),
            edge_count: self.graph.edge_count(),
            density: self.density(),
            diameter: self.diameter(),
            average_clustering: self.clustering_coefficient(),
            component_count: self.indexed.components().len(),
        }
    }

    /// Ranks every paper in the graph; see [`relevance::rank_by_relevance`].
    pub fn rank_by_relevance(
        &self,
        keywords: &[String],
        reference_year: i32,
        limit: usize,
    ) -> Vec<RankedPaper> {
        relevance::rank_by_relevance(self.graph.papers(), keywords, reference_year, limit)
    }

    pub fn report(&self) -> AnalysisReport {
        let started = Instant::now();
        let communities = self.communities();
        let community_count = communities.values().collect::<BTreeSet<_>>().len();
        let modularity = community::modularity(self.graph, &communities);

        let report = AnalysisReport {
            statistics: self.statistics(),
            pagerank: self.centrality(CentralityKind::PageRank),
            betweenness: self.centrality(CentralityKind::Betweenness),
            in_degree: self.centrality(CentralityKind::InDegree),
            out_degree: self.centrality(CentralityKind::OutDegree),
            communities,
            community_count,
            modularity,
            year_histogram: self.year_histogram(),
        };

        info!(
            nodes = report.statistics.node_count,
            edges = report.statistics.edge_count,
            communities = community_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "analysis finished"
        );
        report
    }
}
