use crate::indexed::IndexedGraph;
use citegraph_core::config::AnalyticsConfig;
use citegraph_core::model::Identifier;
use citegraph_core::CitationGraph;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CentralityKind {
    PageRank,
    Betweenness,
    InDegree,
    OutDegree,
}

impl CentralityKind {
    pub const ALL: [CentralityKind; 4] = [
        CentralityKind::PageRank,
        CentralityKind::Betweenness,
        CentralityKind::InDegree,
        CentralityKind::OutDegree,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRankParams {
    pub damping: f64,
    /// L1 change between iterations below which iteration stops.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for PageRankParams {
    fn default() -> Self {
        Self {
            damping: 0.85,
            tolerance: 1e-6,
            max_iterations: 100,
        }
    }
}

impl From<&AnalyticsConfig> for PageRankParams {
    fn from(config: &AnalyticsConfig) -> Self {
        Self {
            damping: config.pagerank_damping,
            tolerance: config.pagerank_tolerance,
            max_iterations: config.pagerank_max_iterations,
        }
    }
}

pub type Scores = BTreeMap<Identifier, f64>;

fn to_scores(indexed: &IndexedGraph<'_>, values: Vec<f64>) -> Scores {
    indexed
        .ids
        .iter()
        .zip(values)
        .map(|(id, value)| ((*id).clone(), value))
        .collect()
}

pub fn centrality(graph: &CitationGraph, kind: CentralityKind, params: PageRankParams) -> Scores {
    scores_of(&IndexedGraph::new(graph), kind, params)
}

pub(crate) fn scores_of(
    indexed: &IndexedGraph<'_>,
    kind: CentralityKind,
    params: PageRankParams,
) -> Scores {
    let values = match kind {
        CentralityKind::PageRank => pagerank_of(indexed, params),
        CentralityKind::Betweenness => betweenness_of(indexed),
        CentralityKind::InDegree => degree_of(indexed, &indexed.inc),
        CentralityKind::OutDegree => degree_of(indexed, &indexed.out),
    };
    to_scores(indexed, values)
}

/// Degree divided by `n - 1`; all zeros for graphs with fewer than two nodes.
fn degree_of(indexed: &IndexedGraph<'_>, side: &[Vec<usize>]) -> Vec<f64> {
    let n = indexed.len();
    if n <= 1 {
        return vec![0.0; n];
    }
    let scale = 1.0 / (n as f64 - 1.0);
    side.iter().map(|edges| edges.len() as f64 * scale).collect()
}

/// Power iteration. Rank held by nodes without out-links is spread evenly.
/// Stops once the L1 change drops below the tolerance; at the iteration
/// ceiling the last iterate is returned.
pub(crate) fn pagerank_of(indexed: &IndexedGraph<'_>, params: PageRankParams) -> Vec<f64> {
    let n = indexed.len();
    if n == 0 {
        return Vec::new();
    }

    let n_f64 = n as f64;
    let damping = params.damping;
    let base = (1.0 - damping) / n_f64;
    let mut rank = vec![1.0 / n_f64; n];

    for iteration in 0..params.max_iterations {
        let mut next = vec![base; n];
        let mut dangling_mass = 0.0;

        for (node, targets) in indexed.out.iter().enumerate() {
            if targets.is_empty() {
                dangling_mass += rank[node];
                continue;
            }
            let contribution = damping * rank[node] / targets.len() as f64;
            for &target in targets {
                next[target] += contribution;
            }
        }

        if dangling_mass > 0.0 {
            let distribute = damping * dangling_mass / n_f64;
            for value in &mut next {
                *value += distribute;
            }
        }

        let change: f64 = next.iter().zip(&rank).map(|(a, b)| (a - b).abs()).sum();
        rank = next;
        if change < params.tolerance {
            debug!(iterations = iteration + 1, "pagerank converged");
            return rank;
        }
    }

    debug!(
        max_iterations = params.max_iterations,
        "pagerank hit iteration ceiling"
    );
    rank
}

/// Brandes' algorithm over directed edges, scaled by `1 / ((n-1)(n-2))`.
pub(crate) fn betweenness_of(indexed: &IndexedGraph<'_>) -> Vec<f64> {
    let n = indexed.len();
    let mut centrality = vec![0.0; n];
    if n <= 2 {
        return centrality;
    }

    for source in 0..n {
        let mut stack = Vec::with_capacity(n);
        let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0f64; n];
        let mut dist: Vec<Option<usize>> = vec![None; n];
        sigma[source] = 1.0;
        dist[source] = Some(0);

        let mut queue = VecDeque::from([source]);
        while let Some(v) = queue.pop_front() {
            stack.push(v);
            let dv = dist[v].unwrap_or(0);
            for &w in &indexed.out[v] {
                if dist[w].is_none() {
                    dist[w] = Some(dv + 1);
                    queue.push_back(w);
                }
                if dist[w] == Some(dv + 1) {
                    sigma[w] += sigma[v];
                    predecessors[w].push(v);
                }
            }
        }

        let mut delta = vec![0.0f64; n];
        while let Some(w) = stack.pop() {
            for &v in &predecessors[w] {
                delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
            }
            if w != source {
                centrality[w] += delta[w];
            }
        }
    }

    let scale = 1.0 / ((n as f64 - 1.0) * (n as f64 - 2.0));
    for value in &mut centrality {
        *value *= scale;
    }
    centrality
}
