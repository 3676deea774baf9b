use crate::indexed::IndexedGraph;
use citegraph_core::model::Identifier;
use citegraph_core::CitationGraph;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub node_count: usize,
    pub edge_count: usize,
    pub density: f64,
    /// `None` for graphs with fewer than two nodes.
    pub diameter: Option<usize>,
    pub average_clustering: f64,
    pub component_count: usize,
}

/// Edges over `n(n-1)` possible directed pairs; 0 for one node or none.
pub fn density(graph: &CitationGraph) -> f64 {
    let n = graph.node_count();
    if n <= 1 {
        return 0.0;
    }
    graph.edge_count() as f64 / (n as f64 * (n as f64 - 1.0))
}

/// Longest shortest path, ignoring direction, within the largest weakly connected component.
pub fn diameter(graph: &CitationGraph) -> Option<usize> {
    diameter_of(&IndexedGraph::new(graph))
}

pub(crate) fn diameter_of(indexed: &IndexedGraph<'_>) -> Option<usize> {
    if indexed.len() <= 1 {
        return None;
    }
    let components = indexed.components();
    let largest = components.first()?;
    largest
        .iter()
        .filter_map(|&source| {
            indexed
                .undirected_distances(source)
                .into_iter()
                .flatten()
                .max()
        })
        .max()
}

/// Mean local clustering coefficient of the undirected projection. Nodes with
/// fewer than two neighbors contribute 0.
pub fn clustering_coefficient(graph: &CitationGraph) -> f64 {
    clustering_of(&IndexedGraph::new(graph))
}

pub(crate) fn clustering_of(indexed: &IndexedGraph<'_>) -> f64 {
    let n = indexed.len();
    if n == 0 {
        return 0.0;
    }

    let total: f64 = (0..n)
        .map(|node| {
            let neighbors = &indexed.undirected[node];
            let k = neighbors.len();
            if k < 2 {
                return 0.0;
            }
            let mut links = 0usize;
            for (i, &a) in neighbors.iter().enumerate() {
                for &b in &neighbors[i + 1..] {
                    if indexed.undirected[a].binary_search(&b).is_ok() {
                        links += 1;
                    }
                }
            }
            2.0 * links as f64 / (k as f64 * (k as f64 - 1.0))
        })
        .sum();

    total / n as f64
}

/// Weakly connected components, largest first, ties broken by smallest identifier.
pub fn connected_components(graph: &CitationGraph) -> Vec<BTreeSet<Identifier>> {
    components_of(&IndexedGraph::new(graph))
}

pub(crate) fn components_of(indexed: &IndexedGraph<'_>) -> Vec<BTreeSet<Identifier>> {
    indexed
        .components()
        .into_iter()
        .map(|component| {
            component
                .into_iter()
                .map(|node| indexed.ids[node].clone())
                .collect()
        })
        .collect()
}

pub fn statistics(graph: &CitationGraph) -> GraphStatistics {
    crate::Analytics::new(graph).statistics()
}
