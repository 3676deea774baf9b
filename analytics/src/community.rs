use crate::indexed::IndexedGraph;
use citegraph_core::model::Identifier;
use citegraph_core::CitationGraph;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

const MAX_LOCAL_PASSES: usize = 20;
const MAX_LEVELS: usize = 10;
const MIN_GAIN: f64 = 1e-12;

pub type CommunityId = usize;

/// Weighted undirected graph; `self_weight` holds edges collapsed into a node
/// by aggregation.
struct WeightedGraph {
    adj: Vec<Vec<(usize, f64)>>,
    self_weight: Vec<f64>,
}

impl WeightedGraph {
    fn from_projection(indexed: &IndexedGraph<'_>) -> Self {
        Self {
            adj: indexed
                .undirected
                .iter()
                .map(|neighbors| neighbors.iter().map(|&v| (v, 1.0)).collect())
                .collect(),
            self_weight: vec![0.0; indexed.len()],
        }
    }

    fn len(&self) -> usize {
        self.adj.len()
    }

    fn degree(&self, node: usize) -> f64 {
        self.adj[node].iter().map(|(_, w)| w).sum::<f64>() + 2.0 * self.self_weight[node]
    }

    /// Collapse each community into one node.
    fn aggregate(&self, assignment: &[usize], community_count: usize) -> Self {
        let mut self_weight = vec![0.0; community_count];
        let mut links: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); community_count];

        for node in 0..self.len() {
            let c = assignment[node];
            self_weight[c] += self.self_weight[node];
            for &(neighbor, weight) in &self.adj[node] {
                let d = assignment[neighbor];
                if c == d {
                    // Each internal edge is seen from both ends.
                    self_weight[c] += weight / 2.0;
                } else {
                    *links[c].entry(d).or_insert(0.0) += weight;
                }
            }
        }

        Self {
            adj: links
                .into_iter()
                .map(|neighbors| neighbors.into_iter().collect())
                .collect(),
            self_weight,
        }
    }
}

/// Louvain-style modularity optimization over the undirected projection.
///
/// Nodes are visited in an order shuffled by `seed` on every pass, so results
/// are reproducible for a fixed seed. Each community is then split into its
/// connected parts and ids are assigned in order of smallest member identifier.
pub fn communities(graph: &CitationGraph, seed: u64) -> BTreeMap<Identifier, CommunityId> {
    communities_of(&IndexedGraph::new(graph), seed)
}

pub(crate) fn communities_of(
    indexed: &IndexedGraph<'_>,
    seed: u64,
) -> BTreeMap<Identifier, CommunityId> {
    let assignment = detect(indexed, seed);
    indexed
        .ids
        .iter()
        .zip(assignment)
        .map(|(id, community)| ((*id).clone(), community))
        .collect()
}

/// Members of each community, keyed by community id.
pub fn community_groups(
    assignment: &BTreeMap<Identifier, CommunityId>,
) -> BTreeMap<CommunityId, Vec<Identifier>> {
    let mut groups: BTreeMap<CommunityId, Vec<Identifier>> = BTreeMap::new();
    for (id, community) in assignment {
        groups.entry(*community).or_default().push(id.clone());
    }
    groups
}

/// Newman modularity of `assignment` on the undirected projection.
pub fn modularity(graph: &CitationGraph, assignment: &BTreeMap<Identifier, CommunityId>) -> f64 {
    let indexed = IndexedGraph::new(graph);
    let weighted = WeightedGraph::from_projection(&indexed);
    let communities: Vec<usize> = indexed
        .ids
        .iter()
        .map(|id| assignment.get(*id).copied().unwrap_or(usize::MAX))
        .collect();
    modularity_of(&weighted, &communities)
}

fn modularity_of(graph: &WeightedGraph, assignment: &[usize]) -> f64 {
    let two_m: f64 = (0..graph.len()).map(|node| graph.degree(node)).sum();
    if two_m <= f64::EPSILON {
        return 0.0;
    }

    let mut internal: HashMap<usize, f64> = HashMap::new();
    let mut totals: HashMap<usize, f64> = HashMap::new();
    for node in 0..graph.len() {
        let c = assignment[node];
        *totals.entry(c).or_insert(0.0) += graph.degree(node);
        *internal.entry(c).or_insert(0.0) += 2.0 * graph.self_weight[node];
        for &(neighbor, weight) in &graph.adj[node] {
            if assignment[neighbor] == c {
                *internal.entry(c).or_insert(0.0) += weight;
            }
        }
    }

    totals
        .iter()
        .map(|(c, total)| {
            internal.get(c).copied().unwrap_or(0.0) / two_m - (total / two_m).powi(2)
        })
        .sum()
}

fn detect(indexed: &IndexedGraph<'_>, seed: u64) -> Vec<usize> {
    let n = indexed.len();
    if n == 0 {
        return Vec::new();
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut membership: Vec<usize> = (0..n).collect();
    let mut level_graph = WeightedGraph::from_projection(indexed);

    for level in 0..MAX_LEVELS {
        let (assignment, moved) = local_moving(&level_graph, &mut rng);
        if !moved {
            break;
        }
        let (assignment, count) = compact_ids(&assignment);
        for community in &mut membership {
            *community = assignment[*community];
        }
        debug!(level, communities = count, "louvain level");
        if count == level_graph.len() || count <= 1 {
            break;
        }
        level_graph = level_graph.aggregate(&assignment, count);
    }

    let refined = refine_connected(indexed, &membership);
    renumber_by_smallest_member(&refined)
}

/// One phase of local moving. Returns the assignment and whether any node moved.
fn local_moving(graph: &WeightedGraph, rng: &mut StdRng) -> (Vec<usize>, bool) {
    let n = graph.len();
    let mut assignment: Vec<usize> = (0..n).collect();
    let degrees: Vec<f64> = (0..n).map(|node| graph.degree(node)).collect();
    let two_m: f64 = degrees.iter().sum();
    if two_m <= f64::EPSILON {
        return (assignment, false);
    }

    let mut totals = degrees.clone();
    let mut order: Vec<usize> = (0..n).collect();
    let mut any_moved = false;

    for _ in 0..MAX_LOCAL_PASSES {
        order.shuffle(rng);
        let mut moved = false;

        for &node in &order {
            let k_i = degrees[node];
            if k_i <= f64::EPSILON {
                continue;
            }
            let current = assignment[node];

            let mut weights_to: BTreeMap<usize, f64> = BTreeMap::new();
            weights_to.insert(current, 0.0);
            for &(neighbor, weight) in &graph.adj[node] {
                *weights_to.entry(assignment[neighbor]).or_insert(0.0) += weight;
            }

            totals[current] -= k_i;
            let gain = |community: usize, k_i_in: f64| k_i_in - totals[community] * k_i / two_m;

            let mut best = current;
            let mut best_gain = gain(current, weights_to[&current]);
            for (&community, &k_i_in) in &weights_to {
                let candidate_gain = gain(community, k_i_in);
                if candidate_gain > best_gain + MIN_GAIN {
                    best = community;
                    best_gain = candidate_gain;
                }
            }

            totals[best] += k_i;
            if best != current {
                assignment[node] = best;
                moved = true;
                any_moved = true;
            }
        }

        if !moved {
            break;
        }
    }

    (assignment, any_moved)
}

/// Relabels arbitrary ids to `0..count` in order of first appearance.
fn compact_ids(assignment: &[usize]) -> (Vec<usize>, usize) {
    let mut mapping: HashMap<usize, usize> = HashMap::new();
    let compacted = assignment
        .iter()
        .map(|community| {
            let next = mapping.len();
            *mapping.entry(*community).or_insert(next)
        })
        .collect();
    (compacted, mapping.len())
}

/// Splits every community into its connected parts on the unweighted projection.
fn refine_connected(indexed: &IndexedGraph<'_>, membership: &[usize]) -> Vec<usize> {
    let n = indexed.len();
    let mut refined = vec![usize::MAX; n];
    let mut next_id = 0;

    for start in 0..n {
        if refined[start] != usize::MAX {
            continue;
        }
        let community = membership[start];
        refined[start] = next_id;
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            for &neighbor in &indexed.undirected[node] {
                if refined[neighbor] == usize::MAX && membership[neighbor] == community {
                    refined[neighbor] = next_id;
                    stack.push(neighbor);
                }
            }
        }
        next_id += 1;
    }

    refined
}

/// Node indices follow identifier order, so first appearance is smallest member.
fn renumber_by_smallest_member(assignment: &[usize]) -> Vec<usize> {
    compact_ids(assignment).0
}
