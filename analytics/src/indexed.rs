use citegraph_core::model::Identifier;
use citegraph_core::CitationGraph;
use std::collections::HashMap;

/// Dense-index view of a [`CitationGraph`]. Index order is identifier order,
/// so the smallest index is the smallest identifier.
pub(crate) struct IndexedGraph<'a> {
    pub ids: Vec<&'a Identifier>,
    pub out: Vec<Vec<usize>>,
    pub inc: Vec<Vec<usize>>,
    /// Undirected projection, sorted and deduplicated.
    pub undirected: Vec<Vec<usize>>,
}

impl<'a> IndexedGraph<'a> {
    pub fn new(graph: &'a CitationGraph) -> Self {
        let ids: Vec<&Identifier> = graph.node_ids().collect();
        let index: HashMap<&Identifier, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let n = ids.len();
        let mut out = vec![Vec::new(); n];
        let mut inc = vec![Vec::new(); n];
        let mut undirected = vec![Vec::new(); n];

        for edge in graph.edges() {
            let (Some(&u), Some(&v)) = (index.get(&edge.citing), index.get(&edge.cited)) else {
                continue;
            };
            out[u].push(v);
            inc[v].push(u);
            undirected[u].push(v);
            undirected[v].push(u);
        }
        for neighbors in &mut undirected {
            neighbors.sort_unstable();
            neighbors.dedup();
        }

        Self {
            ids,
            out,
            inc,
            undirected,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn edge_count(&self) -> usize {
        self.out.iter().map(Vec::len).sum()
    }

    /// Weakly connected components, each sorted, ordered by size desc then smallest member.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let n = self.len();
        let mut seen = vec![false; n];
        let mut components = Vec::new();

        for start in 0..n {
            if seen[start] {
                continue;
            }
            seen[start] = true;
            let mut component = vec![start];
            let mut cursor = 0;
            while cursor < component.len() {
                let node = component[cursor];
                cursor += 1;
                for &next in &self.undirected[node] {
                    if !seen[next] {
                        seen[next] = true;
                        component.push(next);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }

        components.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a[0].cmp(&b[0])));
        components
    }

    /// Unweighted shortest-path distances from `source` over the undirected projection.
    pub fn undirected_distances(&self, source: usize) -> Vec<Option<usize>> {
        let mut dist = vec![None; self.len()];
        dist[source] = Some(0);
        let mut queue = std::collections::VecDeque::from([source]);
        while let Some(node) = queue.pop_front() {
            let next_dist = dist[node].map(|d| d + 1);
            for &next in &self.undirected[node] {
                if dist[next].is_none() {
                    dist[next] = next_dist;
                    queue.push_back(next);
                }
            }
        }
        dist
    }
}
