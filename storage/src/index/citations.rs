use citegraph_core::model::{Edge, EdgeKind, Identifier};
use std::collections::{HashMap, HashSet};

/// Directed citation adjacency in both directions, insertion-ordered per node.
pub struct CitationIndex {
    outgoing: HashMap<Identifier, Vec<Identifier>>,
    incoming: HashMap<Identifier, Vec<Identifier>>,
    edges: HashSet<Edge>,
}

impl CitationIndex {
    pub fn new() -> Self {
        Self {
            outgoing: HashMap::new(),
            incoming: HashMap::new(),
            edges: HashSet::new(),
        }
    }

    /// Returns false for self-loops and edges already present.
    pub fn add_edge(&mut self, edge: &Edge) -> bool {
        if edge.citing == edge.cited || self.edges.contains(edge) {
            return false;
        }
        self.outgoing
            .entry(edge.citing.clone())
            .or_default()
            .push(edge.cited.clone());
        self.incoming
            .entry(edge.cited.clone())
            .or_default()
            .push(edge.citing.clone());
        self.edges.insert(edge.clone());
        true
    }

    pub fn contains(&self, edge: &Edge) -> bool {
        self.edges.contains(edge)
    }

    /// 1-hop neighbors of `id` in the given direction.
    pub fn neighbors(&self, id: &Identifier, kind: EdgeKind) -> Vec<Identifier> {
        let side = match kind {
            EdgeKind::Reference => &self.outgoing,
            EdgeKind::Citation => &self.incoming,
        };
        side.get(id).cloned().unwrap_or_default()
    }

    /// Papers sharing at least one reference with `id`, with the shared count.
    pub fn bibliographic_coupling(&self, id: &Identifier) -> HashMap<Identifier, usize> {
        self.two_hop(id, EdgeKind::Reference, EdgeKind::Citation)
    }

    /// Papers cited together with `id` by at least one citing paper, with the shared count.
    pub fn co_citation(&self, id: &Identifier) -> HashMap<Identifier, usize> {
        self.two_hop(id, EdgeKind::Citation, EdgeKind::Reference)
    }

    fn two_hop(&self, id: &Identifier, first: EdgeKind, second: EdgeKind) -> HashMap<Identifier, usize> {
        let mut counts: HashMap<Identifier, usize> = HashMap::new();
        for hop1 in self.neighbors(id, first) {
            for hop2 in self.neighbors(&hop1, second) {
                if hop2 != *id {
                    *counts.entry(hop2).or_insert(0) += 1;
                }
            }
        }
        counts
    }

    /// All edges ordered by (citing, cited).
    pub fn edges(&self) -> Vec<Edge> {
        let mut out: Vec<Edge> = self.edges.iter().cloned().collect();
        out.sort();
        out
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

impl Default for CitationIndex {
    fn default() -> Self {
        Self::new()
    }
}
