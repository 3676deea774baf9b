use crate::model::{Edge, Identifier, Paper};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// In-memory citation network rooted at one seed paper.
///
/// Invariants: the root is always a node, every edge joins two registered
/// nodes, there is at most one edge per ordered pair and no self-loops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationGraph {
    root: Identifier,
    nodes: BTreeMap<Identifier, Paper>,
    edges: BTreeSet<Edge>,
}

impl CitationGraph {
    pub fn new(root: Paper) -> Self {
        let root_id = root.identifier.clone();
        let mut nodes = BTreeMap::new();
        nodes.insert(root_id.clone(), root);
        Self {
            root: root_id,
            nodes,
            edges: BTreeSet::new(),
        }
    }

    pub fn root(&self) -> &Identifier {
        &self.root
    }

    pub fn add_node(&mut self, paper: Paper) {
        self.nodes.insert(paper.identifier.clone(), paper);
    }

    pub fn add_edge(&mut self, citing: &Identifier, cited: &Identifier) -> bool {
        if !self.nodes.contains_key(citing) || !self.nodes.contains_key(cited) {
            return false;
        }
        match Edge::new(citing.clone(), cited.clone()) {
            Some(edge) => self.edges.insert(edge),
            None => false,
        }
    }

    pub fn remove_node(&mut self, id: &Identifier) -> Option<Paper> {
        if *id == self.root {
            return None;
        }
        let removed = self.nodes.remove(id)?;
        self.edges.retain(|edge| edge.citing != *id && edge.cited != *id);
        Some(removed)
    }

    pub fn contains(&self, id: &Identifier) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn paper(&self, id: &Identifier) -> Option<&Paper> {
        self.nodes.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &Identifier> {
        self.nodes.keys()
    }

    pub fn papers(&self) -> impl Iterator<Item = &Paper> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn successors(&self, id: &Identifier) -> Vec<&Identifier> {
        self.edges
            .iter()
            .filter(|edge| edge.citing == *id)
            .map(|edge| &edge.cited)
            .collect()
    }

    pub fn predecessors(&self, id: &Identifier) -> Vec<&Identifier> {
        self.edges
            .iter()
            .filter(|edge| edge.cited == *id)
            .map(|edge| &edge.citing)
            .collect()
    }

    pub fn undirected_adjacency(&self) -> BTreeMap<&Identifier, BTreeSet<&Identifier>> {
        let mut adj: BTreeMap<&Identifier, BTreeSet<&Identifier>> =
            self.nodes.keys().map(|id| (id, BTreeSet::new())).collect();
        for edge in &self.edges {
            adj.entry(&edge.citing).or_default().insert(&edge.cited);
            adj.entry(&edge.cited).or_default().insert(&edge.citing);
        }
        adj
    }
}
