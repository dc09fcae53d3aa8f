//! # Follower Graph
//!
//! Directed graph over string node ids. An edge `a → b` makes `a` a
//! *predecessor* of `b`; engines treat predecessors as followers, so a
//! message sent by `b` is delivered to `a`.
//!
//! Adjacency is stored per target as an insertion-ordered, deduplicated
//! list of predecessors. Iteration order is therefore the order in which
//! edges first appeared in the edge table, which keeps every engine's log
//! order-stable.

pub mod centrality;
pub mod topology;

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;

use crate::model::EdgeRow;

pub use centrality::{RankedSeed, SeedPolicy, SeedingParams, select_seeds};
pub use topology::{Topology, barabasi_albert, holme_kim};

/// Dense node index inside one [`FollowerGraph`].
pub type NodeIx = usize;

/// Predecessor lists stay inline for typical social-graph fan-in.
type Followers = SmallVec<[NodeIx; 8]>;

#[derive(Debug, Clone, Default)]
pub struct FollowerGraph {
    index: HashMap<String, NodeIx>,
    names: Vec<String>,
    followers: Vec<Followers>,
    edges: HashSet<(NodeIx, NodeIx)>,
}

impl FollowerGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from edge rows. Self-loops and repeated edges are dropped.
    pub fn from_edges<'a>(edges: impl IntoIterator<Item = &'a EdgeRow>) -> Self {
        let mut g = Self::new();
        let mut self_loops = 0usize;
        for e in edges {
            if e.source == e.target {
                self_loops += 1;
                continue;
            }
            g.add_edge(&e.source, &e.target);
        }
        tracing::debug!(
            nodes = g.node_count(),
            edges = g.edge_count(),
            self_loops,
            "follower graph built"
        );
        g
    }

    /// Index of `name`, adding it as an isolated node when absent.
    pub fn add_node(&mut self, name: &str) -> NodeIx {
        if let Some(&ix) = self.index.get(name) {
            return ix;
        }
        let ix = self.names.len();
        self.names.push(name.to_string());
        self.followers.push(Followers::new());
        self.index.insert(name.to_string(), ix);
        ix
    }

    /// Add `source → target`. Returns false for self-loops and duplicates.
    pub fn add_edge(&mut self, source: &str, target: &str) -> bool {
        if source == target {
            return false;
        }
        let s = self.add_node(source);
        let t = self.add_node(target);
        if !self.edges.insert((s, t)) {
            return false;
        }
        self.followers[t].push(s);
        true
    }

    pub fn node_count(&self) -> usize {
        self.names.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn index_of(&self, name: &str) -> Option<NodeIx> {
        self.index.get(name).copied()
    }

    pub fn name(&self, ix: NodeIx) -> &str {
        &self.names[ix]
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Predecessors of `ix` in edge insertion order.
    pub fn followers(&self, ix: NodeIx) -> &[NodeIx] {
        &self.followers[ix]
    }

    /// Predecessors of a node by name; empty for unknown nodes.
    pub fn followers_of(&self, name: &str) -> impl Iterator<Item = &str> {
        self.index_of(name)
            .map(|ix| self.followers[ix].as_slice())
            .unwrap_or_default()
            .iter()
            .map(|f| self.names[*f].as_str())
    }

    pub fn has_edge(&self, source: &str, target: &str) -> bool {
        match (self.index_of(source), self.index_of(target)) {
            (Some(s), Some(t)) => self.edges.contains(&(s, t)),
            _ => false,
        }
    }
}
