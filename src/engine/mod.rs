//! # Propagation Engines
//!
//! Every engine follows the same lifecycle:
//!
//! 1. `build()` filters the input tables to one partition, constructs
//!    the follower graph and (re)initialises per-node state. Calling it
//!    again fully resets the engine.
//! 2. `propagate()` runs one simulation from a seed node to completion
//!    and returns its ordered event log.
//!
//! `propagate()` takes `&mut self`: a run mutates engine state, so
//! concurrent runs on one instance are ruled out by the borrow checker.
//! Services should build a fresh engine per request.
//!
//! ## Engines
//!
//! | Engine | Module | State per node |
//! |--------|--------|----------------|
//! | `EmotionEngine` | `emotion` | `state_in` / `state_out` affect vectors |
//! | `ReachEngine` | `reach` | delivery count |
//! | `EpidemicEngine` | `epidemic` | SIR / SIS compartment |

pub mod emotion;
pub mod reach;
pub mod epidemic;

use crate::graph::{FollowerGraph, NodeIx};
use crate::model::EdgeRow;
use crate::{Error, Result};

pub use emotion::{EmotionEngine, EmotionParams, EmotionRecord, HistoryLimit, PropagationOutcome, Snapshot};
pub use reach::{ReachEngine, ReachParams, ReachRecord};
pub use epidemic::{EpidemicEngine, EpidemicParams, EpidemicRecord, Compartment, RecoveryTarget};

// ============================================================================
// Engine contract
// ============================================================================

/// What every engine exposes besides its own `build` / `propagate`.
pub trait Engine {
    /// Short name used in errors and logs.
    const NAME: &'static str;

    fn is_built(&self) -> bool;

    /// Size of the node universe (the `total_nodes` of the metrics).
    fn node_count(&self) -> usize;

    /// Whether `node` belongs to the node universe.
    fn contains(&self, node: &str) -> bool;

    /// Fails with `NotBuilt` before `build()`, `UnknownSeed` for a seed
    /// outside the node universe.
    fn ensure_seed(&self, seed: &str) -> Result<()> {
        if !self.is_built() {
            return Err(Error::NotBuilt { engine: Self::NAME });
        }
        if !self.contains(seed) {
            return Err(Error::UnknownSeed(seed.to_string()));
        }
        Ok(())
    }
}

/// Warn when a partition key is given for a table without `network_id`.
pub(crate) fn check_partition(engine: &'static str, table: &'static str, partitioned: bool, key: Option<i64>) {
    if let (Some(key), false) = (key, partitioned) {
        tracing::warn!(engine, table, partition = key, "table has no network_id column; using every row");
    }
}

// ============================================================================
// Network: follower graph restricted to a node universe
// ============================================================================

/// Follower graph plus membership in the declared node universe.
///
/// Universe nodes missing from the edges are added as isolated nodes;
/// edge endpoints missing from the universe stay in the graph but are
/// never delivered to.
#[derive(Debug, Clone, Default)]
pub(crate) struct Network {
    graph: FollowerGraph,
    members: Vec<bool>,
    size: usize,
}

impl Network {
    pub(crate) fn build<'a, 'b>(
        edges: impl IntoIterator<Item = &'a EdgeRow>,
        universe: impl IntoIterator<Item = &'b str>,
    ) -> Self {
        let mut graph = FollowerGraph::from_edges(edges);
        let mut flagged: Vec<NodeIx> = Vec::new();
        for name in universe {
            if !graph.contains(name) {
                tracing::debug!(node = name, "node has no edges in this partition");
            }
            flagged.push(graph.add_node(name));
        }
        let mut members = vec![false; graph.node_count()];
        for ix in flagged {
            members[ix] = true;
        }
        let size = members.iter().filter(|m| **m).count();
        Self { graph, members, size }
    }

    pub(crate) fn graph(&self) -> &FollowerGraph {
        &self.graph
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    /// Universe member index of `name`.
    pub(crate) fn member(&self, name: &str) -> Option<NodeIx> {
        self.graph.index_of(name).filter(|ix| self.members[*ix])
    }

    pub(crate) fn name(&self, ix: NodeIx) -> &str {
        self.graph.name(ix)
    }

    /// Followers of `ix` that belong to the universe, in edge order.
    pub(crate) fn followers(&self, ix: NodeIx) -> impl Iterator<Item = NodeIx> + '_ {
        self.graph.followers(ix).iter().copied().filter(|f| self.members[*f])
    }
}
