//! Simple reach engine (RIP-DSN): single-visit broadcast flood.
//!
//! Every node is processed once. The first delivery is logged as
//! `publish` (seed) or `forward` and fans out to followers; any later
//! delivery is logged as `forward (repeated)` and stops there.

use std::collections::VecDeque;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use super::{Engine, Network, check_partition};
use crate::graph::NodeIx;
use crate::model::{Action, EdgeTable, LogEntry, NodeTable};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReachParams {
    /// Deliveries at this timestep or later do not fan out.
    pub max_steps: u32,
}

impl Default for ReachParams {
    fn default() -> Self {
        Self { max_steps: 4 }
    }
}

impl ReachParams {
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(Error::config("max_steps", self.max_steps));
        }
        Ok(())
    }
}

/// One delivery in a reach log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReachRecord {
    pub t: u32,
    /// `None` for the seed's publish record.
    pub sender: Option<String>,
    pub receiver: String,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl LogEntry for ReachRecord {
    fn t(&self) -> u32 {
        self.t
    }

    fn action(&self) -> Action {
        self.action
    }

    fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    fn receiver(&self) -> Option<&str> {
        Some(&self.receiver)
    }

    fn publisher(&self) -> Option<&str> {
        (self.action == Action::Publish).then_some(self.receiver.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReachEngine {
    network: Option<Network>,
}

impl Engine for ReachEngine {
    const NAME: &'static str = "reach";

    fn is_built(&self) -> bool {
        self.network.is_some()
    }

    fn node_count(&self) -> usize {
        self.network.as_ref().map_or(0, Network::size)
    }

    fn contains(&self, node: &str) -> bool {
        self.network.as_ref().is_some_and(|n| n.member(node).is_some())
    }
}

impl ReachEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables(edges: &EdgeTable, nodes: &NodeTable, partition: Option<i64>) -> Result<Self> {
        let mut engine = Self::new();
        engine.build(edges, nodes, partition)?;
        Ok(engine)
    }

    /// Replace the graph. The node universe is the node table's ids.
    pub fn build(&mut self, edges: &EdgeTable, nodes: &NodeTable, partition: Option<i64>) -> Result<()> {
        check_partition(Self::NAME, "edges", edges.partitioned, partition);
        check_partition(Self::NAME, "nodes", nodes.partitioned, partition);
        let network = Network::build(
            edges.partition(partition),
            nodes.partition(partition).map(|r| r.node.as_str()),
        );
        tracing::debug!(
            nodes = network.size(),
            edges = network.graph().edge_count(),
            partition,
            "reach engine built"
        );
        self.network = Some(network);
        Ok(())
    }

    pub fn propagate(&mut self, seed: &str, params: &ReachParams) -> Result<Vec<ReachRecord>> {
        self.ensure_seed(seed)?;
        params.validate()?;
        let network = self.network.as_ref().ok_or(Error::NotBuilt { engine: Self::NAME })?;
        let seed_ix = network.member(seed).ok_or_else(|| Error::UnknownSeed(seed.to_string()))?;

        let mut received = vec![0u32; network.graph().node_count()];
        let mut relayed: HashSet<(NodeIx, NodeIx)> = HashSet::new();
        let mut agenda: VecDeque<(u32, Option<NodeIx>, NodeIx)> = VecDeque::new();
        agenda.push_back((1, None, seed_ix));
        let mut log = Vec::new();

        while let Some((t, sender, receiver)) = agenda.pop_front() {
            received[receiver] += 1;
            let count = received[receiver];
            let sender_name = sender.map(|s| network.name(s).to_string());

            if count > 1 {
                log.push(ReachRecord {
                    t,
                    sender: sender_name,
                    receiver: network.name(receiver).to_string(),
                    action: Action::ForwardRepeated,
                    note: Some(format!("Received {count} times")),
                });
                continue;
            }

            log.push(ReachRecord {
                t,
                sender: sender_name,
                receiver: network.name(receiver).to_string(),
                action: if sender.is_none() { Action::Publish } else { Action::Forward },
                note: None,
            });

            if t < params.max_steps {
                for f in network.followers(receiver) {
                    if relayed.insert((receiver, f)) {
                        agenda.push_back((t + 1, Some(receiver), f));
                    }
                }
            }
        }

        tracing::debug!(seed, records = log.len(), "reach propagation finished");
        Ok(log)
    }
}
