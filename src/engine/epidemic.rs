//! Compartmental spread (SIR / SIS).
//!
//! One engine, parameterized by where a recovering node goes. The
//! topology is whatever edge table is handed to `build`: synthetic
//! Barabási–Albert or Holme–Kim graphs from [`crate::graph::topology`], or
//! an uploaded real-world network.
//!
//! Each timestep has two phases, in this order:
//!
//! 1. **Infect**: every node of the current frontier tries each
//!    susceptible follower once with probability β.
//! 2. **Recover**: every node of the frontier *as it stood before phase 1*
//!    recovers with probability γ.
//!
//! The next frontier is the old frontier plus new infections, minus the
//! nodes that recovered.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{Engine, Network, check_partition};
use crate::graph::NodeIx;
use crate::model::{Action, EdgeTable, LogEntry, NodeTable};
use crate::{Error, Result};

// ============================================================================
// Compartments
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compartment {
    Susceptible,
    Infected,
    Recovered,
}

impl fmt::Display for Compartment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Compartment::Susceptible => "susceptible",
            Compartment::Infected => "infected",
            Compartment::Recovered => "recovered",
        })
    }
}

/// Where a node goes when it stops being infected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryTarget {
    /// SIR: recovered nodes are immune for the rest of the run.
    #[default]
    Recovered,
    /// SIS: recovered nodes can be infected again.
    Susceptible,
}

impl RecoveryTarget {
    fn compartment(self) -> Compartment {
        match self {
            RecoveryTarget::Recovered => Compartment::Recovered,
            RecoveryTarget::Susceptible => Compartment::Susceptible,
        }
    }
}

// ============================================================================
// Parameters and records
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpidemicParams {
    /// Per-edge infection probability.
    pub beta: f64,
    /// Per-node recovery probability.
    pub gamma: f64,
    /// The loop runs while `t < max_steps`.
    pub max_steps: u32,
}

impl Default for EpidemicParams {
    fn default() -> Self {
        Self::new(0.5, 0.5)
    }
}

impl EpidemicParams {
    pub fn new(beta: f64, gamma: f64) -> Self {
        Self { beta, gamma, max_steps: 10 }
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.beta) {
            return Err(Error::config("beta", self.beta));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(Error::config("gamma", self.gamma));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpidemicRecord {
    pub t: u32,
    pub sender: String,
    pub receiver: String,
    pub action: Action,
    /// Compartment of `receiver` after this event.
    pub state: Compartment,
}

impl LogEntry for EpidemicRecord {
    fn t(&self) -> u32 {
        self.t
    }

    fn action(&self) -> Action {
        self.action
    }

    fn sender(&self) -> Option<&str> {
        Some(&self.sender)
    }

    fn receiver(&self) -> Option<&str> {
        Some(&self.receiver)
    }
}

// ============================================================================
// Engine
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct EpidemicEngine {
    target: RecoveryTarget,
    network: Option<Network>,
    /// Compartment per graph node after the last run.
    states: Vec<Compartment>,
}

impl Engine for EpidemicEngine {
    const NAME: &'static str = "epidemic";

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

impl EpidemicEngine {
    pub fn new(target: RecoveryTarget) -> Self {
        Self { target, ..Self::default() }
    }

    pub fn sir() -> Self {
        Self::new(RecoveryTarget::Recovered)
    }

    pub fn sis() -> Self {
        Self::new(RecoveryTarget::Susceptible)
    }

    pub fn recovery_target(&self) -> RecoveryTarget {
        self.target
    }

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
            recovery = ?self.target,
            "epidemic engine built"
        );
        self.states = vec![Compartment::Susceptible; network.graph().node_count()];
        self.network = Some(network);
        Ok(())
    }

    /// Run with the thread-local RNG.
    pub fn propagate(&mut self, seed: &str, params: &EpidemicParams) -> Result<Vec<EpidemicRecord>> {
        self.propagate_with_rng(seed, params, &mut rand::thread_rng())
    }

    /// Run with a caller-supplied RNG. Every node starts susceptible
    /// except the seed, so runs on one engine are independent.
    pub fn propagate_with_rng<R: Rng + ?Sized>(
        &mut self,
        seed: &str,
        params: &EpidemicParams,
        rng: &mut R,
    ) -> Result<Vec<EpidemicRecord>> {
        self.ensure_seed(seed)?;
        params.validate()?;
        let network = self.network.as_ref().ok_or(Error::NotBuilt { engine: Self::NAME })?;
        let seed_ix = network.member(seed).ok_or_else(|| Error::UnknownSeed(seed.to_string()))?;
        let states = &mut self.states;
        let recovered_to = self.target.compartment();

        states.fill(Compartment::Susceptible);
        states[seed_ix] = Compartment::Infected;

        let mut log = Vec::new();
        let mut frontier: Vec<NodeIx> = vec![seed_ix];
        let mut recovered = vec![false; states.len()];
        let mut t = 1u32;

        while !frontier.is_empty() && t < params.max_steps {
            let mut infected_now: Vec<NodeIx> = Vec::new();
            for &node in &frontier {
                for f in network.followers(node) {
                    if states[f] != Compartment::Susceptible {
                        continue;
                    }
                    if rng.gen_bool(params.beta) {
                        states[f] = Compartment::Infected;
                        infected_now.push(f);
                        log.push(EpidemicRecord {
                            t,
                            sender: network.name(node).to_string(),
                            receiver: network.name(f).to_string(),
                            action: Action::Infect,
                            state: Compartment::Infected,
                        });
                    }
                }
            }

            let mut recovered_now = 0usize;
            for &node in &frontier {
                if rng.gen_bool(params.gamma) {
                    states[node] = recovered_to;
                    recovered[node] = true;
                    recovered_now += 1;
                    let name = network.name(node).to_string();
                    log.push(EpidemicRecord {
                        t,
                        sender: name.clone(),
                        receiver: name,
                        action: Action::Recover,
                        state: recovered_to,
                    });
                }
            }

            tracing::trace!(t, infected = infected_now.len(), recovered = recovered_now, "epidemic step");

            frontier.extend(infected_now);
            frontier.retain(|&n| !std::mem::take(&mut recovered[n]));
            t += 1;
        }

        tracing::debug!(
            seed,
            steps = t - 1,
            records = log.len(),
            still_infected = frontier.len(),
            "epidemic propagation finished"
        );
        Ok(log)
    }

    /// Compartment of `node` after the last run.
    pub fn compartment(&self, node: &str) -> Option<Compartment> {
        let ix = self.network.as_ref()?.member(node)?;
        self.states.get(ix).copied()
    }

    /// Number of universe nodes in `c` after the last run.
    pub fn count(&self, c: Compartment) -> usize {
        let Some(network) = self.network.as_ref() else {
            return 0;
        };
        network
            .graph()
            .names()
            .filter_map(|name| network.member(name))
            .filter(|ix| self.states[*ix] == c)
            .count()
    }
}
