//! Node centrality and seed selection.
//!
//! Scores are computed over the *edge* direction of a [`FollowerGraph`]
//! (`a → b` for every edge row), so out-degree counts the accounts a node
//! follows and PageRank flows from follower to followee.
//!
//! | Policy | Directed graph | Undirected view |
//! |--------|----------------|-----------------|
//! | `P0` random | seeded shuffle | seeded shuffle |
//! | `P1` central | out-degree | total degree |
//! | `P2` influence | PageRank | eigenvector |
//! | `P3` bridges | betweenness | betweenness |

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::{FollowerGraph, NodeIx};
use crate::{Error, Result};

/// RNG seed that reproduces the random policy's fixed ordering.
pub const RANDOM_POLICY_SEED: u64 = 42;

// ============================================================================
// Scores
// ============================================================================

/// Edge successors per node (`a → b` puts `b` in `successors[a]`).
fn successors(g: &FollowerGraph) -> Vec<Vec<NodeIx>> {
    let mut out = vec![Vec::new(); g.node_count()];
    for t in 0..g.node_count() {
        for &s in g.followers(t) {
            out[s].push(t);
        }
    }
    out
}

/// Neighbours ignoring direction, each listed once.
fn neighbours(g: &FollowerGraph) -> Vec<Vec<NodeIx>> {
    let mut out = successors(g);
    for (t, list) in out.iter_mut().enumerate() {
        list.extend_from_slice(g.followers(t));
        list.sort_unstable();
        list.dedup();
    }
    out
}

pub fn in_degree(g: &FollowerGraph) -> Vec<usize> {
    (0..g.node_count()).map(|ix| g.followers(ix).len()).collect()
}

pub fn out_degree(g: &FollowerGraph) -> Vec<usize> {
    successors(g).iter().map(Vec::len).collect()
}

/// In-degree plus out-degree.
pub fn total_degree(g: &FollowerGraph) -> Vec<usize> {
    in_degree(g).into_iter().zip(out_degree(g)).map(|(i, o)| i + o).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageRankConfig {
    pub damping: f64,
    pub max_iterations: usize,
    /// L1 change between iterations below which the scores are final.
    pub tolerance: f64,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self { damping: 0.85, max_iterations: 100, tolerance: 1e-6 }
    }
}

/// PageRank by power iteration. Scores sum to 1; dangling nodes spread
/// their rank evenly.
pub fn pagerank(g: &FollowerGraph, config: &PageRankConfig) -> Vec<f64> {
    let n = g.node_count();
    if n == 0 {
        return Vec::new();
    }
    let succ = successors(g);
    let d = config.damping;
    let base = (1.0 - d) / n as f64;
    let mut scores = vec![1.0 / n as f64; n];
    let mut next = vec![0.0; n];

    for iteration in 0..config.max_iterations {
        let dangling: f64 = (0..n).filter(|u| succ[*u].is_empty()).map(|u| scores[u]).sum();
        next.fill(base + d * dangling / n as f64);
        for (u, targets) in succ.iter().enumerate() {
            if targets.is_empty() {
                continue;
            }
            let share = d * scores[u] / targets.len() as f64;
            for &v in targets {
                next[v] += share;
            }
        }
        let diff: f64 = scores.iter().zip(&next).map(|(a, b)| (a - b).abs()).sum();
        std::mem::swap(&mut scores, &mut next);
        if diff < config.tolerance {
            tracing::trace!(iteration, "pagerank converged");
            break;
        }
    }
    scores
}

/// Eigenvector centrality of the undirected view, L2-normalized.
/// Power iteration on `A + I`.
pub fn eigenvector(g: &FollowerGraph, max_iterations: usize, tolerance: f64) -> Vec<f64> {
    let n = g.node_count();
    if n == 0 {
        return Vec::new();
    }
    let adj = neighbours(g);
    let mut x = vec![1.0 / n as f64; n];

    for _ in 0..max_iterations {
        let mut next = x.clone();
        for (u, list) in adj.iter().enumerate() {
            for &v in list {
                next[u] += x[v];
            }
        }
        let norm = next.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm == 0.0 {
            return vec![0.0; n];
        }
        next.iter_mut().for_each(|v| *v /= norm);
        let diff: f64 = x.iter().zip(&next).map(|(a, b)| (a - b).abs()).sum();
        x = next;
        if diff < n as f64 * tolerance {
            break;
        }
    }
    x
}

/// Directed betweenness (Brandes). With `normalized`, scores are divided by
/// `(n-1)(n-2)` when `n > 2`.
pub fn betweenness(g: &FollowerGraph, normalized: bool) -> Vec<f64> {
    let n = g.node_count();
    let succ = successors(g);
    let mut bc = vec![0.0; n];

    let mut sigma = vec![0.0f64; n];
    let mut dist = vec![-1i64; n];
    let mut delta = vec![0.0f64; n];
    let mut preds: Vec<Vec<NodeIx>> = vec![Vec::new(); n];

    for s in 0..n {
        sigma.fill(0.0);
        dist.fill(-1);
        delta.fill(0.0);
        preds.iter_mut().for_each(Vec::clear);
        sigma[s] = 1.0;
        dist[s] = 0;

        let mut stack = Vec::new();
        let mut queue = VecDeque::from([s]);
        while let Some(v) = queue.pop_front() {
            stack.push(v);
            for &w in &succ[v] {
                if dist[w] < 0 {
                    dist[w] = dist[v] + 1;
                    queue.push_back(w);
                }
                if dist[w] == dist[v] + 1 {
                    sigma[w] += sigma[v];
                    preds[w].push(v);
                }
            }
        }

        while let Some(w) = stack.pop() {
            for &v in &preds[w] {
                delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
            }
            if w != s {
                bc[w] += delta[w];
            }
        }
    }

    if normalized && n > 2 {
        let scale = 1.0 / ((n - 1) * (n - 2)) as f64;
        bc.iter_mut().for_each(|b| *b *= scale);
    }
    bc
}

// ============================================================================
// Seed selection
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedPolicy {
    /// P0: shuffled with the supplied RNG.
    Random,
    /// P1: out-degree, or total degree on the undirected view.
    Central,
    /// P2: PageRank, or eigenvector centrality on the undirected view.
    Influence,
    /// P3: betweenness.
    Bridges,
}

impl SeedPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeedPolicy::Random => "random",
            SeedPolicy::Central => "central",
            SeedPolicy::Influence => "influence",
            SeedPolicy::Bridges => "bridges",
        }
    }
}

impl fmt::Display for SeedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the policy name or its `P0`..`P3` code.
impl FromStr for SeedPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "random" | "p0" => Ok(SeedPolicy::Random),
            "central" | "p1" => Ok(SeedPolicy::Central),
            "influence" | "p2" => Ok(SeedPolicy::Influence),
            "bridges" | "p3" => Ok(SeedPolicy::Bridges),
            _ => Err(Error::config("policy", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedingParams {
    pub policy: SeedPolicy,
    /// Seeds wanted; capped at the number of candidates.
    pub k: usize,
    /// Score the undirected view for `Central` and `Influence`.
    #[serde(default)]
    pub undirected: bool,
    /// Keep only candidates of this cluster. Candidates without a cluster
    /// are dropped when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<i64>,
}

impl SeedingParams {
    pub fn new(policy: SeedPolicy, k: usize) -> Self {
        Self { policy, k, undirected: false, cluster: None }
    }

    pub fn undirected(mut self) -> Self {
        self.undirected = true;
        self
    }

    pub fn with_cluster(mut self, cluster: i64) -> Self {
        self.cluster = Some(cluster);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(Error::config("k", self.k));
        }
        Ok(())
    }
}

/// A ranked candidate. Random picks carry a score of 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSeed {
    pub node: String,
    pub score: f64,
}

/// Per-node score for a centrality policy, indexed by [`NodeIx`].
fn policy_scores(g: &FollowerGraph, params: &SeedingParams) -> Vec<f64> {
    let as_f64 = |v: Vec<usize>| -> Vec<f64> { v.into_iter().map(|d| d as f64).collect() };
    match (params.policy, params.undirected) {
        (SeedPolicy::Random, _) => vec![0.0; g.node_count()],
        (SeedPolicy::Central, false) => as_f64(out_degree(g)),
        (SeedPolicy::Central, true) => as_f64(total_degree(g)),
        (SeedPolicy::Influence, false) => pagerank(g, &PageRankConfig::default()),
        (SeedPolicy::Influence, true) => eigenvector(g, 100, 1e-6),
        (SeedPolicy::Bridges, _) => betweenness(g, true),
    }
}

/// Rank `candidates` (node id, cluster) by the policy and keep the top `k`.
///
/// Centrality ties keep candidate order. Candidates absent from the graph
/// score 0. Repeated candidates count once.
pub fn select_seeds<'a, R: Rng + ?Sized>(
    graph: &FollowerGraph,
    candidates: impl IntoIterator<Item = (&'a str, Option<i64>)>,
    params: &SeedingParams,
    rng: &mut R,
) -> Result<Vec<RankedSeed>> {
    params.validate()?;
    let mut seen = hashbrown::HashSet::new();
    let pool: Vec<&str> = candidates
        .into_iter()
        .filter(|(_, cluster)| params.cluster.is_none() || *cluster == params.cluster)
        .map(|(node, _)| node)
        .filter(|node| seen.insert(*node))
        .collect();

    let mut ranked: Vec<RankedSeed> = if params.policy == SeedPolicy::Random {
        let mut shuffled = pool;
        shuffled.shuffle(rng);
        shuffled.into_iter().map(|node| RankedSeed { node: node.to_string(), score: 0.0 }).collect()
    } else {
        let scores = policy_scores(graph, params);
        let mut ranked: Vec<RankedSeed> = pool
            .into_iter()
            .map(|node| RankedSeed {
                node: node.to_string(),
                score: graph.index_of(node).map_or(0.0, |ix| scores[ix]),
            })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    };
    ranked.truncate(params.k);

    tracing::debug!(
        policy = %params.policy,
        k = params.k,
        cluster = params.cluster,
        selected = ranked.len(),
        "seeds selected"
    );
    Ok(ranked)
}
