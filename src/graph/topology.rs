//! Synthetic scale-free topologies for the compartmental engines.
//!
//! Both generators grow a network from a complete seed graph of `m + 1`
//! nodes. Each new node links to earlier nodes; the link `new → old` makes
//! the newcomer a follower of the older node.

use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};

use crate::model::{EdgeTable, NodeTable};
use crate::{Error, Result};

/// A generated network, ready to feed any engine's `build`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub nodes: NodeTable,
    pub edges: EdgeTable,
}

/// Barabási–Albert preferential attachment. Node ids are `user_1..=user_n`.
///
/// Each node after the seed clique attaches to `min(m, i)` distinct earlier
/// nodes chosen with probability proportional to degree.
pub fn barabasi_albert<R: Rng + ?Sized>(n: usize, m: usize, rng: &mut R) -> Result<Topology> {
    if n == 0 {
        return Err(Error::config("n", n));
    }
    if m == 0 {
        return Err(Error::config("m", m));
    }
    let mut g = Growth::new(n, |i| format!("user_{}", i + 1));

    let m0 = (m + 1).min(n);
    for i in 0..m0 {
        for j in (i + 1)..m0 {
            g.link(i, j);
        }
    }

    for i in m0..n {
        let mut chosen: Vec<usize> = Vec::with_capacity(m);
        while chosen.len() < m && chosen.len() < i {
            let target = preferential_pick(&g.degrees[..i], &chosen, rng);
            g.link(i, target);
            chosen.push(target);
        }
    }

    tracing::debug!(n, m, edges = g.pairs.len(), "barabasi-albert topology generated");
    Ok(g.finish())
}

/// Holme–Kim: preferential attachment with triad formation.
/// Node ids are `user_0..user_{n-1}`.
///
/// Requires `n ≥ 2`, `1 ≤ m < n` and `0 ≤ p ≤ 1`. After the first
/// preferential link of a new node, each further link closes a triangle
/// with probability `p` by attaching to a neighbour of the previous
/// target, falling back to preferential attachment when that neighbour is
/// already linked.
pub fn holme_kim<R: Rng + ?Sized>(n: usize, m: usize, p: f64, rng: &mut R) -> Result<Topology> {
    if n < 2 {
        return Err(Error::config("n", n));
    }
    if m < 1 || m >= n {
        return Err(Error::config("m", m));
    }
    if !(0.0..=1.0).contains(&p) {
        return Err(Error::config("p", p));
    }
    let mut g = Growth::new(n, |i| format!("user_{i}"));

    let m0 = m + 1;
    for i in 0..m0 {
        for j in (i + 1)..m0 {
            g.link(i, j);
        }
    }

    for i in m0..n {
        let mut chosen: Vec<usize> = Vec::with_capacity(m);
        let mut target = preferential_pick(&g.degrees[..i], &chosen, rng);
        g.link(i, target);
        chosen.push(target);

        while chosen.len() < m {
            let candidates: Vec<usize> = g.neighbours[target].iter().copied().filter(|x| *x != i).collect();
            let triad = if rng.gen_bool(p) && !candidates.is_empty() {
                let pick = candidates[rng.gen_range(0..candidates.len())];
                (!chosen.contains(&pick)).then_some(pick)
            } else {
                None
            };
            target = match triad {
                Some(t) => t,
                None => preferential_pick(&g.degrees[..i], &chosen, rng),
            };
            g.link(i, target);
            chosen.push(target);
        }
    }

    tracing::debug!(n, m, p, edges = g.pairs.len(), "holme-kim topology generated");
    Ok(g.finish())
}

/// Edge list under construction plus the degree and neighbour bookkeeping
/// the attachment rules read.
struct Growth<F: Fn(usize) -> String> {
    id: F,
    n: usize,
    pairs: Vec<(String, String)>,
    degrees: Vec<usize>,
    neighbours: Vec<Vec<usize>>,
}

impl<F: Fn(usize) -> String> Growth<F> {
    fn new(n: usize, id: F) -> Self {
        Self {
            id,
            n,
            pairs: Vec::new(),
            degrees: vec![0; n],
            neighbours: vec![Vec::new(); n],
        }
    }

    fn link(&mut self, a: usize, b: usize) {
        self.pairs.push(((self.id)(a), (self.id)(b)));
        self.degrees[a] += 1;
        self.degrees[b] += 1;
        self.neighbours[a].push(b);
        self.neighbours[b].push(a);
    }

    fn finish(self) -> Topology {
        Topology {
            nodes: NodeTable::from_ids((0..self.n).map(&self.id)),
            edges: EdgeTable::from_pairs(self.pairs),
        }
    }
}

/// Degree-proportional choice among indices not in `exclude`. Falls back
/// to a uniform choice when the remaining degree mass is zero.
fn preferential_pick<R: Rng + ?Sized>(degrees: &[usize], exclude: &[usize], rng: &mut R) -> usize {
    let available: Vec<usize> = (0..degrees.len()).filter(|j| !exclude.contains(j)).collect();
    match WeightedIndex::new(available.iter().map(|j| degrees[*j])) {
        Ok(sampler) => available[sampler.sample(rng)],
        Err(_) => available[rng.gen_range(0..available.len())],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::FollowerGraph;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_ba_edge_count() {
        let mut rng = StdRng::seed_from_u64(7);
        let topo = barabasi_albert(50, 2, &mut rng).unwrap();
        // clique of 3 → 3 edges, then 47 nodes × 2 links
        assert_eq!(topo.edges.len(), 3 + 47 * 2);
        assert_eq!(topo.nodes.len(), 50);
        assert_eq!(topo.nodes.rows[0].node, "user_1");
    }

    #[test]
    fn test_ba_no_self_loops_or_duplicates() {
        let mut rng = StdRng::seed_from_u64(11);
        let topo = barabasi_albert(80, 3, &mut rng).unwrap();
        let g = FollowerGraph::from_edges(&topo.edges.rows);
        assert_eq!(g.edge_count(), topo.edges.len());
    }

    #[test]
    fn test_ba_small_n_is_clique() {
        let mut rng = StdRng::seed_from_u64(1);
        let topo = barabasi_albert(3, 5, &mut rng).unwrap();
        assert_eq!(topo.edges.len(), 3);
    }

    #[test]
    fn test_ba_is_deterministic_for_seed() {
        let a = barabasi_albert(30, 2, &mut StdRng::seed_from_u64(3)).unwrap();
        let b = barabasi_albert(30, 2, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_hk_edge_count_and_ids() {
        let mut rng = StdRng::seed_from_u64(5);
        let topo = holme_kim(40, 3, 0.5, &mut rng).unwrap();
        assert_eq!(topo.edges.len(), 6 + 36 * 3);
        assert_eq!(topo.nodes.rows[0].node, "user_0");
        let g = FollowerGraph::from_edges(&topo.edges.rows);
        assert_eq!(g.edge_count(), topo.edges.len());
    }

    #[test]
    fn test_hk_full_triad_probability() {
        let mut rng = StdRng::seed_from_u64(9);
        let topo = holme_kim(25, 2, 1.0, &mut rng).unwrap();
        let g = FollowerGraph::from_edges(&topo.edges.rows);
        assert_eq!(g.edge_count(), 3 + 22 * 2);
    }

    #[test]
    fn test_preferential_pick_follows_degree() {
        let mut rng = StdRng::seed_from_u64(21);
        // Only index 2 carries degree mass once 0 is excluded.
        for _ in 0..50 {
            assert_eq!(preferential_pick(&[5, 0, 3, 0], &[0], &mut rng), 2);
        }
        let mut hits = [0usize; 3];
        for _ in 0..3_000 {
            hits[preferential_pick(&[1, 0, 9], &[], &mut rng)] += 1;
        }
        assert_eq!(hits[1], 0);
        assert!(hits[2] > hits[0] * 4);
    }

    #[test]
    fn test_preferential_pick_uniform_without_degree_mass() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut seen: Vec<usize> = (0..200).map(|_| preferential_pick(&[0, 4, 0, 0], &[1], &mut rng)).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen, vec![0, 2, 3]);
    }

    #[test]
    fn test_hk_rejects_bad_parameters() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(holme_kim(1, 1, 0.5, &mut rng).is_err());
        assert!(holme_kim(10, 10, 0.5, &mut rng).is_err());
        assert!(holme_kim(10, 0, 0.5, &mut rng).is_err());
        assert!(matches!(holme_kim(10, 2, 1.5, &mut rng), Err(Error::Config { field: "p", .. })));
    }
}
