//! Emotional propagation: agenda-driven cascade with per-user affect.
//!
//! Each user carries two affect vectors: `state_in` (what it has absorbed)
//! and `state_out` (what it has expressed). On every delivery the receiver
//! compares the incoming vector with both, decides through its profile
//! whether to forward, modify or ignore, and updates its state with the
//! configured [`UpdateMethod`].
//!
//! ```text
//! (1, -, seed, msg) ──publish──▶ (2, seed, f, msg) for f in followers(seed)
//! (t, s, r, v)      ──forward──▶ (t+1, r, f, v)
//!                   ──modify───▶ (t+1, r, f, blend(v, out_r))
//!                   ──ignore───▶ ∅
//! ```

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::{Engine, Network, check_partition};
use crate::graph::NodeIx;
use crate::model::{
    Action, AffectVector, Decision, EdgeTable, LogEntry, Profile, ProfileOverrides, ProfileParams,
    ProfileTable, StateTable, UpdateMethod, blend, cosine, decide, round_to,
};
use crate::{Error, Result};

/// Decimal places kept for vectors and similarities in log records.
const LOG_PRECISION: u32 = 3;

// ============================================================================
// Parameters
// ============================================================================

/// Per-run parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionParams {
    /// Highest timestep that may still relay to followers.
    pub max_steps: u32,
    pub method: UpdateMethod,
}

impl Default for EmotionParams {
    fn default() -> Self {
        Self { max_steps: 4, method: UpdateMethod::Ema }
    }
}

impl EmotionParams {
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(Error::config("max_steps", self.max_steps));
        }
        Ok(())
    }
}

/// How much of each user's (state_in, state_out) trail is retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HistoryLimit {
    Off,
    /// Keep only the most recent `n` snapshots.
    Bounded(usize),
    #[default]
    Unbounded,
}

/// One (state_in, state_out) pair in a user's history.
pub type Snapshot = (AffectVector, AffectVector);

// ============================================================================
// Log records
// ============================================================================

/// One entry of an emotional propagation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmotionRecord {
    Publish {
        t: u32,
        publisher: String,
        action: Action,
        vector_sent: AffectVector,
        state_out_before: AffectVector,
        state_out_after: AffectVector,
    },
    Relay {
        t: u32,
        sender: String,
        receiver: String,
        action: Action,
        vector_sent: AffectVector,
        sim_in: f64,
        sim_out: f64,
        state_in_before: AffectVector,
        state_in_after: AffectVector,
        state_out_before: AffectVector,
        state_out_after: AffectVector,
    },
}

impl LogEntry for EmotionRecord {
    fn t(&self) -> u32 {
        match self {
            EmotionRecord::Publish { t, .. } | EmotionRecord::Relay { t, .. } => *t,
        }
    }

    fn action(&self) -> Action {
        match self {
            EmotionRecord::Publish { action, .. } | EmotionRecord::Relay { action, .. } => *action,
        }
    }

    fn sender(&self) -> Option<&str> {
        match self {
            EmotionRecord::Relay { sender, .. } => Some(sender),
            EmotionRecord::Publish { .. } => None,
        }
    }

    fn receiver(&self) -> Option<&str> {
        match self {
            EmotionRecord::Relay { receiver, .. } => Some(receiver),
            EmotionRecord::Publish { .. } => None,
        }
    }

    fn publisher(&self) -> Option<&str> {
        match self {
            EmotionRecord::Publish { publisher, .. } => Some(publisher),
            EmotionRecord::Relay { .. } => None,
        }
    }
}

/// Result of one emotional run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationOutcome {
    /// The published message vector, rounded for display.
    pub vector: AffectVector,
    pub log: Vec<EmotionRecord>,
}

// ============================================================================
// Per-user state
// ============================================================================

#[derive(Debug, Clone)]
struct UserState {
    state_in: AffectVector,
    state_out: AffectVector,
    profile: Profile,
    params: ProfileParams,
    history: VecDeque<Snapshot>,
}

impl UserState {
    fn record(&mut self, limit: HistoryLimit) {
        let snap = (self.state_in, self.state_out);
        match limit {
            HistoryLimit::Off => {}
            HistoryLimit::Unbounded => self.history.push_back(snap),
            HistoryLimit::Bounded(n) => {
                self.history.push_back(snap);
                while self.history.len() > n {
                    self.history.pop_front();
                }
            }
        }
    }
}

/// Pending delivery: `(t, sender, receiver, vector)`.
type Delivery = (u32, Option<NodeIx>, NodeIx, AffectVector);

// ============================================================================
// Engine
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct EmotionEngine {
    network: Option<Network>,
    /// Indexed by graph node; `None` for nodes without a state row.
    users: Vec<Option<UserState>>,
    history_limit: HistoryLimit,
}

impl Engine for EmotionEngine {
    const NAME: &'static str = "emotion";

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

impl EmotionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(mut self, limit: HistoryLimit) -> Self {
        self.history_limit = limit;
        self
    }

    /// Build and return a ready engine.
    pub fn from_tables(
        edges: &EdgeTable,
        states: &StateTable,
        partition: Option<i64>,
        overrides: &ProfileOverrides,
    ) -> Result<Self> {
        let mut engine = Self::new();
        engine.build(edges, states, partition, overrides)?;
        Ok(engine)
    }

    /// Replace the graph and every user's state.
    ///
    /// The node universe is the set of users in `states`. Profiles come
    /// from each row's cluster; thresholds and α come from the profile
    /// table after `overrides`.
    pub fn build(
        &mut self,
        edges: &EdgeTable,
        states: &StateTable,
        partition: Option<i64>,
        overrides: &ProfileOverrides,
    ) -> Result<()> {
        self.network = None;
        self.users.clear();

        check_partition(Self::NAME, "edges", edges.partitioned, partition);
        check_partition(Self::NAME, "states", states.partitioned, partition);
        let table = ProfileTable::with_overrides(overrides)?;
        let rows: Vec<_> = states.partition(partition).collect();
        let network = Network::build(
            edges.partition(partition),
            rows.iter().map(|r| r.user_name.as_str()),
        );

        let mut users: Vec<Option<UserState>> = vec![None; network.graph().node_count()];
        for row in rows {
            let profile = Profile::from_cluster(row.cluster);
            let params = *table.params(profile)?;
            let Some(ix) = network.member(&row.user_name) else {
                continue;
            };
            let mut user = UserState {
                state_in: row.state_in,
                state_out: row.state_out,
                profile,
                params,
                history: VecDeque::new(),
            };
            user.record(self.history_limit);
            // Later rows for the same user replace earlier ones.
            users[ix] = Some(user);
        }

        tracing::debug!(
            users = network.size(),
            edges = network.graph().edge_count(),
            partition,
            "emotion engine built"
        );
        self.users = users;
        self.network = Some(network);
        Ok(())
    }

    /// Run one cascade from `seed` publishing `message`.
    pub fn propagate(
        &mut self,
        seed: &str,
        message: &AffectVector,
        params: &EmotionParams,
    ) -> Result<PropagationOutcome> {
        self.ensure_seed(seed)?;
        params.validate()?;
        let network = self.network.as_ref().ok_or(Error::NotBuilt { engine: Self::NAME })?;
        let users = &mut self.users;
        let limit = self.history_limit;
        let seed_ix = network.member(seed).ok_or_else(|| Error::UnknownSeed(seed.to_string()))?;

        tracing::debug!(seed, max_steps = params.max_steps, method = %params.method, "emotion propagation started");

        let mut agenda: VecDeque<Delivery> = VecDeque::new();
        agenda.push_back((1, None, seed_ix, *message));
        let mut log: Vec<EmotionRecord> = Vec::new();

        while let Some((t, sender, receiver, v)) = agenda.pop_front() {
            let user = users[receiver]
                .as_mut()
                .ok_or_else(|| Error::UnknownSeed(network.name(receiver).to_string()))?;

            let Some(sender) = sender else {
                // Initial publish: the seed expresses the message.
                let prev_out = user.state_out;
                user.state_out = blend(&prev_out, &v, Some(user.params.alpha), params.method)?;
                user.record(limit);
                log.push(EmotionRecord::Publish {
                    t,
                    publisher: network.name(receiver).to_string(),
                    action: Action::Publish,
                    vector_sent: v.rounded(LOG_PRECISION),
                    state_out_before: prev_out.rounded(LOG_PRECISION),
                    state_out_after: user.state_out.rounded(LOG_PRECISION),
                });
                for f in network.followers(receiver) {
                    agenda.push_back((t + 1, Some(receiver), f, v));
                }
                continue;
            };

            let prev_in = user.state_in;
            let prev_out = user.state_out;
            let sim_in = cosine(&v, &prev_in);
            let sim_out = cosine(&v, &prev_out);
            let decision = decide(&user.params, sim_in, sim_out);
            let alpha = Some(user.params.alpha);

            user.state_in = blend(&prev_in, &v, alpha, params.method)?;

            let outgoing = match decision {
                Decision::Forward => v,
                Decision::Modify => blend(&v, &prev_out, alpha, params.method)?,
                Decision::Ignore => v,
            };
            if decision.relays() {
                user.state_out = blend(&prev_out, &outgoing, alpha, params.method)?;
            }
            user.record(limit);

            tracing::trace!(
                t,
                sender = network.name(sender),
                receiver = network.name(receiver),
                profile = %user.profile,
                sim_in,
                sim_out,
                ?decision,
                "delivery"
            );

            log.push(EmotionRecord::Relay {
                t,
                sender: network.name(sender).to_string(),
                receiver: network.name(receiver).to_string(),
                action: decision.into(),
                vector_sent: v.rounded(LOG_PRECISION),
                sim_in: round_to(sim_in, LOG_PRECISION),
                sim_out: round_to(sim_out, LOG_PRECISION),
                state_in_before: prev_in.rounded(LOG_PRECISION),
                state_in_after: user.state_in.rounded(LOG_PRECISION),
                state_out_before: prev_out.rounded(LOG_PRECISION),
                state_out_after: user.state_out.rounded(LOG_PRECISION),
            });

            if decision.relays() && t < params.max_steps {
                for f in network.followers(receiver) {
                    agenda.push_back((t + 1, Some(receiver), f, outgoing));
                }
            }
        }

        tracing::debug!(seed, records = log.len(), "emotion propagation finished");
        Ok(PropagationOutcome { vector: message.rounded(LOG_PRECISION), log })
    }

    fn user(&self, node: &str) -> Option<&UserState> {
        let ix = self.network.as_ref()?.member(node)?;
        self.users.get(ix)?.as_ref()
    }

    /// Current `(state_in, state_out)` of a user.
    pub fn state(&self, node: &str) -> Option<Snapshot> {
        self.user(node).map(|u| (u.state_in, u.state_out))
    }

    pub fn profile(&self, node: &str) -> Option<Profile> {
        self.user(node).map(|u| u.profile)
    }

    /// Effective thresholds and α of a user.
    pub fn params(&self, node: &str) -> Option<ProfileParams> {
        self.user(node).map(|u| u.params)
    }

    /// Retained snapshots, oldest first. The first entry is the state at
    /// build time unless it was evicted by a bounded limit.
    pub fn history(&self, node: &str) -> Option<&VecDeque<Snapshot>> {
        self.user(node).map(|u| &u.history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StateRow, ThresholdOverride};

    fn polarity(v: f64) -> AffectVector {
        AffectVector::zero().with("polarity", v)
    }

    fn star() -> (EdgeTable, StateTable) {
        let edges = EdgeTable::from_pairs([("B", "A"), ("C", "A"), ("D", "A")]);
        let states = StateTable::from_rows(
            ["A", "B", "C", "D"]
                .into_iter()
                .map(|u| StateRow::new(u, 0, polarity(0.5), polarity(0.5)))
                .collect(),
        );
        (edges, states)
    }

    #[test]
    fn test_propagate_before_build_fails() {
        let mut engine = EmotionEngine::new();
        let err = engine.propagate("A", &polarity(0.9), &EmotionParams::default()).unwrap_err();
        assert!(matches!(err, Error::NotBuilt { engine: "emotion" }));
    }

    #[test]
    fn test_unknown_seed() {
        let (edges, states) = star();
        let mut engine = EmotionEngine::from_tables(&edges, &states, None, &ProfileOverrides::new()).unwrap();
        let err = engine.propagate("Z", &polarity(0.9), &EmotionParams::default()).unwrap_err();
        assert!(matches!(err, Error::UnknownSeed(ref s) if s == "Z"));
    }

    #[test]
    fn test_star_forwards() {
        let (edges, states) = star();
        let mut engine = EmotionEngine::from_tables(&edges, &states, None, &ProfileOverrides::new()).unwrap();
        let out = engine.propagate("A", &polarity(0.9), &EmotionParams::default()).unwrap();

        assert_eq!(out.log.len(), 4);
        assert_eq!(out.log[0].action(), Action::Publish);
        assert_eq!(out.log[0].publisher(), Some("A"));
        for (rec, who) in out.log[1..].iter().zip(["B", "C", "D"]) {
            assert_eq!(rec.t(), 2);
            assert_eq!(rec.action(), Action::Forward);
            assert_eq!(rec.sender(), Some("A"));
            assert_eq!(rec.receiver(), Some(who));
        }
    }

    #[test]
    fn test_seed_state_out_updated_by_publish() {
        let (edges, states) = star();
        let mut engine = EmotionEngine::from_tables(&edges, &states, None, &ProfileOverrides::new()).unwrap();
        engine.propagate("A", &polarity(0.9), &EmotionParams::default()).unwrap();
        // informant α = 0.3: 0.7 * 0.5 + 0.3 * 0.9
        let (_, out) = engine.state("A").unwrap();
        assert!((out.get("polarity").unwrap() - 0.62).abs() < 1e-12);
    }

    #[test]
    fn test_ignore_leaves_state_out_untouched() {
        let edges = EdgeTable::from_pairs([("B", "A")]);
        let states = StateTable::from_rows(vec![
            StateRow::new("A", 0, polarity(0.5), polarity(0.5)),
            StateRow::new("B", 0, AffectVector::zero().with("fear", 1.0), AffectVector::zero().with("fear", 1.0)),
        ]);
        let mut engine = EmotionEngine::from_tables(&edges, &states, None, &ProfileOverrides::new()).unwrap();
        let out = engine.propagate("A", &polarity(0.9), &EmotionParams::default()).unwrap();
        assert_eq!(out.log[1].action(), Action::Ignore);
        let (state_in, state_out) = engine.state("B").unwrap();
        assert_eq!(state_out, AffectVector::zero().with("fear", 1.0));
        // state_in always absorbs the message
        assert!(state_in.get("polarity").unwrap() > 0.0);
    }

    #[test]
    fn test_modify_blends_with_previous_out() {
        // B: in aligned, out partly aligned → modify for the informant profile.
        let edges = EdgeTable::from_pairs([("B", "A"), ("C", "B")]);
        let b_out = AffectVector::zero().with("polarity", 0.5).with("fear", 0.5);
        let states = StateTable::from_rows(vec![
            StateRow::new("A", 0, polarity(0.5), polarity(0.5)),
            StateRow::new("B", 0, polarity(0.5), b_out),
            StateRow::new("C", 3, polarity(0.5), polarity(0.5)),
        ]);
        let mut engine = EmotionEngine::from_tables(&edges, &states, None, &ProfileOverrides::new()).unwrap();
        let out = engine.propagate("A", &polarity(0.9), &EmotionParams::default()).unwrap();

        assert_eq!(out.log[1].action(), Action::Modify);
        // C receives blend(msg, B.out) = 0.7 * msg + 0.3 * B.out
        let EmotionRecord::Relay { vector_sent, sender, .. } = &out.log[2] else {
            panic!("expected relay record");
        };
        assert_eq!(sender, "B");
        assert!((vector_sent.get("polarity").unwrap() - 0.78).abs() < 1e-9);
        assert!((vector_sent.get("fear").unwrap() - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_max_steps_bounds_relay_generations() {
        // chain E→D→C→B→A, everyone forwards
        let edges = EdgeTable::from_pairs([("B", "A"), ("C", "B"), ("D", "C"), ("E", "D")]);
        let states = StateTable::from_rows(
            ["A", "B", "C", "D", "E"]
                .into_iter()
                .map(|u| StateRow::new(u, 3, polarity(0.5), polarity(0.5)))
                .collect(),
        );
        let mut engine = EmotionEngine::from_tables(&edges, &states, None, &ProfileOverrides::new()).unwrap();
        let params = EmotionParams { max_steps: 3, ..Default::default() };
        let out = engine.propagate("A", &polarity(0.9), &params).unwrap();
        let receivers: Vec<_> = out.log.iter().filter_map(|r| r.receiver()).collect();
        assert_eq!(receivers, vec!["B", "C"]);
    }

    #[test]
    fn test_publish_fanout_ignores_max_steps() {
        let (edges, states) = star();
        let mut engine = EmotionEngine::from_tables(&edges, &states, None, &ProfileOverrides::new()).unwrap();
        let params = EmotionParams { max_steps: 1, ..Default::default() };
        let out = engine.propagate("A", &polarity(0.9), &params).unwrap();
        assert_eq!(out.log.len(), 4);
    }

    #[test]
    fn test_zero_max_steps_rejected() {
        let (edges, states) = star();
        let mut engine = EmotionEngine::from_tables(&edges, &states, None, &ProfileOverrides::new()).unwrap();
        let params = EmotionParams { max_steps: 0, ..Default::default() };
        assert!(matches!(engine.propagate("A", &polarity(0.9), &params), Err(Error::Config { .. })));
    }

    #[test]
    fn test_overrides_change_decision() {
        let (edges, states) = star();
        let overrides = ProfileOverrides::new().with(
            Profile::HighCredibilityInformant,
            ThresholdOverride { forward: Some(1.5), modify: Some(1.5), ..Default::default() },
        );
        let mut engine = EmotionEngine::from_tables(&edges, &states, None, &overrides).unwrap();
        let out = engine.propagate("A", &polarity(0.9), &EmotionParams::default()).unwrap();
        assert!(out.log[1..].iter().all(|r| r.action() == Action::Ignore));
    }

    #[test]
    fn test_self_loop_not_delivered() {
        let edges = EdgeTable::from_pairs([("A", "A"), ("B", "A")]);
        let states = StateTable::from_rows(vec![
            StateRow::new("A", 0, polarity(0.5), polarity(0.5)),
            StateRow::new("B", 0, polarity(0.5), polarity(0.5)),
        ]);
        let mut engine = EmotionEngine::from_tables(&edges, &states, None, &ProfileOverrides::new()).unwrap();
        let out = engine.propagate("A", &polarity(0.9), &EmotionParams::default()).unwrap();
        assert!(out.log.iter().all(|r| r.receiver() != Some("A")));
    }

    #[test]
    fn test_followers_without_state_are_skipped() {
        let edges = EdgeTable::from_pairs([("B", "A"), ("ghost", "A")]);
        let states = StateTable::from_rows(vec![
            StateRow::new("A", 0, polarity(0.5), polarity(0.5)),
            StateRow::new("B", 0, polarity(0.5), polarity(0.5)),
        ]);
        let mut engine = EmotionEngine::from_tables(&edges, &states, None, &ProfileOverrides::new()).unwrap();
        let out = engine.propagate("A", &polarity(0.9), &EmotionParams::default()).unwrap();
        assert_eq!(out.log.len(), 2);
        assert_eq!(engine.node_count(), 2);
    }

    #[test]
    fn test_history_unbounded_appends() {
        let (edges, states) = star();
        let mut engine = EmotionEngine::from_tables(&edges, &states, None, &ProfileOverrides::new()).unwrap();
        engine.propagate("A", &polarity(0.9), &EmotionParams::default()).unwrap();
        assert_eq!(engine.history("A").unwrap().len(), 2);
        assert_eq!(engine.history("B").unwrap().len(), 2);
        assert_eq!(engine.history("B").unwrap()[0], (polarity(0.5), polarity(0.5)));
    }

    #[test]
    fn test_history_bounded_and_off() {
        let (edges, states) = star();
        let mut bounded = EmotionEngine::new().with_history(HistoryLimit::Bounded(1));
        bounded.build(&edges, &states, None, &ProfileOverrides::new()).unwrap();
        bounded.propagate("A", &polarity(0.9), &EmotionParams::default()).unwrap();
        let h = bounded.history("A").unwrap();
        assert_eq!(h.len(), 1);
        assert_eq!(h[0], bounded.state("A").unwrap());

        let mut off = EmotionEngine::new().with_history(HistoryLimit::Off);
        off.build(&edges, &states, None, &ProfileOverrides::new()).unwrap();
        off.propagate("A", &polarity(0.9), &EmotionParams::default()).unwrap();
        assert!(off.history("A").unwrap().is_empty());
    }

    #[test]
    fn test_rebuild_resets_state() {
        let (edges, states) = star();
        let mut engine = EmotionEngine::from_tables(&edges, &states, None, &ProfileOverrides::new()).unwrap();
        engine.propagate("A", &polarity(0.9), &EmotionParams::default()).unwrap();
        engine.build(&edges, &states, None, &ProfileOverrides::new()).unwrap();
        assert_eq!(engine.state("A").unwrap(), (polarity(0.5), polarity(0.5)));
        assert_eq!(engine.history("A").unwrap().len(), 1);
    }

    #[test]
    fn test_profile_assigned_from_cluster() {
        let (edges, mut states) = star();
        states.rows[1].cluster = 1;
        let engine = EmotionEngine::from_tables(&edges, &states, None, &ProfileOverrides::new()).unwrap();
        assert_eq!(engine.profile("B"), Some(Profile::EmotionallyDrivenAmplifier));
        assert_eq!(engine.params("B").unwrap().alpha, 0.8);
    }

    #[test]
    fn test_log_serializes_flat_records() {
        let (edges, states) = star();
        let mut engine = EmotionEngine::from_tables(&edges, &states, None, &ProfileOverrides::new()).unwrap();
        let out = engine.propagate("A", &polarity(0.9), &EmotionParams::default()).unwrap();
        let json = serde_json::to_value(&out.log).unwrap();
        assert_eq!(json[0]["publisher"], "A");
        assert_eq!(json[0]["action"], "publish");
        assert!(json[0].get("sender").is_none());
        assert_eq!(json[1]["receiver"], "B");
        assert_eq!(json[1]["sim_in"], 1.0);
        assert_eq!(json[1]["vector_sent"].as_array().unwrap().len(), 10);
    }
}
