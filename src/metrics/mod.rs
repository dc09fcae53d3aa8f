//! # Propagation Metrics
//!
//! Pure functions over a finished log. They only read records through
//! [`LogEntry`], so every engine's log type works.
//!
//! | Metric | Meaning |
//! |--------|---------|
//! | `final_reach` | distinct nodes seen as sender, receiver or publisher |
//! | `t_pico` | distinct active receivers per timestep |
//! | `new_t` | receivers counted at their first active timestep only |
//! | `t_max` | timestep with the most active receivers |
//! | `pct_*` | share of the node universe per relay role |
//!
//! "Active" depends on the method: an `infect` event for SIR/SIS, a
//! `forward`, `modify` or `ignore` decision for the relay methods.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::model::{Action, LogEntry, round_to};
use crate::{Error, Result};

/// Decimal places for the percentage metrics.
const PCT_PRECISION: u32 = 4;

/// Per-timestep counts. Serialized with stringified keys (`{"2": 3}`).
pub type StepCounts = BTreeMap<u32, usize>;

// ============================================================================
// Method
// ============================================================================

/// Which model produced a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    #[serde(rename = "sir")]
    Sir,
    #[serde(rename = "sis")]
    Sis,
    #[serde(rename = "rip-dsn")]
    RipDsn,
    #[serde(rename = "emotion")]
    Emotion,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Sir => "sir",
            Method::Sis => "sis",
            Method::RipDsn => "rip-dsn",
            Method::Emotion => "emotion",
        }
    }

    pub fn is_epidemic(&self) -> bool {
        matches!(self, Method::Sir | Method::Sis)
    }

    /// Whether `action` makes its receiver active at that timestep.
    pub fn counts(&self, action: Action) -> bool {
        if self.is_epidemic() {
            action == Action::Infect
        } else {
            action.is_relay_response()
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sir" => Ok(Method::Sir),
            "sis" => Ok(Method::Sis),
            "rip-dsn" => Ok(Method::RipDsn),
            "emotion" => Ok(Method::Emotion),
            other => Err(Error::config("method", other)),
        }
    }
}

// ============================================================================
// Metrics
// ============================================================================

/// Distinct node ids appearing as sender, receiver or publisher.
pub fn final_reach<E: LogEntry>(log: &[E]) -> usize {
    let mut seen: HashSet<&str> = HashSet::new();
    for e in log {
        seen.extend(e.sender());
        seen.extend(e.receiver());
        seen.extend(e.publisher());
    }
    seen.len()
}

/// Distinct active receivers per timestep. A node active at several
/// timesteps counts at each of them.
pub fn t_pico<E: LogEntry>(log: &[E], method: Method) -> StepCounts {
    let mut by_step: BTreeMap<u32, HashSet<&str>> = BTreeMap::new();
    for e in log {
        if !method.counts(e.action()) {
            continue;
        }
        if let Some(r) = e.receiver() {
            by_step.entry(e.t()).or_default().insert(r);
        }
    }
    by_step.into_iter().map(|(t, nodes)| (t, nodes.len())).collect()
}

/// Active receivers counted only at their first active timestep.
pub fn new_t<E: LogEntry>(log: &[E], method: Method) -> StepCounts {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut counts = StepCounts::new();
    for e in log {
        if !method.counts(e.action()) {
            continue;
        }
        if let Some(r) = e.receiver() {
            if seen.insert(r) {
                *counts.entry(e.t()).or_default() += 1;
            }
        }
    }
    counts
}

/// Timestep with the highest count; the earliest wins a tie. `0` when
/// nothing was active.
pub fn t_max(t_pico: &StepCounts) -> u32 {
    let mut best: Option<(u32, usize)> = None;
    for (&t, &n) in t_pico {
        if best.is_none_or(|(_, m)| n > m) {
            best = Some((t, n));
        }
    }
    best.map_or(0, |(t, _)| t)
}

fn share_with_action<E: LogEntry>(log: &[E], action: Action, total_nodes: usize) -> f64 {
    if total_nodes == 0 {
        return 0.0;
    }
    let nodes: HashSet<&str> = log
        .iter()
        .filter(|e| e.action() == action)
        .filter_map(|e| e.receiver())
        .collect();
    round_to(nodes.len() as f64 / total_nodes as f64, PCT_PRECISION)
}

/// Share of the universe that modified at least once.
pub fn pct_modify<E: LogEntry>(log: &[E], total_nodes: usize) -> f64 {
    share_with_action(log, Action::Modify, total_nodes)
}

/// Share of the universe that forwarded at least once.
pub fn pct_forward<E: LogEntry>(log: &[E], total_nodes: usize) -> f64 {
    share_with_action(log, Action::Forward, total_nodes)
}

/// Share of the universe never reached, clamped to `[0, 1]`.
pub fn pct_ignore(total_nodes: usize, final_reach: usize) -> f64 {
    if total_nodes == 0 {
        return 0.0;
    }
    let raw = (total_nodes as f64 - final_reach as f64) / total_nodes as f64;
    round_to(raw.clamp(0.0, 1.0), PCT_PRECISION)
}

// ============================================================================
// Summary
// ============================================================================

/// Every metric of one run, as stored alongside its log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub method: Method,
    pub total_nodes: usize,
    pub final_reach: usize,
    pub t_pico: StepCounts,
    pub new_t: StepCounts,
    pub t_max: u32,
    /// Relay methods only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pct_modify: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pct_forward: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pct_ignore: Option<f64>,
}

impl MetricsSummary {
    pub fn compute<E: LogEntry>(log: &[E], method: Method, total_nodes: usize) -> Self {
        let reach = final_reach(log);
        let t_pico = t_pico(log, method);
        let t_max = t_max(&t_pico);
        let relay = !method.is_epidemic();
        Self {
            method,
            total_nodes,
            final_reach: reach,
            new_t: new_t(log, method),
            t_pico,
            t_max,
            pct_modify: relay.then(|| pct_modify(log, total_nodes)),
            pct_forward: relay.then(|| pct_forward(log, total_nodes)),
            pct_ignore: relay.then(|| pct_ignore(total_nodes, reach)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EpidemicRecord, ReachRecord};
    use crate::engine::Compartment;
    use pretty_assertions::assert_eq;

    fn relay(t: u32, sender: Option<&str>, receiver: &str, action: Action) -> ReachRecord {
        ReachRecord {
            t,
            sender: sender.map(str::to_string),
            receiver: receiver.to_string(),
            action,
            note: None,
        }
    }

    fn infect(t: u32, sender: &str, receiver: &str) -> EpidemicRecord {
        EpidemicRecord {
            t,
            sender: sender.into(),
            receiver: receiver.into(),
            action: Action::Infect,
            state: Compartment::Infected,
        }
    }

    fn recover(t: u32, node: &str) -> EpidemicRecord {
        EpidemicRecord {
            t,
            sender: node.into(),
            receiver: node.into(),
            action: Action::Recover,
            state: Compartment::Susceptible,
        }
    }

    #[test]
    fn test_star_summary() {
        let log = vec![
            relay(1, None, "A", Action::Publish),
            relay(2, Some("A"), "B", Action::Forward),
            relay(2, Some("A"), "C", Action::Forward),
            relay(2, Some("A"), "D", Action::Forward),
        ];
        let m = MetricsSummary::compute(&log, Method::RipDsn, 4);
        assert_eq!(m.final_reach, 4);
        assert_eq!(m.t_pico, StepCounts::from([(2, 3)]));
        assert_eq!(m.new_t, StepCounts::from([(2, 3)]));
        assert_eq!(m.t_max, 2);
        assert_eq!(m.pct_forward, Some(0.75));
        assert_eq!(m.pct_modify, Some(0.0));
        assert_eq!(m.pct_ignore, Some(0.0));
    }

    #[test]
    fn test_repeated_forward_not_active() {
        let log = vec![
            relay(1, None, "A", Action::Publish),
            relay(2, Some("A"), "B", Action::Forward),
            relay(3, Some("B"), "A", Action::ForwardRepeated),
        ];
        assert_eq!(t_pico(&log, Method::RipDsn), StepCounts::from([(2, 1)]));
    }

    #[test]
    fn test_sis_counts_reinfection_in_t_pico_not_new_t() {
        let log = vec![
            infect(1, "A", "B"),
            recover(1, "A"),
            infect(2, "B", "A"),
            recover(2, "B"),
            infect(3, "A", "B"),
        ];
        assert_eq!(t_pico(&log, Method::Sis), StepCounts::from([(1, 1), (2, 1), (3, 1)]));
        assert_eq!(new_t(&log, Method::Sis), StepCounts::from([(1, 1), (2, 1)]));
        assert_eq!(final_reach(&log), 2);
    }

    #[test]
    fn test_epidemic_summary_has_no_percentages() {
        let log = vec![infect(1, "A", "B")];
        let m = MetricsSummary::compute(&log, Method::Sir, 10);
        assert_eq!(m.pct_forward, None);
        assert_eq!(m.pct_ignore, None);
        let json = serde_json::to_value(&m).unwrap();
        assert!(json.get("pct_modify").is_none());
        assert_eq!(json["t_pico"]["1"], 1);
        assert_eq!(json["method"], "sir");
    }

    #[test]
    fn test_t_max_tie_prefers_earliest() {
        assert_eq!(t_max(&StepCounts::from([(3, 2), (5, 2), (7, 1)])), 3);
        assert_eq!(t_max(&StepCounts::new()), 0);
    }

    #[test]
    fn test_pct_ignore_bounds() {
        assert_eq!(pct_ignore(0, 0), 0.0);
        assert_eq!(pct_ignore(3, 5), 0.0);
        assert_eq!(pct_ignore(3, 1), 0.6667);
    }

    #[test]
    fn test_empty_log() {
        let log: Vec<ReachRecord> = Vec::new();
        let m = MetricsSummary::compute(&log, Method::Emotion, 5);
        assert_eq!(m.final_reach, 0);
        assert_eq!(m.t_max, 0);
        assert_eq!(m.pct_ignore, Some(1.0));
    }

    #[test]
    fn test_method_parse() {
        assert_eq!("rip-dsn".parse::<Method>().unwrap(), Method::RipDsn);
        assert!(matches!("flood".parse::<Method>(), Err(Error::Config { field: "method", .. })));
    }
}
