//! # contagion-rs: Message & Affect Propagation over Social Graphs
//!
//! Discrete-time, event-driven simulators that push a message through a
//! directed follower graph and record every hop in an ordered event log.
//!
//! ## Design Principles
//!
//! 1. **Followers receive**: a node sends to its *predecessors*, the nodes
//!    whose edges point at it.
//! 2. **Logs are the artifact**: every engine returns an ordered log; all
//!    aggregates are pure functions over that log (`metrics`).
//! 3. **Fresh engine per run**: engines own mutable per-node state, so a
//!    service builds one per request instead of sharing a singleton.
//! 4. **Injectable randomness**: stochastic engines take any `rand::Rng`,
//!    so tests run against a seeded `StdRng`.
//!
//! ## Quick Start
//!
//! ```rust
//! use contagion_rs::{EdgeTable, NodeTable, ReachEngine, ReachParams, metrics};
//!
//! # fn example() -> contagion_rs::Result<()> {
//! // D follows C, C follows B, B follows A.
//! let edges = EdgeTable::from_pairs([("D", "C"), ("C", "B"), ("B", "A")]);
//! let nodes = NodeTable::from_ids(["A", "B", "C", "D"]);
//!
//! let mut engine = ReachEngine::from_tables(&edges, &nodes, None)?;
//! let log = engine.propagate("A", &ReachParams::default())?;
//!
//! assert_eq!(log.len(), 4);
//! assert_eq!(metrics::final_reach(&log), 4);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Engines
//!
//! | Engine | Module | Description |
//! |--------|--------|-------------|
//! | `EmotionEngine` | `engine::emotion` | Agenda cascade with per-user affect state |
//! | `ReachEngine` | `engine::reach` | Single-visit flood (RIP-DSN) |
//! | `EpidemicEngine` | `engine::epidemic` | SIR / SIS compartmental spread |
//!
//! Seeds can be picked by degree, PageRank, eigenvector or betweenness
//! centrality with [`select_seeds`] (`graph::centrality`).

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod graph;
pub mod engine;
pub mod metrics;
pub mod report;
pub mod sink;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    AffectVector, UpdateMethod, blend, cosine, AFFECT_LABELS,
    Profile, ProfileParams, ProfileTable, ProfileOverrides, ThresholdOverride, Decision,
    EdgeRow, EdgeTable, NodeRow, NodeTable, StateRow, StateTable,
    Action, LogEntry,
};

// ============================================================================
// Re-exports: Graph
// ============================================================================

pub use graph::{FollowerGraph, RankedSeed, SeedPolicy, SeedingParams, Topology, select_seeds};

// ============================================================================
// Re-exports: Engines
// ============================================================================

pub use engine::{
    Engine,
    EmotionEngine, EmotionParams, EmotionRecord, HistoryLimit, PropagationOutcome,
    ReachEngine, ReachParams, ReachRecord,
    EpidemicEngine, EpidemicParams, EpidemicRecord, Compartment, RecoveryTarget,
};

// ============================================================================
// Re-exports: Metrics, reports and sinks
// ============================================================================

pub use metrics::{Method, MetricsSummary, StepCounts};
pub use report::{RunReport, write_report_json, write_summary};
pub use sink::{LogSink, LogRef, MemorySink, SinkConfig};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Build error in table '{table}', column '{column}': {reason}")]
    Build { table: &'static str, column: String, reason: String },

    #[error("Engine '{engine}' has not been built; call build() first")]
    NotBuilt { engine: &'static str },

    #[error("Seed node '{0}' is not part of the network")]
    UnknownSeed(String),

    #[error("Configuration error: invalid value '{value}' for '{field}'")]
    Config { field: &'static str, value: String },

    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn missing_column(table: &'static str, column: impl Into<String>) -> Self {
        Error::Build { table, column: column.into(), reason: "column is missing".into() }
    }

    pub(crate) fn config(field: &'static str, value: impl std::fmt::Display) -> Self {
        Error::Config { field, value: value.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
