//! # Propagation Data Model
//!
//! Plain data shared by graph construction, engines and metrics: affect
//! vectors, behavioral profiles, input tables and the log vocabulary.
//!
//! Design rule: no engine state here. This module is pure data and pure
//! functions.

pub mod affect;
pub mod profile;
pub mod table;
pub mod log;

pub use affect::{AffectVector, UpdateMethod, blend, cosine, round_to, AFFECT_LABELS, DIMENSIONS};
pub use profile::{
    Profile, ProfileParams, ProfileTable, ProfileOverrides, ThresholdOverride,
    Decision, decide,
};
pub use table::{
    RawTable, EdgeRow, EdgeTable, NodeRow, NodeTable, StateRow, StateTable, NETWORK_ID,
};
pub use log::{Action, LogEntry};
