//! Run reports: the metadata stored next to a propagation log.
//!
//! ```text
//! engine.propagate() → log → RunReport::from_log() → LogSink::store()
//!                                                  → write_report_json()
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::graph::SeedingParams;
use crate::metrics::{Method, MetricsSummary};
use crate::model::LogEntry;
use crate::sink::LogRef;

static NEXT_RUN: AtomicU64 = AtomicU64::new(1);

/// One finished run: who seeded it, with which parameters, and what it
/// measured. The log itself lives in a [`crate::LogSink`] behind `log_ref`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub method: Method,
    pub seed: String,
    /// Free-form engine parameters (thresholds, β/γ, max_steps, ...).
    #[serde(default)]
    pub parameters: serde_json::Value,
    pub metrics: MetricsSummary,
    /// How the seed was chosen, when a seeding policy picked it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeding: Option<SeedingParams>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_ref: Option<LogRef>,
}

impl RunReport {
    /// Compute metrics for `log` and stamp a fresh run id.
    pub fn from_log<E: LogEntry>(method: Method, seed: &str, log: &[E], total_nodes: usize) -> Self {
        let created_at = Utc::now();
        let n = NEXT_RUN.fetch_add(1, Ordering::Relaxed);
        Self {
            run_id: format!("run-{}-{n}", created_at.format("%Y%m%d%H%M%S")),
            name: None,
            method,
            seed: seed.to_string(),
            parameters: serde_json::Value::Null,
            metrics: MetricsSummary::compute(log, method, total_nodes),
            seeding: None,
            created_at,
            log_ref: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_seeding(mut self, seeding: SeedingParams) -> Self {
        self.seeding = Some(seeding);
        self
    }

    pub fn with_parameters<P: Serialize>(mut self, params: &P) -> Result<Self> {
        self.parameters = serde_json::to_value(params)?;
        Ok(self)
    }
}

/// Write `report` as pretty JSON followed by a newline.
pub fn write_report_json(report: &RunReport, writer: &mut dyn Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, report)?;
    writeln!(writer)?;
    Ok(())
}

/// Write a short plain-text summary, one metric per line.
pub fn write_summary(report: &RunReport, writer: &mut dyn Write) -> Result<()> {
    let m = &report.metrics;
    writeln!(writer, "// run {}", report.run_id)?;
    if let Some(name) = &report.name {
        writeln!(writer, "// name: {name}")?;
    }
    writeln!(writer, "// method: {}  seed: {}", report.method, report.seed)?;
    if let Some(s) = &report.seeding {
        match s.cluster {
            Some(c) => writeln!(writer, "// seeding: {} k={} cluster={c}", s.policy, s.k)?,
            None => writeln!(writer, "// seeding: {} k={}", s.policy, s.k)?,
        }
    }
    writeln!(writer, "total_nodes  {}", m.total_nodes)?;
    writeln!(writer, "final_reach  {}", m.final_reach)?;
    writeln!(writer, "t_max        {}", m.t_max)?;
    for (t, n) in &m.t_pico {
        let new = m.new_t.get(t).copied().unwrap_or(0);
        writeln!(writer, "t={t:<4} active={n:<6} new={new}")?;
    }
    if let (Some(f), Some(md), Some(ig)) = (m.pct_forward, m.pct_modify, m.pct_ignore) {
        writeln!(writer, "pct_forward  {f:.4}")?;
        writeln!(writer, "pct_modify   {md:.4}")?;
        writeln!(writer, "pct_ignore   {ig:.4}")?;
    }
    Ok(())
}
