//! Tabular inputs: edge, node and state tables.
//!
//! Engines consume already-parsed, in-memory tables. A table can be built
//! directly from typed rows, or from a [`RawTable`] (header + string cells,
//! e.g. a decoded CSV), in which case required columns are checked and a
//! missing or malformed column surfaces as [`Error::Build`].

use serde::{Deserialize, Serialize};

use super::affect::{AffectVector, AFFECT_LABELS, DIMENSIONS, label_index};
use crate::{Error, Result};

/// Optional partition column shared by every table.
pub const NETWORK_ID: &str = "network_id";

// ============================================================================
// Raw tables
// ============================================================================

/// Untyped table: a header row plus string cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn with_row(mut self, cells: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.rows.push(cells.into_iter().map(Into::into).collect());
        self
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn require(&self, table: &'static str, name: &str) -> Result<usize> {
        self.column(name).ok_or_else(|| Error::missing_column(table, name))
    }

    fn cell<'a>(&self, table: &'static str, row: &'a [String], idx: usize) -> Result<&'a str> {
        row.get(idx).map(String::as_str).ok_or_else(|| Error::Build {
            table,
            column: self.columns[idx].clone(),
            reason: format!("row has {} cells, expected at least {}", row.len(), idx + 1),
        })
    }
}

fn parse_network(table: &'static str, raw: &str) -> Result<Option<i64>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    parse_int(table, NETWORK_ID, raw).map(Some)
}

/// Integers may arrive float-formatted (`"2.0"`) from spreadsheet exports.
fn parse_int(table: &'static str, column: &str, raw: &str) -> Result<i64> {
    let raw = raw.trim();
    if let Ok(v) = raw.parse::<i64>() {
        return Ok(v);
    }
    match raw.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 => Ok(f as i64),
        _ => Err(Error::Build {
            table,
            column: column.to_string(),
            reason: format!("'{raw}' is not an integer"),
        }),
    }
}

fn parse_float(table: &'static str, column: &str, raw: &str) -> Result<f64> {
    raw.trim().parse::<f64>().map_err(|_| Error::Build {
        table,
        column: column.to_string(),
        reason: format!("'{raw}' is not a number"),
    })
}

fn in_partition(row_network: Option<i64>, key: Option<i64>, partitioned: bool) -> bool {
    match key {
        Some(k) if partitioned => row_network == Some(k),
        _ => true,
    }
}

// ============================================================================
// Edge table
// ============================================================================

/// One directed edge. `source → target` means `source` follows `target`:
/// `source` is a predecessor of `target` and receives what `target` sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRow {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeTable {
    pub rows: Vec<EdgeRow>,
    /// Whether the `network_id` column is present.
    pub partitioned: bool,
}

impl EdgeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<S: Into<String>>(pairs: impl IntoIterator<Item = (S, S)>) -> Self {
        Self {
            rows: pairs
                .into_iter()
                .map(|(s, t)| EdgeRow { source: s.into(), target: t.into(), network_id: None })
                .collect(),
            partitioned: false,
        }
    }

    pub fn from_rows(rows: Vec<EdgeRow>) -> Self {
        let partitioned = rows.iter().any(|r| r.network_id.is_some());
        Self { rows, partitioned }
    }

    pub fn from_raw(raw: &RawTable) -> Result<Self> {
        const TABLE: &str = "edges";
        let src = raw.require(TABLE, "source")?;
        let dst = raw.require(TABLE, "target")?;
        let net = raw.column(NETWORK_ID);

        let mut rows = Vec::with_capacity(raw.rows.len());
        for cells in &raw.rows {
            let network_id = match net {
                Some(i) => parse_network(TABLE, raw.cell(TABLE, cells, i)?)?,
                None => None,
            };
            rows.push(EdgeRow {
                source: raw.cell(TABLE, cells, src)?.to_string(),
                target: raw.cell(TABLE, cells, dst)?.to_string(),
                network_id,
            });
        }
        Ok(Self { rows, partitioned: net.is_some() })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows of one partition. Without a key, or without the partition
    /// column, every row is returned.
    pub fn partition(&self, key: Option<i64>) -> impl Iterator<Item = &EdgeRow> {
        let partitioned = self.partitioned;
        self.rows.iter().filter(move |r| in_partition(r.network_id, key, partitioned))
    }
}

// ============================================================================
// Node table
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRow {
    pub node: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeTable {
    pub rows: Vec<NodeRow>,
    pub partitioned: bool,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids<S: ToString>(ids: impl IntoIterator<Item = S>) -> Self {
        Self {
            rows: ids
                .into_iter()
                .map(|id| NodeRow { node: id.to_string(), network_id: None })
                .collect(),
            partitioned: false,
        }
    }

    /// Node ids in row order, without clusters.
    pub fn seed_candidates(&self) -> impl Iterator<Item = (&str, Option<i64>)> {
        self.rows.iter().map(|r| (r.node.as_str(), None))
    }

    pub fn from_rows(rows: Vec<NodeRow>) -> Self {
        let partitioned = rows.iter().any(|r| r.network_id.is_some());
        Self { rows, partitioned }
    }

    pub fn from_raw(raw: &RawTable) -> Result<Self> {
        const TABLE: &str = "nodes";
        let node = raw.require(TABLE, "node")?;
        let net = raw.column(NETWORK_ID);

        let mut rows = Vec::with_capacity(raw.rows.len());
        for cells in &raw.rows {
            let network_id = match net {
                Some(i) => parse_network(TABLE, raw.cell(TABLE, cells, i)?)?,
                None => None,
            };
            rows.push(NodeRow { node: raw.cell(TABLE, cells, node)?.to_string(), network_id });
        }
        Ok(Self { rows, partitioned: net.is_some() })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn partition(&self, key: Option<i64>) -> impl Iterator<Item = &NodeRow> {
        let partitioned = self.partitioned;
        self.rows.iter().filter(move |r| in_partition(r.network_id, key, partitioned))
    }
}

// ============================================================================
// State table (emotional engine)
// ============================================================================

/// Initial affect state and cluster of one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRow {
    pub user_name: String,
    pub cluster: i64,
    pub state_in: AffectVector,
    pub state_out: AffectVector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_id: Option<i64>,
}

impl StateRow {
    pub fn new(user: impl Into<String>, cluster: i64, state_in: AffectVector, state_out: AffectVector) -> Self {
        Self { user_name: user.into(), cluster, state_in, state_out, network_id: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateTable {
    pub rows: Vec<StateRow>,
    pub partitioned: bool,
}

impl StateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<StateRow>) -> Self {
        let partitioned = rows.iter().any(|r| r.network_id.is_some());
        Self { rows, partitioned }
    }

    pub fn push(&mut self, row: StateRow) {
        self.partitioned |= row.network_id.is_some();
        self.rows.push(row);
    }

    /// Users with their cluster, in row order, for seed selection.
    pub fn seed_candidates(&self) -> impl Iterator<Item = (&str, Option<i64>)> {
        self.rows.iter().map(|r| (r.user_name.as_str(), Some(r.cluster)))
    }

    /// Requires `user_name`, `cluster` and the twenty `in_<label>` /
    /// `out_<label>` columns.
    pub fn from_raw(raw: &RawTable) -> Result<Self> {
        const TABLE: &str = "states";
        let user = raw.require(TABLE, "user_name")?;
        let cluster = raw.require(TABLE, "cluster")?;
        let in_cols = affect_columns(raw, TABLE, "in")?;
        let out_cols = affect_columns(raw, TABLE, "out")?;
        let net = raw.column(NETWORK_ID);

        let mut rows = Vec::with_capacity(raw.rows.len());
        for cells in &raw.rows {
            let mut state_in = AffectVector::zero();
            let mut state_out = AffectVector::zero();
            for i in 0..DIMENSIONS {
                let (ci, co) = (in_cols[i], out_cols[i]);
                state_in.0[i] = parse_float(TABLE, &raw.columns[ci], raw.cell(TABLE, cells, ci)?)?;
                state_out.0[i] = parse_float(TABLE, &raw.columns[co], raw.cell(TABLE, cells, co)?)?;
            }
            let network_id = match net {
                Some(i) => parse_network(TABLE, raw.cell(TABLE, cells, i)?)?,
                None => None,
            };
            rows.push(StateRow {
                user_name: raw.cell(TABLE, cells, user)?.to_string(),
                cluster: parse_int(TABLE, "cluster", raw.cell(TABLE, cells, cluster)?)?,
                state_in,
                state_out,
                network_id,
            });
        }
        Ok(Self { rows, partitioned: net.is_some() })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn partition(&self, key: Option<i64>) -> impl Iterator<Item = &StateRow> {
        let partitioned = self.partitioned;
        self.rows.iter().filter(move |r| in_partition(r.network_id, key, partitioned))
    }
}

/// Column indices of `<prefix>_<label>` in component order.
fn affect_columns(raw: &RawTable, table: &'static str, prefix: &str) -> Result<[usize; DIMENSIONS]> {
    let mut idx = [usize::MAX; DIMENSIONS];
    for (c, name) in raw.columns.iter().enumerate() {
        let Some(label) = name.strip_prefix(prefix).and_then(|r| r.strip_prefix('_')) else {
            continue;
        };
        if let Some(i) = label_index(label) {
            idx[i] = c;
        }
    }
    for (i, c) in idx.iter().enumerate() {
        if *c == usize::MAX {
            return Err(Error::missing_column(table, format!("{prefix}_{}", AFFECT_LABELS[i])));
        }
    }
    Ok(idx)
}
