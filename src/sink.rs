//! # Log Sink
//!
//! The persistence seam for finished runs. A sink keeps each
//! [`RunReport`] under its run id and stores the serialized log as a blob
//! split into fixed-size chunks, so very large logs never have to sit in a
//! single record. The report carries a [`LogRef`] that is enough to
//! reassemble the blob later.
//!
//! ## Implementations
//!
//! | Sink | Description |
//! |------|-------------|
//! | `MemorySink` | In-process maps, for tests and embedding |

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::report::RunReport;
use crate::{Error, Result};

/// Default chunk size, 255 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 255 * 1024;

/// Where a stored log lives and how to check it was reassembled whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRef {
    pub blob_id: String,
    pub chunks: usize,
    pub bytes: usize,
}

// ============================================================================
// Sink contract
// ============================================================================

pub trait LogSink {
    /// Store a serialized log and its report. Returns the report with
    /// `log_ref` filled in.
    fn store_raw(&self, report: RunReport, log_json: Vec<u8>) -> Result<RunReport>;

    /// Reassemble the serialized log behind `log_ref`.
    fn load_raw(&self, log_ref: &LogRef) -> Result<Vec<u8>>;

    fn report(&self, run_id: &str) -> Option<RunReport>;

    /// Stored run ids, oldest first.
    fn runs(&self) -> Vec<String>;

    fn store<E: Serialize>(&self, report: RunReport, log: &[E]) -> Result<RunReport>
    where
        Self: Sized,
    {
        let bytes = serde_json::to_vec(log)?;
        self.store_raw(report, bytes)
    }

    fn load<E: DeserializeOwned>(&self, log_ref: &LogRef) -> Result<Vec<E>>
    where
        Self: Sized,
    {
        let bytes = self.load_raw(log_ref)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Load the log of a stored run by id.
    fn load_run<E: DeserializeOwned>(&self, run_id: &str) -> Result<Vec<E>>
    where
        Self: Sized,
    {
        let report = self.report(run_id).ok_or_else(|| Error::NotFound(format!("run {run_id}")))?;
        let log_ref = report
            .log_ref
            .ok_or_else(|| Error::NotFound(format!("log of run {run_id}")))?;
        self.load(&log_ref)
    }
}

// ============================================================================
// MemorySink
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkConfig {
    pub chunk_size: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE }
    }
}

/// In-memory sink. Clones share the same storage.
#[derive(Debug, Clone)]
pub struct MemorySink {
    inner: Arc<SinkInner>,
}

#[derive(Debug)]
struct SinkInner {
    reports: RwLock<HashMap<String, RunReport>>,
    /// Insertion order of run ids.
    order: RwLock<Vec<String>>,
    blobs: RwLock<HashMap<String, Vec<Vec<u8>>>>,
    chunk_size: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::build(DEFAULT_CHUNK_SIZE)
    }

    pub fn with_config(config: SinkConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(Error::config("chunk_size", config.chunk_size));
        }
        Ok(Self::build(config.chunk_size))
    }

    fn build(chunk_size: usize) -> Self {
        Self {
            inner: Arc::new(SinkInner {
                reports: RwLock::new(HashMap::new()),
                order: RwLock::new(Vec::new()),
                blobs: RwLock::new(HashMap::new()),
                chunk_size,
            }),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.inner.chunk_size
    }

    /// Remove a run and its log. Returns false for unknown ids.
    pub fn delete(&self, run_id: &str) -> bool {
        let Some(report) = self.inner.reports.write().remove(run_id) else {
            return false;
        };
        if let Some(r) = report.log_ref {
            self.inner.blobs.write().remove(&r.blob_id);
        }
        self.inner.order.write().retain(|id| id != run_id);
        tracing::info!(run_id, "run deleted");
        true
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for MemorySink {
    fn store_raw(&self, mut report: RunReport, log_json: Vec<u8>) -> Result<RunReport> {
        let chunks: Vec<Vec<u8>> = log_json.chunks(self.inner.chunk_size).map(<[u8]>::to_vec).collect();
        let log_ref = LogRef {
            blob_id: format!("{}.log", report.run_id),
            chunks: chunks.len(),
            bytes: log_json.len(),
        };

        tracing::info!(
            run_id = %report.run_id,
            method = %report.method,
            chunks = log_ref.chunks,
            bytes = log_ref.bytes,
            "run stored"
        );

        self.inner.blobs.write().insert(log_ref.blob_id.clone(), chunks);
        report.log_ref = Some(log_ref);
        let run_id = report.run_id.clone();
        if self.inner.reports.write().insert(run_id.clone(), report.clone()).is_none() {
            self.inner.order.write().push(run_id);
        }
        Ok(report)
    }

    fn load_raw(&self, log_ref: &LogRef) -> Result<Vec<u8>> {
        let blobs = self.inner.blobs.read();
        let chunks = blobs
            .get(&log_ref.blob_id)
            .ok_or_else(|| Error::NotFound(format!("blob {}", log_ref.blob_id)))?;
        let bytes = chunks.concat();
        if chunks.len() != log_ref.chunks || bytes.len() != log_ref.bytes {
            return Err(Error::NotFound(format!(
                "blob {} is incomplete ({} of {} bytes)",
                log_ref.blob_id,
                bytes.len(),
                log_ref.bytes
            )));
        }
        tracing::info!(blob_id = %log_ref.blob_id, chunks = chunks.len(), bytes = bytes.len(), "run loaded");
        Ok(bytes)
    }

    fn report(&self, run_id: &str) -> Option<RunReport> {
        self.inner.reports.read().get(run_id).cloned()
    }

    fn runs(&self) -> Vec<String> {
        self.inner.order.read().clone()
    }
}
