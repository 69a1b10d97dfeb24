// crates/core/src/cache.rs
//! The in-memory job-status projection shared by ingestion, backfill
//! and the query workers.
//!
//! One `RwLock` guards both the job map and the correlation index, so
//! readers never observe a half-applied event and the two writers
//! (live ingestion and backfill) are serialized with each other. The
//! query path uses the non-blocking `try_*` variants so it can honor
//! the protocol's bounded-retry / `Cache locked` contract instead of
//! parking a worker on the lock.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};

use jobwatch_types::{JobRecord, JobStatus};
use thiserror::Error;
use tracing::trace;

use crate::event::{EventKind, JobEvent};

/// Returned by the `try_*` readers when the writer holds the lock.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("status cache is busy")]
pub struct CacheBusy;

#[derive(Default)]
struct CacheInner {
    jobs: HashMap<u64, JobRecord>,
    /// Correlation id (trimmed, as it appears in the queued payload)
    /// to job id. Populated only at queued time, when both sides of
    /// the mapping are known together.
    correlation: HashMap<String, u64>,
}

/// Authoritative in-memory job state. Cheap to share via `Arc`.
#[derive(Default)]
pub struct StatusCache {
    inner: RwLock<CacheInner>,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a queued observation.
    ///
    /// Creates the job record if this id has never been seen; a replay
    /// of the same queued event is a no-op and never disturbs an
    /// existing record or its correlation mapping. The correlation
    /// mapping is recorded only together with record creation.
    pub fn record_queued(&self, job_id: u64, correlation_id: Option<&str>) {
        let mut inner = self.write();
        if inner.jobs.contains_key(&job_id) {
            return;
        }
        inner.jobs.insert(job_id, JobRecord::queued());
        if let Some(corr) = correlation_id {
            let corr = corr.trim();
            if !corr.is_empty() {
                inner.correlation.insert(corr.to_string(), job_id);
            }
        }
        trace!(job_id, "job queued");
    }

    /// Overwrite the status of an already-known job (last write wins).
    ///
    /// Status transitions require a prior queued observation; events
    /// for unknown ids are dropped.
    pub fn record_status(&self, job_id: u64, status: JobStatus) {
        let mut inner = self.write();
        if let Some(record) = inner.jobs.get_mut(&job_id) {
            record.status = status;
            trace!(job_id, status = status.code(), "job status updated");
        }
    }

    /// Attach an exit code to an already-known job.
    pub fn record_exit_code(&self, job_id: u64, code: &str) {
        let mut inner = self.write();
        if let Some(record) = inner.jobs.get_mut(&job_id) {
            record.exit_code = Some(code.to_string());
        }
    }

    /// Apply one parsed event. Single entry point for both live
    /// ingestion and historical backfill, so all mutations funnel
    /// through the same writer lock.
    pub fn apply(&self, event: &JobEvent) {
        match event.kind {
            EventKind::Queued => {
                // Correlation mappings are only trusted when the line
                // came through the submission wrapper; plain queued
                // events still create the record.
                let corr = if event.from_wrapper {
                    event.correlation_id.as_deref()
                } else {
                    None
                };
                self.record_queued(event.job_id, corr);
            }
            EventKind::Running | EventKind::Deleted | EventKind::Held => {
                self.record_status(event.job_id, event.kind.status());
            }
            EventKind::Finished => {
                self.record_status(event.job_id, JobStatus::Finished);
                if let Some(code) = &event.exit_code {
                    self.record_exit_code(event.job_id, code);
                }
            }
        }
    }

    /// Point read of a job record.
    pub fn lookup(&self, job_id: u64) -> Option<JobRecord> {
        self.read().jobs.get(&job_id).cloned()
    }

    /// Point read of the correlation index.
    pub fn lookup_by_correlation(&self, correlation_id: &str) -> Option<u64> {
        self.read().correlation.get(correlation_id.trim()).copied()
    }

    fn try_read(&self) -> Result<RwLockReadGuard<'_, CacheInner>, CacheBusy> {
        match self.inner.try_read() {
            Ok(inner) => Ok(inner),
            // A poisoned lock is not contention; the data is still valid
            // for last-write-wins reads.
            Err(TryLockError::Poisoned(p)) => Ok(p.into_inner()),
            Err(TryLockError::WouldBlock) => Err(CacheBusy),
        }
    }

    /// Non-blocking [`lookup`](Self::lookup) for the query retry loop.
    pub fn try_lookup(&self, job_id: u64) -> Result<Option<JobRecord>, CacheBusy> {
        Ok(self.try_read()?.jobs.get(&job_id).cloned())
    }

    /// Non-blocking [`lookup_by_correlation`](Self::lookup_by_correlation).
    pub fn try_lookup_by_correlation(&self, correlation_id: &str) -> Result<Option<u64>, CacheBusy> {
        Ok(self
            .try_read()?
            .correlation
            .get(correlation_id.trim())
            .copied())
    }

    /// Take the writer lock and hold it until the returned guard is
    /// dropped, making every `try_*` reader report [`CacheBusy`].
    /// Exists so tests can pin the busy path deterministically.
    #[doc(hidden)]
    pub fn hold_write(&self) -> impl Sized + '_ {
        self.write()
    }

    /// Number of jobs currently cached.
    pub fn len(&self) -> usize {
        self.read().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().jobs.is_empty()
    }
}
