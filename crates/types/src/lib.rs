// crates/types/src/lib.rs
//! Shared job-status types for the jobwatch daemon.
//!
//! Kept free of I/O and runtime dependencies so both the ingestion
//! side and the query side can depend on it without pulling in the
//! other's stack.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a batch job as observed in the PBS server log.
///
/// The numeric codes are part of the wire protocol (`JobStatus=<n>` in
/// the classad response line) and must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Deleted,
    Finished,
    Held,
}

impl JobStatus {
    /// Numeric wire code used in the classad response line.
    pub fn code(self) -> u8 {
        match self {
            JobStatus::Queued => 1,
            JobStatus::Running => 2,
            JobStatus::Deleted => 3,
            JobStatus::Finished => 4,
            JobStatus::Held => 5,
        }
    }

    /// A job that has left the active queue (deleted or finished).
    /// Drives the `Yes`/`Not` removal flag in the response line.
    pub fn is_removed(self) -> bool {
        matches!(self, JobStatus::Deleted | JobStatus::Finished)
    }
}

/// Error returned when a wire code does not name a known status.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown job status code: {0}")]
pub struct UnknownStatusCode(pub u8);

impl TryFrom<u8> for JobStatus {
    type Error = UnknownStatusCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(JobStatus::Queued),
            2 => Ok(JobStatus::Running),
            3 => Ok(JobStatus::Deleted),
            4 => Ok(JobStatus::Finished),
            5 => Ok(JobStatus::Held),
            other => Err(UnknownStatusCode(other)),
        }
    }
}

/// Cached projection of a single job's state.
///
/// Created on the first queued observation for a job id and only ever
/// overwritten by later observations — the source log is append-only
/// and monotonic in time, so last-write-wins is correct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub status: JobStatus,
    /// Set only once a finished event carrying `Exit_status=` is seen.
    pub exit_code: Option<String>,
}

impl JobRecord {
    /// A freshly queued job with no exit information yet.
    pub fn queued() -> Self {
        Self {
            status: JobStatus::Queued,
            exit_code: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_protocol() {
        assert_eq!(JobStatus::Queued.code(), 1);
        assert_eq!(JobStatus::Running.code(), 2);
        assert_eq!(JobStatus::Deleted.code(), 3);
        assert_eq!(JobStatus::Finished.code(), 4);
        assert_eq!(JobStatus::Held.code(), 5);
    }

    #[test]
    fn code_round_trip() {
        for code in 1..=5u8 {
            let status = JobStatus::try_from(code).unwrap();
            assert_eq!(status.code(), code);
        }
        assert_eq!(JobStatus::try_from(0), Err(UnknownStatusCode(0)));
        assert_eq!(JobStatus::try_from(6), Err(UnknownStatusCode(6)));
    }

    #[test]
    fn removal_flag_only_for_terminal_states() {
        assert!(!JobStatus::Queued.is_removed());
        assert!(!JobStatus::Running.is_removed());
        assert!(JobStatus::Deleted.is_removed());
        assert!(JobStatus::Finished.is_removed());
        assert!(!JobStatus::Held.is_removed());
    }

    #[test]
    fn queued_record_has_no_exit_code() {
        let rec = JobRecord::queued();
        assert_eq!(rec.status, JobStatus::Queued);
        assert!(rec.exit_code.is_none());
    }
}
