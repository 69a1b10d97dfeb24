// crates/core/src/event.rs
//! Classification and parsing of PBS server-log event lines.
//!
//! A server-log line is semicolon-delimited:
//!
//! ```text
//! 20240101 09:00:00;0008;PBS_Server;Job;123.cluster.example;Job Queued at request of ..., job name = blahjob_x9Yz, queue = short
//! ```
//!
//! Field index 4 carries the dotted job identifier, field index 5 the
//! category-specific payload. Only five payload markers are lifecycle
//! events; everything else in the log is noise and never touches the
//! cache.

use jobwatch_types::JobStatus;

/// Marker substrings for the five recognized lifecycle categories.
pub const QUEUED_MARKER: &str = "Job Queued";
pub const RUNNING_MARKER: &str = "Job Run";
pub const DELETED_MARKER: &str = "Job deleted";
pub const FINISHED_MARKER: &str = "Exit_status=";
pub const HELD_MARKER: &str = "Holds";

/// Lines produced through the submission wrapper carry this substring
/// in the job name. Only those queued lines establish a correlation
/// mapping; plain queued events from unrelated submitters must not.
const WRAPPER_MARKER: &str = "blahjob_";

/// The lifecycle category a log line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Queued,
    Running,
    Deleted,
    Finished,
    Held,
}

impl EventKind {
    /// The job status this event category projects into the cache.
    pub fn status(self) -> JobStatus {
        match self {
            EventKind::Queued => JobStatus::Queued,
            EventKind::Running => JobStatus::Running,
            EventKind::Deleted => JobStatus::Deleted,
            EventKind::Finished => JobStatus::Finished,
            EventKind::Held => JobStatus::Held,
        }
    }
}

/// Decide whether a raw log line is a lifecycle event.
///
/// Substring match against the five fixed markers, checked in the
/// same order the status projection applies them. Returns `None` for
/// the (vast majority of) lines that are not lifecycle events.
pub fn classify(line: &str) -> Option<EventKind> {
    if line.contains(QUEUED_MARKER) {
        Some(EventKind::Queued)
    } else if line.contains(RUNNING_MARKER) {
        Some(EventKind::Running)
    } else if line.contains(DELETED_MARKER) {
        Some(EventKind::Deleted)
    } else if line.contains(FINISHED_MARKER) {
        Some(EventKind::Finished)
    } else if line.contains(HELD_MARKER) {
        Some(EventKind::Held)
    } else {
        None
    }
}

/// A fully parsed lifecycle event, ready to be applied to the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEvent {
    pub kind: EventKind,
    /// Leading numeric component of the dotted job identifier.
    pub job_id: u64,
    /// Submission identifier from the queued payload (`job name = ...`).
    pub correlation_id: Option<String>,
    /// Exit code from the finished payload (`Exit_status=<code>`).
    pub exit_code: Option<String>,
    /// Whether the line carries the submission-wrapper marker.
    pub from_wrapper: bool,
}

/// Parse a classified log line into a [`JobEvent`].
///
/// Returns `None` when the line is not a lifecycle event or when the
/// semicolon grammar does not yield a usable job id. Correlation-id
/// and exit-code extraction are independent of each other: each
/// applies only when the payload matches its own marker.
pub fn parse_event(line: &str) -> Option<JobEvent> {
    let kind = classify(line)?;

    let mut fields = line.split(';');
    let dotted_id = fields.nth(4)?;
    let payload = fields.next()?;

    let job_id = parse_job_id(dotted_id)?;

    let correlation_id = if payload.contains(QUEUED_MARKER) {
        extract_correlation_id(payload)
    } else {
        None
    };

    let exit_code = if payload.contains(FINISHED_MARKER) {
        extract_exit_code(payload)
    } else {
        None
    };

    Some(JobEvent {
        kind,
        job_id,
        correlation_id,
        exit_code,
        from_wrapper: line.contains(WRAPPER_MARKER),
    })
}

/// Leading numeric component of a dotted job identifier.
///
/// `"123.cluster.example"` yields `123`. Job id 0 is never assigned
/// by the batch server and is rejected.
pub fn parse_job_id(dotted: &str) -> Option<u64> {
    let numeric = dotted.split('.').next()?;
    match numeric.trim().parse::<u64>() {
        Ok(0) | Err(_) => None,
        Ok(id) => Some(id),
    }
}

/// Queued payload: comma-delimited, third sub-field is `key=value`
/// whose value is the externally-assigned submission identifier.
fn extract_correlation_id(payload: &str) -> Option<String> {
    let pair = payload.split(',').nth(2)?;
    let (_, value) = pair.split_once('=')?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Finished payload: whitespace-delimited, first token is `key=value`
/// whose value is the exit code.
fn extract_exit_code(payload: &str) -> Option<String> {
    let pair = payload.split_whitespace().next()?;
    let (_, value) = pair.split_once('=')?;
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
