// crates/server/src/proto.rs
//! The line-oriented query protocol.
//!
//! One request line per connection, `<dateHint>/<identifier>`, one
//! response line back. The response strings are consumed by the
//! submit-side scripts verbatim and must not change shape.

use jobwatch_types::{JobRecord, JobStatus};

/// Date-hint literal that marks the identifier as a correlation id.
pub const CORRELATION_MARKER: &str = "BLAHJOB";

/// A parsed query line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request<'a> {
    /// `BLAHJOB/<correlationId>` — resolve a submission identifier to
    /// a numeric job id.
    Correlation { id: &'a str },
    /// `<YYYYMMDD>/<jobId[.host]>` — look up a job's status. `raw_id`
    /// is echoed verbatim in the response; `job_id` is its numeric
    /// prefix (0 when the identifier has no leading digits, which can
    /// never match a cached job).
    Job {
        date_hint: &'a str,
        raw_id: &'a str,
        job_id: u64,
    },
}

/// Parse one request line. `None` means malformed: empty line or no
/// `/` separator.
pub fn parse_request(line: &str) -> Option<Request<'_>> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (date_hint, identifier) = line.split_once('/')?;
    if identifier.is_empty() {
        return None;
    }

    if date_hint == CORRELATION_MARKER {
        return Some(Request::Correlation { id: identifier });
    }

    Some(Request::Job {
        date_hint,
        raw_id: identifier,
        job_id: leading_number(identifier),
    })
}

/// Numeric prefix of an identifier, `atoi`-style: `"123.host"` is
/// 123, `"host"` is 0.
fn leading_number(s: &str) -> u64 {
    let digits: &str = {
        let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        &s[..end]
    };
    digits.parse().unwrap_or(0)
}

pub fn malformed_response() -> String {
    "Wrong string format/Not\n".to_string()
}

pub fn cache_locked_response() -> String {
    "Cache locked/Not\n".to_string()
}

pub fn job_not_found_response(raw_id: &str) -> String {
    format!("JobId {raw_id} not found/Not\n")
}

pub fn correlation_resolved_response(job_id: u64) -> String {
    format!("{job_id}\n")
}

pub fn correlation_not_found_response(id: &str) -> String {
    format!("Blahjob id {id} not found\n")
}

/// Format the classad status line for a cached job.
///
/// The removal flag is `Yes` once the job has left the active queue
/// (deleted or finished); finished jobs additionally carry their exit
/// code.
pub fn status_response(raw_id: &str, record: &JobRecord) -> String {
    let removal = if record.status.is_removed() {
        "Yes"
    } else {
        "Not"
    };
    if record.status == JobStatus::Finished {
        let code = record.exit_code.as_deref().unwrap_or("");
        format!(
            "[BatchJobId=\"{raw_id}\"; JobStatus=4; ExitCode={code};/{removal}\n"
        )
    } else {
        format!(
            "[BatchJobId=\"{raw_id}\"; JobStatus={};/{removal}\n",
            record.status.code()
        )
    }
}
