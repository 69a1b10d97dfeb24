// crates/server/src/handler.rs
//! Query handling: parse one request line, resolve it against the
//! cache (backfilling on a miss), and produce exactly one response
//! line. Every path synthesizes a response; a client never gets
//! silence back.

use jobwatch_core::CacheBusy;
use tracing::{debug, warn};

use crate::proto::{
    cache_locked_response, correlation_not_found_response, correlation_resolved_response,
    job_not_found_response, malformed_response, parse_request, status_response, Request,
};
use crate::state::AppState;

/// Resolve one request line to its response line.
pub async fn handle_line(state: &AppState, line: &str) -> String {
    match parse_request(line) {
        None => malformed_response(),
        Some(Request::Correlation { id }) => resolve_correlation(state, id).await,
        Some(Request::Job {
            date_hint,
            raw_id,
            job_id,
        }) => resolve_job(state, date_hint, raw_id, job_id).await,
    }
}

/// `BLAHJOB/<id>`: the submit wrapper races the tail, so this retries
/// on not-found as well as on lock contention before reporting the id
/// unknown.
async fn resolve_correlation(state: &AppState, id: &str) -> String {
    for attempt in 0..state.config.retry_budget {
        match state.cache.try_lookup_by_correlation(id) {
            Ok(Some(job_id)) => {
                debug!(correlation_id = id, job_id, "correlation resolved");
                return correlation_resolved_response(job_id);
            }
            Ok(None) => {
                debug!(correlation_id = id, attempt, "correlation not cached yet");
            }
            Err(CacheBusy) => {
                debug!(correlation_id = id, attempt, "cache busy");
            }
        }
        // No point sleeping after the last attempt.
        if attempt + 1 < state.config.retry_budget {
            tokio::time::sleep(state.config.retry_interval).await;
        }
    }
    correlation_not_found_response(id)
}

/// `<dateHint>/<jobId>`: bounded retries against a busy cache; a real
/// miss triggers one historical backfill bounded by the date hint
/// before the job is declared unknown.
async fn resolve_job(state: &AppState, date_hint: &str, raw_id: &str, job_id: u64) -> String {
    for attempt in 0..state.config.retry_budget {
        match state.cache.try_lookup(job_id) {
            Err(CacheBusy) => {
                debug!(job_id, attempt, "cache busy");
                if attempt + 1 < state.config.retry_budget {
                    tokio::time::sleep(state.config.retry_interval).await;
                }
            }
            Ok(Some(record)) => return status_response(raw_id, &record),
            Ok(None) => {
                match state.backfill.replay_since(date_hint).await {
                    Ok(applied) => {
                        debug!(job_id, date_hint, applied, "backfill after cache miss");
                    }
                    Err(e) => {
                        // A bad hint or unreadable spool is a negative
                        // result for this query, not a protocol error.
                        warn!(job_id, date_hint, error = %e, "backfill failed");
                    }
                }
                return match state.cache.lookup(job_id) {
                    Some(record) => status_response(raw_id, &record),
                    None => job_not_found_response(raw_id),
                };
            }
        }
    }
    cache_locked_response()
}
