// crates/core/src/ingest.rs
//! Background ingestion loop: tail the live server log and feed
//! lifecycle events into the status cache.
//!
//! Each cycle recomputes today's expected log path. A path change is
//! a rotation: the cursor restarts at offset 0 on the new file and
//! the loop polls until the writer has created it (the new day's log
//! often appears some time after midnight). Matching lines pass
//! through a bounded ring of line slots before being flushed to the
//! parser, so a single poll can never hold an unbounded batch in
//! memory; if more lines than the ring holds accumulate between
//! polls, the oldest are dropped and recovered later by backfill.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::StatusCache;
use crate::cursor::LogCursor;
use crate::discovery::SpoolPaths;
use crate::event::{classify, parse_event};

/// Bounded circular buffer of event-candidate lines.
///
/// Holds at most `capacity` lines; pushing into a full ring drops the
/// oldest unflushed line. `drain` yields the retained lines oldest
/// first and empties the ring.
pub struct LineRing {
    slots: VecDeque<String>,
    capacity: usize,
    dropped: u64,
}

impl LineRing {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "line ring capacity must be positive");
        Self {
            slots: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    pub fn push(&mut self, line: String) {
        if self.slots.len() == self.capacity {
            self.slots.pop_front();
            self.dropped += 1;
        }
        self.slots.push_back(line);
    }

    pub fn drain(&mut self) -> Vec<String> {
        if self.dropped > 0 {
            warn!(
                dropped = self.dropped,
                capacity = self.capacity,
                "line ring overflowed; oldest events lost (recoverable via backfill)"
            );
            self.dropped = 0;
        }
        self.slots.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Tuning knobs for the ingestion loop.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Idle delay between reaching EOF and the next poll.
    pub poll_interval: Duration,
    /// Capacity of the line ring (event-candidate lines per poll).
    pub buffer_capacity: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            buffer_capacity: 4096,
        }
    }
}

/// The live-log tailing task. Owns its cursor and ring; shares the
/// cache with backfill and the query workers.
pub struct Ingestor {
    paths: SpoolPaths,
    cache: Arc<StatusCache>,
    config: IngestConfig,
    cursor: Option<LogCursor>,
    ring: LineRing,
}

impl Ingestor {
    pub fn new(paths: SpoolPaths, cache: Arc<StatusCache>, config: IngestConfig) -> Self {
        let ring = LineRing::new(config.buffer_capacity);
        Self {
            paths,
            cache,
            config,
            cursor: None,
            ring,
        }
    }

    /// Run until cancelled. Never returns an error: every I/O failure
    /// is logged and retried on the next cycle, because this task has
    /// no one to report to and must not silently stop.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(logs_dir = %self.paths.logs_dir().display(), "ingestion loop started");
        loop {
            if cancel.is_cancelled() {
                break;
            }

            let expected = self.paths.today_log_path();
            if !self.advance_to(expected, &cancel).await {
                break;
            }
            self.poll_once().await;

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
        info!("ingestion loop stopped");
    }

    /// Point the cursor at `expected`, resetting to offset 0 on a
    /// path change and waiting for the new file to become openable.
    /// Returns `false` if cancelled while waiting.
    async fn advance_to(
        &mut self,
        expected: std::path::PathBuf,
        cancel: &CancellationToken,
    ) -> bool {
        let rotated = match &self.cursor {
            Some(cursor) => cursor.path() != expected,
            None => true,
        };
        if !rotated {
            return true;
        }

        if let Some(old) = &self.cursor {
            info!(
                from = %old.path().display(),
                to = %expected.display(),
                "log rotation detected"
            );
        }
        self.cursor = Some(LogCursor::new(expected.clone()));

        // The writer may not have created the new day's file yet.
        // There is no give-up bound here: the file will appear, and
        // the query side keeps serving from the cache meanwhile.
        while tokio::fs::metadata(&expected).await.is_err() {
            debug!(path = %expected.display(), "waiting for log file to appear");
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(Duration::from_secs(1)) => {}
            }
        }
        true
    }

    /// One read-to-EOF / flush cycle. Returns the number of events
    /// applied to the cache.
    async fn poll_once(&mut self) -> usize {
        let Some(cursor) = self.cursor.as_mut() else {
            return 0;
        };

        match cursor.read_new_lines().await {
            Ok(lines) => {
                for line in lines {
                    if classify(&line).is_some() {
                        self.ring.push(line);
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // Same-day file vanished (or never appeared); the next
                // cycle re-checks and the rotation path handles a
                // replacement.
                debug!(path = %cursor.path().display(), "live log not present");
                return 0;
            }
            Err(e) => {
                warn!(path = %cursor.path().display(), error = %e, "failed to read live log");
                return 0;
            }
        }

        let mut applied = 0;
        for line in self.ring.drain() {
            if let Some(event) = parse_event(&line) {
                self.cache.apply(&event);
                applied += 1;
            }
        }
        if applied > 0 {
            debug!(applied, offset = cursor.offset(), "applied live events");
        }
        applied
    }
}
