// crates/core/src/backfill.rs
//! On-demand replay of rotated server logs.
//!
//! When a query misses the live cache, the date hint it carried
//! bounds a scan of `server_logs/`: every file modified after the
//! hint and not after the most recently discovered log boundary is
//! replayed oldest to newest, so last-write-wins in the cache tracks
//! real chronology. The newest path seen is remembered across calls
//! to keep later scans from re-reading logs already folded in.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::cache::StatusCache;
use crate::discovery::{find_logs_between, parse_date_hint, SpoolPaths};
use crate::error::BackfillError;
use crate::event::{classify, parse_event};

/// Historical-log replayer. One per process, shared by all query
/// workers; the internal mutex serializes concurrent backfills so two
/// misses for the same cold job do not race each other through the
/// filesystem.
pub struct Backfill {
    paths: SpoolPaths,
    cache: Arc<StatusCache>,
    last_log: Mutex<Option<PathBuf>>,
}

impl Backfill {
    pub fn new(paths: SpoolPaths, cache: Arc<StatusCache>) -> Self {
        Self {
            paths,
            cache,
            last_log: Mutex::new(None),
        }
    }

    /// Replay logs modified after `date_hint` into the cache.
    ///
    /// Zero or one candidate file means there is nothing to do: a
    /// single candidate is the live log, already covered by the
    /// ingestion loop. Returns the number of events applied.
    pub async fn replay_since(&self, date_hint: &str) -> Result<usize, BackfillError> {
        let since = parse_date_hint(date_hint).ok_or_else(|| BackfillError::InvalidDateHint {
            hint: date_hint.to_string(),
        })?;

        // Held across the replay: backfills are serialized with each
        // other, and `last_log` is only advanced once the replay that
        // discovered it has completed.
        let mut last_log = self.last_log.lock().await;

        let boundary = match last_log.as_deref() {
            Some(path) => mtime_of(path).await,
            None => None,
        };

        let logs_dir = self.paths.logs_dir();
        let candidates = find_logs_between(&logs_dir, since, boundary).await?;
        debug!(
            date_hint,
            candidates = candidates.len(),
            "historical log discovery"
        );

        if let Some(newest) = candidates.last() {
            *last_log = Some(newest.clone());
        }
        if candidates.len() <= 1 {
            return Ok(0);
        }

        let mut applied = 0;
        for path in &candidates {
            applied += replay_file(&self.cache, path).await?;
        }
        info!(
            date_hint,
            files = candidates.len(),
            applied,
            "historical backfill complete"
        );
        Ok(applied)
    }
}

async fn mtime_of(path: &Path) -> Option<SystemTime> {
    // A vanished boundary file just widens the search window.
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}

/// Feed every matching line of one rotated log through the parser.
async fn replay_file(cache: &StatusCache, path: &Path) -> Result<usize, BackfillError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| BackfillError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
    let mut lines = BufReader::new(file).lines();

    let mut applied = 0;
    while let Some(line) = lines.next_line().await.map_err(|e| BackfillError::Io {
        path: path.to_path_buf(),
        source: e,
    })? {
        if classify(&line).is_none() {
            continue;
        }
        if let Some(event) = parse_event(&line) {
            cache.apply(&event);
            applied += 1;
        }
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobwatch_types::JobStatus;
    use std::time::Duration;

    async fn spool_with_logs(names_and_lines: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("server_logs");
        tokio::fs::create_dir(&logs).await.unwrap();
        for (name, content) in names_and_lines {
            tokio::fs::write(logs.join(name), content).await.unwrap();
            // Distinct mtimes in write order.
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        dir
    }

    #[tokio::test]
    async fn replays_old_logs_oldest_first() {
        let dir = spool_with_logs(&[
            (
                "20240101",
                "t;a;b;c;7.n;Job Queued at request of u@h, owner = u@h, job name = blahjob_q7, queue = q\n",
            ),
            ("20240102", "t;a;b;c;7.n;Job Run at request of root\n"),
        ])
        .await;

        let cache = Arc::new(StatusCache::new());
        let backfill = Backfill::new(SpoolPaths::new(dir.path()), cache.clone());
        let applied = backfill.replay_since("20200101").await.unwrap();
        assert_eq!(applied, 2);
        assert_eq!(cache.lookup(7).unwrap().status, JobStatus::Running);
        assert_eq!(cache.lookup_by_correlation("blahjob_q7"), Some(7));
    }

    #[tokio::test]
    async fn single_candidate_is_a_noop() {
        let dir = spool_with_logs(&[(
            "20240101",
            "t;a;b;c;7.n;Job Queued at request of u@h, owner = u@h, job name = blahjob_q7, queue = q\n",
        )])
        .await;

        let cache = Arc::new(StatusCache::new());
        let backfill = Backfill::new(SpoolPaths::new(dir.path()), cache.clone());
        assert_eq!(backfill.replay_since("20200101").await.unwrap(), 0);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn boundary_excludes_logs_newer_than_last_discovery() {
        let dir = spool_with_logs(&[
            ("20240101", "t;a;b;c;1.n;Job Queued at request of u, o = u, job name = a, queue = q\n"),
            ("20240102", "t;a;b;c;2.n;Job Queued at request of u, o = u, job name = b, queue = q\n"),
        ])
        .await;

        let cache = Arc::new(StatusCache::new());
        let backfill = Backfill::new(SpoolPaths::new(dir.path()), cache.clone());
        assert_eq!(backfill.replay_since("20200101").await.unwrap(), 2);

        // A file newer than the remembered boundary is outside the
        // window of a later search; only the two old logs re-qualify
        // and their replay is idempotent.
        let logs = dir.path().join("server_logs");
        tokio::time::sleep(Duration::from_millis(20)).await;
        tokio::fs::write(
            logs.join("20240103"),
            "t;a;b;c;3.n;Job Queued at request of u, o = u, job name = c, queue = q\n",
        )
        .await
        .unwrap();

        assert_eq!(backfill.replay_since("20200101").await.unwrap(), 2);
        assert_eq!(cache.len(), 2);
        assert!(cache.lookup(3).is_none());
    }

    #[tokio::test]
    async fn bad_date_hint_is_an_error() {
        let dir = spool_with_logs(&[]).await;
        let cache = Arc::new(StatusCache::new());
        let backfill = Backfill::new(SpoolPaths::new(dir.path()), cache);
        let err = backfill.replay_since("BOGUS").await.unwrap_err();
        assert!(matches!(err, BackfillError::InvalidDateHint { .. }));
    }

    #[tokio::test]
    async fn future_hint_finds_nothing() {
        let dir = spool_with_logs(&[("20240101", "x\n"), ("20240102", "y\n")]).await;
        let cache = Arc::new(StatusCache::new());
        let backfill = Backfill::new(SpoolPaths::new(dir.path()), cache);
        assert_eq!(backfill.replay_since("29990101").await.unwrap(), 0);
    }
}
