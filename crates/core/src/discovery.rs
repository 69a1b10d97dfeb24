// crates/core/src/discovery.rs
//! Spool-directory layout and historical log discovery.
//!
//! The batch server appends to `<spool>/server_logs/YYYYMMDD` and
//! rotates to a new file at midnight. Backfill needs the rotated
//! files whose modification time falls after a query's date hint,
//! ordered oldest to newest.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{Local, NaiveDate, NaiveDateTime, TimeZone};
use tracing::debug;

use crate::error::DiscoveryError;

/// Centralized construction of spool-relative log paths.
#[derive(Debug, Clone)]
pub struct SpoolPaths {
    spool_dir: PathBuf,
}

impl SpoolPaths {
    pub fn new(spool_dir: impl Into<PathBuf>) -> Self {
        Self {
            spool_dir: spool_dir.into(),
        }
    }

    /// `<spool>/server_logs`
    pub fn logs_dir(&self) -> PathBuf {
        self.spool_dir.join("server_logs")
    }

    /// `<spool>/server_logs/YYYYMMDD` for the given date.
    pub fn log_path_for(&self, date: NaiveDate) -> PathBuf {
        self.logs_dir().join(date.format("%Y%m%d").to_string())
    }

    /// The log file the server is writing right now.
    pub fn today_log_path(&self) -> PathBuf {
        self.log_path_for(Local::now().date_naive())
    }
}

/// Parse a query date hint into a point in time (local timezone).
///
/// Two forms are accepted, as in the original protocol: the 8-digit
/// `YYYYMMDD` (midnight) and the long `touch -t` form
/// `YYYYMMDDhhmm.SS`.
pub fn parse_date_hint(hint: &str) -> Option<SystemTime> {
    let naive = if hint.len() > 9 {
        let (stamp, secs) = hint.split_once('.').unwrap_or((hint, "0"));
        let minute = NaiveDateTime::parse_from_str(stamp, "%Y%m%d%H%M").ok()?;
        minute + chrono::Duration::seconds(secs.parse::<i64>().ok()?)
    } else {
        NaiveDate::parse_from_str(hint, "%Y%m%d")
            .ok()?
            .and_hms_opt(0, 0, 0)?
    };
    let local = Local.from_local_datetime(&naive).earliest()?;
    Some(SystemTime::from(local))
}

/// Enumerate log files under `logs_dir` with modification time
/// strictly after `newer_than` and, when a boundary is given, at or
/// before `not_newer_than`. Returned oldest to newest.
pub async fn find_logs_between(
    logs_dir: &Path,
    newer_than: SystemTime,
    not_newer_than: Option<SystemTime>,
) -> Result<Vec<PathBuf>, DiscoveryError> {
    let mut dir = tokio::fs::read_dir(logs_dir)
        .await
        .map_err(|e| DiscoveryError::io(logs_dir, e))?;

    let mut found: Vec<(SystemTime, PathBuf)> = Vec::new();
    while let Some(entry) = dir
        .next_entry()
        .await
        .map_err(|e| DiscoveryError::io(logs_dir, e))?
    {
        let meta = match entry.metadata().await {
            Ok(m) => m,
            // The writer may rotate files out from under us mid-scan.
            Err(e) => {
                debug!(path = %entry.path().display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !meta.is_file() {
            continue;
        }
        let mtime = meta.modified().map_err(|e| DiscoveryError::io(entry.path(), e))?;
        if mtime <= newer_than {
            continue;
        }
        if let Some(bound) = not_newer_than {
            if mtime > bound {
                continue;
            }
        }
        found.push((mtime, entry.path()));
    }

    found.sort();
    Ok(found.into_iter().map(|(_, path)| path).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn log_path_layout() {
        let paths = SpoolPaths::new("/var/spool/pbs");
        assert_eq!(
            paths.logs_dir(),
            PathBuf::from("/var/spool/pbs/server_logs")
        );
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(
            paths.log_path_for(date),
            PathBuf::from("/var/spool/pbs/server_logs/20240101")
        );
    }

    #[test]
    fn short_date_hint_parses() {
        let t = parse_date_hint("20240101").unwrap();
        assert!(t > UNIX_EPOCH);
        // Midnight of the next day is exactly 24h later (no DST on Jan 1/2
        // in any common zone, good enough for an ordering check).
        let next = parse_date_hint("20240102").unwrap();
        assert!(next > t);
    }

    #[test]
    fn long_date_hint_parses() {
        let base = parse_date_hint("200505130000.00").unwrap();
        let later = parse_date_hint("200505130001.30").unwrap();
        assert_eq!(
            later.duration_since(base).unwrap(),
            Duration::from_secs(90)
        );
    }

    #[test]
    fn garbage_date_hint_is_rejected() {
        assert!(parse_date_hint("").is_none());
        assert!(parse_date_hint("not-a-date").is_none());
        assert!(parse_date_hint("2024-01-01").is_none());
        assert!(parse_date_hint("20241301").is_none());
    }

    #[tokio::test]
    async fn finds_files_sorted_by_mtime() {
        let dir = tempfile::tempdir().unwrap();
        // Written in order, so mtimes are non-decreasing; paths chosen
        // so name order differs from mtime order.
        tokio::fs::write(dir.path().join("20240103"), "x\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        tokio::fs::write(dir.path().join("20240101"), "y\n").await.unwrap();

        let logs = find_logs_between(dir.path(), UNIX_EPOCH, None).await.unwrap();
        let names: Vec<_> = logs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["20240103", "20240101"]);
    }

    #[tokio::test]
    async fn excludes_files_outside_window() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("20240101"), "x\n").await.unwrap();

        // Lower bound in the future: nothing qualifies.
        let future = SystemTime::now() + Duration::from_secs(3600);
        let logs = find_logs_between(dir.path(), future, None).await.unwrap();
        assert!(logs.is_empty());

        // Upper bound in the past: nothing qualifies either.
        let logs = find_logs_between(dir.path(), UNIX_EPOCH, Some(UNIX_EPOCH))
            .await
            .unwrap();
        assert!(logs.is_empty());
    }

    #[tokio::test]
    async fn missing_dir_is_classified() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_logs_between(&dir.path().join("absent"), UNIX_EPOCH, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::LogsDirNotFound { .. }));
    }

    #[tokio::test]
    async fn subdirectories_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir(dir.path().join("archive")).await.unwrap();
        tokio::fs::write(dir.path().join("20240101"), "x\n").await.unwrap();

        let logs = find_logs_between(dir.path(), UNIX_EPOCH, None).await.unwrap();
        assert_eq!(logs.len(), 1);
    }
}
