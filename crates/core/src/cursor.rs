// crates/core/src/cursor.rs
//! Byte-offset cursor for tailing the live server log.
//!
//! Tracks the read position into one log file so successive polls
//! return only the lines appended since the last read. Rotation (the
//! expected daily path changing) is handled by the ingestion loop,
//! which swaps the cursor for a fresh one; this type only deals with
//! growth and shrink of a single path.

use std::io;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::warn;

/// Tracks a byte offset into one log file for incremental reads.
pub struct LogCursor {
    path: PathBuf,
    offset: u64,
}

impl LogCursor {
    /// Create a cursor at the start of `path`. The first poll reads
    /// the whole file, which doubles as the startup replay of today's
    /// log.
    pub fn new(path: PathBuf) -> Self {
        Self { path, offset: 0 }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read all complete lines appended since the last poll.
    ///
    /// - Only lines terminated by `\n` are returned; an incomplete
    ///   trailing line is left for the next poll.
    /// - If the file has shrunk below the cursor (truncated or
    ///   replaced), the offset jumps to the new end of file and
    ///   nothing is returned for this poll. Re-reading from 0 would
    ///   re-deliver content that cannot be told apart from what was
    ///   already processed, so the skipped bytes are dropped instead.
    pub async fn read_new_lines(&mut self) -> io::Result<Vec<String>> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        let file_len = file.metadata().await?.len();

        if file_len < self.offset {
            warn!(
                path = %self.path.display(),
                old_offset = self.offset,
                new_len = file_len,
                "live log shrank; skipping to new end"
            );
            self.offset = file_len;
            return Ok(Vec::new());
        }

        if file_len == self.offset {
            return Ok(Vec::new());
        }

        file.seek(io::SeekFrom::Start(self.offset)).await?;
        let mut buf = Vec::with_capacity((file_len - self.offset) as usize);
        file.read_to_end(&mut buf).await?;

        // Everything up to and including the last newline is complete.
        let complete = match buf.iter().rposition(|&b| b == b'\n') {
            Some(pos) => &buf[..=pos],
            None => return Ok(Vec::new()),
        };

        self.offset += complete.len() as u64;

        Ok(complete
            .split(|&b| b == b'\n')
            .filter(|line| !line.is_empty())
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn reads_only_appended_lines() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "one").unwrap();
        writeln!(f, "two").unwrap();
        f.flush().unwrap();

        let mut cursor = LogCursor::new(f.path().to_path_buf());
        assert_eq!(cursor.read_new_lines().await.unwrap(), vec!["one", "two"]);
        assert!(cursor.read_new_lines().await.unwrap().is_empty());

        writeln!(f, "three").unwrap();
        f.flush().unwrap();
        assert_eq!(cursor.read_new_lines().await.unwrap(), vec!["three"]);
    }

    #[tokio::test]
    async fn incomplete_trailing_line_waits_for_newline() {
        let mut f = NamedTempFile::new().unwrap();
        write!(f, "complete\npartial").unwrap();
        f.flush().unwrap();

        let mut cursor = LogCursor::new(f.path().to_path_buf());
        assert_eq!(cursor.read_new_lines().await.unwrap(), vec!["complete"]);

        writeln!(f, " now done").unwrap();
        f.flush().unwrap();
        assert_eq!(
            cursor.read_new_lines().await.unwrap(),
            vec!["partial now done"]
        );
    }

    #[tokio::test]
    async fn shrink_jumps_to_new_end_without_redelivery() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("20240101");
        tokio::fs::write(&path, "a\nb\nc\n").await.unwrap();

        let mut cursor = LogCursor::new(path.clone());
        assert_eq!(cursor.read_new_lines().await.unwrap().len(), 3);

        // File replaced with a smaller one: nothing re-read, offset at
        // the new end so later appends are picked up.
        tokio::fs::write(&path, "x\n").await.unwrap();
        assert!(cursor.read_new_lines().await.unwrap().is_empty());
        assert_eq!(cursor.offset(), 2);

        let mut f = std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap();
        writeln!(f, "fresh").unwrap();
        assert_eq!(cursor.read_new_lines().await.unwrap(), vec!["fresh"]);
    }

    #[tokio::test]
    async fn missing_file_surfaces_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut cursor = LogCursor::new(dir.path().join("20991231"));
        let err = cursor.read_new_lines().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
