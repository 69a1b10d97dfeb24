// crates/core/src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while enumerating historical log files.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("server_logs directory not found: {path}")]
    LogsDirNotFound { path: PathBuf },

    #[error("permission denied reading log directory: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("IO error scanning {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DiscoveryError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::LogsDirNotFound { path },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source },
        }
    }
}

/// Errors that can occur while replaying historical logs into the cache.
#[derive(Debug, Error)]
pub enum BackfillError {
    #[error("unparseable date hint: {hint:?}")]
    InvalidDateHint { hint: String },

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("IO error replaying {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_error_io_classification() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = DiscoveryError::io("/spool/server_logs", io_err);
        assert!(matches!(err, DiscoveryError::LogsDirNotFound { .. }));

        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = DiscoveryError::io("/spool/server_logs", io_err);
        assert!(matches!(err, DiscoveryError::PermissionDenied { .. }));

        let io_err = std::io::Error::new(std::io::ErrorKind::TimedOut, "timeout");
        let err = DiscoveryError::io("/spool/server_logs", io_err);
        assert!(matches!(err, DiscoveryError::Io { .. }));
    }

    #[test]
    fn backfill_error_display_names_the_hint() {
        let err = BackfillError::InvalidDateHint {
            hint: "not-a-date".into(),
        };
        assert!(err.to_string().contains("not-a-date"));
    }
}
