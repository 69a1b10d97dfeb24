// crates/server/src/config.rs
//! Process-wide configuration, resolved once at startup.

use std::path::PathBuf;
use std::time::Duration;

/// Default listening port of the lookup daemon.
pub const DEFAULT_PORT: u16 = 33332;

/// Environment variable naming the batch server's spool directory,
/// consulted when no spool dir is given on the command line.
pub const SPOOL_DIR_ENV: &str = "PBS_SPOOL_DIR";

/// Spool directory used when neither the CLI nor the environment
/// provides one.
pub const DEFAULT_SPOOL_DIR: &str = "/usr/spool/PBS";

/// Immutable daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port to listen on.
    pub port: u16,
    /// Batch server spool directory (logs live in `<spool>/server_logs`).
    pub spool_dir: PathBuf,
    /// Number of connection-handling worker tasks.
    pub workers: usize,
    /// Attempts a query makes against a busy cache before giving up.
    pub retry_budget: u32,
    /// Delay between query retry attempts.
    pub retry_interval: Duration,
    /// Idle delay of the ingestion loop between polls.
    pub poll_interval: Duration,
    /// Per-connection read/write deadline.
    pub io_timeout: Duration,
    /// Capacity of the ingestion line ring.
    pub buffer_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            spool_dir: PathBuf::from(DEFAULT_SPOOL_DIR),
            workers: 8,
            retry_budget: 10,
            retry_interval: Duration::from_secs(1),
            poll_interval: Duration::from_secs(1),
            io_timeout: Duration::from_secs(30),
            buffer_capacity: 4096,
        }
    }
}

/// Resolve the spool directory: CLI flag, then `PBS_SPOOL_DIR`, then
/// the built-in default.
pub fn resolve_spool_dir(cli: Option<PathBuf>) -> PathBuf {
    cli.or_else(|| std::env::var_os(SPOOL_DIR_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SPOOL_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_value_wins() {
        let dir = resolve_spool_dir(Some(PathBuf::from("/custom/spool")));
        assert_eq!(dir, PathBuf::from("/custom/spool"));
    }

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.workers > 0);
        assert!(config.retry_budget > 0);
    }
}
