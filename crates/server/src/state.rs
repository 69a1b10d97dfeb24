// crates/server/src/state.rs
//! Application state shared by every query worker.

use std::sync::Arc;

use jobwatch_core::{Backfill, SpoolPaths, StatusCache};

use crate::config::Config;

/// Everything a worker needs to answer a query: the live cache, the
/// historical replayer, and the retry configuration. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<StatusCache>,
    pub backfill: Arc<Backfill>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let cache = Arc::new(StatusCache::new());
        let paths = SpoolPaths::new(config.spool_dir.clone());
        let backfill = Arc::new(Backfill::new(paths, cache.clone()));
        Self {
            cache,
            backfill,
            config: Arc::new(config),
        }
    }
}
