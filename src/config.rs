use std::path::PathBuf;

use crate::extract::{Extractor, DEFAULT_PERCENT_TOLERANCE};
use crate::share::FsSnapshotStore;

/// Default number of days a shared snapshot stays resolvable.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

#[derive(Clone, Debug)]
pub struct Config {
    /// Directory holding shared snapshots.
    pub store_dir: PathBuf,
    /// Page that share links point at; the snapshot id is appended as a
    /// `benchmark` query parameter.
    pub share_base_url: String,
    pub retention_days: u32,
    /// Allowed drift (percentage points) between logged threshold
    /// percentages and `frames / samples`.
    pub percent_tolerance: f64,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from(".fps-log-analyzer/snapshots"),
            share_base_url: "http://localhost:8080/".to_string(),
            retention_days: DEFAULT_RETENTION_DAYS,
            percent_tolerance: DEFAULT_PERCENT_TOLERANCE,
            request_timeout_secs: 30,
        }
    }
}

impl Config {
    pub fn extractor(&self) -> Extractor {
        Extractor::new(self.percent_tolerance)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }

    pub fn snapshot_store(&self) -> FsSnapshotStore {
        FsSnapshotStore::new(&self.store_dir, self.retention())
    }
}
