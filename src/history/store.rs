use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use fd_lock::RwLock;
use tracing::info;

use crate::model::{ArtifactRead, BenchmarkRecord};
use crate::util::{ensure_directory, read_json_artifact, write_json_pretty};

/// Handle to one append-only benchmark history log.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Missing log reads as empty; a malformed one is an error.
    pub fn load(&self) -> Result<Vec<BenchmarkRecord>> {
        match read_json_artifact::<Vec<BenchmarkRecord>>(&self.path) {
            ArtifactRead::Loaded(records) => Ok(records),
            ArtifactRead::Missing => Ok(Vec::new()),
            ArtifactRead::Invalid { reason } => bail!("history log is unusable: {reason}"),
        }
    }

    /// Appends under an exclusive lock and replaces the log atomically.
    ///
    /// Existing entries are never rewritten. The new record lands after every entry
    /// whose timestamp is not later than its own, which is the end of the log unless
    /// a concurrent writer's clock ran ahead.
    pub fn append(&self, record: BenchmarkRecord) -> Result<usize> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_directory(parent)?;
        }

        let lock_path = self.lock_path();
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("failed to open lock file {}", lock_path.display()))?;
        let mut lock = RwLock::new(lock_file);
        let _guard = lock
            .write()
            .with_context(|| format!("failed to lock {}", lock_path.display()))?;

        let mut records = self.load()?;
        let previous_len = records.len();
        let position = records.partition_point(|existing| existing.timestamp <= record.timestamp);
        records.insert(position, record);

        write_json_pretty(&self.path, &records)?;
        info!(
            path = %self.path.display(),
            entries = records.len(),
            previous = previous_len,
            "appended benchmark history"
        );

        Ok(records.len())
    }
}
