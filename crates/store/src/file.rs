use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use telesink_core::error::{Result, TelesinkError};
use telesink_core::model::TelemetryRecord;
use tracing::warn;

/// Append-only JSON Lines file, one record per line.
#[derive(Clone)]
pub struct FileStore {
    path: Arc<PathBuf>,
    last_id: Arc<Mutex<u64>>,
}

impl FileStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| TelesinkError::Io(format!("failed to create data dir: {e}")))?;
        }

        let existing = if path.exists() {
            let raw = fs::read_to_string(path).map_err(|e| {
                TelesinkError::Io(format!("failed reading {}: {e}", path.display()))
            })?;
            raw.lines().filter(|l| !l.trim().is_empty()).count() as u64
        } else {
            0
        };

        Ok(Self {
            path: Arc::new(path.to_path_buf()),
            last_id: Arc::new(Mutex::new(existing)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs `op` on the blocking pool.
    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&FileStore) -> Result<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| TelesinkError::Internal(format!("file task failed: {e}")))?
    }

    pub async fn append(&self, record: TelemetryRecord) -> Result<TelemetryRecord> {
        self.blocking(move |store| store.append_blocking(record)).await
    }

    pub async fn read_all(&self) -> Result<Vec<TelemetryRecord>> {
        self.blocking(FileStore::read_all_blocking).await
    }

    pub async fn latest(&self) -> Result<Option<TelemetryRecord>> {
        Ok(self.read_all().await?.pop())
    }

    pub async fn history(&self, limit: usize) -> Result<Vec<TelemetryRecord>> {
        let mut all = self.read_all().await?;
        let skip = all.len().saturating_sub(limit);
        Ok(all.split_off(skip))
    }

    fn append_blocking(&self, mut record: TelemetryRecord) -> Result<TelemetryRecord> {
        let mut last_id = self.last_id.lock().expect("file store mutex poisoned");
        record.id = *last_id + 1;

        let mut line = serde_json::to_string(&record)
            .map_err(|e| TelesinkError::Internal(format!("encode record failed: {e}")))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path.as_path())
            .map_err(|e| {
                TelesinkError::Io(format!("failed to open {}: {e}", self.path.display()))
            })?;
        file.write_all(line.as_bytes())
            .map_err(|e| TelesinkError::Io(format!("failed to append record: {e}")))?;

        *last_id = record.id;
        Ok(record)
    }

    /// Every readable record in file order. Ids are line numbers.
    fn read_all_blocking(&self) -> Result<Vec<TelemetryRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(self.path.as_path()).map_err(|e| {
            TelesinkError::Io(format!("failed reading {}: {e}", self.path.display()))
        })?;

        let mut out = Vec::new();
        for (idx, line) in raw.lines().filter(|l| !l.trim().is_empty()).enumerate() {
            match serde_json::from_str::<TelemetryRecord>(line) {
                Ok(mut record) => {
                    record.id = idx as u64 + 1;
                    out.push(record);
                }
                Err(e) => warn!(line = idx + 1, error = %e, "skipping malformed data line"),
            }
        }
        Ok(out)
    }
}
