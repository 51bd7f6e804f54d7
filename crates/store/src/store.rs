use std::sync::Arc;

use serde::Serialize;
use telesink_core::config::{Config, SheetInsert};
use telesink_core::error::Result;
use telesink_core::model::{StorageKind, TelemetryRecord};
use tracing::error;

use crate::db::DbStore;
use crate::feed::{Feed, Subscription};
use crate::file::FileStore;
use crate::memory::MemoryStore;
use crate::sheet::SheetStore;

/// Order `history` returns records in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryOrder {
    NewestFirst,
    InsertionOrder,
}

#[derive(Clone)]
enum Backend {
    File(FileStore),
    Memory(MemoryStore),
    Database(DbStore),
    Sheet(SheetStore),
}

/// Handle to the active storage adapter plus the live feed of new records.
#[derive(Clone)]
pub struct Store {
    backend: Backend,
    feed: Feed,
    writes: Arc<tokio::sync::Mutex<()>>,
}

impl Store {
    pub fn open(cfg: &Config) -> Result<Self> {
        let backend = match cfg.storage {
            StorageKind::File => Backend::File(FileStore::open(&cfg.data_file)?),
            StorageKind::Memory => Backend::Memory(MemoryStore::new()),
            StorageKind::Database => Backend::Database(DbStore::open(&cfg.database_url)?),
            StorageKind::Sheet => Backend::Sheet(SheetStore::from_config(cfg)?),
        };
        Ok(Self {
            backend,
            feed: Feed::new(cfg.feed_backlog),
            writes: Arc::default(),
        })
    }

    pub fn memory() -> Self {
        Self::with_backend(Backend::Memory(MemoryStore::new()))
    }

    pub fn file(store: FileStore) -> Self {
        Self::with_backend(Backend::File(store))
    }

    pub fn database(store: DbStore) -> Self {
        Self::with_backend(Backend::Database(store))
    }

    pub fn sheet(store: SheetStore) -> Self {
        Self::with_backend(Backend::Sheet(store))
    }

    fn with_backend(backend: Backend) -> Self {
        Self {
            backend,
            feed: Feed::new(Config::default().feed_backlog),
            writes: Arc::default(),
        }
    }

    pub fn kind(&self) -> StorageKind {
        match &self.backend {
            Backend::File(_) => StorageKind::File,
            Backend::Memory(_) => StorageKind::Memory,
            Backend::Database(_) => StorageKind::Database,
            Backend::Sheet(_) => StorageKind::Sheet,
        }
    }

    pub fn order(&self) -> HistoryOrder {
        match &self.backend {
            Backend::Memory(_) => HistoryOrder::NewestFirst,
            Backend::Sheet(s) if s.insert_mode() == SheetInsert::Top => HistoryOrder::NewestFirst,
            _ => HistoryOrder::InsertionOrder,
        }
    }

    pub fn is_buffered(&self) -> bool {
        matches!(&self.backend, Backend::Sheet(s) if s.is_buffered())
    }

    pub fn feed(&self) -> &Feed {
        &self.feed
    }

    pub fn subscribe(&self, last_seen: Option<u64>) -> Subscription {
        self.feed.subscribe(last_seen)
    }

    /// Persists the record, then publishes it to subscribers. Writes are
    /// serialized so feed sequence order matches record id order.
    pub async fn append(&self, record: TelemetryRecord) -> Result<TelemetryRecord> {
        let _write = self.writes.lock().await;
        let stored = match &self.backend {
            Backend::File(s) => s.append(record).await,
            Backend::Memory(s) => Ok(s.append(record)),
            Backend::Database(s) => s.insert(record),
            Backend::Sheet(s) => s.append(record).await,
        };
        let stored = stored.inspect_err(|e| {
            error!(storage = %self.kind(), error = %e, "failed to store record");
        })?;
        self.feed.publish(stored.clone());
        Ok(stored)
    }

    pub async fn latest(&self) -> Result<Option<TelemetryRecord>> {
        match &self.backend {
            Backend::File(s) => s.latest().await,
            Backend::Memory(s) => Ok(s.latest()),
            Backend::Database(s) => s.latest(),
            Backend::Sheet(s) => Ok(s.all().await?.pop()),
        }
    }

    /// At most `limit` of the most recent records, in [`Store::order`].
    pub async fn history(&self, limit: usize) -> Result<Vec<TelemetryRecord>> {
        match &self.backend {
            Backend::File(s) => s.history(limit).await,
            Backend::Memory(s) => Ok(s.history(limit)),
            Backend::Database(s) => s.history(limit),
            Backend::Sheet(s) => {
                let mut all = s.all().await?;
                let skip = all.len().saturating_sub(limit);
                let mut recent = all.split_off(skip);
                if s.insert_mode() == SheetInsert::Top {
                    recent.reverse();
                }
                Ok(recent)
            }
        }
    }

    /// Every record, oldest first.
    pub async fn export_rows(&self) -> Result<Vec<TelemetryRecord>> {
        match &self.backend {
            Backend::File(s) => s.read_all().await,
            Backend::Memory(s) => Ok(s.all()),
            Backend::Database(s) => s.all(),
            Backend::Sheet(s) => s.all().await,
        }
    }

    pub async fn count(&self) -> Result<usize> {
        match &self.backend {
            Backend::File(s) => Ok(s.read_all().await?.len()),
            Backend::Memory(s) => Ok(s.len()),
            Backend::Database(s) => s.count(),
            Backend::Sheet(s) => Ok(s.all().await?.len()),
        }
    }

    /// Records queued for the next flush.
    pub fn pending_len(&self) -> usize {
        match &self.backend {
            Backend::Sheet(s) => s.pending_len(),
            _ => 0,
        }
    }

    /// Writes queued spreadsheet rows; a no-op for unbuffered adapters.
    pub async fn flush_pending(&self) -> Result<usize> {
        match &self.backend {
            Backend::Sheet(s) if s.is_buffered() => s.flush_pending().await,
            _ => Ok(0),
        }
    }
}
