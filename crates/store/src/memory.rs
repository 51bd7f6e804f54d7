use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use telesink_core::model::TelemetryRecord;

/// Process-local history, newest record first. Lost on restart.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    last_id: u64,
    records: VecDeque<TelemetryRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, mut record: TelemetryRecord) -> TelemetryRecord {
        let mut inner = self.inner.write().expect("memory store lock poisoned");
        inner.last_id += 1;
        record.id = inner.last_id;
        inner.records.push_front(record.clone());
        record
    }

    pub fn latest(&self) -> Option<TelemetryRecord> {
        let inner = self.inner.read().expect("memory store lock poisoned");
        inner.records.front().cloned()
    }

    pub fn history(&self, limit: usize) -> Vec<TelemetryRecord> {
        let inner = self.inner.read().expect("memory store lock poisoned");
        inner.records.iter().take(limit).cloned().collect()
    }

    /// Insertion order, oldest first.
    pub fn all(&self) -> Vec<TelemetryRecord> {
        let inner = self.inner.read().expect("memory store lock poisoned");
        inner.records.iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .expect("memory store lock poisoned")
            .records
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
