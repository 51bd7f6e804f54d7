pub mod api;
pub mod auth;
pub mod layout;

use std::sync::{Arc, Mutex};

use telesink_core::config::{Config, SheetInsert};
use telesink_core::error::Result;
use telesink_core::model::TelemetryRecord;

pub use api::{SheetTarget, SheetsClient, SheetsEndpoints};
pub use auth::Credentials;

use crate::sheet::api::cell_text;
use crate::sheet::layout::{header_for, record_from_row, row_for};

/// Google Sheets worksheet as a record store.
///
/// With buffering on, `append` only queues; `flush_pending` performs the
/// write for everything queued since the last flush.
#[derive(Clone)]
pub struct SheetStore {
    inner: Arc<SheetInner>,
}

struct SheetInner {
    client: SheetsClient,
    insert: SheetInsert,
    buffered: bool,
    state: tokio::sync::Mutex<SheetState>,
    pending: Mutex<Vec<TelemetryRecord>>,
}

#[derive(Default)]
struct SheetState {
    loaded: bool,
    header: Vec<String>,
    rows: u64,
}

impl SheetStore {
    pub fn new(client: SheetsClient, insert: SheetInsert, buffered: bool) -> Self {
        Self {
            inner: Arc::new(SheetInner {
                client,
                insert,
                buffered,
                state: tokio::sync::Mutex::new(SheetState::default()),
                pending: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let credentials = Credentials::from_parts(
            cfg.sheet_credentials.as_deref(),
            cfg.sheet_access_token.as_deref(),
        )?;
        let client = SheetsClient::new(
            credentials,
            cfg.sheet_name.clone(),
            cfg.sheet_id.clone(),
            SheetsEndpoints::default(),
        );
        Ok(Self::new(client, cfg.sheet_insert, cfg.sheet_buffered))
    }

    pub fn insert_mode(&self) -> SheetInsert {
        self.inner.insert
    }

    pub fn is_buffered(&self) -> bool {
        self.inner.buffered
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, Vec<TelemetryRecord>> {
        self.inner.pending.lock().expect("sheet buffer mutex poisoned")
    }

    pub fn pending_len(&self) -> usize {
        self.pending().len()
    }

    async fn load(&self, state: &mut SheetState) -> Result<()> {
        if state.loaded {
            return Ok(());
        }
        let rows = self.inner.client.read_all().await?;
        state.header = rows
            .first()
            .map(|row| row.iter().map(cell_text).collect())
            .unwrap_or_default();
        state.rows = rows.len().saturating_sub(1) as u64;
        state.loaded = true;
        Ok(())
    }

    async fn ensure_header(&self, state: &mut SheetState, first: &TelemetryRecord) -> Result<()> {
        if state.header.iter().any(|c| !c.is_empty()) {
            return Ok(());
        }
        let header = header_for(first);
        self.inner.client.write_header(&header).await?;
        tracing::info!(columns = header.len(), "created worksheet header");
        state.header = header;
        Ok(())
    }

    pub async fn append(&self, mut record: TelemetryRecord) -> Result<TelemetryRecord> {
        let mut state = self.inner.state.lock().await;
        self.load(&mut state).await?;

        if self.inner.buffered {
            let mut pending = self.pending();
            record.id = state.rows + pending.len() as u64 + 1;
            pending.push(record.clone());
            return Ok(record);
        }

        record.id = state.rows + 1;
        self.ensure_header(&mut state, &record).await?;
        let row = row_for(&state.header, &record);
        match self.inner.insert {
            SheetInsert::Top => self.inner.client.insert_top(vec![row]).await?,
            SheetInsert::Append => self.inner.client.append(vec![row]).await?,
        }
        state.rows += 1;
        Ok(record)
    }

    /// Takes the queued batch and writes it in one pass. The queue is
    /// drained under the state lock so appends cannot reuse a queued id.
    /// A failed batch is not retried.
    pub async fn flush_pending(&self) -> Result<usize> {
        let mut state = self.inner.state.lock().await;
        let batch = std::mem::take(&mut *self.pending());
        if batch.is_empty() {
            return Ok(0);
        }
        self.load(&mut state).await?;
        self.ensure_header(&mut state, &batch[0]).await?;

        let mut rows = batch
            .iter()
            .map(|record| row_for(&state.header, record))
            .collect::<Vec<_>>();
        match self.inner.insert {
            SheetInsert::Top => {
                rows.reverse();
                self.inner.client.insert_top(rows).await?;
            }
            SheetInsert::Append => self.inner.client.append(rows).await?,
        }
        state.rows += batch.len() as u64;
        Ok(batch.len())
    }

    /// Worksheet rows followed by queued records, oldest first.
    pub async fn all(&self) -> Result<Vec<TelemetryRecord>> {
        let values = self.inner.client.read_all().await?;
        let mut rows = values.into_iter();
        let header = rows
            .next()
            .map(|row| row.iter().map(cell_text).collect::<Vec<_>>())
            .unwrap_or_default();

        let mut body = rows.collect::<Vec<_>>();
        if self.inner.insert == SheetInsert::Top {
            body.reverse();
        }

        let mut out = body
            .iter()
            .enumerate()
            .filter_map(|(idx, row)| record_from_row(&header, row, idx as u64 + 1))
            .collect::<Vec<_>>();

        let base = body.len() as u64;
        out.extend(
            self.pending()
                .iter()
                .enumerate()
                .map(|(idx, record)| TelemetryRecord {
                    id: base + idx as u64 + 1,
                    ..record.clone()
                }),
        );
        Ok(out)
    }
}
