use duckdb::params;
use telesink_core::error::{Result, TelesinkError};
use telesink_core::model::TelemetryRecord;

use crate::db::DbStore;

impl DbStore {
    pub fn insert(&self, mut record: TelemetryRecord) -> Result<TelemetryRecord> {
        let data_json = serde_json::to_string(&record.data)
            .map_err(|e| TelesinkError::Internal(format!("encode payload failed: {e}")))?;

        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .map_err(|e| TelesinkError::Store(format!("begin tx failed: {e}")))?;

        let id = tx
            .query_row("SELECT nextval('telemetry_records_id_seq')", [], |row| {
                row.get::<_, i64>(0)
            })
            .map_err(|e| TelesinkError::Store(format!("allocate record id failed: {e}")))?;

        tx.execute(
            "INSERT INTO telemetry_records (id, received_at, path, data_json)
             VALUES (?, ?, ?, ?)",
            params![id, record.received_at.naive_utc(), record.path, data_json],
        )
        .map_err(|e| TelesinkError::Store(format!("insert record failed: {e}")))?;

        tx.commit()
            .map_err(|e| TelesinkError::Store(format!("commit record failed: {e}")))?;

        record.id = id as u64;
        Ok(record)
    }
}
