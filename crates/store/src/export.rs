use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use telesink_core::error::{Result, TelesinkError};
use telesink_core::model::{Payload, TelemetryRecord};

pub const CSV_HEADER: [&str; 4] = ["id", "received_at", "path", "data"];

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    id: u64,
    received_at: DateTime<Utc>,
    path: String,
    data: String,
}

pub fn to_json(records: &[TelemetryRecord]) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(records)
        .map_err(|e| TelesinkError::Internal(format!("json export failed: {e}")))
}

/// `id,received_at,path,data` with `data` as compact JSON text.
pub fn to_csv(records: &[TelemetryRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if records.is_empty() {
        writer
            .write_record(CSV_HEADER)
            .map_err(|e| TelesinkError::Internal(format!("csv export failed: {e}")))?;
    }
    for record in records {
        let data = serde_json::to_string(&record.data)
            .map_err(|e| TelesinkError::Internal(format!("csv export failed: {e}")))?;
        writer
            .serialize(CsvRow {
                id: record.id,
                received_at: record.received_at,
                path: record.path.clone(),
                data,
            })
            .map_err(|e| TelesinkError::Internal(format!("csv export failed: {e}")))?;
    }
    writer
        .into_inner()
        .map_err(|e| TelesinkError::Internal(format!("csv export failed: {e}")))
}

pub fn from_csv(bytes: &[u8]) -> Result<Vec<TelemetryRecord>> {
    let mut reader = csv::Reader::from_reader(bytes);
    reader
        .deserialize::<CsvRow>()
        .map(|row| {
            let row = row.map_err(|e| TelesinkError::Parse(format!("bad csv row: {e}")))?;
            let data: Payload = serde_json::from_str(&row.data)
                .map_err(|e| TelesinkError::Parse(format!("bad data column: {e}")))?;
            Ok(TelemetryRecord {
                id: row.id,
                received_at: row.received_at,
                path: row.path,
                data,
            })
        })
        .collect()
}
