use serde_json::Value;
use telesink_core::model::{Payload, TelemetryRecord};
use telesink_core::time::{format_ts, parse_ts};
use tracing::warn;

use super::api::cell_text;

pub const RECEIVED_AT_COLUMN: &str = "received_at";
pub const PATH_COLUMN: &str = "path";

/// Header for a fresh worksheet: receipt columns, then the record's keys.
pub fn header_for(record: &TelemetryRecord) -> Vec<String> {
    let mut header = vec![RECEIVED_AT_COLUMN.to_string(), PATH_COLUMN.to_string()];
    header.extend(
        record
            .data
            .keys()
            .filter(|k| k.as_str() != RECEIVED_AT_COLUMN && k.as_str() != PATH_COLUMN)
            .cloned(),
    );
    header
}

/// Lays a record out in header order. Keys outside the header are dropped.
pub fn row_for(header: &[String], record: &TelemetryRecord) -> Vec<Value> {
    header
        .iter()
        .map(|column| match column.as_str() {
            RECEIVED_AT_COLUMN => Value::String(format_ts(record.received_at)),
            PATH_COLUMN => Value::String(record.path.clone()),
            key => record.data.get(key).map(cell_value).unwrap_or_default(),
        })
        .map(|v| if v.is_null() { Value::String(String::new()) } else { v })
        .collect()
}

fn cell_value(value: &Value) -> Value {
    match value {
        Value::Object(_) | Value::Array(_) => Value::String(value.to_string()),
        other => other.clone(),
    }
}

/// Maps a worksheet row back to a record. Rows without a readable
/// `received_at` are skipped.
pub fn record_from_row(header: &[String], row: &[Value], id: u64) -> Option<TelemetryRecord> {
    let mut received_at = None;
    let mut path = "/".to_string();
    let mut data = Payload::new();

    for (column, cell) in header.iter().zip(row.iter()) {
        match column.as_str() {
            RECEIVED_AT_COLUMN => received_at = parse_ts(&cell_text(cell)).ok(),
            PATH_COLUMN => path = cell_text(cell),
            key if key.is_empty() => {}
            key => {
                if matches!(cell, Value::String(s) if s.is_empty()) || cell.is_null() {
                    continue;
                }
                data.insert(key.to_string(), cell.clone());
            }
        }
    }

    let Some(received_at) = received_at else {
        warn!(row = id, "skipping worksheet row without received_at");
        return None;
    };
    Some(TelemetryRecord {
        id,
        received_at,
        path,
        data,
    })
}
