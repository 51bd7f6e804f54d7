use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::{Connection, params};
use telesink_core::error::{Result, TelesinkError};
use telesink_core::model::{Payload, TelemetryRecord};

use crate::db::DbStore;

type RawRow = (i64, NaiveDateTime, String, String);

const SELECT_COLUMNS: &str = "SELECT id, received_at, path, data_json FROM telemetry_records";

impl DbStore {
    pub fn latest(&self) -> Result<Option<TelemetryRecord>> {
        let conn = self.conn();
        let rows = fetch_rows(&conn, &format!("{SELECT_COLUMNS} ORDER BY id DESC LIMIT 1"), None)?;
        Ok(rows.into_iter().next())
    }

    /// The `limit` most recent rows, in insertion order.
    pub fn history(&self, limit: usize) -> Result<Vec<TelemetryRecord>> {
        let conn = self.conn();
        fetch_rows(
            &conn,
            &format!(
                "SELECT * FROM ({SELECT_COLUMNS} ORDER BY id DESC LIMIT ?) ORDER BY id ASC"
            ),
            Some(limit as i64),
        )
    }

    pub fn all(&self) -> Result<Vec<TelemetryRecord>> {
        let conn = self.conn();
        fetch_rows(&conn, &format!("{SELECT_COLUMNS} ORDER BY id ASC"), None)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.conn();
        conn.query_row("SELECT COUNT(*) FROM telemetry_records", [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|v| v as usize)
        .map_err(|e| TelesinkError::Store(format!("query failed: {e}")))
    }
}

fn fetch_rows(conn: &Connection, sql: &str, limit: Option<i64>) -> Result<Vec<TelemetryRecord>> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| TelesinkError::Store(format!("prepare query failed: {e}")))?;

    let map_row = |row: &duckdb::Row<'_>| -> duckdb::Result<RawRow> {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, NaiveDateTime>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    };

    let raw = match limit {
        Some(limit) => stmt
            .query_map(params![limit], map_row)
            .and_then(|rows| rows.collect::<duckdb::Result<Vec<_>>>()),
        None => stmt
            .query_map([], map_row)
            .and_then(|rows| rows.collect::<duckdb::Result<Vec<_>>>()),
    }
    .map_err(|e| TelesinkError::Store(format!("query failed: {e}")))?;

    raw.into_iter().map(decode_row).collect()
}

fn decode_row((id, received_at, path, data_json): RawRow) -> Result<TelemetryRecord> {
    let data: Payload = serde_json::from_str(&data_json)
        .map_err(|e| TelesinkError::Store(format!("bad data_json in row {id}: {e}")))?;
    Ok(TelemetryRecord {
        id: id as u64,
        received_at: naive_to_utc(received_at),
        path,
        data,
    })
}

fn naive_to_utc(ts: NaiveDateTime) -> DateTime<Utc> {
    ts.and_utc()
}
