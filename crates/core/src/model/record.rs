use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, TelesinkError};
use crate::time::format_ts;

/// Client payload: arbitrary JSON object keys.
pub type Payload = Map<String, Value>;

pub const MACHINE_ID_KEY: &str = "machine_id";
pub const TS_KEY: &str = "ts";

/// A stored telemetry record. Immutable once the store hands it back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryRecord {
    #[serde(default)]
    pub id: u64,
    pub received_at: DateTime<Utc>,
    pub path: String,
    pub data: Payload,
}

impl TelemetryRecord {
    /// Builds an unsaved record; the store assigns `id` on append.
    pub fn new(path: impl Into<String>, data: Payload, received_at: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            received_at,
            path: normalize_path(&path.into()),
            data,
        }
    }

    pub fn machine_id(&self) -> Option<&str> {
        self.data.get(MACHINE_ID_KEY).and_then(Value::as_str)
    }
}

/// Fills `machine_id` and `ts` when the client left them out.
pub fn apply_defaults(data: &mut Payload, machine_id: &str, received_at: DateTime<Utc>) {
    if !data.contains_key(MACHINE_ID_KEY) {
        data.insert(
            MACHINE_ID_KEY.to_string(),
            Value::String(machine_id.to_string()),
        );
    }
    if !data.contains_key(TS_KEY) {
        data.insert(TS_KEY.to_string(), Value::String(format_ts(received_at)));
    }
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    File,
    Memory,
    Database,
    Sheet,
}

impl StorageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Memory => "memory",
            Self::Database => "database",
            Self::Sheet => "sheet",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageKind {
    type Err = TelesinkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" | "jsonl" => Ok(Self::File),
            "memory" | "mem" => Ok(Self::Memory),
            "database" | "db" | "duckdb" | "sql" => Ok(Self::Database),
            "sheet" | "sheets" | "spreadsheet" => Ok(Self::Sheet),
            other => Err(TelesinkError::Parse(format!("unknown storage kind: {other}"))),
        }
    }
}
