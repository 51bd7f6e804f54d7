pub mod fake_sheets;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use telesink_core::model::{Payload, TelemetryRecord};

pub use fake_sheets::FakeSheets;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()
}

pub fn sample_payload(i: u64) -> Payload {
    let mut data = Payload::new();
    data.insert("temp".into(), json!(40 + i));
    data.insert("machine_id".into(), json!("press-7"));
    data.insert("ts".into(), json!(format!("2026-02-01T00:00:{:02}.000Z", i % 60)));
    data
}

/// Unsaved record `i` seconds after [`base_time`].
pub fn record_at(i: u64, path: &str) -> TelemetryRecord {
    TelemetryRecord::new(
        path,
        sample_payload(i),
        base_time() + Duration::seconds(i as i64),
    )
}
