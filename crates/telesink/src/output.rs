use std::io::IsTerminal;

use chrono::SecondsFormat;
use owo_colors::OwoColorize;
use serde_json::Value;
use telesink_core::model::record::{MACHINE_ID_KEY, TS_KEY};
use telesink_core::model::{Payload, TelemetryRecord};

/// `key=value` pairs in map order. Client-stamped fields are left out.
pub fn data_summary(data: &Payload) -> String {
    data.iter()
        .filter(|(k, _)| k.as_str() != MACHINE_ID_KEY && k.as_str() != TS_KEY)
        .map(|(k, v)| match v {
            Value::String(s) => format!("{k}={s}"),
            other => format!("{k}={other}"),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn record_line(record: &TelemetryRecord, color: bool) -> String {
    let ts = record
        .received_at
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    let machine = record.machine_id().unwrap_or("-");
    let summary = data_summary(&record.data);
    if color {
        format!(
            "{} {} {} #{} | {}",
            ts.bright_black(),
            machine.yellow(),
            record.path.cyan(),
            record.id,
            summary
        )
    } else {
        format!("{ts} {machine} {} #{} | {summary}", record.path, record.id)
    }
}

pub fn print_record(record: &TelemetryRecord) {
    println!("{}", record_line(record, std::io::stdout().is_terminal()));
}

pub fn print_payload_human(data: &Payload) {
    let width = data.keys().map(String::len).max().unwrap_or(0);
    for (key, value) in data {
        let value = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        println!("{key:<width$}  {value}");
    }
}

/// Prints what `send` got back: the wrapped entry for legacy paths, the
/// bare payload for `/api/data`.
pub fn print_send_result(body: &Value) {
    match body.get("entry") {
        Some(entry) => match serde_json::from_value::<TelemetryRecord>(entry.clone()) {
            Ok(record) => print_record(&record),
            Err(_) => println!("{entry}"),
        },
        None => match body.as_object() {
            Some(data) => println!("stored | {}", data_summary(data)),
            None => println!("{body}"),
        },
    }
}
