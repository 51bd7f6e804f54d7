use std::time::Duration;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

use crate::error::{Result, TelesinkError};

/// Current time at the millisecond precision records are stored with.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// RFC 3339 with millisecond precision and a `Z` suffix.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_ts(input: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(input.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| TelesinkError::Parse(format!("invalid timestamp {input}: {e}")))
}

pub fn parse_duration_str(input: &str) -> Result<Duration> {
    humantime::parse_duration(input)
        .map_err(|e| TelesinkError::Parse(format!("invalid duration {input}: {e}")))
}
