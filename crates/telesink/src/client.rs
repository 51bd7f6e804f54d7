use anyhow::Context;
use reqwest::StatusCode;
use serde_json::Value;
use telesink_core::model::{Payload, TelemetryRecord};

pub const DEFAULT_ADDR: &str = "127.0.0.1:10000";

/// `host:port` or a full URL, without a trailing slash.
pub fn base_url(addr: &str) -> String {
    let addr = addr.trim_end_matches('/');
    if addr.starts_with("http://") || addr.starts_with("https://") {
        addr.to_string()
    } else {
        format!("http://{addr}")
    }
}

pub fn resolve_addr(flag: Option<String>) -> String {
    flag.or_else(|| std::env::var("TELESINK_ADDR").ok())
        .unwrap_or_else(|| DEFAULT_ADDR.to_string())
}

/// HTTP client for a running `telesink run`.
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    pub fn new(addr: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base_url(addr),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    /// Posts `payload` to `path` and returns the JSON the server answered with.
    pub async fn send(&self, path: &str, payload: &Payload) -> anyhow::Result<Value> {
        let url = self.url(path);
        let response = self
            .http
            .post(&url)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("post to {url}"))?;
        let status = response.status();
        let body: Value = response.json().await.context("decode server response")?;
        if !status.is_success() {
            anyhow::bail!("server answered {status}: {body}");
        }
        Ok(body)
    }

    /// Data map of the newest record, `None` while the store is empty.
    pub async fn latest(&self) -> anyhow::Result<Option<Payload>> {
        let url = self.url("/api/data");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("get {url}"))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status().context("latest request failed")?;
        Ok(Some(response.json().await.context("decode latest record")?))
    }

    /// Opens the event stream, resuming after `last_seen` when given.
    pub async fn stream(&self, last_seen: Option<u64>) -> anyhow::Result<reqwest::Response> {
        let url = self.url("/api/stream");
        let mut req = self.http.get(&url).header("accept", "text/event-stream");
        if let Some(seq) = last_seen {
            req = req.header("last-event-id", seq.to_string());
        }
        let response = req.send().await.with_context(|| format!("open {url}"))?;
        if !response.status().is_success() {
            anyhow::bail!("stream request failed with status {}", response.status());
        }
        Ok(response)
    }
}

/// One `record` event off the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub seq: u64,
    pub record: TelemetryRecord,
}

/// Drains complete frames from `buffer`, leaving any partial frame behind.
/// Frames are decoded whole, so a character split across network chunks
/// survives. Comments and frames that do not decode are skipped.
pub fn drain_frames(buffer: &mut Vec<u8>) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    while let Some(end) = buffer.windows(2).position(|w| w == b"\n\n") {
        let frame = buffer.drain(..end + 2).collect::<Vec<u8>>();
        let Ok(frame) = std::str::from_utf8(&frame[..end]) else {
            tracing::warn!("skipping stream frame that is not utf-8");
            continue;
        };

        let mut seq = None;
        let mut data = String::new();
        for line in frame.lines() {
            if let Some(v) = line.strip_prefix("id:") {
                seq = v.trim().parse().ok();
            } else if let Some(v) = line.strip_prefix("data:") {
                if !data.is_empty() {
                    data.push('\n');
                }
                data.push_str(v.strip_prefix(' ').unwrap_or(v));
            }
        }

        if let (Some(seq), Ok(record)) = (seq, serde_json::from_str(&data)) {
            events.push(StreamEvent { seq, record });
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_accepts_bare_addresses() {
        assert_eq!(base_url("127.0.0.1:10000"), "http://127.0.0.1:10000");
        assert_eq!(base_url("https://sink.example.com/"), "https://sink.example.com");
    }

    #[test]
    fn drain_frames_keeps_partial_tail() {
        let mut buffer = Vec::from(concat!(
            ":\n\n",
            "event: record\nid: 4\ndata: {\"id\":2,\"received_at\":\"2026-02-01T00:00:00Z\",\"path\":\"/\",\"data\":{\"temp\":1}}\n\n",
            "event: record\nid: 5\ndata: {\"id\":3",
        ).as_bytes());
        let events = drain_frames(&mut buffer);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].seq, 4);
        assert_eq!(events[0].record.id, 2);
        assert_eq!(events[0].record.data["temp"], 1);
        assert!(buffer.starts_with(b"event: record\nid: 5"));
    }

    #[test]
    fn multibyte_text_split_across_chunks_is_kept() {
        let frame = "event: record\nid: 9\ndata: {\"id\":1,\"received_at\":\"2026-02-01T00:00:00Z\",\"path\":\"/\",\"data\":{\"unit\":\"°C\"}}\n\n";
        let bytes = frame.as_bytes();
        let split = frame.find('°').unwrap() + 1;

        let mut buffer = Vec::new();
        buffer.extend_from_slice(&bytes[..split]);
        assert!(drain_frames(&mut buffer).is_empty());
        buffer.extend_from_slice(&bytes[split..]);

        let events = drain_frames(&mut buffer);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].record.data["unit"], "°C");
        assert!(buffer.is_empty());
    }
}
