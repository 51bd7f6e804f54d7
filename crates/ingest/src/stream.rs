use std::convert::Infallible;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use telesink_store::FeedEvent;

use crate::state::AppState;

pub const RECORD_EVENT: &str = "record";

fn last_event_id(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("last-event-id")?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn to_event(event: &FeedEvent) -> Result<Event, axum::Error> {
    Event::default()
        .event(RECORD_EVENT)
        .id(event.seq.to_string())
        .json_data(&event.record)
}

/// `GET /api/stream`: replays what the client missed, then follows the feed.
pub async fn stream(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let last_seen = last_event_id(&headers);
    let mut subscription = state.store.subscribe(last_seen);
    tracing::debug!(
        ?last_seen,
        subscribers = state.store.feed().subscriber_count(),
        "stream client connected"
    );

    let events = async_stream::stream! {
        while let Some(event) = subscription.next().await {
            match to_event(&event) {
                Ok(frame) => yield Ok::<_, Infallible>(frame),
                Err(e) => tracing::warn!(seq = event.seq, error = %e, "dropping unencodable record"),
            }
        }
    };

    Sse::new(events).keep_alive(KeepAlive::new().interval(state.settings.stream_keepalive))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn reads_numeric_last_event_id() {
        let mut headers = HeaderMap::new();
        assert_eq!(last_event_id(&headers), None);
        headers.insert("last-event-id", HeaderValue::from_static(" 12 "));
        assert_eq!(last_event_id(&headers), Some(12));
        headers.insert("last-event-id", HeaderValue::from_static("abc"));
        assert_eq!(last_event_id(&headers), None);
    }
}
