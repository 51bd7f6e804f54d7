use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

pub const FAKE_SPREADSHEET_ID: &str = "fake-spreadsheet";
pub const FAKE_WORKSHEET: &str = "Sheet1";

#[derive(Default)]
struct FakeState {
    rows: Vec<Vec<Value>>,
    fail_writes: bool,
    write_calls: usize,
}

type Shared = Arc<Mutex<FakeState>>;
type Reply = (StatusCode, Json<Value>);

/// In-process stand-in for the Sheets and Drive APIs, one worksheet.
pub struct FakeSheets {
    pub base_url: String,
    state: Shared,
    task: JoinHandle<()>,
}

impl FakeSheets {
    pub async fn spawn() -> anyhow::Result<Self> {
        let state = Shared::default();
        let app = Router::new()
            .route("/drive/v3/files", get(list_files))
            .route(
                "/v4/spreadsheets/{id}",
                get(spreadsheet_meta).post(batch_update),
            )
            .route(
                "/v4/spreadsheets/{id}/values/{range}",
                get(read_values).put(write_values).post(append_values),
            )
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            state,
            task,
        })
    }

    pub fn rows(&self) -> Vec<Vec<Value>> {
        self.state.lock().unwrap().rows.clone()
    }

    pub fn set_rows(&self, rows: Vec<Vec<Value>>) {
        self.state.lock().unwrap().rows = rows;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    pub fn write_calls(&self) -> usize {
        self.state.lock().unwrap().write_calls
    }
}

impl Drop for FakeSheets {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn authorized(headers: &HeaderMap) -> Result<(), Reply> {
    let ok = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer "));
    if ok {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"message": "missing bearer token"}})),
        ))
    }
}

fn begin_write(state: &Shared) -> Result<std::sync::MutexGuard<'_, FakeState>, Reply> {
    let mut guard = state.lock().unwrap();
    guard.write_calls += 1;
    if guard.fail_writes {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": {"message": "backend unavailable"}})),
        ));
    }
    Ok(guard)
}

/// `Sheet1!A2` -> Some(1), `Sheet1!1:1` -> Some(0), `Sheet1` -> None.
fn start_row(range: &str) -> Option<usize> {
    let (_, cells) = range.split_once('!')?;
    let digits = cells
        .trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .chars()
        .take_while(char::is_ascii_digit)
        .collect::<String>();
    digits.parse::<usize>().ok().map(|n| n.saturating_sub(1))
}

async fn list_files(headers: HeaderMap) -> Reply {
    if let Err(reply) = authorized(&headers) {
        return reply;
    }
    (
        StatusCode::OK,
        Json(json!({"files": [{"id": FAKE_SPREADSHEET_ID, "name": "Telemetry"}]})),
    )
}

async fn spreadsheet_meta(headers: HeaderMap, Path(id): Path<String>) -> Reply {
    if let Err(reply) = authorized(&headers) {
        return reply;
    }
    if id != FAKE_SPREADSHEET_ID {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": {"message": "no such spreadsheet"}})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"sheets": [{"properties": {"sheetId": 0, "title": FAKE_WORKSHEET, "index": 0}}]})),
    )
}

async fn batch_update(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    if let Err(reply) = authorized(&headers) {
        return reply;
    }
    let mut guard = match begin_write(&state) {
        Ok(guard) => guard,
        Err(reply) => return reply,
    };
    for request in body["requests"].as_array().cloned().unwrap_or_default() {
        let range = &request["insertDimension"]["range"];
        let start = range["startIndex"].as_u64().unwrap_or(0) as usize;
        let end = range["endIndex"].as_u64().unwrap_or(0) as usize;
        for _ in start..end {
            let at = start.min(guard.rows.len());
            guard.rows.insert(at, Vec::new());
        }
    }
    (StatusCode::OK, Json(json!({"replies": []})))
}

async fn read_values(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path((_id, range)): Path<(String, String)>,
) -> Reply {
    if let Err(reply) = authorized(&headers) {
        return reply;
    }
    let guard = state.lock().unwrap();
    let rows = if range.ends_with("!1:1") {
        guard.rows.iter().take(1).cloned().collect::<Vec<_>>()
    } else {
        guard.rows.clone()
    };
    if rows.is_empty() {
        return (StatusCode::OK, Json(json!({"range": range, "majorDimension": "ROWS"})));
    }
    (
        StatusCode::OK,
        Json(json!({"range": range, "majorDimension": "ROWS", "values": rows})),
    )
}

async fn write_values(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path((_id, range)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Reply {
    if let Err(reply) = authorized(&headers) {
        return reply;
    }
    let mut guard = match begin_write(&state) {
        Ok(guard) => guard,
        Err(reply) => return reply,
    };
    let start = start_row(&range).unwrap_or(0);
    let values = body["values"].as_array().cloned().unwrap_or_default();
    for (offset, row) in values.into_iter().enumerate() {
        let idx = start + offset;
        while guard.rows.len() <= idx {
            guard.rows.push(Vec::new());
        }
        guard.rows[idx] = row.as_array().cloned().unwrap_or_default();
    }
    (StatusCode::OK, Json(json!({"updatedRange": range})))
}

async fn append_values(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path((_id, range)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Reply {
    if let Err(reply) = authorized(&headers) {
        return reply;
    }
    if !range.ends_with(":append") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": {"message": "expected :append"}})),
        );
    }
    let mut guard = match begin_write(&state) {
        Ok(guard) => guard,
        Err(reply) => return reply,
    };
    for row in body["values"].as_array().cloned().unwrap_or_default() {
        guard.rows.push(row.as_array().cloned().unwrap_or_default());
    }
    (StatusCode::OK, Json(json!({"updates": {"updatedRange": range}})))
}
