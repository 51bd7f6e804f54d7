use axum::Router;
use axum::http::Method;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Level;

use crate::error::not_found;
use crate::state::AppState;
use crate::{dashboard, export, ingest, query, stream, synth};

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);
    Router::new()
        .route("/", get(query::service_status).post(ingest::post_root))
        .route("/health", get(query::health).post(ingest::post_at_uri))
        .route("/process", post(ingest::post_process))
        .route("/api/data", get(query::latest).post(ingest::post_api_data))
        .route("/api/sensors", get(synth::sensors).post(ingest::post_at_uri))
        .route("/api/stream", get(stream::stream).post(ingest::post_at_uri))
        .route("/data", get(query::history).post(ingest::post_at_uri))
        .route(
            "/download/json",
            get(export::download_json).post(ingest::post_at_uri),
        )
        .route(
            "/download/csv",
            get(export::download_csv).post(ingest::post_at_uri),
        )
        .route(
            "/dashboard",
            get(dashboard::dashboard).post(ingest::post_at_uri),
        )
        .route("/{*path}", post(ingest::post_any))
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .on_request(tower_http::trace::DefaultOnRequest::new().level(Level::INFO))
                .on_response(tower_http::trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use axum::response::Response;
    use serde_json::{Value, json};
    use telesink_store::Store;
    use telesink_store::export::from_csv;
    use telesink_store::file::FileStore;
    use tower::ServiceExt;

    use super::*;
    use crate::state::HttpSettings;

    fn app() -> (Router, Store) {
        let store = Store::memory();
        let settings = HttpSettings {
            machine_id: "line-4".to_string(),
            history_limit: 3,
            ..HttpSettings::default()
        };
        (router(AppState::new(store.clone(), settings)), store)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: &str) -> Response {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        app.clone().oneshot(req).await.unwrap()
    }

    async fn json_body(resp: Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn root_reports_running() {
        let (app, _) = app();
        let resp = send(&app, "GET", "/", "").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            json_body(resp).await,
            json!({"message": "Service is running", "status": "ok"})
        );
    }

    #[tokio::test]
    async fn post_api_data_returns_created_payload_with_defaults() {
        let (app, store) = app();
        let resp = send(&app, "POST", "/api/data", r#"{"temp": 41.5}"#).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let body = json_body(resp).await;
        assert_eq!(body["temp"], json!(41.5));
        assert_eq!(body["machine_id"], "line-4");
        assert!(body["ts"].as_str().unwrap().ends_with('Z'));

        let stored = store.latest().await.unwrap().unwrap();
        assert_eq!(stored.path, "/api/data");
        assert_eq!(Value::Object(stored.data), body);
    }

    #[tokio::test]
    async fn client_fields_win_over_defaults() {
        let (app, _) = app();
        let resp = send(
            &app,
            "POST",
            "/api/data",
            r#"{"machine_id": "press-9", "ts": "2026-01-01T00:00:00Z"}"#,
        )
        .await;
        let body = json_body(resp).await;
        assert_eq!(body["machine_id"], "press-9");
        assert_eq!(body["ts"], "2026-01-01T00:00:00Z");
    }

    #[tokio::test]
    async fn legacy_paths_wrap_the_entry() {
        let (app, _) = app();
        for (uri, path) in [("/", "/"), ("/process", "/process"), ("/line/4/press", "/line/4/press")] {
            let resp = send(&app, "POST", uri, r#"{"rpm": 1200}"#).await;
            assert_eq!(resp.status(), StatusCode::OK, "{uri}");
            let body = json_body(resp).await;
            assert_eq!(body["message"], "Data stored successfully");
            assert_eq!(body["entry"]["path"], path);
            assert_eq!(body["entry"]["data"]["rpm"], 1200);
        }
    }

    #[tokio::test]
    async fn empty_body_is_stored_as_defaults_only() {
        let (app, store) = app();
        let resp = send(&app, "POST", "/process", "").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let stored = store.latest().await.unwrap().unwrap();
        assert_eq!(stored.data.len(), 2);
    }

    #[tokio::test]
    async fn non_object_body_is_rejected() {
        let (app, store) = app();
        let resp = send(&app, "POST", "/api/data", "[1, 2, 3]").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(resp).await,
            json!({"error": "request body must be a JSON object"})
        );
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn latest_is_404_until_first_write() {
        let (app, _) = app();
        let resp = send(&app, "GET", "/api/data", "").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(resp).await, json!({"error": "no data yet"}));

        send(&app, "POST", "/api/data", r#"{"temp": 1}"#).await;
        send(&app, "POST", "/api/data", r#"{"temp": 2}"#).await;
        let resp = send(&app, "GET", "/api/data", "").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["temp"], 2);
    }

    #[tokio::test]
    async fn history_is_capped_and_newest_first_for_memory() {
        let (app, _) = app();
        for i in 1..=5 {
            send(&app, "POST", "/", &format!(r#"{{"seq": {i}}}"#)).await;
        }
        let body = json_body(send(&app, "GET", "/data", "").await).await;
        let seqs = body
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["data"]["seq"].as_u64().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(seqs, vec![5, 4, 3]);

        let body = json_body(send(&app, "GET", "/data?limit=1", "").await).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn health_counts_records() {
        let (app, _) = app();
        send(&app, "POST", "/", "{}").await;
        let resp = send(&app, "GET", "/health", "").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            json_body(resp).await,
            json!({"status": "ok", "storage": "memory", "records": 1})
        );
    }

    #[tokio::test]
    async fn health_degrades_when_storage_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.jsonl");
        let store = Store::file(FileStore::open(&path).unwrap());
        std::fs::create_dir(&path).unwrap();
        let app = router(AppState::new(store, HttpSettings::default()));

        let resp = send(&app, "GET", "/health", "").await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(resp).await["status"], "degraded");
    }

    #[tokio::test]
    async fn storage_failures_hide_details() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.jsonl");
        let store = Store::file(FileStore::open(&path).unwrap());
        std::fs::create_dir(&path).unwrap();
        let app = router(AppState::new(store, HttpSettings::default()));

        let resp = send(&app, "POST", "/api/data", "{}").await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(resp).await, json!({"error": "internal server error"}));
    }

    #[tokio::test]
    async fn unknown_routes_and_methods_are_404() {
        let (app, _) = app();
        for (method, uri) in [
            ("GET", "/nope"),
            ("PUT", "/api/data"),
            ("DELETE", "/"),
            ("PUT", "/health"),
        ] {
            let resp = send(&app, method, uri, "").await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{method} {uri}");
            assert_eq!(json_body(resp).await, json!({"error": "Endpoint not found"}));
        }
    }

    #[tokio::test]
    async fn posts_to_read_only_paths_are_ingested() {
        let (app, store) = app();
        let paths = [
            "/health",
            "/api/sensors",
            "/api/stream",
            "/data",
            "/download/json",
            "/download/csv",
            "/dashboard",
        ];
        for uri in paths {
            let resp = send(&app, "POST", uri, r#"{"temp": 1}"#).await;
            assert_eq!(resp.status(), StatusCode::OK, "{uri}");
            let body = json_body(resp).await;
            assert_eq!(body["entry"]["path"], uri);
            assert_eq!(body["entry"]["data"]["temp"], 1);
        }
        assert_eq!(store.count().await.unwrap(), paths.len());

        let resp = send(&app, "POST", "/data", "[1]").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn sensors_are_stored_under_their_path() {
        let (app, store) = app();
        let resp = send(&app, "GET", "/api/sensors", "").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert!(body["rpm"].is_u64());
        assert_eq!(body["machine_id"], "line-4");

        let stored = store.latest().await.unwrap().unwrap();
        assert_eq!(stored.path, "/api/sensors");
    }

    #[tokio::test]
    async fn exports_are_attachments() {
        let (app, _) = app();
        send(&app, "POST", "/api/data", r#"{"temp": 7, "tags": ["a"]}"#).await;

        let resp = send(&app, "GET", "/download/json", "").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"telemetry.json\""
        );
        let json_records = json_body(resp).await;
        assert_eq!(json_records[0]["data"]["temp"], 7);

        let resp = send(&app, "GET", "/download/csv", "").await;
        assert_eq!(
            resp.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"telemetry.csv\""
        );
        assert!(
            resp.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/csv")
        );
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let csv_records = from_csv(&bytes).unwrap();
        assert_eq!(
            serde_json::to_value(&csv_records).unwrap(),
            json_records
        );
    }

    #[tokio::test]
    async fn dashboard_serves_html() {
        let (app, _) = app();
        let resp = send(&app, "GET", "/dashboard", "").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(
            resp.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/html")
        );
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("/api/stream"));
        assert!(html.contains("/data"));

        let subscribe = html.find("follow();").unwrap();
        let history = html.rfind("load();").unwrap();
        assert!(subscribe < history, "stream opens before history loads");
        assert!(html.contains("seen.delete("));
    }
}
