// Copyright 2025 Gatescope (https://github.com/gatescope)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Console API tests driven over a live listener against a mock gateway.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use gatescope_core::RetryPolicy;
use gatescope_server::api::AppState;
use gatescope_server::build_router;
use gatescope_stream::{BackendClient, BackendOptions, InspectorSession, SessionOptions};

fn entry_json(id: &str) -> String {
    format!(
        "{{\"id\":\"{id}\",\"timestamp\":\"2024-01-15T10:30:00Z\",\"method\":\"GET\",\
         \"path\":\"/weather\",\"status\":200,\"duration\":2000000,\
         \"request_body\":\"{{}}\",\"response_body\":\"{{}}\"}}"
    )
}

fn sse_frame(json: &str) -> String {
    format!("data: {json}\n\n")
}

fn snapshot_entry(id: &str, method: &str, path: &str, status: u16, timestamp: &str) -> Value {
    let response_body = if status >= 400 {
        "{\"error\":\"upstream exploded\"}"
    } else {
        "{\"city\":\"nyc\"}"
    };
    serde_json::json!({
        "id": id,
        "timestamp": timestamp,
        "method": method,
        "path": path,
        "status": status,
        "duration": 2_000_000u64,
        "request_body": "{}",
        "response_body": response_body,
    })
}

fn hanging_event_stream() -> Response {
    let body = Body::from_stream(async_stream::stream! {
        yield Ok::<Bytes, Infallible>(Bytes::from_static(b": keep-alive\n\n"));
        futures::future::pending::<()>().await;
    });
    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .body(body)
        .unwrap()
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client_for(addr: SocketAddr) -> BackendClient {
    BackendClient::new(BackendOptions {
        base_url: format!("http://{addr}"),
        connect_timeout: Duration::from_millis(500),
        ..Default::default()
    })
    .unwrap()
}

fn fast_session_options() -> SessionOptions {
    SessionOptions {
        retry: RetryPolicy {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
            multiplier: 2.0,
            jitter: 0.0,
        },
        ..Default::default()
    }
}

/// Console wired to `gateway`, served on an ephemeral port.
async fn start_console(gateway: SocketAddr) -> (SocketAddr, Arc<InspectorSession>) {
    let client = client_for(gateway);
    let session = Arc::new(InspectorSession::start(
        client.clone(),
        fast_session_options(),
    ));
    let state = AppState {
        session: session.clone(),
        client,
        started_at: Instant::now(),
    };
    let addr = serve(build_router(state, true)).await;
    (addr, session)
}

#[tokio::test]
async fn console_endpoints_cover_inspector_flow() {
    let gateway = Router::new()
        .route("/api/logs", get(|| async { hanging_event_stream() }))
        .route(
            "/debug/entries",
            get(|| async {
                Json(vec![
                    snapshot_entry("snap-ok", "GET", "/weather", 200, "2024-01-15T10:30:00Z"),
                    snapshot_entry("snap-err", "POST", "/orders", 500, "2024-01-15T10:31:00Z"),
                ])
            }),
        );
    let gateway_addr = serve(gateway).await;
    let (console, session) = start_console(gateway_addr).await;
    let http = reqwest::Client::new();
    let base = format!("http://{console}");

    // Health reports the console itself plus the gateway link state.
    let health: Value = http
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["service"], "gatescope-server");
    assert!(health["version"].is_string());
    assert!(health["uptime_seconds"].is_u64());
    assert_eq!(health["buffered"], 0);

    // Nothing buffered until the snapshot is pulled.
    let traces: Vec<Value> = http
        .get(format!("{base}/api/v1/traces"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(traces.is_empty());

    let refresh: Value = http
        .post(format!("{base}/api/v1/inspector/refresh"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(refresh["added"], 2);
    assert_eq!(refresh["buffered"], 2);

    // Newest root span first.
    let traces: Vec<Value> = http
        .get(format!("{base}/api/v1/traces"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ids: Vec<&str> = traces.iter().map(|t| t["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["snap-err", "snap-ok"]);

    // Status and text filters.
    let errors: Vec<Value> = http
        .get(format!("{base}/api/v1/traces?status=error"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["id"], "snap-err");
    assert_eq!(errors[0]["rootSpan"]["errorMessage"], "upstream exploded");

    let named: Vec<Value> = http
        .get(format!("{base}/api/v1/traces?query=weather"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(named.len(), 1);
    assert_eq!(named[0]["id"], "snap-ok");

    let bad = http
        .get(format!("{base}/api/v1/traces?status=flaky"))
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = bad.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("flaky"));

    // Single trace carries the mapped span shape on the wire.
    let trace: Value = http
        .get(format!("{base}/api/v1/traces/snap-ok"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(trace["timestamp"], "2024-01-15T10:30:00Z");
    assert_eq!(trace["totalDuration"], 2.0);
    assert_eq!(trace["status"], "success");
    assert_eq!(trace["rootSpan"]["name"], "GET /weather");
    assert_eq!(trace["rootSpan"]["type"], "tool");
    assert_eq!(trace["rootSpan"]["serviceName"], "backend");

    let missing = http
        .get(format!("{base}/api/v1/traces/absent"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
    let body: Value = missing.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("absent"));

    // Replay link for the playground.
    let replay: Value = http
        .get(format!("{base}/api/v1/traces/snap-ok/replay"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(replay["tool"], "GET /weather");
    assert_eq!(replay["url"], "/playground?tool=GET%20%2Fweather&args=%7B%7D");

    // Pause discards snapshot refills until resumed.
    let paused: Value = http
        .post(format!("{base}/api/v1/inspector/pause"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(paused["paused"], true);

    let cleared: Value = http
        .post(format!("{base}/api/v1/inspector/clear"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cleared["buffered"], 0);
    assert_eq!(cleared["paused"], true);

    let refresh: Value = http
        .post(format!("{base}/api/v1/inspector/refresh"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(refresh["added"], 0);
    assert_eq!(refresh["buffered"], 0);

    let resumed: Value = http
        .post(format!("{base}/api/v1/inspector/resume"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resumed["paused"], false);

    let refresh: Value = http
        .post(format!("{base}/api/v1/inspector/refresh"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(refresh["added"], 2);

    // Aggregate status nests connection, buffer and stream counters.
    let status: Value = http
        .get(format!("{base}/api/v1/inspector/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["connection"], "connecting");
    assert_eq!(status["store"]["buffered"], 2);
    assert_eq!(status["store"]["capacity"], 1000);
    assert!(status["consumer"]["delivered"].is_u64());

    // Raw snapshot proxy.
    let entries: Vec<Value> = http
        .get(format!("{base}/api/v1/debug/entries"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["id"], "snap-ok");

    session.stop().await;
}

#[derive(Clone, Default)]
struct AuthCapture {
    seen: Arc<Mutex<Vec<Option<String>>>>,
}

async fn capturing_entries(
    State(capture): State<AuthCapture>,
    headers: HeaderMap,
) -> Json<Vec<Value>> {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(String::from);
    capture.seen.lock().push(auth);
    Json(vec![])
}

#[tokio::test]
async fn refresh_forwards_caller_authorization() {
    let capture = AuthCapture::default();
    let gateway = Router::new()
        .route("/api/logs", get(|| async { hanging_event_stream() }))
        .route("/debug/entries", get(capturing_entries))
        .with_state(capture.clone());
    let gateway_addr = serve(gateway).await;
    let (console, session) = start_console(gateway_addr).await;
    let http = reqwest::Client::new();
    let base = format!("http://{console}");

    http.post(format!("{base}/api/v1/inspector/refresh"))
        .header("Authorization", "Bearer caller-token")
        .send()
        .await
        .unwrap();
    http.post(format!("{base}/api/v1/inspector/refresh"))
        .send()
        .await
        .unwrap();

    let seen = capture.seen.lock().clone();
    assert_eq!(
        seen,
        vec![Some("Bearer caller-token".to_string()), None],
    );

    session.stop().await;
}

#[tokio::test]
async fn console_degrades_when_gateway_unreachable() {
    let client = BackendClient::new(BackendOptions {
        base_url: "http://127.0.0.1:9".to_string(),
        connect_timeout: Duration::from_millis(200),
        ..Default::default()
    })
    .unwrap();
    let session = Arc::new(InspectorSession::start(
        client.clone(),
        fast_session_options(),
    ));
    let state = AppState {
        session: session.clone(),
        client,
        started_at: Instant::now(),
    };
    let console = serve(build_router(state, true)).await;
    let http = reqwest::Client::new();
    let base = format!("http://{console}");

    // The console stays up and empty rather than failing requests.
    let health: Value = http
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");

    let entries: Vec<Value> = http
        .get(format!("{base}/api/v1/debug/entries"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(entries.is_empty());

    let refresh: Value = http
        .post(format!("{base}/api/v1/inspector/refresh"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(refresh["added"], 0);

    let traces: Vec<Value> = http
        .get(format!("{base}/api/v1/traces"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(traces.is_empty());

    session.stop().await;
}

async fn gated_event_stream(notify: Arc<Notify>) -> Response {
    let body = Body::from_stream(async_stream::stream! {
        notify.notified().await;
        yield Ok::<Bytes, Infallible>(Bytes::from(sse_frame(&entry_json("live-1"))));
        futures::future::pending::<()>().await;
    });
    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .body(body)
        .unwrap()
}

#[tokio::test]
async fn sse_viewer_receives_live_traces() {
    let notify = Arc::new(Notify::new());
    let gate = notify.clone();
    let gateway = Router::new().route(
        "/api/logs",
        get(move || {
            let gate = gate.clone();
            async move { gated_event_stream(gate).await }
        }),
    );
    let gateway_addr = serve(gateway).await;
    let (console, session) = start_console(gateway_addr).await;
    let http = reqwest::Client::new();

    // Attach the viewer before releasing the gateway event so the
    // broadcast has a subscriber when the trace lands.
    let response = http
        .get(format!("http://{console}/api/v1/traces/stream"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    notify.notify_one();

    let mut body = response.bytes_stream();
    let mut collected = String::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !collected.contains("\"id\":\"live-1\"") {
        let remaining = deadline
            .checked_duration_since(tokio::time::Instant::now())
            .expect("timed out waiting for SSE trace frame");
        let chunk = tokio::time::timeout(remaining, body.next())
            .await
            .expect("timed out waiting for SSE trace frame")
            .expect("viewer stream ended early")
            .expect("viewer stream errored");
        collected.push_str(&String::from_utf8_lossy(&chunk));
    }
    assert!(collected.contains("event: trace"));

    // The same trace is buffered for later queries.
    assert_eq!(session.snapshot().len(), 1);
    assert_eq!(session.get("live-1").map(|t| t.id), Some("live-1".into()));

    session.stop().await;
}
