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

//! Gatescope Server
//!
//! HTTP console for inspecting a gateway's live request traffic. Attaches
//! to the gateway's debug stream, keeps a bounded buffer of mapped traces
//! and exposes them over a small JSON API plus a live SSE feed.

pub mod api;
pub mod config;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::{
    clear_inspector, get_inspector_status, get_trace, get_trace_replay, health_check, list_traces,
    pause_inspector, proxy_debug_entries, refresh_inspector, resume_inspector, stream_traces,
    AppState,
};
use config::ConsoleConfig;
use gatescope_stream::{BackendClient, InspectorSession};

pub async fn run_server(config: ConsoleConfig) -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gatescope=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Gatescope Console");
    tracing::info!("Configuration: {:#?}", config);

    config.validate()?;

    let client = BackendClient::new(config.backend_options())?;
    tracing::info!("Attached to gateway at {}", config.backend.base_url);

    let session = Arc::new(InspectorSession::start(
        client.clone(),
        config.session_options(),
    ));

    // Seed the buffer from the gateway snapshot. An unreachable gateway
    // resolves to an empty seed and the live stream backfills on connect.
    let seeded = session.prime(None).await;
    tracing::info!("Seeded {} traces from gateway snapshot", seeded);

    let state = AppState {
        session: session.clone(),
        client,
        started_at: Instant::now(),
    };

    let app = build_router(state, config.server.enable_cors);

    let addr = config.socket_addr()?;
    tracing::info!("Listening on http://{}", addr);

    let shutdown_token = CancellationToken::new();
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            signal_token.cancel();
        }
    });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_token.cancelled().await;
            tracing::info!("HTTP server received shutdown signal");
        })
        .await?;

    // Detach from the gateway stream before reporting shutdown complete.
    session.stop().await;
    tracing::info!("Gatescope console stopped");

    Ok(())
}

/// Console routes over the shared state. Split out so tests can drive the
/// API against an in-process listener.
pub fn build_router(state: AppState, enable_cors: bool) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/traces", get(list_traces))
        .route("/api/v1/traces/stream", get(stream_traces))
        .route("/api/v1/traces/:trace_id", get(get_trace))
        .route("/api/v1/traces/:trace_id/replay", get(get_trace_replay))
        .route("/api/v1/inspector/pause", post(pause_inspector))
        .route("/api/v1/inspector/resume", post(resume_inspector))
        .route("/api/v1/inspector/clear", post(clear_inspector))
        .route("/api/v1/inspector/refresh", post(refresh_inspector))
        .route("/api/v1/inspector/status", get(get_inspector_status))
        .route("/api/v1/debug/entries", get(proxy_debug_entries))
        .with_state(state);

    let router = if enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http())
}
