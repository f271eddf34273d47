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

//! Trace query endpoints backed by the inspector's in-memory buffer.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use gatescope_core::{
    filter_traces, ParseStatusFilterError, ReplayLink, StatusFilter, Trace, TraceFilter,
};
use gatescope_stream::{BackendClient, InspectorSession};

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<InspectorSession>,
    pub client: BackendClient,
    pub started_at: Instant,
}

/// Query parameters for listing traces
#[derive(Debug, Default, Deserialize)]
pub struct TraceQueryParams {
    /// Case-insensitive substring matched against span names and trace ids
    pub query: Option<String>,

    /// Status filter: all, success, error or pending
    pub status: Option<String>,
}

impl TraceQueryParams {
    fn status_filter(&self) -> Result<StatusFilter, ApiError> {
        match self.status.as_deref() {
            Some(raw) => raw
                .parse()
                .map_err(|err: ParseStatusFilterError| ApiError::BadRequest(err.to_string())),
            None => Ok(StatusFilter::All),
        }
    }
}

/// GET /api/v1/traces - list buffered traces, newest first
pub async fn list_traces(
    State(state): State<AppState>,
    Query(params): Query<TraceQueryParams>,
) -> Result<Json<Vec<Trace>>, ApiError> {
    let status = params.status_filter()?;
    let filter = TraceFilter::new(params.query.clone().unwrap_or_default(), status);

    let traces = state.session.snapshot();
    Ok(Json(filter_traces(&traces, &filter)))
}

/// GET /api/v1/traces/:trace_id - fetch a single buffered trace
pub async fn get_trace(
    State(state): State<AppState>,
    Path(trace_id): Path<String>,
) -> Result<Json<Trace>, ApiError> {
    state
        .session
        .get(&trace_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("trace {trace_id} not buffered")))
}

/// GET /api/v1/traces/:trace_id/replay - playground link for one trace
pub async fn get_trace_replay(
    State(state): State<AppState>,
    Path(trace_id): Path<String>,
) -> Result<Json<ReplayLink>, ApiError> {
    let trace = state
        .session
        .get(&trace_id)
        .ok_or_else(|| ApiError::NotFound(format!("trace {trace_id} not buffered")))?;

    Ok(Json(ReplayLink::for_trace(&trace)))
}

/// Server-Sent Events endpoint pushing each newly buffered trace to viewers.
pub async fn stream_traces(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("SSE trace stream viewer attached");

    let mut rx = state.session.subscribe();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(trace) => {
                    match serde_json::to_string(&trace) {
                        Ok(json) => yield Ok(Event::default().event("trace").data(json)),
                        Err(err) => {
                            error!("Failed to serialize trace event: {}", err);
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("SSE viewer lagged (skipped {} traces)", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
