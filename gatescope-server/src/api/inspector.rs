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

//! Inspector control endpoints (pause, resume, clear, refresh, status).

use axum::{
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use serde::Serialize;
use tracing::info;

use gatescope_core::StoreStats;
use gatescope_stream::SessionStatus;

use crate::api::AppState;

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    /// Traces added from the snapshot that were not already buffered.
    pub added: usize,
    pub buffered: usize,
}

/// POST /api/v1/inspector/pause - stop admitting live traces
pub async fn pause_inspector(State(state): State<AppState>) -> Json<StoreStats> {
    state.session.pause();
    info!("Inspector paused");
    Json(state.session.status().store)
}

/// POST /api/v1/inspector/resume - admit live traces again
pub async fn resume_inspector(State(state): State<AppState>) -> Json<StoreStats> {
    state.session.resume();
    info!("Inspector resumed");
    Json(state.session.status().store)
}

/// POST /api/v1/inspector/clear - drop every buffered trace
pub async fn clear_inspector(State(state): State<AppState>) -> Json<StoreStats> {
    state.session.clear();
    info!("Inspector buffer cleared");
    Json(state.session.status().store)
}

/// POST /api/v1/inspector/refresh - pull the gateway snapshot into the buffer
pub async fn refresh_inspector(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<RefreshResponse> {
    let forwarded_auth = forwarded_authorization(&headers);
    let added = state.session.prime(forwarded_auth.as_deref()).await;

    Json(RefreshResponse {
        added,
        buffered: state.session.status().store.buffered,
    })
}

/// GET /api/v1/inspector/status - connection state plus buffer and stream counters
pub async fn get_inspector_status(State(state): State<AppState>) -> Json<SessionStatus> {
    Json(state.session.status())
}

/// Caller Authorization header, passed through to the gateway verbatim.
pub(crate) fn forwarded_authorization(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_authorization_reads_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(forwarded_authorization(&headers), None);

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc"),
        );
        assert_eq!(
            forwarded_authorization(&headers).as_deref(),
            Some("Bearer abc")
        );
    }
}
