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

use axum::{extract::State, http::HeaderMap, Json};

use gatescope_core::DebugEntry;

use crate::api::inspector::forwarded_authorization;
use crate::api::AppState;

/// GET /api/v1/debug/entries - raw gateway snapshot, proxied for the console UI.
///
/// Unreachable or misbehaving gateways yield an empty list rather than an
/// error, matching the inspector's own snapshot handling.
pub async fn proxy_debug_entries(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<Vec<DebugEntry>> {
    let forwarded_auth = forwarded_authorization(&headers);
    let entries = state.client.fetch_entries(forwarded_auth.as_deref()).await;
    Json(entries)
}
