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

//! HTTP API handlers for the gatescope console.

pub mod health;
pub mod inspector;
pub mod proxy;
pub mod traces;

pub use health::health_check;
pub use inspector::{
    clear_inspector, get_inspector_status, pause_inspector, refresh_inspector, resume_inspector,
};
pub use proxy::proxy_debug_entries;
pub use traces::{
    get_trace, get_trace_replay, list_traces, stream_traces, ApiError, AppState, TraceQueryParams,
};
