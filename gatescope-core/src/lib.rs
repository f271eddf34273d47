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

//! Gatescope Core
//!
//! Trace data model and the pure transforms behind the gateway inspector:
//! entry normalization, the bounded trace buffer, filtering and replay
//! link encoding.

pub mod entry;
pub mod filter;
pub mod mapper;
pub mod replay;
pub mod retry;
pub mod store;
pub mod trace;

pub use entry::{DebugEntry, LogRecord, StreamRecord};
pub use filter::{filter_traces, ParseStatusFilterError, StatusFilter, TraceFilter};
pub use mapper::{map_entry_to_trace, BACKEND_SERVICE};
pub use replay::{replay_url, ReplayLink, PLAYGROUND_PATH};
pub use retry::RetryPolicy;
pub use store::{AppendOutcome, StoreStats, TraceStore};
pub use trace::{Span, SpanKind, SpanStatus, Trace, TraceTrigger};
