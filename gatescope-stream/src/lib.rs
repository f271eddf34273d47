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

//! Gatescope Stream
//!
//! Live ingestion from the gateway: backend HTTP client, SSE decoding,
//! the reconnecting stream consumer and the inspector session that wires
//! them to a trace store.

pub mod client;
pub mod consumer;
pub mod session;
pub mod sse;

pub use client::{BackendClient, BackendOptions, StreamError};
pub use consumer::{
    ConsumerCounters, ConsumerHandle, ConsumerState, ConsumerStats, SeenWindow, StreamConsumer,
};
pub use session::{InspectorSession, SessionOptions, SessionStatus};
pub use sse::{SseDecoder, SseEvent};
