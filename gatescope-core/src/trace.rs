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

//! Normalized trace model served by the inspector.
//!
//! A [`Trace`] wraps exactly one root [`Span`]. Span trees deeper than one
//! level are a forward-compatibility affordance; the entry mapper never
//! populates `children` today.

use serde::{Deserialize, Serialize};

/// Category of the operation a span records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    Tool,
    Service,
    Resource,
    Prompt,
    Core,
}

/// Outcome of a span or of the trace that mirrors its root span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    Success,
    Error,
    Pending,
}

/// What initiated the traced request.
///
/// Gateway debug entries are always user-initiated; the remaining variants
/// are reserved for other producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceTrigger {
    User,
    Webhook,
    Scheduler,
    System,
}

/// A single timed operation within a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    pub id: String,
    /// Display name, `"<METHOD> <path>"` for gateway entries.
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SpanKind,
    /// Epoch milliseconds. Invariant: `end_time >= start_time`.
    pub start_time: i64,
    pub end_time: i64,
    pub status: SpanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub children: Vec<Span>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
}

/// One logical request/response cycle recorded for observability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trace {
    pub id: String,
    pub root_span: Span,
    /// Producer timestamp carried verbatim (ISO-8601). Chronology is
    /// derived from `root_span.start_time`, never from this string.
    pub timestamp: String,
    /// Wall-clock duration in milliseconds.
    pub total_duration: f64,
    /// Mirrors `root_span.status`.
    pub status: SpanStatus,
    pub trigger: TraceTrigger,
    #[serde(default)]
    pub is_summary: bool,
}

impl Trace {
    /// Epoch-millisecond ordering key for display sorting.
    pub fn sort_key(&self) -> i64 {
        self.root_span.start_time
    }
}
