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

//! Conversion from raw gateway entries to the normalized trace model.
//!
//! [`map_entry_to_trace`] is total: malformed timestamps, non-JSON bodies
//! and empty payloads all map to a well-formed [`Trace`]. Data-quality
//! problems are logged, never propagated.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::entry::DebugEntry;
use crate::trace::{Span, SpanKind, SpanStatus, Trace, TraceTrigger};

/// Service label attached to every span produced by this mapper.
pub const BACKEND_SERVICE: &str = "backend";

/// Raw error payloads are clipped to this many characters.
const RAW_ERROR_LIMIT: usize = 200;

const NANOS_PER_MILLI: f64 = 1_000_000.0;

/// Maps one gateway debug entry to a single-span trace.
///
/// `is_summary` marks entries fetched from a summary snapshot, whose empty
/// body fields are intentional omissions rather than empty payloads.
pub fn map_entry_to_trace(entry: &DebugEntry, is_summary: bool) -> Trace {
    let start_time = match parse_timestamp_ms(&entry.timestamp) {
        Some(ms) => ms,
        None => {
            warn!(
                entry_id = %entry.id,
                timestamp = %entry.timestamp,
                "unparseable entry timestamp, substituting ingestion time"
            );
            Utc::now().timestamp_millis()
        }
    };
    let duration_ms = entry.duration as f64 / NANOS_PER_MILLI;
    let end_time = start_time + duration_ms.round() as i64;

    let input = parse_body(&entry.request_body, is_summary);
    let output = parse_body(&entry.response_body, is_summary);

    let status = if entry.status >= 400 {
        SpanStatus::Error
    } else {
        SpanStatus::Success
    };
    let error_message = if entry.status >= 400 {
        extract_error_message(output.as_ref())
    } else {
        None
    };

    let root_span = Span {
        id: entry.id.clone(),
        name: format!("{} {}", entry.method, entry.path),
        kind: SpanKind::Tool,
        start_time,
        end_time,
        status,
        input,
        output,
        error_message,
        children: Vec::new(),
        service_name: Some(BACKEND_SERVICE.to_string()),
    };

    Trace {
        id: entry.id.clone(),
        root_span,
        timestamp: entry.timestamp.clone(),
        total_duration: duration_ms,
        status,
        trigger: TraceTrigger::User,
        is_summary,
    }
}

fn parse_timestamp_ms(raw: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|parsed| parsed.timestamp_millis())
}

/// Opportunistic JSON decode. Non-JSON payloads stay inspectable behind a
/// `{ "raw": ... }` wrapper instead of being dropped.
fn parse_body(raw: &str, is_summary: bool) -> Option<Value> {
    if is_summary && raw.is_empty() {
        return None;
    }
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(error) => {
            debug!(%error, "body is not JSON, keeping raw payload");
            Some(json!({ "raw": raw }))
        }
    }
}

/// Searches the decoded response for a human-readable error message.
///
/// Precedence: `error` as a string, `error.message`, `message`, `detail`,
/// then the clipped `raw` fallback. First match wins.
fn extract_error_message(output: Option<&Value>) -> Option<String> {
    let output = output?;
    if let Some(message) = output.get("error").and_then(Value::as_str) {
        return Some(message.to_string());
    }
    if let Some(message) = output
        .get("error")
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
    {
        return Some(message.to_string());
    }
    if let Some(message) = output.get("message").and_then(Value::as_str) {
        return Some(message.to_string());
    }
    if let Some(message) = output.get("detail").and_then(Value::as_str) {
        return Some(message.to_string());
    }
    output.get("raw").and_then(Value::as_str).map(clip_raw)
}

fn clip_raw(raw: &str) -> String {
    if raw.chars().count() <= RAW_ERROR_LIMIT {
        return raw.to_string();
    }
    let mut clipped: String = raw.chars().take(RAW_ERROR_LIMIT).collect();
    clipped.push_str("...");
    clipped
}
