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

//! Wire types produced by the gateway's debug endpoints.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One recorded request/response pair, as the gateway emits it.
///
/// Immutable once received. Summary variants omit the body fields to keep
/// transfers small; the header maps may be omitted as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugEntry {
    pub id: String,
    /// Producer-formatted ISO-8601 timestamp.
    pub timestamp: String,
    pub method: String,
    pub path: String,
    /// HTTP status code of the recorded response.
    pub status: u16,
    /// Wall-clock duration in nanoseconds.
    pub duration: u64,
    #[serde(default)]
    pub request_headers: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub response_headers: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub request_body: String,
    #[serde(default)]
    pub response_body: String,
}

/// A plain log line interleaved on the gateway's event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub timestamp: String,
    pub level: String,
    #[serde(default)]
    pub source: String,
    pub message: String,
}

/// A triaged record from the gateway's event stream.
///
/// The stream interleaves traceable request captures with generic log
/// lines, so every payload is classified before it reaches the mapper.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamRecord {
    Entry(Box<DebugEntry>),
    Log(LogRecord),
}

impl StreamRecord {
    /// Classifies one decoded stream payload.
    ///
    /// Records carrying string `method` and `path` fields are treated as
    /// debug entries; anything else is tried as a log line. Returns `None`
    /// for payloads matching neither shape, including request-shaped
    /// records missing required fields.
    pub fn classify(value: Value) -> Option<Self> {
        let traceable = value.get("method").is_some_and(Value::is_string)
            && value.get("path").is_some_and(Value::is_string);
        if traceable {
            return serde_json::from_value::<DebugEntry>(value)
                .ok()
                .map(|entry| Self::Entry(Box::new(entry)));
        }
        serde_json::from_value::<LogRecord>(value).ok().map(Self::Log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_request_shaped_records_as_entries() {
        let record = StreamRecord::classify(json!({
            "id": "req-9",
            "timestamp": "2024-01-15T10:30:00Z",
            "method": "POST",
            "path": "/tools/echo",
            "status": 200,
            "duration": 1_500_000,
            "request_headers": {"accept": ["application/json"]},
            "response_headers": {},
            "request_body": "{}",
            "response_body": "{\"ok\":true}",
        }));
        match record {
            Some(StreamRecord::Entry(entry)) => {
                assert_eq!(entry.id, "req-9");
                assert_eq!(entry.request_headers["accept"], vec!["application/json"]);
            }
            other => panic!("expected entry, got {other:?}"),
        }
    }

    #[test]
    fn classifies_log_lines() {
        let record = StreamRecord::classify(json!({
            "id": "log-1",
            "timestamp": "2024-01-15T10:30:00Z",
            "level": "info",
            "source": "router",
            "message": "route table reloaded",
        }));
        match record {
            Some(StreamRecord::Log(log)) => assert_eq!(log.level, "info"),
            other => panic!("expected log line, got {other:?}"),
        }
    }

    #[test]
    fn summary_entries_decode_without_bodies_or_headers() {
        let record = StreamRecord::classify(json!({
            "id": "req-10",
            "timestamp": "2024-01-15T10:30:00Z",
            "method": "GET",
            "path": "/weather",
            "status": 200,
            "duration": 2_000_000,
        }));
        match record {
            Some(StreamRecord::Entry(entry)) => {
                assert!(entry.request_body.is_empty());
                assert!(entry.response_body.is_empty());
                assert!(entry.request_headers.is_empty());
            }
            other => panic!("expected entry, got {other:?}"),
        }
    }

    #[test]
    fn request_shaped_record_missing_id_is_rejected_not_misfiled() {
        let record = StreamRecord::classify(json!({
            "method": "GET",
            "path": "/weather",
            "level": "info",
            "message": "not actually a log line",
        }));
        assert_eq!(record, None);
    }

    #[test]
    fn unrecognized_payloads_are_rejected() {
        assert_eq!(StreamRecord::classify(json!({"foo": "bar"})), None);
        assert_eq!(StreamRecord::classify(json!([1, 2, 3])), None);
        assert_eq!(StreamRecord::classify(json!("plain string")), None);
    }
}
