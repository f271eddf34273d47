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

//! Deep links that re-invoke a recorded tool call in the playground.

use serde::Serialize;

use crate::trace::Trace;

/// Path of the playground surface that consumes replay links.
pub const PLAYGROUND_PATH: &str = "/playground";

/// A replayable invocation extracted from a trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayLink {
    /// Tool name as recorded, before percent-encoding.
    pub tool: String,
    /// Compact JSON argument blob, `{}` when the trace had no input.
    pub args: String,
    pub url: String,
}

impl ReplayLink {
    pub fn for_trace(trace: &Trace) -> Self {
        let tool = trace.root_span.name.clone();
        let args = trace
            .root_span
            .input
            .as_ref()
            .map(|input| input.to_string())
            .unwrap_or_else(|| "{}".to_string());
        let url = format!(
            "{PLAYGROUND_PATH}?tool={}&args={}",
            urlencoding::encode(&tool),
            urlencoding::encode(&args)
        );
        Self { tool, args, url }
    }
}

/// Encodes `trace` as a playground deep link.
pub fn replay_url(trace: &Trace) -> String {
    ReplayLink::for_trace(trace).url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{Span, SpanKind, SpanStatus, TraceTrigger};

    fn trace_with_input(input: Option<serde_json::Value>) -> Trace {
        Trace {
            id: "req-1".to_string(),
            root_span: Span {
                id: "req-1".to_string(),
                name: "GET /weather".to_string(),
                kind: SpanKind::Tool,
                start_time: 0,
                end_time: 1,
                status: SpanStatus::Success,
                input,
                output: None,
                error_message: None,
                children: Vec::new(),
                service_name: None,
            },
            timestamp: "2024-01-15T10:30:00Z".to_string(),
            total_duration: 1.0,
            status: SpanStatus::Success,
            trigger: TraceTrigger::User,
            is_summary: false,
        }
    }

    #[test]
    fn encodes_tool_name_and_json_args() {
        let trace = trace_with_input(Some(serde_json::json!({"city": "nyc"})));
        let url = replay_url(&trace);
        assert_eq!(
            url,
            "/playground?tool=GET%20%2Fweather&args=%7B%22city%22%3A%22nyc%22%7D"
        );
    }

    #[test]
    fn missing_input_encodes_empty_object_args() {
        let url = replay_url(&trace_with_input(None));
        assert!(url.contains("args=%7B%7D"));
    }

    #[test]
    fn link_exposes_decoded_parts() {
        let link = ReplayLink::for_trace(&trace_with_input(Some(serde_json::json!({"q": 1}))));
        assert_eq!(link.tool, "GET /weather");
        assert_eq!(link.args, "{\"q\":1}");
    }
}
