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

//! Free-text and status filtering over trace snapshots.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::trace::{SpanStatus, Trace};

/// Status predicate applied by the inspector's filter bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    Success,
    Error,
    Pending,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown status filter '{0}', expected all, success, error or pending")]
pub struct ParseStatusFilterError(String);

impl FromStr for StatusFilter {
    type Err = ParseStatusFilterError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            "pending" => Ok(Self::Pending),
            _ => Err(ParseStatusFilterError(raw.to_string())),
        }
    }
}

impl StatusFilter {
    pub fn matches(&self, status: SpanStatus) -> bool {
        match self {
            Self::All => true,
            Self::Success => status == SpanStatus::Success,
            Self::Error => status == SpanStatus::Error,
            Self::Pending => status == SpanStatus::Pending,
        }
    }
}

/// Combined predicate over a trace snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceFilter {
    /// Case-insensitive substring matched against the root span name and
    /// the trace id. Empty matches everything.
    pub query: String,
    pub status: StatusFilter,
}

impl TraceFilter {
    pub fn new(query: impl Into<String>, status: StatusFilter) -> Self {
        Self {
            query: query.into(),
            status,
        }
    }

    pub fn matches(&self, trace: &Trace) -> bool {
        if !self.status.matches(trace.status) {
            return false;
        }
        if self.query.is_empty() {
            return true;
        }
        let needle = self.query.to_lowercase();
        trace.root_span.name.to_lowercase().contains(&needle)
            || trace.id.to_lowercase().contains(&needle)
    }
}

/// Applies `filter` to a snapshot, preserving the input order.
pub fn filter_traces(traces: &[Trace], filter: &TraceFilter) -> Vec<Trace> {
    traces
        .iter()
        .filter(|trace| filter.matches(trace))
        .cloned()
        .collect()
}
