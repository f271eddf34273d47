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

//! Bounded in-memory buffer of live traces.
//!
//! A [`TraceStore`] has a single writer, the stream consumer, plus the
//! inspector's control actions. The lock exists for concurrent snapshot
//! readers, not for competing writers; sessions never share a store.

use std::collections::VecDeque;

use parking_lot::RwLock;
use serde::Serialize;

use crate::trace::Trace;

/// Result of offering a trace to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Accepted, with the store's sequence number for this insertion.
    Appended(u64),
    /// Dropped because the store is paused. Paused traces are lost, not
    /// queued for later.
    DiscardedPaused,
}

/// Counters reported by the inspector status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub buffered: usize,
    pub capacity: usize,
    pub paused: bool,
    /// Total traces ever accepted, monotonically increasing.
    pub appended: u64,
    pub discarded_while_paused: u64,
}

#[derive(Debug, Default)]
struct StoreInner {
    traces: VecDeque<Trace>,
    paused: bool,
    seq: u64,
    discarded_while_paused: u64,
}

/// Bounded ring of recent traces, newest appended at the tail.
#[derive(Debug)]
pub struct TraceStore {
    inner: RwLock<StoreInner>,
    capacity: usize,
}

impl TraceStore {
    /// Creates an empty store bounded at `capacity` traces.
    ///
    /// A zero capacity is treated as one so the newest trace always has
    /// somewhere to land.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends a trace, evicting the oldest entries beyond capacity.
    /// While paused the trace is discarded outright.
    pub fn append(&self, trace: Trace) -> AppendOutcome {
        let mut inner = self.inner.write();
        if inner.paused {
            inner.discarded_while_paused += 1;
            return AppendOutcome::DiscardedPaused;
        }
        inner.seq += 1;
        let seq = inner.seq;
        inner.traces.push_back(trace);
        while inner.traces.len() > self.capacity {
            inner.traces.pop_front();
        }
        AppendOutcome::Appended(seq)
    }

    /// Stops accepting traces. Existing contents are untouched.
    pub fn pause(&self) {
        self.inner.write().paused = true;
    }

    pub fn resume(&self) {
        self.inner.write().paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.inner.read().paused
    }

    /// Empties the buffer regardless of pause state.
    pub fn clear(&self) {
        self.inner.write().traces.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().traces.is_empty()
    }

    /// Returns an owned copy ordered newest-first.
    ///
    /// Ordering compares epoch start times numerically rather than the
    /// producer's timestamp strings, so mixed timestamp formats still sort
    /// chronologically. Equal timestamps keep insertion order.
    pub fn snapshot(&self) -> Vec<Trace> {
        let mut traces: Vec<Trace> = {
            let inner = self.inner.read();
            inner.traces.iter().cloned().collect()
        };
        traces.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));
        traces
    }

    /// Looks up a single trace by id without cloning the whole buffer.
    pub fn get(&self, id: &str) -> Option<Trace> {
        let inner = self.inner.read();
        inner.traces.iter().find(|trace| trace.id == id).cloned()
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.read();
        StoreStats {
            buffered: inner.traces.len(),
            capacity: self.capacity,
            paused: inner.paused,
            appended: inner.seq,
            discarded_while_paused: inner.discarded_while_paused,
        }
    }
}
