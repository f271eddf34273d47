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

//! One inspector session: a trace store fed by a stream consumer.
//!
//! The session owns the store; the consumer only pushes into it. Display
//! surfaces are read-only subscribers and never write, so one session per
//! console process is sufficient even with many connected viewers.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::info;

use gatescope_core::{
    map_entry_to_trace, AppendOutcome, RetryPolicy, StoreStats, Trace, TraceStore,
};

use crate::client::BackendClient;
use crate::consumer::{
    ConsumerCounters, ConsumerHandle, ConsumerState, SeenWindow, StreamConsumer,
};

/// Tunables for a session, all with serviceable defaults.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Trace store capacity.
    pub capacity: usize,
    /// Entry-id dedup window size.
    pub dedup_window: usize,
    pub retry: RetryPolicy,
    /// Treat snapshot entries as summaries whose empty bodies are
    /// intentional omissions.
    pub summary_snapshots: bool,
    /// Fan-out channel capacity for live viewers.
    pub broadcast_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            capacity: 1000,
            dedup_window: 4096,
            retry: RetryPolicy::default(),
            summary_snapshots: false,
            broadcast_capacity: 1024,
        }
    }
}

/// Aggregate status reported by the inspector's status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub connection: ConsumerState,
    pub store: StoreStats,
    pub consumer: ConsumerCounters,
}

/// Live trace pipeline: consumer -> mapper -> store -> subscribers.
///
/// Duplicates are handled at two levels. The consumer's seen-window
/// suppresses stream replays across reconnects; buffer membership guards
/// against the same entry arriving once via a snapshot and once live.
pub struct InspectorSession {
    store: Arc<TraceStore>,
    consumer: ConsumerHandle,
    client: BackendClient,
    broadcast: broadcast::Sender<Trace>,
    summary_snapshots: bool,
}

impl InspectorSession {
    /// Starts the pipeline against `client`'s stream endpoint.
    pub fn start(client: BackendClient, options: SessionOptions) -> Self {
        let store = Arc::new(TraceStore::new(options.capacity));
        let seen = Arc::new(Mutex::new(SeenWindow::new(options.dedup_window)));
        let (broadcast_tx, _) = broadcast::channel(options.broadcast_capacity);

        let sink_store = Arc::clone(&store);
        let sink_tx = broadcast_tx.clone();
        let consumer = StreamConsumer::spawn(
            client.clone(),
            options.retry.clone(),
            seen,
            move |entry| {
                if sink_store.get(&entry.id).is_some() {
                    return false;
                }
                let trace = map_entry_to_trace(&entry, false);
                match sink_store.append(trace.clone()) {
                    AppendOutcome::Appended(_) => {
                        let _ = sink_tx.send(trace);
                        true
                    }
                    AppendOutcome::DiscardedPaused => false,
                }
            },
        );

        info!(
            capacity = options.capacity,
            dedup_window = options.dedup_window,
            "inspector session started"
        );
        Self {
            store,
            consumer,
            client,
            broadcast: broadcast_tx,
            summary_snapshots: options.summary_snapshots,
        }
    }

    /// One-shot snapshot fetch feeding the same store as live events.
    /// Entries already buffered are skipped. Returns the number added.
    pub async fn prime(&self, forwarded_auth: Option<&str>) -> usize {
        let entries = self.client.fetch_entries(forwarded_auth).await;
        let mut added = 0;
        for entry in entries {
            if self.store.get(&entry.id).is_some() {
                continue;
            }
            let trace = map_entry_to_trace(&entry, self.summary_snapshots);
            if matches!(self.store.append(trace.clone()), AppendOutcome::Appended(_)) {
                let _ = self.broadcast.send(trace);
                added += 1;
            }
        }
        info!(added, "snapshot primed into trace store");
        added
    }

    pub fn pause(&self) {
        self.store.pause();
    }

    pub fn resume(&self) {
        self.store.resume();
    }

    pub fn clear(&self) {
        self.store.clear();
    }

    pub fn snapshot(&self) -> Vec<Trace> {
        self.store.snapshot()
    }

    pub fn get(&self, id: &str) -> Option<Trace> {
        self.store.get(id)
    }

    /// Subscribes a viewer to traces as they are accepted into the store.
    pub fn subscribe(&self) -> broadcast::Receiver<Trace> {
        self.broadcast.subscribe()
    }

    pub fn connection_state(&self) -> ConsumerState {
        self.consumer.state()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            connection: self.consumer.state(),
            store: self.store.stats(),
            consumer: self.consumer.counters(),
        }
    }

    /// Stops the consumer and waits for its connection to be released.
    /// Idempotent.
    pub async fn stop(&self) {
        self.consumer.shutdown().await;
        info!("inspector session stopped");
    }
}
