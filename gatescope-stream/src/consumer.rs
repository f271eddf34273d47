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

//! Background task maintaining the live subscription to the gateway.
//!
//! The consume loop owns reconnection with exponential backoff, triage of
//! stream payloads, and duplicate suppression across the reconnect replays
//! the gateway is known to produce. Gaps across a reconnect are accepted;
//! the consumer never requests historical backfill.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use gatescope_core::{DebugEntry, RetryPolicy, StreamRecord};

use crate::client::BackendClient;
use crate::sse::{SseDecoder, SseEvent};

/// Connection lifecycle, published through a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerState {
    Idle,
    Connecting,
    Streaming,
    Reconnecting,
    Closed,
}

/// Counters kept by the consume loop.
#[derive(Debug, Default)]
pub struct ConsumerStats {
    pub delivered: AtomicU64,
    pub duplicates: AtomicU64,
    pub log_lines: AtomicU64,
    pub decode_failures: AtomicU64,
    pub reconnects: AtomicU64,
}

impl ConsumerStats {
    pub fn counters(&self) -> ConsumerCounters {
        ConsumerCounters {
            delivered: self.delivered.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            log_lines: self.log_lines.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ConsumerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConsumerCounters {
    pub delivered: u64,
    pub duplicates: u64,
    pub log_lines: u64,
    pub decode_failures: u64,
    pub reconnects: u64,
}

/// Bounded window of recently accepted entry ids.
///
/// The window outlives individual connections so that history replayed
/// after a reconnect is suppressed. Eviction is oldest-first once the
/// window is full.
#[derive(Debug)]
pub struct SeenWindow {
    ids: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl SeenWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            ids: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn insert(&mut self, id: &str) {
        if self.ids.contains(id) {
            return;
        }
        self.ids.insert(id.to_string());
        self.order.push_back(id.to_string());
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.ids.remove(&evicted);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Long-lived subscription to the gateway's event stream.
pub struct StreamConsumer;

impl StreamConsumer {
    /// Spawns the consume loop.
    ///
    /// Every traceable entry is offered to `on_entry`, which returns
    /// whether the receiving side accepted it. Only accepted ids enter
    /// the dedup window, so an entry rejected now (for example while the
    /// store is paused) remains eligible for a later redelivery.
    pub fn spawn<F>(
        client: BackendClient,
        retry: RetryPolicy,
        seen: Arc<Mutex<SeenWindow>>,
        on_entry: F,
    ) -> ConsumerHandle
    where
        F: FnMut(DebugEntry) -> bool + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(ConsumerState::Idle);
        let stats = Arc::new(ConsumerStats::default());
        tokio::spawn(run(
            client,
            retry,
            seen,
            Arc::clone(&stats),
            cancel.clone(),
            state_tx,
            on_entry,
        ));
        ConsumerHandle {
            cancel,
            state: state_rx,
            stats,
        }
    }
}

/// Control handle for a spawned consumer. Dropping it cancels the loop.
#[derive(Debug)]
pub struct ConsumerHandle {
    cancel: CancellationToken,
    state: watch::Receiver<ConsumerState>,
    stats: Arc<ConsumerStats>,
}

impl ConsumerHandle {
    pub fn state(&self) -> ConsumerState {
        *self.state.borrow()
    }

    /// Watch channel mirroring the state machine, for status displays.
    pub fn state_watch(&self) -> watch::Receiver<ConsumerState> {
        self.state.clone()
    }

    pub fn counters(&self) -> ConsumerCounters {
        self.stats.counters()
    }

    /// Cancels the loop and waits until the connection is released.
    /// Idempotent; concurrent callers all observe the closed state.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let mut state = self.state.clone();
        let _ = state.wait_for(|state| *state == ConsumerState::Closed).await;
    }
}

impl Drop for ConsumerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum StreamEnd {
    Cancelled,
    Disconnected,
}

async fn run<F>(
    client: BackendClient,
    retry: RetryPolicy,
    seen: Arc<Mutex<SeenWindow>>,
    stats: Arc<ConsumerStats>,
    cancel: CancellationToken,
    state: watch::Sender<ConsumerState>,
    mut on_entry: F,
) where
    F: FnMut(DebugEntry) -> bool + Send + 'static,
{
    info!(url = %client.stream_url(), "stream consumer started");
    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let _ = state.send(ConsumerState::Connecting);
        let connected = tokio::select! {
            _ = cancel.cancelled() => break,
            result = client.open_stream() => result,
        };
        match connected {
            Ok(response) => {
                let end = consume_stream(
                    response,
                    &seen,
                    &stats,
                    &cancel,
                    &state,
                    &mut attempt,
                    &mut on_entry,
                )
                .await;
                if matches!(end, StreamEnd::Cancelled) {
                    break;
                }
            }
            Err(error) => {
                warn!(%error, "stream connection failed");
            }
        }
        if cancel.is_cancelled() {
            break;
        }
        let _ = state.send(ConsumerState::Reconnecting);
        stats.reconnects.fetch_add(1, Ordering::Relaxed);
        let delay = retry.delay_for_attempt(attempt);
        attempt = attempt.saturating_add(1);
        debug!(attempt, delay_ms = delay.as_millis() as u64, "waiting before reconnect");
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
    let _ = state.send(ConsumerState::Closed);
    info!("stream consumer stopped");
}

async fn consume_stream<F>(
    response: reqwest::Response,
    seen: &Mutex<SeenWindow>,
    stats: &ConsumerStats,
    cancel: &CancellationToken,
    state: &watch::Sender<ConsumerState>,
    attempt: &mut u32,
    on_entry: &mut F,
) -> StreamEnd
where
    F: FnMut(DebugEntry) -> bool,
{
    let mut decoder = SseDecoder::new();
    let mut stream = response.bytes_stream();
    let mut streaming = false;
    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => return StreamEnd::Cancelled,
            chunk = stream.next() => chunk,
        };
        match chunk {
            Some(Ok(bytes)) => {
                for event in decoder.feed(&bytes) {
                    if !streaming {
                        streaming = true;
                        *attempt = 0;
                        let _ = state.send(ConsumerState::Streaming);
                        info!("stream delivering events");
                    }
                    deliver(event, seen, stats, on_entry);
                }
            }
            Some(Err(error)) => {
                warn!(%error, "stream transport error");
                return StreamEnd::Disconnected;
            }
            None => {
                info!("stream closed by backend");
                return StreamEnd::Disconnected;
            }
        }
    }
}

fn deliver<F>(event: SseEvent, seen: &Mutex<SeenWindow>, stats: &ConsumerStats, on_entry: &mut F)
where
    F: FnMut(DebugEntry) -> bool,
{
    let payload: Value = match serde_json::from_str(&event.data) {
        Ok(value) => value,
        Err(error) => {
            stats.decode_failures.fetch_add(1, Ordering::Relaxed);
            debug!(%error, "discarding undecodable stream payload");
            return;
        }
    };
    match StreamRecord::classify(payload) {
        Some(StreamRecord::Entry(entry)) => {
            if seen.lock().contains(&entry.id) {
                stats.duplicates.fetch_add(1, Ordering::Relaxed);
                return;
            }
            let id = entry.id.clone();
            if on_entry(*entry) {
                seen.lock().insert(&id);
                stats.delivered.fetch_add(1, Ordering::Relaxed);
            }
        }
        Some(StreamRecord::Log(log)) => {
            stats.log_lines.fetch_add(1, Ordering::Relaxed);
            debug!(level = %log.level, source = %log.source, "skipping log line");
        }
        None => {
            stats.decode_failures.fetch_add(1, Ordering::Relaxed);
            debug!("stream payload matched no known record shape");
        }
    }
}
