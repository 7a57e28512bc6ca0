//! Progress stream publisher
//!
//! Multiplexes lifecycle and sub-step events into an ordered, replay-safe
//! feed per request. A subscriber connecting after events have fired receives
//! the buffered prefix first, then live events, strictly in sequence order
//! and at most once. The terminal event is always last; after it (or an
//! explicit close on cancellation) the subscription ends.
//!
//! The producer never blocks: live fan-out goes through a bounded broadcast
//! channel, and the replay buffer is a bounded window that evicts its oldest
//! event when full. A subscriber that falls behind the window resynchronizes
//! from the oldest retained event instead of stalling, so a consumer can
//! lose replay of a very chatty prefix but can never wedge.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use flux_core::{ProgressEvent, ProgressEventKind, RequestId};
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tracing::warn;

struct ChannelState {
    events: VecDeque<ProgressEvent>,
    next_seq: u64,
    live_tx: broadcast::Sender<ProgressEvent>,
    closed_tx: watch::Sender<bool>,
    closed: bool,
}

/// Per-request ordered event feeds
pub struct ProgressPublisher {
    buffer_capacity: usize,
    channels: RwLock<HashMap<RequestId, Arc<Mutex<ChannelState>>>>,
}

impl ProgressPublisher {
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            // A window of at least one keeps the terminal event replayable
            buffer_capacity: buffer_capacity.max(1),
            channels: RwLock::new(HashMap::new()),
        }
    }

    async fn channel(&self, request_id: RequestId) -> Arc<Mutex<ChannelState>> {
        if let Some(state) = self.channels.read().await.get(&request_id) {
            return state.clone();
        }

        let mut channels = self.channels.write().await;
        channels
            .entry(request_id)
            .or_insert_with(|| {
                let (live_tx, _) = broadcast::channel(64);
                let (closed_tx, _) = watch::channel(false);
                Arc::new(Mutex::new(ChannelState {
                    events: VecDeque::new(),
                    next_seq: 0,
                    live_tx,
                    closed_tx,
                    closed: false,
                }))
            })
            .clone()
    }

    /// Append one event and wake any blocked subscribers. Events published
    /// after the terminal event are dropped.
    pub async fn publish(&self, request_id: RequestId, kind: ProgressEventKind) {
        let channel = self.channel(request_id).await;
        let mut state = channel.lock().await;

        if state.closed {
            warn!(
                "Dropping event published after stream closure for request {}",
                request_id.short()
            );
            return;
        }

        let terminal = kind.is_terminal();
        let event = ProgressEvent {
            seq: state.next_seq,
            timestamp: Utc::now(),
            kind,
        };
        state.next_seq += 1;

        // Sliding window: drop the oldest event once the buffer is full, so
        // the newest events (and always the terminal one) stay replayable
        if state.events.len() == self.buffer_capacity {
            if let Some(evicted) = state.events.pop_front() {
                warn!(
                    "Event buffer full for request {}, event {} no longer replayable",
                    request_id.short(),
                    evicted.seq
                );
            }
        }
        state.events.push_back(event.clone());

        let _ = state.live_tx.send(event);

        if terminal {
            state.closed = true;
            let _ = state.closed_tx.send(true);
        }
    }

    /// Close a stream without a terminal event (request cancelled)
    pub async fn close(&self, request_id: RequestId) {
        let channel = self.channel(request_id).await;
        let mut state = channel.lock().await;
        state.closed = true;
        let _ = state.closed_tx.send(true);
    }

    /// Subscribe to a request's feed, replaying from the first event
    pub async fn subscribe(&self, request_id: RequestId) -> Subscription {
        let channel = self.channel(request_id).await;
        // The broadcast receiver is created under the channel lock so no event
        // can fall between the buffered prefix and the live tail
        let state = channel.lock().await;
        let live_rx = state.live_tx.subscribe();
        let closed_rx = state.closed_tx.subscribe();
        drop(state);

        Subscription {
            channel,
            live_rx,
            closed_rx,
            next_seq: 0,
            done: false,
        }
    }
}

/// One subscriber's view of a request feed
pub struct Subscription {
    channel: Arc<Mutex<ChannelState>>,
    live_rx: broadcast::Receiver<ProgressEvent>,
    closed_rx: watch::Receiver<bool>,
    next_seq: u64,
    done: bool,
}

impl Subscription {
    /// Next event in sequence order, or `None` once the stream has ended
    pub async fn next(&mut self) -> Option<ProgressEvent> {
        loop {
            if self.done {
                return None;
            }

            // Serve from the buffer while we are behind
            {
                let state = self.channel.lock().await;
                // The window may have evicted events we never saw; fast-forward
                // to the oldest retained one rather than wait on a seq that
                // can no longer arrive
                if let Some(front) = state.events.front() {
                    if front.seq > self.next_seq {
                        warn!(
                            "Subscriber behind replay window, skipping {} evicted events",
                            front.seq - self.next_seq
                        );
                        self.next_seq = front.seq;
                    }
                }
                if let Some(event) = state.events.iter().find(|e| e.seq == self.next_seq) {
                    let event = event.clone();
                    self.next_seq = event.seq + 1;
                    if event.kind.is_terminal() {
                        self.done = true;
                    }
                    return Some(event);
                }
                if state.closed && self.next_seq >= state.next_seq {
                    self.done = true;
                    return None;
                }
            }

            // Caught up; wait for a live event or stream closure
            tokio::select! {
                received = self.live_rx.recv() => match received {
                    Ok(event) => {
                        if event.seq < self.next_seq {
                            continue; // already delivered via replay
                        }
                        self.next_seq = event.seq + 1;
                        if event.kind.is_terminal() {
                            self.done = true;
                        }
                        return Some(event);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Subscriber lagged {} events, resyncing from buffer", skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        self.done = true;
                        return None;
                    }
                },
                _ = self.closed_rx.changed() => continue,
            }
        }
    }

    /// Drain the remaining stream into a vector (test helper)
    pub async fn collect(mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next().await {
            events.push(event);
        }
        events
    }
}
