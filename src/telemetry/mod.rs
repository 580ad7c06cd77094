//! Diagnostics telemetry collector.
//!
//! Session events are stamped with an injectable clock, kept in a bounded
//! history and fanned out over a broadcast stream. Nothing in the gate or
//! the clock reads them back.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc};

pub mod events;
pub mod time_source;

pub use events::{SessionEvent, TelemetryRecord};
pub use time_source::{ManualTimeSource, StubTimeSource, SystemTimeSource, TimeSource};

/// Snapshot of collector state for CLI reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<TelemetryRecord>,
    pub total_events: u64,
    pub dropped_events: u64,
}

/// Broadcast-based collector retaining a bounded history of records.
pub struct TelemetryCollector {
    tx: broadcast::Sender<TelemetryRecord>,
    history: Mutex<VecDeque<TelemetryRecord>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
    time_source: Arc<dyn TimeSource>,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize, time_source: Arc<dyn TimeSource>) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
            time_source,
        }
    }

    pub fn record(&self, event: SessionEvent) -> TelemetryRecord {
        let record = TelemetryRecord {
            timestamp_ms: self.time_source.now_ms(),
            event,
        };
        self.publish(record.clone());
        record
    }

    pub fn publish(&self, record: TelemetryRecord) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut history) = self.history.lock() {
            if self.history_capacity == 0 {
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            } else {
                if history.len() == self.history_capacity {
                    history.pop_front();
                    self.dropped_history.fetch_add(1, Ordering::Relaxed);
                }
                history.push_back(record.clone());
            }
        }

        let _ = self.tx.send(record);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryRecord> {
        self.tx.subscribe()
    }

    /// Lossless relay for consumers that cannot keep up with the broadcast
    /// buffer. Requires a tokio runtime.
    pub fn subscribe_unbounded(&self) -> mpsc::UnboundedReceiver<TelemetryRecord> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut broadcast_rx = self.tx.subscribe();

        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(record) => {
                        if tx.send(record).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("[Telemetry] Relay lagged, skipped {} records", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        rx
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let recent = self
            .history
            .lock()
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default();
        TelemetrySnapshot {
            recent,
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 512, Arc::new(SystemTimeSource::new()))
    }
}
