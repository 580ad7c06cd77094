//! Clocks used to stamp telemetry records.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::time::Instant;

/// Source of millisecond timestamps relative to some fixed origin.
pub trait TimeSource: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Milliseconds since construction on the tokio clock, so paused-time
/// tests see virtual timestamps.
pub struct SystemTimeSource {
    start: Instant,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Advances a fixed 10ms per read; monotonic without any real clock.
#[derive(Default)]
pub struct StubTimeSource {
    offset_ms: AtomicU64,
}

impl StubTimeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimeSource for StubTimeSource {
    fn now_ms(&self) -> u64 {
        self.offset_ms.fetch_add(10, Ordering::SeqCst)
    }
}

/// Externally driven clock for virtual-time runs.
#[derive(Default)]
pub struct ManualTimeSource {
    now_ms: AtomicU64,
}

impl ManualTimeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, ms: u64) {
        self.now_ms.store(ms, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
