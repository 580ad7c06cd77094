use futures::Stream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{BroadcastStream, UnboundedReceiverStream};
use tokio_stream::StreamExt;

use crate::session::Frame;
use crate::telemetry::TelemetryRecord;

use super::{PlaybackSignal, SessionHandle};

impl SessionHandle {
    // ========================================================================
    // STREAM SUBSCRIPTIONS
    // ========================================================================

    /// `None` once the session has shut down.
    pub fn subscribe_frames(&self) -> Option<broadcast::Receiver<Frame>> {
        self.broadcasts.subscribe_frames()
    }

    pub fn subscribe_playback(&self) -> Option<broadcast::Receiver<PlaybackSignal>> {
        self.broadcasts.subscribe_playback()
    }

    pub fn subscribe_telemetry(&self) -> broadcast::Receiver<TelemetryRecord> {
        self.telemetry().subscribe()
    }

    // ========================================================================
    // STREAM ADAPTERS
    // ========================================================================

    /// Frames as a stream; frames missed by a slow consumer are skipped.
    pub fn frame_stream(&self) -> impl Stream<Item = Frame> {
        lossy_stream(self.subscribe_frames())
    }

    pub fn playback_stream(&self) -> impl Stream<Item = PlaybackSignal> {
        lossy_stream(self.subscribe_playback())
    }

    /// Every telemetry record from now on, without loss.
    pub fn telemetry_stream(&self) -> impl Stream<Item = TelemetryRecord> {
        UnboundedReceiverStream::new(self.telemetry().subscribe_unbounded())
    }
}

fn lossy_stream<T>(receiver: Option<broadcast::Receiver<T>>) -> impl Stream<Item = T>
where
    T: Clone + Send + 'static,
{
    let (tx, rx) = broadcast::channel(1);
    drop(tx);
    let receiver = receiver.unwrap_or(rx);
    BroadcastStream::new(receiver).filter_map(|item| item.ok())
}
