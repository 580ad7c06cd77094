// BroadcastChannelManager: Centralized tokio broadcast channel management
// Single Responsibility: Broadcast channel lifecycle and subscription

use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::engine::PlaybackSignal;
use crate::session::Frame;

/// Frames are produced every tick while playing (~60 Hz); a second of
/// backlog is plenty for a render loop.
const FRAME_BUFFER: usize = 64;
const PLAYBACK_BUFFER: usize = 16;

/// Manages the output-sink broadcast channels of a session
///
/// # Channel Types
/// - Frames: per-tick draw descriptors plus transport snapshot
/// - Playback: the play/pause signal, sent only on change
pub struct BroadcastChannelManager {
    frames: Arc<Mutex<Option<broadcast::Sender<Frame>>>>,
    playback: Arc<Mutex<Option<broadcast::Sender<PlaybackSignal>>>>,
}

impl BroadcastChannelManager {
    /// Create a new BroadcastChannelManager with all channels uninitialized
    ///
    /// Channels must be explicitly initialized via init_* methods before use.
    pub fn new() -> Self {
        Self {
            frames: Arc::new(Mutex::new(None)),
            playback: Arc::new(Mutex::new(None)),
        }
    }

    // ========================================================================
    // FRAME CHANNEL
    // ========================================================================

    /// Initialize the frame channel, replacing any previous one.
    ///
    /// Existing subscribers of a replaced channel see it close.
    pub fn init_frames(&self) -> broadcast::Sender<Frame> {
        let (tx, _) = broadcast::channel(FRAME_BUFFER);
        if let Ok(mut slot) = self.frames.lock() {
            *slot = Some(tx.clone());
        }
        tx
    }

    /// `None` until `init_frames()` has been called.
    pub fn subscribe_frames(&self) -> Option<broadcast::Receiver<Frame>> {
        self.frames
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().map(|tx| tx.subscribe()))
    }

    /// Publish a frame. Returns the number of receivers reached; a frame with
    /// nobody listening is simply dropped.
    pub fn publish_frame(&self, frame: Frame) -> usize {
        self.frames
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().and_then(|tx| tx.send(frame).ok()))
            .unwrap_or(0)
    }

    // ========================================================================
    // PLAYBACK SIGNAL CHANNEL
    // ========================================================================

    pub fn init_playback(&self) -> broadcast::Sender<PlaybackSignal> {
        let (tx, _) = broadcast::channel(PLAYBACK_BUFFER);
        if let Ok(mut slot) = self.playback.lock() {
            *slot = Some(tx.clone());
        }
        tx
    }

    pub fn subscribe_playback(&self) -> Option<broadcast::Receiver<PlaybackSignal>> {
        self.playback
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().map(|tx| tx.subscribe()))
    }

    pub fn publish_playback(&self, signal: PlaybackSignal) -> usize {
        self.playback
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().and_then(|tx| tx.send(signal).ok()))
            .unwrap_or(0)
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Drop every sender so subscribers observe `RecvError::Closed`.
    pub fn close_all(&self) {
        if let Ok(mut slot) = self.frames.lock() {
            *slot = None;
        }
        if let Ok(mut slot) = self.playback.lock() {
            *slot = None;
        }
    }
}

impl Default for BroadcastChannelManager {
    fn default() -> Self {
        Self::new()
    }
}
