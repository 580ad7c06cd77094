//! Input source abstraction.
//!
//! Device layers (MIDI ports, on-screen keyboards, test scripts) sit behind
//! [`InputSource`]. Subscribers are explicitly registered and removed; the
//! source owns its registry, so there is no process-wide listener state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::mpsc;

use crate::error::InputError;
use crate::timeline::Pitch;

use super::midi::decode_midi;
use super::InputEvent;

pub type SubscriberId = u64;

/// A live subscription. Dropping the receiver is enough to stop delivery;
/// the source prunes it on the next emit.
#[derive(Debug)]
pub struct InputSubscription {
    pub id: SubscriberId,
    pub receiver: mpsc::UnboundedReceiver<InputEvent>,
}

/// Trait implemented by press/release event producers.
pub trait InputSource: Send + Sync {
    fn connect(&self) -> Result<(), InputError>;
    fn disconnect(&self) -> Result<(), InputError>;
    fn is_connected(&self) -> bool;
    fn subscribe(&self) -> Result<InputSubscription, InputError>;
    fn unsubscribe(&self, id: SubscriberId) -> Result<(), InputError>;
}

/// In-process input source used by the CLI harness, tests and any
/// front-end that already has decoded key events.
pub struct VirtualInputSource {
    connected: AtomicBool,
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<SubscriberId, mpsc::UnboundedSender<InputEvent>>>,
}

impl VirtualInputSource {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    fn lock_subscribers(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<SubscriberId, mpsc::UnboundedSender<InputEvent>>>, InputError>
    {
        self.subscribers.lock().map_err(|_| InputError::LockPoisoned)
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().map(|s| s.len()).unwrap_or(0)
    }

    /// Deliver an event to every live subscriber. Returns how many received it.
    pub fn emit(&self, event: InputEvent) -> Result<usize, InputError> {
        if !self.is_connected() {
            return Err(InputError::NotConnected);
        }
        let mut subscribers = self.lock_subscribers()?;
        subscribers.retain(|_, tx| tx.send(event.clone()).is_ok());
        Ok(subscribers.len())
    }

    pub fn press(&self, pitch: impl Into<Pitch>) -> Result<usize, InputError> {
        self.emit(InputEvent::Press(pitch.into()))
    }

    pub fn release(&self, pitch: impl Into<Pitch>) -> Result<usize, InputError> {
        self.emit(InputEvent::Release(pitch.into()))
    }

    /// Decode and deliver a raw MIDI message; non-note messages deliver nothing.
    pub fn feed_midi(&self, message: &[u8]) -> Result<usize, InputError> {
        match decode_midi(message) {
            Some(event) => self.emit(event),
            None => Ok(0),
        }
    }
}

impl Default for VirtualInputSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for VirtualInputSource {
    fn connect(&self) -> Result<(), InputError> {
        if self.connected.swap(true, Ordering::SeqCst) {
            return Err(InputError::AlreadyConnected);
        }
        tracing::info!("[VirtualInputSource] Connected");
        Ok(())
    }

    fn disconnect(&self) -> Result<(), InputError> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Err(InputError::NotConnected);
        }
        tracing::info!("[VirtualInputSource] Disconnected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> Result<InputSubscription, InputError> {
        let (tx, receiver) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.lock_subscribers()?.insert(id, tx);
        Ok(InputSubscription { id, receiver })
    }

    fn unsubscribe(&self, id: SubscriberId) -> Result<(), InputError> {
        match self.lock_subscribers()?.remove(&id) {
            Some(_) => Ok(()),
            None => Err(InputError::UnknownSubscriber { id }),
        }
    }
}
