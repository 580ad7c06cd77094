//! Engine module housing the async session host.
//!
//! `SessionHandle` runs a `PracticeSession` on a tokio actor and fans its
//! output out to the output sink (frames, play/pause signal) and telemetry.

pub mod core;

pub use core::{PlaybackSignal, SessionCommand, SessionHandle};
