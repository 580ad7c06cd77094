// Keyfall Trainer Core - falling-notes practice engine
// Wait-for-input gating: playback halts when a note reaches the hit-line
// unplayed and resumes once the performer holds the right keys.

// Module declarations
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod fixtures;
pub mod gate;
pub mod geometry;
pub mod input;
pub mod managers;
pub mod session;
pub mod telemetry;
pub mod timeline;

// Re-exports for convenience
pub use config::AppConfig;
pub use engine::{PlaybackSignal, SessionHandle};
pub use error::{ErrorCode, InputError, SessionError, TimelineError};
pub use gate::{PauseReason, ResumeCause};
pub use input::{InputEvent, InputSource, VirtualInputSource};
pub use session::{Frame, PlaybackState, PracticeSession, SessionEffect, TransportCommand};
pub use timeline::{Note, NoteOccurrenceId, Pitch, Timeline};

/// Install the stderr `tracing` subscriber. Safe to call more than once;
/// later calls leave the first subscriber in place.
pub fn init_logging() {
    let installed = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .try_init()
        .is_ok();
    if installed {
        tracing::info!("[Keyfall] Logging initialised");
    }
}
