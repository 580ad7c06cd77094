// Session error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Session error code constants
///
/// Error code range: 1001-1006
pub struct SessionErrorCodes {}

impl SessionErrorCodes {
    /// Tempo must be finite and positive
    pub const TEMPO_INVALID: i32 = 1001;

    /// Duration must be finite and non-negative
    pub const DURATION_INVALID: i32 = 1002;

    /// Session actor is not running (already shut down)
    pub const NOT_RUNNING: i32 = 1003;

    /// Command or reply channel closed unexpectedly
    pub const CHANNEL_CLOSED: i32 = 1004;

    /// Mutex was poisoned
    pub const LOCK_POISONED: i32 = 1005;

    /// No tokio runtime available to host the session actor
    pub const RUNTIME_UNAVAILABLE: i32 = 1006;
}

/// Log a session error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_session_error(err: &SessionError, context: &str) {
    error!(
        "Session error in {}: code={}, component=SessionHandle, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Session-related errors
///
/// These cover the async handle and transport command validation.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Tempo value is invalid
    TempoInvalid { bpm: f64 },

    /// Duration value is invalid
    DurationInvalid { seconds: f64 },

    /// Session actor already stopped
    NotRunning,

    /// Channel to or from the actor closed
    ChannelClosed { channel: String },

    /// Mutex was poisoned
    LockPoisoned { component: String },

    /// Handle was created outside a tokio runtime
    RuntimeUnavailable { reason: String },
}

impl ErrorCode for SessionError {
    fn code(&self) -> i32 {
        match self {
            SessionError::TempoInvalid { .. } => SessionErrorCodes::TEMPO_INVALID,
            SessionError::DurationInvalid { .. } => SessionErrorCodes::DURATION_INVALID,
            SessionError::NotRunning => SessionErrorCodes::NOT_RUNNING,
            SessionError::ChannelClosed { .. } => SessionErrorCodes::CHANNEL_CLOSED,
            SessionError::LockPoisoned { .. } => SessionErrorCodes::LOCK_POISONED,
            SessionError::RuntimeUnavailable { .. } => SessionErrorCodes::RUNTIME_UNAVAILABLE,
        }
    }

    fn message(&self) -> String {
        match self {
            SessionError::TempoInvalid { bpm } => {
                format!("Tempo must be a positive number of BPM (got {})", bpm)
            }
            SessionError::DurationInvalid { seconds } => {
                format!("Duration must be a non-negative number of seconds (got {})", seconds)
            }
            SessionError::NotRunning => {
                "Session not running. Spawn a new SessionHandle.".to_string()
            }
            SessionError::ChannelClosed { channel } => {
                format!("Session channel closed: {}", channel)
            }
            SessionError::LockPoisoned { component } => {
                format!("Lock poisoned for component: {}", component)
            }
            SessionError::RuntimeUnavailable { reason } => {
                format!("Tokio runtime unavailable: {}", reason)
            }
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SessionError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SessionError {}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for SessionError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        SessionError::ChannelClosed {
            channel: "command".to_string(),
        }
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for SessionError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        SessionError::ChannelClosed {
            channel: "reply".to_string(),
        }
    }
}
