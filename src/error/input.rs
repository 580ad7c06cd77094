// Input source error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Input error code constants
///
/// Error code range: 2001-2004
pub struct InputErrorCodes {}

impl InputErrorCodes {
    /// Input source is not connected
    pub const NOT_CONNECTED: i32 = 2001;

    /// Input source is already connected
    pub const ALREADY_CONNECTED: i32 = 2002;

    /// Subscriber id is not registered
    pub const UNKNOWN_SUBSCRIBER: i32 = 2003;

    /// Subscriber registry mutex was poisoned
    pub const LOCK_POISONED: i32 = 2004;
}

/// Log an input error with structured context
pub fn log_input_error(err: &InputError, context: &str) {
    error!(
        "Input error in {}: code={}, component=InputSource, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Input-source lifecycle errors
#[derive(Debug, Clone, PartialEq)]
pub enum InputError {
    /// Events cannot be delivered while disconnected
    NotConnected,

    /// `connect` called twice
    AlreadyConnected,

    /// `unsubscribe` called with an id that was never issued or already removed
    UnknownSubscriber { id: u64 },

    /// Registry lock poisoned
    LockPoisoned,
}

impl ErrorCode for InputError {
    fn code(&self) -> i32 {
        match self {
            InputError::NotConnected => InputErrorCodes::NOT_CONNECTED,
            InputError::AlreadyConnected => InputErrorCodes::ALREADY_CONNECTED,
            InputError::UnknownSubscriber { .. } => InputErrorCodes::UNKNOWN_SUBSCRIBER,
            InputError::LockPoisoned => InputErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            InputError::NotConnected => {
                "Input source not connected. Call connect() first.".to_string()
            }
            InputError::AlreadyConnected => "Input source already connected".to_string(),
            InputError::UnknownSubscriber { id } => {
                format!("No subscriber registered with id {}", id)
            }
            InputError::LockPoisoned => "Input subscriber registry lock poisoned".to_string(),
        }
    }
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InputError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for InputError {}
