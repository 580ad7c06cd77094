// Timeline loading error types and constants

use crate::error::ErrorCode;
use std::fmt;

/// Timeline error code constants
///
/// Error code range: 3001-3003
pub struct TimelineErrorCodes {}

impl TimelineErrorCodes {
    /// Timeline file could not be read
    pub const READ_FAILED: i32 = 3001;

    /// Timeline JSON could not be parsed
    pub const PARSE_FAILED: i32 = 3002;

    /// A note carries an empty pitch name
    pub const EMPTY_PITCH: i32 = 3003;
}

/// Errors raised while loading a timeline document
///
/// Only structural problems are errors; out-of-range numbers are sanitised
/// by `Timeline::new` instead.
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineError {
    ReadFailed { path: String, reason: String },
    ParseFailed { reason: String },
    EmptyPitch { index: usize },
}

impl ErrorCode for TimelineError {
    fn code(&self) -> i32 {
        match self {
            TimelineError::ReadFailed { .. } => TimelineErrorCodes::READ_FAILED,
            TimelineError::ParseFailed { .. } => TimelineErrorCodes::PARSE_FAILED,
            TimelineError::EmptyPitch { .. } => TimelineErrorCodes::EMPTY_PITCH,
        }
    }

    fn message(&self) -> String {
        match self {
            TimelineError::ReadFailed { path, reason } => {
                format!("Failed to read timeline {}: {}", path, reason)
            }
            TimelineError::ParseFailed { reason } => {
                format!("Failed to parse timeline JSON: {}", reason)
            }
            TimelineError::EmptyPitch { index } => {
                format!("Note {} has an empty pitch name", index)
            }
        }
    }
}

impl fmt::Display for TimelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TimelineError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for TimelineError {}

impl From<serde_json::Error> for TimelineError {
    fn from(err: serde_json::Error) -> Self {
        TimelineError::ParseFailed {
            reason: err.to_string(),
        }
    }
}
