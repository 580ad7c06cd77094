// Error types for the keyfall trainer
//
// The synchronisation core never fails: malformed input degrades to skip/ignore.
// These types cover the outer surfaces only (timeline loading, input-source
// lifecycle and the async session handle), each carrying a stable numeric code.

mod input;
mod session;
mod timeline;

pub use input::{log_input_error, InputError, InputErrorCodes};
pub use session::{log_session_error, SessionError, SessionErrorCodes};
pub use timeline::{TimelineError, TimelineErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, so CLI reports and telemetry can surface
/// them uniformly.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
