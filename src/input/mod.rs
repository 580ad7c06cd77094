//! Input side: held-pitch matching and the device event sources feeding it.

pub mod matcher;
pub mod midi;
pub mod source;

pub use matcher::{InputEvent, InputMatcher, InputState, PressOutcome};
pub use midi::decode_midi;
pub use source::{InputSource, InputSubscription, SubscriberId, VirtualInputSource};
