//! Hit-line detection and the gate that pauses playback until the
//! performer holds what is required.

pub mod controller;
pub mod hit_zone;

pub use controller::{
    GateController, GateDecision, GateState, GraceOutcome, GraceToken, PauseReason, ResumeCause,
};
pub use hit_zone::{HitZoneState, ZoneUpdate};
