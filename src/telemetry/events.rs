//! Session event types recorded by the telemetry collector and surfaced
//! through the CLI report and the session handle's event stream.

use serde::{Deserialize, Serialize};

use crate::gate::{PauseReason, ResumeCause};
use crate::input::PressOutcome;
use crate::timeline::{NoteOccurrenceId, Pitch};

/// Diagnostic transitions of a practice session. Informational only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum SessionEvent {
    PlaybackStarted {
        cause: ResumeCause,
        scrub_position_s: f64,
    },
    PlaybackPaused {
        reason: PauseReason,
        occurrence: Option<NoteOccurrenceId>,
        scrub_position_s: f64,
    },
    GraceArmed {
        token: u64,
        delay_ms: u64,
    },
    GraceCancelled {
        token: u64,
    },
    GraceExpired {
        token: u64,
        paused: bool,
    },
    ZoneEntered {
        occurrence: NoteOccurrenceId,
    },
    ZoneExited {
        occurrence: NoteOccurrenceId,
    },
    Pressed {
        pitch: Pitch,
        outcome: PressOutcome,
    },
    Released {
        pitch: Pitch,
    },
    Rebased {
        scrub_position_s: f64,
        elapsed_ms: f64,
        offset_ms: f64,
    },
    BookkeepingCleared,
    TimelineLoaded {
        notes: usize,
        tempo: f64,
        total_duration_s: f64,
    },
    TimelineEnded {
        elapsed_ms: f64,
    },
}

impl SessionEvent {
    /// Short kind label used by log lines and CLI filters.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::PlaybackStarted { .. } => "playback_started",
            SessionEvent::PlaybackPaused { .. } => "playback_paused",
            SessionEvent::GraceArmed { .. } => "grace_armed",
            SessionEvent::GraceCancelled { .. } => "grace_cancelled",
            SessionEvent::GraceExpired { .. } => "grace_expired",
            SessionEvent::ZoneEntered { .. } => "zone_entered",
            SessionEvent::ZoneExited { .. } => "zone_exited",
            SessionEvent::Pressed { .. } => "pressed",
            SessionEvent::Released { .. } => "released",
            SessionEvent::Rebased { .. } => "rebased",
            SessionEvent::BookkeepingCleared => "bookkeeping_cleared",
            SessionEvent::TimelineLoaded { .. } => "timeline_loaded",
            SessionEvent::TimelineEnded { .. } => "timeline_ended",
        }
    }
}

/// A session event stamped with the collector's clock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryRecord {
    pub timestamp_ms: u64,
    pub event: SessionEvent,
}
