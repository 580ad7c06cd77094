//! Gate Controller - the play/pause state machine
//!
//! Owns the hit-zone bookkeeping and the single pending grace timer. It
//! does not run timers itself: arming hands back a [`GraceToken`] and a
//! delay, and the caller reports expiry through [`GateController::grace_expired`].
//! Tokens are generation numbers, so an expiry for anything but the
//! currently pending token is ignored.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::GateConfig;
use crate::geometry::Projector;
use crate::input::InputMatcher;
use crate::timeline::{Note, NoteOccurrenceId};

use super::hit_zone::{HitZoneState, ZoneUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    /// Transport command
    User,
    /// A required pitch was not held when the grace window ran out
    Gate,
    EndOfTimeline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeCause {
    User,
    /// Held pitches cover everything at the hit-line
    InputMatched,
    /// Nothing left to play on screen
    PassageClear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateState {
    Playing,
    Paused(PauseReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraceToken(pub u64);

impl fmt::Display for GraceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "grace#{}", self.0)
    }
}

/// What the caller must do after an evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Hold,
    ArmGrace { token: GraceToken, delay: Duration },
    CancelGrace(GraceToken),
    Resume {
        cause: ResumeCause,
        cancelled: Option<GraceToken>,
    },
}

/// Result of a grace expiry.
#[derive(Debug, Clone, PartialEq)]
pub enum GraceOutcome {
    /// Not the pending token
    Stale,
    /// Condition no longer holds; nothing happens
    Resolved,
    Paused { marked: Vec<NoteOccurrenceId> },
}

#[derive(Debug, Clone)]
pub struct GateController {
    state: GateState,
    zone: HitZoneState,
    pending_grace: Option<GraceToken>,
    next_token: u64,
    notes_on_screen: bool,
    grace_window: Duration,
}

impl GateController {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            state: GateState::Paused(PauseReason::User),
            zone: HitZoneState::new(),
            pending_grace: None,
            next_token: 1,
            notes_on_screen: false,
            grace_window: config.grace_window(),
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == GateState::Playing
    }

    pub fn pause_reason(&self) -> Option<PauseReason> {
        match self.state {
            GateState::Playing => None,
            GateState::Paused(reason) => Some(reason),
        }
    }

    pub fn zone(&self) -> &HitZoneState {
        &self.zone
    }

    pub fn pending_grace(&self) -> Option<GraceToken> {
        self.pending_grace
    }

    pub fn refresh_zone(
        &mut self,
        notes: &[Note],
        projector: &Projector,
        elapsed_ms: f64,
        bpm: f64,
    ) -> ZoneUpdate {
        let update = self.zone.update(notes, projector, elapsed_ms, bpm);
        self.notes_on_screen = update.notes_on_screen;
        update
    }

    pub fn resync_zone(
        &mut self,
        notes: &[Note],
        projector: &Projector,
        elapsed_ms: f64,
        bpm: f64,
    ) -> ZoneUpdate {
        let update = self.zone.resync(notes, projector, elapsed_ms, bpm);
        self.notes_on_screen = update.notes_on_screen;
        update
    }

    /// Some occurrence at the hit-line has not paused yet and its pitch
    /// is not held.
    fn pause_condition(&self, input: &InputMatcher) -> bool {
        self.zone
            .untriggered()
            .iter()
            .any(|id| !input.is_held(&id.pitch))
    }

    /// Run the gate rules against the current zone and held input.
    pub fn evaluate(&mut self, input: &InputMatcher) -> GateDecision {
        match self.state {
            GateState::Playing => {
                if self.pause_condition(input) {
                    if self.pending_grace.is_some() {
                        return GateDecision::Hold;
                    }
                    let token = GraceToken(self.next_token);
                    self.next_token += 1;
                    self.pending_grace = Some(token);
                    GateDecision::ArmGrace {
                        token,
                        delay: self.grace_window,
                    }
                } else {
                    match self.pending_grace.take() {
                        Some(token) => GateDecision::CancelGrace(token),
                        None => GateDecision::Hold,
                    }
                }
            }
            GateState::Paused(PauseReason::Gate) => {
                let required = self.zone.required_pitches();
                let cause = if required.is_empty() {
                    if self.notes_on_screen {
                        return GateDecision::Hold;
                    }
                    ResumeCause::PassageClear
                } else if input.covers(required.iter()) {
                    ResumeCause::InputMatched
                } else {
                    return GateDecision::Hold;
                };
                self.state = GateState::Playing;
                GateDecision::Resume {
                    cause,
                    cancelled: self.pending_grace.take(),
                }
            }
            GateState::Paused(_) => GateDecision::Hold,
        }
    }

    /// Re-validate the pause condition for an expired grace timer.
    pub fn grace_expired(&mut self, token: GraceToken, input: &InputMatcher) -> GraceOutcome {
        if self.pending_grace != Some(token) {
            return GraceOutcome::Stale;
        }
        self.pending_grace = None;

        if !self.is_playing() || !self.pause_condition(input) {
            return GraceOutcome::Resolved;
        }
        self.state = GateState::Paused(PauseReason::Gate);
        GraceOutcome::Paused {
            marked: self.zone.mark_paused(),
        }
    }

    /// Returns `false` when already playing.
    pub fn play(&mut self) -> bool {
        if self.is_playing() {
            return false;
        }
        self.state = GateState::Playing;
        true
    }

    /// Pause for `reason`; a pending grace timer is cancelled and returned.
    pub fn pause(&mut self, reason: PauseReason) -> Option<GraceToken> {
        self.state = GateState::Paused(reason);
        self.pending_grace.take()
    }

    /// Clear all per-occurrence bookkeeping. The play state is untouched.
    pub fn reset(&mut self) -> Option<GraceToken> {
        self.zone.clear();
        self.notes_on_screen = false;
        self.pending_grace.take()
    }
}
