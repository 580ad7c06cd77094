//! PracticeSession - the owned mutable record of one playback session
//!
//! Every producer (animation ticks, device input, transport commands, grace
//! timer expiries) mutates state only through the transition functions
//! here. Each returns the effects the host must carry out: the play/pause
//! signal, grace timers to schedule or cancel, and diagnostic events. The
//! session itself never sleeps, spawns or blocks, so it can be driven by
//! the async actor in `engine` or stepped in virtual time by `fixtures`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::{format_clock, ClockDriver};
use crate::config::AppConfig;
use crate::gate::{
    GateController, GateDecision, GraceOutcome, GraceToken, PauseReason, ResumeCause,
};
use crate::geometry::{DrawCommand, Projector, Renderer};
use crate::input::{InputEvent, InputMatcher};
use crate::telemetry::SessionEvent;
use crate::timeline::{NoteOccurrenceId, Pitch, Timeline};

#[cfg(test)]
mod tests;

/// Transport snapshot for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub elapsed_ms: f64,
    pub is_playing: bool,
    pub scrub_position_s: f64,
    pub tempo: f64,
    pub total_duration_s: f64,
    /// "m:ss" of the scrub position
    pub display: String,
    pub pause_reason: Option<PauseReason>,
}

/// Everything the output sink needs for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub playback: PlaybackState,
    pub draws: Vec<DrawCommand>,
    pub at_hit_line: Vec<NoteOccurrenceId>,
}

/// Transport commands accepted from the controls.
#[derive(Debug, Clone)]
pub enum TransportCommand {
    Play,
    Pause,
    Seek(f64),
    Reset,
    StepBack,
    LoadTimeline(Timeline),
}

/// Work the host must perform after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    PlaybackChanged {
        playing: bool,
        reason: Option<PauseReason>,
    },
    ScheduleGrace {
        token: GraceToken,
        delay: Duration,
    },
    CancelGrace {
        token: GraceToken,
    },
    Event(SessionEvent),
}

pub struct PracticeSession {
    config: AppConfig,
    projector: Projector,
    renderer: Renderer,
    clock: ClockDriver,
    gate: GateController,
    input: InputMatcher,
    timeline: Timeline,
    scrub_position_s: f64,
}

impl PracticeSession {
    /// New session, paused at the start of `timeline`.
    pub fn new(config: AppConfig, timeline: Timeline) -> Self {
        let projector = Projector::new(&config.gate, &config.canvas);
        let renderer = Renderer::new(projector.clone(), config.render.clone());
        let mut session = Self {
            clock: ClockDriver::new(&config.clock),
            gate: GateController::new(&config.gate),
            input: InputMatcher::new(),
            projector,
            renderer,
            timeline,
            scrub_position_s: 0.0,
            config,
        };
        let mut effects = Vec::new();
        session.rebase(&mut effects);
        session.refresh_zone(&mut effects, true);
        session
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn gate(&self) -> &GateController {
        &self.gate
    }

    pub fn input(&self) -> &InputMatcher {
        &self.input
    }

    pub fn clock(&self) -> &ClockDriver {
        &self.clock
    }

    pub fn projector(&self) -> &Projector {
        &self.projector
    }

    pub fn is_playing(&self) -> bool {
        self.gate.is_playing()
    }

    pub fn scrub_position_s(&self) -> f64 {
        self.scrub_position_s
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.clock.elapsed_ms()
    }

    pub fn playback_state(&self) -> PlaybackState {
        PlaybackState {
            elapsed_ms: self.clock.elapsed_ms(),
            is_playing: self.gate.is_playing(),
            scrub_position_s: self.scrub_position_s,
            tempo: self.timeline.tempo(),
            total_duration_s: self.timeline.total_duration(),
            display: format_clock(self.scrub_position_s),
            pause_reason: self.gate.pause_reason(),
        }
    }

    pub fn frame(&self) -> Frame {
        Frame {
            playback: self.playback_state(),
            draws: self.renderer.draw_all(
                self.timeline.notes(),
                self.clock.elapsed_ms(),
                self.timeline.tempo(),
            ),
            at_hit_line: self.gate.zone().at_hit_line().iter().cloned().collect(),
        }
    }

    // ========================================================================
    // PRODUCERS
    // ========================================================================

    /// One animation frame at `frame_ms` on any monotonic millisecond clock.
    pub fn tick(&mut self, frame_ms: f64) -> Vec<SessionEffect> {
        let mut effects = Vec::new();
        if !self.gate.is_playing() {
            return effects;
        }

        let total = self.timeline.total_duration();
        let remaining_ms = ((total - self.scrub_position_s) * 1000.0).max(0.0);
        if let Some(delta) = self.clock.tick(frame_ms, remaining_ms) {
            self.scrub_position_s = if delta >= remaining_ms {
                total
            } else {
                (self.scrub_position_s + delta / 1000.0).min(total)
            };
        }

        self.refresh_zone(&mut effects, false);
        self.evaluate_gate(&mut effects);

        if self.gate.is_playing() && self.scrub_position_s >= total {
            self.finish_timeline(&mut effects);
        }
        effects
    }

    pub fn press(&mut self, pitch: &Pitch) -> Vec<SessionEffect> {
        let mut effects = Vec::new();
        let outcome = self.input.press(pitch);
        tracing::debug!("[PracticeSession] Press {} -> {:?}", pitch, outcome);
        effects.push(SessionEffect::Event(SessionEvent::Pressed {
            pitch: pitch.clone(),
            outcome,
        }));

        if outcome.is_accepted()
            && self.evaluate_gate(&mut effects) == Some(ResumeCause::InputMatched)
        {
            self.input.mark_awaiting_release(pitch);
        }
        effects
    }

    pub fn release(&mut self, pitch: &Pitch) -> Vec<SessionEffect> {
        let mut effects = Vec::new();
        self.input.release(pitch);
        tracing::debug!("[PracticeSession] Release {}", pitch);
        effects.push(SessionEffect::Event(SessionEvent::Released {
            pitch: pitch.clone(),
        }));
        self.evaluate_gate(&mut effects);
        effects
    }

    pub fn handle_input(&mut self, event: &InputEvent) -> Vec<SessionEffect> {
        match event {
            InputEvent::Press(pitch) => self.press(pitch),
            InputEvent::Release(pitch) => self.release(pitch),
        }
    }

    /// A grace timer armed earlier has run out.
    pub fn grace_expired(&mut self, token: GraceToken) -> Vec<SessionEffect> {
        let mut effects = Vec::new();
        match self.gate.grace_expired(token, &self.input) {
            GraceOutcome::Stale => {
                tracing::debug!("[PracticeSession] Ignoring stale {}", token);
            }
            GraceOutcome::Resolved => {
                effects.push(SessionEffect::Event(SessionEvent::GraceExpired {
                    token: token.0,
                    paused: false,
                }));
            }
            GraceOutcome::Paused { marked } => {
                self.clock.stop();
                let occurrence = marked.last().cloned();
                tracing::info!(
                    "[PracticeSession] Paused at {:.3}s waiting for {:?}",
                    self.scrub_position_s,
                    marked.iter().map(ToString::to_string).collect::<Vec<_>>()
                );
                effects.push(SessionEffect::PlaybackChanged {
                    playing: false,
                    reason: Some(PauseReason::Gate),
                });
                effects.push(SessionEffect::Event(SessionEvent::GraceExpired {
                    token: token.0,
                    paused: true,
                }));
                effects.push(SessionEffect::Event(SessionEvent::PlaybackPaused {
                    reason: PauseReason::Gate,
                    occurrence,
                    scrub_position_s: self.scrub_position_s,
                }));
            }
        }
        effects
    }

    // ========================================================================
    // TRANSPORT
    // ========================================================================

    pub fn apply(&mut self, command: TransportCommand) -> Vec<SessionEffect> {
        match command {
            TransportCommand::Play => self.play(),
            TransportCommand::Pause => self.pause(),
            TransportCommand::Seek(seconds) => self.seek(seconds),
            TransportCommand::Reset => self.reset(),
            TransportCommand::StepBack => self.step_back(),
            TransportCommand::LoadTimeline(timeline) => self.load_timeline(timeline),
        }
    }

    /// Start playback. At the end of the timeline this rewinds first.
    pub fn play(&mut self) -> Vec<SessionEffect> {
        let mut effects = Vec::new();
        if self.gate.is_playing() {
            return effects;
        }

        let total = self.timeline.total_duration();
        if total > 0.0 && self.scrub_position_s >= total {
            self.seek_to(0.0, &mut effects);
        }
        self.gate.play();
        self.start_clock(ResumeCause::User, &mut effects);
        self.evaluate_gate(&mut effects);
        effects
    }

    pub fn pause(&mut self) -> Vec<SessionEffect> {
        let mut effects = Vec::new();
        self.pause_into(&mut effects);
        effects
    }

    pub fn seek(&mut self, seconds: f64) -> Vec<SessionEffect> {
        let mut effects = Vec::new();
        if !seconds.is_finite() {
            tracing::warn!("[PracticeSession] Ignoring seek to {}", seconds);
            return effects;
        }
        let target = seconds.clamp(0.0, self.timeline.total_duration().max(0.0));
        self.seek_to(target, &mut effects);
        effects
    }

    /// Pause and return to the start.
    pub fn reset(&mut self) -> Vec<SessionEffect> {
        let mut effects = Vec::new();
        self.pause_into(&mut effects);
        self.seek_to(0.0, &mut effects);
        effects
    }

    /// Jump back `step_back_seconds`. Ignored while playing.
    pub fn step_back(&mut self) -> Vec<SessionEffect> {
        let mut effects = Vec::new();
        if self.gate.is_playing() {
            tracing::debug!("[PracticeSession] Step back ignored while playing");
            return effects;
        }
        let target = (self.scrub_position_s - self.config.clock.step_back_seconds).max(0.0);
        self.seek_to(target, &mut effects);
        effects
    }

    pub fn load_timeline(&mut self, timeline: Timeline) -> Vec<SessionEffect> {
        let mut effects = Vec::new();
        self.pause_into(&mut effects);
        tracing::info!(
            "[PracticeSession] Loaded timeline: {} notes, {} bpm, {:.3}s",
            timeline.len(),
            timeline.tempo(),
            timeline.total_duration()
        );
        effects.push(SessionEffect::Event(SessionEvent::TimelineLoaded {
            notes: timeline.len(),
            tempo: timeline.tempo(),
            total_duration_s: timeline.total_duration(),
        }));
        self.timeline = timeline;
        self.seek_to(0.0, &mut effects);
        effects
    }

    // ========================================================================
    // INTERNAL TRANSITIONS
    // ========================================================================

    fn pause_into(&mut self, effects: &mut Vec<SessionEffect>) {
        if self.gate.pause_reason() == Some(PauseReason::User) {
            return;
        }
        let was_playing = self.gate.is_playing();
        if let Some(token) = self.gate.pause(PauseReason::User) {
            Self::cancel_grace(token, effects);
        }
        if was_playing {
            self.clock.stop();
            effects.push(SessionEffect::PlaybackChanged {
                playing: false,
                reason: Some(PauseReason::User),
            });
        }
        tracing::info!("[PracticeSession] Paused by user");
        effects.push(SessionEffect::Event(SessionEvent::PlaybackPaused {
            reason: PauseReason::User,
            occurrence: None,
            scrub_position_s: self.scrub_position_s,
        }));
    }

    fn seek_to(&mut self, target: f64, effects: &mut Vec<SessionEffect>) {
        self.scrub_position_s = target;
        if target == 0.0 {
            self.clear_bookkeeping(effects);
        }
        self.rebase(effects);
        self.refresh_zone(effects, true);
        self.evaluate_gate(effects);
    }

    fn clear_bookkeeping(&mut self, effects: &mut Vec<SessionEffect>) {
        if let Some(token) = self.gate.reset() {
            Self::cancel_grace(token, effects);
        }
        tracing::debug!("[PracticeSession] Hit-zone bookkeeping cleared");
        effects.push(SessionEffect::Event(SessionEvent::BookkeepingCleared));
    }

    fn rebase(&mut self, effects: &mut Vec<SessionEffect>) {
        let elapsed_ms = self.clock.rebase(
            self.scrub_position_s,
            self.timeline.total_duration(),
            self.timeline.tempo(),
            self.timeline.first_note(),
            &self.projector,
        );
        effects.push(SessionEffect::Event(SessionEvent::Rebased {
            scrub_position_s: self.scrub_position_s,
            elapsed_ms,
            offset_ms: self.clock.offset_ms(),
        }));
    }

    fn refresh_zone(&mut self, effects: &mut Vec<SessionEffect>, resync: bool) {
        let notes = self.timeline.notes();
        let elapsed_ms = self.clock.elapsed_ms();
        let bpm = self.timeline.tempo();
        let update = if resync {
            self.gate.resync_zone(notes, &self.projector, elapsed_ms, bpm)
        } else {
            self.gate.refresh_zone(notes, &self.projector, elapsed_ms, bpm)
        };

        for occurrence in update.entered {
            tracing::debug!("[PracticeSession] {} reached the hit-line", occurrence);
            effects.push(SessionEffect::Event(SessionEvent::ZoneEntered { occurrence }));
        }
        for occurrence in update.exited {
            tracing::debug!("[PracticeSession] {} left the hit-line", occurrence);
            effects.push(SessionEffect::Event(SessionEvent::ZoneExited { occurrence }));
        }
    }

    /// Returns the resume cause when the evaluation restarted playback.
    fn evaluate_gate(&mut self, effects: &mut Vec<SessionEffect>) -> Option<ResumeCause> {
        match self.gate.evaluate(&self.input) {
            GateDecision::Hold => None,
            GateDecision::ArmGrace { token, delay } => {
                tracing::debug!("[PracticeSession] Armed {} for {:?}", token, delay);
                effects.push(SessionEffect::ScheduleGrace { token, delay });
                effects.push(SessionEffect::Event(SessionEvent::GraceArmed {
                    token: token.0,
                    delay_ms: delay.as_millis() as u64,
                }));
                None
            }
            GateDecision::CancelGrace(token) => {
                Self::cancel_grace(token, effects);
                None
            }
            GateDecision::Resume { cause, cancelled } => {
                if let Some(token) = cancelled {
                    Self::cancel_grace(token, effects);
                }
                self.start_clock(cause, effects);
                Some(cause)
            }
        }
    }

    fn start_clock(&mut self, cause: ResumeCause, effects: &mut Vec<SessionEffect>) {
        self.clock.start();
        tracing::info!(
            "[PracticeSession] Playing from {:.3}s ({:?})",
            self.scrub_position_s,
            cause
        );
        effects.push(SessionEffect::PlaybackChanged {
            playing: true,
            reason: None,
        });
        effects.push(SessionEffect::Event(SessionEvent::PlaybackStarted {
            cause,
            scrub_position_s: self.scrub_position_s,
        }));
    }

    fn finish_timeline(&mut self, effects: &mut Vec<SessionEffect>) {
        if let Some(token) = self.gate.pause(PauseReason::EndOfTimeline) {
            Self::cancel_grace(token, effects);
        }
        self.clock.stop();
        tracing::info!(
            "[PracticeSession] End of timeline at {:.1}ms",
            self.clock.elapsed_ms()
        );
        effects.push(SessionEffect::PlaybackChanged {
            playing: false,
            reason: Some(PauseReason::EndOfTimeline),
        });
        effects.push(SessionEffect::Event(SessionEvent::TimelineEnded {
            elapsed_ms: self.clock.elapsed_ms(),
        }));
        effects.push(SessionEffect::Event(SessionEvent::PlaybackPaused {
            reason: PauseReason::EndOfTimeline,
            occurrence: None,
            scrub_position_s: self.scrub_position_s,
        }));
    }

    fn cancel_grace(token: GraceToken, effects: &mut Vec<SessionEffect>) {
        tracing::debug!("[PracticeSession] Cancelled {}", token);
        effects.push(SessionEffect::CancelGrace { token });
        effects.push(SessionEffect::Event(SessionEvent::GraceCancelled { token: token.0 }));
    }
}
