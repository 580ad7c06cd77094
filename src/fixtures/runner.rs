//! Deterministic virtual-time driver for `PracticeSession`.
//!
//! Three sources compete for the next instant: the pending grace deadline,
//! the next queued action and the next animation frame. At equal times
//! they are taken in that order, so a grace that expires on a frame
//! boundary is seen before the tick.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::SessionError;
use crate::gate::{GraceToken, PauseReason, ResumeCause};
use crate::session::{PlaybackState, PracticeSession, SessionEffect};
use crate::telemetry::{ManualTimeSource, SessionEvent, TelemetryCollector, TelemetryRecord};
use crate::timeline::NoteOccurrenceId;

use super::performer::SyntheticPerformer;
use super::scenario::{validate_positive_ms, Dispatch, Scenario, ScriptAction, ScriptStep};

const TELEMETRY_BUFFER: usize = 1024;
const TELEMETRY_HISTORY: usize = 4096;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseRecord {
    pub at_ms: f64,
    pub reason: PauseReason,
    pub scrub_position_s: f64,
    pub occurrence: Option<NoteOccurrenceId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeRecord {
    pub at_ms: f64,
    pub cause: ResumeCause,
    pub scrub_position_s: f64,
}

/// Outcome of one scenario run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub scenario: String,
    pub frame_ms: f64,
    /// Virtual time at which the run stopped
    pub run_ms: f64,
    pub pauses: Vec<PauseRecord>,
    pub resumes: Vec<ResumeRecord>,
    /// Virtual time at which the timeline ran out, if it did
    pub ended_at_ms: Option<f64>,
    pub final_state: PlaybackState,
    pub performer_misses: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<TelemetryRecord>,
}

impl SessionReport {
    pub fn gate_pauses(&self) -> impl Iterator<Item = &PauseRecord> {
        self.pauses
            .iter()
            .filter(|pause| pause.reason == PauseReason::Gate)
    }

    pub fn without_events(mut self) -> Self {
        self.events.clear();
        self
    }
}

#[derive(Debug, Clone)]
struct QueuedStep {
    at_ms: f64,
    action: ScriptAction,
}

pub struct ScenarioRunner {
    config: AppConfig,
}

impl ScenarioRunner {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn run(&self, scenario: &Scenario) -> Result<SessionReport, SessionError> {
        let frame_ms = scenario
            .frame_ms
            .unwrap_or(self.config.clock.frame_interval_ms as f64);
        validate_positive_ms(frame_ms)?;
        validate_positive_ms(scenario.horizon_ms)?;

        tracing::info!(
            "[ScenarioRunner] Running {}: {} notes, {} steps, {:.0}ms frames",
            scenario.name,
            scenario.timeline.len(),
            scenario.script.len(),
            frame_ms
        );

        let clock = Arc::new(ManualTimeSource::new());
        let mut run = Run {
            session: PracticeSession::new(self.config.clone(), scenario.timeline.clone()),
            performer: scenario.performer.clone().map(SyntheticPerformer::new),
            telemetry: TelemetryCollector::new(
                TELEMETRY_BUFFER,
                TELEMETRY_HISTORY,
                clock.clone(),
            ),
            clock,
            queue: Vec::new(),
            now_ms: 0.0,
            grace: None,
            pauses: Vec::new(),
            resumes: Vec::new(),
            ended_at_ms: None,
            events: Vec::new(),
        };

        for step in &scenario.script {
            run.enqueue(step.clone());
        }
        if scenario.autoplay {
            run.enqueue(ScriptStep::new(0.0, ScriptAction::Play));
        }

        let mut next_frame_ms = 0.0;
        loop {
            let grace_due = run.grace.map(|(_, deadline)| deadline);
            let step_due = run.queue.first().map(|step| step.at_ms);
            let now = [grace_due, step_due, Some(next_frame_ms)]
                .into_iter()
                .flatten()
                .fold(f64::INFINITY, f64::min);
            if now > scenario.horizon_ms {
                run.now_ms = scenario.horizon_ms;
                break;
            }
            run.set_now(now);

            if grace_due == Some(now) {
                if let Some((token, _)) = run.grace.take() {
                    let effects = run.session.grace_expired(token);
                    run.absorb(effects);
                }
            } else if step_due == Some(now) {
                let step = run.queue.remove(0);
                run.perform(step.action);
            } else {
                let effects = run.session.tick(now);
                run.absorb(effects);
                next_frame_ms += frame_ms;
            }

            if run.is_finished() {
                break;
            }
        }

        let performer_misses = run.performer.as_ref().map_or(0, SyntheticPerformer::misses);
        let report = SessionReport {
            scenario: scenario.name.clone(),
            frame_ms,
            run_ms: run.now_ms,
            final_state: run.session.playback_state(),
            pauses: run.pauses,
            resumes: run.resumes,
            ended_at_ms: run.ended_at_ms,
            performer_misses,
            events: run.events,
        };
        tracing::info!(
            "[ScenarioRunner] {} finished at {:.1}ms: {} pauses, {} resumes",
            report.scenario,
            report.run_ms,
            report.pauses.len(),
            report.resumes.len()
        );
        Ok(report)
    }
}

impl Default for ScenarioRunner {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

struct Run {
    session: PracticeSession,
    performer: Option<SyntheticPerformer>,
    telemetry: TelemetryCollector,
    clock: Arc<ManualTimeSource>,
    queue: Vec<QueuedStep>,
    now_ms: f64,
    grace: Option<(GraceToken, f64)>,
    pauses: Vec<PauseRecord>,
    resumes: Vec<ResumeRecord>,
    ended_at_ms: Option<f64>,
    events: Vec<TelemetryRecord>,
}

impl Run {
    fn set_now(&mut self, now_ms: f64) {
        self.now_ms = now_ms;
        self.clock.set(now_ms.max(0.0).round() as u64);
    }

    /// Keeps the queue ordered by time, then insertion.
    fn enqueue(&mut self, step: ScriptStep) {
        let at_ms = step.at_ms.max(self.now_ms);
        let index = self.queue.partition_point(|queued| queued.at_ms <= at_ms);
        self.queue.insert(
            index,
            QueuedStep {
                at_ms,
                action: step.action,
            },
        );
    }

    fn perform(&mut self, action: ScriptAction) {
        let effects = match action.dispatch() {
            Dispatch::Input(event) => self.session.handle_input(&event),
            Dispatch::Transport(command) => self.session.apply(command),
            Dispatch::Ignored => Vec::new(),
        };
        self.absorb(effects);
    }

    fn absorb(&mut self, effects: Vec<SessionEffect>) {
        for effect in effects {
            match effect {
                SessionEffect::ScheduleGrace { token, delay } => {
                    self.grace = Some((token, self.now_ms + delay.as_secs_f64() * 1000.0));
                }
                SessionEffect::CancelGrace { token } => {
                    if self.grace.map(|(pending, _)| pending) == Some(token) {
                        self.grace = None;
                    }
                }
                SessionEffect::PlaybackChanged { .. } => {}
                SessionEffect::Event(event) => self.observe(event),
            }
        }
    }

    fn observe(&mut self, event: SessionEvent) {
        match &event {
            SessionEvent::PlaybackPaused {
                reason,
                occurrence,
                scrub_position_s,
            } => {
                if *reason == PauseReason::EndOfTimeline {
                    self.ended_at_ms = Some(self.now_ms);
                }
                self.pauses.push(PauseRecord {
                    at_ms: self.now_ms,
                    reason: *reason,
                    scrub_position_s: *scrub_position_s,
                    occurrence: occurrence.clone(),
                });
            }
            SessionEvent::PlaybackStarted {
                cause,
                scrub_position_s,
            } => {
                self.ended_at_ms = None;
                self.resumes.push(ResumeRecord {
                    at_ms: self.now_ms,
                    cause: *cause,
                    scrub_position_s: *scrub_position_s,
                });
            }
            _ => {}
        }

        let reactions = match self.performer.as_mut() {
            Some(performer) => performer.observe(&event, self.now_ms),
            None => Vec::new(),
        };
        for step in reactions {
            self.enqueue(step);
        }

        let record = self.telemetry.record(event);
        self.events.push(record);
    }

    fn is_finished(&self) -> bool {
        self.session.gate().pause_reason() == Some(PauseReason::EndOfTimeline)
            && self.queue.is_empty()
            && self.grace.is_none()
    }
}
