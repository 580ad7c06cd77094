use super::*;
use crate::timeline::Note;

const FRAME_MS: f64 = 16.0;

/// Steps a session in virtual time: frames every 16ms, grace expiries at
/// their exact deadlines.
struct Harness {
    session: PracticeSession,
    now_ms: f64,
    next_frame_ms: f64,
    grace: Option<(GraceToken, f64)>,
    pauses: Vec<(f64, PauseReason)>,
    resumes: Vec<f64>,
    events: Vec<(f64, SessionEvent)>,
}

impl Harness {
    fn new(timeline: Timeline) -> Self {
        Self {
            session: PracticeSession::new(AppConfig::default(), timeline),
            now_ms: 0.0,
            next_frame_ms: 0.0,
            grace: None,
            pauses: Vec::new(),
            resumes: Vec::new(),
            events: Vec::new(),
        }
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
                SessionEffect::PlaybackChanged { playing: true, .. } => {
                    self.resumes.push(self.now_ms);
                }
                SessionEffect::PlaybackChanged {
                    playing: false,
                    reason,
                } => {
                    self.pauses.push((self.now_ms, reason.unwrap()));
                }
                SessionEffect::Event(event) => self.events.push((self.now_ms, event)),
            }
        }
    }

    fn advance_to(&mut self, target_ms: f64) {
        loop {
            let grace_due = self.grace.map(|(_, deadline)| deadline);
            let next = match grace_due {
                Some(deadline) if deadline <= self.next_frame_ms => deadline,
                _ => self.next_frame_ms,
            };
            if next > target_ms {
                self.now_ms = target_ms;
                break;
            }
            self.now_ms = next;
            if grace_due == Some(next) {
                let (token, _) = self.grace.take().unwrap();
                let effects = self.session.grace_expired(token);
                self.absorb(effects);
            } else {
                let effects = self.session.tick(next);
                self.absorb(effects);
                self.next_frame_ms += FRAME_MS;
            }
        }
    }

    fn play(&mut self) {
        let effects = self.session.play();
        self.absorb(effects);
    }

    fn press(&mut self, pitch: &str) {
        let effects = self.session.press(&Pitch::from(pitch));
        self.absorb(effects);
    }

    fn release(&mut self, pitch: &str) {
        let effects = self.session.release(&Pitch::from(pitch));
        self.absorb(effects);
    }

    fn gate_pauses(&self) -> Vec<f64> {
        self.pauses
            .iter()
            .filter(|(_, reason)| *reason == PauseReason::Gate)
            .map(|(at, _)| *at)
            .collect()
    }

    fn first_event_time(&self, kind: &str) -> Option<f64> {
        self.events
            .iter()
            .find(|(_, event)| event.kind() == kind)
            .map(|(at, _)| *at)
    }
}

fn single_c4(total: f64) -> Timeline {
    Timeline::new(vec![Note::new("C4", 0.0, 500.0, 1.0, 0)], 120.0, total)
}

#[test]
fn test_new_session_is_paused_at_start() {
    let session = PracticeSession::new(AppConfig::default(), single_c4(3.0));
    let state = session.playback_state();
    assert!(!state.is_playing);
    assert_eq!(state.scrub_position_s, 0.0);
    assert_eq!(state.display, "0:00");
    assert_eq!(state.pause_reason, Some(PauseReason::User));
    assert!((state.elapsed_ms - 182.01).abs() < 0.1);
}

#[test]
fn test_empty_timeline_runs_to_end() {
    let mut h = Harness::new(Timeline::empty(30.0));
    h.play();
    h.advance_to(31_000.0);

    assert!(h.gate_pauses().is_empty());
    assert_eq!(h.pauses.len(), 1);
    assert_eq!(h.pauses[0].1, PauseReason::EndOfTimeline);
    assert!((h.session.elapsed_ms() - 30_000.0).abs() < 1e-3);
    assert_eq!(h.session.scrub_position_s(), 30.0);
    assert!(!h.session.clock().is_running());
}

#[test]
fn test_held_pitch_plays_through() {
    let mut h = Harness::new(single_c4(3.0));
    h.press("C4");
    h.play();
    h.advance_to(4_000.0);

    assert!(h.first_event_time("zone_entered").is_some());
    assert!(h.first_event_time("zone_exited").is_some());
    assert!(h.first_event_time("grace_armed").is_none());
    assert!(h.gate_pauses().is_empty());
    assert_eq!(h.pauses.last().map(|p| p.1), Some(PauseReason::EndOfTimeline));
}

#[test]
fn test_missed_note_pauses_once() {
    let mut h = Harness::new(single_c4(3.0));
    h.play();
    h.advance_to(2_000.0);

    let entered = h.first_event_time("zone_entered").unwrap();
    let pauses = h.gate_pauses();
    assert_eq!(pauses.len(), 1);
    assert!(pauses[0] - entered >= 200.0 - 1e-9);
    assert!(pauses[0] - entered < 200.0 + FRAME_MS);
    assert!(!h.session.is_playing());

    let occurrence = Note::new("C4", 0.0, 500.0, 1.0, 0).occurrence_id();
    assert!(h.session.gate().zone().already_paused().contains(&occurrence));
    assert_eq!(h.session.gate().zone().last_paused(), Some(&occurrence));

    // frozen while paused
    let elapsed = h.session.elapsed_ms();
    h.advance_to(2_500.0);
    assert_eq!(h.session.elapsed_ms(), elapsed);

    h.press("C4");
    assert!(h.session.is_playing());
    assert_eq!(h.resumes.last(), Some(&2_500.0));
    assert_eq!(
        h.session.input().state().pitch_awaiting_release,
        Some(Pitch::from("C4"))
    );

    h.release("C4");
    h.advance_to(6_000.0);
    assert_eq!(h.gate_pauses().len(), 1);
    assert!(h.first_event_time("zone_exited").is_some());
    assert_eq!(h.pauses.last().map(|p| p.1), Some(PauseReason::EndOfTimeline));
}

#[test]
fn test_recovery_within_grace_window() {
    let timeline = Timeline::new(vec![Note::new("C4", 0.0, 2_000.0, 1.0, 0)], 120.0, 5.0);
    let mut h = Harness::new(timeline);
    h.press("C4");
    h.play();
    h.advance_to(1_800.0);
    assert!(h.session.gate().zone().at_hit_line().len() == 1);

    h.release("C4");
    assert!(h.grace.is_some());
    h.advance_to(1_900.0);
    h.press("C4");
    assert!(h.grace.is_none());
    assert!(h.first_event_time("grace_cancelled").is_some());

    h.advance_to(7_000.0);
    assert!(h.gate_pauses().is_empty());
}

#[test]
fn test_losing_coverage_keeps_playing_through_grace() {
    let timeline = Timeline::new(vec![Note::new("C4", 0.0, 2_000.0, 1.0, 0)], 120.0, 5.0);
    let mut h = Harness::new(timeline);
    h.press("C4");
    h.play();
    h.advance_to(1_800.0);
    h.release("C4");

    h.advance_to(1_999.0);
    assert!(h.session.is_playing());
    h.advance_to(2_100.0);
    assert_eq!(h.gate_pauses(), vec![2_000.0]);
}

#[test]
fn test_wrong_pitch_does_not_resume() {
    let mut h = Harness::new(single_c4(3.0));
    h.press("C4");
    h.release("C4");
    h.play();
    h.advance_to(2_000.0);
    assert_eq!(h.gate_pauses().len(), 1);

    h.press("E4");
    assert!(!h.session.is_playing());
    h.press("C4");
    assert!(h.session.is_playing());
}

#[test]
fn test_seek_is_idempotent() {
    let mut session = PracticeSession::new(AppConfig::default(), single_c4(30.0));
    session.play();
    session.tick(0.0);
    session.tick(16.0);
    session.seek(15.0);
    let first = session.elapsed_ms();
    session.tick(32.0);
    session.tick(48.0);
    session.seek(15.0);
    assert_eq!(session.elapsed_ms(), first);
    assert_eq!(first, 15_000.0 - session.clock().offset_ms());
    assert!(session.is_playing());
}

#[test]
fn test_seek_to_zero_clears_bookkeeping() {
    let mut h = Harness::new(single_c4(3.0));
    h.play();
    h.advance_to(2_000.0);
    assert!(!h.session.gate().zone().is_empty());

    let effects = h.session.seek(0.0);
    assert!(effects.contains(&SessionEffect::Event(SessionEvent::BookkeepingCleared)));
    assert!(h.session.gate().zone().is_empty());
    assert_eq!(h.session.scrub_position_s(), 0.0);
}

#[test]
fn test_seek_clamps_and_ignores_garbage() {
    let mut session = PracticeSession::new(AppConfig::default(), single_c4(3.0));
    session.seek(99.0);
    assert_eq!(session.scrub_position_s(), 3.0);
    session.seek(-4.0);
    assert_eq!(session.scrub_position_s(), 0.0);
    assert!(session.seek(f64::NAN).is_empty());
}

#[test]
fn test_step_back() {
    let mut session = PracticeSession::new(AppConfig::default(), single_c4(30.0));
    session.seek(12.0);
    session.step_back();
    assert_eq!(session.scrub_position_s(), 7.0);
    session.step_back();
    session.step_back();
    assert_eq!(session.scrub_position_s(), 0.0);

    session.seek(12.0);
    session.play();
    assert!(session.step_back().is_empty());
    assert_eq!(session.scrub_position_s(), 12.0);
}

#[test]
fn test_pause_cancels_pending_grace() {
    let mut h = Harness::new(single_c4(3.0));
    h.play();
    h.advance_to(1_500.0);
    assert!(h.grace.is_some());

    let effects = h.session.pause();
    h.absorb(effects);
    assert!(h.grace.is_none());
    assert_eq!(h.pauses.last().map(|p| p.1), Some(PauseReason::User));

    // a user pause is never lifted by input
    h.press("C4");
    assert!(!h.session.is_playing());
}

#[test]
fn test_reset_pauses_and_rewinds() {
    let mut h = Harness::new(single_c4(3.0));
    h.play();
    h.advance_to(1_000.0);
    let effects = h.session.reset();
    h.absorb(effects);
    assert!(!h.session.is_playing());
    assert_eq!(h.session.scrub_position_s(), 0.0);
    assert!(h.session.gate().zone().is_empty());
}

#[test]
fn test_load_timeline_resets_everything() {
    let mut h = Harness::new(single_c4(3.0));
    h.play();
    h.advance_to(2_000.0);

    let next = Timeline::new(vec![Note::new("E4", 1000.0, 250.0, 0.5, 1)], 90.0, 8.0);
    let effects = h.session.load_timeline(next);
    assert!(matches!(
        effects.iter().find(|e| matches!(e, SessionEffect::Event(SessionEvent::TimelineLoaded { .. }))),
        Some(SessionEffect::Event(SessionEvent::TimelineLoaded { notes: 1, .. }))
    ));
    let state = h.session.playback_state();
    assert!(!state.is_playing);
    assert_eq!(state.scrub_position_s, 0.0);
    assert_eq!(state.tempo, 90.0);
    assert_eq!(state.total_duration_s, 8.0);
    assert!(h.session.gate().zone().is_empty());
}

#[test]
fn test_play_at_end_rewinds() {
    let mut h = Harness::new(Timeline::empty(1.0));
    h.play();
    h.advance_to(2_000.0);
    assert!(!h.session.is_playing());
    assert_eq!(h.session.scrub_position_s(), 1.0);

    h.play();
    assert!(h.session.is_playing());
    assert_eq!(h.session.scrub_position_s(), 0.0);
}

#[test]
fn test_unknown_pitch_never_gates() {
    let timeline = Timeline::new(vec![Note::new("Q4", 0.0, 500.0, 1.0, 0)], 120.0, 3.0);
    let mut h = Harness::new(timeline);
    h.play();
    h.advance_to(4_000.0);
    assert!(h.first_event_time("zone_entered").is_none());
    assert!(h.gate_pauses().is_empty());
    assert!(h.session.frame().draws.is_empty());
}

#[test]
fn test_frame_contents() {
    let mut h = Harness::new(single_c4(3.0));
    h.press("C4");
    h.play();
    h.advance_to(1_600.0);

    let frame = h.session.frame();
    assert!(frame.playback.is_playing);
    assert_eq!(frame.draws.len(), 1);
    assert_eq!(frame.at_hit_line.len(), 1);
    let draw = &frame.draws[0];
    assert_eq!(draw.color, 0xb500ff);
    assert_eq!(draw.alpha, 1.0);
    assert_eq!(draw.height, 150.0);
}
