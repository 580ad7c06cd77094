//! Input Matcher - the set of physically held pitches
//!
//! Press/release events arrive with no ordering guarantee relative to clock
//! ticks. Two rules keep spurious device traffic from satisfying the gate:
//!
//! - a press repeating the last pressed pitch, without that pitch having
//!   been released in between, is a retrigger and is dropped;
//! - a pitch that just resolved a pause must be released before another
//!   press of it is accepted.
//!
//! Held input is keyed by pitch only. Two simultaneous occurrences of the
//! same pitch on different tracks are satisfied by one held key.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::timeline::Pitch;

/// Event delivered by an input source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "pitch", rename_all = "snake_case")]
pub enum InputEvent {
    Press(Pitch),
    Release(Pitch),
}

impl InputEvent {
    pub fn pitch(&self) -> &Pitch {
        match self {
            InputEvent::Press(pitch) | InputEvent::Release(pitch) => pitch,
        }
    }
}

/// What the matcher did with a press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressOutcome {
    Accepted,
    /// Same pitch pressed again without an intervening release
    Retrigger,
    /// Pitch must be released before it counts again
    AwaitingRelease,
}

impl PressOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, PressOutcome::Accepted)
    }
}

/// Snapshot of the matcher's bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputState {
    pub held_pitches: HashSet<Pitch>,
    pub last_pressed_pitch: Option<Pitch>,
    pub last_released_pitch: Option<Pitch>,
    pub pitch_awaiting_release: Option<Pitch>,
}

#[derive(Debug, Clone, Default)]
pub struct InputMatcher {
    state: InputState,
}

impl InputMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &InputState {
        &self.state
    }

    pub fn press(&mut self, pitch: &Pitch) -> PressOutcome {
        let state = &mut self.state;
        if state.last_pressed_pitch.as_ref() == Some(pitch)
            && state.last_released_pitch.as_ref() != Some(pitch)
        {
            return PressOutcome::Retrigger;
        }
        if state.pitch_awaiting_release.as_ref() == Some(pitch) {
            return PressOutcome::AwaitingRelease;
        }

        state.held_pitches.insert(pitch.clone());
        state.last_pressed_pitch = Some(pitch.clone());
        PressOutcome::Accepted
    }

    /// Returns whether the pitch was held.
    pub fn release(&mut self, pitch: &Pitch) -> bool {
        let state = &mut self.state;
        let was_held = state.held_pitches.remove(pitch);
        state.last_released_pitch = Some(pitch.clone());
        state.pitch_awaiting_release = None;
        was_held
    }

    pub fn is_held(&self, pitch: &Pitch) -> bool {
        self.state.held_pitches.contains(pitch)
    }

    /// Held set ⊇ required set. Trivially true for an empty requirement.
    pub fn covers<'a, I>(&self, required: I) -> bool
    where
        I: IntoIterator<Item = &'a Pitch>,
    {
        required
            .into_iter()
            .all(|pitch| self.state.held_pitches.contains(pitch))
    }

    pub fn mark_awaiting_release(&mut self, pitch: &Pitch) {
        self.state.pitch_awaiting_release = Some(pitch.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(name: &str) -> Pitch {
        Pitch::from(name)
    }

    #[test]
    fn test_press_and_release() {
        let mut matcher = InputMatcher::new();
        assert_eq!(matcher.press(&p("C4")), PressOutcome::Accepted);
        assert!(matcher.is_held(&p("C4")));
        assert!(matcher.release(&p("C4")));
        assert!(!matcher.is_held(&p("C4")));
        assert_eq!(matcher.state().last_released_pitch, Some(p("C4")));
    }

    #[test]
    fn test_retrigger_suppressed() {
        let mut matcher = InputMatcher::new();
        matcher.press(&p("C4"));
        assert_eq!(matcher.press(&p("C4")), PressOutcome::Retrigger);
        matcher.release(&p("C4"));
        assert_eq!(matcher.press(&p("C4")), PressOutcome::Accepted);
    }

    #[test]
    fn test_release_of_other_pitch_does_not_unlock_retrigger() {
        let mut matcher = InputMatcher::new();
        matcher.press(&p("C4"));
        matcher.release(&p("E4"));
        assert_eq!(matcher.press(&p("C4")), PressOutcome::Retrigger);
        assert!(matcher.is_held(&p("C4")));
    }

    #[test]
    fn test_awaiting_release_blocks_until_released() {
        let mut matcher = InputMatcher::new();
        matcher.press(&p("D4"));
        matcher.press(&p("E4"));
        matcher.mark_awaiting_release(&p("D4"));
        // last pressed is E4, so only the awaiting rule applies
        assert_eq!(matcher.press(&p("D4")), PressOutcome::AwaitingRelease);
        matcher.release(&p("D4"));
        assert_eq!(matcher.state().pitch_awaiting_release, None);
        assert_eq!(matcher.press(&p("D4")), PressOutcome::Accepted);
    }

    #[test]
    fn test_release_without_press() {
        let mut matcher = InputMatcher::new();
        assert!(!matcher.release(&p("A0")));
        assert_eq!(matcher.state().last_released_pitch, Some(p("A0")));
    }

    #[test]
    fn test_covers() {
        let mut matcher = InputMatcher::new();
        assert!(matcher.covers(std::iter::empty()));
        matcher.press(&p("C4"));
        matcher.press(&p("E4"));
        let chord = [p("C4"), p("E4")];
        assert!(matcher.covers(chord.iter()));
        let triad = [p("C4"), p("E4"), p("G4")];
        assert!(!matcher.covers(triad.iter()));
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_string(&InputEvent::Press(p("F#3"))).unwrap();
        assert_eq!(json, r#"{"kind":"press","pitch":"F#3"}"#);
    }
}
