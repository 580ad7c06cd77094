//! Clock Driver - virtual playback time
//!
//! The driver owns `elapsed_ms`, the virtual time geometry is projected
//! from. It only moves while `Running`, by one clamped frame delta per
//! animation tick, so a stalled or spiking frame rate cannot make notes
//! jump past the hit-line.
//!
//! Seeking does not move `elapsed_ms` to `scrub * 1000` directly: a
//! calibration offset derived from the earliest note is subtracted so a
//! freshly seeked display lines that note up the same way regardless of
//! song length. The offset constants are empirical; the mapping is kept
//! as-is rather than re-derived.

use serde::{Deserialize, Serialize};

use crate::config::ClockConfig;
use crate::geometry::Projector;
use crate::timeline::Note;

// Empirical rebase calibration.
const TEMPO_SPREAD_DIVISOR: f64 = 200.0;
const DURATION_SPREAD_DIVISOR: f64 = 400.0;
const HIT_LINE_INSET_RATIO: f64 = 0.005;
const LOG_DAMPING_GAIN: f64 = -0.0095;
const REQUIRED_ELAPSED_BIAS_MS: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockState {
    Stopped,
    Running,
}

/// Offset (ms) to subtract from `scrub * 1000` when rebasing.
///
/// Zero for an empty timeline, so elapsed time then tracks the scrub
/// position exactly.
pub fn calibration_offset_ms(
    first_note: Option<&Note>,
    total_duration_s: f64,
    bpm: f64,
    projector: &Projector,
) -> f64 {
    let Some(first) = first_note else {
        return 0.0;
    };
    let speed = projector.speed(bpm);
    if speed <= 0.0 || bpm <= 0.0 {
        return 0.0;
    }

    let canvas_height = projector.canvas_height();
    let first_height = projector.height(first.duration, bpm);
    let initial_y = canvas_height - first_height
        + (bpm / TEMPO_SPREAD_DIVISOR) * (total_duration_s / DURATION_SPREAD_DIVISOR);
    let required_elapsed = (initial_y + first_height - canvas_height * HIT_LINE_INSET_RATIO)
        / speed
        + first.start_time;
    let damping = ((total_duration_s + 1.0).ln() / bpm) * LOG_DAMPING_GAIN;

    (required_elapsed + REQUIRED_ELAPSED_BIAS_MS) * damping * 1000.0
}

/// "m:ss" for the transport display; fractional seconds are truncated.
pub fn format_clock(seconds: f64) -> String {
    let whole = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", whole / 60, whole % 60)
}

#[derive(Debug, Clone)]
pub struct ClockDriver {
    state: ClockState,
    elapsed_ms: f64,
    offset_ms: f64,
    last_frame_ms: Option<f64>,
    min_frame_ms: f64,
    max_frame_ms: f64,
}

impl ClockDriver {
    pub fn new(config: &ClockConfig) -> Self {
        Self {
            state: ClockState::Stopped,
            elapsed_ms: 0.0,
            offset_ms: 0.0,
            last_frame_ms: None,
            min_frame_ms: config.min_frame_ms,
            max_frame_ms: config.max_frame_ms.max(config.min_frame_ms),
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    pub fn offset_ms(&self) -> f64 {
        self.offset_ms
    }

    /// Stopped → Running. The next frame only establishes a reference
    /// timestamp; the loop restarts fresh instead of resuming.
    pub fn start(&mut self) -> bool {
        if self.state == ClockState::Running {
            return false;
        }
        self.state = ClockState::Running;
        self.last_frame_ms = None;
        true
    }

    pub fn stop(&mut self) -> bool {
        if self.state == ClockState::Stopped {
            return false;
        }
        self.state = ClockState::Stopped;
        self.last_frame_ms = None;
        true
    }

    pub fn clamp_delta(&self, raw_ms: f64) -> f64 {
        if raw_ms.is_nan() {
            return self.min_frame_ms;
        }
        raw_ms.clamp(self.min_frame_ms, self.max_frame_ms)
    }

    /// Process one animation frame at `frame_ms` (any monotonic ms clock).
    ///
    /// Returns the delta applied, never more than `limit_ms`. `None` while
    /// stopped and on the first frame after a (re)start.
    pub fn tick(&mut self, frame_ms: f64, limit_ms: f64) -> Option<f64> {
        if self.state != ClockState::Running {
            return None;
        }
        let previous = self.last_frame_ms.replace(frame_ms)?;
        let delta = self.clamp_delta(frame_ms - previous).min(limit_ms.max(0.0));
        self.elapsed_ms += delta;
        Some(delta)
    }

    /// Recompute `elapsed_ms` for a new scrub position or timeline.
    ///
    /// Pure in its inputs: rebasing twice to the same position yields the
    /// same elapsed time.
    pub fn rebase(
        &mut self,
        scrub_position_s: f64,
        total_duration_s: f64,
        bpm: f64,
        first_note: Option<&Note>,
        projector: &Projector,
    ) -> f64 {
        self.offset_ms = calibration_offset_ms(first_note, total_duration_s, bpm, projector);
        self.elapsed_ms = scrub_position_s * 1000.0 - self.offset_ms;
        self.last_frame_ms = None;
        self.elapsed_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver() -> ClockDriver {
        ClockDriver::new(&ClockConfig::default())
    }

    #[test]
    fn test_stopped_clock_does_not_advance() {
        let mut clock = driver();
        assert_eq!(clock.tick(0.0, f64::MAX), None);
        assert_eq!(clock.tick(16.0, f64::MAX), None);
        assert_eq!(clock.elapsed_ms(), 0.0);
    }

    #[test]
    fn test_first_frame_after_start_only_records() {
        let mut clock = driver();
        assert!(clock.start());
        assert!(!clock.start());
        assert_eq!(clock.tick(1000.0, f64::MAX), None);
        let delta = clock.tick(1016.0, f64::MAX).unwrap();
        assert!((delta - 16.0).abs() < 1e-9);
        assert!((clock.elapsed_ms() - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_delta_clamped() {
        let mut clock = driver();
        clock.start();
        clock.tick(0.0, f64::MAX);
        // A 500ms stall only advances one max frame
        let delta = clock.tick(500.0, f64::MAX).unwrap();
        assert!((delta - 1000.0 / 30.0).abs() < 1e-9);
        // A 1ms frame advances one min frame
        let delta = clock.tick(501.0, f64::MAX).unwrap();
        assert!((delta - 1000.0 / 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_delta_limited() {
        let mut clock = driver();
        clock.start();
        clock.tick(0.0, f64::MAX);
        let delta = clock.tick(16.0, 5.0).unwrap();
        assert_eq!(delta, 5.0);
    }

    #[test]
    fn test_restart_is_fresh() {
        let mut clock = driver();
        clock.start();
        clock.tick(0.0, f64::MAX);
        clock.tick(16.0, f64::MAX);
        clock.stop();
        clock.start();
        // Ten seconds later: no catch-up on the first frame back
        assert_eq!(clock.tick(10_016.0, f64::MAX), None);
        assert!((clock.elapsed_ms() - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_calibration_offset_reference_value() {
        let projector = Projector::default();
        let note = Note::new("C4", 0.0, 500.0, 1.0, 0);
        let offset = calibration_offset_ms(Some(&note), 3.0, 120.0, &projector);
        assert!((offset + 182.01).abs() < 0.1, "offset was {}", offset);
    }

    #[test]
    fn test_calibration_offset_empty_timeline() {
        let projector = Projector::default();
        assert_eq!(calibration_offset_ms(None, 30.0, 120.0, &projector), 0.0);
    }

    #[test]
    fn test_rebase_idempotent() {
        let projector = Projector::default();
        let note = Note::new("C4", 250.0, 500.0, 1.0, 0);
        let mut clock = driver();
        let a = clock.rebase(15.0, 30.0, 120.0, Some(&note), &projector);
        clock.start();
        clock.tick(0.0, f64::MAX);
        clock.tick(30.0, f64::MAX);
        let b = clock.rebase(15.0, 30.0, 120.0, Some(&note), &projector);
        assert_eq!(a, b);
        assert_eq!(clock.elapsed_ms(), b);
        assert_eq!(b, 15_000.0 - clock.offset_ms());
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0.0), "0:00");
        assert_eq!(format_clock(9.9), "0:09");
        assert_eq!(format_clock(65.2), "1:05");
        assert_eq!(format_clock(-3.0), "0:00");
    }
}
