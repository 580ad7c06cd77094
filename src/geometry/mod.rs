//! Geometry Projector - note + elapsed time → screen position
//!
//! Pure and stateless. Notes fall from above the canvas toward the hit-line at
//! the bottom edge; a note's vertical position is a linear function of the
//! virtual elapsed time:
//!
//! - `speed  = (bpm / 120) * base_speed` (pixels per millisecond)
//! - `height = max(duration * speed, min_height)`
//! - `y      = (elapsed - start_time) * speed - height`
//!
//! A note whose top edge is below the canvas (`y > canvas_height`) has
//! passed the hit-line and is no longer drawn.

use serde::{Deserialize, Serialize};

use crate::config::{CanvasConfig, GateConfig};
use crate::timeline::{Note, Pitch};

pub mod lanes;
pub mod render;

pub use lanes::{lane_columns, LaneColumn, LanePlacement};
pub use render::{scale_velocity, DrawCommand, Renderer};

/// Tempo at which `base_speed` applies unscaled.
pub const REFERENCE_BPM: f64 = 120.0;

/// Vertical extent of a note at some elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerticalSpan {
    pub y: f64,
    pub height: f64,
}

impl VerticalSpan {
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// Full geometry of a drawable note.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteGeometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub is_sharp: bool,
}

/// Relation of a note to the hit-line band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandContact {
    /// Bottom edge within `detection_margin` of the canvas bottom (or beyond)
    pub touching_bottom: bool,
    /// Top edge below the canvas
    pub completely_past: bool,
}

impl BandContact {
    pub fn in_band(&self) -> bool {
        self.touching_bottom && !self.completely_past
    }
}

#[derive(Debug, Clone)]
pub struct Projector {
    base_speed: f64,
    min_height: f64,
    detection_margin: f64,
    canvas: CanvasConfig,
}

impl Projector {
    pub fn new(gate: &GateConfig, canvas: &CanvasConfig) -> Self {
        Self {
            base_speed: gate.base_speed,
            min_height: gate.min_height,
            detection_margin: gate.detection_margin,
            canvas: canvas.clone(),
        }
    }

    pub fn canvas(&self) -> &CanvasConfig {
        &self.canvas
    }

    pub fn canvas_height(&self) -> f64 {
        self.canvas.height
    }

    /// Pixels per millisecond at the given tempo.
    pub fn speed(&self, bpm: f64) -> f64 {
        (bpm / REFERENCE_BPM) * self.base_speed
    }

    pub fn height(&self, duration: f64, bpm: f64) -> f64 {
        (duration * self.speed(bpm)).max(self.min_height)
    }

    pub fn vertical(&self, note: &Note, elapsed_ms: f64, bpm: f64) -> VerticalSpan {
        let height = self.height(note.duration, bpm);
        let y = (elapsed_ms - note.start_time) * self.speed(bpm) - height;
        VerticalSpan { y, height }
    }

    pub fn lane(&self, pitch: &Pitch) -> Option<LanePlacement> {
        lanes::place(pitch, &self.canvas)
    }

    /// `None` when the pitch has no lane; such notes are silently skipped.
    pub fn project(&self, note: &Note, elapsed_ms: f64, bpm: f64) -> Option<NoteGeometry> {
        let lane = self.lane(&note.pitch)?;
        let span = self.vertical(note, elapsed_ms, bpm);
        Some(NoteGeometry {
            x: lane.x,
            y: span.y,
            width: lane.width,
            height: span.height,
            is_sharp: lane.is_sharp,
        })
    }

    pub fn is_past_hit_line(&self, span: &VerticalSpan) -> bool {
        span.y > self.canvas.height
    }

    /// Any part of the note inside the canvas.
    pub fn is_on_screen(&self, span: &VerticalSpan) -> bool {
        !self.is_past_hit_line(span) && span.bottom() >= 0.0
    }

    /// Band test on whole pixels so sub-pixel jitter between frames cannot
    /// flip membership.
    pub fn band_contact(&self, span: &VerticalSpan) -> BandContact {
        let y = span.y.round();
        let height = span.height.round();
        let threshold = (self.canvas.height - self.detection_margin).round();
        BandContact {
            touching_bottom: y + height >= threshold,
            completely_past: y > self.canvas.height,
        }
    }
}

impl Default for Projector {
    fn default() -> Self {
        Self::new(&GateConfig::default(), &CanvasConfig::default())
    }
}
