//! Draw descriptors consumed by the output sink.

use serde::{Deserialize, Serialize};

use crate::config::RenderConfig;
use crate::timeline::{Note, NoteOccurrenceId};

use super::Projector;

/// One rounded rectangle to draw this frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawCommand {
    pub occurrence: NoteOccurrenceId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// 0xRRGGBB
    pub color: u32,
    pub alpha: f32,
    pub corner_radius: f64,
}

/// Linear map of velocity in [0,1] onto [min_alpha, max_alpha].
pub fn scale_velocity(velocity: f64, min_alpha: f32, max_alpha: f32) -> f32 {
    let v = velocity.clamp(0.0, 1.0) as f32;
    min_alpha + v * (max_alpha - min_alpha)
}

/// Turns projected notes into draw commands.
#[derive(Debug, Clone)]
pub struct Renderer {
    projector: Projector,
    style: RenderConfig,
}

impl Renderer {
    pub fn new(projector: Projector, style: RenderConfig) -> Self {
        Self { projector, style }
    }

    /// `None` for notes without a lane or already past the hit-line.
    pub fn draw(&self, note: &Note, elapsed_ms: f64, bpm: f64) -> Option<DrawCommand> {
        let geometry = self.projector.project(note, elapsed_ms, bpm)?;
        if geometry.y > self.projector.canvas_height() {
            return None;
        }

        let colors = self.style.colors_for_track(note.track);
        Some(DrawCommand {
            occurrence: note.occurrence_id(),
            x: geometry.x,
            y: geometry.y,
            width: geometry.width,
            height: geometry.height,
            color: if geometry.is_sharp {
                colors.sharp
            } else {
                colors.normal
            },
            alpha: scale_velocity(note.velocity, self.style.min_alpha, self.style.max_alpha),
            corner_radius: self.style.corner_radius,
        })
    }

    pub fn draw_all<'a, I>(&self, notes: I, elapsed_ms: f64, bpm: f64) -> Vec<DrawCommand>
    where
        I: IntoIterator<Item = &'a Note>,
    {
        notes
            .into_iter()
            .filter_map(|note| self.draw(note, elapsed_ms, bpm))
            .collect()
    }
}
