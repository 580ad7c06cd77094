//! Fixed lane table: 52 natural keys A0..C8, sharps in narrow offset lanes.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::config::CanvasConfig;
use crate::timeline::{Pitch, SHARP_PREFIXES};

/// Sharp lanes start this far into their natural's column...
pub const SHARP_OFFSET_RATIO: f64 = 0.75;
/// ...and are this fraction of a column wide.
pub const SHARP_WIDTH_RATIO: f64 = 0.48;

const OCTAVE_LETTERS: [char; 7] = ['C', 'D', 'E', 'F', 'G', 'A', 'B'];

static NATURAL_LANES: Lazy<Vec<String>> = Lazy::new(|| {
    let mut lanes = vec!["A0".to_string(), "B0".to_string()];
    for octave in 1..=7 {
        for letter in OCTAVE_LETTERS {
            lanes.push(format!("{}{}", letter, octave));
        }
    }
    lanes.push("C8".to_string());
    lanes
});

static LANE_INDEX: Lazy<HashMap<&'static str, usize>> = Lazy::new(|| {
    NATURAL_LANES
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect()
});

/// Natural lane names in left-to-right order.
pub fn natural_lanes() -> &'static [String] {
    &NATURAL_LANES
}

/// Number of natural lanes (the column count).
pub fn total_keys() -> usize {
    NATURAL_LANES.len()
}

/// Index of a natural lane by name ("C4" → 23).
pub fn lane_index(natural: &str) -> Option<usize> {
    LANE_INDEX.get(natural).copied()
}

/// Horizontal placement of a pitch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LanePlacement {
    pub x: f64,
    pub width: f64,
    pub is_sharp: bool,
}

/// Width of one natural column for the given canvas.
pub fn column_width(canvas: &CanvasConfig) -> f64 {
    (canvas.width - canvas.margin * 2.0) / total_keys() as f64
}

/// Resolve pitch → lane. `None` for pitches outside the table.
pub fn place(pitch: &Pitch, canvas: &CanvasConfig) -> Option<LanePlacement> {
    let column = column_width(canvas);
    let is_sharp = pitch.is_sharp();
    let index = lane_index(&pitch.natural_base())?;

    Some(if is_sharp {
        LanePlacement {
            x: canvas.margin + column * index as f64 + column * SHARP_OFFSET_RATIO,
            width: column * SHARP_WIDTH_RATIO,
            is_sharp,
        }
    } else {
        LanePlacement {
            x: canvas.margin + column * index as f64,
            width: column,
            is_sharp,
        }
    })
}

/// One backdrop column for the output sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneColumn {
    pub label: String,
    pub x: f64,
    pub width: f64,
    pub is_sharp: bool,
}

/// Every natural column plus the sharp column that follows it, if any.
/// The last natural (C8) has no sharp neighbour.
pub fn lane_columns(canvas: &CanvasConfig) -> Vec<LaneColumn> {
    let column = column_width(canvas);
    let last = NATURAL_LANES.len() - 1;
    let mut columns = Vec::with_capacity(NATURAL_LANES.len() * 2);

    for (i, natural) in NATURAL_LANES.iter().enumerate() {
        let x = canvas.margin + column * i as f64;
        columns.push(LaneColumn {
            label: natural.clone(),
            x,
            width: column,
            is_sharp: false,
        });

        if i < last {
            let sharp = format!("{}#{}", &natural[..1], &natural[1..]);
            if SHARP_PREFIXES.contains(&&sharp[..2]) {
                columns.push(LaneColumn {
                    label: sharp,
                    x: x + column * SHARP_OFFSET_RATIO,
                    width: column * SHARP_WIDTH_RATIO,
                    is_sharp: true,
                });
            }
        }
    }

    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_shape() {
        assert_eq!(total_keys(), 52);
        assert_eq!(natural_lanes()[0], "A0");
        assert_eq!(natural_lanes()[2], "C1");
        assert_eq!(natural_lanes()[51], "C8");
        assert_eq!(lane_index("C4"), Some(23));
        assert_eq!(lane_index("H4"), None);
    }

    #[test]
    fn test_natural_placement() {
        let canvas = CanvasConfig::default();
        let column = column_width(&canvas);
        let lane = place(&Pitch::from("C4"), &canvas).unwrap();
        assert!(!lane.is_sharp);
        assert!((lane.x - column * 23.0).abs() < 1e-9);
        assert!((lane.width - column).abs() < 1e-9);
    }

    #[test]
    fn test_sharp_placement_sits_between_naturals() {
        let canvas = CanvasConfig::default();
        let column = column_width(&canvas);
        let natural = place(&Pitch::from("C4"), &canvas).unwrap();
        let next = place(&Pitch::from("D4"), &canvas).unwrap();
        let sharp = place(&Pitch::from("C#4"), &canvas).unwrap();
        assert!(sharp.is_sharp);
        assert!(sharp.x > natural.x && sharp.x < next.x);
        assert!((sharp.width - column * 0.48).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_pitch_has_no_lane() {
        let canvas = CanvasConfig::default();
        assert!(place(&Pitch::from("C9"), &canvas).is_none());
        assert!(place(&Pitch::from("C#8"), &canvas).is_some());
        assert!(place(&Pitch::from("Db4"), &canvas).is_none());
        assert!(place(&Pitch::from(""), &canvas).is_none());
    }

    #[test]
    fn test_lane_columns() {
        let columns = lane_columns(&CanvasConfig::default());
        let sharps = columns.iter().filter(|c| c.is_sharp).count();
        // A#0 plus five per octave for octaves 1..=7
        assert_eq!(sharps, 36);
        assert_eq!(columns.len(), 52 + 36);
        assert!(columns.iter().all(|c| c.label != "B#0" && c.label != "E#4"));
        assert_eq!(columns.last().unwrap().label, "C8");
    }
}
