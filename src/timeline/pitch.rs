//! Pitch names ("C#4") and MIDI note number conversion.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Accidental prefixes that occupy the narrow lane between two naturals.
pub const SHARP_PREFIXES: [&str; 5] = ["C#", "D#", "F#", "G#", "A#"];

const MIDI_NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Note name plus octave, e.g. "C4" or "F#2".
///
/// Stored verbatim; a name that matches no lane is still a valid pitch for
/// input matching, it simply never produces geometry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pitch(String);

impl Pitch {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Convert a MIDI note number to its sharp-spelled name (60 → "C4").
    pub fn from_midi(note: u8) -> Self {
        let octave = (note / 12) as i32 - 1;
        let name = MIDI_NOTE_NAMES[(note % 12) as usize];
        Self(format!("{}{}", name, octave))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn is_sharp(&self) -> bool {
        self.0
            .get(..2)
            .map(|prefix| SHARP_PREFIXES.contains(&prefix))
            .unwrap_or(false)
    }

    /// The natural this pitch sits next to: "C#4" → "C4". Naturals map to themselves.
    pub fn natural_base(&self) -> String {
        if self.is_sharp() {
            format!("{}{}", &self.0[..1], &self.0[2..])
        } else {
            self.0.clone()
        }
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Pitch {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Pitch {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Pitch {
    fn from(value: String) -> Self {
        Self(value)
    }
}
