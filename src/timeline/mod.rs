//! Timeline hand-off from the ingestion service.
//!
//! A `Timeline` is the immutable note list plus tempo and total duration.
//! Notes are kept in the order supplied (not necessarily sorted by start
//! time). Values that would break the timing algebra are sanitised here so
//! the synchronisation core never has to reject input.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TimelineError;

mod pitch;

pub use pitch::{Pitch, SHARP_PREFIXES};

/// Tempo used when the ingestion service supplies none (or garbage).
pub const DEFAULT_TEMPO_BPM: f64 = 120.0;

fn default_velocity() -> f64 {
    1.0
}

/// A single note as supplied by ingestion. Times are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(alias = "name")]
    pub pitch: Pitch,
    pub start_time: f64,
    pub duration: f64,
    #[serde(default = "default_velocity")]
    pub velocity: f64,
    #[serde(default)]
    pub track: u32,
}

impl Note {
    pub fn new(
        pitch: impl Into<Pitch>,
        start_time: f64,
        duration: f64,
        velocity: f64,
        track: u32,
    ) -> Self {
        Self {
            pitch: pitch.into(),
            start_time,
            duration,
            velocity,
            track,
        }
    }

    pub fn occurrence_id(&self) -> NoteOccurrenceId {
        NoteOccurrenceId::new(self.pitch.clone(), self.start_time)
    }

    fn sanitized(mut self) -> Self {
        if !self.start_time.is_finite() || self.start_time < 0.0 {
            self.start_time = 0.0;
        }
        if !self.duration.is_finite() || self.duration < 0.0 {
            self.duration = 0.0;
        }
        self.velocity = if self.velocity.is_finite() {
            self.velocity.clamp(0.0, 1.0)
        } else {
            default_velocity()
        };
        self
    }
}

/// Identity of one concrete sounding: the same pitch at another start time
/// is a different occurrence. Start is kept in whole microseconds so the id
/// can be hashed and ordered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NoteOccurrenceId {
    pub pitch: Pitch,
    pub start_us: i64,
}

impl NoteOccurrenceId {
    pub fn new(pitch: Pitch, start_time_ms: f64) -> Self {
        Self {
            pitch,
            start_us: (start_time_ms * 1000.0).round() as i64,
        }
    }

    pub fn start_ms(&self) -> f64 {
        self.start_us as f64 / 1000.0
    }
}

impl fmt::Display for NoteOccurrenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.pitch, self.start_ms())
    }
}

/// On-disk / wire form of a timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineDocument {
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub tempo: Option<f64>,
    /// Seconds
    #[serde(default)]
    pub total_duration: f64,
}

/// Immutable note list plus tempo (BPM) and total duration (seconds).
#[derive(Debug, Clone)]
pub struct Timeline {
    notes: Vec<Note>,
    tempo: f64,
    total_duration: f64,
    index: HashMap<NoteOccurrenceId, usize>,
}

impl Timeline {
    pub fn new(notes: Vec<Note>, tempo: f64, total_duration: f64) -> Self {
        let notes: Vec<Note> = notes.into_iter().map(Note::sanitized).collect();

        let tempo = if tempo.is_finite() && tempo > 0.0 {
            tempo
        } else {
            tracing::warn!(
                "[Timeline] Invalid tempo {}, falling back to {} BPM",
                tempo,
                DEFAULT_TEMPO_BPM
            );
            DEFAULT_TEMPO_BPM
        };
        let total_duration = if total_duration.is_finite() && total_duration > 0.0 {
            total_duration
        } else {
            0.0
        };

        // Same pitch at the same start on two tracks collapses to one occurrence;
        // the first one supplied wins.
        let mut index = HashMap::with_capacity(notes.len());
        for (i, note) in notes.iter().enumerate() {
            index.entry(note.occurrence_id()).or_insert(i);
        }

        Self {
            notes,
            tempo,
            total_duration,
            index,
        }
    }

    pub fn empty(total_duration: f64) -> Self {
        Self::new(Vec::new(), DEFAULT_TEMPO_BPM, total_duration)
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// Earliest-starting note; ties resolve to the first supplied.
    pub fn first_note(&self) -> Option<&Note> {
        self.notes.iter().fold(None, |earliest: Option<&Note>, note| match earliest {
            Some(current) if current.start_time <= note.start_time => Some(current),
            _ => Some(note),
        })
    }

    pub fn note(&self, id: &NoteOccurrenceId) -> Option<&Note> {
        self.index.get(id).map(|&i| &self.notes[i])
    }

    pub fn from_document(doc: TimelineDocument) -> Result<Self, TimelineError> {
        if let Some(index) = doc.notes.iter().position(|note| note.pitch.is_empty()) {
            return Err(TimelineError::EmptyPitch { index });
        }
        Ok(Self::new(
            doc.notes,
            doc.tempo.unwrap_or(DEFAULT_TEMPO_BPM),
            doc.total_duration,
        ))
    }

    pub fn from_json_str(json: &str) -> Result<Self, TimelineError> {
        let doc: TimelineDocument = serde_json::from_str(json)?;
        Self::from_document(doc)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, TimelineError> {
        let contents =
            fs::read_to_string(path.as_ref()).map_err(|err| TimelineError::ReadFailed {
                path: path.as_ref().display().to_string(),
                reason: err.to_string(),
            })?;
        Self::from_json_str(&contents)
    }

    pub fn to_document(&self) -> TimelineDocument {
        TimelineDocument {
            notes: self.notes.clone(),
            tempo: Some(self.tempo),
            total_duration: self.total_duration,
        }
    }
}
