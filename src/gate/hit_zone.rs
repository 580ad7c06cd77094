//! Hit-Zone Detector
//!
//! Tracks which note occurrences currently intersect the hit-line band and
//! which of them have already paused playback once.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;

use crate::geometry::Projector;
use crate::timeline::{Note, NoteOccurrenceId, Pitch};

/// Membership changes produced by one recompute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneUpdate {
    pub entered: Vec<NoteOccurrenceId>,
    pub exited: Vec<NoteOccurrenceId>,
    /// Any drawable note with some part inside the canvas
    pub notes_on_screen: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HitZoneState {
    at_hit_line: BTreeSet<NoteOccurrenceId>,
    already_paused: HashSet<NoteOccurrenceId>,
    last_paused: Option<NoteOccurrenceId>,
}

impl HitZoneState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at_hit_line(&self) -> &BTreeSet<NoteOccurrenceId> {
        &self.at_hit_line
    }

    pub fn already_paused(&self) -> &HashSet<NoteOccurrenceId> {
        &self.already_paused
    }

    pub fn last_paused(&self) -> Option<&NoteOccurrenceId> {
        self.last_paused.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.at_hit_line.is_empty()
            && self.already_paused.is_empty()
            && self.last_paused.is_none()
    }

    /// Recompute band membership at `elapsed_ms`.
    ///
    /// Notes without a lane never enter. An occurrence leaves only once it
    /// is completely past the hit-line; when that empties the set the last
    /// paused marker is cleared too.
    pub fn update(
        &mut self,
        notes: &[Note],
        projector: &Projector,
        elapsed_ms: f64,
        bpm: f64,
    ) -> ZoneUpdate {
        let mut update = ZoneUpdate::default();

        for note in notes {
            if projector.lane(&note.pitch).is_none() {
                continue;
            }
            let span = projector.vertical(note, elapsed_ms, bpm);
            update.notes_on_screen |= projector.is_on_screen(&span);

            let contact = projector.band_contact(&span);
            let id = note.occurrence_id();
            if contact.in_band() {
                if self.at_hit_line.insert(id.clone()) {
                    update.entered.push(id);
                }
            } else if contact.completely_past && self.at_hit_line.remove(&id) {
                update.exited.push(id);
            }
        }

        if !update.exited.is_empty() && self.at_hit_line.is_empty() {
            self.last_paused = None;
        }
        update
    }

    /// Recompute after a jump in time. Members that are no longer in the
    /// band (either side) are dropped, then the regular update runs.
    pub fn resync(
        &mut self,
        notes: &[Note],
        projector: &Projector,
        elapsed_ms: f64,
        bpm: f64,
    ) -> ZoneUpdate {
        let in_band: HashSet<NoteOccurrenceId> = notes
            .iter()
            .filter(|note| projector.lane(&note.pitch).is_some())
            .filter(|note| {
                let span = projector.vertical(note, elapsed_ms, bpm);
                projector.band_contact(&span).in_band()
            })
            .map(Note::occurrence_id)
            .collect();

        let stale: Vec<NoteOccurrenceId> = self
            .at_hit_line
            .iter()
            .filter(|id| !in_band.contains(*id))
            .cloned()
            .collect();
        for id in &stale {
            self.at_hit_line.remove(id);
        }

        let mut update = self.update(notes, projector, elapsed_ms, bpm);
        if !stale.is_empty() && self.at_hit_line.is_empty() {
            self.last_paused = None;
        }
        update.exited.splice(0..0, stale);
        update
    }

    /// Distinct pitches of every occurrence at the hit-line.
    pub fn required_pitches(&self) -> BTreeSet<Pitch> {
        self.at_hit_line.iter().map(|id| id.pitch.clone()).collect()
    }

    /// Occurrences at the hit-line that have not paused playback yet, in
    /// start-time order.
    pub fn untriggered(&self) -> Vec<&NoteOccurrenceId> {
        let mut pending: Vec<&NoteOccurrenceId> = self
            .at_hit_line
            .iter()
            .filter(|id| !self.already_paused.contains(*id))
            .collect();
        pending.sort_by(|a, b| a.start_us.cmp(&b.start_us).then_with(|| a.pitch.cmp(&b.pitch)));
        pending
    }

    /// Record a gate pause: every untriggered occurrence is now spent.
    /// Returns the occurrences marked, the last of which becomes
    /// `last_paused`.
    pub fn mark_paused(&mut self) -> Vec<NoteOccurrenceId> {
        let marked: Vec<NoteOccurrenceId> = self.untriggered().into_iter().cloned().collect();
        for id in &marked {
            self.already_paused.insert(id.clone());
        }
        if let Some(last) = marked.last() {
            self.last_paused = Some(last.clone());
        }
        marked
    }

    pub fn clear(&mut self) {
        self.at_hit_line.clear();
        self.already_paused.clear();
        self.last_paused = None;
    }
}
