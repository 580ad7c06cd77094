//! Raw MIDI message decoding into press/release events.

use crate::timeline::Pitch;

use super::InputEvent;

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;

/// Decode a channel voice message. Note-on with velocity 0 is a release.
/// Everything that is not a note message is ignored.
pub fn decode_midi(message: &[u8]) -> Option<InputEvent> {
    let (&status, rest) = message.split_first()?;
    let (&note, rest) = rest.split_first()?;
    let velocity = rest.first().copied().unwrap_or(0);
    let pitch = Pitch::from_midi(note & 0x7f);

    match status & 0xf0 {
        NOTE_ON if velocity > 0 => Some(InputEvent::Press(pitch)),
        NOTE_ON | NOTE_OFF => Some(InputEvent::Release(pitch)),
        _ => None,
    }
}
