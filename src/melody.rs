//! Melody commands
//!
//! A melody is an ordered list of notes tagged with its declared length, as
//! pushed by the conductor in `POST /melody`:
//!
//! ```json
//! {"notes": [262.0, 0, 294.0], "entries": 3}
//! ```

use crate::config;
use crate::quantizer::Note;
use heapless::Vec;
use serde::Deserialize;

pub type Notes = Vec<Note, { config::MAX_NOTES }>;

/// Why a melody body was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Body is not the expected JSON object
    InvalidJson,
    /// More notes than the node can hold
    TooManyNotes,
    /// `entries` disagrees with the number of notes
    LengthMismatch { declared: usize, actual: usize },
}

impl DecodeError {
    pub fn message(&self) -> &'static str {
        match self {
            DecodeError::InvalidJson => "Invalid JSON",
            DecodeError::TooManyNotes => "Too many notes",
            DecodeError::LengthMismatch { .. } => "Entries does not match number of notes",
        }
    }
}

/// Wire shape of a melody command
#[derive(Debug, Deserialize)]
struct MelodyPayload {
    notes: Vec<f32, { config::MAX_NOTES }>,
    entries: usize,
}

/// Ordered notes whose declared length matched the actual length
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Melody {
    notes: Notes,
}

impl Melody {
    /// Build a melody, rejecting a declared length that disagrees with the notes
    pub fn new(notes: Notes, declared: usize) -> Result<Self, DecodeError> {
        if notes.len() != declared {
            return Err(DecodeError::LengthMismatch {
                declared,
                actual: notes.len(),
            });
        }
        Ok(Self { notes })
    }

    pub fn from_notes(notes: &[Note]) -> Result<Self, DecodeError> {
        let notes = Vec::from_slice(notes).map_err(|_| DecodeError::TooManyNotes)?;
        let declared = notes.len();
        Self::new(notes, declared)
    }

    /// Decode a `/melody` request body
    pub fn from_json(body: &[u8]) -> Result<Self, DecodeError> {
        // Over-long note lists fail inside the fixed-capacity Vec and land here too
        let (payload, _) = serde_json_core::from_slice::<MelodyPayload>(body).map_err(|e| {
            log::debug!("[MELODY] JSON decode failed: {:?}", e);
            DecodeError::InvalidJson
        })?;

        let notes = payload
            .notes
            .iter()
            .map(|&hz| Note::tone(round_hz(hz)))
            .collect::<Notes>();
        Self::new(notes, payload.entries)
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

/// Whole Hz; anything not strictly positive (including NaN) is a rest
fn round_hz(hz: f32) -> u32 {
    if hz > 0.0 { (hz + 0.5) as u32 } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantizer::{C4, D4};

    #[test]
    fn decodes_conductor_payload() {
        let melody = Melody::from_json(br#"{"notes":[262.0,0,294],"entries":3}"#).unwrap();
        assert_eq!(melody.notes(), &[C4, Note::rest(), D4]);
    }

    #[test]
    fn rounds_and_rests() {
        let melody =
            Melody::from_json(br#"{"notes":[261.6,-5,0.2,493.9],"entries":4}"#).unwrap();
        let hz: std::vec::Vec<u32> = melody.notes().iter().map(|n| n.frequency_hz).collect();
        assert_eq!(hz, [262, 0, 0, 494]);
    }

    #[test]
    fn rejects_length_mismatch() {
        assert_eq!(
            Melody::from_json(br#"{"notes":[262],"entries":2}"#),
            Err(DecodeError::LengthMismatch {
                declared: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn rejects_bad_json() {
        assert_eq!(Melody::from_json(b"not json"), Err(DecodeError::InvalidJson));
        assert_eq!(
            Melody::from_json(br#"{"notes":[262]}"#),
            Err(DecodeError::InvalidJson)
        );
        assert_eq!(
            Melody::from_json(br#"{"notes":"C4","entries":1}"#),
            Err(DecodeError::InvalidJson)
        );
        assert_eq!(Melody::from_json(b""), Err(DecodeError::InvalidJson));
    }

    #[test]
    fn ignores_unknown_fields() {
        let melody =
            Melody::from_json(br#"{"tempo":120,"notes":[262],"entries":1}"#).unwrap();
        assert_eq!(melody.len(), 1);
    }

    #[test]
    fn empty_melody_is_valid() {
        let melody = Melody::from_json(br#"{"notes":[],"entries":0}"#).unwrap();
        assert!(melody.is_empty());
    }
}
