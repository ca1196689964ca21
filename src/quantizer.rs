//! Light-to-note quantizer
//!
//! Maps a light reading onto one of the seven notes of a scale. Bucket `i`
//! covers `(thresholds[i - 1], thresholds[i]]`; the first bucket starts at
//! zero and anything above the last threshold stays in the last bucket.

use crate::{NodeError, config};
use alloc::vec::Vec;

/// A light reading, either raw (16-bit) or scaled
pub type Reading = u16;

/// Number of buckets (and notes) in a scale
pub const SCALE_LEN: usize = 7;

/// A note: a frequency in Hz, 0 meaning silence, plus an optional hold time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    pub frequency_hz: u32,
    pub duration_ms: Option<u32>,
}

impl Note {
    /// A tone held for the sequencer's default duration
    pub const fn tone(frequency_hz: u32) -> Self {
        Self {
            frequency_hz,
            duration_ms: None,
        }
    }

    /// Silence held for the sequencer's default duration
    pub const fn rest() -> Self {
        Self::tone(0)
    }

    pub const fn with_duration(self, duration_ms: u32) -> Self {
        Self {
            frequency_hz: self.frequency_hz,
            duration_ms: Some(duration_ms),
        }
    }

    pub fn is_rest(&self) -> bool {
        self.frequency_hz == 0
    }
}

pub const C4: Note = Note::tone(262);
pub const D4: Note = Note::tone(294);
pub const E4: Note = Note::tone(330);
pub const F4: Note = Note::tone(349);
pub const G4: Note = Note::tone(392);
pub const A4: Note = Note::tone(440);
pub const B4: Note = Note::tone(494);

/// Index of the bucket `value` falls into.
fn bucket_index(value: Reading, thresholds: &[Reading; SCALE_LEN]) -> usize {
    thresholds
        .iter()
        .position(|&threshold| value <= threshold)
        .unwrap_or(SCALE_LEN - 1)
}

/// Classify `value` against ascending `thresholds`, returning the paired note.
///
/// A value equal to a threshold belongs to that threshold's bucket; a value
/// above the last threshold is clamped to the last note.
pub fn classify(
    value: Reading,
    thresholds: &[Reading; SCALE_LEN],
    notes: &[Note; SCALE_LEN],
) -> Note {
    notes[bucket_index(value, thresholds)]
}

/// Map `x` from `in_min..=in_max` onto `out_min..=out_max` with floor division.
///
/// `x` is clamped to the input range first; a degenerate input range maps
/// everything to `out_min`.
pub fn map_value(x: u32, in_min: u32, in_max: u32, out_min: u32, out_max: u32) -> u32 {
    if in_max <= in_min {
        return out_min;
    }
    let x = x.clamp(in_min, in_max) as u64;
    let span_in = (in_max - in_min) as u64;
    let span_out = out_max.saturating_sub(out_min) as u64;
    ((x - in_min as u64) * span_out / span_in) as u32 + out_min
}

/// Scale a raw 16-bit reading into the conductor's `0..=SCALED_MAX` domain
pub fn scale_reading(raw: Reading) -> Reading {
    map_value(
        raw as u32,
        0,
        config::RAW_MAX as u32,
        0,
        config::SCALED_MAX as u32,
    ) as Reading
}

/// Seven ascending thresholds and the notes paired with them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scale {
    thresholds: [Reading; SCALE_LEN],
    notes: [Note; SCALE_LEN],
}

impl Scale {
    /// Build a scale, rejecting thresholds that are not strictly ascending
    pub fn new(
        thresholds: [Reading; SCALE_LEN],
        notes: [Note; SCALE_LEN],
    ) -> Result<Self, NodeError> {
        if !thresholds.windows(2).all(|pair| pair[0] < pair[1]) {
            log::warn!("[SCALE] Thresholds not ascending: {:?}", thresholds);
            return Err(NodeError::ConfigError);
        }
        Ok(Self { thresholds, notes })
    }

    pub fn thresholds(&self) -> &[Reading; SCALE_LEN] {
        &self.thresholds
    }

    pub fn notes(&self) -> &[Note; SCALE_LEN] {
        &self.notes
    }

    /// Bucket index for `value`, `0..SCALE_LEN`
    pub fn bucket(&self, value: Reading) -> usize {
        bucket_index(value, &self.thresholds)
    }

    pub fn classify(&self, value: Reading) -> Note {
        classify(value, &self.thresholds, &self.notes)
    }

    /// Turn a captured window into a melody, one note per reading
    pub fn quantize(&self, readings: &[Reading]) -> Vec<Note> {
        readings.iter().map(|&value| self.classify(value)).collect()
    }
}

impl Default for Scale {
    fn default() -> Self {
        let notes = config::SCALE_NOTES_HZ.map(Note::tone);
        Self {
            thresholds: config::SCALE_THRESHOLDS,
            notes,
        }
    }
}
