//! Hierarchical score model produced by the loader.
//!
//! A [`Score`] holds one [`Part`] per note-bearing track plus a single
//! score-global stream of tempo, meter and key events.

use num_rational::Ratio;
use num_traits::ToPrimitive;
use serde::{Serialize, Serializer};
use std::fmt;

/// A position or length measured in quarter notes, kept exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QuarterLength(Ratio<u64>);

impl QuarterLength {
    pub const ZERO: QuarterLength = QuarterLength(Ratio::new_raw(0, 1));

    pub fn new(numer: u64, denom: u64) -> Self {
        Self(Ratio::new(numer, denom.max(1)))
    }

    /// Convert an absolute tick count using the file's ticks-per-quarter.
    pub fn from_ticks(ticks: u64, ticks_per_quarter: u64) -> Self {
        Self::new(ticks, ticks_per_quarter)
    }

    pub fn from_integer(quarters: u64) -> Self {
        Self(Ratio::from_integer(quarters))
    }

    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(0.0)
    }
}

impl fmt::Display for QuarterLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_integer() {
            write!(f, "{}", self.0.to_integer())
        } else {
            write!(f, "{}/{}", self.0.numer(), self.0.denom())
        }
    }
}

impl Serialize for QuarterLength {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}

/// Part metadata as found in the file.
///
/// Keeps "the event was there but blank" apart from "there was no event";
/// the extractor collapses both to a default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaText {
    Present(String),
    Empty,
    Absent,
}

impl MetaText {
    /// Classify raw meta event bytes. Invalid UTF-8 is decoded lossily.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let text = String::from_utf8_lossy(bytes);
        let trimmed = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
        if trimmed.is_empty() {
            MetaText::Empty
        } else {
            MetaText::Present(trimmed.to_string())
        }
    }

    pub fn as_deref(&self) -> Option<&str> {
        match self {
            MetaText::Present(s) => Some(s),
            MetaText::Empty | MetaText::Absent => None,
        }
    }
}

impl From<Option<&str>> for MetaText {
    fn from(value: Option<&str>) -> Self {
        match value {
            Some(s) => MetaText::from_bytes(s.as_bytes()),
            None => MetaText::Absent,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub pitch: u8,
    pub duration: QuarterLength,
    pub offset: QuarterLength,
    pub velocity: Option<u8>,
}

/// Pitches sounded together; one duration and velocity for the whole chord.
#[derive(Debug, Clone, PartialEq)]
pub struct Chord {
    pub pitches: Vec<u8>,
    pub duration: QuarterLength,
    pub offset: QuarterLength,
    pub velocity: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u32,
}

impl TimeSignature {
    pub fn ratio(&self) -> String {
        format!("{}/{}", self.numerator, self.denominator)
    }
}

/// Every kind of element a score can contain.
#[derive(Debug, Clone, PartialEq)]
pub enum MusicalEvent {
    Note(Note),
    Chord(Chord),
    TempoMark { bpm: f64 },
    TimeSignature(TimeSignature),
    /// Sharps are positive, flats negative.
    KeySignature { sharps: i8 },
    /// Lyrics, text, markers and anything else the extractor ignores.
    Other(String),
}

impl MusicalEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            MusicalEvent::Note(_) => "note",
            MusicalEvent::Chord(_) => "chord",
            MusicalEvent::TempoMark { .. } => "tempo",
            MusicalEvent::TimeSignature(_) => "time signature",
            MusicalEvent::KeySignature { .. } => "key signature",
            MusicalEvent::Other(_) => "other",
        }
    }
}

/// One track (or one channel of a single-track file).
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub instrument: MetaText,
    pub name: MetaText,
    pub events: Vec<MusicalEvent>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Score {
    pub parts: Vec<Part>,
    /// Tempo, meter and key events in timeline order, duplicates kept.
    pub global_events: Vec<MusicalEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_length_reduces_and_displays() {
        assert_eq!(QuarterLength::from_ticks(240, 480).to_string(), "1/2");
        assert_eq!(QuarterLength::from_ticks(960, 480).to_string(), "2");
        assert_eq!(QuarterLength::from_ticks(160, 480).to_string(), "1/3");
        assert_eq!(QuarterLength::from_ticks(0, 480), QuarterLength::ZERO);
    }

    #[test]
    fn quarter_length_serializes_as_number() {
        let json = serde_json::to_string(&vec![
            QuarterLength::new(1, 2),
            QuarterLength::from_integer(3),
        ])
        .unwrap();
        assert_eq!(json, "[0.5,3.0]");
    }

    #[test]
    fn meta_text_tri_state() {
        assert_eq!(
            MetaText::from_bytes(b"Piano"),
            MetaText::Present("Piano".into())
        );
        assert_eq!(MetaText::from_bytes(b"  \0"), MetaText::Empty);
        assert_eq!(MetaText::from(None), MetaText::Absent);
        assert_eq!(MetaText::from(Some("")), MetaText::Empty);
        assert_eq!(MetaText::Empty.as_deref(), None);
    }

    #[test]
    fn time_signature_ratio() {
        let ts = TimeSignature {
            numerator: 6,
            denominator: 8,
        };
        assert_eq!(ts.ratio(), "6/8");
    }
}
