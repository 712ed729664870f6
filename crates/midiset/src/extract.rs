//! [`Score`] → [`FileRecord`].

use crate::record::{FileRecord, RecordBuilder};
use crate::score::{MusicalEvent, Part, QuarterLength, Score};

pub const DEFAULT_INSTRUMENT: &str = "Unknown";
pub const DEFAULT_TRACK_NAME: &str = "Unnamed Track";

const MAX_MIDI_VALUE: u8 = 127;

/// A parsed score holds an element that cannot be flattened safely.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractionError {
    #[error("part {part}: pitch {pitch} is outside 0-127")]
    PitchOutOfRange { part: usize, pitch: u8 },

    #[error("part {part}: velocity {velocity} is outside 0-127")]
    VelocityOutOfRange { part: usize, velocity: u8 },

    #[error("part {part}: chord at offset {offset} has no pitches")]
    EmptyChord { part: usize, offset: QuarterLength },

    #[error("part {part}: {kind} event belongs to the score-global stream")]
    GlobalEventInPart { part: usize, kind: &'static str },

    #[error("{kind} event found in the score-global stream")]
    PartEventInGlobalStream { kind: &'static str },
}

/// Flatten `score` into a record named `file_name`.
///
/// All-or-nothing: on error no record is produced.
pub fn extract(score: &Score, file_name: &str) -> Result<FileRecord, ExtractionError> {
    let mut builder = RecordBuilder::default();

    for event in &score.global_events {
        match event {
            MusicalEvent::TempoMark { bpm } => builder.tempo(*bpm),
            MusicalEvent::TimeSignature(ts) => builder.time_signature(ts.ratio()),
            MusicalEvent::KeySignature { sharps } => builder.key_signature(*sharps),
            MusicalEvent::Other(_) => {}
            MusicalEvent::Note(_) | MusicalEvent::Chord(_) => {
                return Err(ExtractionError::PartEventInGlobalStream { kind: event.kind() });
            }
        }
    }

    for (index, part) in score.parts.iter().enumerate() {
        extract_part(index, part, &mut builder)?;
    }

    Ok(builder.finish(file_name))
}

fn extract_part(index: usize, part: &Part, builder: &mut RecordBuilder) -> Result<(), ExtractionError> {
    // Absent and blank metadata collapse to the same default.
    let instrument = part.instrument.as_deref().unwrap_or(DEFAULT_INSTRUMENT);
    let track_name = part.name.as_deref().unwrap_or(DEFAULT_TRACK_NAME);
    builder.part(instrument.to_string(), track_name.to_string());

    for event in &part.events {
        match event {
            MusicalEvent::Note(note) => {
                check_pitch(index, note.pitch)?;
                check_velocity(index, note.velocity)?;
                builder.note(note.pitch, note.duration, note.offset, note.velocity);
            }
            MusicalEvent::Chord(chord) => {
                if chord.pitches.is_empty() {
                    return Err(ExtractionError::EmptyChord {
                        part: index,
                        offset: chord.offset,
                    });
                }
                for &pitch in &chord.pitches {
                    check_pitch(index, pitch)?;
                }
                check_velocity(index, chord.velocity)?;
                builder.chord(chord.pitches.clone(), chord.duration, chord.offset, chord.velocity);
            }
            MusicalEvent::Other(_) => {}
            MusicalEvent::TempoMark { .. }
            | MusicalEvent::TimeSignature(_)
            | MusicalEvent::KeySignature { .. } => {
                return Err(ExtractionError::GlobalEventInPart {
                    part: index,
                    kind: event.kind(),
                });
            }
        }
    }

    Ok(())
}

fn check_pitch(part: usize, pitch: u8) -> Result<(), ExtractionError> {
    if pitch > MAX_MIDI_VALUE {
        return Err(ExtractionError::PitchOutOfRange { part, pitch });
    }
    Ok(())
}

fn check_velocity(part: usize, velocity: Option<u8>) -> Result<(), ExtractionError> {
    match velocity {
        Some(v) if v > MAX_MIDI_VALUE => Err(ExtractionError::VelocityOutOfRange { part, velocity: v }),
        _ => Ok(()),
    }
}
