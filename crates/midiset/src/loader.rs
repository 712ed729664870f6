//! Standard MIDI File → [`Score`].
//!
//! Note-on/note-off pairs become notes, notes sharing an onset within a
//! part become a chord, and tempo/meter/key meta events from every track are
//! merged into one score-global stream.

use crate::gm;
use crate::score::{Chord, MetaText, MusicalEvent, Note, Part, QuarterLength, Score, TimeSignature};
use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

/// The file at `path` could not be turned into a score.
#[derive(Debug, thiserror::Error)]
#[error("cannot load {}: {cause}", .path.display())]
pub struct ParseError {
    pub path: PathBuf,
    #[source]
    pub cause: ParseCause,
}

impl ParseError {
    pub fn new(path: &Path, cause: ParseCause) -> Self {
        Self {
            path: path.to_path_buf(),
            cause,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseCause {
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("file is empty")]
    Empty,

    #[error("MIDI parse error: {0}")]
    Midi(String),
}

/// Read and parse one MIDI file.
pub fn load(path: impl AsRef<Path>) -> Result<Score, ParseError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| ParseError::new(path, ParseCause::Io(e)))?;
    load_bytes(&bytes, path)
}

/// Parse MIDI bytes already in memory. `path` is only used for error reporting.
pub fn load_bytes(bytes: &[u8], path: &Path) -> Result<Score, ParseError> {
    if bytes.is_empty() {
        return Err(ParseError::new(path, ParseCause::Empty));
    }

    let smf = Smf::parse(bytes)
        .map_err(|e| ParseError::new(path, ParseCause::Midi(e.to_string())))?;

    let score = score_from_smf(&smf);
    debug!(
        path = %path.display(),
        tracks = smf.tracks.len(),
        parts = score.parts.len(),
        global_events = score.global_events.len(),
        "loaded score"
    );
    Ok(score)
}

/// A paired note-on/note-off in absolute ticks.
#[derive(Debug, Clone, Copy)]
struct TimedNote {
    onset_tick: u64,
    offset_tick: u64,
    pitch: u8,
    velocity: u8,
    channel: u8,
}

/// Everything the loader needs from one MIDI track.
#[derive(Debug, Default)]
struct TrackScan {
    name: Option<MetaText>,
    instrument: Option<MetaText>,
    /// First program change per channel, in the order they were heard.
    programs: Vec<(u8, u8)>,
    notes: Vec<TimedNote>,
    others: Vec<(u64, String)>,
}

/// A global event with enough position data to merge tracks stably.
struct GlobalEvent {
    tick: u64,
    event: MusicalEvent,
}

pub(crate) fn score_from_smf(smf: &Smf) -> Score {
    let ticks_per_quarter = ticks_per_quarter(smf.header.timing);

    let mut global = Vec::new();
    let scans: Vec<TrackScan> = smf
        .tracks
        .iter()
        .map(|track| scan_track(track, &mut global))
        .collect();

    // Stable: equal ticks keep track order, then in-track order.
    global.sort_by_key(|g| g.tick);
    let global_events = global.into_iter().map(|g| g.event).collect();

    let single_track = matches!(smf.header.format, Format::SingleTrack);
    let mut parts = Vec::new();

    for scan in &scans {
        if scan.notes.is_empty() {
            continue;
        }

        let channels: BTreeSet<u8> = scan.notes.iter().map(|n| n.channel).collect();
        if single_track && channels.len() > 1 {
            for (index, &channel) in channels.iter().enumerate() {
                let notes: Vec<TimedNote> = scan
                    .notes
                    .iter()
                    .filter(|n| n.channel == channel)
                    .copied()
                    .collect();
                // Text events stay with the first channel's part.
                let others = if index == 0 { scan.others.as_slice() } else { &[] };
                parts.push(build_part(
                    scan,
                    &BTreeSet::from([channel]),
                    &notes,
                    others,
                    ticks_per_quarter,
                ));
            }
        } else {
            parts.push(build_part(
                scan,
                &channels,
                &scan.notes,
                &scan.others,
                ticks_per_quarter,
            ));
        }
    }

    Score {
        parts,
        global_events,
    }
}

fn ticks_per_quarter(timing: Timing) -> u64 {
    match timing {
        Timing::Metrical(ticks) => u64::from(ticks.as_int()).max(1),
        // Timecode files carry ticks per second; assume 120 BPM.
        Timing::Timecode(fps, subframes) => {
            (u64::from(fps.as_int()) * u64::from(subframes) / 2).max(1)
        }
    }
}

fn scan_track(track: &[TrackEvent], global: &mut Vec<GlobalEvent>) -> TrackScan {
    let mut scan = TrackScan::default();
    let mut current_tick: u64 = 0;
    // (channel, pitch) → stack of (onset_tick, velocity)
    let mut pending: HashMap<(u8, u8), Vec<(u64, u8)>> = HashMap::new();

    for event in track {
        current_tick += u64::from(event.delta.as_int());

        match event.kind {
            TrackEventKind::Meta(meta) => {
                scan_meta(meta, current_tick, &mut scan, global);
            }
            TrackEventKind::Midi { channel, message } => {
                let ch = channel.as_int();
                match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        pending
                            .entry((ch, key.as_int()))
                            .or_default()
                            .push((current_tick, vel.as_int()));
                    }
                    // vel=0 NoteOn is NoteOff
                    MidiMessage::NoteOff { key, .. } | MidiMessage::NoteOn { key, .. } => {
                        let key = (ch, key.as_int());
                        if let Some((onset, velocity)) =
                            pending.get_mut(&key).and_then(|stack| stack.pop())
                        {
                            scan.notes.push(TimedNote {
                                onset_tick: onset,
                                offset_tick: current_tick,
                                pitch: key.1,
                                velocity,
                                channel: ch,
                            });
                        }
                    }
                    MidiMessage::ProgramChange { program } => {
                        if !scan.programs.iter().any(|&(c, _)| c == ch) {
                            scan.programs.push((ch, program.as_int()));
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    // Close any unclosed notes at the track's final tick
    for ((channel, pitch), stack) in pending {
        for (onset, velocity) in stack {
            scan.notes.push(TimedNote {
                onset_tick: onset,
                offset_tick: current_tick,
                pitch,
                velocity,
                channel,
            });
        }
    }

    // Sort by onset, then pitch for determinism
    scan.notes.sort_by(|a, b| {
        a.onset_tick
            .cmp(&b.onset_tick)
            .then(a.pitch.cmp(&b.pitch))
            .then(a.channel.cmp(&b.channel))
            .then(a.offset_tick.cmp(&b.offset_tick))
    });

    scan
}

fn scan_meta(meta: MetaMessage, tick: u64, scan: &mut TrackScan, global: &mut Vec<GlobalEvent>) {
    match meta {
        MetaMessage::TrackName(bytes) => {
            scan.name.get_or_insert_with(|| MetaText::from_bytes(bytes));
        }
        MetaMessage::InstrumentName(bytes) => {
            scan.instrument
                .get_or_insert_with(|| MetaText::from_bytes(bytes));
        }
        MetaMessage::Tempo(tempo) => {
            let usec = tempo.as_int();
            let event = if usec == 0 {
                MusicalEvent::Other("tempo of zero microseconds per beat".to_string())
            } else {
                MusicalEvent::TempoMark {
                    bpm: 60_000_000.0 / f64::from(usec),
                }
            };
            global.push(GlobalEvent { tick, event });
        }
        MetaMessage::TimeSignature(numerator, denom_pow, _, _) => {
            let event = match 1u32.checked_shl(u32::from(denom_pow)) {
                Some(denominator) => MusicalEvent::TimeSignature(TimeSignature {
                    numerator,
                    denominator,
                }),
                None => MusicalEvent::Other(format!(
                    "time signature with denominator exponent {denom_pow}"
                )),
            };
            global.push(GlobalEvent { tick, event });
        }
        MetaMessage::KeySignature(sharps, _minor) => {
            global.push(GlobalEvent {
                tick,
                event: MusicalEvent::KeySignature { sharps },
            });
        }
        MetaMessage::Lyric(bytes) => {
            scan.others
                .push((tick, format!("lyric: {}", String::from_utf8_lossy(bytes))));
        }
        MetaMessage::Text(bytes) => {
            scan.others
                .push((tick, format!("text: {}", String::from_utf8_lossy(bytes))));
        }
        MetaMessage::Marker(bytes) => {
            scan.others
                .push((tick, format!("marker: {}", String::from_utf8_lossy(bytes))));
        }
        _ => {}
    }
}

fn build_part(
    scan: &TrackScan,
    channels: &BTreeSet<u8>,
    notes: &[TimedNote],
    others: &[(u64, String)],
    ticks_per_quarter: u64,
) -> Part {
    let instrument = match &scan.instrument {
        Some(text) => text.clone(),
        None => gm_instrument(channels, &scan.programs)
            .map(|name| MetaText::Present(name.to_string()))
            .unwrap_or(MetaText::Absent),
    };
    let name = scan.name.clone().unwrap_or(MetaText::Absent);

    let mut timeline: Vec<(u64, MusicalEvent)> = group_onsets(notes, ticks_per_quarter);
    timeline.extend(
        others
            .iter()
            .map(|(tick, text)| (*tick, MusicalEvent::Other(text.clone()))),
    );
    // Stable: notes and chords precede text events on the same tick.
    timeline.sort_by_key(|(tick, _)| *tick);

    Part {
        instrument,
        name,
        events: timeline.into_iter().map(|(_, event)| event).collect(),
    }
}

fn gm_instrument(channels: &BTreeSet<u8>, programs: &[(u8, u8)]) -> Option<&'static str> {
    programs
        .iter()
        .find(|(channel, _)| channels.contains(channel))
        .and_then(|&(channel, program)| gm::instrument_name(channel, program))
        .or_else(|| {
            let only_drums = channels.len() == 1 && channels.contains(&gm::PERCUSSION_CHANNEL);
            only_drums.then_some("Percussion")
        })
}

/// Collapse notes (sorted by onset) into notes and chords.
fn group_onsets(notes: &[TimedNote], ticks_per_quarter: u64) -> Vec<(u64, MusicalEvent)> {
    let mut by_onset: BTreeMap<u64, Vec<&TimedNote>> = BTreeMap::new();
    for note in notes {
        by_onset.entry(note.onset_tick).or_default().push(note);
    }

    by_onset
        .into_iter()
        .map(|(onset, group)| {
            let longest = group
                .iter()
                .map(|n| n.offset_tick.saturating_sub(n.onset_tick))
                .max()
                .unwrap_or(0);
            let loudest = group.iter().map(|n| n.velocity).max();
            let offset = QuarterLength::from_ticks(onset, ticks_per_quarter);
            let duration = QuarterLength::from_ticks(longest, ticks_per_quarter);

            let pitches: BTreeSet<u8> = group.iter().map(|n| n.pitch).collect();
            let event = if pitches.len() == 1 {
                MusicalEvent::Note(Note {
                    pitch: group[0].pitch,
                    duration,
                    offset,
                    velocity: loudest,
                })
            } else {
                MusicalEvent::Chord(Chord {
                    pitches: pitches.into_iter().collect(),
                    duration,
                    offset,
                    velocity: loudest,
                })
            };
            (onset, event)
        })
        .collect()
}
