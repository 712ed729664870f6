//! In-memory Standard MIDI File fixtures.

#![allow(dead_code)]

use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::path::{Path, PathBuf};

pub const PPQ: u16 = 480;

/// Builds one track from absolute-tick events.
#[derive(Default)]
pub struct TrackBuilder {
    events: Vec<(u64, TrackEventKind<'static>)>,
}

impl TrackBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: &'static str) -> Self {
        self.events
            .push((0, TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes()))));
        self
    }

    pub fn instrument(mut self, name: &'static str) -> Self {
        self.events.push((
            0,
            TrackEventKind::Meta(MetaMessage::InstrumentName(name.as_bytes())),
        ));
        self
    }

    pub fn program(mut self, channel: u8, program: u8) -> Self {
        self.events.push((
            0,
            TrackEventKind::Midi {
                channel: u4::new(channel),
                message: MidiMessage::ProgramChange {
                    program: u7::new(program),
                },
            },
        ));
        self
    }

    pub fn tempo(mut self, tick: u64, bpm: f64) -> Self {
        let usec = (60_000_000.0 / bpm).round() as u32;
        self.events
            .push((tick, TrackEventKind::Meta(MetaMessage::Tempo(u24::new(usec)))));
        self
    }

    pub fn time_signature(mut self, tick: u64, numerator: u8, denominator: u8) -> Self {
        let pow = denominator.trailing_zeros() as u8;
        self.events.push((
            tick,
            TrackEventKind::Meta(MetaMessage::TimeSignature(numerator, pow, 24, 8)),
        ));
        self
    }

    pub fn key_signature(mut self, tick: u64, sharps: i8) -> Self {
        self.events.push((
            tick,
            TrackEventKind::Meta(MetaMessage::KeySignature(sharps, false)),
        ));
        self
    }

    /// A note from `start` lasting `length` ticks on `channel`.
    pub fn note(mut self, channel: u8, pitch: u8, velocity: u8, start: u64, length: u64) -> Self {
        let channel = u4::new(channel);
        self.events.push((
            start,
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn {
                    key: u7::new(pitch),
                    vel: u7::new(velocity),
                },
            },
        ));
        self.events.push((
            start + length,
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOff {
                    key: u7::new(pitch),
                    vel: u7::new(0),
                },
            },
        ));
        self
    }

    pub fn chord(self, channel: u8, pitches: &[u8], velocity: u8, start: u64, length: u64) -> Self {
        pitches.iter().fold(self, |track, &pitch| {
            track.note(channel, pitch, velocity, start, length)
        })
    }

    fn build(mut self) -> Vec<TrackEvent<'static>> {
        // Note-offs before note-ons on the same tick
        self.events.sort_by_key(|(tick, kind)| {
            let order = match kind {
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOff { .. },
                    ..
                } => 0,
                _ => 1,
            };
            (*tick, order)
        });

        let mut last = 0;
        let mut track: Vec<TrackEvent<'static>> = self
            .events
            .into_iter()
            .map(|(tick, kind)| {
                let delta = tick - last;
                last = tick;
                TrackEvent {
                    delta: u28::new(delta as u32),
                    kind,
                }
            })
            .collect();
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
        track
    }
}

pub fn midi_bytes(format: Format, tracks: Vec<TrackBuilder>) -> Vec<u8> {
    let smf = Smf {
        header: Header::new(format, Timing::Metrical(u15::new(PPQ))),
        tracks: tracks.into_iter().map(TrackBuilder::build).collect(),
    };
    let mut buf = Vec::new();
    smf.write(&mut buf).expect("writing to a Vec cannot fail");
    buf
}

/// Conductor track plus a piano melody with one chord.
pub fn piano_song() -> Vec<u8> {
    midi_bytes(
        Format::Parallel,
        vec![
            TrackBuilder::new()
                .time_signature(0, 3, 4)
                .tempo(0, 120.0)
                .key_signature(0, -2)
                .tempo(1920, 90.0),
            TrackBuilder::new()
                .name("Right Hand")
                .program(0, 0)
                .note(0, 60, 80, 0, 480)
                .chord(0, &[64, 67, 72], 96, 480, 960)
                .note(0, 62, 70, 1440, 240),
        ],
    )
}

/// Two parts, neither carrying a track name; the second has no program.
pub fn anonymous_duet() -> Vec<u8> {
    midi_bytes(
        Format::Parallel,
        vec![
            TrackBuilder::new()
                .program(0, 33)
                .note(0, 40, 100, 0, 960)
                .note(0, 43, 100, 960, 960),
            TrackBuilder::new()
                .chord(1, &[60, 64], 50, 0, 480)
                .chord(1, &[62, 65], 55, 480, 480),
        ],
    )
}

pub fn write_fixture(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("write fixture");
    path
}
