use crate::score::QuarterLength;

/// Column order of the tabular output.
pub const COLUMNS: [&str; 11] = [
    "file_name",
    "instrument",
    "notes",
    "chords",
    "velocities",
    "durations",
    "offsets",
    "tempos",
    "time_signatures",
    "key_signatures",
    "track_names",
];

/// The flattened summary of one MIDI file.
///
/// Produced only by a completed extraction and read-only afterwards.
/// `durations`, `offsets` and `velocities` interleave notes and chords in
/// the order they were traversed, so their length is
/// `notes().len() + chords().len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    file_name: String,
    instrument: Vec<String>,
    notes: Vec<u8>,
    chords: Vec<Vec<u8>>,
    velocities: Vec<Option<u8>>,
    durations: Vec<QuarterLength>,
    offsets: Vec<QuarterLength>,
    tempos: Vec<f64>,
    time_signatures: Vec<String>,
    key_signatures: Vec<i8>,
    track_names: Vec<String>,
}

impl FileRecord {
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn instrument(&self) -> &[String] {
        &self.instrument
    }

    pub fn notes(&self) -> &[u8] {
        &self.notes
    }

    pub fn chords(&self) -> &[Vec<u8>] {
        &self.chords
    }

    pub fn velocities(&self) -> &[Option<u8>] {
        &self.velocities
    }

    pub fn durations(&self) -> &[QuarterLength] {
        &self.durations
    }

    pub fn offsets(&self) -> &[QuarterLength] {
        &self.offsets
    }

    pub fn tempos(&self) -> &[f64] {
        &self.tempos
    }

    pub fn time_signatures(&self) -> &[String] {
        &self.time_signatures
    }

    pub fn key_signatures(&self) -> &[i8] {
        &self.key_signatures
    }

    pub fn track_names(&self) -> &[String] {
        &self.track_names
    }

    /// One CSV row in [`COLUMNS`] order; list fields become JSON arrays.
    pub fn to_row(&self) -> serde_json::Result<Vec<String>> {
        Ok(vec![
            self.file_name.clone(),
            serde_json::to_string(&self.instrument)?,
            serde_json::to_string(&self.notes)?,
            serde_json::to_string(&self.chords)?,
            serde_json::to_string(&self.velocities)?,
            serde_json::to_string(&self.durations)?,
            serde_json::to_string(&self.offsets)?,
            serde_json::to_string(&self.tempos)?,
            serde_json::to_string(&self.time_signatures)?,
            serde_json::to_string(&self.key_signatures)?,
            serde_json::to_string(&self.track_names)?,
        ])
    }
}

/// Accumulates one file's lists; only [`RecordBuilder::finish`] yields a record.
#[derive(Debug, Default)]
pub(crate) struct RecordBuilder {
    instrument: Vec<String>,
    notes: Vec<u8>,
    chords: Vec<Vec<u8>>,
    velocities: Vec<Option<u8>>,
    durations: Vec<QuarterLength>,
    offsets: Vec<QuarterLength>,
    tempos: Vec<f64>,
    time_signatures: Vec<String>,
    key_signatures: Vec<i8>,
    track_names: Vec<String>,
}

impl RecordBuilder {
    pub fn part(&mut self, instrument: String, track_name: String) {
        self.instrument.push(instrument);
        self.track_names.push(track_name);
    }

    pub fn note(
        &mut self,
        pitch: u8,
        duration: QuarterLength,
        offset: QuarterLength,
        velocity: Option<u8>,
    ) {
        self.notes.push(pitch);
        self.timing(duration, offset, velocity);
    }

    pub fn chord(
        &mut self,
        pitches: Vec<u8>,
        duration: QuarterLength,
        offset: QuarterLength,
        velocity: Option<u8>,
    ) {
        self.chords.push(pitches);
        self.timing(duration, offset, velocity);
    }

    fn timing(&mut self, duration: QuarterLength, offset: QuarterLength, velocity: Option<u8>) {
        self.durations.push(duration);
        self.offsets.push(offset);
        self.velocities.push(velocity);
    }

    pub fn tempo(&mut self, bpm: f64) {
        self.tempos.push(bpm);
    }

    pub fn time_signature(&mut self, ratio: String) {
        self.time_signatures.push(ratio);
    }

    pub fn key_signature(&mut self, sharps: i8) {
        self.key_signatures.push(sharps);
    }

    pub fn finish(self, file_name: &str) -> FileRecord {
        FileRecord {
            file_name: file_name.to_string(),
            instrument: self.instrument,
            notes: self.notes,
            chords: self.chords,
            velocities: self.velocities,
            durations: self.durations,
            offsets: self.offsets,
            tempos: self.tempos,
            time_signatures: self.time_signatures,
            key_signatures: self.key_signatures,
            track_names: self.track_names,
        }
    }
}
