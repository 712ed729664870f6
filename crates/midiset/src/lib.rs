//! Flatten a corpus of MIDI files into one row per file.
//!
//! The pipeline is [`loader::load`] (bytes → [`Score`]) followed by
//! [`extract::extract`] ([`Score`] → [`FileRecord`]). Around it sit the
//! corpus helpers: [`staging`] gathers files into one directory, [`batch`]
//! runs the pipeline over many files while skipping bad ones, and [`table`]
//! writes the records to CSV.
//!
//! ```rust,no_run
//! use midiset::{extract_all, find_midi_files, write_records};
//! use std::path::Path;
//!
//! let files = find_midi_files(Path::new("staged")).unwrap();
//! let report = extract_all(&files);
//! for failure in &report.failures {
//!     eprintln!("skipped: {failure}");
//! }
//! write_records(&report.records, Path::new("dataset.csv")).unwrap();
//! ```

pub mod batch;
pub mod extract;
pub mod gm;
pub mod loader;
pub mod record;
pub mod score;
pub mod staging;
pub mod table;

pub use batch::{extract_all, process_file, BatchOptions, BatchReport, BatchRunner, FileError};
pub use extract::{extract, ExtractionError, DEFAULT_INSTRUMENT, DEFAULT_TRACK_NAME};
pub use loader::{load, load_bytes, ParseCause, ParseError};
pub use record::{FileRecord, COLUMNS};
pub use score::{Chord, MetaText, MusicalEvent, Note, Part, QuarterLength, Score, TimeSignature};
pub use staging::{
    find_midi_files, is_midi_file, stage_midi_files, StagedFile, StagingError, StagingOptions,
    StagingReport,
};
pub use table::{load_split, save_split, write_records, Table, TableError};

use std::path::Path;

/// Errors that stop a whole corpus run rather than a single file.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Enumerate the MIDI files under `root` and extract them concurrently.
///
/// Fails only when `root` cannot be enumerated.
pub async fn extract_dir(
    root: &Path,
    runner: &BatchRunner,
) -> std::result::Result<BatchReport, Error> {
    let files = find_midi_files(root)?;
    Ok(runner.run(files).await)
}
