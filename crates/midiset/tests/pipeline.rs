//! End-to-end: stage → load → extract → CSV.

mod common;

use common::{anonymous_duet, midi_bytes, piano_song, write_fixture, TrackBuilder};
use midiset::{
    extract, extract_all, extract_dir, load, load_bytes, load_split, save_split, stage_midi_files,
    BatchOptions, BatchRunner, FileError, FileRecord, QuarterLength, StagingOptions, Table,
    COLUMNS,
};
use midly::Format;
use pretty_assertions::assert_eq;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn assert_lengths_consistent(record: &FileRecord) {
    let events = record.notes().len() + record.chords().len();
    assert_eq!(record.durations().len(), events, "{}", record.file_name());
    assert_eq!(record.offsets().len(), events, "{}", record.file_name());
    assert_eq!(record.velocities().len(), events, "{}", record.file_name());
    assert_eq!(record.instrument().len(), record.track_names().len());
}

#[test]
fn piano_song_flattens_in_traversal_order() {
    let score = load_bytes(&piano_song(), Path::new("piano.mid")).unwrap();
    let record = extract(&score, "piano.mid").unwrap();

    assert_eq!(record.instrument(), ["Acoustic Grand Piano"]);
    assert_eq!(record.track_names(), ["Right Hand"]);
    assert_eq!(record.notes(), [60, 62]);
    assert_eq!(record.chords(), [vec![64, 67, 72]]);
    assert_eq!(record.velocities(), [Some(80), Some(96), Some(70)]);
    assert_eq!(
        record.durations(),
        [
            QuarterLength::from_integer(1),
            QuarterLength::from_integer(2),
            QuarterLength::new(1, 2),
        ]
    );
    assert_eq!(
        record.offsets(),
        [0, 1, 3].map(QuarterLength::from_integer)
    );

    assert_eq!(record.time_signatures(), ["3/4"]);
    assert_eq!(record.key_signatures(), [-2]);
    assert_eq!(record.tempos().len(), 2);
    assert_eq!(record.tempos()[0], 120.0);
    assert!((record.tempos()[1] - 90.0).abs() < 0.01);

    assert_lengths_consistent(&record);
}

#[test]
fn parts_without_metadata_get_defaults() {
    let score = load_bytes(&anonymous_duet(), Path::new("duet.mid")).unwrap();
    let record = extract(&score, "duet.mid").unwrap();

    assert_eq!(record.instrument(), ["Electric Bass (finger)", "Unknown"]);
    assert_eq!(record.track_names(), ["Unnamed Track", "Unnamed Track"]);
    assert_eq!(record.notes(), [40, 43]);
    assert_eq!(record.chords(), [vec![60, 64], vec![62, 65]]);
    assert_eq!(
        record.velocities(),
        [Some(100), Some(100), Some(50), Some(55)]
    );
    assert!(record.tempos().is_empty());
    assert_lengths_consistent(&record);
}

#[test]
fn extraction_from_loaded_file_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path(), "song.mid", &piano_song());
    let score = load(&path).unwrap();
    assert_eq!(
        extract(&score, "song.mid").unwrap(),
        extract(&score, "song.mid").unwrap()
    );
}

#[test]
fn corrupt_middle_file_is_skipped() {
    let dir = TempDir::new().unwrap();
    let paths = vec![
        write_fixture(dir.path(), "1.mid", &piano_song()),
        write_fixture(dir.path(), "2.mid", b"MThd garbage"),
        write_fixture(dir.path(), "3.mid", &anonymous_duet()),
    ];

    let report = extract_all(&paths);

    let names: Vec<&str> = report.records.iter().map(|r| r.file_name()).collect();
    assert_eq!(names, vec!["1.mid", "3.mid"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path(), paths[1].as_path());
    assert!(matches!(report.failures[0], FileError::Parse(_)));
}

#[test]
fn empty_file_is_a_parse_failure() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path(), "empty.mid", b"");
    let report = extract_all(&[path]);
    assert!(report.records.is_empty());
    assert!(report.failures[0].to_string().contains("empty"));
}

#[test]
fn notes_without_tempo_track_still_extract() {
    let bytes = midi_bytes(
        Format::SingleTrack,
        vec![TrackBuilder::new()
            .note(0, 72, 90, 0, 240)
            .note(9, 36, 110, 0, 120)],
    );
    let score = load_bytes(&bytes, Path::new("f0.mid")).unwrap();
    let record = extract(&score, "f0.mid").unwrap();

    // Format 0 with two channels → two parts
    assert_eq!(record.instrument(), ["Unknown", "Percussion"]);
    assert_eq!(record.notes(), [72, 36]);
    assert!(record.chords().is_empty());
    assert_lengths_consistent(&record);
}

#[tokio::test]
async fn staged_corpus_to_split_csv() {
    let roots = [TempDir::new().unwrap(), TempDir::new().unwrap()];
    let staged = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    write_fixture(roots[0].path(), "song.mid", &piano_song());
    std::fs::create_dir_all(roots[1].path().join("nested")).unwrap();
    write_fixture(&roots[1].path().join("nested"), "song.MIDI", &anonymous_duet());
    write_fixture(roots[1].path(), "broken.mid", b"not midi at all");
    write_fixture(roots[1].path(), "readme.txt", b"ignored");

    let staging = stage_midi_files(
        &[roots[0].path(), roots[1].path()],
        staged.path(),
        &StagingOptions::default(),
    )
    .unwrap();
    assert_eq!(staging.copied.len(), 3);

    let runner = BatchRunner::new(BatchOptions {
        workers: 2,
        file_timeout: Some(Duration::from_secs(10)),
    });
    let report = extract_dir(staged.path(), &runner).await.unwrap();

    let names: Vec<&str> = report.records.iter().map(|r| r.file_name()).collect();
    assert_eq!(names, vec!["0_song.mid", "2_song.MIDI"]);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].path().ends_with("1_broken.mid"));
    report.records.iter().for_each(assert_lengths_consistent);

    let csv_path = out.path().join("dataset.csv");
    midiset::write_records(&report.records, &csv_path).unwrap();
    let table = Table::read_csv(&csv_path).unwrap();
    assert_eq!(table.headers, COLUMNS.to_vec());
    assert_eq!(table.rows[0][0], "0_song.mid");
    assert_eq!(table.rows[0][2], "[60,62]");
    assert_eq!(table.rows[1][4], "[100,100,50,55]");

    let (a, b) = (out.path().join("part1.csv"), out.path().join("part2.csv"));
    save_split(&table, &a, &b).unwrap();
    assert_eq!(load_split(&a, &b).unwrap(), table);
}

#[tokio::test]
async fn missing_corpus_directory_is_fatal() {
    let runner = BatchRunner::default();
    let result = extract_dir(Path::new("/nonexistent/midiset/corpus"), &runner).await;
    assert!(matches!(result, Err(midiset::Error::Staging(_))));
}
