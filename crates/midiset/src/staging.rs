//! Collect MIDI files from source trees into one flat directory.
//!
//! Each copy is renamed `{id}_{original_name}` with a counter owned by the
//! staging call, so same-named files from different trees never collide.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const MIDI_EXTENSIONS: [&str; 2] = ["mid", "midi"];

/// Conditions that make the whole staging run impossible.
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("source root {} does not exist", .0.display())]
    RootNotFound(PathBuf),

    #[error("source root {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("cannot create destination {}: {source}", .path.display())]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default)]
pub struct StagingOptions {
    /// Id given to the first file found.
    pub first_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub id: u64,
    pub source: PathBuf,
    pub destination: PathBuf,
}

#[derive(Debug)]
pub struct CopyFailure {
    pub source: PathBuf,
    pub error: std::io::Error,
}

#[derive(Debug, Default)]
pub struct StagingReport {
    pub copied: Vec<StagedFile>,
    pub failures: Vec<CopyFailure>,
}

/// True for `.mid` / `.midi` in any letter case.
pub fn is_midi_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| MIDI_EXTENSIONS.iter().any(|m| ext.eq_ignore_ascii_case(m)))
        .unwrap_or(false)
}

fn check_root(root: &Path) -> Result<(), StagingError> {
    if !root.exists() {
        return Err(StagingError::RootNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(StagingError::NotADirectory(root.to_path_buf()));
    }
    Ok(())
}

/// Every MIDI file under `root`, in a stable (sorted) walk order.
///
/// Unreadable entries are logged and skipped; only a missing root fails.
pub fn find_midi_files(root: &Path) -> Result<Vec<PathBuf>, StagingError> {
    check_root(root)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() && is_midi_file(entry.path()) {
                    files.push(entry.into_path());
                }
            }
            Err(e) => {
                warn!(root = %root.display(), error = %e, "error accessing entry");
            }
        }
    }

    debug!(root = %root.display(), found = files.len(), "scanned for MIDI files");
    Ok(files)
}

/// Copy every MIDI file under `roots` into `destination`.
///
/// All roots are checked before anything is copied. A failed copy still
/// consumes its id and is reported in [`StagingReport::failures`].
pub fn stage_midi_files<P: AsRef<Path>>(
    roots: &[P],
    destination: &Path,
    options: &StagingOptions,
) -> Result<StagingReport, StagingError> {
    for root in roots {
        check_root(root.as_ref())?;
    }
    fs::create_dir_all(destination).map_err(|source| StagingError::Destination {
        path: destination.to_path_buf(),
        source,
    })?;

    let mut report = StagingReport::default();
    let mut next_id = options.first_id;

    for root in roots {
        for source in find_midi_files(root.as_ref())? {
            let id = next_id;
            next_id += 1;

            let name = source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let target = destination.join(format!("{id}_{name}"));

            match fs::copy(&source, &target) {
                Ok(_) => {
                    debug!(from = %source.display(), to = %target.display(), "staged");
                    report.copied.push(StagedFile {
                        id,
                        source,
                        destination: target,
                    });
                }
                Err(error) => {
                    warn!(path = %source.display(), error = %error, "copy failed");
                    report.failures.push(CopyFailure { source, error });
                }
            }
        }
    }

    info!(
        copied = report.copied.len(),
        failed = report.failures.len(),
        destination = %destination.display(),
        "staging complete"
    );
    Ok(report)
}
