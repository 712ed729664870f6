//! Corpus-level driver: load and extract many files, skipping bad ones.

use crate::extract::{extract, ExtractionError};
use crate::loader::{load, ParseError};
use crate::record::FileRecord;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Why a single file was skipped.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("cannot extract {}: {source}", .path.display())]
    Extraction {
        path: PathBuf,
        #[source]
        source: ExtractionError,
    },

    #[error("gave up on {} after {timeout:?}", .path.display())]
    Timeout { path: PathBuf, timeout: Duration },

    #[error("worker for {} stopped: {message}", .path.display())]
    Worker { path: PathBuf, message: String },
}

impl FileError {
    pub fn path(&self) -> &Path {
        match self {
            FileError::Parse(e) => &e.path,
            FileError::Extraction { path, .. }
            | FileError::Timeout { path, .. }
            | FileError::Worker { path, .. } => path,
        }
    }
}

/// Successful records in input order plus one entry per skipped file.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub records: Vec<FileRecord>,
    pub failures: Vec<FileError>,
}

impl BatchReport {
    pub fn attempted(&self) -> usize {
        self.records.len() + self.failures.len()
    }

    fn push(&mut self, outcome: Result<FileRecord, FileError>) {
        match outcome {
            Ok(record) => {
                info!(file = record.file_name(), "extracted");
                self.records.push(record);
            }
            Err(e) => {
                warn!(path = %e.path().display(), error = %e, "skipping file");
                self.failures.push(e);
            }
        }
    }

    fn log_summary(&self) {
        info!(
            extracted = self.records.len(),
            failed = self.failures.len(),
            "batch complete"
        );
    }
}

/// Name recorded in the `file_name` column.
pub fn record_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Load then extract one file.
pub fn process_file(path: &Path) -> Result<FileRecord, FileError> {
    let score = load(path)?;
    let record = extract(&score, &record_name(path)).map_err(|source| FileError::Extraction {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        path = %path.display(),
        notes = record.notes().len(),
        chords = record.chords().len(),
        parts = record.track_names().len(),
        "record built"
    );
    Ok(record)
}

/// Process every path in order on the calling thread.
///
/// Never fails: bad files end up in [`BatchReport::failures`].
pub fn extract_all<P: AsRef<Path>>(paths: &[P]) -> BatchReport {
    let mut report = BatchReport::default();
    for path in paths {
        report.push(process_file(path.as_ref()));
    }
    report.log_summary();
    report
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Files processed at once.
    pub workers: usize,
    /// Per-file limit; `None` waits forever.
    pub file_timeout: Option<Duration>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            file_timeout: Some(Duration::from_secs(30)),
        }
    }
}

type Processor = fn(&Path) -> Result<FileRecord, FileError>;

/// Runs the per-file pipeline on blocking workers with a per-file timeout.
#[derive(Clone)]
pub struct BatchRunner {
    options: BatchOptions,
    process: Processor,
}

impl std::fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Default for BatchRunner {
    fn default() -> Self {
        Self::new(BatchOptions::default())
    }
}

impl BatchRunner {
    pub fn new(options: BatchOptions) -> Self {
        Self {
            options,
            process: process_file,
        }
    }

    #[cfg(test)]
    fn with_processor(options: BatchOptions, process: Processor) -> Self {
        Self { options, process }
    }

    /// Process `paths` concurrently. The report lists records and failures
    /// in input order, whatever order the workers finish in.
    ///
    /// A worker that outlives its timeout keeps its slot until the thread
    /// returns, so at most `workers` parser threads ever run at once.
    pub async fn run(&self, paths: Vec<PathBuf>) -> BatchReport {
        let permits = Arc::new(Semaphore::new(self.options.workers.max(1)));
        let timeout = self.options.file_timeout;
        let process = self.process;
        let mut tasks = JoinSet::new();

        for (index, path) in paths.into_iter().enumerate() {
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let outcome = match permits.acquire_owned().await {
                    Ok(permit) => run_one(path, timeout, process, permit).await,
                    Err(e) => Err(FileError::Worker {
                        path,
                        message: e.to_string(),
                    }),
                };
                (index, outcome)
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(done) => outcomes.push(done),
                // run_one never panics itself; a panicking task loses its index
                Err(e) => warn!(error = %e, "batch task failed"),
            }
        }
        outcomes.sort_by_key(|(index, _)| *index);

        let mut report = BatchReport::default();
        for (_, outcome) in outcomes {
            report.push(outcome);
        }
        report.log_summary();
        report
    }
}

async fn run_one(
    path: PathBuf,
    timeout: Option<Duration>,
    process: Processor,
    permit: OwnedSemaphorePermit,
) -> Result<FileRecord, FileError> {
    let worker_path = path.clone();
    let work = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        process(&worker_path)
    });

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, work).await {
            Ok(joined) => joined,
            // The blocking thread is detached and finishes on its own.
            Err(_) => return Err(FileError::Timeout { path, timeout: limit }),
        },
        None => work.await,
    };

    joined.map_err(|e| FileError::Worker {
        path,
        message: e.to_string(),
    })?
}

/// Drive `future` on a fresh multi-threaded runtime.
///
/// Blocking workers still running when `future` completes (files that hit
/// their timeout) are abandoned instead of joined, so a hung file cannot
/// keep the process alive.
pub fn block_on<F: Future>(future: F) -> std::io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let output = runtime.block_on(future);
    runtime.shutdown_background();
    Ok(output)
}
