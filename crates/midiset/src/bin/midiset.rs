//! midiset binary - stage a MIDI corpus and flatten it into a CSV dataset

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use midiset::{
    find_midi_files, is_midi_file, load_split, save_split, stage_midi_files, write_records,
    BatchOptions, BatchRunner, StagingOptions, Table,
};
use midiset_conf::MidisetConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Turn a directory of MIDI files into a tabular training dataset
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file (replaces ./midiset.toml)
    #[arg(long, global = true, env = "MIDISET_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy every .mid/.midi file under the source trees into one directory
    Stage {
        /// Source trees (default: paths.source_dirs)
        #[arg(long = "source")]
        sources: Vec<PathBuf>,

        /// Destination directory (default: paths.staging_dir)
        #[arg(long)]
        dest: Option<PathBuf>,

        /// Id given to the first staged file
        #[arg(long, default_value = "0")]
        first_id: u64,
    },

    /// Extract one record per MIDI file and write the CSV dataset
    Extract {
        /// Directories and/or MIDI files (default: paths.staging_dir)
        inputs: Vec<PathBuf>,

        /// CSV to write (default: paths.output_csv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Files processed concurrently (default: extract.workers)
        #[arg(long)]
        workers: Option<usize>,

        /// Seconds before a file is skipped, 0 for no limit (default: extract.file_timeout_secs)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Save the first half of a CSV's rows to one file and the rest to another
    Split {
        input: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },

    /// Concatenate two split halves back into one CSV
    Join {
        first: PathBuf,
        second: PathBuf,
        output: PathBuf,
    },

    /// Show the effective configuration and where it came from
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    midiset::batch::block_on(run(cli)).context("Failed to start async runtime")?
}

async fn run(cli: Cli) -> Result<()> {
    let (config, config_sources) = MidisetConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;

    init_logging(&config.logging.log_level, cli.verbose)?;
    for file in &config_sources.files {
        tracing::debug!(path = %file.display(), "loaded config file");
    }
    for file in &config_sources.missing_files {
        tracing::warn!(path = %file.display(), "config file not found, ignoring");
    }

    match cli.command {
        Command::Stage {
            sources,
            dest,
            first_id,
        } => {
            let roots = if sources.is_empty() {
                config.paths.source_dirs.clone()
            } else {
                sources
            };
            if roots.is_empty() {
                bail!("no source directories given (use --source or paths.source_dirs)");
            }
            let dest = dest.unwrap_or_else(|| config.paths.staging_dir.clone());

            let report = stage_midi_files(&roots, &dest, &StagingOptions { first_id })
                .context("Staging failed")?;
            for failure in &report.failures {
                eprintln!("copy failed: {}: {}", failure.source.display(), failure.error);
            }
            println!(
                "staged {} files into {} ({} failed)",
                report.copied.len(),
                dest.display(),
                report.failures.len()
            );
        }

        Command::Extract {
            inputs,
            output,
            workers,
            timeout,
        } => {
            let inputs = if inputs.is_empty() {
                vec![config.paths.staging_dir.clone()]
            } else {
                inputs
            };
            let files = collect_inputs(&inputs)?;
            info!(files = files.len(), "extracting");

            let workers = workers.unwrap_or(config.extract.workers);
            let file_timeout = match timeout {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => config.extract.file_timeout(),
            };
            let mut options = BatchOptions {
                file_timeout,
                ..BatchOptions::default()
            };
            if workers > 0 {
                options.workers = workers;
            }

            let report = BatchRunner::new(options).run(files).await;

            let output = output.unwrap_or_else(|| config.paths.output_csv.clone());
            write_records(&report.records, &output)
                .with_context(|| format!("Failed to write {}", output.display()))?;

            for failure in &report.failures {
                eprintln!("skipped: {failure}");
            }
            println!(
                "extracted {} of {} files into {}",
                report.records.len(),
                report.attempted(),
                output.display()
            );
        }

        Command::Split {
            input,
            first,
            second,
        } => {
            let table = Table::read_csv(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            save_split(&table, &first, &second).context("Failed to save split dataset")?;
            println!(
                "split {} rows into {} and {}",
                table.len(),
                first.display(),
                second.display()
            );
        }

        Command::Join {
            first,
            second,
            output,
        } => {
            let table = load_split(&first, &second).context("Failed to load split dataset")?;
            table
                .write_csv(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("joined {} rows into {}", table.len(), output.display());
        }

        Command::Config => {
            print!("{}", config.to_toml());
            println!();
            if config_sources.files.is_empty() {
                println!("# no config files found, using defaults");
            }
            for file in &config_sources.files {
                println!("# loaded: {}", file.display());
            }
            for var in &config_sources.env_overrides {
                println!("# env override: {var}");
            }
            for file in &config_sources.missing_files {
                println!("# not found: {}", file.display());
            }
        }
    }

    Ok(())
}

/// RUST_LOG wins; otherwise `--verbose` or the configured level.
fn init_logging(configured: &str, verbose: bool) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if verbose => EnvFilter::new("debug"),
        Err(_) => EnvFilter::try_new(configured)
            .with_context(|| format!("Invalid log level '{configured}'"))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Expand directories into their MIDI files; explicit files pass through.
fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            files.extend(
                find_midi_files(input)
                    .with_context(|| format!("Failed to scan {}", input.display()))?,
            );
        } else if input.is_file() {
            if !is_midi_file(input) {
                tracing::warn!(path = %input.display(), "input has no .mid/.midi extension");
            }
            files.push(input.clone());
        } else {
            bail!("input {} does not exist", input.display());
        }
    }
    Ok(files)
}
