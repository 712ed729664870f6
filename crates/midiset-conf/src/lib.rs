//! Configuration loading for midiset.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/midiset/config.toml` (system)
//! 2. `~/.config/midiset/config.toml` (user)
//! 3. `./midiset.toml` (local override, replaced by an explicit path)
//! 4. Environment variables (`MIDISET_*`)
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! source_dirs = ["~/midi/lakh", "~/midi/maestro"]
//! staging_dir = "~/midi/staged"
//! output_csv = "~/midi/dataset.csv"
//!
//! [extract]
//! workers = 8
//! file_timeout_secs = 30
//!
//! [logging]
//! log_level = "info"
//! ```

pub mod loader;

pub use loader::{discover_config_files_with_override, ConfigSources};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
}

/// Where the corpus comes from and where results go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Trees searched for `.mid`/`.midi` files when staging.
    #[serde(default)]
    pub source_dirs: Vec<PathBuf>,

    /// Flat directory staged files are copied into.
    /// Default: ./staged
    #[serde(default = "PathsConfig::default_staging_dir")]
    pub staging_dir: PathBuf,

    /// Dataset written by `extract`.
    /// Default: ./dataset.csv
    #[serde(default = "PathsConfig::default_output_csv")]
    pub output_csv: PathBuf,
}

impl PathsConfig {
    fn default_staging_dir() -> PathBuf {
        PathBuf::from("staged")
    }

    fn default_output_csv() -> PathBuf {
        PathBuf::from("dataset.csv")
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source_dirs: Vec::new(),
            staging_dir: Self::default_staging_dir(),
            output_csv: Self::default_output_csv(),
        }
    }
}

/// Batch extraction tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Files processed concurrently. 0 means one per available CPU.
    #[serde(default)]
    pub workers: usize,

    /// Seconds before a single file is abandoned. 0 disables the limit.
    /// Default: 30
    #[serde(default = "ExtractConfig::default_file_timeout_secs")]
    pub file_timeout_secs: u64,
}

impl ExtractConfig {
    fn default_file_timeout_secs() -> u64 {
        30
    }

    pub fn file_timeout(&self) -> Option<Duration> {
        (self.file_timeout_secs > 0).then(|| Duration::from_secs(self.file_timeout_secs))
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            file_timeout_secs: Self::default_file_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive (trace, debug, info, warn, error).
    /// Default: info
    #[serde(default = "LoggingConfig::default_log_level")]
    pub log_level: String,
}

impl LoggingConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

/// Complete midiset configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MidisetConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub extract: ExtractConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MidisetConfig {
    /// Load configuration and report which files and env vars contributed.
    ///
    /// Load order (later wins):
    /// 1. Compiled defaults
    /// 2. `/etc/midiset/config.toml`
    /// 3. `~/.config/midiset/config.toml`
    /// 4. `./midiset.toml` or `config_path`
    /// 5. Environment variables
    pub fn load_with_sources_from(
        config_path: Option<&std::path::Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = MidisetConfig::default();

        if let Some(path) = config_path.filter(|p| !p.exists()) {
            sources.missing_files.push(path.to_path_buf());
        }

        for path in loader::discover_config_files_with_override(config_path) {
            let layer = loader::load_layer(&path)?;
            layer.apply(&mut config);
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources, |key| std::env::var(key).ok());

        Ok((config, sources))
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# midiset configuration\n\n");

        output.push_str("[paths]\n");
        output.push_str("source_dirs = [\n");
        for dir in &self.paths.source_dirs {
            output.push_str(&format!("    {},\n", toml_string(&dir.to_string_lossy())));
        }
        output.push_str("]\n");
        output.push_str(&format!(
            "staging_dir = {}\n",
            toml_string(&self.paths.staging_dir.to_string_lossy())
        ));
        output.push_str(&format!(
            "output_csv = {}\n",
            toml_string(&self.paths.output_csv.to_string_lossy())
        ));

        output.push_str("\n[extract]\n");
        output.push_str(&format!("workers = {}\n", self.extract.workers));
        output.push_str(&format!(
            "file_timeout_secs = {}\n",
            self.extract.file_timeout_secs
        ));

        output.push_str("\n[logging]\n");
        output.push_str(&format!(
            "log_level = {}\n",
            toml_string(&self.logging.log_level)
        ));

        output
    }
}

/// A TOML string literal, escaped as needed.
fn toml_string(value: &str) -> String {
    toml::Value::String(value.to_string()).to_string()
}
