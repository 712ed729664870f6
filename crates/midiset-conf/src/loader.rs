//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, MidisetConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
    /// An explicit config path that did not exist and was skipped
    pub missing_files: Vec<PathBuf>,
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    // System config
    let system = PathBuf::from("/etc/midiset/config.toml");
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("midiset/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    // CLI override takes precedence over local
    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    // Local override (current directory)
    let local = PathBuf::from("midiset.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// One config file's contents. Only keys present in the file are `Some`,
/// so layering never resets a value to its default.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    #[serde(default)]
    paths: PathsLayer,
    #[serde(default)]
    extract: ExtractLayer,
    #[serde(default)]
    logging: LoggingLayer,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PathsLayer {
    source_dirs: Option<Vec<String>>,
    staging_dir: Option<String>,
    output_csv: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExtractLayer {
    workers: Option<usize>,
    file_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoggingLayer {
    log_level: Option<String>,
}

impl ConfigLayer {
    /// Overlay this layer's values onto `config`.
    pub fn apply(self, config: &mut MidisetConfig) {
        if let Some(dirs) = self.paths.source_dirs {
            config.paths.source_dirs = dirs.iter().map(|d| expand_path(d)).collect();
        }
        if let Some(v) = self.paths.staging_dir {
            config.paths.staging_dir = expand_path(&v);
        }
        if let Some(v) = self.paths.output_csv {
            config.paths.output_csv = expand_path(&v);
        }
        if let Some(v) = self.extract.workers {
            config.extract.workers = v;
        }
        if let Some(v) = self.extract.file_timeout_secs {
            config.extract.file_timeout_secs = v;
        }
        if let Some(v) = self.logging.log_level {
            config.logging.log_level = v;
        }
    }
}

/// Load one config layer from a TOML file.
pub fn load_layer(path: &Path) -> Result<ConfigLayer, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_layer(&contents, path)
}

fn parse_layer(contents: &str, path: &Path) -> Result<ConfigLayer, ConfigError> {
    toml::from_str(contents).map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Apply environment variable overrides to config.
///
/// `lookup` is `std::env::var` in production; tests pass a map.
pub fn apply_env_overrides<F>(config: &mut MidisetConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("MIDISET_SOURCE_DIRS") {
        config.paths.source_dirs = std::env::split_paths(&v)
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| expand_path(&p.to_string_lossy()))
            .collect();
        sources.env_overrides.push("MIDISET_SOURCE_DIRS".to_string());
    }
    if let Some(v) = lookup("MIDISET_STAGING_DIR") {
        config.paths.staging_dir = expand_path(&v);
        sources.env_overrides.push("MIDISET_STAGING_DIR".to_string());
    }
    if let Some(v) = lookup("MIDISET_OUTPUT_CSV") {
        config.paths.output_csv = expand_path(&v);
        sources.env_overrides.push("MIDISET_OUTPUT_CSV".to_string());
    }
    if let Some(v) = lookup("MIDISET_WORKERS") {
        if let Ok(workers) = v.parse() {
            config.extract.workers = workers;
            sources.env_overrides.push("MIDISET_WORKERS".to_string());
        }
    }
    if let Some(v) = lookup("MIDISET_FILE_TIMEOUT_SECS") {
        if let Ok(secs) = v.parse() {
            config.extract.file_timeout_secs = secs;
            sources.env_overrides.push("MIDISET_FILE_TIMEOUT_SECS".to_string());
        }
    }
    if let Some(v) = lookup("MIDISET_LOG_LEVEL") {
        config.logging.log_level = v;
        sources.env_overrides.push("MIDISET_LOG_LEVEL".to_string());
    }
}

/// Expand `~` to the home directory.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home;
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_layer_only_overrides_present_keys() {
        let mut config = MidisetConfig::default();
        config.extract.workers = 6;

        let layer = parse_layer(
            "[extract]\nfile_timeout_secs = 5\n[paths]\nstaging_dir = \"/tmp/staged\"\n",
            Path::new("test.toml"),
        )
        .unwrap();
        layer.apply(&mut config);

        assert_eq!(config.extract.workers, 6);
        assert_eq!(config.extract.file_timeout_secs, 5);
        assert_eq!(config.paths.staging_dir, PathBuf::from("/tmp/staged"));
        assert_eq!(config.paths.output_csv, PathBuf::from("dataset.csv"));
    }

    #[test]
    fn test_unknown_keys_are_parse_errors() {
        let err = parse_layer("[extract]\nworkerz = 3\n", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn test_load_layer_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("midiset.toml");
        std::fs::write(&path, "[logging]\nlog_level = \"debug\"\n").unwrap();

        let mut config = MidisetConfig::default();
        load_layer(&path).unwrap().apply(&mut config);
        assert_eq!(config.logging.log_level, "debug");

        assert!(matches!(
            load_layer(&dir.path().join("missing.toml")),
            Err(ConfigError::FileRead { .. })
        ));
    }

    #[test]
    fn test_env_overrides_are_recorded() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("MIDISET_WORKERS", "12"),
            ("MIDISET_FILE_TIMEOUT_SECS", "not-a-number"),
            ("MIDISET_OUTPUT_CSV", "/data/out.csv"),
        ]);
        let mut config = MidisetConfig::default();
        let mut sources = ConfigSources::default();
        apply_env_overrides(&mut config, &mut sources, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.extract.workers, 12);
        assert_eq!(config.extract.file_timeout_secs, 30);
        assert_eq!(config.paths.output_csv, PathBuf::from("/data/out.csv"));
        assert_eq!(
            sources.env_overrides,
            vec!["MIDISET_OUTPUT_CSV".to_string(), "MIDISET_WORKERS".to_string()]
        );
    }

    #[test]
    fn test_source_dirs_env_is_a_path_list() {
        let joined = std::env::join_paths(["/a", "/b"]).unwrap();
        let joined = joined.to_string_lossy().into_owned();
        let mut config = MidisetConfig::default();
        let mut sources = ConfigSources::default();
        apply_env_overrides(&mut config, &mut sources, |k| {
            (k == "MIDISET_SOURCE_DIRS").then(|| joined.clone())
        });
        assert_eq!(
            config.paths.source_dirs,
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
    }

    #[test]
    fn test_expand_path_leaves_plain_paths() {
        assert_eq!(expand_path("/abs/path"), PathBuf::from("/abs/path"));
        assert_eq!(expand_path("rel"), PathBuf::from("rel"));
    }
}
