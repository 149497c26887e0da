use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to create data directory '{path}': {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Settings resolved from flags, environment and platform defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Where `todos.json` and `history.json` live
    pub data_dir: PathBuf,
    /// Keep everything in memory for this run
    pub ephemeral: bool,
    /// Colorize terminal output
    pub color: bool,
    /// Fallback `tracing` filter when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Config {
    pub fn resolve(data_dir: Option<PathBuf>, ephemeral: bool, no_color: bool, verbosity: u8) -> Self {
        Self {
            data_dir: data_dir.unwrap_or_else(default_data_dir),
            ephemeral,
            color: !no_color,
            log_filter: log_filter_for(verbosity).to_string(),
        }
    }

    pub fn ensure_data_dir(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_dir).map_err(|e| ConfigError::DataDir {
            path: self.data_dir.clone(),
            source: e,
        })
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("weekdo")
}

fn log_filter_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "weekdo=warn",
        1 => "weekdo=info",
        2 => "weekdo=debug",
        _ => "debug",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_data_dir_wins() {
        let config = Config::resolve(Some(PathBuf::from("/tmp/weekdo-test")), false, false, 0);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/weekdo-test"));
        assert!(config.color);
        assert_eq!(config.log_filter, "weekdo=warn");
    }

    #[test]
    fn test_default_data_dir_is_namespaced() {
        let config = Config::resolve(None, true, true, 2);
        assert!(config.data_dir.ends_with("weekdo"));
        assert!(!config.color);
        assert_eq!(config.log_filter, "weekdo=debug");
    }

    #[test]
    fn test_ensure_data_dir_creates_nested_dirs() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        let config = Config::resolve(Some(nested.clone()), false, false, 0);
        config.ensure_data_dir().unwrap();
        assert!(nested.is_dir());
    }
}
