//! Configuration management for gramscore.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Decode-pass polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollOptions {
    /// Retries while waiting for a decode pass to produce a result
    pub retries: u32,
    /// Interval between retries, in milliseconds
    pub interval_ms: u64,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            retries: 30,
            interval_ms: 100,
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Recognizer model directory handed to the decoder process
    pub model_dir: Option<PathBuf>,
    /// Command line that starts a decoder process (argv, program first)
    pub decoder_command: Vec<String>,
    /// Worker pool size for batch evaluation
    pub workers: usize,
    /// Lexicon file for out-of-vocabulary filtering, if any
    pub lexicon_file: Option<PathBuf>,
    /// Decode-pass polling
    pub poll: PollOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_dir: None,
            decoder_command: vec![],
            workers: 1,
            lexicon_file: None,
            poll: PollOptions::default(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_config_path()?,
        };

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config from {:?}", config_path))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {:?}", config_path))
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: Option<&str>) -> Result<()> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_config_path()?,
        };

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, contents)?;
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "era-laboratories", "gramscore")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll.interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("config.toml");
        let config = Config::load(missing.to_str()).unwrap();
        assert_eq!(config.workers, 1);
        assert_eq!(config.poll.retries, 30);
        assert!(config.model_dir.is_none());
    }

    #[test]
    fn save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.workers = 4;
        config.decoder_command = vec!["decoder".to_string(), "--stdio".to_string()];
        config.model_dir = Some(PathBuf::from("/opt/models/grammar"));
        config.save(path.to_str()).unwrap();

        let back = Config::load(path.to_str()).unwrap();
        assert_eq!(back.workers, 4);
        assert_eq!(back.decoder_command, ["decoder", "--stdio"]);
        assert_eq!(back.model_dir.as_deref(), Some(std::path::Path::new("/opt/models/grammar")));
    }

    #[test]
    fn partial_file_fails_loudly_rather_than_guessing() {
        // Unknown or missing required fields are a config error, not a
        // silent fallback to defaults.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "workers = \"four\"\n").unwrap();
        assert!(Config::load(path.to_str()).is_err());
    }
}
