use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app_dirs::AppDirs;
use crate::error::SpanError;
use crate::session::SessionConfig;
use crate::span::{Mode, DEFAULT_STARTING_LENGTH, DEFAULT_SYMBOLS};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub starting_length: usize,
    pub symbols: String,
    pub mode: Mode,
    /// How long each symbol stays on screen.
    pub symbol_interval_ms: u64,
    /// How long the "correct" message stays up before the next sequence.
    pub feedback_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            starting_length: DEFAULT_STARTING_LENGTH,
            symbols: DEFAULT_SYMBOLS.to_string(),
            mode: Mode::Forward,
            symbol_interval_ms: 1000,
            feedback_ms: 2000,
        }
    }
}

/// Values given on the command line; `None` keeps the stored setting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub starting_length: Option<usize>,
    pub symbols: Option<String>,
    pub mode: Option<Mode>,
    pub symbol_interval_ms: Option<u64>,
    pub feedback_ms: Option<u64>,
}

impl Config {
    pub fn with_overrides(self, overrides: &ConfigOverrides) -> Self {
        Self {
            starting_length: overrides.starting_length.unwrap_or(self.starting_length),
            symbols: overrides.symbols.clone().unwrap_or(self.symbols),
            mode: overrides.mode.unwrap_or(self.mode),
            symbol_interval_ms: overrides
                .symbol_interval_ms
                .unwrap_or(self.symbol_interval_ms),
            feedback_ms: overrides.feedback_ms.unwrap_or(self.feedback_ms),
        }
    }

    pub fn validate(&self) -> Result<(), SpanError> {
        if self.starting_length < 1 {
            return Err(SpanError::InvalidConfiguration(
                "starting length must be at least 1".to_string(),
            ));
        }
        if self.symbols.trim().is_empty() {
            return Err(SpanError::InvalidConfiguration(
                "symbol set must not be empty".to_string(),
            ));
        }
        if self.symbol_interval_ms == 0 {
            return Err(SpanError::InvalidConfiguration(
                "symbol interval must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Symbol set without whitespace.
    pub fn symbol_set(&self) -> Vec<char> {
        self.symbols.chars().filter(|c| !c.is_whitespace()).collect()
    }

    pub fn symbol_interval(&self) -> Duration {
        Duration::from_millis(self.symbol_interval_ms)
    }

    pub fn feedback_duration(&self) -> Duration {
        Duration::from_millis(self.feedback_ms)
    }

    pub fn session_config(&self, seed: Option<u64>) -> SessionConfig {
        SessionConfig {
            starting_length: self.starting_length,
            symbols: self.symbol_set(),
            seed,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("memspan_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(_) => return Config::default(),
        };

        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(
                    "ignoring unreadable config at {}: {}",
                    self.path.display(),
                    e
                );
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}
