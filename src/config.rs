//! JSON configuration for the `kp` command-line front end.
//!
//! Every field is optional; a missing field takes its default. Command-line
//! flags are applied on top by the binary.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{KpError, Result};
use crate::global_hotkey::parse_hotkey;
use crate::runner::MIN_DELAY_SECS;
use crate::store::DEFAULT_STORE_FILE;

fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_FILE)
}

fn default_delay() -> u32 {
    MIN_DELAY_SECS
}

fn default_toggle_hotkey() -> String {
    "ctrl+alt+p".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// File macros are appended to and loaded from.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Delay between ticks, in seconds.
    #[serde(default = "default_delay")]
    pub delay: u32,

    /// Scale each wait by a random 10-100% of `delay`.
    #[serde(default)]
    pub randomize: bool,

    /// Global hotkey that stops and restarts a run.
    #[serde(default = "default_toggle_hotkey")]
    pub toggle_hotkey: String,

    #[serde(default)]
    pub verbose: bool,

    /// Log key events instead of sending them to the OS.
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            delay: default_delay(),
            randomize: false,
            toggle_hotkey: default_toggle_hotkey(),
            verbose: false,
            dry_run: false,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| KpError::config_load(path, e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| KpError::config_load(path, e.to_string()))
    }

    pub fn save_to_file(&self, path: &str) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| KpError::config_save(path, e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.store_path.as_os_str().is_empty() {
            return Err(KpError::config_validation("store_path cannot be empty"));
        }

        if self.delay < MIN_DELAY_SECS {
            return Err(KpError::config_validation(format!(
                "delay must be at least {MIN_DELAY_SECS} second(s)"
            )));
        }

        parse_hotkey(&self.toggle_hotkey)?;

        Ok(())
    }
}
