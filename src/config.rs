//! redline configuration, persisted as TOML.
//!
//! Every field has a serde default, so a missing file or a partial file
//! both yield a usable config.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::anchor::MatchOptions;
use crate::error::{ConfigError, ConfigResult};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "redline.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Path of the annotation record.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    /// Milliseconds an unanchored annotation shows as `checking`.
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
    /// Maximum context window captured on each side of a selection.
    #[serde(default = "default_context_chars")]
    pub context_chars: usize,
    /// Minimum share of the possible context score for repeated text.
    #[serde(default = "default_min_context_score")]
    pub min_context_score: f64,
    /// Fingerprint polling interval for `watch`.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".redline/annotations.json")
}
fn default_grace_period_ms() -> u64 {
    15_000
}
fn default_context_chars() -> usize {
    30
}
fn default_min_context_score() -> f64 {
    0.3
}
fn default_poll_interval_ms() -> u64 {
    1_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            grace_period_ms: default_grace_period_ms(),
            context_chars: default_context_chars(),
            min_context_score: default_min_context_score(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Config {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source: e,
                });
            }
        };
        Self::parse(&content).map_err(|message| ConfigError::Parse {
            path: path.display().to_string(),
            message,
        })
    }

    /// Parse TOML text.
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            context_chars: self.context_chars,
            min_context_score: self.min_context_score,
        }
    }
}
