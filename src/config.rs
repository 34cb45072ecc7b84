//! Narration settings.
//!
//! Defaults match a stock VOICEVOX engine running on the same host.  Settings
//! can come from a JSON file ([`NarratorConfig::load`]), from the environment
//! ([`NarratorConfig::from_env`]), or be set field by field.
//!
//! | Variable               | Field             |
//! |------------------------|-------------------|
//! | `VOICEVOX_URL`         | `endpoint`        |
//! | `VOICEVOX_SPEAKER`     | `speaker`         |
//! | `VOICEVOX_MAX_WORKERS` | `max_workers`     |
//! | `NARRATOR_CHUNK_CHARS` | `chunk_max_chars` |
//! | `NARRATOR_TEMP_DIR`    | `temp_dir`        |

use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    chunk::DEFAULT_MAX_CHARS,
    error::{NarrationError, Result},
};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:50021";

/// VOICEVOX speaker 3: ずんだもん (ノーマル).
pub const DEFAULT_SPEAKER: u32 = 3;

pub const DEFAULT_MAX_WORKERS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarratorConfig {
    /// Base URL of the VOICEVOX engine, without trailing slash.
    pub endpoint: String,

    /// VOICEVOX style id passed as `speaker`.
    pub speaker: u32,

    pub chunk_max_chars: usize,

    /// Articles narrated at the same time.  Zero is treated as one.
    pub max_workers: usize,

    /// Per-request timeout for both protocol steps.
    pub request_timeout_secs: u64,

    /// Pause between two chunks of the same article.
    pub throttle_ms: u64,

    pub output_dir: PathBuf,

    /// Parent of the per-run segment directory.
    pub temp_dir: PathBuf,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            speaker: DEFAULT_SPEAKER,
            chunk_max_chars: DEFAULT_MAX_CHARS,
            max_workers: DEFAULT_MAX_WORKERS,
            request_timeout_secs: 60,
            throttle_ms: 500,
            output_dir: PathBuf::from("audio"),
            temp_dir: std::env::temp_dir(),
        }
    }
}

impl NarratorConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Read a JSON config file; missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| NarrationError::io(path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            NarrationError::io(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })
    }

    /// Apply overrides looked up through `var`.
    pub fn with_env_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = var("VOICEVOX_URL") {
            self.endpoint = url;
        }
        if let Some(dir) = var("NARRATOR_TEMP_DIR") {
            self.temp_dir = PathBuf::from(dir);
        }
        parse_into(&var, "VOICEVOX_SPEAKER", &mut self.speaker);
        parse_into(&var, "VOICEVOX_MAX_WORKERS", &mut self.max_workers);
        parse_into(&var, "NARRATOR_CHUNK_CHARS", &mut self.chunk_max_chars);
        self
    }

    pub fn base_url(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }

    pub fn workers(&self) -> usize {
        self.max_workers.max(1)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

fn parse_into<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    let Some(raw) = var(key) else { return };
    match raw.trim().parse() {
        Ok(v) => *slot = v,
        Err(_) => warn!(key, value = %raw, "ignoring unparseable environment override"),
    }
}
