//! VOICEVOX engine client.
//!
//! Speech is produced in two round trips per chunk:
//!
//! | Step | Request                                         | Response            |
//! |------|-------------------------------------------------|---------------------|
//! | 1    | `POST /audio_query?text=<chunk>&speaker=<id>`   | JSON audio query    |
//! | 2    | `POST /synthesis?speaker=<id>` + query as body  | `audio/wav` bytes   |
//!
//! The query is passed through untouched, so callers never depend on its
//! schema.  Neither step is retried: a failed call fails the chunk.
//!
//! [`SpeechBackend`] is the seam between the worker and the engine; tests
//! plug in a stub that fabricates WAV bytes.

use std::{fs, path::Path, time::Duration};

use reqwest::blocking::{Client, Response};
use serde_json::Value;
use tracing::debug;

use crate::{
    config::NarratorConfig,
    error::{NarrationError, Result, Step, SynthesisError},
};

/// A text-to-speech engine speaking the query-then-synthesize protocol.
///
/// Shared by reference between all workers of a batch.
pub trait SpeechBackend: Send + Sync {
    /// Step 1: build the acoustic query for `text`.
    fn audio_query(&self, text: &str, speaker: u32) -> Result<Value, SynthesisError>;

    /// Step 2: render the query into a WAV file.
    fn synthesis(&self, query: &Value, speaker: u32) -> Result<Vec<u8>, SynthesisError>;

    /// Run both steps for one chunk.
    fn speak(&self, text: &str, speaker: u32) -> Result<Vec<u8>, SynthesisError> {
        let query = self.audio_query(text, speaker)?;
        self.synthesis(&query, speaker)
    }
}

/// Synthesise `text` and write the WAV bytes to `dest`.
///
/// `chunk` is the 1-based chunk number used in errors.  The caller owns
/// `dest` afterwards and is responsible for removing it.
pub fn synthesize_to_file<B: SpeechBackend + ?Sized>(
    backend: &B,
    text: &str,
    speaker: u32,
    chunk: usize,
    dest: &Path,
) -> Result<()> {
    let audio = backend
        .speak(text, speaker)
        .map_err(|source| NarrationError::Synthesis { chunk, source })?;
    fs::write(dest, &audio).map_err(|e| NarrationError::io(dest, e))?;
    debug!(chunk, bytes = audio.len(), path = %dest.display(), "segment written");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP client
// ─────────────────────────────────────────────────────────────────────────────

/// Blocking HTTP client for a running VOICEVOX engine.
#[derive(Debug, Clone)]
pub struct VoicevoxClient {
    http: Client,
    base_url: String,
}

impl VoicevoxClient {
    /// `base_url` like `http://localhost:50021`; `timeout` applies to each request.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SynthesisError> {
        let http = Client::builder()
            .user_agent(concat!("rsspeaker/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(SynthesisError::Client)?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }

    pub fn from_config(config: &NarratorConfig) -> Result<Self, SynthesisError> {
        Self::new(config.base_url(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, step: Step) -> String {
        format!("{}{}", self.base_url, step)
    }
}

/// Map a non-success status to [`SynthesisError::Status`], keeping the body
/// (VOICEVOX explains validation errors there).
fn check_status(step: Step, response: Response) -> Result<Response, SynthesisError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(SynthesisError::Status { step, status: status.as_u16(), body })
}

impl SpeechBackend for VoicevoxClient {
    fn audio_query(&self, text: &str, speaker: u32) -> Result<Value, SynthesisError> {
        let step = Step::AudioQuery;
        let speaker = speaker.to_string();
        let response = self
            .http
            .post(self.url(step))
            .query(&[("text", text), ("speaker", speaker.as_str())])
            .send()
            .map_err(|source| SynthesisError::Transport { step, source })?;
        check_status(step, response)?
            .json::<Value>()
            .map_err(|source| SynthesisError::Transport { step, source })
    }

    fn synthesis(&self, query: &Value, speaker: u32) -> Result<Vec<u8>, SynthesisError> {
        let step = Step::Synthesis;
        let response = self
            .http
            .post(self.url(step))
            .query(&[("speaker", speaker)])
            .json(query)
            .send()
            .map_err(|source| SynthesisError::Transport { step, source })?;
        let bytes = check_status(step, response)?
            .bytes()
            .map_err(|source| SynthesisError::Transport { step, source })?;
        Ok(bytes.to_vec())
    }
}
