//! # rsspeaker
//!
//! Narration stage of the RSSpeaker podcast pipeline: turns finished
//! narration scripts into one WAV episode per article using a local
//! [VOICEVOX](https://voicevox.hiroshiba.jp/) engine.
//!
//! ## Quick start
//!
//! ```no_run
//! use rsspeaker::{run_batch, Article, NarratorConfig, VoicevoxClient};
//!
//! let config = NarratorConfig::from_env();
//! let client = VoicevoxClient::from_config(&config).unwrap();
//!
//! let articles = vec![Article::new("API/Update: v2?", "新しいAPIが公開されました。")];
//! let report = run_batch(&client, &articles, &config).unwrap();
//!
//! // "1/1 articles produced audio", file at audio/APIUpdate_v2.wav
//! println!("{}", report.summary());
//! ```
//!
//! ## Pipeline
//! 1. **Chunking** — narration split into ≤ 300-character runs of whole
//!    sentences ([`chunk`]).
//! 2. **Synthesis** — each chunk goes through `/audio_query` then
//!    `/synthesis`, one chunk at a time per article with a short pause in
//!    between ([`voicevox`]).
//! 3. **Assembly** — segment WAVs decoded and re-written as one file with the
//!    first segment's format ([`wav`]).
//! 4. **Batch** — articles narrated on a bounded worker pool; each article
//!    ends as exactly one success or failure ([`batch`], [`article`]).
//!
//! The batch never writes a partial episode: output goes to `<name>.wav.part`
//! and is renamed into place only when complete.

pub mod article;
pub mod batch;
pub mod chunk;
pub mod config;
pub mod error;
pub mod voicevox;
pub mod wav;

// ─── Re-exports for convenience ─────────────────────────────────────────────

pub use article::{narrate_article, sanitize_filename, Article, ArticleOutcome, Episode, Outcome};
pub use batch::{run_batch, BatchReport};
pub use chunk::chunk_text;
pub use config::NarratorConfig;
pub use error::{ErrorKind, NarrationError, SynthesisError};
pub use voicevox::{SpeechBackend, VoicevoxClient};
