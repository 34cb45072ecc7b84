//! Error types for the narration stage.
//!
//! [`SynthesisError`] describes one failed call against the synthesis
//! backend.  [`NarrationError`] is the article-level taxonomy: every variant is
//! fatal for the article being narrated and for nothing else.  The batch
//! scheduler turns it into a failure outcome carrying the [`ErrorKind`] and
//! the rendered message.

use std::{fmt, io, path::PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::wav::AudioFormat;

/// The two steps of the VOICEVOX protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    AudioQuery,
    Synthesis,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::AudioQuery => f.write_str("/audio_query"),
            Step::Synthesis => f.write_str("/synthesis"),
        }
    }
}

/// A single backend call failed.  Never retried.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// Connection refused, timeout, or an unreadable response body.
    #[error("{step} request failed: {source}")]
    Transport {
        step: Step,
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-success status.
    #[error("{step} returned HTTP {status}: {body}")]
    Status { step: Step, status: u16, body: String },

    /// The HTTP client itself could not be set up; no request was sent.
    #[error("cannot build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl SynthesisError {
    /// Protocol step that failed, if a request was made at all.
    pub fn step(&self) -> Option<Step> {
        match self {
            SynthesisError::Transport { step, .. } | SynthesisError::Status { step, .. } => {
                Some(*step)
            }
            SynthesisError::Client(_) => None,
        }
    }
}

/// Everything that can end the narration of one article.
#[derive(Debug, Error)]
pub enum NarrationError {
    #[error("missing narration")]
    MissingContent,

    /// `chunk` is 1-based, matching the progress log.
    #[error("chunk {chunk}: {source}")]
    Synthesis {
        chunk: usize,
        #[source]
        source: SynthesisError,
    },

    #[error("{}: format {found} does not match first segment {expected}", .path.display())]
    FormatMismatch {
        path: PathBuf,
        expected: AudioFormat,
        found: AudioFormat,
    },

    #[error("no audio segments to assemble")]
    EmptyInput,

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("cannot build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl NarrationError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        NarrationError::Io { path: path.into(), source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            NarrationError::MissingContent => ErrorKind::MissingContent,
            NarrationError::Synthesis { .. } => ErrorKind::Synthesis,
            NarrationError::FormatMismatch { .. } => ErrorKind::FormatMismatch,
            NarrationError::EmptyInput => ErrorKind::EmptyInput,
            NarrationError::Io { .. } => ErrorKind::Io,
            NarrationError::ThreadPool(_) => ErrorKind::WorkerPool,
            NarrationError::Wav(_) => ErrorKind::Wav,
        }
    }
}

/// Serialisable failure category recorded on an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingContent,
    Synthesis,
    FormatMismatch,
    EmptyInput,
    Io,
    Wav,
    WorkerPool,
}

pub type Result<T, E = NarrationError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_names_the_step() {
        let e = SynthesisError::Status {
            step: Step::Synthesis,
            status: 503,
            body: "busy".into(),
        };
        assert_eq!(e.to_string(), "/synthesis returned HTTP 503: busy");
        assert_eq!(e.step(), Some(Step::Synthesis));
    }

    #[test]
    fn chunk_failure_keeps_backend_message() {
        let e = NarrationError::Synthesis {
            chunk: 2,
            source: SynthesisError::Status {
                step: Step::AudioQuery,
                status: 422,
                body: "bad text".into(),
            },
        };
        assert_eq!(e.to_string(), "chunk 2: /audio_query returned HTTP 422: bad text");
        assert_eq!(e.kind(), ErrorKind::Synthesis);
    }

    #[test]
    fn client_setup_failure_has_no_step() {
        let source = reqwest::blocking::Client::builder()
            .user_agent("bad\nagent")
            .build()
            .unwrap_err();
        let e = SynthesisError::Client(source);
        assert_eq!(e.step(), None);
        assert!(e.to_string().starts_with("cannot build HTTP client: "), "{e}");
    }

    #[test]
    fn pool_failure_is_not_an_io_error() {
        let source = rayon::ThreadPoolBuilder::new()
            .num_threads(2)
            .spawn_handler(|_| Err(io::Error::new(io::ErrorKind::Other, "no threads")))
            .build()
            .unwrap_err();
        let e = NarrationError::from(source);
        assert_eq!(e.kind(), ErrorKind::WorkerPool);
        assert_eq!(serde_json::to_value(e.kind()).unwrap(), "worker_pool");
        assert!(e.to_string().starts_with("cannot build worker pool: "), "{e}");
    }

    #[test]
    fn missing_content_reason() {
        assert_eq!(NarrationError::MissingContent.to_string(), "missing narration");
    }
}
