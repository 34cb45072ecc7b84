//! Articles and the per-article narration worker.
//!
//! One worker call turns one [`Article`] into exactly one [`ArticleOutcome`]:
//! chunk the narration, synthesise each chunk in order into a segment file,
//! assemble the segments into `<title>.wav`, and remove the segments again.
//! Errors never leave the worker; they become [`Outcome::Failure`].

use std::{
    collections::HashSet,
    fs, io,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    chunk::chunk_text,
    error::{ErrorKind, NarrationError, Result},
    voicevox::{synthesize_to_file, SpeechBackend},
    wav::{self, AudioFormat},
};

/// Longest file stem produced by [`sanitize_filename`], in characters.
const MAX_STEM_CHARS: usize = 100;

static ILLEGAL_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/:*?"<>|]"#).expect("valid regex"));

// ─────────────────────────────────────────────────────────────────────────────
// Data model
// ─────────────────────────────────────────────────────────────────────────────

/// One topic as produced by the narration-script stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub title: String,

    #[serde(default, rename = "narration_script", alias = "narration")]
    pub narration: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl Article {
    pub fn new(title: impl Into<String>, narration: impl Into<String>) -> Self {
        Self { title: title.into(), narration: narration.into(), ..Default::default() }
    }

    /// Title, or `article_<n>` when blank.  `index` is 0-based.
    pub fn display_title(&self, index: usize) -> String {
        let title = self.title.trim();
        if title.is_empty() {
            format!("article_{}", index + 1)
        } else {
            title.to_string()
        }
    }
}

/// A finished episode, as needed by the feed publisher.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Episode {
    pub path: PathBuf,
    pub format: AudioFormat,
    pub frames: u32,
    pub duration_secs: f64,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success(Episode),
    Failure { kind: ErrorKind, reason: String },
}

/// Result of narrating the article at `index` (0-based) of the batch input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleOutcome {
    pub index: usize,
    pub title: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl ArticleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success(_))
    }

    pub fn episode(&self) -> Option<&Episode> {
        match &self.outcome {
            Outcome::Success(ep) => Some(ep),
            Outcome::Failure { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Success(_) => None,
            Outcome::Failure { reason, .. } => Some(reason),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output naming
// ─────────────────────────────────────────────────────────────────────────────

/// Turn a title into a file stem: drop `\ / : * ? " < > |`, replace spaces
/// with `_`, keep at most 100 characters.
pub fn sanitize_filename(title: &str) -> String {
    let stripped = ILLEGAL_FILENAME_CHARS.replace_all(title, "");
    stripped.replace(' ', "_").chars().take(MAX_STEM_CHARS).collect()
}

/// Output file for every article of a batch, in input order.
///
/// A blank title, or one that sanitises to nothing, falls back to
/// `article_<n>`.  When two articles would share a file, the later ones get
/// `_<n>` appended (the stem is shortened to keep the 100-character cap) so
/// that no two workers ever write the same path.
pub fn output_paths(articles: &[Article], output_dir: &Path) -> Vec<PathBuf> {
    let mut taken: HashSet<String> = HashSet::new();
    articles
        .iter()
        .enumerate()
        .map(|(i, article)| {
            let mut stem = sanitize_filename(&article.title);
            if article.title.trim().is_empty() || stem.is_empty() {
                stem = format!("article_{}", i + 1);
            }
            let mut candidate = stem.clone();
            let mut attempt = 0;
            while !taken.insert(candidate.to_lowercase()) {
                attempt += 1;
                let suffix = match attempt {
                    1 => format!("_{}", i + 1),
                    n => format!("_{}_{n}", i + 1),
                };
                candidate = with_suffix(&stem, &suffix);
            }
            output_dir.join(format!("{candidate}.wav"))
        })
        .collect()
}

fn with_suffix(stem: &str, suffix: &str) -> String {
    let keep = MAX_STEM_CHARS.saturating_sub(suffix.chars().count());
    let mut name: String = stem.chars().take(keep).collect();
    name.push_str(suffix);
    name
}

// ─────────────────────────────────────────────────────────────────────────────
// Segment files
// ─────────────────────────────────────────────────────────────────────────────

/// Segment files of one article; removed on drop.
///
/// Removal is best-effort: a leftover segment is logged, never reported as
/// the article's failure.
pub(crate) struct SegmentFiles {
    paths: Vec<PathBuf>,
}

impl SegmentFiles {
    pub(crate) fn new() -> Self {
        Self { paths: Vec::new() }
    }

    pub(crate) fn push(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    pub(crate) fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl Drop for SegmentFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "cannot remove segment"),
            }
        }
    }
}

/// Segment path for chunk `chunk` of article `article` inside a run directory.
///
/// The run directory is private to one batch, and within a batch the
/// (article, chunk) pair is unique, so concurrent workers never collide.
pub fn segment_path(run_dir: &Path, article: usize, chunk: usize) -> PathBuf {
    run_dir.join(format!("a{article:04}_c{chunk:04}.wav"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Worker
// ─────────────────────────────────────────────────────────────────────────────

/// Everything a worker needs besides the article itself.
pub struct WorkerContext<'a, B: ?Sized> {
    pub backend: &'a B,
    pub speaker: u32,
    pub chunk_max_chars: usize,
    pub throttle: Duration,
    /// Private directory for this run's segment files.
    pub run_dir: &'a Path,
    pub total: usize,
}

/// Narrate one article into `output`.  Never fails; see [`Outcome`].
pub fn narrate_article<B: SpeechBackend + ?Sized>(
    ctx: &WorkerContext<'_, B>,
    index: usize,
    article: &Article,
    output: &Path,
) -> ArticleOutcome {
    let title = article.display_title(index);
    let outcome = match render(ctx, index, article, output) {
        Ok(episode) => {
            info!(
                "✓ [{}/{}] {} ({:.1} s)",
                index + 1,
                ctx.total,
                episode.path.display(),
                episode.duration_secs
            );
            Outcome::Success(episode)
        }
        Err(e) => Outcome::Failure { kind: e.kind(), reason: e.to_string() },
    };
    ArticleOutcome { index, title, outcome }
}

fn render<B: SpeechBackend + ?Sized>(
    ctx: &WorkerContext<'_, B>,
    index: usize,
    article: &Article,
    output: &Path,
) -> Result<Episode> {
    if article.narration.trim().is_empty() {
        return Err(NarrationError::MissingContent);
    }

    info!(
        "[{}/{}] {} — {} characters",
        index + 1,
        ctx.total,
        article.display_title(index),
        article.narration.chars().count()
    );

    let chunks = chunk_text(&article.narration, ctx.chunk_max_chars);
    debug!(article = index + 1, chunks = chunks.len(), "narration split");

    let mut segments = SegmentFiles::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i > 0 && !ctx.throttle.is_zero() {
            thread::sleep(ctx.throttle);
        }
        debug!(
            article = index + 1,
            "chunk {}/{} ({} characters)",
            i + 1,
            chunks.len(),
            chunk.chars().count()
        );
        let path = segment_path(ctx.run_dir, index, i);
        // Registered before writing so a half-written segment is still removed.
        segments.push(path.clone());
        synthesize_to_file(ctx.backend, chunk, ctx.speaker, i + 1, &path)?;
    }

    let info = wav::assemble(segments.paths(), output)?;
    let size_bytes = fs::metadata(output).map_err(|e| NarrationError::io(output, e))?.len();

    Ok(Episode {
        path: output.to_path_buf(),
        format: info.format,
        frames: info.frames,
        duration_secs: info.duration_secs(),
        size_bytes,
    })
}
