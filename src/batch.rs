//! Batch scheduler — narrates a list of articles on a bounded worker pool.
//!
//! Every article gets its own worker call; at most
//! [`NarratorConfig::max_workers`] run at the same time.  Workers are fully
//! independent: a failed article is logged as soon as it finishes and the
//! rest of the batch carries on.  Outcomes keep the article's input position,
//! and the report lists them in input order.

use std::fs;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    article::{narrate_article, output_paths, Article, ArticleOutcome, WorkerContext},
    config::NarratorConfig,
    error::{NarrationError, Result},
    voicevox::SpeechBackend,
};

/// Outcomes of one batch, in input order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub outcomes: Vec<ArticleOutcome>,
}

impl BatchReport {
    fn new(mut outcomes: Vec<ArticleOutcome>) -> Self {
        outcomes.sort_by_key(|o| o.index);
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        Self { total: outcomes.len(), succeeded, outcomes }
    }

    pub fn failures(&self) -> impl Iterator<Item = &ArticleOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// `"<success>/<total> articles produced audio"`.
    pub fn summary(&self) -> String {
        format!("{}/{} articles produced audio", self.succeeded, self.total)
    }
}

/// Narrate `articles` into `config.output_dir`.
///
/// The only errors are setup failures before any article starts: creating
/// the output directory, the run's segment directory, or the worker pool.
/// Once workers run, every article ends up in the report.
pub fn run_batch<B: SpeechBackend + ?Sized>(
    backend: &B,
    articles: &[Article],
    config: &NarratorConfig,
) -> Result<BatchReport> {
    let workers = config.workers();
    info!(articles = articles.len(), workers, endpoint = config.base_url(), "starting narration batch");

    // ── Shared filesystem state, created once before the pool starts ────────
    fs::create_dir_all(&config.output_dir)
        .map_err(|e| NarrationError::io(&config.output_dir, e))?;
    fs::create_dir_all(&config.temp_dir).map_err(|e| NarrationError::io(&config.temp_dir, e))?;
    let run_dir = tempfile::Builder::new()
        .prefix(&format!("rsspeaker-{}-", std::process::id()))
        .tempdir_in(&config.temp_dir)
        .map_err(|e| NarrationError::io(&config.temp_dir, e))?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("narrator-{i}"))
        .build()?;

    let outputs = output_paths(articles, &config.output_dir);
    let ctx = WorkerContext {
        backend,
        speaker: config.speaker,
        chunk_max_chars: config.chunk_max_chars,
        throttle: config.throttle(),
        run_dir: run_dir.path(),
        total: articles.len(),
    };

    // ── Fan out: one task per article, results tagged with the input index ──
    let outcomes: Vec<ArticleOutcome> = pool.install(|| {
        (0..articles.len())
            .into_par_iter()
            .with_max_len(1)
            .map(|i| {
                let outcome = narrate_article(&ctx, i, &articles[i], &outputs[i]);
                if let Some(reason) = outcome.reason() {
                    warn!("⚠ [{}/{}] {} - {}", i + 1, ctx.total, outcome.title, reason);
                }
                outcome
            })
            .collect()
    });

    if let Err(e) = run_dir.close() {
        warn!(error = %e, "cannot remove segment directory");
    }

    let report = BatchReport::new(outcomes);
    info!("{}", report.summary());
    Ok(report)
}
