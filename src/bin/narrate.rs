//! `rsspeaker-narrate` — narrate every article of a JSON file into WAV files.
//!
//! Usage:
//!   rsspeaker-narrate articles.json audio/
//!   VOICEVOX_MAX_WORKERS=4 rsspeaker-narrate articles.json audio/ --report report.json
//!
//! The input is the JSON array written by the narration-script stage:
//! `[{"title": "...", "narration_script": "...", "source": "..."}, ...]`.
//!
//! Requirements:
//!   - a VOICEVOX engine listening on $VOICEVOX_URL (default http://localhost:50021)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use rsspeaker::{run_batch, Article, NarratorConfig, VoicevoxClient};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "rsspeaker-narrate", version, about = "Narrate articles with VOICEVOX")]
struct Cli {
    /// JSON array of articles.
    input: PathBuf,

    /// Directory for the `<title>.wav` files.
    output_dir: PathBuf,

    /// JSON config file; environment variables and flags override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// VOICEVOX engine URL.
    #[arg(long)]
    endpoint: Option<String>,

    /// VOICEVOX speaker (style) id.
    #[arg(long)]
    speaker: Option<u32>,

    /// Articles narrated in parallel.
    #[arg(long)]
    max_workers: Option<usize>,

    /// Maximum characters per synthesis chunk.
    #[arg(long)]
    chunk_chars: Option<usize>,

    /// Write the batch report as JSON to this file.
    #[arg(long)]
    report: Option<PathBuf>,
}

impl Cli {
    fn narrator_config(&self) -> Result<NarratorConfig> {
        let base = match &self.config {
            Some(path) => NarratorConfig::load(path)
                .with_context(|| format!("Cannot load config: {}", path.display()))?,
            None => NarratorConfig::default(),
        };
        let mut config = base.with_env_overrides(|key| std::env::var(key).ok());

        config.output_dir = self.output_dir.clone();
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(speaker) = self.speaker {
            config.speaker = speaker;
        }
        if let Some(workers) = self.max_workers {
            config.max_workers = workers;
        }
        if let Some(chars) = self.chunk_chars {
            config.chunk_max_chars = chars;
        }
        Ok(config)
    }
}

fn load_articles(path: &Path) -> Result<Vec<Article>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Cannot read articles: {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse articles: {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = cli.narrator_config()?;

    info!("Loading articles from {}", cli.input.display());
    let articles = load_articles(&cli.input)?;
    info!("{} articles, {} parallel workers", articles.len(), config.workers());

    let client = VoicevoxClient::from_config(&config).context("Failed to build HTTP client")?;
    let report = run_batch(&client, &articles, &config).context("Narration batch failed to start")?;

    for failed in report.failures() {
        println!("✗ {} - {}", failed.title, failed.reason().unwrap_or_default());
    }
    println!("✓ {}", report.summary());

    if let Some(path) = &cli.report {
        let json = serde_json::to_vec_pretty(&report).context("Failed to serialise report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Cannot write report: {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    Ok(())
}
