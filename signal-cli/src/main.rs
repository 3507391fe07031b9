//! Headline Signals command-line runner
//!
//! Usage:
//!   signal-cli analyze <articles.json> [--out <report.json>] [--min-confidence <x>] [--symbol <SYM>]
//!   signal-cli recache [<snapshot path>]

mod summary;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use serde::Deserialize;
use signal_core::Article;
use signal_feeds::{preprocess, ListingsClient};
use signal_llm::BackendConfig;
use signal_services::{PipelineConfig, PipelineRunner, TickerRegistry};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const USAGE: &str = "\
usage:
  signal-cli analyze <articles.json> [--out <report.json>] [--min-confidence <x>] [--symbol <SYM>]
  signal-cli recache [<snapshot path>]";

/// Article files are either a bare array or a news-API style envelope
#[derive(Deserialize)]
#[serde(untagged)]
enum ArticleFile {
    List(Vec<Article>),
    Envelope { articles: Vec<Article> },
}

#[derive(Debug, Default)]
struct AnalyzeArgs {
    input: PathBuf,
    out: Option<PathBuf>,
    min_confidence: Option<f64>,
    symbol: Option<String>,
}

fn parse_analyze_args(args: &[String]) -> anyhow::Result<AnalyzeArgs> {
    let mut parsed = AnalyzeArgs::default();
    let mut input = None;
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .with_context(|| format!("{} needs a value", flag))
        };
        match arg.as_str() {
            "--out" | "-o" => parsed.out = Some(PathBuf::from(value(arg)?)),
            "--min-confidence" => {
                let raw = value(arg)?;
                let threshold: f64 = raw
                    .parse()
                    .with_context(|| format!("invalid --min-confidence: {}", raw))?;
                if !(0.0..=1.0).contains(&threshold) {
                    bail!("--min-confidence must be within [0, 1]");
                }
                parsed.min_confidence = Some(threshold);
            }
            "--symbol" => parsed.symbol = Some(value(arg)?),
            flag if flag.starts_with('-') => bail!("unknown option {}\n{}", flag, USAGE),
            path if input.is_none() => input = Some(PathBuf::from(path)),
            extra => bail!("unexpected argument {}\n{}", extra, USAGE),
        }
    }

    parsed.input = input.with_context(|| format!("missing articles file\n{}", USAGE))?;
    Ok(parsed)
}

fn load_articles(path: &Path) -> anyhow::Result<Vec<Article>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let file: ArticleFile = serde_json::from_str(&text)
        .with_context(|| format!("{} is not an article list", path.display()))?;
    Ok(match file {
        ArticleFile::List(articles) => articles,
        ArticleFile::Envelope { articles } => articles,
    })
}

async fn analyze(args: AnalyzeArgs) -> anyhow::Result<()> {
    let mut config = PipelineConfig::from_env()?;
    if let Some(threshold) = args.min_confidence {
        config.min_confidence = threshold;
    }

    let backend_config = BackendConfig::from_env()?;
    info!(
        provider = backend_config.provider_name(),
        model = backend_config.model_name(),
        "Using language model backend"
    );
    let backend = backend_config.build()?;

    let registry = Arc::new(TickerRegistry::load(&config.snapshot_path).with_context(|| {
        format!(
            "run `signal-cli recache {}` to download the ticker snapshot",
            config.snapshot_path.display()
        )
    })?);

    let received = load_articles(&args.input)?;
    let received_count = received.len();
    let articles = preprocess(received);
    info!(
        received = received_count,
        kept = articles.len(),
        "Loaded articles"
    );
    if articles.is_empty() {
        warn!("No articles left after preprocessing");
        return Ok(());
    }

    // Ctrl-C stops dispatching new articles; in-flight ones finish
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing in-flight articles");
            let _ = cancel_tx.send(true);
        }
    });

    let runner = PipelineRunner::from_config(backend, registry, &config);
    let report = runner.run_with_cancel(articles, cancel_rx).await?;

    summary::print_summary(&report);
    if let Some(symbol) = &args.symbol {
        summary::print_deep_dive(&report, symbol, config.min_confidence);
    }

    if let Some(out) = &args.out {
        let json = serde_json::to_string_pretty(&report)?;
        if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(out, json).with_context(|| format!("failed to write {}", out.display()))?;
        info!(path = %out.display(), "Report written");
    }

    Ok(())
}

async fn recache(path: Option<&String>) -> anyhow::Result<()> {
    let path = match path {
        Some(path) => PathBuf::from(path),
        None => PipelineConfig::from_env()?.snapshot_path,
    };
    let count = ListingsClient::new().refresh_snapshot(&path).await?;
    println!("Cached {} tickers to {}", count, path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env.local file
    if let Err(e) = dotenvy::from_filename(".env.local") {
        // Not an error if the file doesn't exist
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env.local: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,signal_cli=debug")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("analyze") => analyze(parse_analyze_args(&args[1..])?).await,
        Some("recache") => recache(args.get(1)).await,
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }
}
