// Product image scraper CLI
//
// Reads Danawa/Compuzone URLs or Danawa product codes, queues one task per
// product, and prints progress lines as the single worker downloads images.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use product_image_scraper::task::parse_inputs;
use product_image_scraper::{
    BrowserManager, BrowserPageExtractor, Downloader, HttpFetcher, Notifier, ProductScraper,
    QueueCoordinator, Site, load_yaml_config,
};

/// Progress lines go to stdout; mirror them in the log only when asked
const DEFAULT_LOG_FILTER: &str = "info,scrape=warn";

#[derive(Parser)]
#[command(name = "product-image-scraper")]
#[command(about = "Save product images from Danawa and Compuzone", long_about = None)]
struct Cli {
    /// Product URLs or Danawa product codes
    inputs: Vec<String>,

    /// Read inputs from a file, one per line
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// YAML config file (defaults to ./config.yaml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root directory for downloaded images
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    headful: bool,
}

impl Cli {
    /// Positional inputs plus `--file`, or stdin when neither is given
    fn input_lines(&self) -> Result<Vec<String>> {
        let mut lines = self.inputs.clone();

        if let Some(path) = &self.file {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read input file {}", path.display()))?;
            lines.extend(contents.lines().map(str::to_string));
        }

        if self.inputs.is_empty() && self.file.is_none() {
            let mut contents = String::new();
            std::io::stdin()
                .read_to_string(&mut contents)
                .context("Failed to read inputs from stdin")?;
            lines.extend(contents.lines().map(str::to_string));
        }

        Ok(lines)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();

    let mut config = load_yaml_config(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(output) = &cli.output {
        config.output_dir = output.clone();
    }
    if cli.headful {
        config.browser.headless = false;
    }

    let lines = cli.input_lines()?;
    let (tasks, rejected) = parse_inputs(lines.iter().map(String::as_str));
    for e in &rejected {
        warn!("{}", e);
    }
    if tasks.is_empty() {
        warn!("No supported inputs given");
        return Ok(());
    }

    let manager = Arc::new(BrowserManager::new(config.browser.clone()));
    if tasks.iter().any(|t| t.site() != Site::DanawaImage) {
        manager
            .get_or_launch()
            .await
            .context("Failed to launch browser")?;
    }

    let fetcher = HttpFetcher::new(&config.http).context("Failed to build HTTP client")?;
    let notifier = Notifier::new();
    let scraper = ProductScraper::new(
        Arc::new(BrowserPageExtractor::new(manager.clone())),
        Downloader::new(Arc::new(fetcher)),
        notifier.clone(),
        config.output_dir.clone(),
        config.timing.clone(),
    );

    let mut progress = notifier.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match progress.recv().await {
                Ok(line) => println!("{line}"),
                Err(RecvError::Lagged(skipped)) => warn!("Skipped {} progress lines", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let queue = QueueCoordinator::start(Arc::new(scraper), notifier.clone());
    let handles: Vec<_> = tasks
        .into_iter()
        .filter_map(|task| queue.submit(task).ok())
        .collect();
    info!("Queued {} tasks", handles.len());

    let (mut saved, mut failed, mut errored) = (0, 0, 0);
    for handle in handles {
        let task = handle.task().clone();
        match handle.finished().await {
            Ok(report) => {
                info!(
                    "{}: {} saved, {} failed in {}",
                    task,
                    report.saved.len(),
                    report.failed,
                    report.folder.display()
                );
                saved += report.saved.len();
                failed += report.failed;
            }
            Err(e) => {
                error!("{}: {}", task, e);
                errored += 1;
            }
        }
    }

    queue.join().await;
    if let Err(e) = manager.shutdown().await {
        warn!("Browser shutdown failed: {}", e);
    }

    // Last sender gone: the printer drains what is left and exits
    drop(notifier);
    let _ = printer.await;

    info!(
        "Done: {} images saved, {} failed, {} tasks errored",
        saved, failed, errored
    );
    Ok(())
}
