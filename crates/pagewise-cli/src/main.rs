use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use pagewise_core::config_file::{self, ConfigFile};
use pagewise_core::{CleanDocument, ExtractionRequest, relativize_url};
use pagewise_ingest::{ContentAssembler, DocumentCache, DocumentFetcher};
use pagewise_nav::{NavInferenceEngine, NavScoringWeights};
use pagewise_worker::{DEFAULT_SHUTDOWN_GRACE, ProcessSupervisor, SupervisorConfig};

mod output;

use output::ColorMode;

const WORKER_BINARY_NAME: &str = "pagewise-reference-worker";

/// Pagewise - Extract articles and pagination links from web pages
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract the article and next/previous links from a page
    Extract {
        /// URL of the page (also the base for resolving links)
        url: String,

        /// Read the HTML from this file instead of fetching the URL
        #[arg(long)]
        file: Option<PathBuf>,

        /// Path to the extraction worker executable
        #[arg(long)]
        worker: Option<PathBuf>,

        /// Directory for the worker's socket file
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Print the document as JSON
        #[arg(long)]
        json: bool,

        /// Print navigation links as path-relative URLs
        #[arg(long)]
        relative: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Infer next/previous links from a saved HTML file
    Nav {
        /// Path to the HTML file
        file: PathBuf,

        /// URL the file was saved from
        #[arg(long)]
        base_url: String,

        /// Show every scored candidate, not just the winners
        #[arg(long)]
        explain: bool,

        /// Print as JSON
        #[arg(long)]
        json: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Show or initialize the configuration file
    Config {
        /// Write the effective configuration to the user config file
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = config_file::load_config();

    match cli.command {
        Command::Extract {
            url,
            file,
            worker,
            work_dir,
            json,
            relative,
            no_color,
        } => {
            let options = ExtractOptions {
                url,
                file,
                worker,
                work_dir,
                json,
                relative,
                color: ColorMode(!no_color),
            };
            extract(options, &config).await
        }
        Command::Nav {
            file,
            base_url,
            explain,
            json,
            no_color,
        } => nav(&file, &base_url, explain, json, ColorMode(!no_color), &config),
        Command::Config { init } => show_config(config, init),
    }
}

struct ExtractOptions {
    url: String,
    file: Option<PathBuf>,
    worker: Option<PathBuf>,
    work_dir: Option<PathBuf>,
    json: bool,
    relative: bool,
    color: ColorMode,
}

async fn extract(options: ExtractOptions, config: &ConfigFile) -> anyhow::Result<()> {
    let worker_config = config.worker.clone().unwrap_or_default();
    let fetch_config = config.fetch.clone().unwrap_or_default();

    // Resolve configuration: CLI flags > env vars > config file > defaults
    let binary_path = options
        .worker
        .or_else(|| std::env::var("PAGEWISE_WORKER_PATH").ok().map(PathBuf::from))
        .or_else(|| worker_config.binary_path.clone().map(PathBuf::from))
        .or_else(sibling_worker_binary)
        .context("no worker binary configured; pass --worker or set PAGEWISE_WORKER_PATH")?;
    let work_dir = options
        .work_dir
        .or_else(|| std::env::var("PAGEWISE_WORK_DIR").ok().map(PathBuf::from))
        .or_else(|| worker_config.work_dir.clone().map(PathBuf::from))
        .unwrap_or_else(std::env::temp_dir);
    let grace = worker_config
        .shutdown_grace_secs
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_SHUTDOWN_GRACE);

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_clone.cancel();
        }
    });

    let html: Option<Bytes> = match &options.file {
        Some(path) => Some(
            std::fs::read(path)
                .with_context(|| format!("reading {}", path.display()))?
                .into(),
        ),
        None => None,
    };

    let supervisor_config =
        SupervisorConfig::new(binary_path, work_dir).apply_file_config(&worker_config);
    let supervisor = Arc::new(ProcessSupervisor::start(supervisor_config, &cancel).await?);

    let assembler = ContentAssembler::new(supervisor.clone())
        .with_engine(nav_engine(config))
        .with_fetcher(DocumentFetcher::from_config(&fetch_config))
        .with_cache(Arc::new(DocumentCache::from_config(&fetch_config)));
    let result = match html {
        Some(html) => {
            let request = ExtractionRequest::new(html, options.url.as_str());
            assembler.assemble(&request, &cancel).await
        }
        None => assembler.assemble_url(&options.url, &cancel).await,
    };

    if let Err(e) = supervisor.close(grace).await {
        tracing::warn!(error = %e, "worker shutdown");
    }

    let mut doc = match result {
        Ok(doc) => doc,
        Err(e) if e.is_cancelled() => anyhow::bail!("interrupted"),
        Err(e) => return Err(e.into()),
    };
    if options.relative {
        relativize_links(&mut doc);
    }

    let mut stdout = std::io::stdout().lock();
    if options.json {
        serde_json::to_writer_pretty(&mut stdout, &doc)?;
        writeln!(stdout)?;
    } else {
        output::print_document(&mut stdout, &doc, options.color)?;
    }
    Ok(())
}

fn nav(
    file: &Path,
    base_url: &str,
    explain: bool,
    json: bool,
    color: ColorMode,
    config: &ConfigFile,
) -> anyhow::Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let html = String::from_utf8_lossy(&bytes);
    let engine = nav_engine(config);
    let links = engine.infer(&html, base_url);

    let mut stdout = std::io::stdout().lock();
    if explain {
        let candidates = engine.candidates(&html, base_url);
        if json {
            serde_json::to_writer_pretty(&mut stdout, &candidates)?;
            writeln!(stdout)?;
        } else {
            output::print_candidates(&mut stdout, &candidates, &links, color)?;
            writeln!(stdout)?;
            output::print_nav(&mut stdout, &links, color)?;
        }
    } else if json {
        serde_json::to_writer_pretty(&mut stdout, &links)?;
        writeln!(stdout)?;
    } else {
        output::print_nav(&mut stdout, &links, color)?;
    }
    Ok(())
}

fn show_config(config: ConfigFile, init: bool) -> anyhow::Result<()> {
    if init {
        let path = config_file::save_config(&config).map_err(anyhow::Error::msg)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }
    match config_file::config_path() {
        Some(path) => println!("# {}", path.display()),
        None => println!("# no user config directory"),
    }
    print!("{}", config_file::to_toml_string(&config).map_err(anyhow::Error::msg)?);
    Ok(())
}

fn nav_engine(config: &ConfigFile) -> NavInferenceEngine {
    let weights = match &config.nav {
        Some(nav) => NavScoringWeights::default().with_overrides(nav),
        None => NavScoringWeights::default(),
    };
    NavInferenceEngine::with_weights(weights)
}

fn relativize_links(doc: &mut CleanDocument) {
    if !doc.nav_next.is_empty() {
        doc.nav_next = relativize_url(&doc.nav_next);
    }
    if !doc.nav_prev.is_empty() {
        doc.nav_prev = relativize_url(&doc.nav_prev);
    }
}

/// The reference worker installed next to this executable, if any.
fn sibling_worker_binary() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let candidate = exe.parent()?.join(WORKER_BINARY_NAME);
    candidate.exists().then_some(candidate)
}
