use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{ArgGroup, Parser};
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

mod extract;
mod routes;

/// Reference article extraction worker for pagewise
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(group(ArgGroup::new("listen").required(true).args(["uds", "port"])))]
struct Args {
    /// Serve on this Unix domain socket
    #[arg(long)]
    uds: Option<PathBuf>,

    /// Serve on 127.0.0.1:<PORT> instead
    #[arg(long)]
    port: Option<u16>,

    /// How long in-flight requests may take to drain after SIGTERM
    #[arg(long, default_value_t = 2000)]
    shutdown_grace_ms: u64,

    /// Sleep before binding (simulates a slow start)
    #[arg(long, default_value_t = 0)]
    startup_delay_ms: u64,

    /// Exit on our own after this long (simulates a crash)
    #[arg(long)]
    exit_after_ms: Option<u64>,

    /// Swallow SIGTERM so only SIGKILL stops the process
    #[arg(long)]
    ignore_sigterm: bool,

    /// Write our pid to this file at startup
    #[arg(long)]
    pid_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    if let Some(path) = &args.pid_file {
        std::fs::write(path, std::process::id().to_string())
            .with_context(|| format!("writing pid file {}", path.display()))?;
    }

    let shutdown = CancellationToken::new();
    watch_signals(shutdown.clone(), args.ignore_sigterm)?;

    if let Some(ms) = args.exit_after_ms {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            tracing::warn!(after_ms = ms, "exiting on request");
            std::process::exit(0);
        });
    }

    if args.startup_delay_ms > 0 {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(args.startup_delay_ms)) => {}
            _ = shutdown.cancelled() => {
                tracing::info!("shutdown requested before startup finished");
                return Ok(());
            }
        }
    }

    let app = routes::router();
    let grace = Duration::from_millis(args.shutdown_grace_ms);
    let stopped = shutdown.clone().cancelled_owned();

    if let Some(path) = args.uds {
        let listener = tokio::net::UnixListener::bind(&path)
            .with_context(|| format!("binding {}", path.display()))?;
        tracing::info!(socket = %path.display(), "worker listening");
        let server = axum::serve(listener, app)
            .with_graceful_shutdown(stopped)
            .into_future();
        let result = run_until_stopped(server, &shutdown, grace).await;
        let _ = std::fs::remove_file(&path);
        result
    } else {
        let addr = SocketAddr::from(([127, 0, 0, 1], args.port.unwrap_or_default()));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding {addr}"))?;
        tracing::info!(%addr, "worker listening");
        let server = axum::serve(listener, app)
            .with_graceful_shutdown(stopped)
            .into_future();
        run_until_stopped(server, &shutdown, grace).await
    }
}

/// Drive the server; once shutdown starts, give it `grace` to drain.
async fn run_until_stopped(
    server: impl Future<Output = std::io::Result<()>>,
    shutdown: &CancellationToken,
    grace: Duration,
) -> anyhow::Result<()> {
    let drain_deadline = async {
        shutdown.cancelled().await;
        tokio::time::sleep(grace).await;
    };
    tokio::select! {
        result = server => result.context("server failed")?,
        _ = drain_deadline => tracing::warn!(?grace, "drain took too long; exiting"),
    }
    tracing::info!("worker stopped");
    Ok(())
}

fn watch_signals(shutdown: CancellationToken, ignore_sigterm: bool) -> anyhow::Result<()> {
    let mut sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("installing SIGINT handler")?;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    if ignore_sigterm {
                        tracing::warn!("ignoring SIGTERM");
                        continue;
                    }
                    tracing::info!("SIGTERM received; shutting down");
                }
                _ = sigint.recv() => tracing::info!("SIGINT received; shutting down"),
            }
            shutdown.cancel();
            break;
        }
    });
    Ok(())
}
