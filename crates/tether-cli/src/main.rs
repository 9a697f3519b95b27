//! Tether - follow an HTTP JSON stream, one item per line on stdout.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;

use tether_core::{ConsumeCancellation, Consumer, StreamFormat, TetherConfig};

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// A top-level JSON array streamed element by element
    JsonArray,
    /// Newline-delimited JSON
    JsonLines,
}

impl From<Format> for StreamFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::JsonArray => StreamFormat::JsonArray,
            Format::JsonLines => StreamFormat::JsonLines,
        }
    }
}

/// Follow an HTTP endpoint that streams JSON items, reconnecting on failure
#[derive(Parser)]
#[command(name = "tether")]
#[command(version)]
struct Args {
    /// Streaming endpoint
    endpoint: Url,

    /// Configuration file path (defaults to <config dir>/tether/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Body format
    #[arg(short, long, value_enum)]
    format: Option<Format>,

    /// Extra request header, as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Connect timeout in seconds
    #[arg(long)]
    connect_timeout: Option<u64>,

    /// Read timeout in seconds
    #[arg(long)]
    read_timeout: Option<u64>,

    /// Largest accepted item in bytes
    #[arg(long)]
    max_item_bytes: Option<usize>,

    /// Stop after this many items
    #[arg(short = 'n', long)]
    limit: Option<usize>,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,
}

fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // stdout carries items only
    if json {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("Header '{}' is not in 'Name: value' form", raw))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

/// Config file first, then command-line overrides
fn load_config(args: &Args) -> Result<TetherConfig> {
    let mut config = match &args.config {
        Some(path) => TetherConfig::load(path)?,
        None => TetherConfig::load_default()?,
    };

    if let Some(format) = args.format {
        config.decode.format = format.into();
    }
    if let Some(max) = args.max_item_bytes {
        config.decode.max_item_bytes = max;
    }
    if let Some(secs) = args.connect_timeout {
        config.http.connect_timeout_secs = Some(secs);
    }
    if let Some(secs) = args.read_timeout {
        config.http.read_timeout_secs = Some(secs);
    }
    for raw in &args.headers {
        let (name, value) = parse_header(raw)?;
        config.http.headers.insert(name, value);
    }

    Ok(config)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, stopping"),
        _ = terminate => info!("Received SIGTERM, stopping"),
    }
}

async fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    let consumer = Consumer::from_config(&config)?;

    let cancellation = ConsumeCancellation::new();
    let on_signal = cancellation.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        on_signal.cancel();
    });

    info!("Following {}", args.endpoint);
    let mut items = consumer.consume::<serde_json::Value>(args.endpoint, cancellation.token());
    let mut stdout = tokio::io::stdout();
    let mut written = 0usize;

    while let Some(item) = items.next().await {
        let item = item.context("Stream failed")?;
        let mut line = serde_json::to_vec(&item)?;
        line.push(b'\n');

        if let Err(e) = stdout.write_all(&line).await {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                info!("stdout closed, stopping");
                break;
            }
            return Err(e).context("Failed to write to stdout");
        }
        stdout.flush().await?;

        written += 1;
        if args.limit.is_some_and(|limit| written >= limit) {
            cancellation.cancel();
            break;
        }
    }

    info!("Wrote {} items", written);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    setup_logging(&args.log_level, args.json_logs);

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
