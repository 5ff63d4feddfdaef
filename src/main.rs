use anyhow::{anyhow, Context, Result};
use chat_harvest_lib::config::{merge_overrides, ConfigOverrides};
use chat_harvest_lib::events::{CaptureStatusPayload, EVENT_CAPTURE_STATUS};
use chat_harvest_lib::{export, CaptureSession, ConfigManager, HtmlFrames};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// chat-harvest - capture the full history of a virtualized chat view
#[derive(Parser, Debug)]
#[command(name = "chat-harvest")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory of HTML frames, one per scroll position (sorted by file name)
    #[arg(long)]
    frames: PathBuf,

    /// Chat backend origin used for enrichment lookups
    #[arg(long, env = "CHAT_HARVEST_ORIGIN")]
    origin: Option<String>,

    /// Bearer token for the backend (or set CHAT_HARVEST_TOKEN)
    #[arg(long, env = "CHAT_HARVEST_TOKEN")]
    token: Option<String>,

    /// Session cookie forwarded to the backend
    #[arg(long, env = "CHAT_HARVEST_COOKIE")]
    cookie: Option<String>,

    /// Config file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory the snapshot is written to
    #[arg(long)]
    out: Option<PathBuf>,

    /// Skip backend enrichment
    #[arg(long)]
    no_enrich: bool,

    /// Delay after each scroll reset before re-reading the page
    #[arg(long)]
    settle_delay_ms: Option<u64>,

    /// Hard cap on total scrolling time
    #[arg(long)]
    max_duration_ms: Option<u64>,

    /// Print the snapshot to stdout instead of writing a file
    #[arg(long)]
    print: bool,
}

impl Cli {
    /// Command-line values that take priority over the config file
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            origin: self.origin.clone(),
            auth_token: self.token.clone(),
            cookie: self.cookie.clone(),
            enrich: self.no_enrich.then_some(false),
            output_dir: self.out.clone(),
            settle_delay_ms: self.settle_delay_ms,
            max_duration_ms: self.max_duration_ms,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    let manager = match &cli.config {
        Some(path) => ConfigManager::new(path),
        None => ConfigManager::user_default()
            .ok_or_else(|| anyhow!("Could not determine the user config directory"))?,
    };
    let file_config = manager.read().map_err(|e| anyhow!(e))?;
    log::debug!("Loaded config from {}", manager.path().display());

    let config = merge_overrides(&file_config, &cli.overrides());

    let mut frames = HtmlFrames::load_dir(&cli.frames)
        .map_err(|e| anyhow!(e))
        .with_context(|| format!("Failed to load frames from {}", cli.frames.display()))?;
    log::info!("Loaded {} frames from {}", frames.frame_count(), cli.frames.display());

    let (status_tx, status_rx) = mpsc::unbounded_channel();
    let status_logger = tokio::spawn(forward_status_events(status_rx));

    let session = CaptureSession::from_config(config.clone()).with_status_sender(status_tx);
    let result = session.start_capture(&mut frames).await;

    // Closing the sender lets the forwarder drain and stop
    drop(session);
    let _ = status_logger.await;

    let outcome = result?;
    log::info!(
        "Harvest {:?} after {} iterations; enrichment filled {} fields",
        outcome.state,
        outcome.iterations,
        outcome.enrichment.fields_filled
    );

    if cli.print {
        println!("{}", serde_json::to_string_pretty(&outcome.snapshot)?);
    } else {
        let path = export::write_snapshot(
            &config.output.directory,
            &config.output.filename_prefix,
            &outcome.snapshot,
        )
        .map_err(|e| anyhow!(e))?;
        eprintln!("Saved {} records to {}", outcome.snapshot.metadata.total_records, path.display());
    }

    Ok(())
}

/// Log capture status events as they arrive
async fn forward_status_events(mut rx: mpsc::UnboundedReceiver<CaptureStatusPayload>) {
    log::debug!("Status event forwarder started");

    while let Some(event) = rx.recv().await {
        log::info!(
            "{} {} [{}]{}",
            EVENT_CAPTURE_STATUS,
            event.capture_id,
            event.status.badge_text(),
            event.message.map(|m| format!(" {}", m)).unwrap_or_default()
        );
    }

    log::debug!("Status event forwarder stopped");
}
