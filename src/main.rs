//! Application entry point: Setu listing client CLI.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Parse the command line.
//! 3. Load [`AppConfig`] (default on first run), then apply `SETU_API_URL`
//!    and `--base-url` on top.
//! 4. For `analyze`: create the tokio runtime, build the HTTP services and
//!    the cpal microphone, spawn the [`Session`] loop and drive it with
//!    commands, printing the listing when the analysis finishes.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use setu_client::{
    audio::CpalMicrophone,
    config::AppConfig,
    gauge,
    media::{ImagePayload, MemoryPreviewStore},
    service::{build_client, AnalysisPayload, HttpAnalysisService, HttpTranscriptionService},
    session::{new_shared_state, Session, SessionCommand, SessionEvent, SessionServices},
    submission::SubmissionState,
};

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "setu-client", version, about)]
struct Cli {
    /// Settings file to use instead of the platform default.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL; overrides the settings file and SETU_API_URL.
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze product photos and print the generated listing.
    Analyze {
        /// Product photos, in the order they should be sent.
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Features the photos cannot show (material, origin, ...).
        #[arg(long)]
        features: Option<String>,

        /// Expected price in rupees.
        #[arg(long)]
        price: Option<u64>,

        /// Record a voice description for this many seconds first.
        #[arg(long, value_name = "SECS")]
        record: Option<f32>,
    },

    /// Print the effective configuration.
    Config {
        /// Also write it to the settings file.
        #[arg(long)]
        save: bool,
    },

    /// Print where `current` sits between `min` and `max` (0-100).
    Gauge { min: f64, max: f64, current: f64 },
}

struct AnalyzeArgs {
    images: Vec<PathBuf>,
    features: Option<String>,
    price: Option<u64>,
    record: Option<f32>,
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Command line
    let cli = Cli::parse();

    // 3. Configuration
    let config = load_config(&cli)?;

    match cli.command {
        Command::Config { save } => {
            print!("{}", toml::to_string_pretty(&config)?);
            if save {
                match &cli.config {
                    Some(path) => config.save_to(path)?,
                    None => config.save()?,
                }
                log::info!("settings saved");
            }
            Ok(())
        }
        Command::Gauge { min, max, current } => {
            let pos = gauge::position(Some(min), Some(max), Some(current));
            println!("{pos:.1}");
            println!("{}", render_gauge(pos));
            Ok(())
        }
        Command::Analyze {
            images,
            features,
            price,
            record,
        } => {
            // 4. Tokio runtime
            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .context("failed to create tokio runtime")?;

            rt.block_on(analyze(
                config,
                AnalyzeArgs {
                    images,
                    features,
                    price,
                    record,
                },
            ))
        }
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => AppConfig::load().unwrap_or_else(|e| {
            log::warn!("Failed to load config ({e}); using defaults");
            AppConfig::default()
        }),
    };

    config.apply_env_overrides();
    if let Some(url) = &cli.base_url {
        config.backend.base_url = url.clone();
    }
    Ok(config)
}

// ---------------------------------------------------------------------------
// analyze
// ---------------------------------------------------------------------------

async fn analyze(config: AppConfig, args: AnalyzeArgs) -> Result<()> {
    let record = args
        .record
        .map(|secs| recording_duration(secs, config.audio.max_recording_secs))
        .transpose()?;

    let mut images = Vec::with_capacity(args.images.len());
    for path in &args.images {
        let image = ImagePayload::load(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        images.push(image);
    }

    let client = build_client(&config.backend);
    let services = SessionServices {
        analysis: Arc::new(HttpAnalysisService::with_client(
            client.clone(),
            &config.backend,
        )),
        transcription: Arc::new(HttpTranscriptionService::with_client(
            client,
            &config.backend,
        )),
        microphone: Arc::new(CpalMicrophone::from_config(&config.audio)),
        previews: Arc::new(MemoryPreviewStore::new()),
    };

    log::info!("Setu client using backend {}", config.backend.base_url);

    let state = new_shared_state();
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let session = Session::new(Arc::clone(&state), services, &config).with_events(events_tx);

    let (tx, rx) = mpsc::channel::<SessionCommand>(16);
    let task = tokio::spawn(session.run(rx));

    send(&tx, SessionCommand::AddFiles(images)).await?;
    if let Some(features) = args.features {
        send(&tx, SessionCommand::SetFeatures(features)).await?;
    }
    send(&tx, SessionCommand::SetExpectedPrice(args.price)).await?;

    if let Some(duration) = record {
        record_description(&tx, &mut events, duration).await?;
    }

    send(&tx, SessionCommand::Submit).await?;
    let outcome = wait_for(&mut events, |e| {
        matches!(
            e,
            SessionEvent::AnalysisFinished(_) | SessionEvent::CommandRejected { .. }
        )
    })
    .await;

    drop(tx);
    task.await.context("session task failed")?;

    match outcome {
        Some(SessionEvent::AnalysisFinished(SubmissionState::Success(payload))) => {
            print_listing(&payload);
            Ok(())
        }
        Some(SessionEvent::AnalysisFinished(SubmissionState::Error { message, details })) => {
            if let Some(details) = details {
                log::debug!("analysis error details: {details}");
            }
            bail!("{message}")
        }
        Some(SessionEvent::CommandRejected { message }) => bail!("{message}"),
        _ => bail!("session ended before the analysis finished"),
    }
}

async fn record_description(
    tx: &mpsc::Sender<SessionCommand>,
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    duration: Duration,
) -> Result<()> {
    send(tx, SessionCommand::StartRecording).await?;
    let started = wait_for(events, |e| {
        matches!(
            e,
            SessionEvent::RecordingStarted | SessionEvent::VoiceFailed { .. }
        )
    })
    .await;

    if let Some(SessionEvent::VoiceFailed { message }) = started {
        eprintln!("Voice description skipped: {message}");
        return Ok(());
    }

    eprintln!(
        "Recording for {:.0}s, describe the product...",
        duration.as_secs_f32()
    );
    tokio::time::sleep(duration).await;
    send(tx, SessionCommand::StopRecording).await?;

    let finished = wait_for(events, |e| {
        matches!(
            e,
            SessionEvent::TranscriptionFinished { .. } | SessionEvent::VoiceFailed { .. }
        )
    })
    .await;

    match finished {
        Some(SessionEvent::TranscriptionFinished { merged: Some(text) }) => {
            eprintln!("Heard: {text}");
        }
        Some(SessionEvent::TranscriptionFinished { merged: None }) => {
            eprintln!("No speech detected.");
        }
        Some(SessionEvent::VoiceFailed { message }) => {
            eprintln!("Voice description skipped: {message}");
        }
        _ => {}
    }
    Ok(())
}

/// Validate `--record SECS`, capped at the configured recording limit.
fn recording_duration(secs: f32, max_secs: f32) -> Result<Duration> {
    if !(secs.is_finite() && secs > 0.0) {
        bail!("--record must be a positive number of seconds");
    }
    let capped = if max_secs.is_finite() && max_secs > 0.0 && secs > max_secs {
        log::warn!("--record {secs}s exceeds the {max_secs}s limit; recording {max_secs}s");
        max_secs
    } else {
        secs
    };
    Duration::try_from_secs_f32(capped)
        .with_context(|| format!("--record {secs} is out of range"))
}

async fn send(tx: &mpsc::Sender<SessionCommand>, command: SessionCommand) -> Result<()> {
    tx.send(command)
        .await
        .map_err(|_| anyhow::anyhow!("session stopped unexpectedly"))
}

async fn wait_for<F>(
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    wanted: F,
) -> Option<SessionEvent>
where
    F: Fn(&SessionEvent) -> bool,
{
    while let Some(event) = events.recv().await {
        log::debug!("event: {event:?}");
        if wanted(&event) {
            return Some(event);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_listing(payload: &AnalysisPayload) {
    println!("{}", payload.product_name);
    if let Some(brand) = &payload.brand {
        println!("Brand:     {brand}");
    }
    if !payload.material.is_empty() {
        println!("Material:  {}", payload.material);
    }
    print!("Price:     {}", payload.suggested_price);
    if let Some(uplift) = &payload.price_uplift {
        print!("  ({uplift})");
    }
    println!();
    if !payload.unique_tags.is_empty() {
        println!("Tags:      {}", payload.unique_tags.join(", "));
    }
    if let Some(reason) = &payload.pricing_reason {
        println!("\n{reason}");
    }

    if let Some(stats) = &payload.market_stats {
        let pos = stats.gauge_position(payload.raw_price);
        println!(
            "\nMarket:    ₹{:.0} – ₹{:.0} (avg ₹{:.0})",
            stats.min, stats.max, stats.avg
        );
        println!("           {}", render_gauge(pos));
        if !stats.sources.is_empty() {
            println!("Sources:   {}", stats.sources.join(", "));
        }
    }

    if let Some(advice) = payload.photo_advice.as_deref().filter(|a| !a.is_empty()) {
        println!("\nPhoto tips:");
        for tip in advice {
            println!("  - {tip}");
        }
    }

    println!("\n--- WhatsApp ---\n{}", payload.listings.whatsapp);
    println!("\n--- Amazon ---\n{}", payload.listings.amazon.title);
    for feature in &payload.listings.amazon.features {
        println!("  • {feature}");
    }
    if let Some(instagram) = &payload.listings.instagram {
        println!("\n--- Instagram ---\n{instagram}");
    }
}

/// Text rendering of the gauge: a 21-cell bar with a marker.
fn render_gauge(position: f64) -> String {
    const CELLS: usize = 21;
    let marker = ((position / 100.0) * (CELLS - 1) as f64).round() as usize;
    (0..CELLS)
        .map(|i| if i == marker.min(CELLS - 1) { '●' } else { '─' })
        .collect()
}
