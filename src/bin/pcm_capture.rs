//! pcm-capture - run a microphone capture session and log what comes out
//!
//! Frames are counted, `init` and `stats` messages are logged as JSON.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use meeting_pcm::{list_input_devices, CaptureConfig, MicrophoneCapture, ProcessorMessage};

#[derive(Parser, Debug)]
#[command(name = "pcm-capture")]
#[command(about = "Capture microphone audio as 16kHz 10ms PCM frames")]
#[command(version)]
struct Args {
    /// Input device name (see --list-devices)
    #[arg(short, long, env = "PCM_CAPTURE_DEVICE")]
    device: Option<String>,

    /// TOML configuration file
    #[arg(short, long, env = "PCM_CAPTURE_CONFIG")]
    config: Option<PathBuf>,

    /// How long to capture
    #[arg(short, long, default_value = "10")]
    seconds: u64,

    /// Print input devices and exit
    #[arg(long)]
    list_devices: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meeting_pcm=info,pcm_capture=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    if args.list_devices {
        for (id, name) in list_input_devices()? {
            println!("{id}\t{name}");
        }
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => CaptureConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => CaptureConfig::default(),
    };
    if args.device.is_some() {
        config.device = args.device.clone();
    }

    let frames = Arc::new(AtomicU64::new(0));
    let frames_seen = frames.clone();

    let mut capture = MicrophoneCapture::new(config)?;
    info!(
        "Capturing {}s from {}Hz input to {}Hz frames",
        args.seconds,
        capture.input_sample_rate().unwrap_or_default(),
        capture.sample_rate()
    );

    capture.start(move |message| match message {
        ProcessorMessage::Frame(frame) => {
            let n = frames_seen.fetch_add(1, Ordering::Relaxed) + 1;
            debug!("frame #{n}: {frame:?}");
        }
        other => {
            if let Some(json) = other.to_json() {
                info!("{json}");
            }
        }
    })?;

    thread::sleep(Duration::from_secs(args.seconds));
    capture.stop();

    info!("Done: {} frames received", frames.load(Ordering::Relaxed));
    Ok(())
}
