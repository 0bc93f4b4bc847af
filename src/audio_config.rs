// Audio Configuration
// Fixed constants for the 16kHz STT stream, plus the TOML-loadable knobs

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Output sample rate expected by the speech backend
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Frame duration in milliseconds
pub const FRAME_MS: u32 = 10;

/// Samples per frame at 16kHz
/// 16000 * 0.010 = 160 samples
pub const FRAME_SAMPLES: usize = 160;

/// Passes between two `stats` messages
/// 48kHz with 128-sample render quanta: 375 * 128 = 48000 (one second)
pub const STATS_INTERVAL_PASSES: u64 = 375;

/// Outbound message ring capacity
/// 512 messages = ~5s of frames at 100 frames/s
pub const MESSAGE_QUEUE_CAPACITY: usize = 512;

/// Consumer thread poll interval in milliseconds
pub const CONSUMER_POLL_MS: u64 = 5;

/// Tunables of a single processor
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Emit a `stats` message every N passes (0 disables stats)
    pub stats_interval: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            stats_interval: STATS_INTERVAL_PASSES,
        }
    }
}

/// Capture session configuration
///
/// ```toml
/// device = "USB Microphone"
/// message_queue_capacity = 256
///
/// [processor]
/// stats_interval = 375
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Input device name, `None` or "default" for the host default
    pub device: Option<String>,
    pub message_queue_capacity: usize,
    pub consumer_poll_ms: u64,
    pub processor: ProcessorConfig,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: None,
            message_queue_capacity: MESSAGE_QUEUE_CAPACITY,
            consumer_poll_ms: CONSUMER_POLL_MS,
            processor: ProcessorConfig::default(),
        }
    }
}

impl CaptureConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        if config.message_queue_capacity == 0 {
            return Err(Error::InvalidConfig(
                "message_queue_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }
}
