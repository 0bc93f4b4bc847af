#![deny(clippy::all)]

pub mod audio_config;
pub mod error;
pub mod frame;
pub mod messages;
pub mod processor;
pub mod streaming_resampler;

#[cfg(feature = "microphone")]
pub mod capture;
#[cfg(feature = "microphone")]
pub mod microphone;

pub use crate::audio_config::{
    CaptureConfig, ProcessorConfig, FRAME_SAMPLES, TARGET_SAMPLE_RATE,
};
pub use crate::error::{Error, Result};
pub use crate::frame::{quantize, PcmFrame};
pub use crate::messages::{
    message_channel, CallbackSink, InitMessage, MessageReceiver, MessageSink,
    ProcessorMessage, RingSink, StatsMessage,
};
pub use crate::processor::{Continuation, PcmProcessor, RenderProcessor, RunningStats};
pub use crate::streaming_resampler::StreamingResampler;

#[cfg(feature = "microphone")]
pub use crate::capture::MicrophoneCapture;
#[cfg(feature = "microphone")]
pub use crate::microphone::{list_input_devices, MicrophoneStream};
