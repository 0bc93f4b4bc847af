// Microphone Capture - Lock-Free Real-Time Compliant
//
// Architecture:
// 1. CPAL callback owns the PcmProcessor and calls ingest() per buffer
// 2. No mutexes or I/O in callback; frames go out through a lock-free ring
// 3. Background thread (see capture.rs) drains the ring and hands messages on

use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

use crate::audio_config::ProcessorConfig;
use crate::messages::{message_channel, MessageReceiver, MessageSink};
use crate::processor::{Continuation, PcmProcessor, RenderProcessor};

/// List available input devices as (id, display name)
pub fn list_input_devices() -> Result<Vec<(String, String)>> {
    let host = cpal::default_host();
    let mut list = Vec::new();
    list.push(("default".to_string(), "Default Microphone".to_string()));

    if let Ok(devices) = host.input_devices() {
        for device in devices {
            if let Ok(name) = device.name() {
                list.push((name.clone(), name));
            }
        }
    }
    Ok(list)
}

fn select_device(host: &cpal::Host, device_id: Option<&str>) -> Result<cpal::Device> {
    if let Some(id) = device_id.filter(|id| *id != "default") {
        if let Ok(mut devices) = host.input_devices() {
            if let Some(device) = devices.find(|d| matches!(d.name(), Ok(n) if n == id)) {
                return Ok(device);
            }
        }
        info!("[Microphone] Device '{}' not found, using default", id);
    }
    host.default_input_device()
        .ok_or_else(|| anyhow::anyhow!("No input device found"))
}

/// Microphone stream with the PCM processor running in its callback.
///
/// Messages posted by the processor are read from the receiver taken with
/// [`MicrophoneStream::take_receiver`].
pub struct MicrophoneStream {
    stream: Option<Stream>,
    receiver: Option<MessageReceiver>,
    sample_rate: u32,
    is_running: Arc<AtomicBool>,
}

impl MicrophoneStream {
    pub fn new(
        device_id: Option<&str>,
        processor_config: &ProcessorConfig,
        queue_capacity: usize,
    ) -> Result<Self> {
        let host = cpal::default_host();
        let device = select_device(&host, device_id)?;

        let config = device.default_input_config()
            .map_err(|e| anyhow::anyhow!("Failed to get config: {}", e))?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels() as usize;

        info!(
            "[Microphone] Device: {}, Rate: {}Hz, Channels: {}, Format: {:?}",
            device.name().unwrap_or_default(),
            sample_rate,
            channels,
            config.sample_format()
        );

        let (sink, receiver) = message_channel(queue_capacity);
        let processor = PcmProcessor::with_config(sample_rate, processor_config, sink)?;

        let is_running = Arc::new(AtomicBool::new(false));

        let stream = build_input_stream(
            &device,
            &config,
            processor,
            channels,
            is_running.clone(),
        )?;

        Ok(Self {
            stream: Some(stream),
            receiver: Some(receiver),
            sample_rate,
            is_running,
        })
    }

    /// Start capturing audio
    pub fn play(&self) -> Result<()> {
        if let Some(ref stream) = self.stream {
            stream.play().map_err(|e| anyhow::anyhow!("Failed to start stream: {}", e))?;
            self.is_running.store(true, Ordering::SeqCst);
            info!("[Microphone] Stream started");
        }
        Ok(())
    }

    /// Pause capturing
    pub fn pause(&self) -> Result<()> {
        if let Some(ref stream) = self.stream {
            stream.pause().map_err(|e| anyhow::anyhow!("Failed to pause stream: {}", e))?;
            self.is_running.store(false, Ordering::SeqCst);
            info!("[Microphone] Stream paused");
        }
        Ok(())
    }

    /// Device input sample rate (the processor's input rate)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Take ownership of the message receiver for the consumer thread
    pub fn take_receiver(&mut self) -> Option<MessageReceiver> {
        self.receiver.take()
    }

    /// Give the receiver back once its consumer has stopped
    pub fn restore_receiver(&mut self, receiver: MessageReceiver) {
        self.receiver = Some(receiver);
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }
}

/// Take the first channel of an interleaved buffer and run one pass
fn ingest_interleaved<S, T>(
    processor: &mut PcmProcessor<S>,
    scratch: &mut Vec<f32>,
    data: &[T],
    channels: usize,
    to_f32: fn(T) -> f32,
) -> Continuation
where
    S: MessageSink,
    T: Copy,
{
    scratch.clear();
    scratch.extend(data.chunks(channels.max(1)).map(|frame| to_f32(frame[0])));
    processor.ingest(Some(scratch.as_slice()))
}

/// Build input stream whose callback drives the processor
fn build_input_stream<S>(
    device: &cpal::Device,
    config: &cpal::SupportedStreamConfig,
    mut processor: PcmProcessor<S>,
    channels: usize,
    is_running: Arc<AtomicBool>,
) -> Result<Stream>
where
    S: MessageSink + Send + 'static,
{
    let err_fn = |err| error!("[Microphone] Stream error: {}", err);
    // Sized for a typical hardware buffer; grows once if the host sends more
    let mut scratch: Vec<f32> = Vec::with_capacity(4096);

    let stream = match config.sample_format() {
        SampleFormat::F32 => {
            device.build_input_stream(
                &config.clone().into(),
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if !is_running.load(Ordering::Relaxed) {
                        return;
                    }
                    let cont = if channels > 1 {
                        ingest_interleaved(&mut processor, &mut scratch, data, channels, |s| s)
                    } else {
                        processor.ingest(Some(data))
                    };
                    if cont == Continuation::Release {
                        is_running.store(false, Ordering::Relaxed);
                    }
                },
                err_fn,
                None,
            )?
        }
        SampleFormat::I16 => {
            device.build_input_stream(
                &config.clone().into(),
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    if !is_running.load(Ordering::Relaxed) {
                        return;
                    }
                    let cont = ingest_interleaved(
                        &mut processor,
                        &mut scratch,
                        data,
                        channels,
                        |s| s as f32 / 32768.0,
                    );
                    if cont == Continuation::Release {
                        is_running.store(false, Ordering::Relaxed);
                    }
                },
                err_fn,
                None,
            )?
        }
        SampleFormat::I32 => {
            device.build_input_stream(
                &config.clone().into(),
                move |data: &[i32], _: &cpal::InputCallbackInfo| {
                    if !is_running.load(Ordering::Relaxed) {
                        return;
                    }
                    let cont = ingest_interleaved(
                        &mut processor,
                        &mut scratch,
                        data,
                        channels,
                        |s| s as f32 / 2147483648.0,
                    );
                    if cont == Continuation::Release {
                        is_running.store(false, Ordering::Relaxed);
                    }
                },
                err_fn,
                None,
            )?
        }
        format => {
            return Err(anyhow::anyhow!("Unsupported sample format: {:?}", format));
        }
    };

    Ok(stream)
}

impl Drop for MicrophoneStream {
    fn drop(&mut self) {
        self.is_running.store(false, Ordering::SeqCst);
        // Stream will be dropped and stopped automatically
    }
}
