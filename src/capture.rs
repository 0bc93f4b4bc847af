// Capture Session
//
// Owns the microphone stream and a consumer thread. The stream callback runs
// the processor; the consumer thread drains the message ring and calls the
// handler off the real-time thread. Stopping hands the ring back to the
// stream, so a session can be started again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::audio_config::{CaptureConfig, TARGET_SAMPLE_RATE};
use crate::messages::{MessageReceiver, ProcessorMessage};
use crate::microphone::MicrophoneStream;

pub struct MicrophoneCapture {
    stop_signal: Arc<AtomicBool>,
    consumer_thread: Option<thread::JoinHandle<MessageReceiver>>,
    config: CaptureConfig,
    input: Option<MicrophoneStream>,
}

impl MicrophoneCapture {
    pub fn new(config: CaptureConfig) -> Result<Self> {
        let input = MicrophoneStream::new(
            config.device.as_deref(),
            &config.processor,
            config.message_queue_capacity,
        )
        .context("Failed to open microphone")?;

        Ok(Self {
            stop_signal: Arc::new(AtomicBool::new(false)),
            consumer_thread: None,
            config,
            input: Some(input),
        })
    }

    /// Output sample rate of the frames
    pub fn sample_rate(&self) -> u32 {
        TARGET_SAMPLE_RATE
    }

    /// Device rate feeding the processor
    pub fn input_sample_rate(&self) -> Option<u32> {
        self.input.as_ref().map(|i| i.sample_rate())
    }

    /// Start the stream; `handler` receives every message in emission order
    pub fn start<F>(&mut self, mut handler: F) -> Result<()>
    where
        F: FnMut(ProcessorMessage) + Send + 'static,
    {
        if self.consumer_thread.is_some() {
            return Err(anyhow::anyhow!("Capture already started"));
        }
        self.stop_signal.store(false, Ordering::SeqCst);
        let stop_signal = self.stop_signal.clone();
        let poll = Duration::from_millis(self.config.consumer_poll_ms);

        let input_ref = self.input.as_mut()
            .ok_or_else(|| anyhow::anyhow!("Input missing"))?;
        let receiver = input_ref.take_receiver()
            .ok_or_else(|| anyhow::anyhow!("Message receiver lost"))?;

        if let Err(e) = input_ref.play() {
            input_ref.restore_receiver(receiver);
            return Err(e);
        }

        self.consumer_thread = Some(thread::spawn(move || {
            run_consumer(receiver, &stop_signal, poll, &mut handler)
        }));

        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(input) = self.input.as_ref() {
            let _ = input.pause();
        }
        self.stop_signal.store(true, Ordering::SeqCst);
        if let Some(handle) = self.consumer_thread.take() {
            match handle.join() {
                Ok(receiver) => {
                    if let Some(input) = self.input.as_mut() {
                        input.restore_receiver(receiver);
                    }
                }
                Err(_) => error!("[MicrophoneCapture] Consumer thread panicked"),
            }
        }
    }
}

/// Drain `receiver` into `handler` until `stop_signal` is set, then hand the
/// receiver back. Whatever is queued when the signal is seen still gets
/// delivered.
fn run_consumer<F>(
    mut receiver: MessageReceiver,
    stop_signal: &AtomicBool,
    poll: Duration,
    handler: &mut F,
) -> MessageReceiver
where
    F: FnMut(ProcessorMessage),
{
    info!("[MicrophoneCapture] Consumer thread started");
    let mut dropped = 0u64;

    loop {
        let stopping = stop_signal.load(Ordering::Relaxed);

        let mut delivered = 0usize;
        for message in receiver.drain() {
            if let ProcessorMessage::Stats(stats) = &message {
                if stats.dropped_messages > dropped {
                    warn!(
                        "[MicrophoneCapture] Consumer not keeping up, {} messages dropped",
                        stats.dropped_messages
                    );
                    dropped = stats.dropped_messages;
                }
            }
            handler(message);
            delivered += 1;
        }

        if stopping {
            break;
        }
        if delivered == 0 {
            thread::sleep(poll);
        }
    }

    info!("[MicrophoneCapture] Consumer thread stopped.");
    receiver
}

impl Drop for MicrophoneCapture {
    fn drop(&mut self) {
        self.stop();
    }
}
