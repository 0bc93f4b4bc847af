// PCM Processor - Real-Time Compliant
//
// Runs on the audio render thread, once per render quantum:
// 1. Buffer the incoming chunk
// 2. Decimate to 16kHz (nearest neighbor)
// 3. Cut 160-sample frames, quantize to i16, post to the sink
// 4. Every 375th pass, post stats
//
// No locks, no I/O, no sleeping, no logging after construction. Frames are
// inline arrays. Dropped messages are counted here and reported through the
// next stats message.

use std::collections::VecDeque;

use tracing::info;

use crate::audio_config::{ProcessorConfig, FRAME_SAMPLES, TARGET_SAMPLE_RATE};
use crate::error::Result;
use crate::frame::PcmFrame;
use crate::messages::{InitMessage, MessageSink, ProcessorMessage, StatsMessage};
use crate::streaming_resampler::StreamingResampler;

/// What the host should do with the processor after a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    KeepAlive,
    Release,
}

/// A processor driven by the host audio runtime on a real-time cadence
pub trait RenderProcessor {
    /// Handle one render quantum of mono input.
    ///
    /// `None` means the host had no input connected for this quantum.
    fn ingest(&mut self, samples: Option<&[f32]>) -> Continuation;
}

/// Lifetime counters, never reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunningStats {
    pub input_samples: u64,
    pub output_samples: u64,
    pub process_count: u64,
    /// Messages the sink refused
    pub dropped_messages: u64,
}

impl RunningStats {
    /// inputSamples / max(1, outputSamples)
    pub fn actual_ratio(&self) -> f64 {
        self.input_samples as f64 / self.output_samples.max(1) as f64
    }
}

/// Converts an arbitrary-rate mono stream into 16kHz 160-sample i16 frames
pub struct PcmProcessor<S: MessageSink> {
    input_rate: u32,
    resampler: StreamingResampler,
    output: VecDeque<f32>,
    stats: RunningStats,
    config: ProcessorConfig,
    sink: S,
}

impl<S: MessageSink> PcmProcessor<S> {
    /// Create a processor for the host's actual input rate with default tuning
    pub fn new(input_rate: u32, sink: S) -> Result<Self> {
        Self::with_config(input_rate, &ProcessorConfig::default(), sink)
    }

    pub fn with_config(input_rate: u32, config: &ProcessorConfig, sink: S) -> Result<Self> {
        let resampler = StreamingResampler::new(input_rate, TARGET_SAMPLE_RATE)?;
        let ratio = resampler.ratio();

        let mut processor = Self {
            input_rate,
            resampler,
            output: VecDeque::with_capacity(FRAME_SAMPLES * 2),
            stats: RunningStats::default(),
            config: config.clone(),
            sink,
        };

        info!(
            "[PcmProcessor] Created: {}Hz -> {}Hz (ratio: {:.5})",
            input_rate, TARGET_SAMPLE_RATE, ratio
        );
        processor.post(ProcessorMessage::Init(InitMessage {
            input_rate,
            target_rate: TARGET_SAMPLE_RATE,
            ratio,
        }));

        Ok(processor)
    }

    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    pub fn target_rate(&self) -> u32 {
        TARGET_SAMPLE_RATE
    }

    pub fn ratio(&self) -> f64 {
        self.resampler.ratio()
    }

    /// Fractional read position within the input buffer
    pub fn cursor(&self) -> f64 {
        self.resampler.cursor()
    }

    pub fn stats(&self) -> RunningStats {
        self.stats
    }

    /// Unresampled input plus unframed output
    pub fn backlog(&self) -> usize {
        self.resampler.buffered() + self.output.len()
    }

    /// Resampled samples waiting for a full frame (always < 160)
    pub fn pending_output(&self) -> usize {
        self.output.len()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn process_chunk(&mut self, samples: &[f32]) {
        self.resampler.push(samples);
        self.stats.input_samples += samples.len() as u64;
        self.stats.process_count += 1;

        self.resampler.resample_into(&mut self.output);
        self.flush_frames();

        let interval = self.config.stats_interval;
        if interval > 0 && self.stats.process_count % interval == 0 {
            self.post_stats();
        }
    }

    fn flush_frames(&mut self) {
        let mut block = [0.0f32; FRAME_SAMPLES];
        while self.output.len() >= FRAME_SAMPLES {
            for (slot, sample) in block.iter_mut().zip(self.output.drain(..FRAME_SAMPLES)) {
                *slot = sample;
            }
            self.post(ProcessorMessage::Frame(PcmFrame::from_samples(&block)));
            self.stats.output_samples += FRAME_SAMPLES as u64;
        }
    }

    fn post_stats(&mut self) {
        let stats = StatsMessage {
            process_count: self.stats.process_count,
            input_samples: self.stats.input_samples,
            output_samples: self.stats.output_samples,
            actual_ratio: format_ratio(self.stats.actual_ratio()),
            expected_ratio: format_ratio(self.ratio()),
            buffer_size: self.backlog(),
            dropped_messages: self.stats.dropped_messages,
        };
        self.post(ProcessorMessage::Stats(stats));
    }

    fn post(&mut self, message: ProcessorMessage) {
        if !self.sink.post(message) {
            self.stats.dropped_messages += 1;
        }
    }
}

/// Three decimals, exact ties rounded up (3.0625 -> "3.063").
///
/// `{:.3}` alone rounds a tie to even. Ratios are never negative.
fn format_ratio(value: f64) -> String {
    format!("{:.3}", (value * 1000.0 + 0.5).floor() / 1000.0)
}

impl<S: MessageSink> RenderProcessor for PcmProcessor<S> {
    fn ingest(&mut self, samples: Option<&[f32]>) -> Continuation {
        if let Some(samples) = samples {
            self.process_chunk(samples);
        }
        Continuation::KeepAlive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn frames(messages: &[ProcessorMessage]) -> Vec<PcmFrame> {
        messages.iter().filter_map(|m| m.as_frame().copied()).collect()
    }

    fn stats_messages(messages: &[ProcessorMessage]) -> Vec<StatsMessage> {
        messages
            .iter()
            .filter_map(|m| match m {
                ProcessorMessage::Stats(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_init_message_first() {
        let processor = PcmProcessor::new(44100, Vec::new()).unwrap();
        let sink = processor.into_sink();
        assert_eq!(
            sink,
            vec![ProcessorMessage::Init(InitMessage {
                input_rate: 44100,
                target_rate: 16000,
                ratio: 2.75625,
            })]
        );
    }

    #[test]
    fn test_zero_rate_rejected() {
        let result = PcmProcessor::new(0, Vec::<ProcessorMessage>::new());
        assert!(matches!(result, Err(Error::InvalidSampleRate(0))));
    }

    #[test]
    fn test_exact_ratio_one_frame() {
        let mut processor = PcmProcessor::new(48000, Vec::new()).unwrap();
        let cont = processor.ingest(Some(&[1.0; 480]));
        assert_eq!(cont, Continuation::KeepAlive);

        let out = frames(processor.sink());
        assert_eq!(out.len(), 1);
        assert!(out[0].samples().iter().all(|&s| s == 32767));
        assert_eq!(processor.pending_output(), 0);
        assert_eq!(processor.stats().output_samples, 160);
        assert_eq!(processor.stats().input_samples, 480);
    }

    #[test]
    fn test_fractional_ratio_one_second() {
        let mut processor = PcmProcessor::new(44100, Vec::new()).unwrap();
        for chunk in vec![0.0f32; 44100].chunks(128) {
            processor.ingest(Some(chunk));
        }

        let out = frames(processor.sink());
        assert_eq!(out.len(), 100);
        assert!(processor.pending_output() < FRAME_SAMPLES);
        let produced = out.len() * FRAME_SAMPLES + processor.pending_output();
        assert!((15999..=16001).contains(&produced), "produced {produced}");
    }

    #[test]
    fn test_empty_chunk_only_counts_pass() {
        let mut processor = PcmProcessor::new(48000, Vec::new()).unwrap();
        processor.ingest(Some(&[0.3; 100]));
        let before = processor.stats();
        let cursor = processor.cursor();
        let messages = processor.sink().len();

        for _ in 0..10 {
            processor.ingest(Some(&[]));
        }

        let after = processor.stats();
        assert_eq!(after.process_count, before.process_count + 10);
        assert_eq!(after.input_samples, before.input_samples);
        assert_eq!(after.output_samples, before.output_samples);
        assert_eq!(processor.cursor(), cursor);
        assert_eq!(processor.sink().len(), messages);
    }

    #[test]
    fn test_absent_input_is_noop() {
        let mut processor = PcmProcessor::new(48000, Vec::new()).unwrap();
        for _ in 0..1000 {
            assert_eq!(processor.ingest(None), Continuation::KeepAlive);
        }
        assert_eq!(processor.stats(), RunningStats::default());
        assert_eq!(processor.sink().len(), 1);
    }

    #[test]
    fn test_stats_every_375_passes() {
        let mut processor = PcmProcessor::new(48000, Vec::new()).unwrap();
        for _ in 0..750 {
            processor.ingest(Some(&[0.0; 128]));
        }

        let stats = stats_messages(processor.sink());
        assert_eq!(stats.len(), 2);

        // 375 * 128 = 48000 input samples -> 16000 output, 100 frames
        let first = &stats[0];
        assert_eq!(first.process_count, 375);
        assert_eq!(first.input_samples, 48000);
        assert_eq!(first.output_samples, 16000);
        assert_eq!(first.actual_ratio, "3.000");
        assert_eq!(first.expected_ratio, "3.000");
        assert_eq!(first.buffer_size, 0);

        assert_eq!(stats[1].process_count, 750);
        assert_eq!(stats[1].input_samples, 96000);
    }

    #[test]
    fn test_stats_interval_from_config() {
        let config = ProcessorConfig { stats_interval: 2 };
        let mut processor = PcmProcessor::with_config(48000, &config, Vec::new()).unwrap();
        for _ in 0..5 {
            processor.ingest(Some(&[]));
        }
        assert_eq!(stats_messages(processor.sink()).len(), 2);

        let disabled = ProcessorConfig { stats_interval: 0 };
        let mut quiet = PcmProcessor::with_config(48000, &disabled, Vec::new()).unwrap();
        for _ in 0..400 {
            quiet.ingest(Some(&[]));
        }
        assert!(stats_messages(quiet.sink()).is_empty());
    }

    #[test]
    fn test_stats_ratio_before_any_output() {
        let config = ProcessorConfig { stats_interval: 1 };
        let mut processor = PcmProcessor::with_config(44100, &config, Vec::new()).unwrap();
        processor.ingest(Some(&[0.0; 128]));

        let stats = stats_messages(processor.sink());
        // No full frame yet: divide by max(1, 0)
        assert_eq!(stats[0].actual_ratio, "128.000");
        assert_eq!(stats[0].expected_ratio, "2.756");
        assert_eq!(stats[0].buffer_size, processor.backlog());
    }

    #[test]
    fn test_dropped_messages_counted() {
        let (sink, mut rx) = crate::messages::message_channel(2);
        let mut processor = PcmProcessor::new(48000, sink).unwrap();

        // init already occupies one slot; 3 frames fit one more
        processor.ingest(Some(&[0.0; 1440]));
        assert_eq!(processor.stats().dropped_messages, 2);
        assert_eq!(processor.stats().output_samples, 480);

        assert!(matches!(rx.try_recv(), Some(ProcessorMessage::Init(_))));
        assert!(rx.try_recv().unwrap().is_frame());
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn test_dropped_messages_reported_in_stats() {
        let (sink, mut rx) = crate::messages::message_channel(2);
        let config = ProcessorConfig { stats_interval: 1 };
        let mut processor = PcmProcessor::with_config(48000, &config, sink).unwrap();

        // init + first frame fill the ring; two frames and the stats are refused
        processor.ingest(Some(&[0.0; 1440]));
        assert_eq!(processor.stats().dropped_messages, 3);
        assert_eq!(rx.drain().count(), 2);

        processor.ingest(Some(&[]));
        match rx.try_recv() {
            Some(ProcessorMessage::Stats(stats)) => {
                assert_eq!(stats.process_count, 2);
                assert_eq!(stats.dropped_messages, 3);
            }
            other => panic!("expected stats, got {other:?}"),
        }
        assert!(rx.is_empty());
    }

    #[test]
    fn test_stats_ratio_ties_round_up() {
        let config = ProcessorConfig { stats_interval: 1 };
        let mut processor = PcmProcessor::with_config(48000, &config, Vec::new()).unwrap();
        processor.ingest(Some(&[0.0; 490]));

        // 490 / 160 = 3.0625 exactly
        let stats = stats_messages(processor.sink());
        assert_eq!(stats[0].output_samples, 160);
        assert_eq!(stats[0].actual_ratio, "3.063");

        assert_eq!(format_ratio(2.75625), "2.756");
        assert_eq!(format_ratio(3.0), "3.000");
    }

    #[test]
    fn test_upsampling_supported() {
        let mut processor = PcmProcessor::new(8000, Vec::new()).unwrap();
        processor.ingest(Some(&[0.5; 80]));
        let out = frames(processor.sink());
        assert_eq!(out.len(), 1);
        assert!(out[0].samples().iter().all(|&s| s == 16384));
        assert!(processor.cursor() < processor.ratio());
    }
}
