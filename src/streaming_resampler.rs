// Streaming Nearest-Neighbor Resampler
// Zero-latency, zero-lookahead decimation (zero-order hold)
// Compliant with real-time audio requirements

use std::collections::VecDeque;

use tracing::debug;

use crate::error::{Error, Result};

/// Streaming resampler picking the nearest preceding input sample
/// - Zero algorithmic latency, O(1) per output sample
/// - Fractional read position preserved across calls, kept as an exact
///   rational so long sessions never drift
/// - f32 in, f32 out (quantization happens at framing)
pub struct StreamingResampler {
    input_rate: u32,
    output_rate: u32,
    /// Samples not yet consumed by a resample pass
    input: VecDeque<f32>,
    /// Read position in `input`, in units of 1/output_rate input samples.
    /// cursor = cursor_num / output_rate; always < ratio between passes.
    cursor_num: u64,
}

impl StreamingResampler {
    /// Create a new streaming resampler
    ///
    /// # Arguments
    /// * `input_sample_rate` - Source sample rate (e.g., 48000)
    /// * `output_sample_rate` - Target sample rate (16000 for STT)
    pub fn new(input_sample_rate: u32, output_sample_rate: u32) -> Result<Self> {
        if input_sample_rate == 0 {
            return Err(Error::InvalidSampleRate(input_sample_rate));
        }
        if output_sample_rate == 0 {
            return Err(Error::InvalidSampleRate(output_sample_rate));
        }

        let resampler = Self {
            input_rate: input_sample_rate,
            output_rate: output_sample_rate,
            input: VecDeque::new(),
            cursor_num: 0,
        };
        debug!(
            "StreamingResampler created: {}Hz -> {}Hz (ratio: {:.4}, nearest neighbor)",
            input_sample_rate,
            output_sample_rate,
            resampler.ratio()
        );
        Ok(resampler)
    }

    /// Input samples per output sample (48000/16000 = 3.0)
    pub fn ratio(&self) -> f64 {
        self.input_rate as f64 / self.output_rate as f64
    }

    /// Fractional read position within the buffered input
    pub fn cursor(&self) -> f64 {
        self.cursor_num as f64 / self.output_rate as f64
    }

    /// Number of buffered input samples
    pub fn buffered(&self) -> usize {
        self.input.len()
    }

    /// Append samples to the input buffer
    pub fn push(&mut self, samples: &[f32]) {
        self.input.extend(samples.iter().copied());
    }

    /// Run one resample pass, appending to `output`
    ///
    /// Emits `input[floor(cursor)]` and advances by `ratio` until the cursor
    /// leaves the buffer, then drops the consumed head. Consumption is capped
    /// at the buffer length so a sample skipped past the end of this chunk is
    /// still skipped at the start of the next one.
    ///
    /// Returns the number of samples produced.
    pub fn resample_into(&mut self, output: &mut VecDeque<f32>) -> usize {
        let step = self.input_rate as u64;
        let denom = self.output_rate as u64;
        let len = self.input.len();
        let mut produced = 0;

        loop {
            let idx = (self.cursor_num / denom) as usize;
            if idx >= len {
                break;
            }
            output.push_back(self.input[idx]);
            produced += 1;
            self.cursor_num += step;
        }

        let consumed = ((self.cursor_num / denom) as usize).min(len);
        if consumed > 0 {
            self.input.drain(..consumed);
            self.cursor_num -= consumed as u64 * denom;
        }

        produced
    }

    /// Reset the resampler state
    pub fn reset(&mut self) {
        self.input.clear();
        self.cursor_num = 0;
    }
}
