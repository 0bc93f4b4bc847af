//! Quantization and the fixed-size PCM frame handed to the speech backend.

use crate::audio_config::FRAME_SAMPLES;

/// Convert an f32 sample to i16.
///
/// Clamps to [-1.0, 1.0] and scales by 32767, rounding to nearest with
/// ties going up (-0.5 lands on -16383). The product is taken in f64 so an
/// f32 rounding step can't push it across a .5 boundary. The negative side
/// stops at -32767 so the scale is symmetric. NaN maps to 0.
#[inline]
pub fn quantize(sample: f32) -> i16 {
    ((f64::from(sample).clamp(-1.0, 1.0) * 32767.0) + 0.5).floor() as i16
}

/// One 10ms frame of 16kHz mono audio.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PcmFrame([i16; FRAME_SAMPLES]);

impl PcmFrame {
    pub fn from_samples(samples: &[f32; FRAME_SAMPLES]) -> Self {
        let mut out = [0i16; FRAME_SAMPLES];
        for (dst, &src) in out.iter_mut().zip(samples.iter()) {
            *dst = quantize(src);
        }
        Self(out)
    }

    pub fn silence() -> Self {
        Self([0; FRAME_SAMPLES])
    }

    pub fn samples(&self) -> &[i16; FRAME_SAMPLES] {
        &self.0
    }

    pub fn len(&self) -> usize {
        FRAME_SAMPLES
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Little-endian 16-bit PCM bytes
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut pcm_bytes = Vec::with_capacity(FRAME_SAMPLES * 2);
        for sample in self.0 {
            pcm_bytes.extend_from_slice(&sample.to_le_bytes());
        }
        pcm_bytes
    }
}

impl std::fmt::Debug for PcmFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let peak = self.0.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
        f.debug_struct("PcmFrame")
            .field("len", &FRAME_SAMPLES)
            .field("peak", &peak)
            .finish()
    }
}

impl From<[i16; FRAME_SAMPLES]> for PcmFrame {
    fn from(samples: [i16; FRAME_SAMPLES]) -> Self {
        Self(samples)
    }
}

impl AsRef<[i16]> for PcmFrame {
    fn as_ref(&self) -> &[i16] {
        &self.0
    }
}
