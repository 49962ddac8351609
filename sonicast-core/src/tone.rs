//! Tone synthesis port: frame bytes in, normalized float samples out.

use std::f64::consts::TAU;

/// Maps frame bits to waveform samples.
pub trait TonePort: Send + Sync {
    /// Samples per bit (sample rate / bit rate). Always >= 1.
    fn samples_per_bit(&self) -> f64;

    /// Modulate `frame`. Output length is `ceil(len * 8 * samples_per_bit())`, values in [-1, 1].
    fn modulate(&self, frame: &[u8]) -> Vec<f32>;

    /// Number of samples `modulate` returns for `frame_len` bytes.
    fn modulated_len(&self, frame_len: usize) -> usize {
        (frame_len as f64 * 8.0 * self.samples_per_bit()).ceil() as usize
    }
}

/// Bit rate and the tone pair encoding 0 and 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneProfile {
    pub baud: f64,
    pub space_hz: f64,
    pub mark_hz: f64,
}

impl ToneProfile {
    pub const STANDARD: ToneProfile = ToneProfile {
        baud: 8000.0,
        space_hz: 8666.0,
        mark_hz: 12500.0,
    };

    pub const LOW_BIT_RATE: ToneProfile = ToneProfile {
        baud: 1225.0,
        space_hz: 8666.0,
        mark_hz: 11025.0,
    };

    pub fn for_mode(low_bit_rate: bool) -> Self {
        if low_bit_rate {
            Self::LOW_BIT_RATE
        } else {
            Self::STANDARD
        }
    }
}

/// Phase-continuous binary FSK, least significant bit first.
#[derive(Debug, Clone)]
pub struct AfskEncoder {
    sample_rate: u32,
    profile: ToneProfile,
}

impl AfskEncoder {
    pub fn new(sample_rate: u32, low_bit_rate: bool) -> Self {
        Self::with_profile(sample_rate, ToneProfile::for_mode(low_bit_rate))
    }

    pub fn with_profile(sample_rate: u32, profile: ToneProfile) -> Self {
        Self {
            sample_rate,
            profile,
        }
    }

    pub fn profile(&self) -> ToneProfile {
        self.profile
    }
}

impl TonePort for AfskEncoder {
    fn samples_per_bit(&self) -> f64 {
        self.sample_rate as f64 / self.profile.baud
    }

    fn modulate(&self, frame: &[u8]) -> Vec<f32> {
        let bits = frame.len() * 8;
        let len = self.modulated_len(frame.len());
        let spb = self.samples_per_bit();
        let omega_space = TAU * self.profile.space_hz / self.sample_rate as f64;
        let omega_mark = TAU * self.profile.mark_hz / self.sample_rate as f64;

        let mut out = Vec::with_capacity(len);
        let mut phase = 0.0f64;
        for i in 0..len {
            let bit = ((i as f64 / spb) as usize).min(bits - 1);
            let set = (frame[bit / 8] >> (bit % 8)) & 1 == 1;
            out.push(phase.cos() as f32);
            phase += if set { omega_mark } else { omega_space };
            if phase >= TAU {
                phase -= TAU;
            }
        }
        out
    }
}
