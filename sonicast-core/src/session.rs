//! Session: immutable per-request configuration, validated when built.

use serde::{Deserialize, Serialize};

use crate::container::{ContainerFormat, MP3_SAMPLE_RATE};
use crate::error::{ConfigError, Error};
use crate::protocol::ProtocolVersion;
use crate::tone::ToneProfile;

pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
pub const MIN_SAMPLE_RATE: u32 = 8000;
pub const MAX_SAMPLE_RATE: u32 = 192_000;

/// How many times a transmission is played back.
pub const DEFAULT_REPEAT_COUNT: u32 = 3;

/// Sample representation returned by `encode`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// Normalized floats in [-1, 1].
    Float,
    /// Signed 16-bit, `round(x * 32767)`.
    #[default]
    Pcm16,
}

/// Padding and gap durations in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timing {
    /// Silence before and after the transmission, absorbs output-stage pops.
    pub lead_ms: u32,
    /// Carrier tone ahead of the data in low bit rate mode.
    pub pilot_ms: u32,
    pub pilot_gap_ms: u32,
    /// Gap between the two control frames.
    pub control_gap_ms: u32,
    /// Gap after the second control frame.
    pub settle_ms: u32,
    /// Gap after every data frame.
    pub inter_frame_ms: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            lead_ms: 150,
            pilot_ms: 500,
            pilot_gap_ms: 100,
            control_gap_ms: 100,
            settle_ms: 500,
            inter_frame_ms: 80,
        }
    }
}

/// Immutable per-request configuration. The default is valid; everything else goes
/// through the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    sample_rate: u32,
    version: ProtocolVersion,
    low_bit_rate: bool,
    repeat_count: u32,
    output_format: ContainerFormat,
    sample_format: SampleFormat,
    timing: Timing,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// Builder seeded with this session's values.
    pub fn to_builder(&self) -> SessionBuilder {
        SessionBuilder { session: *self }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn low_bit_rate(&self) -> bool {
        self.low_bit_rate
    }

    pub fn repeat_count(&self) -> u32 {
        self.repeat_count
    }

    pub fn output_format(&self) -> ContainerFormat {
        self.output_format
    }

    pub fn sample_format(&self) -> SampleFormat {
        self.sample_format
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    /// Zero samples in a silence of `ms` milliseconds: ceil(rate * ms / 1000).
    pub fn silence_len(&self, ms: u32) -> usize {
        silence_len(self.sample_rate, ms)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            version: ProtocolVersion::default(),
            low_bit_rate: false,
            repeat_count: DEFAULT_REPEAT_COUNT,
            output_format: ContainerFormat::default(),
            sample_format: SampleFormat::default(),
            timing: Timing::default(),
        }
    }
}

pub fn silence_len(sample_rate: u32, ms: u32) -> usize {
    (sample_rate as u64 * ms as u64).div_ceil(1000) as usize
}

/// Build a session from raw host values. Unknown versions and formats are rejected here.
pub fn configure(
    sample_rate: u32,
    version: u8,
    low_bit_rate: bool,
    repeat_count: u32,
    output_format: &str,
) -> Result<Session, Error> {
    let version = ProtocolVersion::try_from(version)
        .map_err(|_| ConfigError::UnsupportedVersion(version))?;
    let output_format: ContainerFormat = output_format.parse()?;
    Ok(Session::builder()
        .sample_rate(sample_rate)
        .version(version)
        .low_bit_rate(low_bit_rate)
        .repeat_count(repeat_count)
        .output_format(output_format)
        .build()?)
}

#[derive(Debug, Clone, Default)]
pub struct SessionBuilder {
    session: Session,
}

impl SessionBuilder {
    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.session.sample_rate = rate;
        self
    }

    pub fn version(mut self, version: ProtocolVersion) -> Self {
        self.session.version = version;
        self
    }

    pub fn low_bit_rate(mut self, on: bool) -> Self {
        self.session.low_bit_rate = on;
        self
    }

    pub fn repeat_count(mut self, n: u32) -> Self {
        self.session.repeat_count = n;
        self
    }

    pub fn output_format(mut self, format: ContainerFormat) -> Self {
        self.session.output_format = format;
        self
    }

    pub fn sample_format(mut self, format: SampleFormat) -> Self {
        self.session.sample_format = format;
        self
    }

    pub fn timing(mut self, timing: Timing) -> Self {
        self.session.timing = timing;
        self
    }

    pub fn build(self) -> Result<Session, ConfigError> {
        let s = self.session;
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&s.sample_rate) {
            return Err(ConfigError::InvalidSampleRate(s.sample_rate));
        }
        // Both tones must sit below Nyquist or the receiver hears an alias.
        let profile = ToneProfile::for_mode(s.low_bit_rate);
        let rate = s.sample_rate as f64;
        if rate < profile.baud || rate <= 2.0 * profile.mark_hz.max(profile.space_hz) {
            return Err(ConfigError::InvalidSampleRate(s.sample_rate));
        }
        if s.output_format == ContainerFormat::Mp3 && s.sample_rate != MP3_SAMPLE_RATE {
            return Err(ConfigError::InvalidSampleRate(s.sample_rate));
        }
        if s.repeat_count == 0 {
            return Err(ConfigError::InvalidRepeatCount);
        }
        Ok(s)
    }
}
