//! Container writer: mono 16-bit PCM WAV, or MP3 through a pluggable encoder.
//!
//! The WAV header has no timestamps or optional chunks, so identical samples always
//! produce identical bytes.

use std::io::{self, Write};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FormatError;

/// Size of the canonical PCM header.
pub const WAV_HEADER_LEN: usize = 44;

/// MP3 profile expected by the encoder port: mono, 44.1 kHz, 128 kbps.
pub const MP3_SAMPLE_RATE: u32 = 44100;
pub const MP3_BITRATE_KBPS: u32 = 128;
pub const MP3_CHANNELS: u16 = 1;

/// Samples handed to the MP3 encoder per call. A multiple of 576.
pub const MP3_BLOCK_SAMPLES: usize = 1152;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    #[default]
    Wav,
    Mp3,
}

impl ContainerFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            ContainerFormat::Wav => "audio/wav",
            ContainerFormat::Mp3 => "audio/mpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ContainerFormat::Wav => "wav",
            ContainerFormat::Mp3 => "mp3",
        }
    }
}

impl FromStr for ContainerFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wav" => Ok(ContainerFormat::Wav),
            "mp3" => Ok(ContainerFormat::Mp3),
            _ => Err(FormatError::UnsupportedContainer(s.to_string())),
        }
    }
}

impl std::fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// External MP3 encoder, fixed to the mono / 44.1 kHz / 128 kbps profile.
pub trait CompressedEncoder {
    /// Encode one block of at most `MP3_BLOCK_SAMPLES` samples. May return no bytes.
    fn encode_block(&mut self, samples: &[i16]) -> Result<Vec<u8>, FormatError>;

    /// Flush buffered frames at end of stream.
    fn flush(&mut self) -> Result<Vec<u8>, FormatError>;
}

/// Data chunk size for `samples` mono 16-bit samples. The RIFF chunk size (36 + data)
/// must also fit in 32 bits.
pub fn wav_data_size(samples: usize) -> Result<u32, FormatError> {
    samples
        .checked_mul(2)
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| *n <= u32::MAX - 36)
        .ok_or(FormatError::WavTooLarge { samples })
}

/// Writes a mono 16-bit PCM WAV stream.
pub fn write_wav<W: Write>(writer: &mut W, sample_rate: u32, samples: &[i16]) -> io::Result<()> {
    let channels: u16 = 1;
    let bits_per_sample: u16 = 16;
    let block_align = channels * (bits_per_sample / 8);
    let byte_rate = sample_rate * block_align as u32;
    let data_size = wav_data_size(samples.len())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let chunk_size = 36 + data_size;

    // RIFF header
    writer.write_all(b"RIFF")?;
    writer.write_all(&chunk_size.to_le_bytes())?;
    writer.write_all(b"WAVE")?;

    // fmt chunk
    writer.write_all(b"fmt ")?;
    writer.write_all(&16u32.to_le_bytes())?;
    writer.write_all(&1u16.to_le_bytes())?; // PCM
    writer.write_all(&channels.to_le_bytes())?;
    writer.write_all(&sample_rate.to_le_bytes())?;
    writer.write_all(&byte_rate.to_le_bytes())?;
    writer.write_all(&block_align.to_le_bytes())?;
    writer.write_all(&bits_per_sample.to_le_bytes())?;

    // data chunk
    writer.write_all(b"data")?;
    writer.write_all(&data_size.to_le_bytes())?;
    for s in samples {
        writer.write_all(&s.to_le_bytes())?;
    }
    Ok(())
}

/// WAV container as bytes: 44 + 2N long.
pub fn wav_bytes(sample_rate: u32, samples: &[i16]) -> Result<Vec<u8>, FormatError> {
    wav_data_size(samples.len())?;
    let mut buffer = Vec::with_capacity(WAV_HEADER_LEN + samples.len() * 2);
    write_wav(&mut buffer, sample_rate, samples).expect("writing to Vec should not fail");
    Ok(buffer)
}

/// MP3 container: samples fed in fixed blocks, then flushed.
pub fn mp3_bytes(
    encoder: &mut dyn CompressedEncoder,
    samples: &[i16],
) -> Result<Vec<u8>, FormatError> {
    let mut out = Vec::new();
    for block in samples.chunks(MP3_BLOCK_SAMPLES) {
        out.extend(encoder.encode_block(block)?);
    }
    out.extend(encoder.flush()?);
    Ok(out)
}
