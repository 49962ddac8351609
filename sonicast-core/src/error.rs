//! Error kinds. Every failure surfaces before any sample is produced.

/// Frame construction or inspection failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),
    #[error("block of {len} bytes exceeds the 256-byte data field")]
    BlockTooLarge { len: usize },
    #[error(
        "payload of {len} bytes needs more blocks than a 16-bit index can address \
         (max {max} bytes)"
    )]
    PayloadTooLarge { len: usize, max: usize },
    #[error("frame truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("frame does not start with the preamble")]
    BadPreamble,
    #[error("frame does not end with the stop marker")]
    BadStopMarker,
    #[error("unknown frame type: {0:#04x}")]
    UnknownFrameType(u8),
    #[error("footer mismatch: frame carries {carried:#010x}, computed {computed:#010x}")]
    FooterMismatch { carried: u32, computed: u32 },
}

/// Output container failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("unsupported container format: {0}")]
    UnsupportedContainer(String),
    #[error("no compressed-audio encoder installed")]
    EncoderUnavailable,
    #[error("compressed-audio encoder failed: {0}")]
    Encoder(String),
    #[error("{samples} samples exceed the WAV 4 GiB size limit")]
    WavTooLarge { samples: usize },
}

/// Session configuration rejected at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid sample rate: {0} Hz")]
    InvalidSampleRate(u32),
    #[error("repeat count must be at least 1")]
    InvalidRepeatCount,
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),
}

/// Playback layer failure. Never raised once a transmission is playing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    #[error("a transmission is already playing")]
    AlreadyActive,
    #[error("playback resource failed: {0}")]
    Resource(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

pub type Result<T> = std::result::Result<T, Error>;
