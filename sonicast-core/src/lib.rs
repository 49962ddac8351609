//! Acoustic data transfer: turns a payload into audio that an embedded receiver
//! demodulates from a microphone.
//! Host-driven: no I/O; the host supplies audio output and forwards playback events.

pub mod chunk;
pub mod container;
pub mod error;
pub mod frame;
pub mod hash;
pub mod plan;
pub mod playback;
pub mod protocol;
pub mod session;
pub mod tone;
pub mod transmitter;

pub use container::{CompressedEncoder, ContainerFormat};
pub use error::{ConfigError, Error, FormatError, PlaybackError, ProtocolError, Result};
pub use frame::{inspect, make_control_frame, make_data_frame, Frame, FrameBody};
pub use plan::{Samples, TransmissionPlan, WaveformSegment};
pub use playback::{PlaybackResource, PlaybackSession, PlaybackState};
pub use protocol::{FrameType, ProtocolVersion};
pub use session::{configure, SampleFormat, Session, Timing};
pub use tone::{AfskEncoder, TonePort};
pub use transmitter::Transmitter;

// C ABI for hosts linking the staticlib.
pub mod ffi;
