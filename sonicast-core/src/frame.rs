//! Framing: preamble + header + body + footer (MurmurHash3, LE) + stop marker.
//!
//! Control frames carry whole-payload length, hash and digest. Data frames carry one
//! 256-byte block, whitened per protocol version. The footer covers every byte between
//! the preamble and itself; for data frames it is computed after whitening.

use crate::error::ProtocolError;
use crate::hash;
use crate::protocol::{
    FrameType, ProtocolVersion, BLOCK_FILL, BLOCK_SIZE, FOOTER_LEN, HEADER_LEN,
    MAX_PAYLOAD_LEN, PREAMBLE, STOP_MARKER,
};

const CONTROL_BODY_LEN: usize = 4 + 4 + 16;

/// Total bytes in a control frame.
pub const CONTROL_FRAME_LEN: usize =
    PREAMBLE.len() + HEADER_LEN + CONTROL_BODY_LEN + FOOTER_LEN + STOP_MARKER.len();

/// Total bytes in a data frame.
pub const DATA_FRAME_LEN: usize =
    PREAMBLE.len() + HEADER_LEN + BLOCK_SIZE + FOOTER_LEN + STOP_MARKER.len();

/// Whole-payload description sent ahead of the data frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPayload {
    pub length: u32,
    pub content_hash: u32,
    pub content_digest: [u8; 16],
}

impl ControlPayload {
    /// Describe `payload`. Independent of how it is later chunked.
    pub fn describe(payload: &[u8]) -> Result<Self, ProtocolError> {
        check_payload_len(payload.len())?;
        Ok(Self {
            length: payload.len() as u32,
            content_hash: hash::hash32(payload, hash::CONTENT_HASH_SEED),
            content_digest: hash::digest128(payload),
        })
    }
}

/// One block, padded to the full data field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPayload {
    pub block_index: u16,
    pub data: [u8; BLOCK_SIZE],
}

impl DataPayload {
    /// Copy `block` into a 256-byte field, right-padded with 0xFF.
    pub fn new(block: &[u8], block_index: u16) -> Result<Self, ProtocolError> {
        if block.len() > BLOCK_SIZE {
            return Err(ProtocolError::BlockTooLarge { len: block.len() });
        }
        let mut data = [BLOCK_FILL; BLOCK_SIZE];
        data[..block.len()].copy_from_slice(block);
        Ok(Self { block_index, data })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameBody {
    Control(ControlPayload),
    Data(DataPayload),
}

/// A decoded frame, with whitening already reversed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub version: ProtocolVersion,
    pub body: FrameBody,
    pub footer: u32,
}

impl Frame {
    pub fn frame_type(&self) -> FrameType {
        match self.body {
            FrameBody::Control(_) => FrameType::Control,
            FrameBody::Data(_) => FrameType::Data,
        }
    }
}

pub(crate) fn check_payload_len(len: usize) -> Result<(), ProtocolError> {
    if len > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::PayloadTooLarge {
            len,
            max: MAX_PAYLOAD_LEN,
        });
    }
    Ok(())
}

/// Offset of the footer inside a frame of the given type.
pub fn footer_offset(frame_type: FrameType) -> usize {
    match frame_type {
        FrameType::Control => CONTROL_FRAME_LEN - STOP_MARKER.len() - FOOTER_LEN,
        FrameType::Data => DATA_FRAME_LEN - STOP_MARKER.len() - FOOTER_LEN,
    }
}

fn frame_len(frame_type: FrameType) -> usize {
    match frame_type {
        FrameType::Control => CONTROL_FRAME_LEN,
        FrameType::Data => DATA_FRAME_LEN,
    }
}

fn assemble(covered: &[&[u8]], capacity: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(capacity);
    out.extend_from_slice(&PREAMBLE);
    for part in covered {
        out.extend_from_slice(part);
    }
    let footer = hash::footer(&out[PREAMBLE.len()..]);
    out.extend_from_slice(&footer.to_le_bytes());
    out.extend_from_slice(&STOP_MARKER);
    out
}

/// Build the control frame describing the whole `payload`.
pub fn make_control_frame(
    version: ProtocolVersion,
    payload: &[u8],
) -> Result<Vec<u8>, ProtocolError> {
    let ctl = ControlPayload::describe(payload)?;
    let header = [version.wire_byte(), FrameType::Control.wire_byte(), 0x00, 0x00];
    Ok(assemble(
        &[
            &header,
            &ctl.length.to_le_bytes(),
            &ctl.content_hash.to_le_bytes(),
            &ctl.content_digest,
        ],
        CONTROL_FRAME_LEN,
    ))
}

/// Build the data frame for one block (at most 256 bytes).
pub fn make_data_frame(
    version: ProtocolVersion,
    block: &[u8],
    block_index: u16,
) -> Result<Vec<u8>, ProtocolError> {
    let DataPayload {
        block_index,
        mut data,
    } = DataPayload::new(block, block_index)?;
    let [lo, hi] = block_index.to_le_bytes();
    let mut header = [version.wire_byte(), FrameType::Data.wire_byte(), lo, hi];
    version.whiten(&mut header, &mut data);
    Ok(assemble(&[&header, &data], DATA_FRAME_LEN))
}

/// Decode one frame from the front of `bytes`. Returns the frame and the number of bytes consumed.
/// Checks preamble, stop marker and footer, then reverses whitening.
pub fn inspect(bytes: &[u8]) -> Result<(Frame, usize), ProtocolError> {
    let head_len = PREAMBLE.len() + HEADER_LEN;
    if bytes.len() < head_len {
        return Err(ProtocolError::Truncated {
            expected: head_len,
            actual: bytes.len(),
        });
    }
    if bytes[..PREAMBLE.len()] != PREAMBLE {
        return Err(ProtocolError::BadPreamble);
    }
    let version = ProtocolVersion::try_from(bytes[PREAMBLE.len()])?;
    let frame_type = FrameType::try_from(bytes[PREAMBLE.len() + 1])?;
    let len = frame_len(frame_type);
    if bytes.len() < len {
        return Err(ProtocolError::Truncated {
            expected: len,
            actual: bytes.len(),
        });
    }
    let frame = &bytes[..len];
    if frame[len - STOP_MARKER.len()..] != STOP_MARKER {
        return Err(ProtocolError::BadStopMarker);
    }
    let foff = footer_offset(frame_type);
    let carried =
        u32::from_le_bytes([frame[foff], frame[foff + 1], frame[foff + 2], frame[foff + 3]]);
    let computed = hash::footer(&frame[PREAMBLE.len()..foff]);
    if carried != computed {
        return Err(ProtocolError::FooterMismatch { carried, computed });
    }

    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(&frame[PREAMBLE.len()..head_len]);
    let body = &frame[head_len..foff];
    let body = match frame_type {
        FrameType::Control => {
            let mut content_digest = [0u8; 16];
            content_digest.copy_from_slice(&body[8..24]);
            FrameBody::Control(ControlPayload {
                length: u32::from_le_bytes([body[0], body[1], body[2], body[3]]),
                content_hash: u32::from_le_bytes([body[4], body[5], body[6], body[7]]),
                content_digest,
            })
        }
        FrameType::Data => {
            let mut data = [0u8; BLOCK_SIZE];
            data.copy_from_slice(body);
            version.whiten(&mut header, &mut data);
            FrameBody::Data(DataPayload {
                block_index: u16::from_le_bytes([header[2], header[3]]),
                data,
            })
        }
    };
    Ok((
        Frame {
            version,
            body,
            footer: carried,
        },
        len,
    ))
}
