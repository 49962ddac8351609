//! Block chunking: split a payload into 256-byte blocks, one per data frame.

use std::ops::Range;

use crate::error::ProtocolError;
use crate::frame::check_payload_len;
use crate::protocol::BLOCK_SIZE;

/// One block of the payload: its index on the wire and its byte range in the payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Block {
    pub index: u16,
    pub range: Range<usize>,
}

/// Number of data frames needed for `payload_len` bytes: ceil(len / 256).
pub fn block_count(payload_len: usize) -> usize {
    payload_len.div_ceil(BLOCK_SIZE)
}

/// Split a payload of `payload_len` bytes into blocks, in transmission order.
/// Fails instead of wrapping when the block index would not fit in 16 bits.
pub fn split_into_blocks(payload_len: usize) -> Result<Vec<Block>, ProtocolError> {
    check_payload_len(payload_len)?;
    let mut out = Vec::with_capacity(block_count(payload_len));
    let mut start = 0usize;
    let mut index = 0u16;
    while start < payload_len {
        let end = (start + BLOCK_SIZE).min(payload_len);
        out.push(Block {
            index,
            range: start..end,
        });
        start = end;
        index = index.wrapping_add(1);
    }
    Ok(out)
}
