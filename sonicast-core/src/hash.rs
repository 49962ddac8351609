//! Hash adapter: 32-bit MurmurHash3 (x86_32) for footers and content hash,
//! 128-bit MD5 for the content digest. Both must match the receiver firmware bit-for-bit.

use std::io::Cursor;

use md5::{Digest, Md5};

/// Seed for every frame footer.
pub const FOOTER_SEED: u32 = 0xDEAD_BEEF;

/// Seed for the whole-payload content hash carried in the control frame.
pub const CONTENT_HASH_SEED: u32 = 0x32D0_BABE;

/// MurmurHash3 x86_32 of `data` with `seed`.
pub fn hash32(data: &[u8], seed: u32) -> u32 {
    murmur3::murmur3_32(&mut Cursor::new(data), seed)
        .expect("reading from an in-memory slice should not fail")
}

/// Footer value for the bytes between preamble and footer.
pub fn footer(covered: &[u8]) -> u32 {
    hash32(covered, FOOTER_SEED)
}

/// MD5 digest of the payload. Returns 16 bytes.
pub fn digest128(data: &[u8]) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(data);
    hasher.finalize().into()
}
