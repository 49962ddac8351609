//! Acoustic wire protocol: versions, frame types, fixed markers and whitening.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Sent before every frame so the receiver can find bit and byte alignment.
pub const PREAMBLE: [u8; 7] = [0x00, 0x00, 0x00, 0x00, 0xAA, 0x55, 0x42];

/// Sent after every frame.
pub const STOP_MARKER: [u8; 1] = [0xFF];

pub const HEADER_LEN: usize = 4;
pub const FOOTER_LEN: usize = 4;

/// Size of the data field in every data frame.
pub const BLOCK_SIZE: usize = 256;

/// Fill byte for the unused tail of the final block.
pub const BLOCK_FILL: u8 = 0xFF;

/// Largest payload whose block indices fit in 16 bits.
pub const MAX_PAYLOAD_LEN: usize = BLOCK_SIZE * (u16::MAX as usize + 1);

/// Protocol revision. Each variant carries its own whitening rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ProtocolVersion {
    /// Stripes the data field only.
    V1,
    /// Stripes the block index and the data field as one stream.
    V2,
}

impl ProtocolVersion {
    pub fn wire_byte(self) -> u8 {
        match self {
            ProtocolVersion::V1 => 0x01,
            ProtocolVersion::V2 => 0x02,
        }
    }

    /// Apply this version's stripe pattern in place. Applying it twice restores the input.
    pub fn whiten(self, header: &mut [u8; HEADER_LEN], data: &mut [u8; BLOCK_SIZE]) {
        match self {
            ProtocolVersion::V1 => whiten_v1(data),
            ProtocolVersion::V2 => whiten_v2(header, data),
        }
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        ProtocolVersion::V2
    }
}

impl TryFrom<u8> for ProtocolVersion {
    type Error = ProtocolError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0x01 => Ok(ProtocolVersion::V1),
            0x02 => Ok(ProtocolVersion::V2),
            other => Err(ProtocolError::UnsupportedVersion(other)),
        }
    }
}

impl From<ProtocolVersion> for u8 {
    fn from(v: ProtocolVersion) -> u8 {
        v.wire_byte()
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.wire_byte())
    }
}

/// Second header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    Control,
    Data,
}

impl FrameType {
    pub fn wire_byte(self) -> u8 {
        match self {
            FrameType::Control => 0x01,
            FrameType::Data => 0x02,
        }
    }
}

impl TryFrom<u8> for FrameType {
    type Error = ProtocolError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0x01 => Ok(FrameType::Control),
            0x02 => Ok(FrameType::Data),
            other => Err(ProtocolError::UnknownFrameType(other)),
        }
    }
}

fn whiten_v1(data: &mut [u8; BLOCK_SIZE]) {
    for (i, b) in data.iter_mut().enumerate() {
        match i % 16 {
            3 => *b ^= 0x55,
            11 => *b ^= 0xAA,
            _ => {}
        }
    }
}

const V2_STRIPES: [u8; 3] = [0x35, 0xAC, 0x95];

// Header bytes 0 and 1 stay clear so the frame type is readable before descrambling.
fn whiten_v2(header: &mut [u8; HEADER_LEN], data: &mut [u8; BLOCK_SIZE]) {
    for j in 2..HEADER_LEN + BLOCK_SIZE {
        let stripe = V2_STRIPES[j % 3];
        if j < HEADER_LEN {
            header[j] ^= stripe;
        } else {
            data[j - HEADER_LEN] ^= stripe;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    fn random_block() -> ([u8; HEADER_LEN], [u8; BLOCK_SIZE]) {
        let mut rng = rand::thread_rng();
        let mut header = [0u8; HEADER_LEN];
        let mut data = [0u8; BLOCK_SIZE];
        rng.fill_bytes(&mut header);
        rng.fill_bytes(&mut data);
        (header, data)
    }

    #[test]
    fn version_from_byte() {
        assert_eq!(ProtocolVersion::try_from(1).unwrap(), ProtocolVersion::V1);
        assert_eq!(ProtocolVersion::try_from(2).unwrap(), ProtocolVersion::V2);
        assert_eq!(
            ProtocolVersion::try_from(3),
            Err(ProtocolError::UnsupportedVersion(3))
        );
        assert_eq!(u8::from(ProtocolVersion::V2), 2);
    }

    #[test]
    fn frame_type_from_byte() {
        assert_eq!(FrameType::try_from(1).unwrap(), FrameType::Control);
        assert_eq!(FrameType::try_from(2).unwrap(), FrameType::Data);
        assert!(matches!(
            FrameType::try_from(7),
            Err(ProtocolError::UnknownFrameType(7))
        ));
    }

    #[test]
    fn v1_touches_only_stripe_columns() {
        let mut header = [2, 2, 5, 0];
        let mut data = [0u8; BLOCK_SIZE];
        ProtocolVersion::V1.whiten(&mut header, &mut data);
        assert_eq!(header, [2, 2, 5, 0]);
        for (i, &b) in data.iter().enumerate() {
            let expected = match i % 16 {
                3 => 0x55,
                11 => 0xAA,
                _ => 0x00,
            };
            assert_eq!(b, expected, "byte {}", i);
        }
    }

    #[test]
    fn v2_leaves_version_and_type_clear() {
        let mut header = [0x02, 0x02, 0x00, 0x00];
        let mut data = [0u8; BLOCK_SIZE];
        ProtocolVersion::V2.whiten(&mut header, &mut data);
        assert_eq!(header, [0x02, 0x02, 0x95, 0x35]);
        assert_eq!(&data[..4], &[0xAC, 0x95, 0x35, 0xAC]);
        assert_eq!(data[255], V2_STRIPES[259 % 3]);
    }

    #[test]
    fn whitening_is_involution() {
        for version in [ProtocolVersion::V1, ProtocolVersion::V2] {
            for _ in 0..32 {
                let (header, data) = random_block();
                let (mut h, mut d) = (header, data);
                version.whiten(&mut h, &mut d);
                version.whiten(&mut h, &mut d);
                assert_eq!(h, header);
                assert_eq!(d, data);
            }
        }
    }

    #[test]
    fn version_serde_as_byte() {
        #[derive(Deserialize)]
        struct Wrap {
            version: ProtocolVersion,
        }
        let w: Wrap = toml::from_str("version = 1").unwrap();
        assert_eq!(w.version, ProtocolVersion::V1);
        assert!(toml::from_str::<Wrap>("version = 9").is_err());
    }
}
