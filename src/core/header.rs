//! # Frame Header Codec
//!
//! Encodes and decodes the packed 32-bit header carried in front of every
//! payload:
//!
//! ```text
//!  31 30          22                    0
//! ┌────┬────────────┬────────────────────┐
//! │tag │ flag: 0xE5 │ length (22 bits)   │
//! └────┴────────────┴────────────────────┘
//! ```
//!
//! A single 4-byte header carries the framing length and a forward-compatible
//! algorithm tag with no variable-length encoding. The tag field is reserved
//! for an encryption scheme that is not implemented; it is carried on the
//! wire but acted on by nobody, and must always be 0 in practice.
//!
//! The header is written in the host's native byte order, matching the raw
//! integer representation on the wire. Client and server builds must agree
//! on endianness.

use crate::error::{ProtocolError, Result};

/// Size of the frame header on the wire, in bytes.
pub const HEADER_SIZE: usize = 4;

/// Bit offset of the flag byte within the header.
pub const LENGTH_BITS: u32 = 22;

/// Bit offset of the encryption/algorithm tag within the header.
pub const CRYPTION_BITS: u32 = 30;

/// Fixed flag byte every valid header must carry.
pub const HEADER_FLAG: u32 = 0xE5;

/// Mask isolating the flag byte after shifting.
pub const FLAG_MASK: u32 = 0xFF;

/// Maximum representable frame length (22 bits, ~4 MB).
pub const MAX_FRAME_LEN: u32 = 0x3F_FFFF;

/// Mask isolating the length field.
pub const LENGTH_MASK: u32 = 0x3F_FFFF;

/// Maximum value of the 2-bit encryption/algorithm tag.
pub const MAX_TAG: u8 = 3;

/// Pack a frame length and algorithm tag into a wire header.
///
/// # Panics
///
/// Panics if `len` exceeds [`MAX_FRAME_LEN`] or `tag` exceeds [`MAX_TAG`].
/// Both are programmer errors: a conforming caller checks payload sizes at
/// its own API boundary before framing, and the crate never produces a tag
/// other than 0.
#[inline]
pub fn encode_header(len: u32, tag: u8) -> u32 {
    assert!(
        len <= MAX_FRAME_LEN,
        "frame length {len} exceeds the 22-bit field"
    );
    assert!(tag <= MAX_TAG, "algorithm tag {tag} exceeds the 2-bit field");
    (u32::from(tag) << CRYPTION_BITS) | (HEADER_FLAG << LENGTH_BITS) | len
}

/// Unpack a wire header into `(length, tag)`.
///
/// The flag byte is validated first; a mismatch yields
/// [`ProtocolError::InvalidHeader`] and no length is considered meaningful.
/// The masked length is in range by construction, so no separate bounds
/// check exists.
#[inline]
pub fn decode_header(header: u32) -> Result<(u32, u8)> {
    let flag = (header >> LENGTH_BITS) & FLAG_MASK;
    if flag != HEADER_FLAG {
        return Err(ProtocolError::InvalidHeader);
    }
    Ok((header & LENGTH_MASK, (header >> CRYPTION_BITS) as u8))
}

/// Encode a header directly to its 4-byte wire representation.
#[inline]
pub fn header_bytes(len: u32, tag: u8) -> [u8; HEADER_SIZE] {
    encode_header(len, tag).to_ne_bytes()
}

/// Decode a header from its 4-byte wire representation.
#[inline]
pub fn header_from_bytes(bytes: [u8; HEADER_SIZE]) -> Result<(u32, u8)> {
    decode_header(u32::from_ne_bytes(bytes))
}
