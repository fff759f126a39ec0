//! # Core Wire Format
//!
//! Low-level frame header handling for the framing protocol.
//!
//! This module provides the foundation for the protocol: the packed 32-bit
//! header that precedes every payload on the wire.
//!
//! ## Wire Format
//! ```text
//! [Header(4)] [Payload(N)]
//!
//! Header bit layout:  encryption(2) | flag(8, must be 0xE5) | length(22)
//! ```
//!
//! ## Properties
//! - Maximum frame length: 0x3FFFFF bytes (structural, enforced by the
//!   22-bit length field)
//! - The fixed flag byte rejects misaligned or foreign byte streams
//! - Fixed-size header keeps the read path a two-phase state machine
//!   (4 bytes, then N bytes)

pub mod header;

pub use header::{decode_header, encode_header, HEADER_SIZE, MAX_FRAME_LEN};
