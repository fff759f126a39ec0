//! # Error Types
//!
//! Error handling for the framing protocol.
//!
//! This module defines all error variants that can occur during protocol
//! operations, from low-level I/O failures to wire-format violations.
//!
//! ## Error Categories
//! - **I/O Errors**: Socket and transport failures
//! - **Protocol Errors**: Invalid frame headers, oversized payloads
//! - **Configuration Errors**: Bad or missing configuration values
//!
//! Every failure in the core is terminal to the single connection it affects
//! and never propagates to other connections. All errors implement
//! `std::error::Error` for interoperability.
//!
//! ## Example Usage
//! ```rust
//! use framewire::core::header::decode_header;
//! use framewire::error::ProtocolError;
//!
//! // A header whose flag byte is not 0xE5 never yields a length.
//! match decode_header(0xDEAD_BEEF) {
//!     Err(ProtocolError::InvalidHeader) => {}
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
/// Static strings are borrowed, avoiding heap allocations for common error cases.
pub mod constants {
    /// Protocol validation errors
    pub const ERR_INVALID_HEADER: &str = "Invalid frame header";
    pub const ERR_OVERSIZED_PAYLOAD: &str = "Payload exceeds maximum frame length";

    /// Connection errors
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed";
    pub const ERR_TIMEOUT: &str = "Operation timed out";
}

// ProtocolError is the primary error type for all protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid frame header")]
    InvalidHeader,

    #[error("Payload too large: {0} bytes")]
    OversizedPayload(usize),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
