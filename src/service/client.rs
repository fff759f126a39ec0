//! # Blocking Client
//!
//! Synchronous round-trip counterpart to the dispatcher, used to validate
//! the wire format from the outside. One framed request, at most one framed
//! response, then the connection is done.
//!
//! This component has no concurrency of its own: every wait is a true
//! blocking wait on the socket, bounded by the caller-supplied timeout. It
//! is intentionally simple and never part of the server's hot path.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::core::header::{header_bytes, header_from_bytes, HEADER_SIZE, MAX_FRAME_LEN};
use crate::error::{ProtocolError, Result};

/// Synchronous request/response client over one TCP connection.
pub struct BlockingClient {
    stream: TcpStream,
}

impl BlockingClient {
    /// Connect with a timeout that also bounds every subsequent read and
    /// write on the socket.
    pub fn connect<A: ToSocketAddrs>(addr: A, timeout: Duration) -> Result<Self> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| ProtocolError::ConfigError("address resolved to nothing".into()))?;
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        Ok(Self { stream })
    }

    /// Send one framed request and block for the framed response.
    ///
    /// Returns the complete response payload, or an **empty** `Vec` on any
    /// failure: connect/write/read errors, a read timeout, a response header
    /// whose flag byte is corrupt, or a request too large to frame. Never a
    /// partial or garbage payload.
    pub fn send(&mut self, payload: &[u8]) -> Vec<u8> {
        match self.round_trip(payload) {
            Ok(reply) => reply,
            Err(err) => {
                debug!(error = %err, "round trip failed");
                Vec::new()
            }
        }
    }

    fn round_trip(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        if payload.len() > MAX_FRAME_LEN as usize {
            return Err(ProtocolError::OversizedPayload(payload.len()));
        }

        self.stream
            .write_all(&header_bytes(payload.len() as u32, 0))?;
        self.stream.write_all(payload)?;
        self.stream.flush()?;

        let mut raw = [0u8; HEADER_SIZE];
        self.stream.read_exact(&mut raw)?;
        let (len, _tag) = header_from_bytes(raw)?;

        let mut body = vec![0u8; len as usize];
        self.stream.read_exact(&mut body)?;
        Ok(body)
    }
}
