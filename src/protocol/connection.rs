//! # Per-Socket State Machine
//!
//! A [`Connection`] represents one accepted socket for the lifetime of
//! exactly one request/response exchange. Incoming bytes run through the
//! pure [`Reassembler`] until a complete message is available, the message
//! handler is invoked once with a [`ReplyWriter`], and the socket is closed.
//!
//! Errors are terminal: a transport failure or an invalid header at any
//! state closes the connection through the same path. Nothing is retried and
//! no failure is visible to any other connection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::core::header::{header_bytes, header_from_bytes, HEADER_SIZE, MAX_FRAME_LEN};
use crate::error::{ProtocolError, Result};
use crate::protocol::handler::Handler;
use crate::utils::metrics::global_metrics;

/// Identifier assigned to every accepted connection, unique per process.
pub type ConnectionId = u64;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Read size for each pass over the socket.
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Lifecycle states of a connection's read path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Waiting for the 4 header bytes.
    AwaitingHeader,
    /// Header decoded; accumulating body bytes up to the declared length.
    AwaitingBody,
    /// Complete message handed to the handler. No further reads.
    Dispatched,
    /// Terminal. Reached after dispatch, a protocol violation, or a
    /// transport error.
    Closed,
}

/// Incremental message reassembly, independent of any socket.
///
/// Fed with byte chunks of arbitrary size and boundaries; a split header or
/// a one-byte drip feed reassembles identically to a single large read.
#[derive(Debug)]
pub struct Reassembler {
    state: ConnState,
    buf: BytesMut,
    expected: usize,
}

impl Reassembler {
    pub fn new() -> Self {
        Self {
            state: ConnState::AwaitingHeader,
            buf: BytesMut::with_capacity(HEADER_SIZE),
            expected: 0,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnState {
        self.state
    }

    /// Consume a chunk of bytes read from the transport.
    ///
    /// Returns `Ok(Some(payload))` exactly once, when the declared message
    /// length has been reached. An invalid header flag yields
    /// [`ProtocolError::InvalidHeader`] and moves the state machine to
    /// `Closed`; no length from a corrupt header is ever acted on. Bytes
    /// past the declared length are ignored; the protocol carries a single
    /// message per connection.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Option<Bytes>> {
        let mut rest = chunk;
        loop {
            match self.state {
                ConnState::AwaitingHeader => {
                    let need = HEADER_SIZE - self.buf.len();
                    let take = need.min(rest.len());
                    self.buf.extend_from_slice(&rest[..take]);
                    rest = &rest[take..];
                    if self.buf.len() < HEADER_SIZE {
                        return Ok(None);
                    }

                    let mut raw = [0u8; HEADER_SIZE];
                    raw.copy_from_slice(&self.buf);
                    let (len, tag) = match header_from_bytes(raw) {
                        Ok(decoded) => decoded,
                        Err(err) => {
                            self.state = ConnState::Closed;
                            return Err(err);
                        }
                    };
                    trace!(len, tag, "frame header decoded");

                    self.expected = len as usize;
                    self.buf.clear();
                    self.buf.reserve(self.expected);
                    self.state = ConnState::AwaitingBody;
                    // Loop again: a zero-length message (or body bytes in the
                    // same chunk) must complete without another read event.
                }
                ConnState::AwaitingBody => {
                    let need = self.expected - self.buf.len();
                    let take = need.min(rest.len());
                    self.buf.extend_from_slice(&rest[..take]);
                    if self.buf.len() < self.expected {
                        return Ok(None);
                    }
                    self.state = ConnState::Dispatched;
                    return Ok(Some(self.buf.split().freeze()));
                }
                ConnState::Dispatched | ConnState::Closed => return Ok(None),
            }
        }
    }

    /// Force the terminal state. Further feeds are ignored.
    pub fn close(&mut self) {
        self.state = ConnState::Closed;
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Write capability handed to the message handler.
///
/// Each [`write`](ReplyWriter::write) frames its payload with a fresh header
/// (tag 0) and queues header plus payload for delivery. The queued bytes are
/// flushed to the socket after the handler returns, best-effort; the
/// connection closes immediately afterwards, so the writer must not be
/// retained.
#[derive(Debug, Default)]
pub struct ReplyWriter {
    out: BytesMut,
}

impl ReplyWriter {
    pub(crate) fn new() -> Self {
        Self { out: BytesMut::new() }
    }

    /// Frame `payload` and queue it for delivery.
    ///
    /// Rejects payloads over [`MAX_FRAME_LEN`], which the 22-bit length
    /// field cannot represent.
    pub fn write(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > MAX_FRAME_LEN as usize {
            return Err(ProtocolError::OversizedPayload(payload.len()));
        }
        self.out
            .extend_from_slice(&header_bytes(payload.len() as u32, 0));
        self.out.extend_from_slice(payload);
        Ok(())
    }

    /// Bytes queued so far (framed).
    pub fn queued_len(&self) -> usize {
        self.out.len()
    }

    pub(crate) fn into_bytes(self) -> Bytes {
        self.out.freeze()
    }
}

/// One accepted socket, bound to a worker slot for its entire lifetime.
pub struct Connection {
    id: ConnectionId,
    stream: TcpStream,
    reassembler: Reassembler,
    handler: Arc<Handler>,
}

impl Connection {
    pub fn new(stream: TcpStream, handler: Arc<Handler>) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            stream,
            reassembler: Reassembler::new(),
            handler,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Drive the connection to completion: reassemble one message, invoke
    /// the handler, flush its reply, close.
    ///
    /// Runs entirely on the worker slot the connection was bound to. Always
    /// returns the connection id so the slot can post the completion
    /// notification back to the dispatcher.
    pub async fn run(mut self) -> ConnectionId {
        if let Some(on_open) = &self.handler.on_open {
            on_open(self.id);
        }

        match self.exchange().await {
            Ok(()) => {}
            Err(ProtocolError::InvalidHeader) => {
                // Protocol violation: close without invoking any handler.
                global_metrics().protocol_error();
                debug!(conn = self.id, "invalid frame header, closing");
            }
            Err(ProtocolError::ConnectionClosed) => {
                debug!(conn = self.id, "peer closed before message completed");
            }
            Err(err) => {
                global_metrics().connection_error();
                debug!(conn = self.id, error = %err, "transport error, closing");
                if let Some(on_error) = &self.handler.on_error {
                    on_error(self.id, &err);
                }
            }
        }

        self.reassembler.close();
        let _ = self.stream.shutdown().await;
        if let Some(on_close) = &self.handler.on_close {
            on_close(self.id);
        }
        self.id
    }

    async fn exchange(&mut self) -> Result<()> {
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];
        loop {
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(ProtocolError::ConnectionClosed);
            }

            if let Some(message) = self.reassembler.feed(&chunk[..n])? {
                global_metrics().message_received(message.len() as u64);
                trace!(conn = self.id, bytes = message.len(), "message reassembled");

                let mut reply = ReplyWriter::new();
                if let Some(on_message) = &self.handler.on_message {
                    on_message(&mut reply, &message);
                }

                let out = reply.into_bytes();
                if !out.is_empty() {
                    self.stream.write_all(&out).await?;
                    self.stream.flush().await?;
                    global_metrics().message_sent(out.len() as u64);
                }
                return Ok(());
            }
        }
    }
}
