//! # Protocol Layer
//!
//! Per-connection message reassembly and the handler callback set.
//!
//! Each accepted socket lives for exactly one request/response exchange,
//! driven by an explicit state machine:
//!
//! ```text
//! AwaitingHeader → AwaitingBody → Dispatched → Closed
//! ```
//!
//! The state machine is pure and fed with byte chunks of arbitrary size and
//! boundaries, which keeps the read path portable and directly testable. The
//! async driver around it owns the socket and runs entirely on the worker
//! slot the connection was bound to, so no per-connection locking exists.

pub mod connection;
pub mod handler;


pub use connection::{ConnState, Connection, ConnectionId, Reassembler, ReplyWriter};
pub use handler::Handler;
