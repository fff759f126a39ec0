//! # framewire
//!
//! Length-prefixed TCP framing core with a fixed worker-pool connection
//! dispatcher.
//!
//! ## Wire Format
//! ```text
//! [4 bytes: header]   bit layout: encryption(2) | flag(8, must be 0xE5) | length(22)
//! [length bytes: payload]
//! ```
//!
//! One request frame per connection from client to server, at most one
//! response frame back, then the connection closes. The protocol frames
//! bytes and nothing more: a fully-reassembled message is handed to the
//! application's handler callback, and its contents are never interpreted.
//!
//! ## Architecture
//! - [`core::header`]: packed 32-bit frame header codec
//! - [`protocol::connection`]: per-socket reassembly state machine
//! - [`service::dispatcher`]: accept loop + round-robin worker pool
//! - [`service::client`]: synchronous round-trip client for validation
//!
//! ## Example
//! ```no_run
//! use framewire::config::ServerConfig;
//! use framewire::{Dispatcher, Handler};
//!
//! #[tokio::main]
//! async fn main() -> framewire::Result<()> {
//!     let handler = Handler::new().on_message(|reply, msg| {
//!         let _ = reply.write(msg);
//!     });
//!
//!     let mut server = Dispatcher::new(ServerConfig::default(), handler);
//!     server.start().await?;
//!     tokio::signal::ctrl_c().await?;
//!     server.stop().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod utils;

pub use error::{ProtocolError, Result};
pub use protocol::connection::{ConnState, ConnectionId, ReplyWriter};
pub use protocol::handler::Handler;
pub use service::client::BlockingClient;
pub use service::dispatcher::Dispatcher;
