//! # Handler Callback Set
//!
//! Application hooks shared by every connection a dispatcher accepts. Only
//! `on_message` participates in the protocol; the lifecycle hooks are
//! optional observers.
//!
//! ## Contract
//! - `on_message` is invoked exactly once per successful reassembly, with
//!   the connection's [`ReplyWriter`] and the complete payload. It may write
//!   zero or one replies; the connection closes as soon as it returns.
//! - `on_open` fires when the connection starts running on its worker slot,
//!   `on_close` when it reaches its terminal state, `on_error` on transport
//!   errors (never on protocol violations, which close silently).

use crate::error::ProtocolError;
use crate::protocol::connection::{ConnectionId, ReplyWriter};

type MessageFn = dyn Fn(&mut ReplyWriter, &[u8]) + Send + Sync + 'static;
type LifecycleFn = dyn Fn(ConnectionId) + Send + Sync + 'static;
type ErrorFn = dyn Fn(ConnectionId, &ProtocolError) + Send + Sync + 'static;

/// Callback set bound to every connection. All hooks default to unset.
#[derive(Default)]
pub struct Handler {
    pub(crate) on_message: Option<Box<MessageFn>>,
    pub(crate) on_open: Option<Box<LifecycleFn>>,
    pub(crate) on_close: Option<Box<LifecycleFn>>,
    pub(crate) on_error: Option<Box<ErrorFn>>,
}

impl Handler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the message callback.
    ///
    /// ```
    /// use framewire::Handler;
    ///
    /// // Echo server: write the request back verbatim.
    /// let handler = Handler::new().on_message(|reply, msg| {
    ///     let _ = reply.write(msg);
    /// });
    /// # let _ = handler;
    /// ```
    pub fn on_message<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut ReplyWriter, &[u8]) + Send + Sync + 'static,
    {
        self.on_message = Some(Box::new(f));
        self
    }

    pub fn on_open<F>(mut self, f: F) -> Self
    where
        F: Fn(ConnectionId) + Send + Sync + 'static,
    {
        self.on_open = Some(Box::new(f));
        self
    }

    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: Fn(ConnectionId) + Send + Sync + 'static,
    {
        self.on_close = Some(Box::new(f));
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(ConnectionId, &ProtocolError) + Send + Sync + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("on_message", &self.on_message.is_some())
            .field("on_open", &self.on_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
