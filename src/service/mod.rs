//! # Service Layer
//!
//! The server-side [`Dispatcher`](dispatcher::Dispatcher) and the
//! synchronous [`BlockingClient`](client::BlockingClient) used to exercise
//! the wire format from the outside.

pub mod client;
pub mod dispatcher;

pub use client::BlockingClient;
pub use dispatcher::Dispatcher;
