//! Transport layer for the controller link.
//!
//! This module provides the abstraction for the physical connection.
//! Only RS-232 serial is implemented; tests use an in-memory transport.

#[cfg(test)]
pub(crate) mod mock;
pub mod serial;

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::io::AsyncRead;

use crate::error::Result;

/// Read half of a connected transport.
pub type Reader = Box<dyn AsyncRead + Send + Unpin>;

/// Trait for transport implementations.
pub trait Transport: Send + Sync {
    /// Opens the connection.
    fn connect(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Closes the connection.
    fn disconnect(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Writes one encoded telegram.
    fn send(&mut self, data: Bytes) -> BoxFuture<'_, Result<()>>;

    /// Returns true if connected.
    fn is_connected(&self) -> bool;

    /// Takes the read half for use in a background task.
    ///
    /// Returns `None` if there is no inbound stream or it was already taken.
    fn take_reader(&mut self) -> Option<Reader>;
}

pub use serial::{SerialConfig, SerialTransport, run_read_loop};
