//! Error types for the lutron-bridge library.

use std::path::PathBuf;

use thiserror::Error;

use crate::protocol::OutputId;

/// The main error type for bridge operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Serial port error.
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Connection is not established.
    #[error("not connected")]
    NotConnected,
}

/// Configuration-time errors.
///
/// These are the only errors that stop the bridge from starting; everything
/// on the wire is tolerated and logged instead.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration document is not valid JSON for the expected shape.
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// The configuration file could not be read.
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An accessory was configured with output id 0.
    #[error("invalid output id {id}")]
    InvalidOutput { id: OutputId },

    /// Two accessories were configured with the same output id.
    #[error("duplicate output id {id}")]
    DuplicateOutput { id: OutputId },
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;
