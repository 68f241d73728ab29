//! Serial transport implementation.
//!
//! This module provides RS-232 communication with a Lutron controller
//! (RadioRA 2 / HomeWorks QS main repeater or an RS-232 interface).

use std::io;
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use crate::error::{Error, Result};
use crate::protocol::LineDecoder;
use crate::transport::{Reader, Transport};

/// Default baud rate of the controller's RS-232 port.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default connection delay.
pub const DEFAULT_CONNECTION_DELAY: Duration = Duration::from_millis(100);

/// Configuration for serial transport.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0" or "COM3").
    pub port: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Delay after opening the port before the link counts as ready.
    pub connection_delay: Duration,
}

impl SerialConfig {
    /// Creates a new serial configuration with default settings.
    #[must_use]
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            connection_delay: DEFAULT_CONNECTION_DELAY,
        }
    }

    /// Sets the baud rate.
    #[must_use]
    pub const fn baud_rate(mut self, rate: u32) -> Self {
        self.baud_rate = rate;
        self
    }

    /// Sets the connection delay.
    #[must_use]
    pub const fn connection_delay(mut self, delay: Duration) -> Self {
        self.connection_delay = delay;
        self
    }
}

/// Serial transport for the controller link.
pub struct SerialTransport {
    config: SerialConfig,
    writer: Option<WriteHalf<SerialStream>>,
    reader: Option<ReadHalf<SerialStream>>,
}

impl SerialTransport {
    /// Creates a new serial transport with the given configuration.
    #[must_use]
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            writer: None,
            reader: None,
        }
    }

    /// Creates a new serial transport for the given port with default settings.
    #[must_use]
    pub fn with_port(port: impl Into<String>) -> Self {
        Self::new(SerialConfig::new(port))
    }

    /// Returns the transport configuration.
    #[must_use]
    pub const fn config(&self) -> &SerialConfig {
        &self.config
    }
}

impl Transport for SerialTransport {
    fn connect(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.writer.is_some() {
                return Ok(());
            }

            tracing::info!(
                "opening serial port {} at {} baud",
                self.config.port,
                self.config.baud_rate
            );

            let stream = tokio_serial::new(&self.config.port, self.config.baud_rate)
                .open_native_async()
                .map_err(Error::Serial)?;

            tokio::time::sleep(self.config.connection_delay).await;

            let (reader, writer) = tokio::io::split(stream);
            self.reader = Some(reader);
            self.writer = Some(writer);

            tracing::info!("serial port {} open", self.config.port);
            Ok(())
        })
    }

    fn disconnect(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.writer.is_some() || self.reader.is_some() {
                tracing::info!("closing serial port {}", self.config.port);
                self.writer = None;
                self.reader = None;
            }
            Ok(())
        })
    }

    fn send(&mut self, data: Bytes) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let writer = self.writer.as_mut().ok_or(Error::NotConnected)?;

            tracing::trace!("sending {:?}", String::from_utf8_lossy(&data));

            writer.write_all(&data).await.map_err(Error::Io)?;
            writer.flush().await.map_err(Error::Io)?;

            Ok(())
        })
    }

    fn is_connected(&self) -> bool {
        self.writer.is_some()
    }

    fn take_reader(&mut self) -> Option<Reader> {
        self.reader
            .take()
            .map(|reader| Box::new(reader) as Reader)
    }
}

/// Runs the read loop, forwarding complete lines to `line_tx`.
///
/// This should be spawned as a separate task. It returns `Ok(())` when the
/// line receiver is dropped.
///
/// # Errors
///
/// Returns an error if reading fails or the port is closed.
pub async fn run_read_loop<R>(
    mut reader: R,
    mut decoder: LineDecoder,
    line_tx: mpsc::Sender<Bytes>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 256];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("serial port closed");
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "serial port closed",
                )));
            }
            Ok(n) => n,
            Err(e) => {
                tracing::error!("serial read error: {}", e);
                return Err(Error::Io(e));
            }
        };

        tracing::trace!("received {} bytes", n);
        decoder.feed(&buf[..n]);

        while let Some(line) = decoder.decode() {
            tracing::trace!("received line {:?}", String::from_utf8_lossy(&line));
            if line_tx.send(line).await.is_err() {
                tracing::debug!("line receiver dropped");
                return Ok(());
            }
        }
    }
}

/// Lists available serial ports.
///
/// # Errors
///
/// Returns an error if the port list cannot be retrieved.
pub fn list_ports() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports().map_err(Error::Serial)?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
