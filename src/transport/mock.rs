//! In-memory transport for tests.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::Notify;

use crate::error::{Error, Result};
use crate::transport::{Reader, Transport};

#[derive(Default)]
struct Shared {
    sent: Mutex<Vec<Bytes>>,
    failed_connects: AtomicUsize,
    fail_sends: AtomicBool,
    connected: AtomicBool,
    connect_gate: Mutex<Option<Arc<Notify>>>,
}

/// Transport that records writes and reads from an in-memory pipe.
pub(crate) struct MockTransport {
    connected: bool,
    reader: Option<DuplexStream>,
    shared: Arc<Shared>,
}

/// Test-side view of a [`MockTransport`].
pub(crate) struct MockRemote {
    remote: Option<DuplexStream>,
    shared: Arc<Shared>,
}

impl MockTransport {
    pub(crate) fn new() -> (Self, MockRemote) {
        let (local, remote) = tokio::io::duplex(1024);
        let shared = Arc::new(Shared::default());
        let transport = Self {
            connected: false,
            reader: Some(local),
            shared: Arc::clone(&shared),
        };
        let remote = MockRemote {
            remote: Some(remote),
            shared,
        };
        (transport, remote)
    }
}

impl MockRemote {
    /// Everything written to the transport so far, as text.
    pub(crate) fn sent(&self) -> Vec<String> {
        self.shared
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .collect()
    }

    /// Makes the next `n` connect attempts fail.
    pub(crate) fn fail_connects(&self, n: usize) {
        self.shared.failed_connects.store(n, Ordering::SeqCst);
    }

    /// Makes every write fail while set.
    pub(crate) fn fail_sends(&self, fail: bool) {
        self.shared.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Whether the transport is currently connected.
    pub(crate) fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Holds the next connect attempt until the returned handle is notified.
    pub(crate) fn hold_connect(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.shared.connect_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Writes raw bytes as if the controller sent them.
    pub(crate) async fn push(&mut self, data: &[u8]) {
        let remote = self.remote.as_mut().unwrap();
        remote.write_all(data).await.unwrap();
    }

    /// Closes the controller side, ending the read loop.
    pub(crate) fn hang_up(&mut self) {
        self.remote = None;
    }
}

impl Transport for MockTransport {
    fn connect(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let gate = self.shared.connect_gate.lock().unwrap().take();
            if let Some(gate) = gate {
                gate.notified().await;
            }

            let pending = self.shared.failed_connects.load(Ordering::SeqCst);
            if pending > 0 {
                self.shared
                    .failed_connects
                    .store(pending - 1, Ordering::SeqCst);
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    "no such port",
                )));
            }
            self.connected = true;
            self.shared.connected.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    fn disconnect(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.connected = false;
            self.shared.connected.store(false, Ordering::SeqCst);
            Ok(())
        })
    }

    fn send(&mut self, data: Bytes) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if !self.connected {
                return Err(Error::NotConnected);
            }
            if self.shared.fail_sends.load(Ordering::SeqCst) {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "write failed",
                )));
            }
            self.shared.sent.lock().unwrap().push(data);
            Ok(())
        })
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn take_reader(&mut self) -> Option<Reader> {
        self.reader.take().map(|r| Box::new(r) as Reader)
    }
}
