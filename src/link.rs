//! Link to the controller: connection state, send-or-queue policy.
//!
//! The link owns the transport. Commands submitted while the link is not
//! [`LinkState::Open`] are queued and written, in order, as part of the
//! transition into `Open`.
//!
//! Two locks are involved and are always taken in the same order: the
//! state/queue lock first, then the transport lock. The queue drain runs
//! with both held, so a command submitted after the link opens cannot
//! overtake one submitted before.
//!
//! Every transition into and out of `Open` is announced on the link's
//! [`EventDispatcher`] as [`Event::Connected`] / [`Event::Disconnected`].

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::event::{Event, EventDispatcher};
use crate::protocol::{ACTION_LEVEL, OutputId, encode_output, encode_query};
use crate::queue::CommandQueue;
use crate::transport::{Reader, Transport};

/// Connection state of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No connection; commands are queued.
    Closed,
    /// A connection attempt is in progress; commands are queued.
    Opening,
    /// Connected; commands are written immediately.
    Open,
}

/// What happened to a submitted command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Written to the transport.
    Sent,
    /// Held until the link opens.
    Queued,
}

struct Control {
    state: LinkState,
    queue: CommandQueue,
}

/// Shared handle to the controller link.
#[derive(Clone)]
pub struct Link {
    control: Arc<Mutex<Control>>,
    transport: Arc<Mutex<Box<dyn Transport>>>,
    dispatcher: EventDispatcher,
}

impl Link {
    /// Creates a closed link over the given transport.
    #[must_use]
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            control: Arc::new(Mutex::new(Control {
                state: LinkState::Closed,
                queue: CommandQueue::new(),
            })),
            transport: Arc::new(Mutex::new(Box::new(transport))),
            dispatcher: EventDispatcher::new(256),
        }
    }

    /// Returns the dispatcher link transitions are announced on.
    #[must_use]
    pub const fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Returns the current state.
    pub async fn state(&self) -> LinkState {
        self.control.lock().await.state
    }

    /// Returns the number of queued telegrams.
    pub async fn pending(&self) -> usize {
        self.control.lock().await.queue.len()
    }

    /// Sets an output level.
    pub async fn set_output(&self, id: OutputId, value: i32) -> Delivery {
        self.submit(encode_output(id, ACTION_LEVEL, value)).await
    }

    /// Asks the controller to report an output's level.
    ///
    /// The reply arrives later as an ordinary report and is matched by id
    /// only.
    pub async fn query_output(&self, id: OutputId) -> Delivery {
        self.submit(encode_query(id)).await
    }

    async fn submit(&self, telegram: Bytes) -> Delivery {
        let mut control = self.control.lock().await;

        if control.state == LinkState::Open {
            let mut transport = self.transport.lock().await;
            match transport.send(telegram.clone()).await {
                Ok(()) => return Delivery::Sent,
                Err(e) => {
                    tracing::warn!("write failed: {}", e);
                    self.lose(&mut control, transport.as_mut()).await;
                }
            }
        }

        tracing::debug!(
            "queued {:?} ({} pending)",
            String::from_utf8_lossy(&telegram).trim_end(),
            control.queue.len() + 1
        );
        control.queue.enqueue(telegram);
        Delivery::Queued
    }

    /// Connects the transport and opens the link.
    ///
    /// Returns `Ok(false)` if the link was already open or opening. On
    /// failure, either connecting or writing the queue, the link returns to
    /// `Closed` and unsent commands stay queued.
    pub async fn open(&self) -> Result<bool> {
        {
            let mut control = self.control.lock().await;
            if control.state != LinkState::Closed {
                return Ok(false);
            }
            control.state = LinkState::Opening;
        }
        tracing::info!("link opening");

        let connected = self.transport.lock().await.connect().await;
        if let Err(e) = connected {
            tracing::error!("link open failed: {}", e);
            self.control.lock().await.state = LinkState::Closed;
            return Err(e);
        }

        self.opened().await?;
        Ok(true)
    }

    /// Writes everything queued, oldest first, then marks the link open.
    ///
    /// If a write fails the transport is disconnected, the link is `Closed`,
    /// and the unsent telegrams stay queued in their original order.
    pub async fn opened(&self) -> Result<()> {
        let mut control = self.control.lock().await;
        let mut transport = self.transport.lock().await;

        if !transport.is_connected() {
            control.state = LinkState::Closed;
            return Err(Error::NotConnected);
        }

        let queued = control.queue.len();
        while let Some(telegram) = control.queue.pop_front() {
            if let Err(e) = transport.send(telegram.clone()).await {
                tracing::warn!("write failed while draining queue: {}", e);
                control.queue.requeue_front(telegram);
                self.lose(&mut control, transport.as_mut()).await;
                return Err(e);
            }
        }

        control.state = LinkState::Open;
        tracing::info!("link open, {} queued sent", queued);
        self.dispatcher.dispatch(Event::Connected);
        Ok(())
    }

    /// Marks the link closed after the connection was lost or dropped.
    pub async fn closed(&self) {
        let mut control = self.control.lock().await;
        let mut transport = self.transport.lock().await;
        self.lose(&mut control, transport.as_mut()).await;
    }

    /// Disconnects the transport and moves to `Closed`.
    async fn lose(&self, control: &mut Control, transport: &mut dyn Transport) {
        if let Err(e) = transport.disconnect().await {
            tracing::warn!("disconnect failed: {}", e);
        }

        let was_open = control.state == LinkState::Open;
        control.state = LinkState::Closed;
        if was_open {
            tracing::info!("link closed");
            self.dispatcher.dispatch(Event::Disconnected);
        }
    }

    /// Takes the transport's read half, if it has one.
    pub async fn take_reader(&self) -> Option<Reader> {
        self.transport.lock().await.take_reader()
    }
}
