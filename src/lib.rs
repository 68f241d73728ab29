//! # lutron-bridge
//!
//! Bridges a home-automation host to lights and shades on a Lutron
//! controller reached over a single RS-232 line.
//!
//! ## Features
//!
//! - Async/await based API using Tokio
//! - Commands issued before the link is up are queued and sent in order
//! - Controller level reports are routed to the device bound to the output id
//! - Event broadcast for link transitions and device updates
//!
//! ## Quick Start
//!
//! ```no_run
//! use lutron_bridge::{Bridge, BridgeConfig, OutputId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), lutron_bridge::Error> {
//!     let config = BridgeConfig::from_json(
//!         r#"{ "port": "/dev/ttyUSB0",
//!              "accessories": [ { "type": "light", "id": 1, "name": "Kitchen" } ] }"#,
//!     )?;
//!     let mut bridge = Bridge::serial(&config)?;
//!
//!     // Queued until the link is open
//!     if let Some(kitchen) = bridge.light(OutputId(1)) {
//!         kitchen.set_brightness(60).await;
//!     }
//!
//!     bridge.connect().await?;
//!     bridge.refresh().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`protocol`] - Telegram encoding/decoding and line splitting
//! - [`transport`] - Transport implementations (currently serial)
//! - [`link`] - Connection state and the send-or-queue policy
//! - [`queue`] - Outbound command queue
//! - [`registry`] - Output id to device mapping
//! - [`device`] - Logical lights and shades
//! - [`event`] - Event broadcast to the host
//! - [`config`] - Platform configuration
//! - [`bridge`] - High-level [`Bridge`]

pub mod bridge;
pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod link;
pub mod protocol;
pub mod queue;
pub mod registry;
pub mod transport;

// Re-exports for convenience
pub use bridge::Bridge;
pub use config::{AccessoryConfig, AccessoryKind, BridgeConfig};
pub use device::{
    DeviceKind, DeviceUpdate, Light, LightUpdate, OutputDevice, PositionState, Shade, ShadeUpdate,
};
pub use error::{ConfigError, Error, Result};
pub use event::{Event, EventDispatcher, Subscription};
pub use link::{Delivery, Link, LinkState};
pub use protocol::{OutputId, Telegram};
pub use queue::CommandQueue;
pub use registry::DeviceRegistry;
pub use transport::{SerialConfig, SerialTransport, Transport, serial::list_ports};
