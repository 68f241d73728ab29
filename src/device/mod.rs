//! Logical devices backed by controller outputs.
//!
//! Each device keeps the last known state locally, answers the host from
//! it, and forwards changes to the [`Link`](crate::link::Link). Level
//! reports from the controller arrive through [`OutputDevice::push_level`].

pub mod light;
pub mod shade;

use futures::future::BoxFuture;

use crate::protocol::OutputId;

pub use light::{Light, LightUpdate};
pub use shade::{PositionState, Shade, ShadeUpdate};

/// Kind of a logical device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Dimmable light.
    Light,
    /// Window covering.
    Shade,
}

/// State change caused by a level report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceUpdate {
    /// A light changed.
    Light(LightUpdate),
    /// A shade changed.
    Shade(ShadeUpdate),
}

/// A device the registry can route level reports to.
pub trait OutputDevice: Send + Sync {
    /// Output id the device is bound to.
    fn id(&self) -> OutputId;

    /// Display name.
    fn name(&self) -> &str;

    /// Device kind.
    fn kind(&self) -> DeviceKind;

    /// Applies a level reported by the controller.
    ///
    /// Never writes to the link, so a report cannot echo back as a command.
    fn push_level(&self, level: u8) -> BoxFuture<'_, DeviceUpdate>;
}
