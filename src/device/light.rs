//! Dimmable light.

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::device::{DeviceKind, DeviceUpdate, OutputDevice};
use crate::link::{Delivery, Link};
use crate::protocol::OutputId;

/// Full brightness, also the level restored when a light was never on.
pub const FULL_BRIGHTNESS: u8 = 100;

#[derive(Debug, Clone, Copy)]
struct LightState {
    brightness: u8,
    last_on_brightness: u8,
}

/// Result of a level report on a light.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightUpdate {
    /// New brightness.
    pub brightness: u8,
    /// New on/off facet, only reported at 0 and 100.
    ///
    /// The controller does not send a separate on/off telegram; a dimmed
    /// level still counts as on.
    pub power_on: Option<bool>,
}

/// A dimmer output.
pub struct Light {
    id: OutputId,
    name: String,
    link: Link,
    state: RwLock<LightState>,
}

impl Light {
    /// Creates a light that starts off.
    #[must_use]
    pub fn new(id: OutputId, name: impl Into<String>, link: Link) -> Self {
        Self {
            id,
            name: name.into(),
            link,
            state: RwLock::new(LightState {
                brightness: 0,
                last_on_brightness: FULL_BRIGHTNESS,
            }),
        }
    }

    /// Returns true if the brightness is nonzero.
    pub async fn power_on(&self) -> bool {
        self.state.read().await.brightness != 0
    }

    /// Returns the current brightness.
    pub async fn brightness(&self) -> u8 {
        self.state.read().await.brightness
    }

    /// Switches the light.
    ///
    /// Switching on restores the brightness saved by the last switch-off.
    /// Switching off saves the current brightness, or full brightness if
    /// the light was already off.
    pub async fn set_power_on(&self, on: bool) -> Delivery {
        let level = {
            let mut state = self.state.write().await;
            if on {
                state.brightness = state.last_on_brightness;
            } else {
                state.last_on_brightness = if state.brightness > 0 {
                    state.brightness
                } else {
                    FULL_BRIGHTNESS
                };
                state.brightness = 0;
            }
            state.brightness
        };

        tracing::debug!("{} ({}) power {} -> {}", self.name, self.id, on, level);
        self.link.set_output(self.id, i32::from(level)).await
    }

    /// Sets the brightness directly.
    pub async fn set_brightness(&self, brightness: u8) -> Delivery {
        self.state.write().await.brightness = brightness;

        tracing::debug!("{} ({}) brightness -> {}", self.name, self.id, brightness);
        self.link.set_output(self.id, i32::from(brightness)).await
    }
}

impl OutputDevice for Light {
    fn id(&self) -> OutputId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::Light
    }

    fn push_level(&self, level: u8) -> BoxFuture<'_, DeviceUpdate> {
        Box::pin(async move {
            self.state.write().await.brightness = level;

            let power_on = match level {
                0 => Some(false),
                FULL_BRIGHTNESS => Some(true),
                _ => None,
            };
            DeviceUpdate::Light(LightUpdate {
                brightness: level,
                power_on,
            })
        })
    }
}
