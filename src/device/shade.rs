//! Window covering.
//!
//! Motor travel time is not modeled: a new target is also taken as the
//! current position. [`PositionState`] is still derived from the two.

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::device::{DeviceKind, DeviceUpdate, OutputDevice};
use crate::link::{Delivery, Link};
use crate::protocol::OutputId;

/// Direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    /// Moving towards a higher position.
    Increasing,
    /// Moving towards a lower position.
    Decreasing,
    /// Not moving.
    Stopped,
}

impl PositionState {
    /// Derives the state from a current and target position.
    #[must_use]
    pub const fn derive(current: u8, target: u8) -> Self {
        if target > current {
            Self::Increasing
        } else if target < current {
            Self::Decreasing
        } else {
            Self::Stopped
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ShadeState {
    current_position: u8,
    target_position: u8,
}

/// Result of a level report on a shade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadeUpdate {
    /// New position.
    pub position: u8,
    /// Derived position state.
    pub position_state: PositionState,
}

/// A shade output.
pub struct Shade {
    id: OutputId,
    name: String,
    link: Link,
    state: RwLock<ShadeState>,
}

impl Shade {
    /// Creates a shade at position 0.
    #[must_use]
    pub fn new(id: OutputId, name: impl Into<String>, link: Link) -> Self {
        Self {
            id,
            name: name.into(),
            link,
            state: RwLock::new(ShadeState {
                current_position: 0,
                target_position: 0,
            }),
        }
    }

    /// Returns the current position.
    pub async fn current_position(&self) -> u8 {
        self.state.read().await.current_position
    }

    /// Returns the target position.
    pub async fn target_position(&self) -> u8 {
        self.state.read().await.target_position
    }

    /// Returns the derived travel direction.
    pub async fn position_state(&self) -> PositionState {
        let state = self.state.read().await;
        PositionState::derive(state.current_position, state.target_position)
    }

    /// Moves the shade.
    pub async fn set_target_position(&self, position: u8) -> Delivery {
        {
            let mut state = self.state.write().await;
            state.target_position = position;
            state.current_position = position;
        }

        tracing::debug!("{} ({}) position -> {}", self.name, self.id, position);
        self.link.set_output(self.id, i32::from(position)).await
    }
}

impl OutputDevice for Shade {
    fn id(&self) -> OutputId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::Shade
    }

    fn push_level(&self, level: u8) -> BoxFuture<'_, DeviceUpdate> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            state.current_position = level;
            state.target_position = level;

            DeviceUpdate::Shade(ShadeUpdate {
                position: level,
                position_state: PositionState::derive(
                    state.current_position,
                    state.target_position,
                ),
            })
        })
    }
}
