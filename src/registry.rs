//! Output id to device mapping used to route level reports.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use crate::device::OutputDevice;
use crate::error::ConfigError;
use crate::protocol::OutputId;

/// Registry of configured devices, at most one per output id.
#[derive(Default)]
pub struct DeviceRegistry {
    devices: HashMap<OutputId, Arc<dyn OutputDevice>>,
}

impl DeviceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a device under its output id.
    ///
    /// A second device for the same id is rejected; the first stays.
    pub fn register(&mut self, device: Arc<dyn OutputDevice>) -> Result<(), ConfigError> {
        let id = device.id();
        match self.devices.entry(id) {
            Entry::Occupied(existing) => {
                tracing::error!(
                    "output {} already registered to {}, rejecting {}",
                    id,
                    existing.get().name(),
                    device.name()
                );
                Err(ConfigError::DuplicateOutput { id })
            }
            Entry::Vacant(slot) => {
                slot.insert(device);
                Ok(())
            }
        }
    }

    /// Looks up the device for an output id.
    #[must_use]
    pub fn lookup(&self, id: OutputId) -> Option<Arc<dyn OutputDevice>> {
        self.devices.get(&id).cloned()
    }

    /// Returns all registered ids in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<OutputId> {
        let mut ids: Vec<OutputId> = self.devices.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registered devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Returns true if no device is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
