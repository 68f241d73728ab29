//! Platform configuration.
//!
//! The host hands the bridge a JSON document like:
//!
//! ```json
//! {
//!     "name": "Lutron",
//!     "port": "/dev/ttyUSB0",
//!     "accessories": [
//!         { "type": "light", "id": 1, "name": "Kitchen" },
//!         { "type": "shade", "id": 7, "name": "Bedroom" }
//!     ]
//! }
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::protocol::OutputId;
use crate::transport::SerialConfig;
use crate::transport::serial::DEFAULT_BAUD_RATE;

/// Bridge configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Platform name used in log lines.
    #[serde(default = "default_platform_name")]
    pub name: String,
    /// Serial port path.
    pub port: String,
    /// Serial baud rate.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Configured accessories.
    #[serde(default)]
    pub accessories: Vec<AccessoryConfig>,
}

/// Kind of accessory in the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessoryKind {
    /// Dimmable light.
    Light,
    /// Window covering.
    Shade,
    /// Anything else; logged and skipped.
    #[serde(other)]
    Unsupported,
}

/// One configured accessory.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessoryConfig {
    /// Accessory kind.
    #[serde(rename = "type")]
    pub kind: AccessoryKind,
    /// Output id on the controller.
    pub id: OutputId,
    /// Display name; defaults to the kind.
    #[serde(default)]
    pub name: Option<String>,
}

fn default_platform_name() -> String {
    "Lutron".into()
}

const fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

impl BridgeConfig {
    /// Parses a configuration document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every accessory names a real output.
    ///
    /// Controller outputs are numbered from 1.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.accessories.iter().find(|a| a.id.0 == 0) {
            Some(accessory) => Err(ConfigError::InvalidOutput { id: accessory.id }),
            None => Ok(()),
        }
    }

    /// Reads and parses a configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Serial settings derived from this configuration.
    #[must_use]
    pub fn serial(&self) -> SerialConfig {
        SerialConfig::new(&self.port).baud_rate(self.baud_rate)
    }
}

impl AccessoryConfig {
    /// Display name, falling back to "Light" or "Shade".
    #[must_use]
    pub fn display_name(&self) -> &str {
        match (&self.name, self.kind) {
            (Some(name), _) => name.as_str(),
            (None, AccessoryKind::Light) => "Light",
            (None, AccessoryKind::Shade) => "Shade",
            (None, AccessoryKind::Unsupported) => "Accessory",
        }
    }
}
