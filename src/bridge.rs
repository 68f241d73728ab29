//! Main [`Bridge`] implementation.
//!
//! This module provides the high-level [`Bridge`] that combines the link,
//! the configured devices, and event handling into a unified interface.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{AccessoryKind, BridgeConfig};
use crate::device::{DeviceUpdate, Light, OutputDevice, Shade};
use crate::error::Result;
use crate::event::{Event, EventDispatcher, Subscription};
use crate::link::{Link, LinkState};
use crate::protocol::{LineDecoder, OutputId, decode};
use crate::registry::DeviceRegistry;
use crate::transport::{Reader, SerialTransport, Transport, run_read_loop};

/// Bridge between the host and the outputs on one controller link.
pub struct Bridge {
    name: String,
    link: Link,
    registry: Arc<DeviceRegistry>,
    lights: BTreeMap<OutputId, Arc<Light>>,
    shades: BTreeMap<OutputId, Arc<Shade>>,

    // Background tasks
    read_task: Option<JoinHandle<()>>,
    process_task: Option<JoinHandle<()>>,
}

impl Bridge {
    /// Creates a bridge on the serial port named in the configuration.
    ///
    /// The bridge is not connected yet; commands issued before
    /// [`connect`](Self::connect) are queued.
    pub fn serial(config: &BridgeConfig) -> Result<Self> {
        let transport = SerialTransport::new(config.serial());
        Self::with_transport(config, transport)
    }

    /// Creates a bridge over the given transport.
    ///
    /// Fails if an accessory uses output id 0 or two accessories share an
    /// output id. Accessories of an unsupported type are skipped.
    pub fn with_transport(
        config: &BridgeConfig,
        transport: impl Transport + 'static,
    ) -> Result<Self> {
        config.validate()?;

        let link = Link::new(transport);
        let mut registry = DeviceRegistry::new();
        let mut lights = BTreeMap::new();
        let mut shades = BTreeMap::new();

        for accessory in &config.accessories {
            let name = accessory.display_name();
            match accessory.kind {
                AccessoryKind::Light => {
                    let light = Arc::new(Light::new(accessory.id, name, link.clone()));
                    registry.register(Arc::clone(&light) as Arc<dyn OutputDevice>)?;
                    lights.insert(accessory.id, light);
                }
                AccessoryKind::Shade => {
                    let shade = Arc::new(Shade::new(accessory.id, name, link.clone()));
                    registry.register(Arc::clone(&shade) as Arc<dyn OutputDevice>)?;
                    shades.insert(accessory.id, shade);
                }
                AccessoryKind::Unsupported => {
                    tracing::warn!(
                        "{}: unsupported accessory {:?} (output {})",
                        config.name,
                        name,
                        accessory.id
                    );
                }
            }
        }

        tracing::info!(
            "{}: {} lights, {} shades",
            config.name,
            lights.len(),
            shades.len()
        );

        Ok(Self {
            name: config.name.clone(),
            link,
            registry: Arc::new(registry),
            lights,
            shades,
            read_task: None,
            process_task: None,
        })
    }

    /// Opens the link and starts processing controller reports.
    ///
    /// Commands queued so far are written before this returns. Calling it
    /// while already connected does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be opened or the queued
    /// commands cannot be written; unsent commands are kept for the next
    /// attempt.
    pub async fn connect(&mut self) -> Result<()> {
        if !self.link.open().await? {
            return Ok(());
        }

        if let Some(reader) = self.link.take_reader().await {
            self.start_read_loop(reader);
        }

        tracing::info!("{}: connected", self.name);
        Ok(())
    }

    /// Starts the background read and line processing tasks.
    fn start_read_loop(&mut self, reader: Reader) {
        self.stop_tasks();

        let (line_tx, mut line_rx) = mpsc::channel::<Bytes>(256);

        let link = self.link.clone();
        let name = self.name.clone();
        let read_task = tokio::spawn(async move {
            if let Err(e) = run_read_loop(reader, LineDecoder::new(), line_tx).await {
                tracing::warn!("{}: read loop ended: {}", name, e);
            }
            link.closed().await;
        });
        self.read_task = Some(read_task);

        let registry = Arc::clone(&self.registry);
        let dispatcher = self.link.dispatcher().clone();
        let process_task = tokio::spawn(async move {
            while let Some(line) = line_rx.recv().await {
                route_line(&registry, &dispatcher, &line).await;
            }
        });
        self.process_task = Some(process_task);
    }

    fn stop_tasks(&mut self) {
        if let Some(task) = self.read_task.take() {
            task.abort();
        }
        if let Some(task) = self.process_task.take() {
            task.abort();
        }
    }

    /// Disconnects from the controller.
    ///
    /// Commands issued afterwards are queued until the next
    /// [`connect`](Self::connect).
    pub async fn disconnect(&mut self) {
        self.stop_tasks();
        self.link.closed().await;

        tracing::info!("{}: disconnected", self.name);
    }

    /// Handles one line received from the controller.
    ///
    /// Lines that are not level reports, and reports for outputs that are not
    /// configured, are logged and dropped.
    pub async fn handle_line(&self, line: &[u8]) -> Option<DeviceUpdate> {
        route_line(&self.registry, self.link.dispatcher(), line).await
    }

    /// Asks the controller for the level of every configured output.
    ///
    /// Replies arrive as ordinary reports.
    pub async fn refresh(&self) {
        for id in self.registry.ids() {
            self.link.query_output(id).await;
        }
    }

    /// Queries one output and waits for the controller's report.
    ///
    /// Returns `None` if no report for `id` arrives within `timeout`, for
    /// example because the link is not open and the query was queued.
    pub async fn query_level(&self, id: OutputId, timeout: Duration) -> Option<DeviceUpdate> {
        let mut events = self.subscribe();
        self.link.query_output(id).await;

        match events
            .wait_for(
                |e| matches!(e, Event::DeviceUpdated { id: reported, .. } if *reported == id),
                timeout,
            )
            .await
        {
            Some(Event::DeviceUpdated { update, .. }) => Some(update),
            _ => None,
        }
    }

    /// Returns the current link state.
    pub async fn state(&self) -> LinkState {
        self.link.state().await
    }

    /// Returns the link handle.
    #[must_use]
    pub const fn link(&self) -> &Link {
        &self.link
    }

    /// Returns the platform name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the light bound to an output id.
    #[must_use]
    pub fn light(&self, id: OutputId) -> Option<Arc<Light>> {
        self.lights.get(&id).cloned()
    }

    /// Returns the shade bound to an output id.
    #[must_use]
    pub fn shade(&self, id: OutputId) -> Option<Arc<Shade>> {
        self.shades.get(&id).cloned()
    }

    /// Returns all lights ordered by output id.
    pub fn lights(&self) -> impl Iterator<Item = &Arc<Light>> {
        self.lights.values()
    }

    /// Returns all shades ordered by output id.
    pub fn shades(&self) -> impl Iterator<Item = &Arc<Shade>> {
        self.shades.values()
    }

    /// Returns the device registry.
    #[must_use]
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Subscribes to events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.link.dispatcher().subscribe()
    }
}

/// Decodes a line and hands the level to the matching device.
async fn route_line(
    registry: &DeviceRegistry,
    dispatcher: &EventDispatcher,
    line: &[u8],
) -> Option<DeviceUpdate> {
    let Some(telegram) = decode(line) else {
        tracing::debug!("ignoring line {:?}", String::from_utf8_lossy(line));
        return None;
    };

    let Some(device) = registry.lookup(telegram.id) else {
        tracing::warn!(
            "report for unconfigured output {} dropped (level {})",
            telegram.id,
            telegram.level
        );
        return None;
    };

    let level = u8::try_from(telegram.level.clamp(0, 100)).unwrap_or(100);
    let update = device.push_level(level).await;
    tracing::debug!("{} ({}) reported {}", device.name(), telegram.id, level);

    dispatcher.dispatch(Event::DeviceUpdated {
        id: telegram.id,
        update,
    });
    Some(update)
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.stop_tasks();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::device::{LightUpdate, PositionState, ShadeUpdate};
    use crate::error::{ConfigError, Error};
    use crate::link::Delivery;
    use crate::transport::mock::MockTransport;

    fn config(json: &str) -> BridgeConfig {
        BridgeConfig::from_json(json).unwrap()
    }

    fn two_lights() -> BridgeConfig {
        config(
            r#"{
                "port": "/dev/null",
                "accessories": [
                    { "type": "light", "id": 1, "name": "Kitchen" },
                    { "type": "light", "id": 2, "name": "Hall" }
                ]
            }"#,
        )
    }

    #[tokio::test]
    async fn test_builds_devices_from_config() {
        let config = config(
            r#"{
                "port": "/dev/null",
                "accessories": [
                    { "type": "light", "id": 1 },
                    { "type": "shade", "id": 4, "name": "Bedroom" },
                    { "type": "keypad", "id": 8 }
                ]
            }"#,
        );
        let (transport, _remote) = MockTransport::new();
        let bridge = Bridge::with_transport(&config, transport).unwrap();

        assert_eq!(bridge.name(), "Lutron");
        assert_eq!(bridge.registry().len(), 2);
        assert_eq!(bridge.light(OutputId(1)).unwrap().name(), "Light");
        assert_eq!(bridge.shade(OutputId(4)).unwrap().name(), "Bedroom");
        assert!(bridge.registry().lookup(OutputId(8)).is_none());
        assert_eq!(bridge.lights().count(), 1);
        assert_eq!(bridge.shades().count(), 1);
        assert_eq!(bridge.state().await, LinkState::Closed);
    }

    #[test]
    fn test_duplicate_id_fails_load() {
        let config = config(
            r#"{
                "port": "/dev/null",
                "accessories": [
                    { "type": "light", "id": 3 },
                    { "type": "shade", "id": 3 }
                ]
            }"#,
        );
        let (transport, _remote) = MockTransport::new();
        let result = Bridge::with_transport(&config, transport);

        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::DuplicateOutput { id: OutputId(3) }))
        ));
    }

    #[test]
    fn test_output_zero_fails_load() {
        let mut config = two_lights();
        config.accessories[1].id = OutputId(0);
        let (transport, _remote) = MockTransport::new();
        let result = Bridge::with_transport(&config, transport);

        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidOutput { id: OutputId(0) }))
        ));
    }

    #[tokio::test]
    async fn test_commands_before_connect_are_sent_in_order() {
        let (transport, remote) = MockTransport::new();
        let mut bridge = Bridge::with_transport(&two_lights(), transport).unwrap();

        bridge.link().set_output(OutputId(1), 80).await;
        bridge.link().set_output(OutputId(2), 30).await;
        assert!(remote.sent().is_empty());

        bridge.connect().await.unwrap();
        assert_eq!(bridge.state().await, LinkState::Open);
        assert_eq!(remote.sent(), vec!["#OUTPUT,1,1,80\r\n", "#OUTPUT,2,1,30\r\n"]);
    }

    #[tokio::test]
    async fn test_device_setters_before_connect() {
        let (transport, remote) = MockTransport::new();
        let mut bridge = Bridge::with_transport(&two_lights(), transport).unwrap();

        let kitchen = bridge.light(OutputId(1)).unwrap();
        let hall = bridge.light(OutputId(2)).unwrap();
        kitchen.set_power_on(true).await;
        hall.set_brightness(30).await;
        kitchen.set_brightness(55).await;

        bridge.connect().await.unwrap();
        assert_eq!(
            remote.sent(),
            vec![
                "#OUTPUT,1,1,100\r\n",
                "#OUTPUT,2,1,30\r\n",
                "#OUTPUT,1,1,55\r\n"
            ]
        );
    }

    #[tokio::test]
    async fn test_connect_failure_keeps_queue() {
        let (transport, remote) = MockTransport::new();
        remote.fail_connects(1);
        let mut bridge = Bridge::with_transport(&two_lights(), transport).unwrap();

        bridge.link().set_output(OutputId(2), 10).await;
        assert!(bridge.connect().await.is_err());
        assert_eq!(bridge.state().await, LinkState::Closed);

        bridge.connect().await.unwrap();
        assert_eq!(remote.sent(), vec!["#OUTPUT,2,1,10\r\n"]);
    }

    #[tokio::test]
    async fn test_connect_fails_when_queue_cannot_be_written() {
        let (transport, remote) = MockTransport::new();
        let mut bridge = Bridge::with_transport(&two_lights(), transport).unwrap();
        let mut events = bridge.subscribe();

        bridge.link().set_output(OutputId(1), 40).await;
        remote.fail_sends(true);
        assert!(bridge.connect().await.is_err());
        assert_eq!(bridge.state().await, LinkState::Closed);
        assert_eq!(bridge.link().pending().await, 1);
        assert!(!remote.is_connected());
        assert_eq!(events.try_recv(), None);

        remote.fail_sends(false);
        bridge.connect().await.unwrap();
        assert_eq!(events.recv().await, Some(Event::Connected));
        assert_eq!(remote.sent(), vec!["#OUTPUT,1,1,40\r\n"]);
    }

    #[tokio::test]
    async fn test_write_failure_while_connected_disconnects() {
        let (transport, remote) = MockTransport::new();
        let mut bridge = Bridge::with_transport(&two_lights(), transport).unwrap();
        let mut events = bridge.subscribe();

        bridge.connect().await.unwrap();
        assert_eq!(events.recv().await, Some(Event::Connected));

        remote.fail_sends(true);
        let kitchen = bridge.light(OutputId(1)).unwrap();
        assert_eq!(kitchen.set_brightness(10).await, Delivery::Queued);
        assert_eq!(bridge.state().await, LinkState::Closed);
        assert!(!remote.is_connected());

        let event = tokio::time::timeout(Duration::from_millis(200), events.recv())
            .await
            .unwrap();
        assert_eq!(event, Some(Event::Disconnected));

        remote.fail_sends(false);
        bridge.connect().await.unwrap();
        assert_eq!(remote.sent(), vec!["#OUTPUT,1,1,10\r\n"]);
    }

    #[tokio::test]
    async fn test_handle_line_routes_by_id() {
        let (transport, _remote) = MockTransport::new();
        let bridge = Bridge::with_transport(&two_lights(), transport).unwrap();
        let kitchen = bridge.light(OutputId(1)).unwrap();
        let hall = bridge.light(OutputId(2)).unwrap();

        let update = bridge.handle_line(b"~OUTPUT,2,1,45").await;
        assert_eq!(
            update,
            Some(DeviceUpdate::Light(LightUpdate {
                brightness: 45,
                power_on: None
            }))
        );
        assert_eq!(hall.brightness().await, 45);
        assert_eq!(kitchen.brightness().await, 0);
    }

    #[tokio::test]
    async fn test_handle_line_ignores_noise_and_unknown_ids() {
        let (transport, remote) = MockTransport::new();
        let bridge = Bridge::with_transport(&two_lights(), transport).unwrap();

        assert_eq!(bridge.handle_line(b"~OUTPUT,9,1,45").await, None);
        assert_eq!(bridge.handle_line(b"~OUTPUT,1,1").await, None);
        assert_eq!(bridge.handle_line(b"~DEVICE,1,1,3").await, None);
        assert_eq!(bridge.handle_line(b"garbage").await, None);

        for light in bridge.lights() {
            assert_eq!(light.brightness().await, 0);
        }
        assert!(remote.sent().is_empty());
    }

    #[tokio::test]
    async fn test_handle_line_clamps_level() {
        let (transport, _remote) = MockTransport::new();
        let bridge = Bridge::with_transport(&two_lights(), transport).unwrap();

        bridge.handle_line(b"~OUTPUT,1,1,250").await;
        assert_eq!(bridge.light(OutputId(1)).unwrap().brightness().await, 100);
        bridge.handle_line(b"~OUTPUT,1,1,-5").await;
        assert_eq!(bridge.light(OutputId(1)).unwrap().brightness().await, 0);
    }

    #[tokio::test]
    async fn test_reports_over_the_wire() {
        let config = config(
            r#"{
                "port": "/dev/null",
                "accessories": [
                    { "type": "light", "id": 1 },
                    { "type": "shade", "id": 2 }
                ]
            }"#,
        );
        let (transport, mut remote) = MockTransport::new();
        let mut bridge = Bridge::with_transport(&config, transport).unwrap();
        let mut events = bridge.subscribe();

        bridge.connect().await.unwrap();
        assert_eq!(events.recv().await, Some(Event::Connected));

        remote.push(b"GNET> ~OUTPUT,2,1,6").await;
        remote.push(b"0\r\n~OUTPUT,1,1,100\r\n").await;

        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap();
        assert_eq!(
            event,
            Some(Event::DeviceUpdated {
                id: OutputId(2),
                update: DeviceUpdate::Shade(ShadeUpdate {
                    position: 60,
                    position_state: PositionState::Stopped
                })
            })
        );

        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap();
        assert_eq!(
            event,
            Some(Event::DeviceUpdated {
                id: OutputId(1),
                update: DeviceUpdate::Light(LightUpdate {
                    brightness: 100,
                    power_on: Some(true)
                })
            })
        );

        assert_eq!(bridge.shade(OutputId(2)).unwrap().current_position().await, 60);
        assert!(bridge.light(OutputId(1)).unwrap().power_on().await);
    }

    #[tokio::test]
    async fn test_hang_up_closes_link_and_queues_again() {
        let (transport, mut remote) = MockTransport::new();
        let mut bridge = Bridge::with_transport(&two_lights(), transport).unwrap();
        let mut events = bridge.subscribe();

        bridge.connect().await.unwrap();
        assert_eq!(events.recv().await, Some(Event::Connected));

        remote.hang_up();
        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap();
        assert_eq!(event, Some(Event::Disconnected));
        assert_eq!(bridge.state().await, LinkState::Closed);

        let kitchen = bridge.light(OutputId(1)).unwrap();
        kitchen.set_brightness(70).await;
        assert!(remote.sent().is_empty());

        bridge.connect().await.unwrap();
        assert_eq!(remote.sent(), vec!["#OUTPUT,1,1,70\r\n"]);
    }

    #[tokio::test]
    async fn test_disconnect_then_commands_queue() {
        let (transport, remote) = MockTransport::new();
        let mut bridge = Bridge::with_transport(&two_lights(), transport).unwrap();

        bridge.connect().await.unwrap();
        bridge.disconnect().await;
        assert_eq!(bridge.state().await, LinkState::Closed);

        bridge.light(OutputId(2)).unwrap().set_power_on(true).await;
        assert!(remote.sent().is_empty());
        assert_eq!(bridge.link().pending().await, 1);
    }

    #[tokio::test]
    async fn test_refresh_queries_every_output() {
        let (transport, remote) = MockTransport::new();
        let mut bridge = Bridge::with_transport(&two_lights(), transport).unwrap();

        bridge.connect().await.unwrap();
        bridge.refresh().await;
        assert_eq!(remote.sent(), vec!["?OUTPUT,1\r\n", "?OUTPUT,2\r\n"]);
    }

    #[tokio::test]
    async fn test_query_level_waits_for_report() {
        let (transport, mut remote) = MockTransport::new();
        let mut bridge = Bridge::with_transport(&two_lights(), transport).unwrap();
        bridge.connect().await.unwrap();

        let (update, ()) = tokio::join!(
            bridge.query_level(OutputId(2), Duration::from_secs(1)),
            async {
                remote.push(b"~OUTPUT,1,1,20\r\n~OUTPUT,2,1,45\r\n").await;
            }
        );

        assert_eq!(
            update,
            Some(DeviceUpdate::Light(LightUpdate {
                brightness: 45,
                power_on: None
            }))
        );
        assert_eq!(remote.sent(), vec!["?OUTPUT,2\r\n"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_level_times_out_while_closed() {
        let (transport, remote) = MockTransport::new();
        let bridge = Bridge::with_transport(&two_lights(), transport).unwrap();

        let update = bridge
            .query_level(OutputId(1), Duration::from_millis(100))
            .await;
        assert_eq!(update, None);
        assert_eq!(bridge.link().pending().await, 1);
        assert!(remote.sent().is_empty());
    }
}
