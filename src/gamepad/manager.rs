//! Gamepad manager
//!
//! Owns the native backend, the mapping table and the identity resolver, and
//! turns every native event into one [`GamepadEvent`] for listeners. It is a
//! plain single-owner struct: the poll loop drives it, and nothing else may
//! touch the backend while it runs.
//!
//! # Event flow
//!
//! ```text
//! InputBackend ──► poll() ──► dispatch() ──► broadcast::Sender<GamepadEvent>
//!  (NativeEvent)              (normalize)        (UI, network, ...)
//! ```

use crate::gamepad::backend::{InputBackend, NativeEvent};
use crate::gamepad::error::BackendError;
use crate::gamepad::event::{AxisEvent, ButtonEvent, DeviceList, GamepadEvent, Joystick};
use crate::gamepad::identity::IdentityResolver;
use crate::gamepad::mapping::MappingTable;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Tick interval used until [`GamepadManager::set_update_interval`] is called
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 20;

pub struct GamepadManager {
    backend: Box<dyn InputBackend>,
    mappings: MappingTable,
    resolver: IdentityResolver,

    // Records of connected devices, in native index order
    joysticks: Vec<Joystick>,

    update_interval_ms: u64,
    event_sender: broadcast::Sender<GamepadEvent>,
    shut_down: bool,
}

impl GamepadManager {
    pub fn new(
        backend: Box<dyn InputBackend>,
        mappings: MappingTable,
        event_sender: broadcast::Sender<GamepadEvent>,
    ) -> Self {
        info!(
            "Creating gamepad manager with {} community mappings, generic template: {}",
            mappings.entries().len(),
            mappings.generic().is_some()
        );

        Self {
            backend,
            mappings,
            resolver: IdentityResolver::new(),
            joysticks: Vec::new(),
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            event_sender,
            shut_down: false,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GamepadEvent> {
        debug!("New subscriber to gamepad events");
        self.event_sender.subscribe()
    }

    /// Drains every native event pending right now and dispatches it.
    ///
    /// Returns the number of native events handled.
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.backend.poll_event() {
            self.dispatch(event);
            handled += 1;
        }
        handled
    }

    fn dispatch(&mut self, event: NativeEvent) {
        match event {
            NativeEvent::DeviceAdded { index } => {
                self.resolver.on_device_added();
                self.on_device_added(index);
                self.publish_device_list();
            }
            NativeEvent::DeviceRemoved { index } => {
                self.on_device_removed(index);
                self.publish_device_list();
            }
            NativeEvent::AxisMotion { index, axis, value } => {
                let joystick = self.logical_id(index);
                let event = AxisEvent::from_raw(joystick, axis, value);
                debug!("Axis event: {} = {:.4} on {}", event.identifier, event.value, joystick);
                self.publish(GamepadEvent::Axis(event));
            }
            NativeEvent::ButtonDown {
                index,
                button,
                state,
            }
            | NativeEvent::ButtonUp {
                index,
                button,
                state,
            } => {
                let joystick = self.logical_id(index);
                let event = ButtonEvent::from_raw(joystick, button, state);
                debug!(
                    "Button event: {} pressed={} on {}",
                    event.identifier, event.pressed, joystick
                );
                self.publish(GamepadEvent::Button(event));
            }
        }
    }

    fn logical_id(&self, index: usize) -> i32 {
        self.resolver.resolve(index, self.backend.device_count())
    }

    fn on_device_added(&mut self, index: usize) {
        if !self.backend.is_game_controller(index) {
            self.upgrade_to_controller(index);
        }

        if let Err(e) = self.backend.open_controller(index) {
            warn!("Failed to open controller at index {}: {}", index, e);
        }

        let joystick = Joystick {
            id: self.logical_id(index),
            num_axes: self.axis_count(index),
            num_buttons: self.button_count(index),
            display_name: self.device_name(index),
        };
        info!(
            "Controller connected: {} (id {}, {} axes, {} buttons)",
            joystick.display_name, joystick.id, joystick.num_axes, joystick.num_buttons
        );

        let position = index.min(self.joysticks.len());
        self.joysticks.insert(position, joystick.clone());
        self.publish(GamepadEvent::DeviceAdded(joystick));
    }

    // Registers a mapping built from the generic template so that unknown
    // hardware can be opened like a standard game controller.
    fn upgrade_to_controller(&mut self, index: usize) {
        let Some(info) = self.backend.inspect_joystick(index) else {
            debug!("Device at index {} vanished before it could be inspected", index);
            return;
        };
        let Some(mapping) = self.mappings.synthesize(&info.guid, &info.name) else {
            debug!("No generic mapping available for {}", info.name);
            return;
        };

        debug!("Registering generic mapping: {}", mapping);
        match self.backend.add_mapping(&mapping) {
            Ok(()) => info!("Generic mapping registered for {} ({})", info.name, info.guid),
            Err(BackendError::Unsupported(reason)) => {
                debug!("Generic mapping for {} not registered: {}", info.name, reason)
            }
            Err(e) => warn!("Generic mapping for {} rejected: {}", info.name, e),
        }
    }

    fn on_device_removed(&mut self, index: usize) {
        let id = self.logical_id(index);
        self.backend.close_controller(index);

        let joystick = if index < self.joysticks.len() {
            self.joysticks.remove(index)
        } else {
            Joystick {
                id,
                num_axes: 0,
                num_buttons: 0,
                display_name: String::new(),
            }
        };
        warn!(
            "Controller disconnected: {} (resolved id {})",
            joystick.display_name, id
        );

        self.publish(GamepadEvent::DeviceRemoved(joystick));
    }

    fn publish_device_list(&self) {
        let names = self.device_list();
        let count = self.device_count();
        self.publish(GamepadEvent::DeviceListChanged(DeviceList { names, count }));
    }

    fn publish(&self, event: GamepadEvent) {
        // No listeners is fine, the event is simply dropped.
        if self.event_sender.send(event).is_err() {
            debug!("No listeners for gamepad event");
        }
    }

    pub fn device_count(&self) -> usize {
        self.backend.device_count()
    }

    /// Number of axes of the device at a native index, 0 when not present
    pub fn axis_count(&self, index: usize) -> usize {
        self.backend.axis_count(index).unwrap_or(0)
    }

    /// Number of buttons of the device at a native index, 0 when not present
    pub fn button_count(&self, index: usize) -> usize {
        self.backend.button_count(index).unwrap_or(0)
    }

    /// Controller protocol name, falling back to the joystick name
    pub fn device_name(&self, index: usize) -> String {
        match self.backend.controller_name(index) {
            Some(name) if !name.is_empty() => name,
            _ => self.backend.joystick_name(index).unwrap_or_default(),
        }
    }

    /// Display names in native index order.
    ///
    /// Positions in this list are native indices, not logical ids.
    pub fn device_list(&self) -> Vec<String> {
        (0..self.device_count())
            .map(|index| self.device_name(index))
            .collect()
    }

    /// Records of the connected devices, in native index order
    pub fn joysticks(&self) -> &[Joystick] {
        &self.joysticks
    }

    /// Negative values are ignored, zero is accepted
    pub fn set_update_interval(&mut self, interval_ms: i64) {
        match u64::try_from(interval_ms) {
            Ok(interval_ms) => {
                debug!("Update interval set to {}ms", interval_ms);
                self.update_interval_ms = interval_ms;
            }
            Err(_) => debug!("Ignoring negative update interval {}", interval_ms),
        }
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    /// Plays a full strength rumble; devices without haptics are skipped silently
    pub fn rumble(&mut self, index: usize, duration_ms: u32) {
        let duration = Duration::from_millis(u64::from(duration_ms));
        match self.backend.rumble(index, duration) {
            Ok(()) => debug!("Rumbling device {} for {}ms", index, duration_ms),
            Err(BackendError::HapticUnsupported(_)) => {
                debug!("Device {} has no haptic support", index)
            }
            Err(e) => warn!("Rumble on device {} failed: {}", index, e),
        }
    }

    /// Closes every open controller and releases the backend. Runs once.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        info!("Shutting down gamepad manager");
        // Backwards, so closing does not shift the remaining indices.
        for index in (0..self.backend.device_count()).rev() {
            self.backend.close_controller(index);
        }
        self.backend.shutdown();
        self.joysticks.clear();
    }
}

impl Drop for GamepadManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
