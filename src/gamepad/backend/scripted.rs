//! In-memory backend driven by test scripts
//!
//! Clones share state, so a test can keep one clone to plug devices in and
//! inspect what the manager did while another clone sits inside the manager.

use super::{InputBackend, JoystickInfo, NativeEvent};
use crate::gamepad::error::BackendError;
use crate::gamepad::event::{PRESSED, RELEASED};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ScriptedDevice {
    pub guid: String,
    pub controller_name: String,
    pub joystick_name: String,
    pub axes: usize,
    pub buttons: usize,
    pub haptic: bool,
    pub game_controller: bool,
}

impl ScriptedDevice {
    pub fn gamepad(name: &str) -> Self {
        Self {
            guid: format!("guid-{}", name.to_lowercase().replace(' ', "-")),
            controller_name: name.to_string(),
            joystick_name: format!("{} (HID)", name),
            axes: 6,
            buttons: 15,
            haptic: false,
            game_controller: true,
        }
    }

    pub fn with_haptic(mut self) -> Self {
        self.haptic = true;
        self
    }

    pub fn unrecognized(mut self) -> Self {
        self.game_controller = false;
        self
    }

    pub fn without_controller_name(mut self) -> Self {
        self.controller_name = String::new();
        self
    }
}

#[derive(Debug, Default)]
pub struct ScriptState {
    pub devices: Vec<ScriptedDevice>,
    pub open: Vec<bool>,
    pub queue: VecDeque<NativeEvent>,
    pub mappings: Vec<String>,
    pub rumbles: Vec<(usize, Duration)>,
    pub shutdowns: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedBackend {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().expect("script state poisoned")
    }

    /// Plugs a device in at the end of the native index range
    pub fn connect(&self, device: ScriptedDevice) -> usize {
        let mut state = self.state();
        state.devices.push(device);
        state.open.push(false);
        let index = state.devices.len() - 1;
        state.queue.push_back(NativeEvent::DeviceAdded { index });
        index
    }

    /// Unplugs the device at `index`; later indices shift down
    pub fn disconnect(&self, index: usize) {
        let mut state = self.state();
        state.devices.remove(index);
        state.open.remove(index);
        state.queue.push_back(NativeEvent::DeviceRemoved { index });
    }

    pub fn move_axis(&self, index: usize, axis: u8, value: i16) {
        self.state()
            .queue
            .push_back(NativeEvent::AxisMotion { index, axis, value });
    }

    pub fn press(&self, index: usize, button: u8) {
        self.state().queue.push_back(NativeEvent::ButtonDown {
            index,
            button,
            state: PRESSED,
        });
    }

    pub fn release(&self, index: usize, button: u8) {
        self.state().queue.push_back(NativeEvent::ButtonUp {
            index,
            button,
            state: RELEASED,
        });
    }

    pub fn is_open(&self, index: usize) -> bool {
        self.state().open.get(index).copied().unwrap_or(false)
    }
}

impl InputBackend for ScriptedBackend {
    fn poll_event(&mut self) -> Option<NativeEvent> {
        self.state().queue.pop_front()
    }

    fn device_count(&self) -> usize {
        self.state().devices.len()
    }

    fn is_game_controller(&self, index: usize) -> bool {
        self.state()
            .devices
            .get(index)
            .map(|device| device.game_controller)
            .unwrap_or(false)
    }

    fn open_controller(&mut self, index: usize) -> Result<(), BackendError> {
        let mut state = self.state();
        let device = state
            .devices
            .get(index)
            .ok_or(BackendError::DeviceNotFound(index))?;
        if !device.game_controller {
            return Err(BackendError::Device("no controller mapping".to_string()));
        }
        state.open[index] = true;
        Ok(())
    }

    fn close_controller(&mut self, index: usize) {
        if let Some(open) = self.state().open.get_mut(index) {
            *open = false;
        }
    }

    fn inspect_joystick(&mut self, index: usize) -> Option<JoystickInfo> {
        self.state().devices.get(index).map(|device| JoystickInfo {
            guid: device.guid.clone(),
            name: device.joystick_name.clone(),
        })
    }

    fn controller_name(&self, index: usize) -> Option<String> {
        self.state()
            .devices
            .get(index)
            .filter(|device| device.game_controller)
            .map(|device| device.controller_name.clone())
    }

    fn joystick_name(&self, index: usize) -> Option<String> {
        self.state()
            .devices
            .get(index)
            .map(|device| device.joystick_name.clone())
    }

    fn axis_count(&self, index: usize) -> Option<usize> {
        self.state().devices.get(index).map(|device| device.axes)
    }

    fn button_count(&self, index: usize) -> Option<usize> {
        self.state().devices.get(index).map(|device| device.buttons)
    }

    fn add_mapping(&mut self, mapping: &str) -> Result<(), BackendError> {
        let mut state = self.state();
        let guid = mapping
            .split(',')
            .next()
            .ok_or_else(|| BackendError::Mapping(mapping.to_string()))?
            .to_string();
        for device in state.devices.iter_mut().filter(|d| d.guid == guid) {
            device.game_controller = true;
        }
        state.mappings.push(mapping.to_string());
        Ok(())
    }

    fn rumble(&mut self, index: usize, duration: Duration) -> Result<(), BackendError> {
        let mut state = self.state();
        let device = state
            .devices
            .get(index)
            .ok_or(BackendError::DeviceNotFound(index))?;
        if !device.haptic {
            return Err(BackendError::HapticUnsupported(index));
        }
        state.rumbles.push((index, duration));
        Ok(())
    }

    fn shutdown(&mut self) {
        let mut state = self.state();
        for open in state.open.iter_mut() {
            *open = false;
        }
        state.shutdowns += 1;
    }
}
