//! Native input backends
//!
//! The manager talks to the native joystick library only through
//! [`InputBackend`]. Devices are addressed by the backend's compacting native
//! index (`0..device_count()`), which shifts down when a device disconnects.
//!
//! Backends are not required to be `Send`; they are built and used on the poll
//! thread only.

pub mod gilrs_backend;
#[cfg(feature = "sdl2")]
pub mod sdl2_backend;
pub mod slots;
#[cfg(test)]
pub mod scripted;

use crate::config::{BackendKind, GamepadConfig};
use crate::gamepad::error::BackendError;
use crate::gamepad::mapping::MappingTable;
use std::time::Duration;

pub use gilrs_backend::GilrsBackend;
#[cfg(feature = "sdl2")]
pub use sdl2_backend::Sdl2Backend;

/// Raw event as reported by the native library, before normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeEvent {
    DeviceAdded { index: usize },
    DeviceRemoved { index: usize },
    AxisMotion { index: usize, axis: u8, value: i16 },
    ButtonDown { index: usize, button: u8, state: u8 },
    ButtonUp { index: usize, button: u8, state: u8 },
}

/// Low level identity of a device, read through the joystick protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoystickInfo {
    pub guid: String,
    pub name: String,
}

pub trait InputBackend {
    /// Next pending event, never blocks
    fn poll_event(&mut self) -> Option<NativeEvent>;

    fn device_count(&self) -> usize;

    /// Whether the device already speaks the high level controller protocol
    fn is_game_controller(&self, index: usize) -> bool;

    fn open_controller(&mut self, index: usize) -> Result<(), BackendError>;

    fn close_controller(&mut self, index: usize);

    /// Briefly opens the device as a plain joystick to read its GUID and name
    fn inspect_joystick(&mut self, index: usize) -> Option<JoystickInfo>;

    /// Name under the controller protocol, if any
    fn controller_name(&self, index: usize) -> Option<String>;

    /// Name under the plain joystick protocol, if any
    fn joystick_name(&self, index: usize) -> Option<String>;

    fn axis_count(&self, index: usize) -> Option<usize>;

    fn button_count(&self, index: usize) -> Option<usize>;

    fn add_mapping(&mut self, mapping: &str) -> Result<(), BackendError>;

    /// Plays one full strength rumble effect
    fn rumble(&mut self, index: usize, duration: Duration) -> Result<(), BackendError>;

    /// Closes every open controller and releases the native library
    fn shutdown(&mut self);
}

/// Builds the backend selected in the configuration
pub fn create_backend(
    config: &GamepadConfig,
    mappings: &MappingTable,
) -> Result<Box<dyn InputBackend>, BackendError> {
    match config.backend {
        BackendKind::Gilrs => Ok(Box::new(GilrsBackend::new(mappings)?)),
        #[cfg(feature = "sdl2")]
        BackendKind::Sdl2 => Ok(Box::new(Sdl2Backend::new(
            mappings,
            config.allow_background_events,
        )?)),
        #[cfg(not(feature = "sdl2"))]
        BackendKind::Sdl2 => Err(BackendError::Init(
            "built without the `sdl2` feature".to_string(),
        )),
    }
}
