//! Application level input records
//!
//! Every native event is turned into exactly one of these value records and
//! broadcast to listeners. Nothing in here refers back into the manager, so the
//! records can be freely cloned and moved across threads.

use serde::{Deserialize, Serialize};

/// Largest positive raw axis value reported by the native backend
pub const AXIS_MAX: i16 = 32767;

/// Native "pressed" state code carried by button events
pub const PRESSED: u8 = 1;

/// Native "released" state code carried by button events
pub const RELEASED: u8 = 0;

/// A connected device as seen by the rest of the application
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Joystick {
    /// Logical id produced by the identity resolver
    pub id: i32,
    pub num_axes: usize,
    pub num_buttons: usize,
    pub display_name: String,
}

/// Movement of a single axis
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AxisEvent {
    /// Logical id of the owning joystick
    pub joystick: i32,
    pub raw_id: u8,
    pub identifier: String,
    /// Raw value divided by [`AXIS_MAX`], roughly in `[-1.0, 1.0]`
    pub value: f64,
}

/// Press or release of a single button
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ButtonEvent {
    pub joystick: i32,
    pub raw_id: u8,
    pub identifier: String,
    pub pressed: bool,
}

/// Combined refresh published after every connect or disconnect
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceList {
    /// Display names in native index order
    pub names: Vec<String>,
    pub count: usize,
}

/// The single message type delivered to listeners
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GamepadEvent {
    Axis(AxisEvent),
    Button(ButtonEvent),
    DeviceAdded(Joystick),
    DeviceRemoved(Joystick),
    DeviceListChanged(DeviceList),
}

/// Scales a raw signed 16 bit axis reading.
///
/// The divisor is the positive extreme, so `i16::MIN` lands slightly below
/// `-1.0`. The output is not clamped.
pub fn normalize_axis(raw: i16) -> f64 {
    f64::from(raw) / f64::from(AXIS_MAX)
}

pub fn is_pressed(state: u8) -> bool {
    state == PRESSED
}

pub fn axis_name(raw_id: u8) -> String {
    format!("Axis {}", raw_id)
}

pub fn button_name(raw_id: u8) -> String {
    format!("Button {}", raw_id)
}

impl AxisEvent {
    pub fn from_raw(joystick: i32, raw_id: u8, raw_value: i16) -> Self {
        Self {
            joystick,
            raw_id,
            identifier: axis_name(raw_id),
            value: normalize_axis(raw_value),
        }
    }
}

impl ButtonEvent {
    pub fn from_raw(joystick: i32, raw_id: u8, state: u8) -> Self {
        Self {
            joystick,
            raw_id,
            identifier: button_name(raw_id),
            pressed: is_pressed(state),
        }
    }
}
