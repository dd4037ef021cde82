//! gilrs implementation of [`InputBackend`]
//!
//! gilrs keeps every gamepad open on its own and addresses them by a stable
//! [`GamepadId`]. The native index expected by the manager is the position of
//! that id among the announced gamepads, see [`DeviceSlots`].

use super::slots::DeviceSlots;
use super::{InputBackend, JoystickInfo, NativeEvent};
use crate::gamepad::error::BackendError;
use crate::gamepad::event::{AXIS_MAX, PRESSED, RELEASED};
use crate::gamepad::mapping::MappingTable;
use gilrs::ff::{BaseEffect, BaseEffectType, Effect, EffectBuilder, Repeat, Replay, Ticks};
use gilrs::{Axis, Button, Event, EventType, Gamepad, GamepadId, Gilrs, GilrsBuilder, MappingSource};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tracing::{debug, error, info, warn};

// Controller protocol layout, same order as SDL's game controller axes.
const AXES: [Axis; 8] = [
    Axis::LeftStickX,
    Axis::LeftStickY,
    Axis::RightStickX,
    Axis::RightStickY,
    Axis::LeftZ,
    Axis::RightZ,
    Axis::DPadX,
    Axis::DPadY,
];

// Same order as SDL's game controller buttons, gilrs extras appended.
const BUTTONS: [Button; 19] = [
    Button::South,
    Button::East,
    Button::West,
    Button::North,
    Button::Select,
    Button::Mode,
    Button::Start,
    Button::LeftThumb,
    Button::RightThumb,
    Button::LeftTrigger,
    Button::RightTrigger,
    Button::DPadUp,
    Button::DPadDown,
    Button::DPadLeft,
    Button::DPadRight,
    Button::C,
    Button::Z,
    Button::LeftTrigger2,
    Button::RightTrigger2,
];

pub struct GilrsBackend {
    gilrs: Gilrs,

    // Connect events synthesized for gamepads present at startup
    pending: VecDeque<NativeEvent>,

    // Raw ids of the gamepads a DeviceAdded has been reported for
    slots: DeviceSlots<usize>,

    // Running rumble effects by raw id; dropping an effect stops it
    effects: HashMap<usize, Effect>,
}

impl GilrsBackend {
    pub fn new(mappings: &MappingTable) -> Result<Self, BackendError> {
        info!("Initializing gilrs controller interface");
        let gilrs = match GilrsBuilder::new()
            .add_mappings(&mappings.as_database())
            .build()
        {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(BackendError::Init(e.to_string()));
            }
        };

        let mut backend = Self {
            gilrs,
            pending: VecDeque::new(),
            slots: DeviceSlots::new(),
            effects: HashMap::new(),
        };

        // Devices plugged in before launch are reported like fresh connections.
        let present: Vec<(GamepadId, String)> = backend
            .gilrs
            .gamepads()
            .map(|(id, gamepad)| (id, gamepad.name().to_string()))
            .collect();
        for (id, name) in present {
            if let Some(index) = backend.slots.insert(usize::from(id)) {
                info!("  [{}] ID: {}, Name: {}", index, id, name);
            }
        }
        for index in 0..backend.slots.len() {
            backend.pending.push_back(NativeEvent::DeviceAdded { index });
        }

        Ok(backend)
    }

    fn id_at(&self, index: usize) -> Option<GamepadId> {
        let raw = self.slots.id_at(index)?;
        self.gilrs
            .gamepads()
            .map(|(id, _)| id)
            .find(|id| usize::from(*id) == raw)
    }

    fn gamepad_at(&self, index: usize) -> Option<Gamepad<'_>> {
        let id = self.id_at(index)?;
        self.gilrs.connected_gamepad(id)
    }

    // Input from a gamepad that was never announced is dropped.
    fn index_of(&self, id: GamepadId) -> Option<usize> {
        self.slots.index_of(usize::from(id))
    }

    fn translate(&mut self, id: GamepadId, event: EventType) -> Option<NativeEvent> {
        match event {
            EventType::Connected => {
                let Some(index) = self.slots.insert(usize::from(id)) else {
                    debug!("Gamepad {} already announced", id);
                    return None;
                };
                info!("Controller connected event detected");
                Some(NativeEvent::DeviceAdded { index })
            }
            EventType::Disconnected => {
                let index = self.slots.remove(usize::from(id))?;
                warn!("Controller disconnected event detected");
                Some(NativeEvent::DeviceRemoved { index })
            }
            EventType::AxisChanged(axis, value, _) => {
                let Some(raw_axis) = axis_index(axis) else {
                    debug!("Ignoring unsupported axis: {:?}", axis);
                    return None;
                };
                Some(NativeEvent::AxisMotion {
                    index: self.index_of(id)?,
                    axis: raw_axis,
                    value: quantize(axis, value),
                })
            }
            EventType::ButtonPressed(button, _) => Some(NativeEvent::ButtonDown {
                index: self.index_of(id)?,
                button: button_index(button)?,
                state: PRESSED,
            }),
            EventType::ButtonReleased(button, _) => Some(NativeEvent::ButtonUp {
                index: self.index_of(id)?,
                button: button_index(button)?,
                state: RELEASED,
            }),
            _ => None,
        }
    }
}

impl InputBackend for GilrsBackend {
    fn poll_event(&mut self) -> Option<NativeEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }

        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            if let Some(native) = self.translate(id, event) {
                return Some(native);
            }
        }

        None
    }

    fn device_count(&self) -> usize {
        self.slots.len()
    }

    fn is_game_controller(&self, index: usize) -> bool {
        self.gamepad_at(index)
            .map(|gamepad| !matches!(gamepad.mapping_source(), MappingSource::None))
            .unwrap_or(false)
    }

    fn open_controller(&mut self, index: usize) -> Result<(), BackendError> {
        // gilrs opens every device itself; only make sure it is there.
        self.gamepad_at(index)
            .map(|_| ())
            .ok_or(BackendError::DeviceNotFound(index))
    }

    fn close_controller(&mut self, index: usize) {
        // gilrs closes the device itself; only its effect is ours to drop.
        if let Some(raw) = self.slots.take_closing(index) {
            if self.effects.remove(&raw).is_some() {
                debug!("Stopped rumble on gamepad {}", raw);
            }
        }
    }

    fn inspect_joystick(&mut self, index: usize) -> Option<JoystickInfo> {
        let gamepad = self.gamepad_at(index)?;
        let guid = gamepad
            .uuid()
            .iter()
            .map(|byte| format!("{:02x}", byte))
            .collect();
        Some(JoystickInfo {
            guid,
            name: gamepad.os_name().to_string(),
        })
    }

    fn controller_name(&self, index: usize) -> Option<String> {
        self.gamepad_at(index)
            .and_then(|gamepad| gamepad.map_name().map(str::to_string))
    }

    fn joystick_name(&self, index: usize) -> Option<String> {
        self.gamepad_at(index)
            .map(|gamepad| gamepad.os_name().to_string())
    }

    fn axis_count(&self, index: usize) -> Option<usize> {
        let gamepad = self.gamepad_at(index)?;
        Some(
            AXES.iter()
                .filter(|axis| gamepad.axis_code(**axis).is_some())
                .count(),
        )
    }

    fn button_count(&self, index: usize) -> Option<usize> {
        let gamepad = self.gamepad_at(index)?;
        Some(
            BUTTONS
                .iter()
                .filter(|button| gamepad.button_code(**button).is_some())
                .count(),
        )
    }

    fn add_mapping(&mut self, _mapping: &str) -> Result<(), BackendError> {
        Err(BackendError::Unsupported(
            "gilrs only accepts mappings when it is built",
        ))
    }

    fn rumble(&mut self, index: usize, duration: Duration) -> Result<(), BackendError> {
        let id = self.id_at(index).ok_or(BackendError::DeviceNotFound(index))?;

        let supported = self
            .gilrs
            .connected_gamepad(id)
            .map(|gamepad| gamepad.is_ff_supported())
            .unwrap_or(false);
        if !supported {
            return Err(BackendError::HapticUnsupported(index));
        }

        let millis = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
        let play_for = Ticks::from_ms(millis);
        let effect = EffectBuilder::new()
            .add_effect(BaseEffect {
                kind: BaseEffectType::Strong {
                    magnitude: u16::MAX,
                },
                scheduling: Replay {
                    play_for,
                    ..Default::default()
                },
                envelope: Default::default(),
            })
            .repeat(Repeat::For(play_for))
            .gamepads(&[id])
            .finish(&mut self.gilrs)
            .map_err(|e| BackendError::Device(e.to_string()))?;

        effect
            .play()
            .map_err(|e| BackendError::Device(e.to_string()))?;
        debug!("Rumble started on gamepad {} for {}ms", id, millis);

        self.effects.insert(usize::from(id), effect);
        Ok(())
    }

    fn shutdown(&mut self) {
        info!(
            "Releasing {} gilrs gamepads and {} effects",
            self.slots.len(),
            self.effects.len()
        );
        self.effects.clear();
        self.slots.clear();
        self.pending.clear();
    }
}

fn axis_index(axis: Axis) -> Option<u8> {
    AXES.iter().position(|a| *a == axis).map(|i| i as u8)
}

fn button_index(button: Button) -> Option<u8> {
    BUTTONS.iter().position(|b| *b == button).map(|i| i as u8)
}

// gilrs reports floats with "up" positive on the Y axes; the controller
// protocol uses raw i16 with "down" positive.
fn quantize(axis: Axis, value: f32) -> i16 {
    let value = match axis {
        Axis::LeftStickY | Axis::RightStickY | Axis::DPadY => -value,
        _ => value,
    };
    (value.clamp(-1.0, 1.0) * f32::from(AXIS_MAX)).round() as i16
}
