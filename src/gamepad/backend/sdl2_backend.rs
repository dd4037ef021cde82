//! SDL2 implementation of [`InputBackend`]
//!
//! SDL reports connections by device index and everything afterwards by
//! instance id. Every joystick, mapped or not, takes a slot keyed by its
//! instance id; SDL hands out instance ids in connection order, so slot
//! positions line up with SDL's device indices.

use super::slots::DeviceSlots;
use super::{InputBackend, JoystickInfo, NativeEvent};
use crate::gamepad::error::BackendError;
use crate::gamepad::event::{PRESSED, RELEASED};
use crate::gamepad::mapping::MappingTable;
use sdl2::controller::GameController;
use sdl2::event::Event;
use sdl2::haptic::Haptic;
use sdl2::{EventPump, GameControllerSubsystem, HapticSubsystem, JoystickSubsystem, Sdl};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const BACKGROUND_EVENTS_HINT: &str = "SDL_JOYSTICK_ALLOW_BACKGROUND_EVENTS";

pub struct Sdl2Backend {
    context: Sdl,
    joystick: JoystickSubsystem,
    controller: GameControllerSubsystem,
    haptic: Option<HapticSubsystem>,
    event_pump: EventPump,

    // Instance ids of every announced joystick
    slots: DeviceSlots<u32>,

    // Open controllers by instance id
    controllers: HashMap<u32, GameController>,

    // Haptic handles by instance id; closing one stops its effect
    haptics: HashMap<u32, Haptic>,
}

impl Sdl2Backend {
    pub fn new(mappings: &MappingTable, allow_background_events: bool) -> Result<Self, BackendError> {
        if allow_background_events {
            sdl2::hint::set(BACKGROUND_EVENTS_HINT, "1");
        }

        info!("Initializing SDL joystick and game controller subsystems");
        let context = sdl2::init().map_err(init_error)?;
        let joystick = context.joystick().map_err(init_error)?;
        let controller = context.game_controller().map_err(init_error)?;
        let event_pump = context.event_pump().map_err(init_error)?;

        joystick.set_event_state(true);
        controller.set_event_state(true);

        let mut registered = 0;
        for line in mappings.entries() {
            match controller.add_mapping(line) {
                Ok(_) => registered += 1,
                Err(e) => debug!("Skipping mapping line: {}", e),
            }
        }
        info!("Registered {} community mappings with SDL", registered);

        Ok(Self {
            context,
            joystick,
            controller,
            haptic: None,
            event_pump,
            slots: DeviceSlots::new(),
            controllers: HashMap::new(),
            haptics: HashMap::new(),
        })
    }

    // Controller device events are skipped: every device, controller or not,
    // also raises the joystick variant, and a synthesized mapping raises a
    // second ControllerDeviceAdded for a device that is already announced.
    fn translate(&mut self, event: Event) -> Option<NativeEvent> {
        match event {
            Event::JoyDeviceAdded { which, .. } => {
                let instance = match self.joystick.open(which) {
                    Ok(js) => js.instance_id(),
                    Err(e) => {
                        warn!("Joystick {} vanished before it was announced: {}", which, e);
                        return None;
                    }
                };
                let index = self.slots.insert(instance)?;
                Some(NativeEvent::DeviceAdded { index })
            }
            Event::JoyDeviceRemoved { which, .. } => Some(NativeEvent::DeviceRemoved {
                index: self.slots.remove(which)?,
            }),
            Event::ControllerAxisMotion {
                which, axis, value, ..
            } => Some(NativeEvent::AxisMotion {
                index: self.slots.index_of(which)?,
                axis: axis as u8,
                value,
            }),
            Event::ControllerButtonDown { which, button, .. } => Some(NativeEvent::ButtonDown {
                index: self.slots.index_of(which)?,
                button: button as u8,
                state: PRESSED,
            }),
            Event::ControllerButtonUp { which, button, .. } => Some(NativeEvent::ButtonUp {
                index: self.slots.index_of(which)?,
                button: button as u8,
                state: RELEASED,
            }),
            _ => None,
        }
    }
}

impl InputBackend for Sdl2Backend {
    fn poll_event(&mut self) -> Option<NativeEvent> {
        while let Some(event) = self.event_pump.poll_event() {
            if let Some(native) = self.translate(event) {
                return Some(native);
            }
        }
        None
    }

    fn device_count(&self) -> usize {
        self.slots.len()
    }

    fn is_game_controller(&self, index: usize) -> bool {
        self.controller.is_game_controller(index as u32)
    }

    fn open_controller(&mut self, index: usize) -> Result<(), BackendError> {
        let controller = self
            .controller
            .open(index as u32)
            .map_err(|e| BackendError::Device(e.to_string()))?;
        debug!(
            "Opened controller {} (instance {})",
            controller.name(),
            controller.instance_id()
        );
        self.controllers.insert(controller.instance_id(), controller);
        Ok(())
    }

    fn close_controller(&mut self, index: usize) {
        if let Some(instance) = self.slots.take_closing(index) {
            if self.controllers.remove(&instance).is_some() {
                debug!("Closed controller instance {}", instance);
            }
            self.haptics.remove(&instance);
        }
    }

    fn inspect_joystick(&mut self, index: usize) -> Option<JoystickInfo> {
        // Dropped at the end of this call, which closes it again.
        let js = self.joystick.open(index as u32).ok()?;
        Some(JoystickInfo {
            guid: js.guid().string(),
            name: js.name(),
        })
    }

    fn controller_name(&self, index: usize) -> Option<String> {
        self.controller.name_for_index(index as u32).ok()
    }

    fn joystick_name(&self, index: usize) -> Option<String> {
        self.joystick.name_for_index(index as u32).ok()
    }

    fn axis_count(&self, index: usize) -> Option<usize> {
        let js = self.joystick.open(index as u32).ok()?;
        Some(js.num_axes() as usize)
    }

    fn button_count(&self, index: usize) -> Option<usize> {
        let js = self.joystick.open(index as u32).ok()?;
        Some(js.num_buttons() as usize)
    }

    fn add_mapping(&mut self, mapping: &str) -> Result<(), BackendError> {
        self.controller
            .add_mapping(mapping)
            .map(|_| ())
            .map_err(|e| BackendError::Mapping(e.to_string()))
    }

    fn rumble(&mut self, index: usize, duration: Duration) -> Result<(), BackendError> {
        let instance = self
            .slots
            .id_at(index)
            .ok_or(BackendError::DeviceNotFound(index))?;

        if self.haptic.is_none() {
            match self.context.haptic() {
                Ok(subsystem) => self.haptic = Some(subsystem),
                Err(e) => {
                    warn!("Haptic subsystem unavailable: {}", e);
                    return Err(BackendError::HapticUnsupported(index));
                }
            }
        }
        let Some(subsystem) = self.haptic.as_ref() else {
            return Err(BackendError::HapticUnsupported(index));
        };

        // Opening from a joystick also initializes rumble on the device.
        let mut haptic = subsystem
            .open_from_joystick_id(index as u32)
            .map_err(|_| BackendError::HapticUnsupported(index))?;

        let millis = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
        haptic.rumble_play(1.0, millis);
        self.haptics.insert(instance, haptic);
        Ok(())
    }

    fn shutdown(&mut self) {
        info!("Closing {} SDL controllers", self.controllers.len());
        self.haptics.clear();
        self.controllers.clear();
        self.slots.clear();
        // The subsystems and the SDL context shut down when the backend drops.
    }
}

fn init_error(e: String) -> BackendError {
    error!("SDL Init Error: {}", e);
    BackendError::Init(e)
}
