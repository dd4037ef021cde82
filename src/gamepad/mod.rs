//! Gamepad subsystem for driver station input
//!
//! Reads game controllers through a native backend and republishes their input
//! as value records:
//!
//! 1. [`backend`] - Native library adapter (gilrs, optionally SDL2)
//! 2. [`mapping`] - Community database and generic mapping templates
//! 3. [`identity`] - Native index to logical joystick id
//! 4. [`event`] - Normalized records delivered to listeners
//! 5. [`manager`] - Single owner of the backend, dispatches native events
//! 6. [`poll`] - Self-rescheduling poll loop
//! 7. [`handle`] - Cross-thread query and control API
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────── gamepad-poll thread ────────────┐
//! Device ──► InputBackend ──► GamepadManager ──► PollLoop       │
//!                 └───────────────┬──────────────────▲──────────┘
//!                                 │ broadcast        │ mpsc + oneshot
//!                                 ▼                  │
//!                           GamepadEvent ◄──── GamepadHandle
//! ```
//!
//! Devices are polled every 20ms by default, after a 500ms startup delay.

pub mod backend;
pub mod error;
pub mod event;
pub mod handle;
pub mod identity;
pub mod manager;
pub mod mapping;
pub mod poll;

pub use error::{BackendError, GamepadError};
pub use event::{AxisEvent, ButtonEvent, DeviceList, GamepadEvent, Joystick};
pub use handle::GamepadHandle;
pub use manager::GamepadManager;
