//! Error types for the gamepad subsystem

use crate::config::ConfigError;

/// Errors reported by an [`InputBackend`](super::backend::InputBackend)
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The native library could not be brought up
    #[error("Failed to initialize input backend: {0}")]
    Init(String),

    /// The device has no force feedback / haptic capability
    #[error("Device {0} has no haptic support")]
    HapticUnsupported(usize),

    /// A mapping string was rejected by the backend
    #[error("Mapping rejected: {0}")]
    Mapping(String),

    /// No device is connected at the given native index
    #[error("No device at native index {0}")]
    DeviceNotFound(usize),

    /// The backend has no way to perform the requested operation
    #[error("Operation not supported by this backend: {0}")]
    Unsupported(&'static str),

    /// Any other device level failure (open, play effect, ...)
    #[error("Device error: {0}")]
    Device(String),
}

/// Errors surfaced by the gamepad service
#[derive(Debug, thiserror::Error)]
pub enum GamepadError {
    /// Fatal: there is no degraded mode without input
    #[error("Backend initialization failed: {0}")]
    BackendInit(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// The poll thread is gone or a reply was dropped
    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Thread error: {0}")]
    ThreadError(String),
}
