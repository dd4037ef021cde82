pub mod config;
pub mod gamepad;
