//! Logical joystick ids
//!
//! The native backend only exposes devices through a compacting `0..N-1` index
//! that shifts whenever a device goes away. The resolver turns that index into
//! the id the rest of the application works with, so that the most recently
//! connected device tends to get the highest id.
//!
//! The arithmetic is an approximation, not a bijection: disconnecting devices
//! out of order can renumber the ids of the remaining ones. Dependent UI code
//! relies on this exact renumbering, so it is kept as is.

use tracing::debug;

#[derive(Debug, Clone)]
pub struct IdentityResolver {
    tracker: i32,
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self { tracker: -1 }
    }
}

impl IdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Must be called once per device-added event, before resolving it
    pub fn on_device_added(&mut self) {
        self.tracker += 1;
        debug!("Connection tracker advanced to {}", self.tracker);
    }

    pub fn tracker(&self) -> i32 {
        self.tracker
    }

    /// Maps a native index to a logical id given the current live device count
    pub fn resolve(&self, raw_index: usize, live_count: usize) -> i32 {
        let raw_index = raw_index as i32;
        let live_count = live_count as i32;

        let mut id = self.tracker - (raw_index + 1);
        if id < 0 {
            id = id.abs();
        }
        if id >= live_count {
            id -= 1;
        }

        id
    }
}
