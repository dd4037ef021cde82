//! Native index bookkeeping shared by the backends
//!
//! Native libraries identify a device by a stable id (gilrs `GamepadId`, SDL
//! instance id) while the manager addresses devices by a compacting index.
//! [`DeviceSlots`] holds the ids of every announced device, opened or not, in
//! ascending order; a device's index is its position in that list.
//!
//! The manager closes a device only after the removal has been reported, when
//! the index already belongs to the next device. The removed id is therefore
//! kept until that close call claims it.

#[derive(Debug, Clone)]
pub struct DeviceSlots<K> {
    ids: Vec<K>,
    removed: Option<(usize, K)>,
}

impl<K> Default for DeviceSlots<K> {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            removed: None,
        }
    }
}

impl<K: Copy + Ord> DeviceSlots<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Announces a device. Returns its index, or `None` if it was already known.
    pub fn insert(&mut self, id: K) -> Option<usize> {
        match self.ids.binary_search(&id) {
            Ok(_) => None,
            Err(index) => {
                self.ids.insert(index, id);
                Some(index)
            }
        }
    }

    /// Forgets a device. Returns the index it had, or `None` if it was unknown.
    pub fn remove(&mut self, id: K) -> Option<usize> {
        let index = self.ids.binary_search(&id).ok()?;
        self.ids.remove(index);
        self.removed = Some((index, id));
        Some(index)
    }

    pub fn index_of(&self, id: K) -> Option<usize> {
        self.ids.binary_search(&id).ok()
    }

    pub fn id_at(&self, index: usize) -> Option<K> {
        self.ids.get(index).copied()
    }

    /// Id to release for a close at `index`: the device just removed from that
    /// index if there is one, otherwise the device currently there.
    pub fn take_closing(&mut self, index: usize) -> Option<K> {
        match self.removed.take() {
            Some((removed_index, id)) if removed_index == index => Some(id),
            _ => self.id_at(index),
        }
    }

    pub fn contains(&self, id: K) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[K] {
        &self.ids
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.removed = None;
    }
}
