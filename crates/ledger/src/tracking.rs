//! Dirty tracking shared by every cache.

/// Two-state save machine: clean after a load or a save, dirty after any
/// mutation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SaveState {
    dirty: bool,
}

impl SaveState {
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn set_saved(&mut self) {
        self.dirty = false;
    }

    #[must_use]
    pub fn must_be_saved(self) -> bool {
        self.dirty
    }
}

/// A cache that can be bulk saved and wiped.
pub trait Cache {
    fn save_state(&self) -> &SaveState;

    fn save_state_mut(&mut self) -> &mut SaveState;

    /// Drops every stored record. Always leaves the cache dirty.
    fn erase(&mut self);

    /// `true` if mutations happened since the last load or save.
    fn must_be_saved(&self) -> bool {
        self.save_state().must_be_saved()
    }

    /// Call once the store confirmed the write.
    fn set_saved(&mut self) {
        self.save_state_mut().set_saved();
    }
}
