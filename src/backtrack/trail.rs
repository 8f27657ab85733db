/// A sequence of events representing the changes made to a data structure,
/// together with save points to which the structure can be restored.
///
/// Every mutation of the owning structure must be recorded here; undoing is
/// done by replaying events in reverse through a caller-provided callback.
#[derive(Clone)]
pub struct Trail<Event> {
    events: Vec<Event>,
    saved_states: Vec<usize>,
}

impl<Event> Default for Trail<Event> {
    fn default() -> Self {
        Trail {
            events: Vec::new(),
            saved_states: Vec::new(),
        }
    }
}

impl<Event> Trail<Event> {
    pub fn push(&mut self, e: Event) {
        self.events.push(e);
    }

    /// Number of events currently recorded. Used to undo the suffix of an
    /// operation that was interrupted midway.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn save_state(&mut self) -> u32 {
        self.saved_states.push(self.events.len());
        self.saved_states.len() as u32 - 1
    }

    pub fn num_saved(&self) -> u32 {
        self.saved_states.len() as u32
    }

    /// Undoes all events recorded after the latest save point, most recent first.
    pub fn restore_last_with(&mut self, mut undo: impl FnMut(Event)) {
        let target = self.saved_states.pop().expect("No saved state to restore");
        self.undo_to_len_with(target, &mut undo);
    }

    /// Undoes events, most recent first, until only `len` events remain.
    ///
    /// `len` must not be below the latest save point.
    pub fn undo_to_len_with(&mut self, len: usize, mut undo: impl FnMut(Event)) {
        debug_assert!(self.saved_states.last().map_or(true, |&s| s <= len));
        while self.events.len() > len {
            let e = self.events.pop().unwrap();
            undo(e);
        }
    }
}
