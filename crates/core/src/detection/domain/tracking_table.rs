use std::collections::HashMap;

use crate::shared::constants::FIRST_TRACKING_ID;

use super::raw_observation::TrackingHandle;

/// Maps detector tracking handles to pipeline-assigned IDs.
///
/// IDs are handed out in increasing order and never reused while the
/// table lives; a session owns exactly one table.
pub struct TrackingTable {
    ids: HashMap<TrackingHandle, u32>,
    next_id: u32,
}

impl TrackingTable {
    pub fn new() -> Self {
        Self {
            ids: HashMap::new(),
            next_id: FIRST_TRACKING_ID,
        }
    }

    /// Returns the ID for `handle`, assigning the next one on first sight.
    pub fn resolve(&mut self, handle: TrackingHandle) -> u32 {
        if let Some(&id) = self.ids.get(&handle) {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.ids.insert(handle, id);
        id
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Forgets all handles and restarts numbering.
    pub fn clear(&mut self) {
        self.ids.clear();
        self.next_id = FIRST_TRACKING_ID;
    }
}

impl Default for TrackingTable {
    fn default() -> Self {
        Self::new()
    }
}
