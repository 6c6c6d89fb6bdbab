//! Round-robin turn order across active trackers

use crate::types::TrackerId;
use std::collections::BTreeSet;

/// Returns the tracker whose turn it is to fetch next
///
/// Restarts at the smallest active id when there is no previous holder or the
/// previous holder is gone. Otherwise picks the next larger active id,
/// wrapping around. `None` only when no tracker is active.
pub fn next_turn_holder(
    active: &BTreeSet<TrackerId>,
    last_holder: Option<TrackerId>,
) -> Option<TrackerId> {
    let first = active.iter().next().copied();

    match last_holder {
        Some(last) if active.contains(&last) => active
            .range((std::ops::Bound::Excluded(last), std::ops::Bound::Unbounded))
            .next()
            .copied()
            .or(first),
        _ => first,
    }
}

/// Returns true if `tracker` holds the next turn
pub fn is_my_turn(
    tracker: TrackerId,
    active: &BTreeSet<TrackerId>,
    last_holder: Option<TrackerId>,
) -> bool {
    next_turn_holder(active, last_holder) == Some(tracker)
}

/// Active tracker ids and the counter that hands them out
#[derive(Debug, Default)]
pub struct FairnessSequencer {
    next_id: u64,
    active: BTreeSet<TrackerId>,
}

impl FairnessSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns a fresh id and marks it active
    pub fn register(&mut self) -> TrackerId {
        let id = TrackerId(self.next_id);
        self.next_id += 1;
        self.active.insert(id);
        id
    }

    /// Removes an id from the active set
    ///
    /// Returns false if the id was not active.
    pub fn unregister(&mut self, id: TrackerId) -> bool {
        self.active.remove(&id)
    }

    pub fn is_active(&self, id: TrackerId) -> bool {
        self.active.contains(&id)
    }

    pub fn active(&self) -> &BTreeSet<TrackerId> {
        &self.active
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
