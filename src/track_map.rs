use std::collections::HashMap;

use crate::TrackId;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    last_seen: u64,
}

/// Per-track state keyed by tracker id, remembering the frame in which each
/// id was last touched so idle ids can be dropped.
#[derive(Debug, Clone)]
pub struct TrackMap<V> {
    entries: HashMap<TrackId, Entry<V>>,
    frame: u64,
}

impl<V> Default for TrackMap<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            frame: 0,
        }
    }
}

impl<V> TrackMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame index stamped on entries touched from now on.
    #[inline]
    pub fn set_frame(&mut self, frame: u64) {
        self.frame = frame;
    }

    #[inline]
    pub fn get(&self, id: TrackId) -> Option<&V> {
        self.entries.get(&id).map(|e| &e.value)
    }

    pub fn get_or_insert_with<F: FnOnce() -> V>(&mut self, id: TrackId, f: F) -> &mut V {
        let frame = self.frame;
        let entry = self.entries.entry(id).or_insert_with(|| Entry {
            value: f(),
            last_seen: frame,
        });
        entry.last_seen = frame;

        &mut entry.value
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TrackId, &V)> {
        self.entries.iter().map(|(id, e)| (*id, &e.value))
    }

    /// Drops ids untouched for more than `max_idle` frames before `now`.
    /// Returns how many were dropped.
    pub fn evict_idle(&mut self, now: u64, max_idle: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| now.saturating_sub(e.last_seen) <= max_idle);

        before - self.entries.len()
    }
}
