use crate::circular_queue::CircularQueue;
use crate::track_map::TrackMap;
use crate::TrackId;
use nalgebra as na;

const WINDOW: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub pos: na::Point2<f32>,
    // in seconds
    pub ts: f64,
}

/// Rolling window of the most recent centroid samples of every track.
#[derive(Debug, Default)]
pub struct TrackHistory {
    tracks: TrackMap<CircularQueue<Sample>>,
}

impl TrackHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: TrackId, ts: f64, pos: na::Point2<f32>) {
        self.tracks
            .get_or_insert_with(id, || CircularQueue::with_capacity(WINDOW))
            .push(Sample { pos, ts });
    }

    #[inline]
    pub fn last_pair(&self, id: TrackId) -> Option<(&Sample, &Sample)> {
        self.tracks.get(id)?.last_pair()
    }

    /// Pixel distance and elapsed seconds between the two latest samples.
    pub fn displacement(&self, id: TrackId) -> Option<(f32, f64)> {
        let (prev, curr) = self.last_pair(id)?;

        Some((na::distance(&prev.pos, &curr.pos), curr.ts - prev.ts))
    }

    #[inline]
    pub fn tracked_count(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn set_frame(&mut self, frame: u64) {
        self.tracks.set_frame(frame);
    }

    #[inline]
    pub fn evict_idle(&mut self, now: u64, max_idle: u64) -> usize {
        self.tracks.evict_idle(now, max_idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn keeps_two_latest_samples() {
        let mut history = TrackHistory::new();
        history.push(1, 0.0, na::Point2::new(0.0, 0.0));
        assert!(history.displacement(1).is_none());

        history.push(1, 1.0, na::Point2::new(3.0, 4.0));
        history.push(1, 3.0, na::Point2::new(9.0, 12.0));

        let (prev, curr) = history.last_pair(1).unwrap();
        assert_eq!(prev.ts, 1.0);
        assert_eq!(curr.ts, 3.0);
        let (dist, dt) = history.displacement(1).unwrap();
        assert_abs_diff_eq!(dist, 10.0);
        assert_abs_diff_eq!(dt, 2.0);
    }

    #[test]
    fn tracks_are_independent() {
        let mut history = TrackHistory::new();
        history.push(1, 0.0, na::Point2::new(0.0, 0.0));
        history.push(2, 0.5, na::Point2::new(1.0, 1.0));

        assert_eq!(history.tracked_count(), 2);
        assert!(history.last_pair(1).is_none());
        assert!(history.last_pair(3).is_none());
    }
}
