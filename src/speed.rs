//! Displacement-based speed estimation.
//!
//! Speed is the pixel distance between the two most recent centroids of a
//! track, scaled by a fixed pixel-per-meter ratio and divided by the time
//! between the samples. The ratio is not calibrated against the scene, so the
//! result is a relative measure rather than a metric one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::history::TrackHistory;
use crate::TrackId;
use nalgebra as na;

pub const DEFAULT_PIXEL_PER_METER: f32 = 8.0;

const MPS_TO_KMH: f64 = 3.6;

/// Source of sample timestamps, in seconds.
pub trait Clock {
    fn now(&self) -> f64;
}

/// Monotonic wall-clock time since construction.
#[derive(Debug, Clone)]
pub struct WallClock {
    origin: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for WallClock {
    #[inline]
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Clock driven by its owner; clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        let clock = Self::default();
        clock.set(start);
        clock
    }

    #[inline]
    pub fn set(&self, secs: f64) {
        self.bits.store(secs.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub fn advance(&self, secs: f64) {
        self.set(self.now() + secs);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

pub struct SpeedEstimator<C: Clock = WallClock> {
    pixel_per_meter: f32,
    history: TrackHistory,
    clock: C,
}

impl SpeedEstimator<WallClock> {
    pub fn new(pixel_per_meter: f32) -> Self {
        Self::with_clock(pixel_per_meter, WallClock::new())
    }
}

impl Default for SpeedEstimator<WallClock> {
    fn default() -> Self {
        Self::new(DEFAULT_PIXEL_PER_METER)
    }
}

impl<C: Clock> SpeedEstimator<C> {
    pub fn with_clock(pixel_per_meter: f32, clock: C) -> Self {
        Self {
            pixel_per_meter,
            history: TrackHistory::new(),
            clock,
        }
    }

    /// Records the centroid at the current clock time and returns the speed
    /// in km/h. The first sighting of a track always yields 0.
    pub fn estimate(&mut self, track_id: TrackId, x: f32, y: f32) -> f32 {
        let ts = self.clock.now();
        self.estimate_at(track_id, x, y, ts)
    }

    pub fn estimate_at(&mut self, track_id: TrackId, x: f32, y: f32, ts: f64) -> f32 {
        self.history.push(track_id, ts, na::Point2::new(x, y));

        let (dist_px, dt) = match self.history.displacement(track_id) {
            Some(d) => d,
            None => return 0.0,
        };

        if dt == 0.0 {
            return 0.0;
        }

        let meters = dist_px as f64 / self.pixel_per_meter as f64;

        (meters / dt * MPS_TO_KMH) as f32
    }

    /// Number of distinct tracks holding history.
    #[inline]
    pub fn tracked_count(&self) -> usize {
        self.history.tracked_count()
    }

    #[inline]
    pub fn set_frame(&mut self, frame: u64) {
        self.history.set_frame(frame);
    }

    #[inline]
    pub fn evict_idle(&mut self, now: u64, max_idle: u64) -> usize {
        self.history.evict_idle(now, max_idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn one_meter_per_second_is_3_6_kmh() {
        let mut est = SpeedEstimator::new(8.0);
        assert_eq!(est.estimate_at(1, 0.0, 0.0, 10.0), 0.0);
        assert_eq!(est.estimate_at(1, 8.0, 0.0, 11.0), 3.6);
    }

    #[test]
    fn first_sighting_is_zero() {
        let mut est = SpeedEstimator::default();
        assert_eq!(est.estimate(42, 500.0, 300.0), 0.0);
        assert_eq!(est.estimate(43, -1.0, 1e6), 0.0);
    }

    #[test]
    fn identical_timestamps_give_zero() {
        let clock = ManualClock::new(5.0);
        let mut est = SpeedEstimator::with_clock(8.0, clock.clone());
        est.estimate(1, 0.0, 0.0);
        assert_eq!(est.estimate(1, 80.0, 60.0), 0.0);

        clock.advance(0.5);
        // 100 px -> 12.5 m in 0.5 s -> 25 m/s
        assert_abs_diff_eq!(est.estimate(1, 0.0, 0.0), 90.0, epsilon = 1e-3);
    }

    #[test]
    fn uses_only_last_two_samples() {
        let mut est = SpeedEstimator::new(1.0);
        est.estimate_at(7, 0.0, 0.0, 0.0);
        est.estimate_at(7, 1000.0, 0.0, 1.0);
        let kmh = est.estimate_at(7, 1000.0, 10.0, 2.0);
        assert_abs_diff_eq!(kmh, 36.0, epsilon = 1e-4);
    }

    #[test]
    fn history_grows_per_distinct_track() {
        let mut est = SpeedEstimator::default();
        for id in 0..50 {
            est.estimate_at(id, 0.0, 0.0, 0.0);
            est.estimate_at(id, 1.0, 0.0, 1.0);
        }
        assert_eq!(est.tracked_count(), 50);

        est.set_frame(100);
        est.estimate_at(0, 2.0, 0.0, 2.0);
        assert_eq!(est.evict_idle(100, 10), 49);
        assert_eq!(est.tracked_count(), 1);
    }
}
