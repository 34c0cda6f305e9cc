//! Line-crossing vehicle counter.
//!
//! A horizontal line at `line_y` splits the frame. Every track keeps its two
//! latest centroid rows; when they straddle the line strictly, the track is
//! counted once, as `out` when moving down the image and `in` when moving up.

use std::collections::BTreeMap;

use serde_derive::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bbox::{BBox, Ltrb};
use crate::circular_queue::CircularQueue;
use crate::classes::class_name;
use crate::track_map::TrackMap;
use crate::{ClassId, TrackId};

const WINDOW: usize = 2;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterStats {
    #[serde(rename = "in")]
    pub in_count: u64,
    #[serde(rename = "out")]
    pub out_count: u64,
    pub by_class_in: BTreeMap<String, u64>,
    pub by_class_out: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossing {
    In,
    Out,
}

#[derive(Debug, Clone)]
struct TrackState {
    rows: CircularQueue<i32>,
    counted: bool,
}

impl TrackState {
    fn new() -> Self {
        Self {
            rows: CircularQueue::with_capacity(WINDOW),
            counted: false,
        }
    }
}

#[derive(Debug)]
pub struct LineCounter {
    line_y: i32,
    tracks: TrackMap<TrackState>,
    stats: CounterStats,
}

impl LineCounter {
    /// Counter for a frame of the given height. The line defaults to the
    /// vertical midpoint.
    pub fn new(frame_height: i32, line_y: Option<i32>) -> Self {
        Self {
            line_y: line_y.unwrap_or(frame_height / 2),
            tracks: TrackMap::new(),
            stats: CounterStats::default(),
        }
    }

    #[inline]
    pub fn line_y(&self) -> i32 {
        self.line_y
    }

    pub fn process(&mut self, boxes: &[BBox<Ltrb>], ids: &[TrackId], classes: &[ClassId]) {
        if boxes.len() != ids.len() || boxes.len() != classes.len() {
            warn!(
                boxes = boxes.len(),
                ids = ids.len(),
                classes = classes.len(),
                "mismatched detection slices, extra entries ignored"
            );
        }

        for ((bbox, &id), &class) in boxes.iter().zip(ids).zip(classes) {
            let (_, cy) = bbox.pixel_centroid();

            if let Some(crossing) = self.observe(id, cy) {
                self.record(id, class, crossing);
            }
        }
    }

    fn observe(&mut self, id: TrackId, cy: i32) -> Option<Crossing> {
        let line_y = self.line_y;
        let state = self.tracks.get_or_insert_with(id, TrackState::new);
        state.rows.push(cy);

        if state.counted {
            return None;
        }

        let (&prev, &curr) = state.rows.last_pair()?;
        let crossing = if prev < line_y && curr > line_y {
            Crossing::Out
        } else if prev > line_y && curr < line_y {
            Crossing::In
        } else {
            return None;
        };

        state.counted = true;
        Some(crossing)
    }

    fn record(&mut self, id: TrackId, class: ClassId, crossing: Crossing) {
        let name = class_name(class);
        let (total, by_class) = match crossing {
            Crossing::In => (&mut self.stats.in_count, &mut self.stats.by_class_in),
            Crossing::Out => (&mut self.stats.out_count, &mut self.stats.by_class_out),
        };

        *total += 1;
        *by_class.entry(name.to_string()).or_insert(0) += 1;

        debug!(track_id = id, class = name, ?crossing, "line crossed");
    }

    #[inline]
    pub fn is_counted(&self, id: TrackId) -> bool {
        self.tracks.get(id).map_or(false, |s| s.counted)
    }

    /// `(in, out)` totals.
    #[inline]
    pub fn totals(&self) -> (u64, u64) {
        (self.stats.in_count, self.stats.out_count)
    }

    #[inline]
    pub fn stats(&self) -> CounterStats {
        self.stats.clone()
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

    // Box whose centroid row is `cy`.
    fn at(cy: f32) -> BBox<Ltrb> {
        BBox::ltrb(100.0, cy - 10.0, 140.0, cy + 10.0)
    }

    fn feed(counter: &mut LineCounter, frames: &[&[(f32, TrackId, ClassId)]]) {
        for frame in frames {
            let boxes: Vec<_> = frame.iter().map(|(cy, _, _)| at(*cy)).collect();
            let ids: Vec<_> = frame.iter().map(|(_, id, _)| *id).collect();
            let classes: Vec<_> = frame.iter().map(|(_, _, c)| *c).collect();
            counter.process(&boxes, &ids, &classes);
        }
    }

    #[test]
    fn line_defaults_to_midpoint() {
        assert_eq!(LineCounter::new(540, None).line_y(), 270);
        assert_eq!(LineCounter::new(541, None).line_y(), 270);
        assert_eq!(LineCounter::new(540, Some(100)).line_y(), 100);
    }

    #[test]
    fn three_tracks_one_down_one_up_one_idle() {
        let mut counter = LineCounter::new(200, None);
        feed(
            &mut counter,
            &[
                &[(50.0, 1, 2), (150.0, 2, 7), (20.0, 3, 3)],
                &[(150.0, 1, 2), (50.0, 2, 7), (40.0, 3, 3)],
                &[(160.0, 1, 2), (40.0, 2, 7), (60.0, 3, 3)],
            ],
        );

        let stats = counter.stats();
        assert_eq!(stats.out_count, 1);
        assert_eq!(stats.in_count, 1);
        assert_eq!(stats.by_class_out.get("car"), Some(&1));
        assert_eq!(stats.by_class_in.get("truck"), Some(&1));
        assert_eq!(stats.by_class_in.get("motorcycle"), None);
        assert_eq!(stats.by_class_out.get("motorcycle"), None);
        assert!(counter.is_counted(1));
        assert!(counter.is_counted(2));
        assert!(!counter.is_counted(3));
    }

    #[test]
    fn single_crossing_touches_one_direction_and_class() {
        let mut counter = LineCounter::new(100, None);
        feed(&mut counter, &[&[(10.0, 5, 5)], &[(90.0, 5, 5)]]);

        let stats = counter.stats();
        assert_eq!(counter.totals(), (0, 1));
        assert_eq!(stats.by_class_out.len(), 1);
        assert_eq!(stats.by_class_out["bus"], 1);
        assert!(stats.by_class_in.is_empty());
    }

    #[test]
    fn oscillating_track_counted_once() {
        let mut counter = LineCounter::new(100, None);
        feed(
            &mut counter,
            &[
                &[(10.0, 1, 2)],
                &[(90.0, 1, 2)],
                &[(10.0, 1, 2)],
                &[(90.0, 1, 2)],
                &[(10.0, 1, 2)],
            ],
        );

        assert_eq!(counter.totals(), (0, 1));
        assert!(counter.is_counted(1));
    }

    #[test]
    fn touching_the_line_is_not_a_crossing() {
        let mut counter = LineCounter::new(100, None);
        feed(
            &mut counter,
            &[&[(10.0, 1, 2)], &[(50.0, 1, 2)], &[(90.0, 1, 2)]],
        );

        assert_eq!(counter.totals(), (0, 0));
        assert!(!counter.is_counted(1));
    }

    #[test]
    fn unknown_class_counts_as_other() {
        let mut counter = LineCounter::new(100, None);
        feed(&mut counter, &[&[(80.0, 1, 0)], &[(20.0, 1, 0)]]);

        assert_eq!(counter.stats().by_class_in["other"], 1);
    }

    #[test]
    fn mismatched_slices_use_common_prefix() {
        let mut counter = LineCounter::new(100, None);
        counter.process(&[at(10.0), at(10.0)], &[1, 2], &[2]);
        counter.process(&[at(90.0), at(90.0)], &[1, 2], &[2]);

        assert_eq!(counter.totals(), (0, 1));
        assert!(!counter.is_counted(2));
    }

    #[test]
    fn serializes_with_short_keys() {
        let mut counter = LineCounter::new(100, None);
        feed(&mut counter, &[&[(10.0, 1, 3)], &[(90.0, 1, 3)]]);

        let json = serde_json::to_value(counter.stats()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "in": 0,
                "out": 1,
                "by_class_in": {},
                "by_class_out": {"motorcycle": 1}
            })
        );
    }
}
