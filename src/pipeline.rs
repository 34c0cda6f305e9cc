use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::bbox::{BBox, Ltrb};
use crate::config::Config;
use crate::counter::LineCounter;
use crate::detection::Detection;
use crate::ocr::TextRecognizer;
use crate::plate::{Crop, PlateReader};
use crate::speed::{Clock, SpeedEstimator};
use crate::summary::Summary;
use crate::{ClassId, TrackId};

#[derive(Debug, Clone, PartialEq)]
pub struct VehicleAnnotation {
    pub bbox: BBox<Ltrb>,
    pub track_id: TrackId,
    pub class: ClassId,
    pub speed_kmh: f32,
    pub plate: Option<String>,
}

impl VehicleAnnotation {
    pub fn label(&self) -> String {
        format!("ID {} | {} km/h", self.track_id, self.speed_kmh as i32)
    }
}

/// Everything needed to draw one output frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameAnnotations {
    pub frame_idx: u64,
    /// Whether the frame went through the tracker.
    pub sampled: bool,
    pub vehicles: Vec<VehicleAnnotation>,
    pub line_y: i32,
    /// `(in, out)` after this frame.
    pub totals: (u64, u64),
}

/// Drives the counter, the speed estimator and the plate reader over the
/// tracked detections of successive frames.
pub struct Monitor<R, C: Clock> {
    counter: LineCounter,
    speed: SpeedEstimator<C>,
    plates: PlateReader<R>,
    results: BTreeMap<TrackId, String>,
    frame_skip: u64,
    max_idle_frames: Option<u64>,
    sampled_frames: u64,
}

impl<R, C: Clock> Monitor<R, C> {
    pub fn new(config: &Config, frame_height: i32, recognizer: R, clock: C) -> Self {
        let plates = PlateReader::new(recognizer)
            .with_length(config.plate_min_len, config.plate_max_len)
            .with_max_attempts(config.plate_max_attempts);

        Self {
            counter: LineCounter::new(frame_height, config.line_y),
            speed: SpeedEstimator::with_clock(config.pixel_per_meter, clock),
            plates,
            results: BTreeMap::new(),
            frame_skip: config.frame_skip.max(1),
            max_idle_frames: config.max_idle_frames,
            sampled_frames: 0,
        }
    }

    /// Frames are numbered from 1; every `frame_skip`-th one is sampled.
    #[inline]
    pub fn is_sampled(&self, frame_idx: u64) -> bool {
        frame_idx % self.frame_skip == 0
    }

    #[inline]
    pub fn counter(&self) -> &LineCounter {
        &self.counter
    }

    #[inline]
    pub fn plate_reader(&self) -> &PlateReader<R> {
        &self.plates
    }

    #[inline]
    pub fn sampled_frames(&self) -> u64 {
        self.sampled_frames
    }

    pub fn plate(&self, track_id: TrackId) -> Option<&str> {
        self.results.get(&track_id).map(String::as_str)
    }

    pub fn process_frame<F>(
        &mut self,
        frame_idx: u64,
        frame: &F,
        detections: &[Detection],
    ) -> FrameAnnotations
    where
        F: Crop,
        R: TextRecognizer<F::Output>,
    {
        let sampled = self.is_sampled(frame_idx);
        let mut vehicles = Vec::new();

        if sampled {
            self.sampled_frames += 1;
            self.set_frame(frame_idx);

            if !detections.is_empty() {
                vehicles = self.process_detections(frame, detections);
            }

            if let Some(max_idle) = self.max_idle_frames {
                self.evict_idle(frame_idx, max_idle);
            }
        }

        FrameAnnotations {
            frame_idx,
            sampled,
            vehicles,
            line_y: self.counter.line_y(),
            totals: self.counter.totals(),
        }
    }

    fn process_detections<F>(
        &mut self,
        frame: &F,
        detections: &[Detection],
    ) -> Vec<VehicleAnnotation>
    where
        F: Crop,
        R: TextRecognizer<F::Output>,
    {
        let boxes: Vec<_> = detections.iter().map(|d| d.bbox()).collect();
        let ids: Vec<_> = detections.iter().map(|d| d.track_id).collect();
        let classes: Vec<_> = detections.iter().map(|d| d.class).collect();

        self.counter.process(&boxes, &ids, &classes);

        detections
            .iter()
            .map(|det| {
                let bbox = det.bbox();
                let (cx, cy) = bbox.pixel_centroid_floor();
                let speed_kmh = self.speed.estimate(det.track_id, cx as f32, cy as f32);

                if !self.results.contains_key(&det.track_id) {
                    match self.plates.read_plate(frame, &bbox, det.track_id) {
                        Ok(Some(plate)) => {
                            self.results.insert(det.track_id, plate);
                        }
                        Ok(None) => {}
                        Err(err) => {
                            warn!(track_id = det.track_id, "plate read failed: {}", err)
                        }
                    }
                }

                VehicleAnnotation {
                    bbox,
                    track_id: det.track_id,
                    class: det.class,
                    speed_kmh,
                    plate: self.results.get(&det.track_id).cloned(),
                }
            })
            .collect()
    }

    fn set_frame(&mut self, frame_idx: u64) {
        self.counter.set_frame(frame_idx);
        self.speed.set_frame(frame_idx);
        self.plates.set_frame(frame_idx);
    }

    fn evict_idle(&mut self, frame_idx: u64, max_idle: u64) {
        let dropped = self.counter.evict_idle(frame_idx, max_idle)
            + self.speed.evict_idle(frame_idx, max_idle)
            + self.plates.evict_idle(frame_idx, max_idle);

        if dropped > 0 {
            debug!(frame_idx, dropped, "evicted idle track state");
        }
    }

    pub fn summary(&self) -> Summary {
        Summary {
            vehicle_count: self.counter.stats(),
            plates: self.results.clone(),
        }
    }
}
