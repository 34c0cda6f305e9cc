//! License plate reading with a per-track cache.
//!
//! OCR is expensive, so a track is only sent to the recognizer until one of
//! its crops yields a plausible plate. After that the cached text is served
//! for the rest of the run and never replaced.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::bbox::{BBox, Ltrb, Ltwh};
use crate::error::Error;
use crate::ocr::TextRecognizer;
use crate::track_map::TrackMap;
use crate::TrackId;

pub const MIN_PLATE_LEN: usize = 6;
pub const MAX_PLATE_LEN: usize = 10;

/// An image that sub-regions can be cut out of.
pub trait Crop {
    type Output;

    /// `(width, height)` in pixels.
    fn dims(&self) -> (i32, i32);

    /// Cuts out `region`, which the caller keeps inside `dims()`.
    fn crop(&self, region: &BBox<Ltwh>) -> Result<Self::Output, Error>;
}

/// Uppercases `text` and keeps only ASCII letters and digits.
pub fn normalize_plate(text: &str) -> String {
    text.to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        .collect()
}

#[derive(Debug, Default)]
struct PlateEntry {
    plate: Option<String>,
    attempts: u32,
}

pub struct PlateReader<R> {
    recognizer: R,
    cache: TrackMap<PlateEntry>,
    min_len: usize,
    max_len: usize,
    max_attempts: Option<u32>,
}

impl<R> PlateReader<R> {
    pub fn new(recognizer: R) -> Self {
        Self {
            recognizer,
            cache: TrackMap::new(),
            min_len: MIN_PLATE_LEN,
            max_len: MAX_PLATE_LEN,
            max_attempts: None,
        }
    }

    /// Accepted plate lengths, inclusive.
    pub fn with_length(mut self, min_len: usize, max_len: usize) -> Self {
        self.min_len = min_len;
        self.max_len = max_len;
        self
    }

    /// Stop calling OCR for a track after this many attempts without a plate.
    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[inline]
    pub fn recognizer(&self) -> &R {
        &self.recognizer
    }

    #[inline]
    pub fn cached(&self, track_id: TrackId) -> Option<&str> {
        self.cache.get(track_id)?.plate.as_deref()
    }

    /// OCR calls spent on `track_id` so far.
    #[inline]
    pub fn ocr_attempts(&self, track_id: TrackId) -> u32 {
        self.cache.get(track_id).map_or(0, |e| e.attempts)
    }

    pub fn plates(&self) -> HashMap<TrackId, String> {
        self.cache
            .iter()
            .filter_map(|(id, e)| Some((id, e.plate.clone()?)))
            .collect()
    }

    fn accept(&self, text: &str) -> Option<String> {
        let plate = normalize_plate(text);
        let len = plate.chars().count();

        if len >= self.min_len && len <= self.max_len {
            Some(plate)
        } else {
            None
        }
    }

    #[inline]
    pub fn set_frame(&mut self, frame: u64) {
        self.cache.set_frame(frame);
    }

    #[inline]
    pub fn evict_idle(&mut self, now: u64, max_idle: u64) -> usize {
        self.cache.evict_idle(now, max_idle)
    }

    /// Plate text for `track_id`, reading it from `vehicle_box` of `frame`
    /// unless an earlier read already succeeded. `Ok(None)` leaves the track
    /// eligible for another attempt.
    pub fn read_plate<F>(
        &mut self,
        frame: &F,
        vehicle_box: &BBox<Ltrb>,
        track_id: TrackId,
    ) -> Result<Option<String>, Error>
    where
        F: Crop,
        R: TextRecognizer<F::Output>,
    {
        if let Some(entry) = self.cache.get(track_id) {
            if let Some(plate) = &entry.plate {
                return Ok(Some(plate.clone()));
            }

            if let Some(max) = self.max_attempts {
                if entry.attempts >= max {
                    return Ok(None);
                }
            }
        }

        let (width, height) = frame.dims();
        let region = match vehicle_box.clip(width, height) {
            Some(region) => region,
            None => {
                debug!(track_id, "empty plate crop");
                return Ok(None);
            }
        };

        let crop = frame.crop(&region)?;

        self.cache.get_or_insert_with(track_id, PlateEntry::default).attempts += 1;
        let candidates = self.recognizer.recognize(&crop)?;

        let plate = candidates.iter().find_map(|c| self.accept(&c.text));
        if let Some(plate) = &plate {
            info!(track_id, plate = plate.as_str(), "plate read");
            let entry = self.cache.get_or_insert_with(track_id, PlateEntry::default);
            entry.plate = Some(plate.clone());
        }

        Ok(plate)
    }
}
