pub mod bbox;
pub mod classes;
pub mod config;
pub mod counter;
pub mod detection;
pub mod error;
pub mod filter;
pub mod ocr;
pub mod pipeline;
pub mod plate;
pub mod source;
pub mod speed;
pub mod summary;

#[cfg(feature = "video")]
pub mod video;

mod circular_queue;
mod history;
mod track_map;

pub use config::Config;
pub use counter::{CounterStats, LineCounter};
pub use detection::Detection;
pub use pipeline::{FrameAnnotations, Monitor};
pub use plate::PlateReader;
pub use speed::SpeedEstimator;
pub use summary::Summary;

use error::Error;

/// Identifier the external tracker assigns to one physical object.
pub type TrackId = i32;

/// COCO class code of a detection.
pub type ClassId = i32;

/// External detector and tracker. Ids must stay stable across frames for the
/// same object.
pub trait ObjectTracker<F: ?Sized> {
    fn track(&mut self, frame_idx: u64, frame: &F) -> Result<Vec<Detection>, Error>;
}

impl<F: ?Sized, T: ObjectTracker<F> + ?Sized> ObjectTracker<F> for Box<T> {
    #[inline]
    fn track(&mut self, frame_idx: u64, frame: &F) -> Result<Vec<Detection>, Error> {
        (**self).track(frame_idx, frame)
    }
}
