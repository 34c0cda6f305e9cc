use std::fs;
use std::path::{Path, PathBuf};

use serde_derive::{Deserialize, Serialize};

use crate::classes::VEHICLE_CLASSES;
use crate::error::Error;
use crate::filter::DetectionFilterConfig;
use crate::plate::{MAX_PLATE_LEN, MIN_PLATE_LEN};
use crate::speed::DEFAULT_PIXEL_PER_METER;
use crate::ClassId;

/// Where speed sample timestamps come from.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClockKind {
    /// Wall-clock time at the moment a track is processed.
    Wall,
    /// Position of the frame in the video.
    Video,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Frames are resized to this `(width, height)` before processing.
    pub resize: (i32, i32),
    /// Only every n-th frame is sent to the tracker.
    pub frame_skip: u64,
    pub pixel_per_meter: f32,
    /// Counting line row; the frame midpoint when unset.
    pub line_y: Option<i32>,
    pub confidence: f32,
    pub iou: f32,
    pub classes: Vec<ClassId>,
    pub output_dir: PathBuf,
    pub plate_min_len: usize,
    pub plate_max_len: usize,
    pub plate_max_attempts: Option<u32>,
    pub max_idle_frames: Option<u64>,
    pub clock: ClockKind,
    pub playback_delay_ms: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resize: (960, 540),
            frame_skip: 3,
            pixel_per_meter: DEFAULT_PIXEL_PER_METER,
            line_y: None,
            confidence: 0.4,
            iou: 0.5,
            classes: VEHICLE_CLASSES.to_vec(),
            output_dir: PathBuf::from("outputs"),
            plate_min_len: MIN_PLATE_LEN,
            plate_max_len: MAX_PLATE_LEN,
            plate_max_attempts: None,
            max_idle_frames: None,
            clock: ClockKind::Wall,
            playback_delay_ms: 30,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;

        Ok(config)
    }

    pub fn filter_config(&self) -> DetectionFilterConfig {
        DetectionFilterConfig {
            confidence_threshold: self.confidence,
            iou_threshold: self.iou,
            classes: self.classes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: Config = serde_yaml::from_str(
            "frame_skip: 1\nline_y: 300\nclock: video\nclasses: [2, 7]\nresize: [1280, 720]\n",
        )
        .unwrap();

        assert_eq!(config.frame_skip, 1);
        assert_eq!(config.line_y, Some(300));
        assert_eq!(config.clock, ClockKind::Video);
        assert_eq!(config.classes, vec![2, 7]);
        assert_eq!(config.resize, (1280, 720));
        assert_eq!(config.pixel_per_meter, 8.0);
        assert_eq!(config.output_dir, PathBuf::from("outputs"));
        assert_eq!(config.plate_max_attempts, None);
    }

    #[test]
    fn load_from_file() {
        let path =
            std::env::temp_dir().join(format!("qtraffic-config-{}.yaml", std::process::id()));
        fs::write(&path, "pixel_per_meter: 12.5\nplate_max_attempts: 4\n").unwrap();

        let config = Config::load(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.pixel_per_meter, 12.5);
        assert_eq!(config.plate_max_attempts, Some(4));
        assert_eq!(config.frame_skip, 3);
    }

    #[test]
    fn bad_yaml_is_an_error() {
        assert!(matches!(
            serde_yaml::from_str::<Config>("frame_skip: [").map_err(Error::from),
            Err(Error::Yaml(_))
        ));
    }
}
