use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_derive::{Deserialize, Serialize};

use crate::counter::CounterStats;
use crate::error::Error;
use crate::TrackId;

const SUMMARY_SUFFIX: &str = "_plates.json";
const VIDEO_SUFFIX: &str = "_annotated.avi";

/// Per-video result document. Plate keys serialize as strings.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub vehicle_count: CounterStats,
    pub plates: BTreeMap<TrackId, String>,
}

impl Summary {
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        Ok(())
    }
}

fn derived_path(output_dir: &Path, input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    output_dir.join(format!("{}{}", stem, suffix))
}

/// `<output_dir>/<input stem>_plates.json`
pub fn summary_path<P: AsRef<Path>, Q: AsRef<Path>>(output_dir: P, input: Q) -> PathBuf {
    derived_path(output_dir.as_ref(), input.as_ref(), SUMMARY_SUFFIX)
}

/// `<output_dir>/<input stem>_annotated.avi`
pub fn annotated_video_path<P: AsRef<Path>, Q: AsRef<Path>>(output_dir: P, input: Q) -> PathBuf {
    derived_path(output_dir.as_ref(), input.as_ref(), VIDEO_SUFFIX)
}
