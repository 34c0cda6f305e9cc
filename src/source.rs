use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::detection::Detection;
use crate::error::Error;
use crate::filter::DetectionFilter;
use crate::ObjectTracker;

/// Tracker output recorded ahead of time, one frame per line:
///
/// ```text
/// 3:[{"x1":10,"y1":20,"x2":60,"y2":70,"id":1,"c":2,"p":0.87}]
/// ```
///
/// Frames are numbered from 1 and must appear in ascending order. Frames
/// without a line have no detections.
pub struct DetectionsFile<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
    last_frame: Option<u64>,
    pending: Option<(u64, Vec<Detection>)>,
    filter: Option<DetectionFilter>,
}

impl DetectionsFile<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::open(path)?;

        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> DetectionsFile<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            last_frame: None,
            pending: None,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: DetectionFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    fn next_entry(&mut self) -> Result<Option<(u64, Vec<Detection>)>, Error> {
        for line in self.lines.by_ref() {
            let line = line?;
            self.line_no += 1;

            if line.trim().is_empty() {
                continue;
            }

            let entry = parse_line(&line).map_err(|reason| Error::DetectionsFormat {
                line: self.line_no,
                reason,
            })?;

            if let Some(last) = self.last_frame {
                if entry.0 <= last {
                    return Err(Error::DetectionsFormat {
                        line: self.line_no,
                        reason: format!("frame {} follows frame {}", entry.0, last),
                    });
                }
            }
            self.last_frame = Some(entry.0);

            return Ok(Some(entry));
        }

        Ok(None)
    }

    /// Detections recorded for `frame_idx`. Entries for earlier frames that
    /// were never asked for are skipped.
    pub fn detections(&mut self, frame_idx: u64) -> Result<Vec<Detection>, Error> {
        loop {
            if self.pending.is_none() {
                self.pending = self.next_entry()?;
            }

            let next = match &self.pending {
                Some((idx, _)) => *idx,
                None => return Ok(Vec::new()),
            };

            if next > frame_idx {
                return Ok(Vec::new());
            }
            if next == frame_idx {
                break;
            }
            self.pending = None;
        }

        let dets = self.pending.take().map(|(_, dets)| dets).unwrap_or_default();

        Ok(match &self.filter {
            Some(filter) => filter.apply(&dets),
            None => dets,
        })
    }
}

impl<R: BufRead, F: ?Sized> ObjectTracker<F> for DetectionsFile<R> {
    #[inline]
    fn track(&mut self, frame_idx: u64, _frame: &F) -> Result<Vec<Detection>, Error> {
        self.detections(frame_idx)
    }
}

fn parse_line(line: &str) -> Result<(u64, Vec<Detection>), String> {
    let idx = line.find(':').ok_or_else(|| "expected `:`".to_string())?;
    let (frame, vector) = line.split_at(idx);

    let frame = frame
        .trim()
        .parse::<u64>()
        .map_err(|e| format!("parse frame index failed: {}", e))?;
    let dets = serde_json::from_str(&vector[1..])
        .map_err(|e| format!("parse json failed: {}", e))?;

    Ok((frame, dets))
}
