//! OpenCV side of the pipeline: decoding, drawing, encoding and display.

use std::path::Path;

use opencv::{
    core::{self, Mat, Rect, Scalar, Size},
    highgui, imgcodecs, imgproc,
    prelude::*,
    videoio,
};

use crate::bbox::{BBox, Ltwh};
use crate::error::Error;
use crate::ocr::{TesseractCli, TextCandidate, TextRecognizer};
use crate::pipeline::FrameAnnotations;
use crate::plate::Crop;

const FALLBACK_FPS: f64 = 30.0;

impl Crop for Mat {
    type Output = Mat;

    fn dims(&self) -> (i32, i32) {
        (self.cols(), self.rows())
    }

    fn crop(&self, region: &BBox<Ltwh>) -> Result<Mat, Error> {
        let rect = Rect::new(
            region.left() as i32,
            region.top() as i32,
            region.width() as i32,
            region.height() as i32,
        );

        Ok(Mat::roi(self, rect)?.try_clone()?)
    }
}

impl TextRecognizer<Mat> for TesseractCli {
    fn recognize(&mut self, image: &Mat) -> Result<Vec<TextCandidate>, Error> {
        let mut png = core::Vector::<u8>::new();
        imgcodecs::imencode(".png", image, &mut png, &core::Vector::new())?;

        self.recognize_png(&png.to_vec())
    }
}

pub struct VideoSource {
    capture: videoio::VideoCapture,
    size: (i32, i32),
    fps: f64,
    total: i64,
    frame_idx: u64,
}

impl VideoSource {
    /// Opens `path`; frames are resized to `size` as they are read.
    pub fn open<P: AsRef<Path>>(path: P, size: (i32, i32)) -> Result<Self, Error> {
        let name = path.as_ref().to_string_lossy().into_owned();

        let mut capture = videoio::VideoCapture::from_file(&name, videoio::CAP_ANY)
            .map_err(|_| Error::VideoOpen(name.clone()))?;
        if !capture.is_opened()? {
            return Err(Error::VideoOpen(name));
        }

        let fps = capture.get(videoio::CAP_PROP_FPS)?;
        let total = capture.get(videoio::CAP_PROP_FRAME_COUNT)? as i64;

        Ok(Self {
            capture,
            size,
            fps: if fps > 0.0 { fps } else { FALLBACK_FPS },
            total,
            frame_idx: 0,
        })
    }

    #[inline]
    pub fn fps(&self) -> f64 {
        self.fps
    }

    #[inline]
    pub fn size(&self) -> (i32, i32) {
        self.size
    }

    /// Frame count reported by the container, if any.
    #[inline]
    pub fn total(&self) -> Option<u64> {
        if self.total > 0 {
            Some(self.total as u64)
        } else {
            None
        }
    }

    /// Next frame as `(index from 1, position in seconds, resized frame)`.
    pub fn next_frame(&mut self) -> Result<Option<(u64, f64, Mat)>, Error> {
        let mut raw = Mat::default();
        if !self.capture.read(&mut raw)? || raw.cols() == 0 || raw.rows() == 0 {
            return Ok(None);
        }

        self.frame_idx += 1;
        let pos = self.capture.get(videoio::CAP_PROP_POS_MSEC)? / 1000.0;

        let mut frame = Mat::default();
        imgproc::resize(
            &raw,
            &mut frame,
            Size::new(self.size.0, self.size.1),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;

        Ok(Some((self.frame_idx, pos, frame)))
    }
}

pub struct VideoWriter {
    writer: Option<videoio::VideoWriter>,
    size: Option<(i32, i32)>,
    fps: f64,
    out_file: String,
}

impl VideoWriter {
    pub fn new<S: ToString>(out_file: S, fps: f64) -> Self {
        Self {
            writer: None,
            size: None,
            fps,
            out_file: out_file.to_string(),
        }
    }

    pub fn release(&mut self) -> Result<(), Error> {
        if let Some(mut w) = self.writer.take() {
            w.release()?;
        }

        Ok(())
    }

    fn reinit(&mut self, size: (i32, i32)) -> Result<(), Error> {
        self.release()?;

        self.size = Some(size);
        self.writer = Some(videoio::VideoWriter::new(
            &self.out_file,
            videoio::VideoWriter::fourcc(b'X' as _, b'V' as _, b'I' as _, b'D' as _)?,
            self.fps,
            Size::new(size.0, size.1),
            true,
        )?);

        Ok(())
    }

    pub fn feed(&mut self, m: &Mat) -> Result<(), Error> {
        let size = (m.cols(), m.rows());

        if self.writer.is_none() || self.size != Some(size) {
            self.reinit(size)?;
        }

        if let Some(writer) = self.writer.as_mut() {
            writer.write(m)?;
        }

        Ok(())
    }
}

/// Playback window with a fixed delay between frames.
pub struct Display {
    window: String,
    delay_ms: i32,
}

impl Display {
    pub fn open<S: ToString>(window: S, delay_ms: i32) -> Result<Self, Error> {
        let window = window.to_string();
        highgui::named_window(&window, highgui::WINDOW_AUTOSIZE)?;

        Ok(Self {
            window,
            delay_ms: delay_ms.max(1),
        })
    }

    /// Shows `frame`; `false` once the user pressed Esc or `q`.
    pub fn show(&self, frame: &Mat) -> Result<bool, Error> {
        highgui::imshow(&self.window, frame)?;
        let key = highgui::wait_key(self.delay_ms)?;

        Ok(key != 27 && key != 'q' as i32)
    }
}

fn green() -> Scalar {
    Scalar::new(0.0, 255.0, 0.0, 0.0)
}

fn red() -> Scalar {
    Scalar::new(0.0, 0.0, 255.0, 0.0)
}

fn cyan() -> Scalar {
    Scalar::new(255.0, 255.0, 0.0, 0.0)
}

fn put_text(
    frame: &mut Mat,
    text: &str,
    x: i32,
    y: i32,
    scale: f64,
    color: Scalar,
) -> opencv::Result<()> {
    imgproc::put_text(
        frame,
        text,
        core::Point::new(x, y),
        imgproc::FONT_HERSHEY_SIMPLEX,
        scale,
        color,
        2,
        imgproc::LINE_8,
        false,
    )
}

/// Draws the counting line, running totals and per-vehicle labels. Frames
/// without tracked vehicles are left untouched.
pub fn render(frame: &mut Mat, ann: &FrameAnnotations) -> Result<(), Error> {
    if ann.vehicles.is_empty() {
        return Ok(());
    }

    let width = frame.cols();
    imgproc::line(
        frame,
        core::Point::new(0, ann.line_y),
        core::Point::new(width, ann.line_y),
        red(),
        2,
        imgproc::LINE_8,
        0,
    )?;

    let (in_count, out_count) = ann.totals;
    put_text(frame, &format!("IN: {}", in_count), 20, 40, 1.0, green())?;
    put_text(frame, &format!("OUT: {}", out_count), 20, 80, 1.0, red())?;

    for vehicle in &ann.vehicles {
        let (x1, y1, x2, y2) = vehicle.bbox.pixel_corners();
        imgproc::rectangle(
            frame,
            Rect::new(x1, y1, x2 - x1, y2 - y1),
            green(),
            2,
            imgproc::LINE_8,
            0,
        )?;

        put_text(frame, &vehicle.label(), x1, y1 - 25, 0.6, green())?;

        if let Some(plate) = &vehicle.plate {
            put_text(frame, plate, x1, y1 - 5, 0.6, cyan())?;
        }
    }

    Ok(())
}
