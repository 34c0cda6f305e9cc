use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use qtraffic::config::ClockKind;
use qtraffic::filter::DetectionFilter;
use qtraffic::ocr::TesseractCli;
use qtraffic::source::DetectionsFile;
use qtraffic::speed::{Clock, ManualClock, WallClock};
use qtraffic::summary::{annotated_video_path, summary_path};
use qtraffic::video::{render, Display, VideoSource, VideoWriter};
use qtraffic::{Config, Monitor, ObjectTracker};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ClockArg {
    Wall,
    Video,
}

#[derive(Parser, Debug)]
#[command(
    name = "traffic_monitor",
    about = "Count vehicles crossing a line, estimate their speed and read plates"
)]
struct Args {
    /// Input video
    input: PathBuf,
    /// Tracker output for the video (defaults to the input path with a `.dets` extension)
    #[arg(long, value_name = "PATH")]
    detections: Option<PathBuf>,
    /// YAML configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
    #[arg(long)]
    frame_skip: Option<u64>,
    #[arg(long)]
    line_y: Option<i32>,
    #[arg(long)]
    pixel_per_meter: Option<f32>,
    #[arg(long, value_enum)]
    clock: Option<ClockArg>,
    /// Drop per-track state for ids unseen for this many frames
    #[arg(long)]
    max_idle_frames: Option<u64>,
    #[arg(long, default_value = "tesseract")]
    tesseract: String,
    #[arg(long, default_value = "eng")]
    ocr_lang: String,
    /// Play the annotated frames in a window
    #[arg(long)]
    show: bool,
    /// Do not write the annotated video
    #[arg(long)]
    no_video: bool,
}

impl Args {
    fn config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(frame_skip) = self.frame_skip {
            config.frame_skip = frame_skip;
        }
        if self.line_y.is_some() {
            config.line_y = self.line_y;
        }
        if let Some(ppm) = self.pixel_per_meter {
            config.pixel_per_meter = ppm;
        }
        if let Some(clock) = self.clock {
            config.clock = match clock {
                ClockArg::Wall => ClockKind::Wall,
                ClockArg::Video => ClockKind::Video,
            };
        }
        if self.max_idle_frames.is_some() {
            config.max_idle_frames = self.max_idle_frames;
        }

        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("qtraffic=info,traffic_monitor=info")),
        )
        .init();

    let args = Args::parse();
    let config = args.config()?;

    match config.clock {
        ClockKind::Wall => run(&args, &config, WallClock::new(), None),
        ClockKind::Video => {
            let clock = ManualClock::new(0.0);
            run(&args, &config, clock.clone(), Some(clock))
        }
    }
}

fn run<C: Clock>(
    args: &Args,
    config: &Config,
    clock: C,
    video_clock: Option<ManualClock>,
) -> Result<()> {
    let mut source = VideoSource::open(&args.input, config.resize)?;

    let dets_path = args
        .detections
        .clone()
        .unwrap_or_else(|| args.input.with_extension("dets"));
    let mut tracker = DetectionsFile::open(&dets_path)
        .with_context(|| format!("Failed to open detections {}", dets_path.display()))?
        .with_filter(DetectionFilter::new(config.filter_config()));

    let recognizer = TesseractCli::new(&args.tesseract).with_lang(&args.ocr_lang);

    info!(
        input = %args.input.display(),
        fps = source.fps(),
        frames = ?source.total(),
        "processing video"
    );

    let mut monitor = Monitor::new(config, source.size().1, recognizer, clock);

    let mut writer = if args.no_video {
        None
    } else {
        std::fs::create_dir_all(&config.output_dir)
            .with_context(|| format!("Failed to create {}", config.output_dir.display()))?;
        let path = annotated_video_path(&config.output_dir, &args.input);
        Some(VideoWriter::new(path.to_string_lossy(), source.fps()))
    };

    let display = if args.show {
        Some(Display::open("qtraffic", config.playback_delay_ms)?)
    } else {
        None
    };

    while let Some((frame_idx, pos, mut frame)) = source.next_frame()? {
        if let Some(clock) = &video_clock {
            clock.set(pos);
        }

        let detections = if monitor.is_sampled(frame_idx) {
            tracker.track(frame_idx, &frame)?
        } else {
            Vec::new()
        };

        let annotations = monitor.process_frame(frame_idx, &frame, &detections);
        render(&mut frame, &annotations)?;

        if let Some(writer) = writer.as_mut() {
            writer.feed(&frame)?;
        }

        if let Some(display) = &display {
            if !display.show(&frame)? {
                info!(frame_idx, "playback stopped");
                break;
            }
        }

        if frame_idx % 100 == 0 {
            debug!(frame_idx, total = ?source.total(), "progress");
        }
    }

    if let Some(writer) = writer.as_mut() {
        writer.release()?;
    }

    let summary = monitor.summary();
    let json_path = summary_path(&config.output_dir, &args.input);
    summary
        .write(&json_path)
        .with_context(|| format!("Failed to write {}", json_path.display()))?;

    info!(
        vehicles_in = summary.vehicle_count.in_count,
        vehicles_out = summary.vehicle_count.out_count,
        plates = summary.plates.len(),
        sampled_frames = monitor.sampled_frames(),
        output = %json_path.display(),
        "done"
    );

    Ok(())
}
