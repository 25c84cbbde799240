use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use serde::Serialize;

use facecue_core::detection::infrastructure::replay_face_detector::{ReplayFaceDetector, ReplayScript};
use facecue_core::pipeline::detection_scheduler::{DetectionEvent, DetectionScheduler};
use facecue_core::pipeline::face_detection_options::FaceDetectionOptions;
use facecue_core::pipeline::pipeline_logger::SummaryPipelineLogger;
use facecue_core::preview::domain::coordinate_transformer::{transform_bounds, FillMode, PreviewSurface};
use facecue_core::quality::domain::face_alignment_validator::{AlignmentResult, FaceAlignmentValidator};
use facecue_core::quality::domain::lighting_quality_detector::LightingQualityDetector;
use facecue_core::shared::constants::{DRAIN_POLL_INTERVAL, DRAIN_TIMEOUT};
use facecue_core::shared::frame::{PixelFormat, RawFrame, Rotation};
use facecue_core::shared::geometry::NormalizedRect;

/// Face capture guidance: lighting, alignment, preview mapping and pipeline replay.
#[derive(Parser)]
#[command(name = "facecue")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rate the lighting of an image file.
    Lighting {
        image: PathBuf,
    },

    /// Check head pose and framing of a face box.
    Align {
        /// Roll in degrees.
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        roll: f64,
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        pitch: f64,
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        yaw: f64,
        #[command(flatten)]
        rect: RectArgs,
    },

    /// Map a sensor-space face box onto a preview surface.
    Transform {
        /// Sensor-to-display rotation: 0, 90, 180 or 270.
        #[arg(long, default_value = "0", value_parser = parse_rotation)]
        rotation: Rotation,
        /// fit, fill or stretch.
        #[arg(long, default_value = "fit")]
        fill: FillMode,
        /// Frame size as WxH.
        #[arg(long, value_parser = parse_size)]
        frame: (u32, u32),
        /// Preview size as WxH.
        #[arg(long, value_parser = parse_size)]
        preview: (u32, u32),
        #[command(flatten)]
        rect: RectArgs,
    },

    /// Run the detection pipeline over a recorded observation script.
    Replay {
        script: PathBuf,
        /// Options JSON file (camelCase keys; missing keys take defaults).
        #[arg(long)]
        options: Option<PathBuf>,
        /// Map results onto a preview of this size (WxH).
        #[arg(long, value_parser = parse_size)]
        preview: Option<(u32, u32)>,
        #[arg(long, default_value = "fit")]
        fill: FillMode,
    },
}

/// Normalized face box, top-left origin.
#[derive(clap::Args)]
struct RectArgs {
    #[arg(long)]
    x: f64,
    #[arg(long)]
    y: f64,
    #[arg(long)]
    width: f64,
    #[arg(long)]
    height: f64,
}

impl RectArgs {
    fn to_rect(&self) -> NormalizedRect {
        NormalizedRect::new(self.x, self.y, self.width, self.height)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AlignmentReport {
    is_valid: bool,
    primary_feedback: &'static str,
    all_feedback: Vec<&'static str>,
    #[serde(flatten)]
    checks: AlignmentResult,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Command::Lighting { image } => run_lighting(&image),
        Command::Align {
            roll,
            pitch,
            yaw,
            rect,
        } => run_align(roll, pitch, yaw, rect.to_rect()),
        Command::Transform {
            rotation,
            fill,
            frame,
            preview,
            rect,
        } => {
            let mapped = transform_bounds(rect.to_rect(), rotation, frame.0, frame.1, preview.0, preview.1, fill);
            print_json(&mapped)
        }
        Command::Replay {
            script,
            options,
            preview,
            fill,
        } => {
            let surface = preview.map(|(w, h)| PreviewSurface::new(w, h, fill));
            run_replay(&script, options.as_deref(), surface)
        }
    }
}

fn run_lighting(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("Input file not found: {}", path.display()).into());
    }
    let rgba = image::open(path)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut bgra = rgba.into_raw();
    for px in bgra.chunks_exact_mut(4) {
        px.swap(0, 2);
    }

    let frame = RawFrame::new(bgra, width, height, PixelFormat::PackedBgra, Rotation::Deg0, 0);
    let result = LightingQualityDetector::default().analyze(&frame);
    log::info!("{}: brightness {:.3}", path.display(), result.brightness_level);
    print_json(&result)
}

fn run_align(roll: f64, pitch: f64, yaw: f64, bounds: NormalizedRect) -> Result<(), Box<dyn std::error::Error>> {
    let checks = FaceAlignmentValidator::default().validate(roll, pitch, yaw, bounds);
    print_json(&AlignmentReport {
        is_valid: checks.is_valid(),
        primary_feedback: checks.primary_feedback(),
        all_feedback: checks.all_feedback(),
        checks,
    })
}

fn run_replay(
    script_path: &Path,
    options_path: Option<&Path>,
    surface: Option<PreviewSurface>,
) -> Result<(), Box<dyn std::error::Error>> {
    let script = Arc::new(ReplayScript::load(script_path)?);
    let options = match options_path {
        Some(path) => FaceDetectionOptions::load(path)?,
        None => FaceDetectionOptions::default(),
    };
    log::info!(
        "Replaying {} frames from {}",
        script.frames.len(),
        script_path.display()
    );

    let factory_script = Arc::clone(&script);
    let scheduler = DetectionScheduler::new(Box::new(move |_options: &FaceDetectionOptions| {
        Ok(ReplayFaceDetector::shared(&factory_script))
    }))
    .with_logger(Box::new(SummaryPipelineLogger::new()));
    scheduler.set_preview_surface(surface);

    scheduler.start(options, |event: DetectionEvent| match serde_json::to_string(&event) {
        Ok(line) => println!("{line}"),
        Err(e) => log::error!("Failed to serialize event: {e}"),
    })?;

    // Frames are paced by their recorded timestamps so throttling and motion
    // gating see the recorded cadence.
    let started = Instant::now();
    let base_ms = script.frames.first().map_or(0, |f| f.timestamp_ms);
    for frame in script.frames() {
        let due = started + Duration::from_millis(frame.timestamp_ms().saturating_sub(base_ms));
        if let Some(wait) = due.checked_duration_since(Instant::now()) {
            thread::sleep(wait);
        }
        scheduler.process_frame(frame);
    }

    let deadline = Instant::now() + DRAIN_TIMEOUT;
    while scheduler.stats().in_flight > 0 && Instant::now() < deadline {
        thread::sleep(DRAIN_POLL_INTERVAL);
    }
    let outcome = scheduler.stop();
    if !outcome.completed {
        log::warn!("{} detection(s) abandoned at shutdown", outcome.in_flight);
    }

    print_json(&scheduler.stats())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got '{s}'"))?;
    let w = w.trim().parse::<u32>().map_err(|e| format!("invalid width '{w}': {e}"))?;
    let h = h.trim().parse::<u32>().map_err(|e| format!("invalid height '{h}': {e}"))?;
    Ok((w, h))
}

fn parse_rotation(s: &str) -> Result<Rotation, String> {
    let degrees = s
        .parse::<u32>()
        .map_err(|e| format!("invalid rotation '{s}': {e}"))?;
    Rotation::try_from(degrees)
}
