use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::time::{Duration, Instant, SystemTime};

use clap::Parser;
use image::imageops::FilterType;
use image::RgbImage;

use maskwatch_core::detection::infrastructure::onnx_blazeface_detector::{
    OnnxBlazefaceDetector, DEFAULT_CONFIDENCE,
};
use maskwatch_core::detection::infrastructure::onnx_mask_classifier::OnnxMaskClassifier;
use maskwatch_core::geometry::space_registry::{CameraFacing, PipelineSession, SessionParams};
use maskwatch_core::pipeline::detection_mapper::{DetectionMapper, MaskLabelPolicy};
use maskwatch_core::pipeline::frame_scheduler::{CaptureBuffer, FrameScheduler};
use maskwatch_core::pipeline::infrastructure::threaded_worker::WorkerParts;
use maskwatch_core::pipeline::pipeline_logger::StatsPipelineLogger;
use maskwatch_core::pipeline::result_sink::{PublishedFrame, ResultListener};
use maskwatch_core::shared::config::PipelineConfig;
use maskwatch_core::shared::constants::IMAGE_EXTENSIONS;

/// Replays a directory of still frames through the face mask pipeline as a
/// simulated camera, printing every published result set as a JSON line.
#[derive(Parser)]
#[command(name = "maskwatch")]
struct Cli {
    /// Directory of frames, replayed in file name order.
    frames: PathBuf,

    /// BlazeFace ONNX model.
    #[arg(long)]
    detector: PathBuf,

    /// Mask classifier ONNX model.
    #[arg(long)]
    classifier: PathBuf,

    /// Classifier label file, one label per line.
    #[arg(long)]
    labels: PathBuf,

    /// Pipeline config JSON (defaults to the platform config dir).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Capture rotation of the camera sensor in degrees.
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    rotation: i32,

    /// Screen orientation in degrees.
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    screen_orientation: i32,

    /// Treat frames as coming from a front-facing camera (mirrored output).
    #[arg(long)]
    front_camera: bool,

    /// Simulated capture rate in frames per second.
    #[arg(long, default_value = "30")]
    fps: f64,

    /// Override the classifier acceptance threshold (0.0-1.0).
    #[arg(long)]
    threshold: Option<f32>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let frames = collect_frames(&cli.frames)?;
    let first = frames.first().ok_or_else(|| {
        format!("No image frames found in {}", cli.frames.display())
    })?;
    let (width, height) = image::image_dimensions(first)?;

    let config = load_config(&cli, width, height)?;
    let session = PipelineSession::new(&session_params(&cli, &config), &config)?;

    let detector = OnnxBlazefaceDetector::new(&cli.detector, DEFAULT_CONFIDENCE)?;
    let classifier = OnnxMaskClassifier::new(&cli.classifier, &cli.labels, config.model_input_size)?;
    let parts = WorkerParts {
        detector: Box::new(detector),
        mapper: DetectionMapper::new(Box::new(classifier), MaskLabelPolicy::from_config(&config)),
        logger: Box::new(StatsPipelineLogger::default()),
    };

    let scheduler = FrameScheduler::start(session, parts, Some(Box::new(JsonLinesListener)), 3)?;

    let interval = Duration::from_secs_f64(1.0 / cli.fps);
    let mut next_tick = Instant::now();
    for (i, path) in frames.iter().enumerate() {
        let image = match load_frame(path, config.preview_width, config.preview_height) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("Skipping {}: {e}", path.display());
                continue;
            }
        };
        let admission = scheduler.on_frame_available(DecodedFrame(image), SystemTime::now());
        eprint!("\rReplaying frame {}/{}", i + 1, frames.len());
        log::debug!("{}: {admission:?}", path.display());

        next_tick += interval;
        if let Some(wait) = next_tick.checked_duration_since(Instant::now()) {
            std::thread::sleep(wait);
        }
    }
    eprintln!();

    let stats = scheduler.stats();
    scheduler.shutdown()?;
    log::info!(
        "Replayed {} frames: {} admitted, {} dropped",
        stats.arrived,
        stats.admitted,
        stats.dropped
    );
    Ok(())
}

/// Prints each published frame as one JSON object per line on stdout.
struct JsonLinesListener;

impl ResultListener for JsonLinesListener {
    fn on_results_published(&self, frame: &PublishedFrame) {
        match serde_json::to_string(frame) {
            Ok(line) => {
                let mut stdout = std::io::stdout().lock();
                if let Err(e) = writeln!(stdout, "{line}") {
                    log::warn!("Failed to write frame {}: {e}", frame.frame_id);
                }
            }
            Err(e) => log::warn!("Failed to serialize frame {}: {e}", frame.frame_id),
        }
    }
}

/// A decoded RGB frame standing in for a camera buffer.
struct DecodedFrame(RgbImage);

impl CaptureBuffer for DecodedFrame {
    fn width(&self) -> u32 {
        self.0.width()
    }

    fn height(&self) -> u32 {
        self.0.height()
    }

    fn channels(&self) -> u8 {
        3
    }

    fn pixels(&self) -> &[u8] {
        self.0.as_raw()
    }

    fn release(self) {}
}

fn load_config(cli: &Cli, width: u32, height: u32) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::load_or_default(),
    };
    // The replayed frames are the sensor: their size wins over the config.
    config.preview_width = width;
    config.preview_height = height;
    if let Some(threshold) = cli.threshold {
        config.acceptance_threshold = threshold;
    }
    config.validate()?;
    Ok(config)
}

fn session_params(cli: &Cli, config: &PipelineConfig) -> SessionParams {
    SessionParams {
        preview_width: config.preview_width,
        preview_height: config.preview_height,
        capture_rotation: cli.rotation,
        screen_orientation: cli.screen_orientation,
        facing: if cli.front_camera {
            CameraFacing::Front
        } else {
            CameraFacing::Back
        },
    }
}

/// Decodes a frame as RGB, resizing it to the session size when needed.
fn load_frame(path: &Path, width: u32, height: u32) -> Result<RgbImage, Box<dyn std::error::Error>> {
    let image = image::open(path)?.to_rgb8();
    if image.dimensions() == (width, height) {
        Ok(image)
    } else {
        log::debug!(
            "Resizing {} from {}x{} to {width}x{height}",
            path.display(),
            image.width(),
            image.height()
        );
        Ok(image::imageops::resize(&image, width, height, FilterType::Triangle))
    }
}

fn collect_frames(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut frames: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_image(p))
        .collect();
    frames.sort();
    Ok(frames)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.frames.is_dir() {
        return Err(format!("Frames directory not found: {}", cli.frames.display()).into());
    }
    for (flag, path) in [
        ("--detector", &cli.detector),
        ("--classifier", &cli.classifier),
        ("--labels", &cli.labels),
    ] {
        if !path.exists() {
            return Err(format!("{flag} file not found: {}", path.display()).into());
        }
    }
    if !(cli.fps.is_finite() && cli.fps > 0.0) {
        return Err(format!("FPS must be positive, got {}", cli.fps).into());
    }
    if let Some(t) = cli.threshold {
        if !(0.0..=1.0).contains(&t) {
            return Err(format!("Threshold must be between 0.0 and 1.0, got {t}").into());
        }
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
