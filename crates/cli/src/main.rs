use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::Parser;
use crossbeam_channel::Receiver;

use facemark_core::camera::domain::camera_access::AlwaysGranted;
use facemark_core::camera::domain::camera_config::{CameraConfig, ResizeMethod, ResizeTarget};
use facemark_core::camera::domain::frame_source::FrameSource;
use facemark_core::camera::infrastructure::image_file_source::ImageFileSource;
use facemark_core::camera::infrastructure::nokhwa_camera::{NokhwaAccess, NokhwaCamera};
use facemark_core::detection::domain::observation::DetectionResult;
use facemark_core::detection::infrastructure::backend::Backend;
use facemark_core::pipeline::bootstrap::{self, BlazefaceLoader, BootstrapEvent};
use facemark_core::pipeline::frame_loop::{self, FrameLoop, FrameOutputs, TickOutcome};
use facemark_core::pipeline::loop_logger::LogLoopLogger;
use facemark_core::pipeline::model_slot::ModelSlot;
use facemark_core::pipeline::ticker::{IntervalTicker, Ticker};
use facemark_core::overlay::projector::{project, OverlayConfig};
use facemark_core::overlay::svg;
use facemark_core::shared::constants::{DEFAULT_REFRESH_HZ, IMAGE_EXTENSIONS};
use facemark_core::shared::frame_tensor::TensorTracker;
use facemark_core::shared::model_resolver::ModelSource;
use facemark_core::shared::platform::PlatformFamily;

/// Face landmark detection on a still image or the live webcam.
#[derive(Parser)]
#[command(name = "facemark")]
struct Cli {
    /// Detect on this image instead of the webcam.
    #[arg(long)]
    image: Option<PathBuf>,

    /// Camera mode: stop after this many processed frames.
    #[arg(long, default_value = "300")]
    frames: u64,

    /// Camera device index.
    #[arg(long, default_value = "0")]
    device: u32,

    /// Path to a BlazeFace ONNX model (skips the cache lookup).
    #[arg(long)]
    model: Option<PathBuf>,

    /// Download the model from this URL when it is not cached.
    #[arg(long)]
    model_url: Option<String>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value = "0.75")]
    confidence: f64,

    /// Upper bound on faces kept per frame.
    #[arg(long, default_value = "10")]
    max_faces: usize,

    /// Inference backend: auto, cpu, coreml, directml.
    #[arg(long, default_value = "auto")]
    backend: String,

    /// Frame resize: filtered or nearest.
    #[arg(long, default_value = "filtered")]
    resize: String,

    /// Mirror the overlay horizontally (defaults to the platform convention).
    #[arg(long)]
    mirror: Option<bool>,

    /// Write the overlay of the last result as SVG.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Print each detection result as a JSON line on stdout.
    #[arg(long)]
    json: bool,
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

    let backend: Backend = cli.backend.parse()?;
    let resize_method: ResizeMethod = cli.resize.parse()?;
    let loader = BlazefaceLoader {
        backend,
        model: ModelSource {
            path: cli.model.clone(),
            bundled_dir: bundled_model_dir(),
            url: cli.model_url.clone(),
        },
        confidence: cli.confidence,
        max_faces: cli.max_faces,
    };
    let overlay = overlay_config(cli.mirror);

    let last = match &cli.image {
        Some(path) => run_image(path, loader, resize_method, cli.json)?,
        None => run_camera(&cli, loader, resize_method)?,
    };

    if let Some(svg_path) = &cli.svg {
        let tree = project(last.as_deref(), &overlay);
        std::fs::write(svg_path, svg::render(&tree))?;
        log::info!("Overlay written to {}", svg_path.display());
    }
    Ok(())
}

fn run_image(
    path: &Path,
    loader: BlazefaceLoader,
    resize_method: ResizeMethod,
    json: bool,
) -> Result<Option<Arc<DetectionResult>>, Box<dyn std::error::Error>> {
    let tracker = TensorTracker::new();
    let source = ImageFileSource::open(path, ResizeTarget::default(), resize_method, tracker.clone())?;

    let slot = Arc::new(ModelSlot::new());
    let (tx, rx) = crossbeam_channel::unbounded();
    let result = bootstrap::run(&AlwaysGranted, &loader, &slot, &tx);
    report_events(&rx);
    result?;

    let outputs = FrameOutputs::default();
    let mut frame_loop = FrameLoop::with_source(
        Box::new(source),
        slot,
        outputs.clone(),
        Default::default(),
        Box::new(LogLoopLogger::default()),
    );
    if let TickOutcome::Detected { faces } = frame_loop.tick()? {
        log::info!("{faces} face(s) in {}", path.display());
    }
    debug_assert_eq!(tracker.live(), 0);

    let latest = outputs.results.latest();
    if json {
        if let Some(result) = &latest {
            println!("{}", serde_json::to_string(result.as_ref())?);
        }
    }
    Ok(latest)
}

fn run_camera(
    cli: &Cli,
    loader: BlazefaceLoader,
    resize_method: ResizeMethod,
) -> Result<Option<Arc<DetectionResult>>, Box<dyn std::error::Error>> {
    let config = CameraConfig {
        device_index: cli.device,
        resize_method,
        ..CameraConfig::default()
    };

    let slot = Arc::new(ModelSlot::new());
    let (tx, rx) = crossbeam_channel::unbounded();
    bootstrap::spawn(NokhwaAccess, loader, slot.clone(), tx);

    let outputs = FrameOutputs::default();
    let tracker = TensorTracker::new();
    let handle = frame_loop::spawn(
        Box::new(move || {
            let camera = NokhwaCamera::open(config, tracker)?;
            Ok(Box::new(camera) as Box<dyn FrameSource>)
        }),
        slot,
        outputs.clone(),
        Box::new(LogLoopLogger::default()),
        Box::new(IntervalTicker::from_hz(DEFAULT_REFRESH_HZ)),
    );

    let mut poll = IntervalTicker::from_hz(DEFAULT_REFRESH_HZ);
    let mut seen = 0;
    let mut last = None;
    loop {
        poll.wait_tick();

        for event in rx.try_iter() {
            log_event(&event);
            if let BootstrapEvent::Failed(reason) = event {
                handle.cancel();
                handle.join()?;
                return Err(reason.into());
            }
        }

        if let Some((version, result)) = outputs.results.latest_since(seen) {
            seen = version;
            if cli.json {
                println!("{}", serde_json::to_string(result.as_ref())?);
            }
            last = Some(result);
            if seen >= cli.frames {
                handle.cancel();
            }
        }

        if handle.is_finished() {
            break;
        }
    }
    eprintln!();
    handle.join()?;
    Ok(last)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(image) = &cli.image {
        if !image.exists() {
            return Err(format!("Input file not found: {}", image.display()).into());
        }
        if !is_image(image) {
            return Err(format!("Unsupported image type: {}", image.display()).into());
        }
    }
    if let Some(model) = &cli.model {
        if !model.exists() {
            return Err(format!("Model file not found: {}", model.display()).into());
        }
    }
    if cli.model.is_some() && cli.model_url.is_some() {
        return Err("--model and --model-url are mutually exclusive".into());
    }
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    if cli.max_faces == 0 {
        return Err("Max faces must be at least 1".into());
    }
    if cli.frames == 0 {
        return Err("Frames must be at least 1".into());
    }
    cli.backend.parse::<Backend>()?;
    cli.resize.parse::<ResizeMethod>()?;
    Ok(())
}

fn overlay_config(mirror: Option<bool>) -> OverlayConfig {
    let mut config = OverlayConfig::for_platform(PlatformFamily::current());
    if let Some(flip) = mirror {
        config.flip_horizontal = flip;
    }
    config
}

/// `models/` next to the executable, where packaged builds ship the model.
fn bundled_model_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("models")))
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn report_events(rx: &Receiver<BootstrapEvent>) {
    for event in rx.try_iter() {
        log_event(&event);
    }
    eprintln!();
}

fn log_event(event: &BootstrapEvent) {
    match event {
        BootstrapEvent::DownloadProgress(downloaded, total) => download_progress(*downloaded, *total),
        BootstrapEvent::Stage(stage) => log::debug!("Stage: {stage}"),
        BootstrapEvent::Ready => log::debug!("Bootstrap complete"),
        BootstrapEvent::Failed(_) => {}
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}
