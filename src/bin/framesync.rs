//! framesync - sampled video detection with staleness-bounded result sync
//!
//! This binary:
//! 1. Loads the pipeline config (file, environment, then command-line overrides)
//! 2. Reads the input video at the sampling rate, or captures from a camera
//! 3. Runs the selected detector on a worker thread
//! 4. Logs every delivered result set to CSV and optionally writes annotated frames

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use framesync::entity::RegionId;
use framesync::ui::Ui;
use framesync::{run_input, CameraConfig, DetectorChoice, EntityKind, InputSource, PipelineConfig};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Input video (.avi, .mov, .flv, .webm, .wmv, .mp4) or a stub:// path.
    #[arg(long, required_unless_present = "camera", conflicts_with = "camera")]
    input: Option<String>,
    /// Capture from a camera instead: a numeric id (/dev/video<ID>) or a device path.
    #[arg(long, value_name = "ID|PATH")]
    camera: Option<String>,
    /// Requested camera capture rate.
    #[arg(long, default_value_t = 30, requires = "camera")]
    cfps: u32,
    /// Requested camera resolution.
    #[arg(long, num_args = 2, value_names = ["WIDTH", "HEIGHT"], requires = "camera")]
    resolution: Option<Vec<u32>>,
    /// Config file (.toml or .json). Also read from FRAMESYNC_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Sampling rate in frames per second; 0 reads every frame.
    #[arg(long)]
    sfps: Option<u32>,
    /// Entity kind: face, body, object or occupant.
    #[arg(long)]
    kind: Option<EntityKind>,
    /// Detector backend: motion (object runs only) or null.
    #[arg(long, default_value = "null")]
    detector: DetectorChoice,
    /// Staleness window in milliseconds.
    #[arg(long)]
    staleness_ms: Option<u64>,
    /// Minimum spacing between detector callbacks in milliseconds.
    #[arg(long)]
    callback_interval_ms: Option<u64>,
    /// Comma-separated cabin region ids for object and occupant logs.
    #[arg(long, value_delimiter = ',')]
    regions: Option<Vec<RegionId>>,
    /// Add drowsiness columns to face logs.
    #[arg(long)]
    drowsiness: bool,
    /// Write annotated frames into this directory.
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Write annotated frames as PNG instead of JPEG.
    #[arg(long)]
    lossless: bool,
    /// CSV log path (default: <input stem>_<kind>s.csv).
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Write the run summary as JSON.
    #[arg(long)]
    summary_json: Option<PathBuf>,
    /// Restart the input when it ends, until interrupted.
    #[arg(long = "loop")]
    loop_input: bool,
    /// Progress output: auto, plain or pretty.
    #[arg(long)]
    ui: Option<String>,
    /// Suppress progress output.
    #[arg(long)]
    quiet: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = PipelineConfig::load(args.config.as_deref())?;
    apply_args(&mut config, &args);
    config.validate()?;

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        handler_flag.store(false, Ordering::SeqCst);
    })
    .context("error setting Ctrl-C handler")?;

    let ui = Ui::from_args(args.ui.as_deref(), args.quiet, std::io::stderr().is_terminal());
    let input = input_source(&args, &config)?;
    let summary = run_input(&input, &config, args.detector, ui, &running)?;

    log::info!(
        "{}: {} frames read over {} pass(es), {} results logged ({:.1}% with entities), {} rows",
        summary.input,
        summary.frames_read,
        summary.passes,
        summary.results_logged,
        summary.entity_percent(),
        summary.rows_written
    );
    if let Some(path) = &summary.csv_path {
        log::info!("result log written to {}", path.display());
    }
    if let Some(path) = &config.output.summary_json {
        summary.write_json(path)?;
        log::info!("run summary written to {}", path.display());
    }
    Ok(())
}

fn input_source(args: &Args, config: &PipelineConfig) -> Result<InputSource> {
    let Some(camera) = &args.camera else {
        let path = args.input.as_deref().context("either --input or --camera is required")?;
        return Ok(InputSource::file(path, config.sampling_fps));
    };
    let mut camera = CameraConfig::from_arg(camera);
    camera.capture_fps = args.cfps;
    if let Some(size) = &args.resolution {
        match size.as_slice() {
            [width, height] if *width > 0 && *height > 0 => {
                camera.width = *width;
                camera.height = *height;
            }
            _ => anyhow::bail!("--resolution needs a positive WIDTH and HEIGHT"),
        }
    }
    Ok(InputSource::Camera(camera))
}

fn apply_args(config: &mut PipelineConfig, args: &Args) {
    if let Some(kind) = args.kind {
        config.kind = kind;
    }
    if let Some(sfps) = args.sfps {
        config.sampling_fps = sfps;
    }
    if let Some(window) = args.staleness_ms {
        config.sync.staleness_ms = Some(window);
    }
    if let Some(interval) = args.callback_interval_ms {
        config.sync.callback_interval_ms = interval;
    }
    if let Some(regions) = &args.regions {
        config.cabin_regions = regions.clone();
    }
    if args.drowsiness {
        config.drowsiness = true;
    }
    if args.output_dir.is_some() {
        config.output.dir = args.output_dir.clone();
    }
    if args.lossless {
        config.output.lossless = true;
    }
    if args.csv.is_some() {
        config.output.csv = args.csv.clone();
    }
    if args.summary_json.is_some() {
        config.output.summary_json = args.summary_json.clone();
    }
    if args.loop_input {
        config.loop_input = true;
    }
}
