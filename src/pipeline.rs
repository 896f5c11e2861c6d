//! Video processing loop.
//!
//! One pass reads the input (a file at the sampling rate, or a live camera), queues
//! every frame on the detector, logs whatever results the detector has delivered so far
//! and annotates the frame with the freshest usable result. When the input runs out the
//! detector is drained, the remaining results are logged, and the buffer and
//! synchronizer start over. With looping enabled, file passes repeat until the running
//! flag is cleared.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{anyhow, Context, Result};
use serde::Serialize;

use crate::annotate::{FrameAnnotator, Overlay};
use crate::config::PipelineConfig;
use crate::detect::{Detector, DetectorBackend, MotionBackend, NullBackend, ThreadedDetector};
use crate::entity::{BodySchema, EntityKind, FaceSchema, Object, ObjectSchema, OccupantSchema};
use crate::ingest::{CameraSource, FrameSource, InputSource, SampledFrameSource};
use crate::output::{FrameSink, ImageSequenceSink, ResultLog, RowSchema};
use crate::sync::{ResultSender, StalenessSynchronizer};
use crate::ui::Ui;

/// Counters for a whole run, across passes.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub input: String,
    pub kind: EntityKind,
    pub passes: u32,
    /// Frames returned by the source at the sampling rate.
    pub frames_read: u64,
    /// Result sets delivered by the detector.
    pub results_logged: u64,
    /// Result sets with at least one entity.
    pub frames_with_entities: u64,
    pub rows_written: u64,
    pub annotated_frames: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv_path: Option<PathBuf>,
}

impl RunSummary {
    /// Share of delivered result sets with at least one entity, in percent.
    pub fn entity_percent(&self) -> f64 {
        if self.results_logged == 0 {
            return 0.0;
        }
        self.frames_with_entities as f64 * 100.0 / self.results_logged as f64
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("write run summary {}", path.display()))?;
        Ok(())
    }
}

pub struct Pipeline<T, S: RowSchema<Entity = T>, W: Write> {
    input: InputSource,
    kind: EntityKind,
    loop_input: bool,
    synchronizer: StalenessSynchronizer<T>,
    log: ResultLog<W, S>,
    annotator: FrameAnnotator<T>,
    sink: Option<Box<dyn FrameSink>>,
    ui: Ui,
}

impl<T, S, W> Pipeline<T, S, W>
where
    T: Overlay,
    S: RowSchema<Entity = T>,
    W: Write,
{
    /// File input sampled at `config.sampling_fps`. Validates `config` and writes the
    /// log header to `out`.
    pub fn new(input: &str, config: &PipelineConfig, schema: S, out: W) -> Result<Self> {
        Self::from_input(InputSource::file(input, config.sampling_fps), config, schema, out)
    }

    pub fn from_input(
        input: InputSource,
        config: &PipelineConfig,
        schema: S,
        out: W,
    ) -> Result<Self> {
        config.validate()?;
        let window = config.staleness_ms()?;
        if config.loop_input && !input.is_replayable() {
            log::warn!("{} cannot be replayed; looping is ignored", input.name());
        }
        Ok(Self {
            loop_input: config.loop_input && input.is_replayable(),
            input,
            kind: config.kind,
            synchronizer: StalenessSynchronizer::new(window),
            log: ResultLog::new(out, schema)?,
            annotator: FrameAnnotator::new(),
            sink: None,
            ui: Ui::quiet(),
        })
    }

    pub fn with_sink(mut self, sink: Box<dyn FrameSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_ui(mut self, ui: Ui) -> Self {
        self.ui = ui;
        self
    }

    /// Producer handle for the detector.
    pub fn sender(&self) -> ResultSender<T> {
        self.synchronizer.sender()
    }

    /// Run until the input ends (or, when looping, until `running` is cleared).
    /// The detector is started here and always stopped before returning.
    pub fn run<D: Detector>(
        &mut self,
        detector: &mut D,
        running: &AtomicBool,
    ) -> Result<RunSummary> {
        detector.start()?;
        let outcome = self.run_passes(detector, running);
        let stopped = detector.stop();
        let mut summary = outcome?;
        stopped?;

        self.log.flush()?;
        if let Some(sink) = self.sink.as_mut() {
            sink.finish()?;
        }
        summary.rows_written = self.log.rows_written();
        Ok(summary)
    }

    /// Hand back the log writer once the run is over.
    pub fn into_log(self) -> Result<W> {
        self.log.into_inner()
    }

    fn run_passes<D: Detector>(
        &mut self,
        detector: &mut D,
        running: &AtomicBool,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary {
            input: self.input.name().to_string(),
            kind: self.kind,
            ..RunSummary::default()
        };
        loop {
            summary.passes += 1;
            self.run_pass(detector, running, &mut summary)?;
            if !self.loop_input || !running.load(Ordering::SeqCst) {
                break;
            }
            log::info!("restarting {} (pass {})", self.input.name(), summary.passes + 1);
        }
        Ok(summary)
    }

    fn run_pass<D: Detector>(
        &mut self,
        detector: &mut D,
        running: &AtomicBool,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let mut source = self.input.open()?;
        let mut progress = self.ui.frames("reading", source.total_frame_count());

        while running.load(Ordering::SeqCst) {
            let Some(frame) = source.next_frame() else {
                break;
            };
            summary.frames_read += 1;
            detector.process(&frame)?;

            let result_log = &mut self.log;
            let entities = self.synchronizer.sync(&frame, |result_frame, results| {
                result_log.write(results, result_frame.timestamp_ms as f64)?;
                Ok(())
            })?;
            if let Some(sink) = self.sink.as_mut() {
                let image = self.annotator.annotate(entities, &frame);
                sink.write_frame(&image)?;
                summary.annotated_frames += 1;
            }
            progress.update(source.current_frame());
        }
        progress.finish();

        // Drain in-flight detections before touching the buffer.
        detector.reset()?;
        let result_log = &mut self.log;
        let flushed = self.synchronizer.flush(|result_frame, results| {
            result_log.write(results, result_frame.timestamp_ms as f64)?;
            Ok(())
        })?;
        let counters = self.synchronizer.buffer().counters();
        summary.results_logged += counters.processed_frames;
        summary.frames_with_entities += counters.frames_with_entities;
        log::debug!(
            "pass over {} done: {} frames read, {} results ({} flushed after the last frame)",
            self.input.name(),
            source.current_frame(),
            counters.processed_frames,
            flushed
        );
        self.synchronizer.reset();
        Ok(())
    }
}

/// Detector backend selectable from the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectorChoice {
    /// Frame-change detection; object runs only.
    Motion,
    /// Never detects anything.
    Null,
}

impl FromStr for DetectorChoice {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "motion" => Ok(DetectorChoice::Motion),
            "null" | "none" => Ok(DetectorChoice::Null),
            other => Err(anyhow!("unknown detector '{}'", other)),
        }
    }
}

/// Annotated-frame sink for `config`, or `None` when no output directory is set.
///
/// File frames are written at the sampling rate, or at the probed rate when sampling is
/// off. Camera frames are written at the capture rate, sized from one test capture.
pub fn prepare_sink(
    input: &InputSource,
    config: &PipelineConfig,
) -> Result<Option<ImageSequenceSink>> {
    let Some(dir) = &config.output.dir else {
        return Ok(None);
    };
    let (fps, width, height) = match input {
        InputSource::File { path, sampling_fps } => {
            let info = SampledFrameSource::probe(path, *sampling_fps)?;
            let fps = if *sampling_fps == 0 {
                log::info!("using estimated input rate for output frames: {} fps", info.fps);
                info.fps
            } else {
                *sampling_fps
            };
            (fps, info.width, info.height)
        }
        InputSource::Camera(camera) => {
            let mut source = CameraSource::open(camera)?;
            let frame = source.next_frame().ok_or_else(|| {
                anyhow!("failed to read frame from {} while setting up output", camera.device)
            })?;
            (camera.capture_fps, frame.width, frame.height)
        }
    };
    let sink = ImageSequenceSink::create(dir, fps, width, height)?;
    Ok(Some(if config.output.lossless {
        sink.lossless()
    } else {
        sink
    }))
}

/// Build and run the pipeline for `config.kind` over a video file, logging to the
/// configured CSV path.
pub fn run_video(
    input: &str,
    config: &PipelineConfig,
    choice: DetectorChoice,
    ui: Ui,
    running: &AtomicBool,
) -> Result<RunSummary> {
    run_input(&InputSource::file(input, config.sampling_fps), config, choice, ui, running)
}

/// Build and run the pipeline for `config.kind` over any input.
///
/// Configuration and input are checked before the log file, output directory or
/// input are opened.
pub fn run_input(
    input: &InputSource,
    config: &PipelineConfig,
    choice: DetectorChoice,
    ui: Ui,
    running: &AtomicBool,
) -> Result<RunSummary> {
    config.validate()?;
    input.check()?;
    if choice == DetectorChoice::Motion && config.kind != EntityKind::Object {
        return Err(anyhow!(
            "the motion detector reports objects; use --kind object (got {})",
            config.kind
        ));
    }
    let sink = prepare_sink(input, config)?;
    let csv_path = config.csv_path(input.name());
    let file = File::create(&csv_path)
        .with_context(|| format!("unable to open csv file {}", csv_path.display()))?;
    let out = BufWriter::new(file);

    let mut summary = match (config.kind, choice) {
        (EntityKind::Object, DetectorChoice::Motion) => run_typed(
            input,
            config,
            ObjectSchema::new(config.cabin_regions.clone()),
            MotionBackend::new(),
            out,
            sink,
            ui,
            running,
        )?,
        (EntityKind::Object, DetectorChoice::Null) => run_typed(
            input,
            config,
            ObjectSchema::new(config.cabin_regions.clone()),
            NullBackend::<Object>::new(),
            out,
            sink,
            ui,
            running,
        )?,
        (EntityKind::Face, _) => run_typed(
            input,
            config,
            FaceSchema {
                drowsiness: config.drowsiness,
            },
            NullBackend::new(),
            out,
            sink,
            ui,
            running,
        )?,
        (EntityKind::Body, _) => run_typed(
            input,
            config,
            BodySchema,
            NullBackend::new(),
            out,
            sink,
            ui,
            running,
        )?,
        (EntityKind::Occupant, _) => run_typed(
            input,
            config,
            OccupantSchema::new(config.cabin_regions.clone()),
            NullBackend::new(),
            out,
            sink,
            ui,
            running,
        )?,
    };
    summary.csv_path = Some(csv_path);
    Ok(summary)
}

#[allow(clippy::too_many_arguments)]
fn run_typed<T, S, B, W>(
    input: &InputSource,
    config: &PipelineConfig,
    schema: S,
    backend: B,
    out: W,
    sink: Option<ImageSequenceSink>,
    ui: Ui,
    running: &AtomicBool,
) -> Result<RunSummary>
where
    T: Overlay + Send + 'static,
    S: RowSchema<Entity = T>,
    B: DetectorBackend<T> + 'static,
    W: Write,
{
    let mut pipeline = Pipeline::from_input(input.clone(), config, schema, out)?.with_ui(ui);
    if let Some(sink) = sink {
        pipeline = pipeline.with_sink(Box::new(sink));
    }
    let mut detector = ThreadedDetector::new(backend, pipeline.sender())
        .with_callback_interval(config.sync.callback_interval_ms);
    let _stage = pipeline.ui.stage(&format!("processing {}", input.name()));
    pipeline.run(&mut detector, running)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::MOTION_ENTITY_ID;
    use crate::ingest::CameraConfig;

    fn config(window: u64) -> PipelineConfig {
        let mut cfg = PipelineConfig::default();
        cfg.kind = EntityKind::Object;
        cfg.sync.staleness_ms = Some(window);
        cfg
    }

    #[test]
    fn every_frame_produces_one_row() {
        let cfg = config(500);
        let mut pipeline =
            Pipeline::new("stub://clip.mp4", &cfg, ObjectSchema::default(), Vec::new()).unwrap();
        let mut detector = ThreadedDetector::new(NullBackend::<Object>::new(), pipeline.sender());
        let running = AtomicBool::new(true);
        let summary = pipeline.run(&mut detector, &running).unwrap();

        assert_eq!(summary.passes, 1);
        assert_eq!(summary.frames_read, 90);
        assert_eq!(summary.results_logged, 90);
        assert_eq!(summary.rows_written, 90);
        assert_eq!(summary.frames_with_entities, 0);

        let text = String::from_utf8(pipeline.into_log().unwrap()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("TimeStamp,objectId,confidence,upperLeftX,upperLeftY,lowerRightX,lowerRightY,ObjectType")
        );
        assert_eq!(lines.next(), Some("0.00,nan,nan,nan,nan,nan,nan,nan"));
        assert_eq!(lines.count(), 89);
    }

    #[test]
    fn motion_rows_carry_their_own_frame_timestamps() {
        let mut cfg = config(500);
        cfg.sampling_fps = 10;
        let mut pipeline =
            Pipeline::new("stub://clip.mp4", &cfg, ObjectSchema::default(), Vec::new()).unwrap();
        let mut detector = ThreadedDetector::new(MotionBackend::new(), pipeline.sender());
        let running = AtomicBool::new(true);
        let summary = pipeline.run(&mut detector, &running).unwrap();

        assert_eq!(summary.frames_read, summary.results_logged);
        assert_eq!(summary.rows_written, summary.results_logged);
        assert!(summary.frames_with_entities > 0);

        let text = String::from_utf8(pipeline.into_log().unwrap()).unwrap();
        let stamps: Vec<f64> = text
            .lines()
            .skip(1)
            .map(|line| line.split(',').next().unwrap().parse().unwrap())
            .collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
        let motion_id = MOTION_ENTITY_ID.to_string();
        let motion_rows = text
            .lines()
            .filter(|line| line.split(',').nth(1) == Some(motion_id.as_str()))
            .count() as u64;
        assert_eq!(motion_rows, summary.frames_with_entities);
    }

    #[test]
    fn looping_stops_when_flag_is_cleared() {
        struct StopAfter<'a> {
            inner: ThreadedDetector<Object, NullBackend<Object>>,
            running: &'a AtomicBool,
            seen: u32,
        }

        impl Detector for StopAfter<'_> {
            fn start(&mut self) -> Result<()> {
                self.inner.start()
            }
            fn process(&mut self, frame: &crate::frame::Frame) -> Result<()> {
                self.seen += 1;
                if self.seen == 100 {
                    self.running.store(false, Ordering::SeqCst);
                }
                self.inner.process(frame)
            }
            fn reset(&mut self) -> Result<()> {
                self.inner.reset()
            }
            fn stop(&mut self) -> Result<()> {
                self.inner.stop()
            }
        }

        let mut cfg = config(500);
        cfg.loop_input = true;
        let mut pipeline =
            Pipeline::new("stub://clip.mp4", &cfg, ObjectSchema::default(), Vec::new()).unwrap();
        let running = AtomicBool::new(true);
        let mut detector = StopAfter {
            inner: ThreadedDetector::new(NullBackend::new(), pipeline.sender()),
            running: &running,
            seen: 0,
        };
        let summary = pipeline.run(&mut detector, &running).unwrap();
        assert_eq!(summary.passes, 2);
        assert_eq!(summary.frames_read, 100);
        assert_eq!(summary.rows_written, 100);
    }

    #[test]
    fn camera_input_runs_one_pass_until_capture_ends() {
        let mut cfg = config(500);
        cfg.loop_input = true;
        let camera = CameraConfig {
            capture_fps: 200,
            width: 32,
            height: 24,
            frame_limit: Some(20),
            ..CameraConfig::stub("cabin")
        };
        let mut pipeline = Pipeline::from_input(
            InputSource::Camera(camera),
            &cfg,
            ObjectSchema::default(),
            Vec::new(),
        )
        .unwrap();
        let mut detector = ThreadedDetector::new(MotionBackend::new(), pipeline.sender());
        let running = AtomicBool::new(true);
        let summary = pipeline.run(&mut detector, &running).unwrap();

        assert_eq!(summary.input, "stub://cabin");
        assert_eq!(summary.passes, 1);
        assert_eq!(summary.frames_read, 20);
        assert_eq!(summary.rows_written, 20);

        let text = String::from_utf8(pipeline.into_log().unwrap()).unwrap();
        let stamps: Vec<f64> = text
            .lines()
            .skip(1)
            .map(|line| line.split(',').next().unwrap().parse().unwrap())
            .collect();
        assert_eq!(stamps.len(), 20);
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn detector_is_stopped_when_the_input_cannot_open() {
        let cfg = config(500);
        let mut pipeline =
            Pipeline::new("stub://clip.mkv", &cfg, ObjectSchema::default(), Vec::new()).unwrap();
        let mut detector = ThreadedDetector::new(NullBackend::<Object>::new(), pipeline.sender());
        let running = AtomicBool::new(true);
        assert!(pipeline.run(&mut detector, &running).is_err());
        assert!(!detector.is_running());
    }

    #[test]
    fn motion_detector_requires_object_kind() {
        let mut cfg = config(500);
        cfg.kind = EntityKind::Face;
        let running = AtomicBool::new(true);
        let err = run_video("stub://clip.mp4", &cfg, DetectorChoice::Motion, Ui::quiet(), &running)
            .unwrap_err();
        assert!(err.to_string().contains("--kind object"));
    }

    #[test]
    fn missing_window_is_rejected_before_running() {
        let cfg = PipelineConfig::default();
        assert!(
            Pipeline::new("stub://clip.mp4", &cfg, ObjectSchema::default(), Vec::new()).is_err()
        );
    }
}
