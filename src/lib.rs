//! framesync
//!
//! Sampled video processing with an asynchronous detector. Frames are read from a
//! local container at a target rate (or captured live from a camera), queued on a
//! detector running on its own thread, and paired back with the detector's results as
//! they arrive.
//!
//! # Guarantees
//!
//! 1. **One row set per result**: every result set the detector delivers is logged
//!    exactly once, stamped with the timestamp of the frame it was computed on.
//! 2. **Bounded staleness**: a frame is annotated with the newest result only while
//!    that result is at most the configured window older than the frame.
//! 3. **Ordered delivery**: result sets are consumed in the order they were produced.
//! 4. **Clean passes**: at the end of a pass the detector is drained, the remaining
//!    results are logged and all synchronization state starts over.
//!
//! # Module Structure
//!
//! - `frame`: Immutable frames and per-frame result sets
//! - `ingest`: Frame sources: sampled files (FFmpeg or synthetic decoding) and cameras
//! - `detect`: Detector traits, the worker-thread detector and built-in backends
//! - `sync`: Result buffer and staleness synchronizer
//! - `entity`: Face, body, object and occupant payloads with their log schemas
//! - `output`: CSV result log and annotated frame sinks
//! - `annotate`: Overlay drawing
//! - `pipeline`: The processing loop tying it all together

pub mod annotate;
pub mod config;
pub mod detect;
pub mod entity;
pub mod frame;
pub mod ingest;
pub mod output;
pub mod pipeline;
pub mod sync;
pub mod ui;

pub use config::PipelineConfig;
pub use detect::{Detector, DetectorBackend, MotionBackend, NullBackend, ThreadedDetector};
pub use entity::EntityKind;
pub use frame::{ColorFormat, EntityId, Frame, ResultSet};
pub use ingest::{
    CameraConfig, CameraSource, FrameSource, InputSource, ProbeInfo, SampledFrameSource,
    SourceError,
};
pub use output::{ImageSequenceSink, ResultLog, RowSchema};
pub use pipeline::{run_input, run_video, DetectorChoice, Pipeline, RunSummary};
pub use sync::{ResultBuffer, ResultSender, StalenessSynchronizer};
