//! Result outputs: the structured CSV log and annotated frame sinks.

pub mod frame_sink;
pub mod result_log;

pub use frame_sink::{FrameSink, ImageSequenceSink};
pub use result_log::{serialize, ResultLog, RowSchema, NOT_AVAILABLE};
