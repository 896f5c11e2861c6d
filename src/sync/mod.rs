//! Result buffering and frame/result synchronization.

pub mod buffer;
pub mod synchronizer;

pub use buffer::{BufferCounters, BufferError, ResultBuffer, ResultSender};
pub use synchronizer::StalenessSynchronizer;
