use anyhow::Result;

use crate::frame::{Frame, ResultSet};

/// Synchronous per-frame detection.
///
/// # Frame Boundary
///
/// Implementations receive a shared, read-only frame. They:
/// - Must not mutate or retain the pixel buffer beyond the `detect` call
/// - Must return one result set per call (empty when nothing was found)
/// - Should keep tracking state keyed by entity id so ids stay stable across frames
///
/// Backends run on the detector worker thread, never on the processing loop.
pub trait DetectorBackend<T>: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(&mut self, frame: &Frame) -> Result<ResultSet<T>>;

    /// Optional warm-up hook, called once before the first frame.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }

    /// Drop tracking state between playback passes.
    fn reset(&mut self) {}
}

/// Asynchronous detector driven by the processing loop.
///
/// Results are not returned from `process`; they are delivered later, on another
/// thread, through the result sender the detector was built with.
pub trait Detector {
    fn start(&mut self) -> Result<()>;

    /// Queue a frame. Returns before the frame is analysed.
    fn process(&mut self, frame: &Frame) -> Result<()>;

    /// Block until every queued frame has been handled, then reset tracking state.
    fn reset(&mut self) -> Result<()>;

    /// Stop the worker. Safe to call more than once.
    fn stop(&mut self) -> Result<()>;
}
