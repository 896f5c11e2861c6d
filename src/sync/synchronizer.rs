//! Pairs displayed frames with the freshest usable detector result.
//!
//! On every frame the synchronizer drains whatever the detector has queued. All drained
//! results go to the caller's logging callback in push order, using each result's own
//! frame timestamp. Only the last one is kept for annotation, and only while the frame
//! being shown is within the staleness window of the moment it was received. Outside
//! the window, or before any result has arrived, the frame is annotated with an empty set.

use anyhow::Result;

use crate::frame::{Frame, ResultSet};
use crate::sync::buffer::{ResultBuffer, ResultSender};

pub struct StalenessSynchronizer<T> {
    buffer: ResultBuffer<T>,
    window_ms: i64,
    most_recent_frame: Option<Frame>,
    latest: Option<(Frame, ResultSet<T>)>,
    /// Timestamp of the displayed frame at which `latest` was dequeued.
    received_at_ms: Option<i64>,
    empty: ResultSet<T>,
}

impl<T> StalenessSynchronizer<T> {
    pub fn new(window_ms: u64) -> Self {
        Self {
            buffer: ResultBuffer::new(),
            window_ms: i64::try_from(window_ms).unwrap_or(i64::MAX),
            most_recent_frame: None,
            latest: None,
            received_at_ms: None,
            empty: ResultSet::new(),
        }
    }

    /// Producer handle to hand to the detector.
    pub fn sender(&self) -> ResultSender<T> {
        self.buffer.sender()
    }

    pub fn buffer(&self) -> &ResultBuffer<T> {
        &self.buffer
    }

    pub fn window_ms(&self) -> i64 {
        self.window_ms
    }

    pub fn most_recent_frame(&self) -> Option<&Frame> {
        self.most_recent_frame.as_ref()
    }

    /// Result set kept for annotation, with the frame it was computed on.
    pub fn latest(&self) -> Option<&(Frame, ResultSet<T>)> {
        self.latest.as_ref()
    }

    /// Drain queued results through `on_result`, then pick the entity map to draw on `frame`.
    pub fn sync<F>(&mut self, frame: &Frame, mut on_result: F) -> Result<&ResultSet<T>>
    where
        F: FnMut(&Frame, &ResultSet<T>) -> Result<()>,
    {
        self.most_recent_frame = Some(frame.clone());
        if self.buffer.size() > 0 {
            self.received_at_ms = Some(frame.timestamp_ms);
            while self.buffer.size() > 0 {
                let (result_frame, results) = self.buffer.pop()?;
                on_result(&result_frame, &results)?;
                self.latest = Some((result_frame, results));
            }
        }
        Ok(self.annotation_for(frame.timestamp_ms))
    }

    /// Hand every queued result to `on_result` without touching the annotation state.
    /// Used after the source ends, once the detector has been drained.
    pub fn flush<F>(&mut self, mut on_result: F) -> Result<usize>
    where
        F: FnMut(&Frame, &ResultSet<T>) -> Result<()>,
    {
        let mut flushed = 0;
        while self.buffer.size() > 0 {
            let (result_frame, results) = self.buffer.pop()?;
            on_result(&result_frame, &results)?;
            flushed += 1;
        }
        Ok(flushed)
    }

    /// Whether a frame at `timestamp_ms` would still be drawn with the kept result.
    pub fn is_fresh(&self, timestamp_ms: i64) -> bool {
        match self.received_at_ms {
            Some(received) => self.latest.is_some() && timestamp_ms - received <= self.window_ms,
            None => false,
        }
    }

    fn annotation_for(&self, timestamp_ms: i64) -> &ResultSet<T> {
        match &self.latest {
            Some((_, results)) if self.is_fresh(timestamp_ms) => results,
            _ => &self.empty,
        }
    }

    /// Forget all state and queued results. The detector must be stopped or drained first.
    pub fn reset(&mut self) {
        self.buffer.reset();
        self.most_recent_frame = None;
        self.latest = None;
        self.received_at_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ColorFormat;

    fn frame_at(ts: i64) -> Frame {
        Frame::packed(vec![0; 3], 1, 1, ColorFormat::Bgr, ts).unwrap()
    }

    fn one(id: u32, value: &'static str) -> ResultSet<&'static str> {
        let mut set = ResultSet::new();
        set.insert(id, value);
        set
    }

    fn no_log(_: &Frame, _: &ResultSet<&'static str>) -> Result<()> {
        Ok(())
    }

    #[test]
    fn result_stays_fresh_within_window() {
        let mut sync = StalenessSynchronizer::new(500);
        sync.sender().push(frame_at(90), one(1, "a"));

        assert_eq!(sync.sync(&frame_at(100), no_log).unwrap().get(&1), Some(&"a"));
        assert_eq!(sync.sync(&frame_at(550), no_log).unwrap().get(&1), Some(&"a"));
        assert!(sync.sync(&frame_at(650), no_log).unwrap().is_empty());
        assert_eq!(sync.most_recent_frame().map(|f| f.timestamp_ms), Some(650));
    }

    #[test]
    fn window_edge_is_inclusive() {
        let mut sync = StalenessSynchronizer::new(500);
        sync.sender().push(frame_at(100), one(1, "a"));
        assert!(!sync.sync(&frame_at(100), no_log).unwrap().is_empty());

        assert_eq!(sync.sync(&frame_at(600), no_log).unwrap().get(&1), Some(&"a"));
        assert!(sync.is_fresh(600));
        assert!(sync.sync(&frame_at(601), no_log).unwrap().is_empty());
    }

    #[test]
    fn frames_before_any_result_are_stale() {
        let mut sync = StalenessSynchronizer::<&'static str>::new(1_000);
        assert!(sync.sync(&frame_at(0), no_log).unwrap().is_empty());
        assert!(sync.sync(&frame_at(5), no_log).unwrap().is_empty());
        assert!(!sync.is_fresh(5));
    }

    #[test]
    fn backlog_logs_everything_and_shows_the_last() {
        let mut sync = StalenessSynchronizer::new(100);
        let sender = sync.sender();
        sender.push(frame_at(10), one(1, "first"));
        sender.push(frame_at(20), ResultSet::new());
        sender.push(frame_at(30), one(2, "last"));

        let mut logged = Vec::new();
        let shown = sync
            .sync(&frame_at(40), |frame, results| {
                logged.push((frame.timestamp_ms, results.len()));
                Ok(())
            })
            .unwrap()
            .clone();
        assert_eq!(logged, vec![(10, 1), (20, 0), (30, 1)]);
        assert_eq!(shown.get(&2), Some(&"last"));
        assert_eq!(sync.buffer().size(), 0);
    }

    #[test]
    fn empty_result_set_replaces_the_kept_one() {
        let mut sync = StalenessSynchronizer::new(100);
        sync.sender().push(frame_at(0), one(1, "a"));
        assert!(!sync.sync(&frame_at(0), no_log).unwrap().is_empty());
        sync.sender().push(frame_at(33), ResultSet::new());
        assert!(sync.sync(&frame_at(33), no_log).unwrap().is_empty());
    }

    #[test]
    fn new_result_restarts_the_window() {
        let mut sync = StalenessSynchronizer::new(50);
        sync.sender().push(frame_at(0), one(1, "a"));
        sync.sync(&frame_at(0), no_log).unwrap();
        assert!(sync.sync(&frame_at(100), no_log).unwrap().is_empty());
        sync.sender().push(frame_at(90), one(1, "b"));
        assert_eq!(sync.sync(&frame_at(120), no_log).unwrap().get(&1), Some(&"b"));
    }

    #[test]
    fn flush_and_reset_clear_everything() {
        let mut sync = StalenessSynchronizer::new(100);
        sync.sender().push(frame_at(0), one(1, "a"));
        sync.sync(&frame_at(0), no_log).unwrap();
        sync.sender().push(frame_at(10), one(1, "b"));
        sync.sender().push(frame_at(20), one(1, "c"));

        let mut seen = Vec::new();
        let flushed = sync
            .flush(|frame, _| {
                seen.push(frame.timestamp_ms);
                Ok(())
            })
            .unwrap();
        assert_eq!(flushed, 2);
        assert_eq!(seen, vec![10, 20]);

        sync.reset();
        assert!(sync.latest().is_none());
        assert!(sync.most_recent_frame().is_none());
        assert_eq!(sync.buffer().counters().processed_frames, 0);
        assert!(sync.sync(&frame_at(30), no_log).unwrap().is_empty());
    }

    #[test]
    fn callback_errors_propagate() {
        let mut sync = StalenessSynchronizer::new(100);
        sync.sender().push(frame_at(0), one(1, "a"));
        let err = sync
            .sync(&frame_at(0), |_, _| Err(anyhow::anyhow!("disk full")))
            .unwrap_err();
        assert!(err.to_string().contains("disk full"));
    }
}
