//! Thread-safe FIFO of detector results.
//!
//! The detector thread holds a `ResultSender` and pushes `(Frame, ResultSet)` pairs;
//! the processing loop owns the `ResultBuffer` and drains it. Every operation takes the
//! single buffer lock for its own duration only.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::frame::{Frame, ResultSet};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("result buffer is empty")]
    Empty,
}

/// Running counters, reset together with the queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferCounters {
    /// Result sets pushed since the last reset.
    pub processed_frames: u64,
    /// Result sets with at least one entity.
    pub frames_with_entities: u64,
    /// Frame timestamp of the most recent push.
    pub last_result_ms: Option<i64>,
}

impl BufferCounters {
    /// Share of processed frames with at least one entity, in percent.
    pub fn entity_percent(&self) -> f64 {
        if self.processed_frames == 0 {
            return 0.0;
        }
        self.frames_with_entities as f64 * 100.0 / self.processed_frames as f64
    }
}

struct BufferState<T> {
    queue: VecDeque<(Frame, ResultSet<T>)>,
    counters: BufferCounters,
}

type Shared<T> = Arc<Mutex<BufferState<T>>>;

// Critical sections never panic half-way, so a poisoned lock still guards a consistent queue.
fn lock<T>(state: &Shared<T>) -> MutexGuard<'_, BufferState<T>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn push_locked<T>(state: &Shared<T>, frame: Frame, results: ResultSet<T>) {
    let mut guard = lock(state);
    guard.counters.processed_frames += 1;
    if !results.is_empty() {
        guard.counters.frames_with_entities += 1;
    }
    guard.counters.last_result_ms = Some(frame.timestamp_ms);
    guard.queue.push_back((frame, results));
}

/// Consumer side of the result queue.
pub struct ResultBuffer<T> {
    state: Shared<T>,
}

impl<T> ResultBuffer<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BufferState {
                queue: VecDeque::new(),
                counters: BufferCounters::default(),
            })),
        }
    }

    /// Producer handle for the detector callback.
    pub fn sender(&self) -> ResultSender<T> {
        ResultSender {
            state: Arc::clone(&self.state),
        }
    }

    pub fn push(&self, frame: Frame, results: ResultSet<T>) {
        push_locked(&self.state, frame, results);
    }

    /// Remove the oldest pair. Check `size()` first; popping an empty buffer is a bug.
    pub fn pop(&self) -> Result<(Frame, ResultSet<T>), BufferError> {
        lock(&self.state).queue.pop_front().ok_or(BufferError::Empty)
    }

    pub fn size(&self) -> usize {
        lock(&self.state).queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn counters(&self) -> BufferCounters {
        lock(&self.state).counters
    }

    /// Clear the queue and counters. The producer must be stopped first.
    pub fn reset(&self) {
        let mut guard = lock(&self.state);
        guard.queue.clear();
        guard.counters = BufferCounters::default();
    }
}

impl<T> Default for ResultBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer side of the result queue. Cheap to clone; push never blocks beyond the lock.
pub struct ResultSender<T> {
    state: Shared<T>,
}

impl<T> ResultSender<T> {
    pub fn push(&self, frame: Frame, results: ResultSet<T>) {
        push_locked(&self.state, frame, results);
    }
}

impl<T> Clone for ResultSender<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ColorFormat;

    fn frame_at(ts: i64) -> Frame {
        Frame::packed(vec![0; 3], 1, 1, ColorFormat::Bgr, ts).unwrap()
    }

    #[test]
    fn pops_in_push_order() {
        let buffer = ResultBuffer::<u8>::new();
        buffer.push(frame_at(10), ResultSet::new());
        let mut one = ResultSet::new();
        one.insert(4, 1u8);
        buffer.push(frame_at(20), one);
        assert_eq!(buffer.size(), 2);

        let (frame, results) = buffer.pop().unwrap();
        assert_eq!(frame.timestamp_ms, 10);
        assert!(results.is_empty());
        let (frame, results) = buffer.pop().unwrap();
        assert_eq!(frame.timestamp_ms, 20);
        assert_eq!(results.get(&4), Some(&1));
        assert_eq!(buffer.pop().unwrap_err(), BufferError::Empty);
    }

    #[test]
    fn counters_track_pushes_and_reset() {
        let buffer = ResultBuffer::<u8>::new();
        let sender = buffer.sender();
        sender.push(frame_at(0), ResultSet::new());
        let mut one = ResultSet::new();
        one.insert(1, 9u8);
        sender.push(frame_at(33), one);

        let counters = buffer.counters();
        assert_eq!(counters.processed_frames, 2);
        assert_eq!(counters.frames_with_entities, 1);
        assert_eq!(counters.last_result_ms, Some(33));
        assert_eq!(counters.entity_percent(), 50.0);

        // Popping drains the queue but keeps the counters.
        buffer.pop().unwrap();
        assert_eq!(buffer.counters().processed_frames, 2);

        buffer.reset();
        assert!(buffer.is_empty());
        assert_eq!(buffer.counters(), BufferCounters::default());
    }
}
