//! Worker-thread detector.
//!
//! Frames are queued on an unbounded channel so `process` never waits on detection.
//! The worker runs the backend and pushes each result set, paired with its frame, into
//! the result buffer. A reset is queued behind pending frames and acknowledged once the
//! worker reaches it, which is what makes `reset` a drain.

use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

use crate::detect::backend::{Detector, DetectorBackend};
use crate::frame::Frame;
use crate::sync::ResultSender;

enum Command {
    Frame(Frame),
    Reset(Sender<()>),
}

struct Worker<B> {
    commands: Sender<Command>,
    handle: JoinHandle<B>,
}

pub struct ThreadedDetector<T, B> {
    backend: Option<B>,
    results: ResultSender<T>,
    callback_interval_ms: u64,
    worker: Option<Worker<B>>,
}

impl<T, B> ThreadedDetector<T, B>
where
    T: Send + 'static,
    B: DetectorBackend<T> + 'static,
{
    pub fn new(backend: B, results: ResultSender<T>) -> Self {
        Self {
            backend: Some(backend),
            results,
            callback_interval_ms: 0,
            worker: None,
        }
    }

    /// Minimum spacing between analysed frames. Closer frames are skipped and produce
    /// no result set.
    pub fn with_callback_interval(mut self, interval_ms: u64) -> Self {
        self.callback_interval_ms = interval_ms;
        self
    }

    pub fn callback_interval_ms(&self) -> u64 {
        self.callback_interval_ms
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    fn worker(&self) -> Result<&Worker<B>> {
        self.worker
            .as_ref()
            .ok_or_else(|| anyhow!("detector is not started"))
    }
}

impl<T, B> Detector for ThreadedDetector<T, B>
where
    T: Send + 'static,
    B: DetectorBackend<T> + 'static,
{
    fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Err(anyhow!("detector already started"));
        }
        let mut backend = self
            .backend
            .take()
            .ok_or_else(|| anyhow!("detector backend unavailable"))?;
        if let Err(err) = backend.warm_up() {
            let name = backend.name();
            self.backend = Some(backend);
            return Err(err).with_context(|| format!("warm up detector backend '{}'", name));
        }

        let (commands, queue) = unbounded();
        let results = self.results.clone();
        let interval = i64::try_from(self.callback_interval_ms).unwrap_or(i64::MAX);
        let name = backend.name();
        let handle = thread::Builder::new()
            .name(format!("detector-{}", name))
            .spawn(move || run_worker(backend, queue, results, interval))
            .context("spawn detector worker")?;
        log::info!(
            "detector '{}' started (callback interval {} ms)",
            name,
            self.callback_interval_ms
        );
        self.worker = Some(Worker { commands, handle });
        Ok(())
    }

    fn process(&mut self, frame: &Frame) -> Result<()> {
        self.worker()?
            .commands
            .send(Command::Frame(frame.clone()))
            .map_err(|_| anyhow!("detector worker exited"))
    }

    fn reset(&mut self) -> Result<()> {
        match &self.worker {
            Some(worker) => {
                let (ack, done) = bounded(1);
                worker
                    .commands
                    .send(Command::Reset(ack))
                    .map_err(|_| anyhow!("detector worker exited"))?;
                done.recv()
                    .map_err(|_| anyhow!("detector worker exited during reset"))
            }
            None => {
                if let Some(backend) = self.backend.as_mut() {
                    backend.reset();
                }
                Ok(())
            }
        }
    }

    fn stop(&mut self) -> Result<()> {
        let Some(Worker { commands, handle }) = self.worker.take() else {
            return Ok(());
        };
        // Closing the channel ends the worker loop after pending frames.
        drop(commands);
        let backend = handle
            .join()
            .map_err(|_| anyhow!("detector worker panicked"))?;
        log::info!("detector '{}' stopped", backend.name());
        self.backend = Some(backend);
        Ok(())
    }
}

impl<T, B> Drop for ThreadedDetector<T, B> {
    fn drop(&mut self) {
        if let Some(Worker { commands, handle }) = self.worker.take() {
            drop(commands);
            let _ = handle.join();
        }
    }
}

fn run_worker<T, B: DetectorBackend<T>>(
    mut backend: B,
    queue: Receiver<Command>,
    results: ResultSender<T>,
    interval_ms: i64,
) -> B {
    let mut last_processed: Option<i64> = None;
    for command in queue.iter() {
        match command {
            Command::Frame(frame) => {
                if let Some(last) = last_processed {
                    if interval_ms > 0 && frame.timestamp_ms - last < interval_ms {
                        continue;
                    }
                }
                match backend.detect(&frame) {
                    Ok(found) => {
                        last_processed = Some(frame.timestamp_ms);
                        results.push(frame, found);
                    }
                    Err(err) => log::warn!(
                        "{}: detection failed at {} ms: {:#}",
                        backend.name(),
                        frame.timestamp_ms,
                        err
                    ),
                }
            }
            Command::Reset(ack) => {
                backend.reset();
                last_processed = None;
                let _ = ack.send(());
            }
        }
    }
    backend
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{ColorFormat, ResultSet};
    use crate::sync::ResultBuffer;

    /// Reports the frame timestamp as the single entity payload.
    struct Echo {
        resets: u32,
    }

    impl DetectorBackend<i64> for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn detect(&mut self, frame: &Frame) -> Result<ResultSet<i64>> {
            let mut set = ResultSet::new();
            set.insert(1, frame.timestamp_ms);
            Ok(set)
        }

        fn reset(&mut self) {
            self.resets += 1;
        }
    }

    fn frame_at(ts: i64) -> Frame {
        Frame::packed(vec![0; 3], 1, 1, ColorFormat::Bgr, ts).unwrap()
    }

    #[test]
    fn results_arrive_in_frame_order_after_reset() {
        let buffer = ResultBuffer::<i64>::new();
        let mut detector = ThreadedDetector::new(Echo { resets: 0 }, buffer.sender());
        detector.start().unwrap();
        for ts in [0, 33, 66, 100] {
            detector.process(&frame_at(ts)).unwrap();
        }
        detector.reset().unwrap();
        assert_eq!(buffer.size(), 4);
        let mut seen = Vec::new();
        while buffer.size() > 0 {
            let (frame, results) = buffer.pop().unwrap();
            assert_eq!(results.get(&1), Some(&frame.timestamp_ms));
            seen.push(frame.timestamp_ms);
        }
        assert_eq!(seen, vec![0, 33, 66, 100]);
        detector.stop().unwrap();
        assert_eq!(detector.backend.as_ref().map(|b| b.resets), Some(1));
    }

    #[test]
    fn callback_interval_skips_close_frames() {
        let buffer = ResultBuffer::<i64>::new();
        let mut detector =
            ThreadedDetector::new(Echo { resets: 0 }, buffer.sender()).with_callback_interval(100);
        detector.start().unwrap();
        for ts in [0, 40, 80, 120, 160, 240] {
            detector.process(&frame_at(ts)).unwrap();
        }
        detector.reset().unwrap();
        let mut seen = Vec::new();
        while let Ok((frame, _)) = buffer.pop() {
            seen.push(frame.timestamp_ms);
        }
        assert_eq!(seen, vec![0, 120, 240]);

        // The interval restarts after a reset.
        detector.process(&frame_at(0)).unwrap();
        detector.reset().unwrap();
        assert_eq!(buffer.size(), 1);
        detector.stop().unwrap();
    }

    #[test]
    fn process_requires_start_and_stop_is_idempotent() {
        let buffer = ResultBuffer::<i64>::new();
        let mut detector = ThreadedDetector::new(Echo { resets: 0 }, buffer.sender());
        assert!(detector.process(&frame_at(0)).is_err());
        detector.start().unwrap();
        assert!(detector.start().is_err());
        detector.stop().unwrap();
        detector.stop().unwrap();
        assert!(!detector.is_running());
    }
}
