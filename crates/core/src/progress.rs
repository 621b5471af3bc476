//! Progress events emitted by the scheduler, and the sinks that consume them.

use crate::models::{BatchSummary, ItemOutcome};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub total: usize,
    pub elapsed: Duration,
    /// Completed items per second since dispatch started.
    pub rate: f64,
}

#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Discovery and filtering finished; `dispatched` items go to the workers.
    Started {
        discovered: usize,
        dispatched: usize,
        workers: usize,
    },
    /// Skipped by the idempotency filter without using a worker slot.
    Filtered { path: PathBuf },
    Completed {
        path: PathBuf,
        outcome: ItemOutcome,
        snapshot: ProgressSnapshot,
    },
    Finished { summary: BatchSummary },
}

pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_event(&self, _event: ProgressEvent) {}
}

/// Forwards events to an unbounded channel; a dropped receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelSink {
    fn on_event(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }
}

/// Completion counter and rate; owned by the single task that drains worker results.
#[derive(Debug)]
pub struct ProgressTracker {
    started: Instant,
    completed: usize,
    total: usize,
}

impl ProgressTracker {
    pub fn start(total: usize) -> Self {
        Self {
            started: Instant::now(),
            completed: 0,
            total,
        }
    }

    pub fn record(&mut self) -> ProgressSnapshot {
        self.completed += 1;
        let elapsed = self.started.elapsed();
        let secs = elapsed.as_secs_f64();
        ProgressSnapshot {
            completed: self.completed,
            total: self.total,
            elapsed,
            rate: if secs > 0.0 {
                self.completed as f64 / secs
            } else {
                0.0
            },
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
