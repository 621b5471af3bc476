//! Batch scheduler: discovery, filtering, bounded-parallel dispatch, aggregation.

use crate::config::BatchConfig;
use crate::error::BatchError;
use crate::models::{BatchSummary, Candidate, ClassificationResult, ItemError, ItemOutcome};
use crate::pipeline::Pipeline;
use crate::progress::{NullSink, ProgressEvent, ProgressSink, ProgressTracker};
use crate::scanner;
use futures::stream::{self, StreamExt};
use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{self, JoinError};
use tracing::{debug, info, warn};

pub struct BatchScheduler {
    pipeline: Arc<dyn Pipeline>,
    batch: BatchConfig,
    sink: Arc<dyn ProgressSink>,
}

struct Discovered {
    total: usize,
    dispatch: Vec<Candidate>,
    filtered: Vec<Candidate>,
}

impl BatchScheduler {
    pub fn new(pipeline: Arc<dyn Pipeline>, batch: BatchConfig) -> Self {
        Self {
            pipeline,
            batch,
            sink: Arc::new(NullSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Runs one batch over `scan_root`. Only batch-level preconditions return `Err`;
    /// every per-item failure ends up counted in the summary.
    pub async fn run(&self, scan_root: &Path) -> Result<BatchSummary, BatchError> {
        if !scan_root.is_dir() {
            return Err(BatchError::InvalidRoot(scan_root.to_path_buf()));
        }
        self.pipeline.validate()?;

        info!(root = %scan_root.display(), pipeline = self.pipeline.name(), "scanning");
        let found = self.discover(scan_root).await?;
        let workers = self.batch.effective_workers();

        let mut summary = BatchSummary {
            discovered: found.total,
            dispatched: found.dispatch.len(),
            ..BatchSummary::default()
        };
        info!(
            discovered = found.total,
            skipped = found.filtered.len(),
            to_process = found.dispatch.len(),
            workers,
            "discovery complete"
        );
        self.sink.on_event(ProgressEvent::Started {
            discovered: found.total,
            dispatched: found.dispatch.len(),
            workers,
        });

        for candidate in found.filtered {
            info!(path = %candidate.path.display(), "already processed, skipping");
            summary.record(&ItemOutcome::Skipped);
            self.sink.on_event(ProgressEvent::Filtered {
                path: candidate.path,
            });
        }

        if found.dispatch.is_empty() {
            summary.duration = Duration::ZERO;
            self.sink.on_event(ProgressEvent::Finished {
                summary: summary.clone(),
            });
            return Ok(summary);
        }

        let mut tracker = ProgressTracker::start(found.dispatch.len());
        let mut completions = stream::iter(found.dispatch)
            .map(|candidate| process_item(self.pipeline.clone(), candidate))
            .buffer_unordered(workers);

        // Single consumer: counters and rate are only touched here.
        while let Some((path, outcome)) = completions.next().await {
            if let ItemOutcome::Failed(reason) = &outcome {
                warn!(path = %path.display(), %reason, "item failed");
            }
            summary.record(&outcome);
            let snapshot = tracker.record();
            self.sink.on_event(ProgressEvent::Completed {
                path,
                outcome,
                snapshot,
            });
        }

        summary.duration = tracker.elapsed();
        info!(
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            secs = summary.duration.as_secs_f64(),
            "batch complete"
        );
        self.sink.on_event(ProgressEvent::Finished {
            summary: summary.clone(),
        });
        Ok(summary)
    }

    async fn discover(&self, scan_root: &Path) -> Result<Discovered, BatchError> {
        let pipeline = self.pipeline.clone();
        let opts = pipeline.scan_options(scan_root, &self.batch);
        let root = scan_root.to_path_buf();

        task::spawn_blocking(move || -> anyhow::Result<Discovered> {
            let candidates = scanner::discover(&root, &opts)?;
            let total = candidates.len();
            let (filtered, dispatch): (Vec<Candidate>, Vec<Candidate>) = candidates
                .into_iter()
                .partition(|c| pipeline.should_skip(c));
            Ok(Discovered {
                total,
                dispatch,
                filtered,
            })
        })
        .await
        .map_err(|e| BatchError::Discovery(e.to_string()))?
        .map_err(|e| BatchError::Discovery(format!("{:#}", e)))
    }
}

/// Runs classify then apply for one item on its own task, so a panic in either
/// becomes a `Failed` outcome instead of tearing down the batch.
async fn process_item(pipeline: Arc<dyn Pipeline>, candidate: Candidate) -> (PathBuf, ItemOutcome) {
    let path = candidate.path.clone();
    debug!(path = %path.display(), "processing");

    let handle = task::spawn(async move {
        let result = pipeline.classify(&candidate).await;
        if let ClassificationResult::Failure(failure) = result {
            return ItemOutcome::Failed(failure.into());
        }
        task::spawn_blocking(move || pipeline.apply(&candidate, result))
            .await
            .unwrap_or_else(worker_failure)
    });
    let outcome = handle.await.unwrap_or_else(worker_failure);
    (path, outcome)
}

fn worker_failure(err: JoinError) -> ItemOutcome {
    let message = if err.is_panic() {
        panic_message(err.into_panic())
    } else {
        err.to_string()
    };
    ItemOutcome::Failed(ItemError::Worker(message))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
