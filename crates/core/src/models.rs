use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// A discovered file, together with its directory relative to the scan root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub relative_dir: PathBuf,
}

impl Candidate {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Quality score, always within 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Score(u8);

impl Score {
    pub const MAX: u8 = 100;

    pub fn new(value: u64) -> Option<Self> {
        if value <= Self::MAX as u64 {
            Some(Score(value as u8))
        } else {
            None
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Zero-padded bucket directory name, e.g. `073`.
    pub fn bucket(self) -> String {
        format!("{:03}", self.0)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSet {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
}

impl TagSet {
    pub fn joined_keywords(&self) -> String {
        self.keywords.join(";")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassificationFailure {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("score {0} is outside 0-100")]
    OutOfRange(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationResult {
    Score(Score),
    Tags(TagSet),
    Failure(ClassificationFailure),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    #[error(transparent)]
    Classification(#[from] ClassificationFailure),
    #[error("io error: {0}")]
    Io(String),
    #[error("worker failed: {0}")]
    Worker(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Succeeded,
    Skipped,
    Failed(ItemError),
}

impl ItemOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ItemOutcome::Succeeded => "succeeded",
            ItemOutcome::Skipped => "skipped",
            ItemOutcome::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub discovered: usize,
    pub dispatched: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub duration: Duration,
}

impl BatchSummary {
    pub fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Succeeded => self.succeeded += 1,
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Failed(_) => self.failed += 1,
        }
    }

    /// Dispatched items per second of wall-clock time.
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.dispatched as f64 / secs
        } else {
            0.0
        }
    }

    pub fn total_outcomes(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }
}
