use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a batch before any item is dispatched.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("input directory not found: {}", .0.display())]
    InvalidRoot(PathBuf),
    #[error("an output directory must be specified for scoring")]
    MissingOutput,
    #[error("discovery failed: {0}")]
    Discovery(String),
}
