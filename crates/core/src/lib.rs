//! Core library: discovery, classification, side effects and the batch scheduler.

pub mod apply;
pub mod batch;
pub mod classifier;
pub mod config;
pub mod error;
pub mod filter;
pub mod metadata;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod scanner;

pub use batch::BatchScheduler;
pub use error::BatchError;
pub use models::{BatchSummary, ItemOutcome};
