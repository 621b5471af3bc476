//! Terminal-facing pieces of the CLI: progress rendering and summaries.
pub mod render;
pub mod summary;
