//! # Workflows Module
//!
//! High-level entry points that run scoring components over molecule batches.
//!
//! - [`score`] - Runs a list of components over one batch with progress reporting
//! - [`progress`] - Progress events and the callback-based [`progress::ProgressReporter`]

pub mod progress;
pub mod score;
