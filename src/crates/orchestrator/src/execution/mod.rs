//! Task execution.
//!
//! - [`engine`]: runs one task through its lifecycle
//! - [`progress`]: the progress and cancellation checkpoint handed to executors

pub mod engine;
pub mod progress;

pub use engine::ExecutionEngine;
pub use progress::ProgressReporter;
