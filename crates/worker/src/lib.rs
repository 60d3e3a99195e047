//! Task execution engine for the PLM router.
//!
//! [`TaskManager`] owns the job queue, the worker pool, the task registry
//! and the periodic sweep of expired run directories.

pub mod cleanup;
pub mod manager;
pub mod queue;
pub mod task;

pub use cleanup::CleanupReport;
pub use manager::{TaskManager, WorkerConfig};
pub use task::{TaskCounts, TaskRecord};
