//! Append-only execution history for the PLM router.
//!
//! Entries are kept most-recent-first in memory, optionally mirrored to a
//! newline-delimited JSON file, and queried through [`HistoryFilter`].
//! Project and document views are derived on demand from the log.

pub mod entry;
pub mod filter;
pub mod persistence;
pub mod store;
pub mod views;

pub use entry::HistoryEntry;
pub use filter::HistoryFilter;
pub use persistence::HistoryError;
pub use store::{AnnotationRequest, HistoryConfig, HistoryStore};
pub use views::{DocumentSummary, ProjectSummary};
