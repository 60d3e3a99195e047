//! Shared domain types for the PLM router.
//!
//! Pure logic with no I/O beyond filesystem path resolution: the error
//! taxonomy, the document identity codec, task configuration, annotation
//! normalization and request-field parsing helpers.

pub mod annotation;
pub mod document_id;
pub mod error;
pub mod parsing;
pub mod paths;
pub mod task;
pub mod types;
