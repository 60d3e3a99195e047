//! Invocation of the external asset converter.
//!
//! The converter is a black box with a file-based contract: it is given an
//! input file and an output directory and must leave a `manifest.json`
//! listing the artifacts it produced.

pub mod process;
pub mod urls;

use std::collections::BTreeMap;

use async_trait::async_trait;
use plm_core::error::ErrorCode;
use plm_core::task::TaskConfig;
use serde::Serialize;

pub use process::ProcessConverter;

/// Name of the manifest file the converter writes into its output directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Errors from a single conversion. Never fatal to the caller's worker.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// The converter exited unsuccessfully; carries its error text.
    #[error("{0}")]
    Failed(String),

    #[error("manifest.json missing or invalid")]
    ManifestMissing,

    /// The converter could not be run, or the run was aborted.
    #[error("{0}")]
    Exception(String),
}

impl ConvertError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ConvertError::Failed(_) => ErrorCode::ConvertFailed,
            ConvertError::ManifestMissing => ErrorCode::ManifestMissing,
            ConvertError::Exception(_) => ErrorCode::ConvertException,
        }
    }
}

/// Successful conversion payload, merged into `/convert` and `/status` responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionResult {
    pub document_id: String,
    pub manifest: serde_json::Value,
    pub manifest_path: String,
    pub viewer_url: String,
    /// Artifact key from the manifest to absolute URL.
    pub artifact_urls: BTreeMap<String, String>,
    pub output_dir: String,
}

/// Runs one conversion to completion.
#[async_trait]
pub trait Converter: Send + Sync {
    async fn convert(&self, config: &TaskConfig) -> Result<ConversionResult, ConvertError>;
}
