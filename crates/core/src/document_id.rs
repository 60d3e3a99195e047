//! Reversible document identity tokens.
//!
//! A document is identified by its `(project_id, document_label)` pair. The
//! token is the URL-safe base64 encoding of `"{project_id}\n{label}"` with
//! padding stripped, so it can be embedded in a path segment as-is.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::{CoreError, ErrorCode};

pub fn encode_document_id(project_id: &str, document_label: &str) -> String {
    URL_SAFE_NO_PAD.encode(format!("{project_id}\n{document_label}"))
}

/// Decode a token produced by [`encode_document_id`].
///
/// Padded input is accepted. Fails with `INVALID_DOCUMENT_ID` when the token
/// is empty, not base64, not UTF-8, or lacks the separator.
pub fn decode_document_id(token: &str) -> Result<(String, String), CoreError> {
    let invalid = || CoreError::validation(ErrorCode::InvalidDocumentId, "invalid document_id");

    let trimmed = token.trim().trim_end_matches('=');
    if trimmed.is_empty() {
        return Err(invalid());
    }
    let bytes = URL_SAFE_NO_PAD.decode(trimmed).map_err(|_| invalid())?;
    let raw = String::from_utf8(bytes).map_err(|_| invalid())?;
    let (project_id, label) = raw.split_once('\n').ok_or_else(invalid)?;
    Ok((project_id.to_string(), label.to_string()))
}
