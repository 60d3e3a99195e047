//! Query-string parameters shared by the history endpoints.

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use plm_core::parsing::parse_tags;
use plm_history::HistoryFilter;
use serde::Deserialize;

use crate::error::AppError;

/// Page size when `limit` is absent or unparsable.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Filters accepted by `/history`, `/projects`, `/projects/{id}/documents`
/// and `/documents/{id}/versions`.
///
/// Every value is kept as a string so a malformed number degrades to its
/// default instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<String>,
    pub project_id: Option<String>,
    pub state: Option<String>,
    pub event: Option<String>,
    pub owner: Option<String>,
    pub tags: Option<String>,
    /// Alias of `tags`.
    pub tag: Option<String>,
    pub revision: Option<String>,
    /// Alias of `revision`.
    pub revision_note: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl ListQuery {
    /// Result cap: default 50, unparsable 50, negative 0 (unbounded).
    pub fn limit(&self) -> usize {
        match self.limit.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_LIST_LIMIT,
            Some(raw) => match raw.parse::<i64>() {
                Ok(n) if n < 0 => 0,
                Ok(n) => usize::try_from(n).unwrap_or(usize::MAX),
                Err(_) => DEFAULT_LIST_LIMIT,
            },
        }
    }

    pub fn to_filter(&self) -> HistoryFilter {
        let text = |value: &Option<String>| value.as_deref().unwrap_or_default().trim().to_string();
        let first = |primary: &Option<String>, alias: &Option<String>| {
            let primary = text(primary);
            if primary.is_empty() {
                text(alias)
            } else {
                primary
            }
        };

        HistoryFilter {
            project_id: text(&self.project_id),
            state: text(&self.state),
            event: text(&self.event),
            owner: text(&self.owner),
            tags: parse_tags(&first(&self.tags, &self.tag)),
            revision: first(&self.revision, &self.revision_note),
            from: text(&self.from),
            to: text(&self.to),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ListQuery {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<ListQuery>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(query)
    }
}
