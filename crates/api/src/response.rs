//! Shared response envelope types for API handlers.

use serde::Serialize;

/// `{ "status": "ok", "count": n, "items": [...] }` envelope used by every
/// list endpoint.
///
/// ```ignore
/// Ok(Json(ListResponse::new(entries)))
/// ```
#[derive(Debug, Serialize)]
pub struct ListResponse<T: Serialize> {
    pub status: &'static str,
    pub count: usize,
    pub items: Vec<T>,
}

impl<T: Serialize> ListResponse<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            status: "ok",
            count: items.len(),
            items,
        }
    }
}
