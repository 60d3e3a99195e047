use crate::entry::HistoryEntry;

/// Typed filter shared by every history query.
///
/// Empty fields do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    /// Exact project id.
    pub project_id: String,
    /// Exact lifecycle state name.
    pub state: String,
    /// Event kind, compared case-insensitively.
    pub event: String,
    /// Owner, compared case-insensitively.
    pub owner: String,
    /// Every tag must be present on the entry (case-insensitive).
    pub tags: Vec<String>,
    /// Case-insensitive substring of the revision note.
    pub revision: String,
    /// Inclusive lower bound on `created_at`.
    pub from: String,
    /// Inclusive upper bound on `created_at`.
    pub to: String,
}

impl HistoryFilter {
    pub fn matches(&self, entry: &HistoryEntry) -> bool {
        if !self.project_id.is_empty() && entry.project_id != self.project_id {
            return false;
        }
        if !self.state.is_empty() && entry.state.as_str() != self.state {
            return false;
        }
        let event = self.event.trim();
        if !event.is_empty() && !entry.event.as_str().eq_ignore_ascii_case(event) {
            return false;
        }
        if !self.matches_metadata(entry) {
            return false;
        }
        let created = entry.created_at.as_str();
        if !created.is_empty() {
            if !self.from.is_empty() && created < self.from.as_str() {
                return false;
            }
            if !self.to.is_empty() && created > self.to.as_str() {
                return false;
            }
        }
        true
    }

    fn matches_metadata(&self, entry: &HistoryEntry) -> bool {
        if !self.owner.is_empty() && entry.owner.to_lowercase() != self.owner.to_lowercase() {
            return false;
        }
        if !self.tags.is_empty() {
            let present: Vec<String> = entry.tags.iter().map(|t| t.to_lowercase()).collect();
            if !self
                .tags
                .iter()
                .all(|required| present.contains(&required.to_lowercase()))
            {
                return false;
            }
        }
        if !self.revision.is_empty()
            && !entry
                .revision_note
                .to_lowercase()
                .contains(&self.revision.to_lowercase())
        {
            return false;
        }
        true
    }
}
