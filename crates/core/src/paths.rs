//! Filesystem path resolution and allowlists.
//!
//! Paths are resolved against a root directory. Existing paths are
//! canonicalized; paths that do not exist yet are normalized lexically so
//! `..` segments cannot escape an allowlist check.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use crate::parsing::{normalize_extension, parse_csv};

/// Resolve `value` against `root` when relative, then canonicalize.
pub fn resolve_path(root: &Path, value: &str) -> PathBuf {
    let candidate = Path::new(value.trim());
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };
    std::fs::canonicalize(&joined).unwrap_or_else(|_| lexical_normalize(&joined))
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// `true` when `path` equals `base` or lies beneath it.
pub fn is_within(path: &Path, base: &Path) -> bool {
    path.starts_with(base)
}

/// Set of files or directories an operator permits for a given purpose.
///
/// An empty allowlist permits everything.
#[derive(Debug, Clone, Default)]
pub struct PathAllowlist {
    entries: Vec<PathBuf>,
}

impl PathAllowlist {
    /// Parse a comma-separated list, resolving relative entries against `root`.
    pub fn parse(value: &str, root: &Path) -> Self {
        Self {
            entries: parse_csv(value)
                .iter()
                .map(|entry| resolve_path(root, entry))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    /// A path is allowed when it equals an entry or has an entry as ancestor.
    pub fn allows(&self, path: &Path) -> bool {
        if self.entries.is_empty() {
            return true;
        }
        let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| lexical_normalize(path));
        self.entries.iter().any(|allowed| is_within(&resolved, allowed))
    }
}

/// File extension to converter plugin mapping.
#[derive(Debug, Clone, Default)]
pub struct PluginMap {
    plugins: BTreeMap<String, PathBuf>,
}

impl PluginMap {
    /// Parse `ext=path` or `ext:path` pairs separated by `,` or `;`.
    ///
    /// Malformed pairs are skipped.
    pub fn parse(value: &str, root: &Path) -> Self {
        let mut plugins = BTreeMap::new();
        for token in parse_csv(&value.replace(';', ",")) {
            let Some((ext, path)) = token.split_once('=').or_else(|| token.split_once(':')) else {
                continue;
            };
            let ext = normalize_extension(ext);
            let path = path.trim();
            if ext.is_empty() || path.is_empty() {
                continue;
            }
            plugins.insert(ext, resolve_path(root, path));
        }
        Self { plugins }
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Mapped extensions in sorted order.
    pub fn extensions(&self) -> Vec<String> {
        self.plugins.keys().cloned().collect()
    }

    /// Plugin registered for the extension of `filename`, if any.
    pub fn for_filename(&self, filename: &str) -> Option<&Path> {
        let ext = Path::new(filename).extension()?.to_str()?;
        self.plugins
            .get(&normalize_extension(ext))
            .map(PathBuf::as_path)
    }
}
