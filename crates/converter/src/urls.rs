//! URL construction for files under the static serve root.

use std::path::{Component, Path};

/// Percent-encoded URL path of `path` relative to `root`.
///
/// Each segment is encoded on its own so `/` separators survive. Paths
/// outside `root` keep their absolute components.
pub fn relative_url_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(segment) => {
                Some(urlencoding::encode(&segment.to_string_lossy()).into_owned())
            }
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// `{base_url}/{relative path}`.
pub fn file_url(base_url: &str, root: &Path, path: &Path) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        relative_url_path(root, path)
    )
}
