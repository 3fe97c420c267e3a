// src/observe/path.rs

//! Path normalization shared by the registry and the providers.

/// Normalize a remote path to the form used as a registry key.
///
/// - A leading `/` is added if missing.
/// - A single trailing `/` is stripped.
///
/// Both `"foo/bar/"` and `"/foo/bar"` become `"/foo/bar"`. The root (`"/"` or
/// `""`) becomes the empty string, which is also how Dropbox spells its root.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };

    if normalized.ends_with('/') {
        normalized.pop();
    }

    normalized
}
