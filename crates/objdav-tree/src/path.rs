//! Virtual path helpers.
//!
//! All paths handled by the tree are absolute, slash-separated strings.
//! [`normalize`] is the canonical form used as registry key: a leading `/`,
//! no trailing `/` and no empty segments. The root is `"/"`.
//!
//! These functions never touch the registry or the backend.

/// The root path.
pub const ROOT: &str = "/";

/// Iterate over the non-empty components of a path.
pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}

/// Normalize a path into its canonical form.
///
/// Leading, trailing and repeated slashes are collapsed, so `"docs//a/"`
/// becomes `"/docs/a"` and `""` becomes `"/"`.
pub fn normalize(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len() + 1);
    for component in components(path) {
        normalized.push('/');
        normalized.push_str(component);
    }
    if normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}

/// Split a path into `(parent_dir, leaf_name)`.
///
/// Trailing slashes are normalized away first. The parent of a top-level
/// entry is `"/"`, and splitting the root yields `("/", "")`.
pub fn split(path: &str) -> (String, String) {
    let normalized = normalize(path);
    match normalized.rsplit_once('/') {
        Some(("", name)) => (ROOT.to_string(), name.to_string()),
        Some((parent, name)) => (parent.to_string(), name.to_string()),
        None => (ROOT.to_string(), String::new()),
    }
}

/// Join a normalized parent path and a leaf name.
pub fn join(parent: &str, name: &str) -> String {
    if parent == ROOT || parent.is_empty() {
        format!("/{name}")
    } else {
        format!("{}/{}", parent.trim_end_matches('/'), name)
    }
}

/// Returns true if `path` lies strictly below `ancestor`.
///
/// Both arguments must be normalized.
pub fn is_descendant(path: &str, ancestor: &str) -> bool {
    if ancestor == ROOT {
        return path != ROOT;
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}

/// Returns true if `name` can be used as a leaf name.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/')
}
