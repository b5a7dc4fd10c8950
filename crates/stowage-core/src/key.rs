//! Object key construction

use std::fmt;
use std::path::Path;

use uuid::Uuid;

use crate::hash::md5_hash;

/// A normalized, base-path-qualified object key.
///
/// Segments are separated by a single `/`, with no leading or trailing
/// separator and no `.`/`..` segments. The name is resolved on its own
/// before joining, so a `..` in it never climbs above the base path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Join `name` under `base_path`
    pub fn new(base_path: &str, name: &str) -> Self {
        let base = join_path(&[base_path]);
        let name = join_path(&[name]);
        Self(join_path(&[&base, &name]))
    }

    /// Random unique name (UUID v4) with `extension`
    pub fn unique(base_path: &str, extension: &str) -> Self {
        let name = format!("{}{}", Uuid::new_v4(), normalize_extension(extension));
        Self::new(base_path, &name)
    }

    /// Content-addressed name: hex MD5 of `content` with `extension`
    pub fn content_hash(base_path: &str, content: &[u8], extension: &str) -> Self {
        let name = format!("{}{}", md5_hash(content), normalize_extension(extension));
        Self::new(base_path, &name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key relative to `base_path`
    pub fn name<'a>(&'a self, base_path: &str) -> &'a str {
        let base = join_path(&[base_path]);
        if base.is_empty() {
            return &self.0;
        }
        self.0
            .strip_prefix(base.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(&self.0)
    }

    /// Percent-encode each segment for use in a URL path
    pub fn url_path(&self) -> String {
        self.0
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Join path pieces with `/`, collapsing separators and resolving `.`/`..`
pub fn join_path(parts: &[&str]) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for part in parts {
        for segment in part.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                s => segments.push(s),
            }
        }
    }

    segments.join("/")
}

/// Extension of `path` including its leading dot, or an empty string
pub fn extension_of(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default()
}

/// Ensure a non-empty extension starts with a dot
pub fn normalize_extension(extension: &str) -> String {
    if extension.is_empty() || extension.starts_with('.') {
        extension.to_string()
    } else {
        format!(".{}", extension)
    }
}
