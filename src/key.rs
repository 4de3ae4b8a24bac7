//! Key prefix transforms and the key <-> path mapping of the tree layout.
//!
//! Keys are `/`-delimited. Prefix tests compare whole segments, so the
//! prefix `vault` matches `vault/core` but not `vaultx/core`.
//!
//! On disk, every segment of a key except the last is a directory and the
//! last segment is stored as a file named `_<segment>`:
//!
//! ```text
//! core/seal-config   ->   <root>/core/_seal-config
//! ```

use crate::error::{ConvertError, Result};
use std::path::{Component, Path, PathBuf};

/// Marker prepended to the final key segment to form a leaf file name
pub const LEAF_MARKER: char = '_';

/// Lexically clean a key prefix and reject prefixes that would address the
/// whole keyspace (`/` or `.` after cleaning).
pub fn normalize_prefix(raw: &str) -> Result<String> {
    let cleaned = clean(raw);
    if cleaned == "/" || cleaned == "." {
        return Err(ConvertError::InvalidPrefix(raw.to_string()));
    }
    Ok(cleaned)
}

/// Shortest lexical equivalent of a slash-separated path: repeated
/// separators collapse, `.` segments vanish and `..` consumes its parent.
fn clean(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut out: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match out.last() {
                Some(&last) if last != ".." => {
                    out.pop();
                }
                _ if rooted => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }

    let joined = out.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// `prefix/key`, or `key` unchanged when the prefix is empty
pub fn add_prefix(key: &str, prefix: &str) -> String {
    if prefix.is_empty() {
        return key.to_string();
    }
    format!("{}/{}", prefix, key)
}

/// True when the leading segments of `key` equal the segments of `prefix`
pub fn has_prefix(key: &str, prefix: &str) -> bool {
    let mut key_segments = key.split('/');
    prefix
        .split('/')
        .all(|p| key_segments.next().is_some_and(|k| k == p))
}

/// Remove the segments of `prefix` from the front of `key`.
///
/// A key outside the prefix is returned unchanged; callers that need to
/// tell the two cases apart test [`has_prefix`] first.
pub fn strip_prefix(key: &str, prefix: &str) -> String {
    if !has_prefix(key, prefix) {
        return key.to_string();
    }
    let depth = prefix.split('/').count();
    key.split('/').skip(depth).collect::<Vec<_>>().join("/")
}

/// Relative on-disk location of the leaf file for `key`
pub fn key_to_relative_path(key: &str) -> Result<PathBuf> {
    if key.is_empty() {
        return Err(ConvertError::EmptyKey);
    }

    let segments: Vec<&str> = key.split('/').collect();
    let mut path = PathBuf::new();
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() || *segment == "." || *segment == ".." {
            return Err(ConvertError::InvalidKey(format!(
                "{:?} has an unusable path segment",
                key
            )));
        }
        if i + 1 == segments.len() {
            path.push(format!("{}{}", LEAF_MARKER, segment));
        } else {
            path.push(segment);
        }
    }
    Ok(path)
}

/// Key stored at `relative`, a leaf file path relative to the tree root
pub fn relative_path_to_key(relative: &Path) -> Result<String> {
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(name) => {
                let name = name.to_str().ok_or_else(|| {
                    ConvertError::InvalidKey(format!("{} is not valid UTF-8", relative.display()))
                })?;
                segments.push(name);
            }
            _ => {
                return Err(ConvertError::InvalidKey(format!(
                    "{} is not a plain relative path",
                    relative.display()
                )))
            }
        }
    }

    let leaf = segments
        .pop()
        .ok_or_else(|| ConvertError::InvalidKey("empty path".into()))?;
    let name = leaf
        .strip_prefix(LEAF_MARKER)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            ConvertError::InvalidFormat(format!(
                "{} is not a leaf file (expected a '{}' name prefix)",
                relative.display(),
                LEAF_MARKER
            ))
        })?;

    segments.push(name);
    Ok(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("vault").unwrap(), "vault");
        assert_eq!(normalize_prefix("vault/").unwrap(), "vault");
        assert_eq!(normalize_prefix("a//b/./c").unwrap(), "a/b/c");
        assert_eq!(normalize_prefix("a/b/../c").unwrap(), "a/c");
        assert_eq!(normalize_prefix("/vault").unwrap(), "/vault");
    }

    #[test]
    fn test_normalize_prefix_rejects_degenerate() {
        for raw in ["/", ".", "", "./", "a/..", "//", "/.."] {
            let err = normalize_prefix(raw).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Config, "prefix {:?}", raw);
        }
    }

    #[test]
    fn test_add_prefix() {
        assert_eq!(add_prefix("secret/x", "vault"), "vault/secret/x");
        assert_eq!(add_prefix("secret/x", ""), "secret/x");
        assert_eq!(add_prefix("x", "a/b"), "a/b/x");
    }

    #[test]
    fn test_has_prefix_is_segment_wise() {
        assert!(has_prefix("vault/secret/x", "vault"));
        assert!(has_prefix("vault", "vault"));
        assert!(has_prefix("a/b/c", "a/b"));
        assert!(!has_prefix("vaultx/secret", "vault"));
        assert!(!has_prefix("other/x", "vault"));
        assert!(!has_prefix("a", "a/b"));
    }

    #[test]
    fn test_strip_prefix() {
        assert_eq!(strip_prefix("vault/secret/x", "vault"), "secret/x");
        assert_eq!(strip_prefix("a/b/c", "a/b"), "c");
        assert_eq!(strip_prefix("vault", "vault"), "");
    }

    #[test]
    fn test_strip_prefix_mismatch_returns_key() {
        assert_eq!(strip_prefix("other/x", "vault"), "other/x");
        assert_eq!(strip_prefix("vaultx/y", "vault"), "vaultx/y");
        assert_eq!(strip_prefix("a", "a/b"), "a");
    }

    #[test]
    fn test_key_to_relative_path() {
        assert_eq!(
            key_to_relative_path("secret/x").unwrap(),
            PathBuf::from("secret").join("_x")
        );
        assert_eq!(key_to_relative_path("top").unwrap(), PathBuf::from("_top"));
    }

    #[test]
    fn test_key_to_relative_path_rejects_escapes() {
        for key in ["", "a//b", "a/", "../x", "a/./b", "/abs"] {
            assert!(key_to_relative_path(key).is_err(), "key {:?}", key);
        }
    }

    #[test]
    fn test_relative_path_to_key() {
        let path = Path::new("logical").join("abc").join("_token");
        assert_eq!(relative_path_to_key(&path).unwrap(), "logical/abc/token");
        assert_eq!(relative_path_to_key(Path::new("_top")).unwrap(), "top");
    }

    #[test]
    fn test_relative_path_without_marker_is_format_error() {
        let err = relative_path_to_key(Path::new("core/seal")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(relative_path_to_key(Path::new("core/_")).is_err());
    }
}
