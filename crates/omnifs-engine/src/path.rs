//! Path validation and resolution.
//!
//! Paths are absolute, `/`-separated, at most 512 characters, and may not
//! contain NUL bytes, `..` anywhere, or empty segments (`//`). `.` segments
//! are dropped during normalization. Resolution walks the metadata graph
//! from slot 0.

use crate::error::{EngineError, Result};
use omnifs_container::{EntryType, OmniStore, NAME_LEN};

/// Longest accepted path.
pub const MAX_PATH_LENGTH: usize = 512;

/// Longest entry name (the on-disk field keeps one byte for the terminator).
pub const MAX_NAME_LENGTH: usize = NAME_LEN - 1;

/// Slot index of the root directory.
pub const ROOT_INDEX: u32 = 0;

/// Validates path syntax without touching the store.
///
/// # Errors
///
/// Returns `InvalidPath` naming the violated rule.
pub fn validate(path: &str) -> Result<()> {
    if path.is_empty() || !path.starts_with('/') {
        return Err(EngineError::InvalidPath(format!(
            "path must be absolute: {path:?}"
        )));
    }
    if path.len() > MAX_PATH_LENGTH {
        return Err(EngineError::InvalidPath(format!(
            "path exceeds {MAX_PATH_LENGTH} characters"
        )));
    }
    if path.contains('\0') {
        return Err(EngineError::InvalidPath(
            "path contains a NUL byte".to_string(),
        ));
    }
    if path.contains("..") {
        return Err(EngineError::InvalidPath(format!(
            "path traversal is not allowed: {path:?}"
        )));
    }
    if path.contains("//") {
        return Err(EngineError::InvalidPath(format!(
            "empty path segment: {path:?}"
        )));
    }
    Ok(())
}

/// Splits a path into its segments, dropping empties and `.`.
fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty() && *s != ".")
}

/// Normalizes a path: drops `.` segments, collapses separators, strips the
/// trailing slash. Non-absolute input normalizes to `/`.
#[must_use]
pub fn normalize(path: &str) -> String {
    if !path.starts_with('/') {
        return "/".to_string();
    }
    let mut result = String::from("/");
    for segment in segments(path) {
        if result.len() > 1 {
            result.push('/');
        }
        result.push_str(segment);
    }
    result
}

/// Returns the parent path. `parent("/") == "/"`.
#[must_use]
pub fn parent(path: &str) -> String {
    let normalized = normalize(path);
    match normalized.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => normalized[..idx].to_string(),
        None => "/".to_string(),
    }
}

/// Returns the final path segment; empty for the root.
#[must_use]
pub fn filename(path: &str) -> String {
    let normalized = normalize(path);
    if normalized == "/" {
        return String::new();
    }
    match normalized.rfind('/') {
        Some(idx) => normalized[idx + 1..].to_string(),
        None => normalized,
    }
}

/// Joins a directory path and a name.
#[must_use]
pub fn combine(dir: &str, file: &str) -> String {
    let normalized = normalize(dir);
    if normalized == "/" {
        format!("/{file}")
    } else {
        format!("{normalized}/{file}")
    }
}

/// Resolves a path to a metadata slot index.
///
/// # Errors
///
/// Returns `InvalidPath` on bad syntax, `NotFound` when a segment is
/// missing.
pub fn resolve(store: &OmniStore, path: &str) -> Result<u32> {
    validate(path)?;
    let mut current = ROOT_INDEX;
    for segment in segments(path) {
        current = store
            .metadata()
            .find_child(current, segment)
            .ok_or_else(|| EngineError::NotFound(path.to_string()))?;
    }
    Ok(current)
}

/// Resolves a path's parent directory and validates the final name.
///
/// # Errors
///
/// Returns `InvalidPath` for the root or an over-long name, `NotFound` when
/// the parent is missing or not a directory.
pub fn resolve_parent(store: &OmniStore, path: &str) -> Result<(u32, String)> {
    validate(path)?;
    let name = filename(path);
    if name.is_empty() {
        return Err(EngineError::InvalidPath(
            "path has no final component".to_string(),
        ));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(EngineError::InvalidPath(format!(
            "name exceeds {MAX_NAME_LENGTH} characters: {name:?}"
        )));
    }

    let parent_path = parent(path);
    let parent_index = resolve(store, &parent_path)?;
    let parent_entry = store
        .metadata()
        .get(parent_index)
        .ok_or_else(|| EngineError::NotFound(parent_path.clone()))?;
    if parent_entry.entry_type != EntryType::Directory {
        return Err(EngineError::NotFound(format!(
            "{parent_path} is not a directory"
        )));
    }
    Ok((parent_index, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnifs_container::FormatOptions;
    use tempfile::tempdir;

    #[test]
    fn test_validate_accepts_good_paths() {
        validate("/").unwrap();
        validate("/a").unwrap();
        validate("/a/b/c.txt").unwrap();
        validate("/with space").unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_paths() {
        assert!(validate("").is_err());
        assert!(validate("a").is_err());
        assert!(validate("relative/path").is_err());
        assert!(validate("/../etc/passwd").is_err());
        assert!(validate("/a/../b").is_err());
        assert!(validate("//a").is_err());
        assert!(validate("/a//b").is_err());
        assert!(validate("/a\0b").is_err());
        assert!(validate(&format!("/{}", "x".repeat(600))).is_err());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("/a/b/"), "/a/b");
        assert_eq!(normalize("/a/./b"), "/a/b");
        assert_eq!(normalize("not-absolute"), "/");
    }

    #[test]
    fn test_parent_and_filename() {
        assert_eq!(parent("/"), "/");
        assert_eq!(parent("/a"), "/");
        assert_eq!(parent("/a/b/c"), "/a/b");
        assert_eq!(filename("/"), "");
        assert_eq!(filename("/a"), "a");
        assert_eq!(filename("/a/b/c.txt"), "c.txt");
    }

    #[test]
    fn test_combine() {
        assert_eq!(combine("/", "a"), "/a");
        assert_eq!(combine("/d", "a"), "/d/a");
        assert_eq!(combine("/d/", "a"), "/d/a");
    }

    fn test_store() -> (tempfile::TempDir, OmniStore) {
        let dir = tempdir().unwrap();
        let mut store = OmniStore::format(
            dir.path().join("t.omni"),
            &FormatOptions {
                total_size: 1 << 20,
                block_size: 512,
                max_users: 4,
                max_files: 64,
                student_id: String::new(),
                submission_date: String::new(),
            },
        )
        .unwrap();

        let d = store
            .metadata_mut()
            .allocate(EntryType::Directory, ROOT_INDEX, "docs", 0, 0)
            .unwrap();
        store
            .metadata_mut()
            .allocate(EntryType::File, d, "readme.txt", 0, 0)
            .unwrap();
        (dir, store)
    }

    #[test]
    fn test_resolve_walks_the_graph() {
        let (_dir, store) = test_store();
        assert_eq!(resolve(&store, "/").unwrap(), ROOT_INDEX);
        let d = resolve(&store, "/docs").unwrap();
        assert_eq!(resolve(&store, "/docs/readme.txt").unwrap(), d + 1);
        assert!(matches!(
            resolve(&store, "/missing"),
            Err(EngineError::NotFound(_))
        ));
        assert!(matches!(
            resolve(&store, "/docs/missing"),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_resolve_parent() {
        let (_dir, store) = test_store();
        let (parent_index, name) = resolve_parent(&store, "/docs/new.txt").unwrap();
        assert_eq!(parent_index, resolve(&store, "/docs").unwrap());
        assert_eq!(name, "new.txt");

        // The parent must be a directory.
        assert!(matches!(
            resolve_parent(&store, "/docs/readme.txt/child"),
            Err(EngineError::NotFound(_))
        ));
        // Root has no final component.
        assert!(matches!(
            resolve_parent(&store, "/"),
            Err(EngineError::InvalidPath(_))
        ));
        // Names longer than the on-disk field are rejected.
        assert!(matches!(
            resolve_parent(&store, &format!("/{}", "n".repeat(40))),
            Err(EngineError::InvalidPath(_))
        ));
    }
}
