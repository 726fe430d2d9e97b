//! Pure path arithmetic. Nothing here touches the tree.

use vsh_sdk::{FsError, FsResult};

/// Resolve `raw` against `cwd` into an absolute path with `.`, `..` and
/// repeated separators removed. `..` at the root stays at the root.
pub fn normalize(cwd: &str, raw: &str) -> FsResult<String> {
    if raw.is_empty() {
        return Err(FsError::invalid_path("empty path"));
    }
    if raw.contains('\0') {
        return Err(FsError::invalid_path("path contains a NUL byte"));
    }

    let mut parts: Vec<&str> = Vec::new();
    if !raw.starts_with('/') {
        parts.extend(cwd.split('/').filter(|c| !c.is_empty() && *c != "."));
    }
    for component in raw.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name),
        }
    }

    if parts.is_empty() {
        Ok("/".to_string())
    } else {
        Ok(format!("/{}", parts.join("/")))
    }
}

/// Parent of a normalized path; `None` for the root.
#[must_use]
pub fn parent(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => Some("/"),
    }
}

/// Last component of a normalized path; `/` for the root.
#[must_use]
pub fn file_name(path: &str) -> &str {
    if path == "/" {
        return "/";
    }
    path.rsplit('/').next().unwrap_or(path)
}

#[must_use]
pub fn join(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Components of a normalized path, root excluded.
pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}

/// True when `path` lies strictly below `ancestor`.
#[must_use]
pub fn is_descendant(path: &str, ancestor: &str) -> bool {
    if ancestor == "/" {
        return path != "/";
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_relative_and_absolute() {
        assert_eq!(normalize("/home/guest", "docs").unwrap(), "/home/guest/docs");
        assert_eq!(normalize("/home/guest", "/etc//passwd").unwrap(), "/etc/passwd");
        assert_eq!(normalize("/home/guest", "./a/./b/").unwrap(), "/home/guest/a/b");
        assert_eq!(normalize("/home/guest", "../../..").unwrap(), "/");
        assert_eq!(normalize("/", "..").unwrap(), "/");
        assert_eq!(normalize("/tmp", "a/../b").unwrap(), "/tmp/b");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["a/b/../c", "/x//y/.", "..", "/"] {
            let once = normalize("/home/guest", raw).unwrap();
            assert_eq!(normalize("/home/guest", &once).unwrap(), once);
        }
    }

    #[test]
    fn normalize_rejects_bad_input() {
        assert!(matches!(normalize("/", ""), Err(FsError::InvalidPath(_))));
        assert!(matches!(normalize("/", "a\0b"), Err(FsError::InvalidPath(_))));
    }

    #[test]
    fn parents_and_names() {
        assert_eq!(parent("/"), None);
        assert_eq!(parent("/home"), Some("/"));
        assert_eq!(parent("/home/guest"), Some("/home"));
        assert_eq!(file_name("/home/guest"), "guest");
        assert_eq!(file_name("/"), "/");
        assert_eq!(join("/", "tmp"), "/tmp");
        assert_eq!(join("/tmp", "a"), "/tmp/a");
        assert_eq!(components("/a/b").collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn descendants() {
        assert!(is_descendant("/a/b", "/a"));
        assert!(!is_descendant("/ab", "/a"));
        assert!(!is_descendant("/a", "/a"));
        assert!(is_descendant("/a", "/"));
    }
}
