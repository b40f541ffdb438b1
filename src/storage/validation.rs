//! Path validation
//!
//! Lexical resolution of client supplied paths against the session's virtual
//! working directory. Resolution never touches the filesystem; existence is a
//! separate check done by the handlers that need it.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// A confined, absolute path inside the server root.
///
/// Always starts with `/`, never contains `.` or `..` segments and has no
/// trailing slash except for the root itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VirtualPath(String);

/// What `path_exists` requires the entry to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Any,
    Directory,
    RegularFile,
}

fn is_valid_segment(segment: &str) -> bool {
    segment
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'))
}

impl VirtualPath {
    pub fn root() -> Self {
        VirtualPath("/".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    fn from_segments<'a>(segments: impl IntoIterator<Item = &'a str>) -> Self {
        let mut path = String::from("/");
        for segment in segments {
            if path.len() > 1 {
                path.push('/');
            }
            path.push_str(segment);
        }
        VirtualPath(path)
    }

    /// Parent directory; the root is its own parent.
    pub fn parent(&self) -> VirtualPath {
        let mut segments: Vec<&str> = self.segments().collect();
        segments.pop();
        Self::from_segments(segments)
    }

    /// Whether `self` equals `ancestor` or lies below it.
    pub fn starts_with(&self, ancestor: &VirtualPath) -> bool {
        ancestor.is_root()
            || self.0 == ancestor.0
            || (self.0.starts_with(&ancestor.0) && self.0[ancestor.0.len()..].starts_with('/'))
    }

    /// Replace the `from` prefix of this path with `to`.
    ///
    /// Returns `None` when `self` is not `from` or one of its descendants.
    pub fn rebase(&self, from: &VirtualPath, to: &VirtualPath) -> Option<VirtualPath> {
        if !self.starts_with(from) {
            return None;
        }
        let skip = from.segments().count();
        Some(Self::from_segments(
            to.segments().chain(self.segments().skip(skip)),
        ))
    }

    /// Resolve `rel` against this path.
    ///
    /// Absolute arguments restart from the root. `.` and empty segments are
    /// ignored, `..` pops one segment and is clamped at the root. Any other
    /// segment must consist of ASCII alphanumerics, `-`, `.` or `_`.
    pub fn resolve(&self, rel: &str) -> Result<VirtualPath, StorageError> {
        let mut segments: Vec<&str> = if rel.starts_with('/') {
            Vec::new()
        } else {
            self.segments().collect()
        };

        for segment in rel.split('/') {
            if !is_valid_segment(segment) {
                return Err(StorageError::PathRejected(rel.to_string()));
            }
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                name => segments.push(name),
            }
        }

        Ok(Self::from_segments(segments))
    }

    /// Map onto the real filesystem below `server_root`.
    pub fn to_real_path(&self, server_root: &Path) -> PathBuf {
        let mut real = server_root.to_path_buf();
        for segment in self.segments() {
            real.push(segment);
        }
        real
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check that `path` exists below `server_root` and is of the required kind.
pub async fn path_exists(server_root: &Path, path: &VirtualPath, kind: PathKind) -> bool {
    match tokio::fs::metadata(path.to_real_path(server_root)).await {
        Ok(metadata) => match kind {
            PathKind::Any => true,
            PathKind::Directory => metadata.is_dir(),
            PathKind::RegularFile => metadata.is_file(),
        },
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vp(s: &str) -> VirtualPath {
        VirtualPath::root().resolve(s).unwrap()
    }

    fn resolve(wd: &str, rel: &str) -> String {
        vp(wd).resolve(rel).unwrap().as_str().to_string()
    }

    #[test]
    fn resolves_relative_and_absolute_paths() {
        assert_eq!(resolve("/quq/qvq/qwq/qxq", "qaq/qnq"), "/quq/qvq/qwq/qxq/qaq/qnq");
        assert_eq!(resolve("/", "quq"), "/quq");
        assert_eq!(resolve("/quq", "qvq"), "/quq/qvq");
        assert_eq!(resolve("/", "a//b"), "/a/b");
        assert_eq!(resolve("/quq/qvq", "/qwq/qxq/.."), "/qwq");
        assert_eq!(resolve("/quq/qvq", "//qwq/qxq/.."), "/qwq");
    }

    #[test]
    fn parent_segments_clamp_at_root() {
        assert_eq!(resolve("/quq/qvq", "../../../../../.."), "/");
        assert_eq!(resolve("/a/b/c", "../../../../.."), "/");
        assert_eq!(resolve("/", ".."), "/");
        assert_eq!(resolve("/", "../a"), "/a");
        assert_eq!(resolve("/quq/qvq", "qwq/../../qxq/"), "/quq/qxq");
    }

    #[test]
    fn traversal_composition() {
        assert_eq!(resolve("/a/b", "../c"), "/a/c");
        assert_eq!(resolve("/a", "b/.//.../././///./c"), "/a/b/.../c");
    }

    #[test]
    fn resolving_dot_is_idempotent() {
        for (wd, rel) in [("/", "a/b"), ("/x", "../y/./z/"), ("/p/q", "..."), ("/", "")] {
            let once = vp(wd).resolve(rel).unwrap();
            assert_eq!(once.resolve(".").unwrap(), once);
        }
    }

    #[test]
    fn rejects_segments_outside_the_allowed_set() {
        let wd = vp("/a");
        for bad in ["b c", "b/c d", "~", "a\\b", "$HOME", "x/y:z", "é"] {
            assert!(
                matches!(wd.resolve(bad), Err(StorageError::PathRejected(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn parent_and_rebase() {
        assert_eq!(vp("/a/b").parent(), vp("/a"));
        assert_eq!(vp("/a").parent(), VirtualPath::root());
        assert_eq!(VirtualPath::root().parent(), VirtualPath::root());

        assert!(vp("/a/b").starts_with(&vp("/a")));
        assert!(!vp("/ab").starts_with(&vp("/a")));
        assert_eq!(vp("/a/b/c").rebase(&vp("/a/b"), &vp("/x")), Some(vp("/x/c")));
        assert_eq!(vp("/a/b").rebase(&vp("/a/b"), &vp("/a/c")), Some(vp("/a/c")));
        assert_eq!(vp("/a/bc").rebase(&vp("/a/b"), &vp("/x")), None);
    }

    #[test]
    fn maps_into_server_root() {
        let root = Path::new("/srv/ftp");
        assert_eq!(vp("/a/b").to_real_path(root), PathBuf::from("/srv/ftp/a/b"));
        assert_eq!(VirtualPath::root().to_real_path(root), PathBuf::from("/srv/ftp"));
    }
}
