//! Lexical path handling

use std::path::{Component, Path, PathBuf};

#[derive(Debug, thiserror::Error)]
#[error("path {path:?} is outside of {root:?}")]
pub struct PathEscapeError {
    pub root: PathBuf,
    pub path: PathBuf,
}

pub trait PathBufExt {
    fn clean_rooted(&self) -> PathBuf;
    fn join_contained<P: AsRef<Path>>(&self, p: P) -> Result<PathBuf, PathEscapeError>;
    fn is_contained_in<P: AsRef<Path>>(&self, root: P) -> bool;
}

impl PathBufExt for Path {
    /// Cleans the path as if it was located below an implicit root directory. `.` segments
    /// and redundant separators are dropped and every `..` removes the segment before it.
    /// A `..` that would step above the implicit root is discarded, so the result is always
    /// relative and never starts with a parent reference, no matter whether the input was
    /// absolute or not.
    fn clean_rooted(&self) -> PathBuf {
        let mut cleaned = PathBuf::new();
        for component in self.components() {
            match component {
                Component::Prefix(..) | Component::RootDir | Component::CurDir => {}
                Component::ParentDir => {
                    cleaned.pop();
                }
                Component::Normal(c) => {
                    cleaned.push(c);
                }
            }
        }
        cleaned
    }

    /// Joins `path` below `self` and verifies that the result is still located inside of
    /// `self`. Absolute paths and parent references are not stripped, they fail the check.
    fn join_contained<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf, PathEscapeError> {
        let path = path.as_ref();
        let joined = if path.as_os_str().is_empty() {
            self.to_path_buf()
        } else {
            self.join(path)
        };

        if !joined.is_contained_in(self) {
            tracing::error!(root = ?self, path = ?joined, "joined path escapes its root");
            return Err(PathEscapeError {
                root: self.to_path_buf(),
                path: joined,
            });
        }

        Ok(joined)
    }

    /// Compares whole components, so `/a/b2` is not contained in `/a/b`. Everything below
    /// the root has to be a plain segment.
    fn is_contained_in<P: AsRef<Path>>(&self, root: P) -> bool {
        match self.strip_prefix(root) {
            Ok(rest) => rest
                .components()
                .all(|c| matches!(c, Component::Normal(_))),
            Err(_) => false,
        }
    }
}

/// String flavour of [`PathBufExt::clean_rooted`].
pub fn clean(raw: &str) -> String {
    // only segments of the input survive, so the result is valid utf-8
    Path::new(raw).clean_rooted().to_string_lossy().into_owned()
}
