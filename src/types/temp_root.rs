// ABOUTME: Per-invocation scratch directory for extracted artifacts.
// ABOUTME: Passed explicitly to every extraction instead of changing the process temp dir.

use std::io;
use std::path::{Path, PathBuf};

/// Root under which releases and stemcells are extracted for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempRoot {
    path: PathBuf,
}

impl TempRoot {
    /// Use `path` as the temp root, creating it if needed.
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create a fresh, uniquely named directory under the root.
    pub fn new_dir(&self, prefix: &str) -> io::Result<PathBuf> {
        let dir = self
            .path
            .join(format!("{prefix}-{}", uuid::Uuid::new_v4().simple()));
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_dirs_are_unique_and_inside_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = TempRoot::create(tmp.path().join("tmp")).unwrap();

        let a = root.new_dir("release").unwrap();
        let b = root.new_dir("release").unwrap();

        assert_ne!(a, b);
        assert!(a.starts_with(root.path()));
        assert!(a.is_dir());
    }
}
