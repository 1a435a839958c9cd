// ABOUTME: Checksum-keyed cache of downloaded tarballs.
// ABOUTME: A cached file is only served while it still matches its key.

use crate::types::Digest;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct TarballCache {
    dir: PathBuf,
}

impl TarballCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, digest: &Digest) -> PathBuf {
        self.dir.join(digest.to_string().replace(':', "-"))
    }

    /// Path of a cached tarball with `digest`, if present and intact.
    pub fn get(&self, digest: &Digest) -> Option<PathBuf> {
        let path = self.path_for(digest);
        if !path.is_file() {
            return None;
        }
        match digest.matches_file(&path) {
            Ok(true) => Some(path),
            Ok(false) => {
                debug!(path = %path.display(), "cached tarball is corrupt, ignoring");
                None
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "cannot read cached tarball");
                None
            }
        }
    }

    /// Move a verified download into the cache.
    pub fn save(&self, digest: &Digest, downloaded: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(digest);
        std::fs::rename(downloaded, &path)?;
        Ok(path)
    }
}
