// ABOUTME: In-memory registry of releases fetched during one run.
// ABOUTME: Shared between the fetcher, manifest validation, and the CPI installer.

use super::Release;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct ReleaseManager {
    releases: Arc<Mutex<Vec<Release>>>,
}

impl ReleaseManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a release, replacing an earlier one with the same name.
    pub fn add(&self, release: Release) {
        let mut releases = self.releases.lock();
        if let Some(existing) = releases.iter_mut().find(|r| r.name == release.name) {
            if existing.extracted_path != release.extracted_path
                && let Err(e) = existing.delete()
            {
                warn!(release = %existing.name, error = %e, "failed to delete replaced release");
            }
            *existing = release;
        } else {
            releases.push(release);
        }
    }

    pub fn list(&self) -> Vec<Release> {
        self.releases.lock().clone()
    }

    pub fn find(&self, name: &str) -> Option<Release> {
        self.releases.lock().iter().find(|r| r.name == name).cloned()
    }

    /// Delete every extracted release and forget them.
    pub fn delete_all(&self) -> std::io::Result<()> {
        let releases = std::mem::take(&mut *self.releases.lock());
        let mut first_err = None;
        for release in releases {
            if let Err(e) = release.delete() {
                warn!(release = %release.name, error = %e, "failed to delete extracted release");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn release(name: &str, version: &str, path: PathBuf) -> Release {
        Release {
            name: name.to_string(),
            version: version.to_string(),
            jobs: Vec::new(),
            packages: Vec::new(),
            extracted_path: path,
        }
    }

    #[test]
    fn add_replaces_same_name() {
        let tmp = tempfile::tempdir().unwrap();
        let old = tmp.path().join("old");
        std::fs::create_dir(&old).unwrap();

        let manager = ReleaseManager::new();
        manager.add(release("cpi", "1", old.clone()));
        manager.add(release("cpi", "2", tmp.path().join("new")));

        assert_eq!(manager.list().len(), 1);
        assert_eq!(manager.find("cpi").unwrap().version, "2");
        assert!(!old.exists());
    }

    #[test]
    fn delete_all_removes_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("release");
        std::fs::create_dir(&dir).unwrap();

        let manager = ReleaseManager::new();
        manager.add(release("bosh", "1", dir.clone()));
        manager.delete_all().unwrap();

        assert!(manager.list().is_empty());
        assert!(!dir.exists());
    }
}
