// ABOUTME: Downloads, extracts, and registers the releases a manifest references.
// ABOUTME: The production fetcher goes through the tarball provider.

use super::error::ReleaseError;
use super::manager::ReleaseManager;
use super::reader::ReleaseReader;
use crate::manifest::ReleaseRef;
use crate::stage::Stage;
use crate::tarball::{TarballProvider, TarballSource};
use crate::types::TempRoot;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// Makes a referenced release available in the release manager.
#[async_trait]
pub trait ReleaseFetcher: Send + Sync {
    async fn download_and_extract(
        &self,
        release: &ReleaseRef,
        temp_root: &TempRoot,
        stage: &Stage,
    ) -> Result<(), ReleaseError>;
}

pub struct TarballReleaseFetcher {
    provider: Arc<TarballProvider>,
    manager: ReleaseManager,
}

impl TarballReleaseFetcher {
    pub fn new(provider: Arc<TarballProvider>, manager: ReleaseManager) -> Self {
        Self { provider, manager }
    }
}

#[async_trait]
impl ReleaseFetcher for TarballReleaseFetcher {
    async fn download_and_extract(
        &self,
        release_ref: &ReleaseRef,
        temp_root: &TempRoot,
        stage: &Stage,
    ) -> Result<(), ReleaseError> {
        let source = TarballSource::new(
            &release_ref.url,
            release_ref.sha1.clone(),
            format!("release '{}'", release_ref.name),
        );
        let tarball = self.provider.get(&source, stage).await?;

        let release = stage
            .perform(format!("Validating release '{}'", release_ref.name), || async move {
                let reader = ReleaseReader::new(temp_root.clone());
                let tarball_path = tarball.clone();
                let release = tokio::task::spawn_blocking(move || reader.read(&tarball_path))
                    .await
                    .map_err(|e| ReleaseError::Extraction {
                        path: tarball.clone(),
                        message: e.to_string(),
                    })??;

                if release.name != release_ref.name {
                    let actual = release.name.clone();
                    if let Err(e) = release.delete() {
                        warn!(
                            release = %actual,
                            error = %e,
                            "failed to delete extracted release with unexpected name"
                        );
                    }
                    return Err(ReleaseError::NameMismatch {
                        expected: release_ref.name.clone(),
                        actual,
                    });
                }
                Ok(release)
            })
            .await?;

        self.manager.add(release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Ui;
    use crate::tarball::{TarballCache, create_tgz};

    struct Silent;

    impl Ui for Silent {
        fn print_line(&self, _: &str) {}
        fn print_warning(&self, _: &str) {}
    }

    #[tokio::test]
    async fn misnamed_release_is_rejected_and_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("release.MF"), "name: other\nversion: 1\n").unwrap();
        let tarball = tmp.path().join("release.tgz");
        create_tgz(&src, &tarball).unwrap();

        let temp_root = TempRoot::create(tmp.path().join("tmp")).unwrap();
        let manager = ReleaseManager::new();
        let fetcher = TarballReleaseFetcher::new(
            Arc::new(TarballProvider::new(
                TarballCache::new(tmp.path().join("cache")),
                reqwest::Client::new(),
            )),
            manager.clone(),
        );
        let release_ref = ReleaseRef {
            name: "bosh".to_string(),
            url: format!("file://{}", tarball.display()),
            ..ReleaseRef::default()
        };
        let stage = Stage::new(Arc::new(Silent));

        let err = fetcher
            .download_and_extract(&release_ref, &temp_root, &stage)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReleaseError::NameMismatch { ref expected, ref actual }
                if expected == "bosh" && actual == "other"
        ));
        assert!(manager.list().is_empty());
        assert_eq!(std::fs::read_dir(temp_root.path()).unwrap().count(), 0);
    }
}
