// ABOUTME: What was last deployed: manifest digest, releases, and stemcell.
// ABOUTME: Decides whether a run can skip deploying altogether.

use crate::config::{
    DeploymentRepo, ReleaseRepo, ReleaseVersion, StateError, StemcellRepo,
};
use crate::stemcell::ExtractedStemcell;
use std::collections::BTreeSet;

#[derive(Clone)]
pub struct DeploymentRecord {
    deployments: DeploymentRepo,
    releases: ReleaseRepo,
    stemcells: StemcellRepo,
}

impl DeploymentRecord {
    pub fn new(deployments: DeploymentRepo, releases: ReleaseRepo, stemcells: StemcellRepo) -> Self {
        Self {
            deployments,
            releases,
            stemcells,
        }
    }

    /// True when the recorded manifest digest, release set, and current
    /// stemcell all match the desired ones.
    pub fn is_deployed(
        &self,
        manifest_sha: &str,
        releases: &[ReleaseVersion],
        stemcell: &ExtractedStemcell,
    ) -> Result<bool, StateError> {
        let Some(deployed_sha) = self.deployments.find_current()? else {
            return Ok(false);
        };
        if deployed_sha != manifest_sha {
            return Ok(false);
        }

        let Some(current_stemcell) = self.stemcells.find_current()? else {
            return Ok(false);
        };
        let manifest = stemcell.manifest();
        if current_stemcell.name != manifest.name || current_stemcell.version != manifest.version {
            return Ok(false);
        }

        let recorded: BTreeSet<ReleaseVersion> = self
            .releases
            .list()?
            .into_iter()
            .map(|r| ReleaseVersion::new(r.name, r.version))
            .collect();
        let desired: BTreeSet<ReleaseVersion> = releases.iter().cloned().collect();
        Ok(recorded == desired)
    }

    /// Forget the last deployment. Called before deploying so an interrupted
    /// deploy is never mistaken for a converged one.
    pub fn clear(&self) -> Result<(), StateError> {
        self.deployments.update_current("")?;
        self.releases.update(&[])?;
        Ok(())
    }

    pub fn update(&self, manifest_sha: &str, releases: &[ReleaseVersion]) -> Result<(), StateError> {
        self.deployments.update_current(manifest_sha)?;
        self.releases.update(releases)?;
        Ok(())
    }
}
