// ABOUTME: Collaborators and options shared by the environment pipelines.
// ABOUTME: The factory wires the production implementations for one state file.

use crate::agent::{AgentClientFactory, HttpAgentClientFactory};
use crate::blobstore::{BlobstoreFactory, DavBlobstoreFactory};
use crate::cloud::{CloudFactory, CpiCloudFactory};
use crate::config::{
    DeploymentStateService, FileSystemDeploymentStateService, LegacyDeploymentStateMigrator,
    Repos, WorkspaceConfig,
};
use crate::deployment::{
    CloudDeployer, Deployer, DeploymentManagerFactory, DeploymentRecord, RepoVmManagerFactory,
    StateDeploymentManagerFactory, VmManagerFactory,
};
use crate::installation::{CopyJobRenderer, Installer, JobInstaller, JobRenderer};
use crate::manifest::{Ops, Variables};
use crate::output::Ui;
use crate::release::{ReleaseFetcher, ReleaseManager, TarballReleaseFetcher};
use crate::stemcell::{
    RepoStemcellManagerFactory, StemcellFetcher, StemcellManagerFactory, TarballStemcellFetcher,
};
use crate::tarball::{TarballCache, TarballProvider};
use crate::types::{RandomUuidGenerator, UuidGenerator};
use std::path::PathBuf;
use std::sync::Arc;

/// What the user asked for on the command line.
#[derive(Debug, Clone, Default)]
pub struct EnvOptions {
    pub manifest_path: PathBuf,
    pub vars: Variables,
    pub ops: Ops,
    /// Redeploy even when nothing changed.
    pub recreate: bool,
    /// Redeploy and migrate the persistent disk onto a fresh one.
    pub recreate_persistent_disks: bool,
    pub skip_drain: bool,
}

/// Everything a pipeline talks to. Tests substitute fakes field by field.
#[derive(Clone)]
pub struct EnvDeps {
    pub ui: Arc<dyn Ui>,
    pub uuid: Arc<dyn UuidGenerator>,
    pub workspace: WorkspaceConfig,
    pub state_service: Arc<dyn DeploymentStateService>,
    pub repos: Repos,
    pub releases: ReleaseManager,
    pub release_fetcher: Arc<dyn ReleaseFetcher>,
    pub stemcell_fetcher: Arc<dyn StemcellFetcher>,
    pub installer: Arc<dyn Installer>,
    pub cloud_factory: Arc<dyn CloudFactory>,
    pub agent_factory: Arc<dyn AgentClientFactory>,
    pub blobstore_factory: Arc<dyn BlobstoreFactory>,
    pub stemcell_manager_factory: Arc<dyn StemcellManagerFactory>,
    pub vm_manager_factory: Arc<dyn VmManagerFactory>,
    pub deployer: Arc<dyn Deployer>,
    pub deployment_manager_factory: Arc<dyn DeploymentManagerFactory>,
}

impl EnvDeps {
    pub fn legacy_migrator(&self) -> LegacyDeploymentStateMigrator {
        LegacyDeploymentStateMigrator::new(
            Arc::clone(&self.state_service),
            Arc::clone(&self.uuid),
        )
    }

    pub fn deployment_record(&self) -> DeploymentRecord {
        DeploymentRecord::new(
            self.repos.deployments.clone(),
            self.repos.releases.clone(),
            self.repos.stemcells.clone(),
        )
    }
}

/// Builds production dependencies.
pub struct EnvFactory {
    workspace: WorkspaceConfig,
    ui: Arc<dyn Ui>,
}

impl EnvFactory {
    pub fn new(workspace: WorkspaceConfig, ui: Arc<dyn Ui>) -> Self {
        Self { workspace, ui }
    }

    /// Wire every collaborator against the state file at `state_path`.
    pub fn build(
        &self,
        state_path: PathBuf,
        options: &EnvOptions,
    ) -> Result<EnvDeps, reqwest::Error> {
        let uuid: Arc<dyn UuidGenerator> = Arc::new(RandomUuidGenerator);
        let state_service: Arc<dyn DeploymentStateService> = Arc::new(
            FileSystemDeploymentStateService::new(state_path, Arc::clone(&uuid)),
        );
        let repos = Repos::new(Arc::clone(&state_service), Arc::clone(&uuid));
        let releases = ReleaseManager::new();
        let renderer: Arc<dyn JobRenderer> = Arc::new(CopyJobRenderer);

        let http = reqwest::Client::builder().build()?;
        let provider = Arc::new(TarballProvider::new(
            TarballCache::new(self.workspace.downloads_dir()),
            http,
        ));

        Ok(EnvDeps {
            ui: Arc::clone(&self.ui),
            uuid: Arc::clone(&uuid),
            workspace: self.workspace.clone(),
            state_service,
            repos: repos.clone(),
            releases: releases.clone(),
            release_fetcher: Arc::new(TarballReleaseFetcher::new(
                Arc::clone(&provider),
                releases.clone(),
            )),
            stemcell_fetcher: Arc::new(TarballStemcellFetcher::new(provider)),
            installer: Arc::new(JobInstaller::new(releases.clone(), Arc::clone(&renderer))),
            cloud_factory: Arc::new(CpiCloudFactory),
            agent_factory: Arc::new(HttpAgentClientFactory),
            blobstore_factory: Arc::new(DavBlobstoreFactory),
            stemcell_manager_factory: Arc::new(RepoStemcellManagerFactory::new(
                repos.stemcells.clone(),
            )),
            vm_manager_factory: Arc::new(RepoVmManagerFactory::new(repos.clone(), uuid)),
            deployer: Arc::new(CloudDeployer::new(
                repos.clone(),
                releases,
                renderer,
                options.recreate_persistent_disks,
            )),
            deployment_manager_factory: Arc::new(StateDeploymentManagerFactory::new(repos)),
        })
    }
}
