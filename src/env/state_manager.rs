// ABOUTME: start-env and stop-env: drive the agent's jobs on the existing VM.
// ABOUTME: Only the agent is contacted; no CPI is installed and no cloud call is made.

use super::deps::{EnvDeps, EnvOptions};
use super::error::*;
use crate::deployment::{DeployError, Deployment};
use crate::manifest::{DeploymentManifestParser, ReleaseSetAndInstallationManifestParser, Update};
use crate::stage::Stage;
use snafu::ResultExt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
enum Action {
    Start,
    Stop,
}

impl Action {
    fn label(self) -> &'static str {
        match self {
            Action::Start => "Starting",
            Action::Stop => "Stopping",
        }
    }

    fn wrap(self, source: DeployError) -> EnvError {
        match self {
            Action::Start => EnvError::Start { source },
            Action::Stop => EnvError::Stop { source },
        }
    }
}

pub struct DeploymentStateManager {
    deps: EnvDeps,
    options: EnvOptions,
}

impl DeploymentStateManager {
    pub fn new(deps: EnvDeps, options: EnvOptions) -> Self {
        Self { deps, options }
    }

    pub async fn stop_deployment(&self, skip_drain: bool, stage: &Stage) -> Result<(), EnvError> {
        let Some((deployment, _)) = self.find_current(Action::Stop, stage).await? else {
            return Ok(());
        };
        stage
            .perform_complex("stopping deployment", |sub| async move {
                deployment.stop(skip_drain, &sub).await
            })
            .await
            .context(StopSnafu)
    }

    pub async fn start_deployment(&self, stage: &Stage) -> Result<(), EnvError> {
        let Some((deployment, update)) = self.find_current(Action::Start, stage).await? else {
            return Ok(());
        };
        let update = &update;
        stage
            .perform_complex("starting deployment", |sub| async move {
                deployment.start(&sub, update).await
            })
            .await
            .context(StartSnafu)
    }

    /// `None` when there is no state file at all; a state file without a
    /// deployment is an error.
    async fn find_current(
        &self,
        action: Action,
        stage: &Stage,
    ) -> Result<Option<(Arc<dyn Deployment>, Update)>, EnvError> {
        let deps = &self.deps;
        deps.ui.print_line(&format!(
            "Deployment state: '{}'",
            deps.state_service.path().display()
        ));
        if !deps.state_service.exists() {
            deps.ui.print_line("No deployment state file found.");
            return Ok(None);
        }
        let state = deps.state_service.load().context(LoadStateSnafu)?;

        let opts = &self.options;
        let (installation_manifest, update) = stage
            .perform_complex("validating", |sub| async move {
                sub.perform("Validating deployment manifest", || async move {
                    let (_, installation_manifest) =
                        ReleaseSetAndInstallationManifestParser::new()
                            .release_set_and_installation_manifest(
                                &opts.manifest_path,
                                &opts.vars,
                                &opts.ops,
                            )
                            .context(ManifestSnafu)?;
                    let update = DeploymentManifestParser::new(deps.releases.clone())
                        .get_deployment_manifest_update(
                            &opts.manifest_path,
                            &opts.vars,
                            &opts.ops,
                        )
                        .context(ManifestSnafu)?;
                    Ok::<_, EnvError>((installation_manifest, update))
                })
                .await
            })
            .await?;

        let agent = deps
            .agent_factory
            .new_agent_client(
                &state.director_id,
                &installation_manifest.mbus,
                &installation_manifest.cert.ca,
            )
            .context(NewAgentClientSnafu)?;
        let manager = deps.deployment_manager_factory.new_manager(None, agent, None);

        match manager.find_current().await.map_err(|e| action.wrap(e))? {
            Some(deployment) => Ok(Some((deployment, update))),
            None => NoCurrentDeploymentSnafu {
                action: action.label(),
            }
            .fail(),
        }
    }
}
