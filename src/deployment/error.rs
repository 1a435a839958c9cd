// ABOUTME: Errors from deploying, starting, stopping, and deleting the instance.
// ABOUTME: Wraps collaborator errors and adds instance-level failures.

use crate::agent::AgentError;
use crate::blobstore::BlobstoreError;
use crate::cloud::CloudError;
use crate::config::StateError;
use crate::installation::InstallError;
use crate::manifest::ManifestError;
use crate::stemcell::StemcellError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Cloud(#[from] CloudError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Blobstore(#[from] BlobstoreError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Stemcell(#[from] StemcellError),

    #[error("Rendering job templates: {0}")]
    Render(#[from] InstallError),

    #[error("There must only be one job, found {0}")]
    JobCount(usize),

    #[error("Job template '{template}' not found in release '{release}'")]
    JobTemplateNotFound { template: String, release: String },

    #[error("Agent unreachable on VM '{vm}' after {timeout:?}: {source}")]
    AgentUnreachable {
        vm: String,
        timeout: Duration,
        source: AgentError,
    },

    #[error("Timed out waiting for instance '{instance}' to be running")]
    JobsNotRunning { instance: String },

    #[error("Deployment has {0} persistent disks, expected at most 1")]
    MultipleDisks(usize),

    #[error("No cloud available for '{0}'")]
    CloudUnavailable(&'static str),

    #[error("Packaging rendered templates: {0}")]
    Archive(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
