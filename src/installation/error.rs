// ABOUTME: Errors from installing, rendering, and removing the local CPI.
// ABOUTME: Each variant names the job or package involved.

use crate::config::StateError;
use crate::tarball::TarballError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Release '{0}' has not been fetched")]
    ReleaseNotFound(String),

    #[error("Job '{job}' not found in release '{release}'")]
    JobNotFound { job: String, release: String },

    #[error("Package '{package}' required by job '{job}' not found in release '{release}'")]
    PackageNotFound {
        package: String,
        job: String,
        release: String,
    },

    #[error("Packaging script for package '{0}' not found")]
    MissingPackagingScript(String),

    #[error("Compiling package '{package}': {message}")]
    Compile { package: String, message: String },

    #[error("Rendering template '{template}' of job '{job}': {source}")]
    Render {
        job: String,
        template: String,
        source: std::io::Error,
    },

    #[error("Removing '{path}': {source}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Tarball(#[from] TarballError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
