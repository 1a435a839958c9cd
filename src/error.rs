// ABOUTME: Application-wide error types for bosh-env.
// ABOUTME: Wraps pipeline failures and command-line input errors.

use crate::env::EnvError;
use crate::manifest::ManifestError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Env(#[from] EnvError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("cannot determine workspace directory: pass --home or set BOSH_ENV_HOME or HOME")]
    NoWorkspace,

    #[error("creating HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
