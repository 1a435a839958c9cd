// ABOUTME: Error types for reading and fetching releases.
// ABOUTME: Includes the tarball name check against the manifest reference.

use crate::tarball::TarballError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error(transparent)]
    Tarball(#[from] TarballError),

    #[error("Reading release manifest '{path}': {source}")]
    ReadManifest {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parsing release manifest '{path}': {source}")]
    ParseManifest {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Release job '{0}' is missing from the release tarball")]
    MissingJob(String),

    #[error("Release package '{0}' is missing from the release tarball")]
    MissingPackage(String),

    #[error("Release name '{expected}' does not match the name in release tarball '{actual}'")]
    NameMismatch { expected: String, actual: String },

    #[error("Extracting release '{path}': {message}")]
    Extraction { path: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
