// ABOUTME: Errors from reading, fetching, and uploading stemcells.
// ABOUTME: Wraps tarball, cloud, and state errors with stemcell context.

use crate::cloud::CloudError;
use crate::config::StateError;
use crate::tarball::TarballError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StemcellError {
    #[error("No stemcell found in deployment manifest resource pools")]
    NoStemcell,

    #[error(transparent)]
    Tarball(#[from] TarballError),

    #[error("Reading stemcell manifest '{path}': {source}")]
    ReadManifest {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parsing stemcell manifest '{path}': {source}")]
    ParseManifest {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Extracting stemcell '{path}': {message}")]
    Extraction { path: PathBuf, message: String },

    #[error("creating stemcell ({name} {version}): {source}")]
    Create {
        name: String,
        version: String,
        source: CloudError,
    },

    #[error("Deleting stemcell '{cid}': {source}")]
    Delete { cid: String, source: CloudError },

    #[error(transparent)]
    State(#[from] StateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
