// ABOUTME: Error types for deployment state persistence.
// ABOUTME: Covers state file I/O, legacy migration, and repo bookkeeping.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Reading deployment state file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unmarshalling deployment state file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Marshalling deployment state: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Writing deployment state file '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Deleting deployment state file '{path}': {source}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Reading legacy deployment state file '{path}': {source}")]
    LegacyRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parsing legacy deployment state file '{path}': {source}")]
    LegacyParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Deleting legacy deployment state file '{path}': {source}")]
    LegacyRemove {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Stemcell '{name}/{version}' already exists")]
    StemcellExists { name: String, version: String },

    #[error("Stemcell with CID '{0}' already exists")]
    StemcellCidExists(String),

    #[error("Disk with CID '{0}' already exists")]
    DiskCidExists(String),

    #[error("No {kind} record with id '{id}'")]
    RecordNotFound { kind: &'static str, id: String },
}
