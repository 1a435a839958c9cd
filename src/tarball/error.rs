// ABOUTME: Error types for tarball resolution, download, and extraction.
// ABOUTME: Distinguishes bad sources, transport failures, and checksum mismatches.

use crate::types::DigestError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TarballError {
    #[error("Invalid source URL: '{0}', must be either file:// or http(s)://")]
    InvalidUrl(String),

    #[error("File path '{0}' does not exist")]
    NotFound(PathBuf),

    #[error("Source '{0}' requires a checksum for download")]
    MissingChecksum(String),

    #[error("Invalid checksum for '{url}': {source}")]
    InvalidChecksum { url: String, source: DigestError },

    #[error("Downloading '{url}': {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Downloading '{url}': HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Checksum of downloaded file '{path}' ({actual}) does not match source checksum '{expected}'")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Extracting archive '{path}': {source}")]
    Extract {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
