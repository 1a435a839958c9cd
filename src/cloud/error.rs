// ABOUTME: Errors from invoking the CPI executable.
// ABOUTME: CPI-reported errors keep their Ruby-style type so callers can match on it.

use std::path::PathBuf;
use thiserror::Error;

pub const VM_NOT_FOUND_ERROR: &str = "Bosh::Clouds::VMNotFound";
pub const DISK_NOT_FOUND_ERROR: &str = "Bosh::Clouds::DiskNotFound";
pub const STEMCELL_NOT_FOUND_ERROR: &str = "Bosh::Clouds::StemcellNotFound";
pub const NOT_IMPLEMENTED_ERROR: &str = "Bosh::Clouds::NotImplemented";

#[derive(Debug, Error)]
pub enum CloudError {
    #[error("CPI '{method}' method responded with error: {error_type}: {message}")]
    Cpi {
        method: String,
        error_type: String,
        message: String,
        ok_to_retry: bool,
    },

    #[error("Executing external CPI command '{path}': {source}")]
    Exec {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Marshalling external CPI command input: {0}")]
    Marshal(#[source] serde_json::Error),

    #[error("Unmarshalling external CPI command output: STDOUT: '{stdout}', STDERR: '{stderr}': {source}")]
    Unmarshal {
        stdout: String,
        stderr: String,
        source: serde_json::Error,
    },

    #[error("Parsing $BOSH_CPI_USE_ISOLATED_ENV error, could not parse value: {0}")]
    IsolatedEnv(String),

    #[error("Unexpected result from CPI '{method}': {result}")]
    UnexpectedResult { method: String, result: String },

    #[error("Installation has no CPI job")]
    NoCpiJob,
}

impl CloudError {
    fn cpi_type(&self) -> Option<&str> {
        match self {
            CloudError::Cpi { error_type, .. } => Some(error_type),
            _ => None,
        }
    }

    pub fn is_vm_not_found(&self) -> bool {
        self.cpi_type() == Some(VM_NOT_FOUND_ERROR)
    }

    pub fn is_disk_not_found(&self) -> bool {
        self.cpi_type() == Some(DISK_NOT_FOUND_ERROR)
    }

    pub fn is_stemcell_not_found(&self) -> bool {
        self.cpi_type() == Some(STEMCELL_NOT_FOUND_ERROR)
    }

    pub fn is_not_implemented(&self) -> bool {
        self.cpi_type() == Some(NOT_IMPLEMENTED_ERROR)
    }
}
