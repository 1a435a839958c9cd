// ABOUTME: Error types for manifest loading, interpolation, and validation.
// ABOUTME: Validation errors accumulate so every problem is reported at once.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Reading file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parsing YAML '{path}': {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Unmarshalling manifest: {0}")]
    Unmarshal(#[source] serde_yaml::Error),

    #[error("Expected to find variables: {}", .0.join(", "))]
    MissingVariables(Vec<String>),

    #[error("Invalid variable '{0}': expected name=value")]
    InvalidVariable(String),

    #[error("Variables file '{0}' must contain a map")]
    VariablesNotMap(PathBuf),

    #[error("Invalid ops path '{path}': {reason}")]
    InvalidOpsPath { path: String, reason: String },

    #[error("{0}")]
    Ops(String),

    #[error("Validation errors:{}", format_list(.0))]
    Invalid(Vec<String>),

    #[error("{context} '{path}': {source}")]
    InManifest {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: Box<ManifestError>,
    },
}

impl ManifestError {
    pub(crate) fn in_manifest(
        context: &'static str,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(ManifestError) -> ManifestError {
        let path = path.into();
        move |source| ManifestError::InManifest {
            context,
            path,
            source: Box::new(source),
        }
    }

    /// Build an `Invalid` error from accumulated messages, or `Ok` if there are none.
    pub(crate) fn from_errors(errors: Vec<String>) -> Result<(), ManifestError> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ManifestError::Invalid(errors))
        }
    }
}

fn format_list(errors: &[String]) -> String {
    errors.iter().map(|e| format!("\n  - {e}")).collect()
}
