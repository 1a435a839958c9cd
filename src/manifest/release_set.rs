// ABOUTME: The release set fragment of a combined manifest.
// ABOUTME: Declares which release tarballs back the environment, by name.

use super::error::ManifestError;
use serde::Deserialize;
use std::collections::HashSet;

/// A release tarball reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReleaseRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReleaseSetManifest {
    #[serde(default)]
    pub releases: Vec<ReleaseRef>,
}

impl ReleaseSetManifest {
    pub fn find_by_name(&self, name: &str) -> Option<&ReleaseRef> {
        self.releases.iter().find(|r| r.name == name)
    }

    pub fn validate(&self) -> Result<(), ManifestError> {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for (idx, release) in self.releases.iter().enumerate() {
            if is_blank(&release.name) {
                errors.push(format!("releases[{idx}].name must be provided"));
            } else if !seen.insert(release.name.as_str()) {
                errors.push(format!(
                    "releases[{idx}].name '{}' must be unique",
                    release.name
                ));
            }

            if is_blank(&release.url) {
                errors.push(format!("releases[{idx}].url must be provided"));
            } else if !has_supported_scheme(&release.url) {
                errors.push(format!(
                    "releases[{idx}].url must be a valid URL (file:// or http(s)://)"
                ));
            } else if release.url.starts_with("http")
                && release.sha1.as_deref().is_none_or(is_blank)
            {
                errors.push(format!("releases[{idx}].sha1 must be provided for http URL"));
            }
        }

        ManifestError::from_errors(errors)
    }
}

pub(crate) fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

pub(crate) fn has_supported_scheme(url: &str) -> bool {
    ["file://", "http://", "https://"]
        .iter()
        .any(|scheme| url.starts_with(scheme))
}
