// ABOUTME: The installation fragment (cloud_provider) of a combined manifest.
// ABOUTME: Names the CPI job(s), the agent message bus, and its CA.

use super::error::ManifestError;
use super::release_set::{ReleaseSetManifest, is_blank};
use crate::config::Properties;
use serde::Deserialize;

/// A job within a named release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReleaseJobRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub release: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Certificate {
    #[serde(default)]
    pub ca: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstallationManifest {
    pub name: String,
    pub templates: Vec<ReleaseJobRef>,
    pub mbus: String,
    pub cert: Certificate,
    pub properties: Properties,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawCombinedManifest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    cloud_provider: Option<RawCloudProvider>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCloudProvider {
    #[serde(default)]
    template: Option<ReleaseJobRef>,
    #[serde(default)]
    templates: Vec<ReleaseJobRef>,
    #[serde(default)]
    mbus: String,
    #[serde(default)]
    cert: Certificate,
    #[serde(default)]
    properties: Option<Properties>,
}

impl InstallationManifest {
    pub(crate) fn from_raw(raw: RawCombinedManifest) -> Self {
        let provider = raw.cloud_provider.unwrap_or_default();
        let mut templates: Vec<ReleaseJobRef> = provider.template.into_iter().collect();
        templates.extend(provider.templates);

        Self {
            name: raw.name,
            templates,
            mbus: provider.mbus,
            cert: provider.cert,
            properties: provider.properties.unwrap_or_default(),
        }
    }

    /// Names of the releases the CPI templates come from, in template order.
    pub fn cpi_releases(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for template in &self.templates {
            if !names.contains(&template.release.as_str()) {
                names.push(&template.release);
            }
        }
        names
    }

    pub fn validate(&self, release_set: &ReleaseSetManifest) -> Result<(), ManifestError> {
        let mut errors = Vec::new();

        if self.templates.is_empty() {
            errors.push("cloud_provider.template must be provided".to_string());
        }

        for (idx, template) in self.templates.iter().enumerate() {
            if is_blank(&template.name) {
                errors.push(format!("cloud_provider.templates[{idx}].name must be provided"));
            }
            if is_blank(&template.release) {
                errors.push(format!(
                    "cloud_provider.templates[{idx}].release must be provided"
                ));
            } else if release_set.find_by_name(&template.release).is_none() {
                errors.push(format!(
                    "cloud_provider.templates[{idx}].release '{}' must refer to a release in releases",
                    template.release
                ));
            }
        }

        if !is_blank(&self.mbus) && reqwest::Url::parse(&self.mbus).is_err() {
            errors.push("cloud_provider.mbus must be a valid URL".to_string());
        }

        ManifestError::from_errors(errors)
    }
}
