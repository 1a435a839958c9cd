// ABOUTME: A stemcell tarball extracted under the temp root.
// ABOUTME: Owns its directory: delete() removes it, and so does drop.

use crate::config::Properties;
use crate::release::remove_dir_if_exists;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Contents of `stemcell.MF`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StemcellManifest {
    pub name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub version: String,
    #[serde(default)]
    pub api_version: u32,
    #[serde(default)]
    pub sha1: String,
    #[serde(default)]
    pub operating_system: String,
    #[serde(default)]
    pub cloud_properties: Properties,
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
    })
}

#[derive(Debug)]
pub struct ExtractedStemcell {
    manifest: StemcellManifest,
    extracted_path: PathBuf,
    deleted: bool,
}

impl ExtractedStemcell {
    pub fn new(manifest: StemcellManifest, extracted_path: PathBuf) -> Self {
        Self {
            manifest,
            extracted_path,
            deleted: false,
        }
    }

    pub fn manifest(&self) -> &StemcellManifest {
        &self.manifest
    }

    pub fn extracted_path(&self) -> &Path {
        &self.extracted_path
    }

    pub fn image_path(&self) -> PathBuf {
        self.extracted_path.join("image")
    }

    /// Stemcell API version, treating an unset version as 1.
    pub fn api_version(&self) -> u32 {
        self.manifest.api_version.max(1)
    }

    pub fn delete(mut self) -> std::io::Result<()> {
        self.deleted = true;
        remove_dir_if_exists(&self.extracted_path)
    }
}

impl Drop for ExtractedStemcell {
    fn drop(&mut self) {
        if self.deleted {
            return;
        }
        if let Err(e) = remove_dir_if_exists(&self.extracted_path) {
            warn!(path = %self.extracted_path.display(), error = %e, "failed to delete extracted stemcell");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_accepts_numeric_version() {
        let manifest: StemcellManifest =
            serde_yaml::from_str("name: ubuntu\nversion: 621.5\napi_version: 3\n").unwrap();
        assert_eq!(manifest.version, "621.5");
        assert_eq!(manifest.api_version, 3);
    }

    #[test]
    fn unset_api_version_reads_as_one() {
        let stemcell = ExtractedStemcell::new(StemcellManifest::default(), PathBuf::from("/nonexistent"));
        assert_eq!(stemcell.api_version(), 1);
    }

    #[test]
    fn drop_removes_extracted_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("stemcell");
        std::fs::create_dir(&dir).unwrap();

        drop(ExtractedStemcell::new(StemcellManifest::default(), dir.clone()));
        assert!(!dir.exists());
    }
}
