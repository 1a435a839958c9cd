// ABOUTME: Persisted deployment state record and its entries.
// ABOUTME: One JSON document per environment, read and rewritten on every change.

use super::deserialize::{null_as_empty, null_as_empty_map};
use serde::{Deserialize, Serialize};

pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Everything the installer remembers about an environment between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentState {
    #[serde(default)]
    pub director_id: String,

    #[serde(default)]
    pub installation_id: String,

    #[serde(default)]
    pub current_vm_cid: String,

    #[serde(default)]
    pub current_stemcell_id: String,

    #[serde(default)]
    pub current_disk_id: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub current_release_ids: Vec<String>,

    #[serde(default)]
    pub current_manifest_sha: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub disks: Vec<DiskRecord>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub stemcells: Vec<StemcellRecord>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub releases: Vec<ReleaseRecord>,
}

impl DeploymentState {
    /// CIDs of every persistent disk known to this environment, in record order.
    pub fn disk_cids(&self) -> Vec<String> {
        self.disks.iter().map(|d| d.cid.clone()).collect()
    }

    /// The stemcell record marked as current, if any.
    pub fn current_stemcell(&self) -> Option<&StemcellRecord> {
        if self.current_stemcell_id.is_empty() {
            return None;
        }
        self.stemcells
            .iter()
            .find(|s| s.id == self.current_stemcell_id)
    }

    /// Release records referenced by `current_release_ids`.
    pub fn current_releases(&self) -> Vec<&ReleaseRecord> {
        self.current_release_ids
            .iter()
            .filter_map(|id| self.releases.iter().find(|r| &r.id == id))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskRecord {
    pub id: String,
    pub cid: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default, deserialize_with = "null_as_empty_map")]
    pub cloud_properties: Properties,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StemcellRecord {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub api_version: u32,
    pub cid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRecord {
    pub id: String,
    pub name: String,
    pub version: String,
}

/// A release identified by name and version, without a record id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReleaseVersion {
    pub name: String,
    pub version: String,
}

impl ReleaseVersion {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl std::fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_collections_read_as_empty_and_write_as_arrays() {
        let state: DeploymentState =
            serde_json::from_str(r#"{"director_id":"d","disks":null,"releases":null}"#).unwrap();
        assert!(state.disks.is_empty());
        assert!(state.releases.is_empty());

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["disks"].to_string(), "[]");
        assert_eq!(json["current_release_ids"].to_string(), "[]");
    }

    #[test]
    fn current_stemcell_requires_matching_id() {
        let mut state = DeploymentState {
            stemcells: vec![StemcellRecord {
                id: "s-1".to_string(),
                name: "ubuntu".to_string(),
                version: "1".to_string(),
                api_version: 2,
                cid: "cid".to_string(),
            }],
            ..Default::default()
        };
        assert!(state.current_stemcell().is_none());

        state.current_stemcell_id = "s-1".to_string();
        assert_eq!(state.current_stemcell().map(|s| s.cid.as_str()), Some("cid"));
    }

    #[test]
    fn current_releases_skip_dangling_ids() {
        let state = DeploymentState {
            current_release_ids: vec!["r-1".to_string(), "missing".to_string()],
            releases: vec![ReleaseRecord {
                id: "r-1".to_string(),
                name: "cpi".to_string(),
                version: "3".to_string(),
            }],
            ..Default::default()
        };
        let names: Vec<_> = state.current_releases().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["cpi"]);
    }
}
