// ABOUTME: Extracts stemcell tarballs and reads stemcell.MF.
// ABOUTME: The image file stays inside the extracted directory.

use super::error::StemcellError;
use super::extracted::{ExtractedStemcell, StemcellManifest};
use crate::release::remove_dir_if_exists;
use crate::tarball::extract_tgz;
use crate::types::TempRoot;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct StemcellReader {
    temp_root: TempRoot,
}

impl StemcellReader {
    pub fn new(temp_root: TempRoot) -> Self {
        Self { temp_root }
    }

    pub fn read(&self, tarball: &Path) -> Result<ExtractedStemcell, StemcellError> {
        let dir = self.temp_root.new_dir("stemcell")?;
        match read_manifest(tarball, &dir) {
            Ok(manifest) => Ok(ExtractedStemcell::new(manifest, dir)),
            Err(e) => {
                let _ = remove_dir_if_exists(&dir);
                Err(e)
            }
        }
    }
}

fn read_manifest(tarball: &Path, dir: &Path) -> Result<StemcellManifest, StemcellError> {
    extract_tgz(tarball, dir)?;
    let path = dir.join("stemcell.MF");
    let raw = std::fs::read_to_string(&path).map_err(|source| StemcellError::ReadManifest {
        path: path.clone(),
        source,
    })?;
    serde_yaml::from_str(&raw).map_err(|source| StemcellError::ParseManifest { path, source })
}
