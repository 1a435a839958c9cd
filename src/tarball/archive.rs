// ABOUTME: Gzipped tarball extraction helpers.
// ABOUTME: Used for release, job, package, and stemcell archives.

use super::error::TarballError;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tar::{Archive, Builder};
use tracing::debug;

/// Unpack a `.tgz` into `dest`, keeping paths as they are in the archive.
pub fn extract_tgz(archive_path: &Path, dest: &Path) -> Result<(), TarballError> {
    let extract_err = |source| TarballError::Extract {
        path: archive_path.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(dest).map_err(extract_err)?;
    let file = File::open(archive_path).map_err(extract_err)?;
    let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));
    archive.set_preserve_permissions(true);
    archive.unpack(dest).map_err(extract_err)?;

    debug!(archive = %archive_path.display(), dest = %dest.display(), "extracted archive");
    Ok(())
}

/// Pack the contents of `src_dir` into a `.tgz` at `archive_path`, rooted at `./`.
pub fn create_tgz(src_dir: &Path, archive_path: &Path) -> std::io::Result<()> {
    let file = File::create(archive_path)?;
    let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
    builder.follow_symlinks(false);
    builder.append_dir_all(".", src_dir)?;
    builder.into_inner()?.finish()?;

    debug!(src = %src_dir.display(), archive = %archive_path.display(), "created archive");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_archive_extracts_to_the_same_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir_all(src.join("cpi/bin")).unwrap();
        std::fs::write(src.join("cpi/bin/cpi"), "#!/bin/sh\n").unwrap();

        let archive = tmp.path().join("rendered.tgz");
        create_tgz(&src, &archive).unwrap();
        let out = tmp.path().join("out");
        extract_tgz(&archive, &out).unwrap();

        assert_eq!(
            std::fs::read_to_string(out.join("cpi/bin/cpi")).unwrap(),
            "#!/bin/sh\n"
        );
    }
}
