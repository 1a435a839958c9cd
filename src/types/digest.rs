// ABOUTME: Artifact checksums as written in manifests.
// ABOUTME: Bare hex is SHA-1; "sha256:<hex>" selects SHA-256.

use sha1::Sha1;
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DigestError {
    #[error("digest cannot be empty")]
    Empty,

    #[error("unsupported digest algorithm: '{0}'")]
    UnsupportedAlgorithm(String),

    #[error("digest is not hex: '{0}'")]
    NotHex(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    Sha1,
    Sha256,
}

/// A checksum for a downloaded or local artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    algorithm: DigestAlgorithm,
    hex: String,
}

impl Digest {
    pub fn parse(value: &str) -> Result<Self, DigestError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(DigestError::Empty);
        }

        let (algorithm, hex) = match value.split_once(':') {
            None => (DigestAlgorithm::Sha1, value),
            Some(("sha1", hex)) => (DigestAlgorithm::Sha1, hex),
            Some(("sha256", hex)) => (DigestAlgorithm::Sha256, hex),
            Some((other, _)) => return Err(DigestError::UnsupportedAlgorithm(other.to_string())),
        };

        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DigestError::NotHex(hex.to_string()));
        }

        Ok(Self {
            algorithm,
            hex: hex.to_ascii_lowercase(),
        })
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Compute the digest of `path` with this digest's algorithm.
    pub fn of_file(algorithm: DigestAlgorithm, path: &Path) -> std::io::Result<Self> {
        let mut file = std::fs::File::open(path)?;
        let mut buf = vec![0u8; 64 * 1024];
        let hex = match algorithm {
            DigestAlgorithm::Sha1 => {
                let mut hasher = Sha1::new();
                loop {
                    let n = file.read(&mut buf)?;
                    if n == 0 {
                        break;
                    }
                    hasher.update(&buf[..n]);
                }
                hex::encode(hasher.finalize())
            }
            DigestAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                loop {
                    let n = file.read(&mut buf)?;
                    if n == 0 {
                        break;
                    }
                    hasher.update(&buf[..n]);
                }
                hex::encode(hasher.finalize())
            }
        };
        Ok(Self { algorithm, hex })
    }

    /// Whether the file at `path` has this digest.
    pub fn matches_file(&self, path: &Path) -> std::io::Result<bool> {
        Ok(Self::of_file(self.algorithm, path)?.hex == self.hex)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.algorithm {
            DigestAlgorithm::Sha1 => write!(f, "{}", self.hex),
            DigestAlgorithm::Sha256 => write!(f, "sha256:{}", self.hex),
        }
    }
}

/// Hex SHA-256 of a byte slice.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
