// ABOUTME: Tarball sources, download cache, and archive extraction.
// ABOUTME: Shared by the release and stemcell fetchers.

mod archive;
mod cache;
mod error;
mod provider;

pub use archive::{create_tgz, extract_tgz};
pub use cache::TarballCache;
pub use error::TarballError;
pub use provider::{TarballProvider, TarballSource};
