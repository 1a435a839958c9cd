// ABOUTME: Stemcells: extraction, fetching, and upload to the cloud.
// ABOUTME: Extracted stemcells clean up after themselves.

mod error;
mod extracted;
mod fetcher;
mod manager;
mod reader;

pub use error::StemcellError;
pub use extracted::{ExtractedStemcell, StemcellManifest};
pub use fetcher::{StemcellFetcher, TarballStemcellFetcher};
pub use manager::{
    CloudStemcell, CloudStemcellManager, RepoStemcellManagerFactory, StemcellManager,
    StemcellManagerFactory,
};
pub use reader::StemcellReader;
