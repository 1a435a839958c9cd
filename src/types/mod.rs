// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Phantom-typed CIDs, artifact digests, mbus URLs, uuids, and the temp root.

mod digest;
mod id;
mod mbus;
mod temp_root;
mod uuid_gen;

pub use digest::{Digest, DigestAlgorithm, DigestError, sha256_hex};
pub use id::{Cid, DiskCid, StemcellCid, VmCid};
pub use mbus::MbusUrl;
pub use temp_root::TempRoot;
pub use uuid_gen::{RandomUuidGenerator, UuidGenerator};
