//! Storage collaborators: blob bytes and artifact records.
//!
//! Both are consumed through traits. The in-memory and local-filesystem
//! implementations serve the CLI and the tests; deployments plug in their
//! object store and database.

pub mod artifact;
pub mod blob;

pub use artifact::{ArtifactRepository, MemoryArtifactRepository, StoredArtifact};
pub use blob::{BlobStorage, LocalBlobStorage, MemoryBlobStorage};
