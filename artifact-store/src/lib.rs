//! Versioned artifact store: content-addressed objects plus a relational
//! index of DocumentVersion rows.
//!
//! Backends implement the [`object_store::ObjectStore`] capability; the
//! S3-compatible implementation covers AWS S3, Cloudflare R2 and GCS
//! interop, the filesystem implementation covers tests and local runs.

pub mod errors;
pub mod index;
pub mod metadata;
pub mod object_store;
pub mod s3;
pub mod store;

pub use errors::{Result, StoreError};
pub use index::{ProjectRow, ProjectSettingsRow, VersionIndex, VersionRow};
pub use metadata::VersionMetadata;
pub use object_store::{FsStore, ObjectStore};
pub use s3::{BucketPath, S3Store};
pub use store::{ArtifactStore, METADATA_FILE, SearchFilters, SearchHit, UploadRequest};
