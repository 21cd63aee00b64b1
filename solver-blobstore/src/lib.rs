//! Directory-sharded, content-addressed blob store.
//!
//! Blobs live at `<root>/<prefix>/<key[0:4]>/<key[4:6]>/<key[6:8]>/<key>`,
//! optionally gzip-compressed with a `.gz` suffix. Writes are idempotent:
//! adding a key that already exists is a no-op, never an overwrite.

pub mod error;
pub mod store;

pub use error::{BlobStoreError, BlobStoreResult};
pub use store::{compute_key_from_bytes, compute_key_from_path, BlobStore};
