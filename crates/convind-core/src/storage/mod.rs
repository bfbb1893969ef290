//! Storage layer
//!
//! Filesystem persistence for the content store.
//!
//! ## Architecture
//!
//! - **persistence**: directory layout and atomic (staged + renamed) writes
//! - **error**: typed storage errors with path context
//!
//! Revisions are write-once. Nothing in this layer updates a file in place.

pub mod error;
pub mod persistence;

pub use error::{StorageError, StorageResult};
pub use persistence::{atomic_copy, atomic_write, StoreLayout, MIME_TYPE_FILE};
