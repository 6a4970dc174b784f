//! Storage layer for Verso
//!
//! This crate implements durable key-value persistence for document history:
//! - KeyValueStore: the byte-oriented storage seam
//! - MemoryStore: BTreeMap-based store behind a `parking_lot::RwLock`
//! - FileStore: one file per key, atomic replace, bytes through a codec
//! - codec: StorageCodec seam (IdentityCodec)
//! - blob: the persisted history blob shape
//!
//! The storage layer knows nothing about versions or branches beyond the
//! blob's envelope; interpreting entries is the engine's job.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod blob;
pub mod codec;
pub mod error;
pub mod file;
pub mod kv;

pub use blob::{PersistedHistory, SCHEMA_VERSION};
pub use codec::{get_codec, CodecError, IdentityCodec, StorageCodec};
pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use kv::{KeyValueStore, MemoryStore};
