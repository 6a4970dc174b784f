//! File-backed key-value store
//!
//! Each key maps to one file inside a data directory. Writes go to a
//! sibling temp file which is synced and renamed over the target, so a
//! crash mid-write leaves either the old blob or the new one, never a torn
//! mix. Bytes pass through the configured [`StorageCodec`].

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::codec::{IdentityCodec, StorageCodec};
use crate::error::{StorageError, StorageResult};
use crate::kv::KeyValueStore;

/// Directory of one-file-per-key blobs
pub struct FileStore {
    dir: PathBuf,
    codec: Box<dyn StorageCodec>,
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("dir", &self.dir)
            .field("codec", &self.codec.codec_id())
            .finish()
    }
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir` with the identity codec
    pub fn open(dir: impl AsRef<Path>) -> StorageResult<Self> {
        Self::with_codec(dir, Box::new(IdentityCodec))
    }

    /// Open a store rooted at `dir` using `codec`
    pub fn with_codec(dir: impl AsRef<Path>, codec: Box<dyn StorageCodec>) -> StorageResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(FileStore { dir, codec })
    }

    /// Data directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`
    ///
    /// Keys are restricted to `[A-Za-z0-9._-]` and may not start with a dot,
    /// so they can never escape the data directory or collide with temp files.
    pub fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        let well_formed = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !well_formed {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(key))
    }
}

impl KeyValueStore for FileStore {
    fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(self.codec.decode(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        let path = self.path_for(key)?;
        let tmp = self.dir.join(format!(".{}.tmp", key));
        let encoded = self.codec.encode(value);

        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&encoded)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;

        debug!(target: "verso::storage", key, bytes = encoded.len(), "Wrote blob");
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
