//! Persisted history blob
//!
//! The whole history lives in one JSON document under one storage key:
//!
//! ```text
//! {
//!   "currentVersion": 3,
//!   "versions": [[1, {...}], [2, {...}], [3, {...}]],
//!   "branches": [["main", {...}], ["5f1c...", {...}]],
//!   "activeBranchId": "main",
//!   "lastSaved": "2024-05-01T12:00:00Z",
//!   "schemaVersion": 1
//! }
//! ```
//!
//! Version and branch records are kept as raw JSON here. Deciding whether a
//! record is well-formed belongs to the schema validator, which must see
//! malformed records rather than have them rejected at parse time.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use verso_core::{VersionNumber, INITIAL_VERSION, MAIN_BRANCH_ID};

use crate::error::StorageResult;
use crate::kv::KeyValueStore;

/// Current blob schema version
pub const SCHEMA_VERSION: u32 = 1;

fn default_current_version() -> VersionNumber {
    INITIAL_VERSION
}

fn default_active_branch() -> String {
    MAIN_BRANCH_ID.to_string()
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// The persisted envelope around versions and branches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedHistory {
    /// Cursor version at save time
    #[serde(default = "default_current_version")]
    pub current_version: VersionNumber,
    /// `[number, record]` pairs in ascending number order
    #[serde(default)]
    pub versions: Vec<(VersionNumber, Value)>,
    /// `[id, record]` pairs in ascending id order
    #[serde(default)]
    pub branches: Vec<(String, Value)>,
    /// Branch new commits land on
    #[serde(default = "default_active_branch")]
    pub active_branch_id: String,
    /// RFC 3339 time of the last commit (kept raw; parsed by the engine)
    #[serde(default)]
    pub last_saved: Option<String>,
    /// Blob schema version
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

impl PersistedHistory {
    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> StorageResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> StorageResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Read and parse the blob under `key`; `None` if nothing is stored
    pub fn load(store: &dyn KeyValueStore, key: &str) -> StorageResult<Option<Self>> {
        match store.read(key)? {
            Some(bytes) => Ok(Some(Self::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Serialize and write the blob under `key`
    pub fn save(&self, store: &dyn KeyValueStore, key: &str) -> StorageResult<()> {
        store.write(key, &self.to_bytes()?)
    }
}
