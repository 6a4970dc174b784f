//! Loading and saving the engine through a key-value store
//!
//! Load never fails outright. An absent blob yields a fresh engine; an
//! unreadable one is logged, backed up under `"{key}.bak"` and replaced by
//! a fresh engine, with the error kept in the [`LoadReport`]. Corrupt
//! individual records survive load as [`Record::Corrupt`] slots and are
//! reported through the engine's validation state instead.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use verso_core::{
    Branch, HistoryError, HistoryResult, Record, Version, INITIAL_VERSION, MAIN_BRANCH_ID,
    MAX_VERSION,
};
use verso_storage::{KeyValueStore, PersistedHistory, StorageError, SCHEMA_VERSION};

use crate::history::HistoryEngine;

/// Outcome of [`load_history`]
#[derive(Debug)]
pub struct LoadReport {
    /// The loaded (or fresh) engine
    pub engine: HistoryEngine,
    /// Why the stored blob could not be used, if it could not
    pub error: Option<HistoryError>,
}

impl HistoryEngine {
    /// Snapshot the engine into the persisted envelope
    pub fn to_persisted(&self) -> HistoryResult<PersistedHistory> {
        let versions = self
            .versions
            .iter()
            .map(|(n, record)| Ok((*n, record.encode()?)))
            .collect::<serde_json::Result<Vec<_>>>()
            .map_err(|e| HistoryError::storage(e.to_string()))?;
        let branches = self
            .branches
            .iter()
            .map(|(id, record)| Ok((id.clone(), record.encode()?)))
            .collect::<serde_json::Result<Vec<_>>>()
            .map_err(|e| HistoryError::storage(e.to_string()))?;

        Ok(PersistedHistory {
            current_version: self.current_version,
            versions,
            branches,
            active_branch_id: self.active_branch_id.clone(),
            last_saved: Some(self.last_saved.to_rfc3339()),
            schema_version: SCHEMA_VERSION,
        })
    }

    /// Rebuild an engine from the persisted envelope
    ///
    /// Each entry is decoded into a [`Record`]; entries that fail the
    /// validator are kept as corrupt slots. A main branch is synthesized if
    /// absent, and the active branch and cursor fall back to something that
    /// exists. Storage is validated before returning.
    pub fn from_persisted(blob: PersistedHistory) -> Self {
        if blob.schema_version > SCHEMA_VERSION {
            warn!(
                target: "verso::storage",
                found = blob.schema_version,
                supported = SCHEMA_VERSION,
                "Blob written by a newer schema"
            );
        }

        let mut engine = HistoryEngine::new();
        engine.branches.clear();

        for (n, raw) in blob.versions {
            if n < INITIAL_VERSION {
                warn!(target: "verso::storage", version = n, "Skipping invalid version key");
                continue;
            }
            if n > MAX_VERSION {
                warn!(target: "verso::storage", version = n, "Version key out of range");
                engine.versions.insert(n, Record::Corrupt(raw));
                continue;
            }
            engine.versions.insert(n, Record::<Version>::decode(n, raw));
        }
        for (id, raw) in blob.branches {
            let record = match Record::<Branch>::decode(raw.clone()) {
                Record::Intact(branch) if branch.id != id => {
                    warn!(
                        target: "verso::storage",
                        key = %id,
                        record = %branch.id,
                        "Branch id does not match its key"
                    );
                    Record::Corrupt(raw)
                }
                record => record,
            };
            engine.branches.insert(id, record);
        }
        engine.ensure_main_branch();

        engine.active_branch_id = blob.active_branch_id;
        if !engine.branches.contains_key(&engine.active_branch_id) {
            warn!(
                target: "verso::storage",
                active = %engine.active_branch_id,
                "Active branch missing, falling back to main"
            );
            engine.active_branch_id = MAIN_BRANCH_ID.to_string();
        }

        engine.current_version = blob.current_version;
        if !engine.versions.contains_key(&engine.current_version) {
            engine.current_version = engine
                .active_branch()
                .map(|b| b.current_version_id)
                .filter(|tip| engine.versions.contains_key(tip))
                .or_else(|| engine.latest_version())
                .unwrap_or(INITIAL_VERSION);
        }

        engine.last_saved = blob
            .last_saved
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);
        engine.is_initial_editing = engine.versions.is_empty();
        engine.validate_storage();
        engine
    }
}

/// Load the engine stored under `key`
pub fn load_history(store: &dyn KeyValueStore, key: &str) -> LoadReport {
    match PersistedHistory::load(store, key) {
        Ok(Some(blob)) => {
            let engine = HistoryEngine::from_persisted(blob);
            info!(
                target: "verso::storage",
                key,
                versions = engine.version_count(),
                branches = engine.branches.len(),
                valid = engine.storage_state().is_storage_valid,
                "Loaded history"
            );
            LoadReport {
                engine,
                error: None,
            }
        }
        Ok(None) => {
            debug!(target: "verso::storage", key, "No stored history");
            LoadReport {
                engine: HistoryEngine::new(),
                error: None,
            }
        }
        Err(e @ StorageError::Serialization(_)) => {
            error!(target: "verso::storage", key, error = %e, "Stored history is unreadable");
            back_up(store, key);
            LoadReport {
                engine: HistoryEngine::new(),
                error: Some(e.into()),
            }
        }
        Err(e) => {
            error!(target: "verso::storage", key, error = %e, "Failed to read stored history");
            LoadReport {
                engine: HistoryEngine::new(),
                error: Some(e.into()),
            }
        }
    }
}

/// Copy the raw bytes under `key` to `"{key}.bak"`
fn back_up(store: &dyn KeyValueStore, key: &str) {
    let backup = format!("{}.bak", key);
    let result = match store.read(key) {
        Ok(Some(bytes)) => store.write(&backup, &bytes),
        Ok(None) => Ok(()),
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        warn!(
            target: "verso::storage",
            key = %backup,
            error = %e,
            "Failed to back up unreadable history"
        );
    }
}

/// Persist the engine under `key`
pub fn save_history(
    engine: &HistoryEngine,
    store: &dyn KeyValueStore,
    key: &str,
) -> HistoryResult<()> {
    let blob = engine.to_persisted()?;
    blob.save(store, key).map_err(|e| {
        error!(target: "verso::storage", key, error = %e, "Failed to save history");
        HistoryError::from(e)
    })?;
    debug!(
        target: "verso::storage",
        key,
        versions = blob.versions.len(),
        current = blob.current_version,
        "Saved history"
    );
    Ok(())
}
