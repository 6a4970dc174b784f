//! Document service handle
//!
//! [`Document`] is what the editing surface and the branch visualization
//! share. It owns one [`HistoryEngine`] behind a lock, the store the history
//! is persisted to, the debounced [`SaveScheduler`], and the
//! [`ContentSink`] that receives content whenever navigation changes the
//! visible version.
//!
//! Every mutation is persisted before the lock is released. Content is
//! pushed to the sink after the lock is released, so a sink may call back
//! into the document.
//!
//! Navigation (branch create/switch, reset, recovery) cancels any pending
//! save first; a save that fires anyway after the active branch moved is
//! dropped by the commit path.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use verso_core::time::time_ago;
use verso_core::{
    Branch, BranchVersion, HistoryError, HistoryResult, StorageValidationState, VersionNumber,
};
use verso_storage::{FileStore, KeyValueStore};

use crate::config::{VersoConfig, CONFIG_FILE_NAME};
use crate::history::HistoryEngine;
use crate::persistence::{load_history, save_history};
use crate::scheduler::{PendingSave, SaveScheduler};

/// Receives document content when the visible version changes
///
/// `Value::Null` means the editing surface must clear its content.
pub trait ContentSink: Send + Sync {
    /// Replace the visible content
    fn set_content(&self, content: &Value);
}

/// Sink that ignores content
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ContentSink for NullSink {
    fn set_content(&self, _content: &Value) {}
}

struct Shared {
    engine: Mutex<HistoryEngine>,
    store: Box<dyn KeyValueStore>,
    storage_key: String,
    sink: Box<dyn ContentSink>,
    last_storage_error: Mutex<Option<HistoryError>>,
}

impl Shared {
    /// Write the engine to the store, remembering the outcome
    fn persist(&self, engine: &HistoryEngine) -> HistoryResult<()> {
        let result = save_history(engine, self.store.as_ref(), &self.storage_key);
        *self.last_storage_error.lock() = result.as_ref().err().cloned();
        result
    }

    /// Commit path for deferred saves
    fn commit_scheduled(&self, save: PendingSave) {
        let mut engine = self.engine.lock();
        if save.branch_id != engine.active_branch_id() {
            warn!(
                target: "verso::document",
                requested_on = %save.branch_id,
                active = %engine.active_branch_id(),
                "Dropping save requested on another branch"
            );
            return;
        }
        let version = match engine.commit(save.content) {
            Ok(version) => version,
            Err(e) => {
                error!(target: "verso::document", error = %e, "Deferred save failed");
                *self.last_storage_error.lock() = Some(e);
                return;
            }
        };
        debug!(
            target: "verso::document",
            version,
            waited_ms = save.requested_at.elapsed().as_millis() as u64,
            "Committed deferred save"
        );
        // Failure is logged and kept in last_storage_error
        let _ = self.persist(&engine);
    }
}

/// Shared handle to one document's history
pub struct Document {
    shared: Arc<Shared>,
    scheduler: SaveScheduler,
    load_error: Option<HistoryError>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("storage_key", &self.shared.storage_key)
            .field("scheduler", &self.scheduler)
            .field("load_error", &self.load_error)
            .finish()
    }
}

impl Document {
    /// Open the document stored in `store`
    pub fn open(config: &VersoConfig, store: impl KeyValueStore + 'static) -> HistoryResult<Self> {
        Self::open_with_sink(config, store, NullSink)
    }

    /// Open the document stored in `store`, pushing content to `sink`
    ///
    /// A corrupt history is recovered immediately; the recovery outcome is
    /// kept as [`Document::load_error`] rather than failing the open. The
    /// sink receives the current version's content if there is any.
    pub fn open_with_sink(
        config: &VersoConfig,
        store: impl KeyValueStore + 'static,
        sink: impl ContentSink + 'static,
    ) -> HistoryResult<Self> {
        config.validate()?;

        let report = load_history(&store, &config.storage_key);
        let mut engine = report.engine;
        let mut load_error = report.error;
        let mut needs_persist = false;
        if !engine.storage_state().is_storage_valid {
            if let Err(e) = engine.recover_from_corruption() {
                load_error = Some(e);
            }
            needs_persist = true;
        }

        let shared = Arc::new(Shared {
            engine: Mutex::new(engine),
            store: Box::new(store),
            storage_key: config.storage_key.clone(),
            sink: Box::new(sink),
            last_storage_error: Mutex::new(None),
        });

        let commit_target = Arc::clone(&shared);
        let scheduler = SaveScheduler::new(config.save_debounce(), move |save| {
            commit_target.commit_scheduled(save)
        })
        .map_err(|e| HistoryError::storage(format!("Failed to start save scheduler: {}", e)))?;

        let visible = {
            let engine = shared.engine.lock();
            if needs_persist {
                let _ = shared.persist(&engine);
            }
            visible_content(&engine)
        };
        if let Some(content) = visible {
            shared.sink.set_content(&content);
        }

        info!(
            target: "verso::document",
            key = %config.storage_key,
            recovered = needs_persist,
            "Opened document"
        );
        Ok(Document {
            shared,
            scheduler,
            load_error,
        })
    }

    /// Open the document kept in directory `dir`
    ///
    /// Creates the directory and a default `verso.toml` if missing.
    pub fn open_dir(dir: impl AsRef<Path>) -> HistoryResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| {
            HistoryError::storage(format!("Failed to create '{}': {}", dir.display(), e))
        })?;
        let config_path = dir.join(CONFIG_FILE_NAME);
        VersoConfig::write_default_if_missing(&config_path)?;
        let config = VersoConfig::from_file(&config_path)?;
        let store = FileStore::with_codec(dir, config.codec()?)?;
        Self::open(&config, store)
    }

    /// Why the stored history could not be used as-is, if it could not
    pub fn load_error(&self) -> Option<&HistoryError> {
        self.load_error.as_ref()
    }

    /// Error from the most recent save, if it failed
    pub fn storage_error(&self) -> Option<HistoryError> {
        self.shared.last_storage_error.lock().clone()
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Record one change from the editing surface
    pub fn record_change(&self, step: Value) {
        self.shared.engine.lock().record_change(step);
    }

    /// Ask for `content` to be committed once edits go quiet
    pub fn request_save(&self, content: Value) {
        let branch_id = self.shared.engine.lock().active_branch_id().to_string();
        self.scheduler.schedule(content, branch_id);
    }

    /// Commit `content` immediately, replacing any pending save
    ///
    /// The version exists in memory even if persisting it fails.
    pub fn save_now(&self, content: Value) -> HistoryResult<VersionNumber> {
        self.scheduler.cancel();
        let mut engine = self.shared.engine.lock();
        let version = engine.commit(content)?;
        self.shared.persist(&engine)?;
        Ok(version)
    }

    /// Commit the pending save now; returns whether there was one
    pub fn flush(&self) -> bool {
        self.scheduler.flush()
    }

    /// Whether a deferred save is waiting or in flight
    pub fn has_pending_save(&self) -> bool {
        self.scheduler.has_pending()
    }

    /// Block until the deferred save (if any) has landed
    pub fn wait_for_idle(&self, timeout: std::time::Duration) -> bool {
        self.scheduler.wait_for_idle(timeout)
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Show version `n`
    ///
    /// A pending save is committed first so no edit is lost; the cursor then
    /// moves to `n` and its content goes to the sink.
    pub fn select_version(&self, n: VersionNumber) -> HistoryResult<Value> {
        self.scheduler.flush();
        let content = {
            let mut engine = self.shared.engine.lock();
            engine.set_current_version(n)?;
            let content = engine.get_version_content(n)?;
            let _ = self.shared.persist(&engine);
            content
        };
        self.shared.sink.set_content(&content);
        Ok(content)
    }

    /// Fork a branch at `parent_version_id` off the active branch
    pub fn create_branch(&self, parent_version_id: VersionNumber) -> HistoryResult<Branch> {
        self.scheduler.cancel();
        let (branch, content) = {
            let mut engine = self.shared.engine.lock();
            let branch = engine.create_branch(parent_version_id)?;
            let content = engine.get_version_content(parent_version_id)?;
            let _ = self.shared.persist(&engine);
            (branch, content)
        };
        self.shared.sink.set_content(&content);
        Ok(branch)
    }

    /// Make `branch_id` active and show its tip
    ///
    /// Uncommitted edits are discarded.
    pub fn switch_branch(&self, branch_id: &str) -> HistoryResult<()> {
        self.scheduler.cancel();
        let content = {
            let mut engine = self.shared.engine.lock();
            engine.switch_branch(branch_id)?;
            let content = engine.get_version_content(engine.current_version())?;
            let _ = self.shared.persist(&engine);
            content
        };
        self.shared.sink.set_content(&content);
        Ok(())
    }

    /// Drop all history and clear the editing surface
    pub fn reset(&self) {
        self.scheduler.cancel();
        {
            let mut engine = self.shared.engine.lock();
            engine.reset();
            let _ = self.shared.persist(&engine);
        }
        info!(target: "verso::document", "History reset");
        self.shared.sink.set_content(&Value::Null);
    }

    /// Validate the in-memory history and recover it if corrupt
    ///
    /// `Ok(())` means nothing needed repair. Otherwise the recovery outcome
    /// is returned as the error and the repaired history is persisted.
    pub fn recover(&self) -> HistoryResult<()> {
        self.scheduler.cancel();
        let (result, visible) = {
            let mut engine = self.shared.engine.lock();
            engine.validate_storage();
            let result = engine.recover_from_corruption();
            if result.is_err() {
                let _ = self.shared.persist(&engine);
            }
            (result, visible_content(&engine))
        };
        if let Err(e) = &result {
            let content = if e.content_reset() {
                Value::Null
            } else {
                visible.unwrap_or(Value::Null)
            };
            self.shared.sink.set_content(&content);
        }
        result
    }

    /// Re-run storage validation on the in-memory history
    pub fn validate_storage(&self) -> StorageValidationState {
        self.shared.engine.lock().validate_storage()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Run `f` against the engine under the lock
    pub fn with_history<R>(&self, f: impl FnOnce(&HistoryEngine) -> R) -> R {
        let engine = self.shared.engine.lock();
        f(&*engine)
    }

    /// Content of version `n`
    pub fn version_content(&self, n: VersionNumber) -> HistoryResult<Value> {
        self.shared.engine.lock().get_version_content(n)
    }

    /// All branches, main first
    pub fn branches(&self) -> Vec<Branch> {
        self.shared
            .engine
            .lock()
            .all_branches()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Effective history of a branch
    pub fn branch_versions(&self, branch_id: &str) -> HistoryResult<Vec<BranchVersion>> {
        self.shared.engine.lock().get_branch_versions(branch_id)
    }

    /// The branch new commits land on
    pub fn active_branch(&self) -> Option<Branch> {
        self.shared.engine.lock().active_branch().cloned()
    }

    /// Cursor version
    pub fn current_version(&self) -> VersionNumber {
        self.shared.engine.lock().current_version()
    }

    /// Relative time of the last commit, e.g. `"5m ago"`
    pub fn last_saved_label(&self) -> String {
        let last_saved = self.shared.engine.lock().last_saved();
        time_ago(last_saved, Utc::now())
    }

    /// Commit any pending save and stop the scheduler
    pub fn close(self) {
        self.scheduler.shutdown();
    }
}

/// Content of the cursor version, if there is one to show
fn visible_content(engine: &HistoryEngine) -> Option<Value> {
    if !engine.has_content() {
        return None;
    }
    engine.get_version_content(engine.current_version()).ok()
}
