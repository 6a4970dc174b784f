//! The history engine
//!
//! [`HistoryEngine`] owns every version and branch of one document, the
//! cursor (the version currently shown), the buffer of change records not
//! yet committed, and the result of the last storage validation.
//!
//! ## Numbering
//!
//! Version numbers are global, not per branch: a commit always takes the
//! highest existing number plus one, whichever branch it lands on. The
//! parent of a new version is the cursor at commit time, which after a
//! branch create or switch is the fork point or the branch tip.
//!
//! ## Layout
//!
//! - this module: state, commit and version lookups
//! - `branch`: branch create/switch and effective-history traversal
//! - `recovery`: storage validation and corruption recovery
//!
//! All operations run to completion on `&mut self`; callers that share an
//! engine across threads wrap it in a lock (see [`crate::Document`]).

mod branch;
mod recovery;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};
use verso_core::validation::check_version_number;
use verso_core::{
    Branch, ChangeRecord, HistoryError, HistoryResult, Record, StorageValidationState, Version,
    VersionNumber, INITIAL_VERSION, MAIN_BRANCH_ID, MAX_VERSION,
};

/// Version and branch state for one document
#[derive(Debug, Clone)]
pub struct HistoryEngine {
    /// Cursor: the version currently shown
    pub(crate) current_version: VersionNumber,
    /// Change records since the last commit
    pub(crate) pending: Vec<ChangeRecord>,
    /// All versions, ordered by number
    pub(crate) versions: BTreeMap<VersionNumber, Record<Version>>,
    /// All branches, ordered by id
    pub(crate) branches: BTreeMap<String, Record<Branch>>,
    /// Branch new commits land on
    pub(crate) active_branch_id: String,
    /// Whether there are edits since the last commit
    pub(crate) is_dirty: bool,
    /// Time of the last commit
    pub(crate) last_saved: DateTime<Utc>,
    /// Whether the editor is still on its first, never-committed content
    pub(crate) is_initial_editing: bool,
    /// Result of the last validation pass
    pub(crate) storage_state: StorageValidationState,
}

impl Default for HistoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryEngine {
    /// Create an empty history with a main branch and no versions
    pub fn new() -> Self {
        let mut branches = BTreeMap::new();
        branches.insert(
            MAIN_BRANCH_ID.to_string(),
            Record::Intact(Branch::main(INITIAL_VERSION)),
        );
        HistoryEngine {
            current_version: INITIAL_VERSION,
            pending: Vec::new(),
            versions: BTreeMap::new(),
            branches,
            active_branch_id: MAIN_BRANCH_ID.to_string(),
            is_dirty: false,
            last_saved: Utc::now(),
            is_initial_editing: true,
            storage_state: StorageValidationState::default(),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Cursor version
    pub fn current_version(&self) -> VersionNumber {
        self.current_version
    }

    /// Highest version number, if any version exists
    pub fn latest_version(&self) -> Option<VersionNumber> {
        self.versions.keys().next_back().copied()
    }

    /// Number of version slots (intact or corrupt)
    pub fn version_count(&self) -> usize {
        self.versions.len()
    }

    /// Change records not yet committed
    pub fn pending_changes(&self) -> &[ChangeRecord] {
        &self.pending
    }

    /// Id of the branch new commits land on
    pub fn active_branch_id(&self) -> &str {
        &self.active_branch_id
    }

    /// Whether there are edits since the last commit
    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    /// Time of the last commit (or of engine creation)
    pub fn last_saved(&self) -> DateTime<Utc> {
        self.last_saved
    }

    /// Whether any version exists
    pub fn has_content(&self) -> bool {
        !self.versions.is_empty()
    }

    /// Whether the editor is still on its first, never-committed content
    pub fn is_initial_editing(&self) -> bool {
        self.is_initial_editing
    }

    /// Result of the last validation pass
    pub fn storage_state(&self) -> StorageValidationState {
        self.storage_state
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Record one change from the editing surface
    ///
    /// The change is stamped with the cursor version and buffered until the
    /// next commit.
    pub fn record_change(&mut self, step: Value) {
        self.pending
            .push(ChangeRecord::new(self.current_version, step));
        self.is_dirty = true;
    }

    /// Override the dirty flag
    pub fn set_dirty(&mut self, is_dirty: bool) {
        self.is_dirty = is_dirty;
    }

    /// Commit `content` as a new version on the active branch
    ///
    /// The new version takes the next global number, records the cursor as
    /// its parent, absorbs the pending change records and becomes the tip
    /// of the active branch. Every call produces a new version, unless the
    /// number space is used up past [`MAX_VERSION`].
    pub fn commit(&mut self, content: Value) -> HistoryResult<VersionNumber> {
        let number = match self.latest_version() {
            None => INITIAL_VERSION,
            Some(latest) if latest < MAX_VERSION => latest + 1,
            Some(latest) => {
                warn!(target: "verso::history", latest, "No version numbers left");
                return Err(HistoryError::invalid_operation(format!(
                    "version numbers exhausted at {}",
                    latest
                )));
            }
        };
        let parent_version = if self.versions.is_empty() {
            None
        } else {
            Some(self.current_version)
        };
        let branch_id = self.resolve_commit_branch();
        let now = Utc::now();

        let version = Version {
            version: number,
            content,
            steps: std::mem::take(&mut self.pending)
                .iter()
                .map(ChangeRecord::to_value)
                .collect(),
            timestamp: now,
            branch_id: branch_id.clone(),
            parent_version,
        };
        self.versions.insert(number, Record::Intact(version));

        match self.branches.get_mut(&branch_id).and_then(Record::intact_mut) {
            Some(branch) => branch.advance_tip(number),
            None => {
                self.branches
                    .insert(branch_id.clone(), Record::Intact(Branch::main(number)));
            }
        }

        self.current_version = number;
        self.is_dirty = false;
        self.is_initial_editing = false;
        self.last_saved = now;

        debug!(
            target: "verso::history",
            version = number,
            parent = ?parent_version,
            branch = %branch_id,
            "Committed version"
        );
        Ok(number)
    }

    /// Branch a commit should land on
    ///
    /// The active branch if it resolves; otherwise main, which the caller
    /// creates if it does not exist either.
    fn resolve_commit_branch(&mut self) -> String {
        if self.branch(&self.active_branch_id).is_some() {
            return self.active_branch_id.clone();
        }
        warn!(
            target: "verso::history",
            active = %self.active_branch_id,
            "Active branch cannot be resolved, committing to main"
        );
        self.active_branch_id = MAIN_BRANCH_ID.to_string();
        self.active_branch_id.clone()
    }

    /// Drop all history and start over with an empty main branch
    pub fn reset(&mut self) {
        *self = HistoryEngine::new();
    }

    // =========================================================================
    // Version lookups
    // =========================================================================

    /// Find the slot for version `n` under the lookup rules
    fn lookup(&self, n: VersionNumber) -> HistoryResult<&Record<Version>> {
        let Some(latest) = self.latest_version() else {
            return Err(HistoryError::NoHistory);
        };
        check_version_number(n, latest)?;
        self.versions
            .get(&n)
            .ok_or(HistoryError::VersionNotFound { version: n })
    }

    /// Find intact version `n`
    pub fn version(&self, n: VersionNumber) -> HistoryResult<&Version> {
        self.lookup(n)?
            .intact()
            .ok_or(HistoryError::ContentCorrupted { version: n })
    }

    /// Content snapshot of version `n`
    pub fn get_version_content(&self, n: VersionNumber) -> HistoryResult<Value> {
        Ok(self.version(n)?.content.clone())
    }

    /// Versions `from..=to` in ascending order
    pub fn get_version_range(
        &self,
        from: VersionNumber,
        to: VersionNumber,
    ) -> HistoryResult<Vec<Version>> {
        self.lookup(from)?;
        self.lookup(to)?;
        if from > to {
            return Err(HistoryError::InvalidRange { from, to });
        }

        self.versions
            .range(from..=to)
            .map(|(n, record)| {
                record
                    .intact()
                    .cloned()
                    .ok_or(HistoryError::ContentCorrupted { version: *n })
            })
            .collect()
    }

    /// Move the cursor to version `n`
    ///
    /// Branch tips are untouched; the next commit simply records `n` as its
    /// parent.
    pub fn set_current_version(&mut self, n: VersionNumber) -> HistoryResult<()> {
        self.version(n)?;
        self.current_version = n;
        Ok(())
    }
}
