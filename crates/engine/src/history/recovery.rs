//! Storage validation and corruption recovery
//!
//! Validation walks the version map in number order and stops at the first
//! corrupt slot; everything below it is the recoverable prefix. Recovery
//! truncates history to that prefix and rebuilds a consistent branch set
//! around it:
//!
//! - intact branches owning a kept version, or whose tip is kept, survive
//!   with their tips clamped into the prefix
//! - kept versions whose branch record was lost get a synthesized branch
//! - branches whose parent was dropped are reattached to the nearest
//!   surviving ancestor, or to main if none survives
//!
//! If nothing survives the document is reset to an empty main branch.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{error, info, warn};
use verso_core::{
    Branch, HistoryError, HistoryResult, Record, StorageValidationState, Version, VersionNumber,
    INITIAL_VERSION, MAIN_BRANCH_ID,
};

use super::HistoryEngine;

impl HistoryEngine {
    /// Scan all records and store the resulting validation state
    pub fn validate_storage(&mut self) -> StorageValidationState {
        let mut state = StorageValidationState::default();

        for (n, record) in &self.versions {
            if !record.is_intact() {
                warn!(
                    target: "verso::recovery",
                    version = n,
                    last_valid = state.last_valid_version,
                    "Corrupt version record"
                );
                state.is_storage_valid = false;
                break;
            }
            state.last_valid_version = *n;
        }

        if state.is_storage_valid {
            if let Some(id) = self
                .branches
                .iter()
                .find(|(_, record)| !record.is_intact())
                .map(|(id, _)| id)
            {
                warn!(target: "verso::recovery", branch = %id, "Corrupt branch record");
                state.is_storage_valid = false;
            }
        }

        self.storage_state = state;
        state
    }

    /// Truncate history to the last valid version and repair branches
    ///
    /// Succeeds without changes when storage is valid, so a second call
    /// after a recovery is a no-op.
    ///
    /// # Errors
    ///
    /// - `StorageRecovered` when a valid prefix was kept
    /// - `StorageCorrupted { content_reset: true }` when nothing survived
    ///   and the history was reset
    pub fn recover_from_corruption(&mut self) -> HistoryResult<()> {
        if self.storage_state.is_storage_valid {
            return Ok(());
        }
        let limit = self.storage_state.last_valid_version;

        let kept: BTreeMap<VersionNumber, Version> = std::mem::take(&mut self.versions)
            .into_iter()
            .filter(|(n, _)| *n <= limit)
            .filter_map(|(n, record)| record.into_intact().map(|v| (n, v)))
            .collect();

        if kept.is_empty() {
            error!(
                target: "verso::recovery",
                "No valid versions survived, resetting history"
            );
            self.reset();
            return Err(HistoryError::StorageCorrupted {
                content_reset: true,
            });
        }

        let branches_before = self.branches.len();
        self.branches = rebuild_branches(std::mem::take(&mut self.branches), &kept);
        self.versions = kept
            .into_iter()
            .map(|(n, v)| (n, Record::Intact(v)))
            .collect();
        self.ensure_main_branch();

        if self.active_branch().is_none() {
            self.active_branch_id = MAIN_BRANCH_ID.to_string();
        }
        if !self.versions.contains_key(&self.current_version) {
            self.current_version = self
                .active_branch()
                .map(|b| b.current_version_id)
                .filter(|tip| self.versions.contains_key(tip))
                .unwrap_or(limit);
        }
        self.pending.clear();
        self.is_dirty = false;
        self.is_initial_editing = false;
        self.storage_state = StorageValidationState {
            is_storage_valid: true,
            last_valid_version: limit,
        };

        warn!(
            target: "verso::recovery",
            recovered_to = limit,
            versions = self.versions.len(),
            branches = self.branches.len(),
            branches_before,
            active = %self.active_branch_id,
            "Recovered history from corrupted storage"
        );
        Err(HistoryError::StorageRecovered { version: limit })
    }

    /// Insert a main branch if none is present
    ///
    /// The synthesized main points at its highest own version, falling back
    /// to the lowest version overall, then to the initial version. An
    /// existing main record (even a corrupt one) is left alone.
    pub(crate) fn ensure_main_branch(&mut self) {
        if self.branches.contains_key(MAIN_BRANCH_ID) {
            return;
        }
        let tip = self
            .versions
            .iter()
            .filter_map(|(n, record)| record.intact().map(|v| (n, v)))
            .filter(|(_, v)| v.branch_id == MAIN_BRANCH_ID)
            .map(|(n, _)| *n)
            .next_back()
            .or_else(|| self.versions.keys().next().copied())
            .unwrap_or(INITIAL_VERSION);

        info!(target: "verso::history", tip, "Synthesized main branch");
        self.branches.insert(
            MAIN_BRANCH_ID.to_string(),
            Record::Intact(Branch::main(tip)),
        );
    }
}

/// Build the surviving branch set for the kept versions
fn rebuild_branches(
    old: BTreeMap<String, Record<Branch>>,
    kept: &BTreeMap<VersionNumber, Version>,
) -> BTreeMap<String, Record<Branch>> {
    let mut own_max: BTreeMap<&str, VersionNumber> = BTreeMap::new();
    for (n, version) in kept {
        own_max.insert(version.branch_id.as_str(), *n);
    }

    // Parent links as they were before anything was dropped
    let parent_of: BTreeMap<String, String> = old
        .iter()
        .filter_map(|(id, record)| {
            let parent = record.intact()?.parent_branch_id.clone()?;
            Some((id.clone(), parent))
        })
        .collect();

    let mut branches: BTreeMap<String, Branch> = BTreeMap::new();
    for (id, record) in old {
        let Some(mut branch) = record.into_intact() else {
            continue;
        };
        if !kept.contains_key(&branch.current_version_id) {
            match own_max.get(id.as_str()) {
                Some(max) => branch.current_version_id = *max,
                None => {
                    info!(target: "verso::recovery", branch = %id, "Dropping branch");
                    continue;
                }
            }
        }
        branches.insert(id, branch);
    }

    // Versions whose branch record was lost
    let mut recovered = 0;
    for (id, max) in &own_max {
        if branches.contains_key(*id) {
            continue;
        }
        let branch = if *id == MAIN_BRANCH_ID {
            Branch::main(*max)
        } else {
            recovered += 1;
            let first = kept.values().find(|v| v.branch_id == *id);
            let fork_point = first
                .and_then(|v| v.parent_version)
                .or(first.map(|v| v.version))
                .unwrap_or(*max);
            let mut branch = Branch::fork(
                *id,
                format!("Recovered {}", recovered),
                MAIN_BRANCH_ID,
                fork_point,
            );
            branch.advance_tip(*max);
            branch
        };
        info!(target: "verso::recovery", branch = %id, tip = max, "Synthesized branch");
        branches.insert(id.to_string(), branch);
    }

    // Orphans hang off their nearest surviving ancestor
    let ids: Vec<String> = branches.keys().cloned().collect();
    for id in ids {
        let Some(parent) = branches[&id].parent_branch_id.clone() else {
            continue;
        };
        if branches.contains_key(&parent) {
            continue;
        }
        let adopter = surviving_ancestor(&parent, &parent_of, &branches);
        if let Some(branch) = branches.get_mut(&id) {
            info!(
                target: "verso::recovery",
                branch = %id,
                lost_parent = %parent,
                new_parent = %adopter,
                "Reattaching orphan"
            );
            branch.parent_branch_id = Some(adopter);
        }
    }

    branches
        .into_iter()
        .map(|(id, branch)| (id, Record::Intact(branch)))
        .collect()
}

/// First ancestor of `dropped` that is still in `branches`, else main
fn surviving_ancestor(
    dropped: &str,
    parent_of: &BTreeMap<String, String>,
    branches: &BTreeMap<String, Branch>,
) -> String {
    let mut seen = BTreeSet::new();
    let mut cursor = dropped;
    while seen.insert(cursor) {
        match parent_of.get(cursor) {
            Some(parent) if branches.contains_key(parent) => return parent.clone(),
            Some(parent) => cursor = parent,
            None => break,
        }
    }
    MAIN_BRANCH_ID.to_string()
}
