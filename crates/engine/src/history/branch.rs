//! Branch operations: create, switch, and effective history
//!
//! A branch's *effective history* is its own versions up to its tip plus,
//! for every ancestor, the ancestor's versions up to the point where the
//! line below it forked off. Versions an ancestor gained after the fork are
//! not part of the child's history.
//!
//! ```text
//! main:      1 ── 2 ── 5
//!             \
//! Branch 1:    3 ── 4          effective history of Branch 1 = [1, 3, 4]
//! ```

use std::collections::{BTreeMap, BTreeSet};

use tracing::{info, warn};
use verso_core::validation::check_branch_id;
use verso_core::{
    Branch, BranchVersion, HistoryError, HistoryResult, Record, Version, VersionNumber,
    INITIAL_VERSION,
};

use super::HistoryEngine;

impl HistoryEngine {
    /// Look up an intact branch by id
    pub fn branch(&self, branch_id: &str) -> Option<&Branch> {
        self.branches.get(branch_id).and_then(Record::intact)
    }

    /// The branch new commits land on
    pub fn active_branch(&self) -> Option<&Branch> {
        self.branch(&self.active_branch_id)
    }

    /// All intact branches: main first, then by creation time
    pub fn all_branches(&self) -> Vec<&Branch> {
        let mut branches: Vec<&Branch> = self.branches.values().filter_map(Record::intact).collect();
        branches.sort_by(|a, b| {
            b.is_main
                .cmp(&a.is_main)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        branches
    }

    /// Fork a new branch off the active branch at `parent_version_id`
    ///
    /// The new branch becomes active and the cursor moves to the fork
    /// version, so the next commit lands on the new branch. Pending changes
    /// are discarded.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` if the version does not exist, the active branch
    /// cannot be resolved, or the version is not part of the active branch's
    /// effective history.
    pub fn create_branch(&mut self, parent_version_id: VersionNumber) -> HistoryResult<Branch> {
        if !matches!(self.versions.get(&parent_version_id), Some(Record::Intact(_))) {
            return Err(HistoryError::invalid_operation(format!(
                "Cannot branch from missing version {}",
                parent_version_id
            )));
        }
        let parent = self.active_branch().cloned().ok_or_else(|| {
            HistoryError::invalid_operation(format!(
                "Active branch {} cannot be resolved",
                self.active_branch_id
            ))
        })?;

        let lineage = self.get_branch_versions(&parent.id)?;
        if !lineage
            .iter()
            .any(|bv| bv.version.version == parent_version_id)
        {
            return Err(HistoryError::invalid_operation(format!(
                "Version {} is not part of branch {}",
                parent_version_id, parent.name
            )));
        }

        let ordinal = self
            .branches
            .values()
            .filter_map(Record::intact)
            .filter(|b| !b.is_main)
            .count()
            + 1;
        let branch = Branch::fork(
            uuid::Uuid::new_v4().to_string(),
            format!("Branch {}", ordinal),
            parent.id.clone(),
            parent_version_id,
        );

        self.branches
            .insert(branch.id.clone(), Record::Intact(branch.clone()));
        self.active_branch_id = branch.id.clone();
        self.current_version = parent_version_id;
        self.pending.clear();
        self.is_dirty = false;

        info!(
            target: "verso::history",
            branch = %branch.id,
            name = %branch.name,
            parent = %parent.id,
            fork_point = parent_version_id,
            "Created branch"
        );
        Ok(branch)
    }

    /// Make `branch_id` the active branch and move the cursor to its tip
    ///
    /// Uncommitted pending changes are discarded: a branch switch is a hard
    /// checkpoint.
    ///
    /// # Errors
    ///
    /// - `InvalidBranch` for a blank id
    /// - `BranchNotFound` if no intact branch has this id
    /// - `InvalidOperation` if the branch tip is not in the version map
    /// - `ContentCorrupted` if the tip slot is corrupt
    ///
    /// Nothing changes when an error is returned.
    pub fn switch_branch(&mut self, branch_id: &str) -> HistoryResult<()> {
        check_branch_id(branch_id)?;
        let branch = self
            .branch(branch_id)
            .ok_or_else(|| HistoryError::BranchNotFound {
                branch_id: branch_id.to_string(),
            })?;
        let tip = branch.current_version_id;
        match self.versions.get(&tip) {
            None => {
                return Err(HistoryError::invalid_operation(format!(
                    "Branch {} points at missing version {}",
                    branch_id, tip
                )))
            }
            Some(record) if !record.is_intact() => {
                return Err(HistoryError::ContentCorrupted { version: tip })
            }
            Some(_) => {}
        }

        if !self.pending.is_empty() {
            info!(
                target: "verso::history",
                from = %self.active_branch_id,
                to = %branch_id,
                discarded = self.pending.len(),
                "Discarding pending changes on branch switch"
            );
        }

        self.active_branch_id = branch_id.to_string();
        self.current_version = tip;
        self.pending.clear();
        self.is_dirty = false;
        Ok(())
    }

    /// Effective history of `branch_id`, in commit order
    ///
    /// Walks the parent chain. Each ancestor contributes only versions at or
    /// below the smallest fork point seen on the way up, so history an
    /// ancestor gained after the fork never leaks into the child. `is_head`
    /// marks the version the branch tip points at.
    ///
    /// # Errors
    ///
    /// - `InvalidBranch` / `BranchNotFound` as for [`Self::switch_branch`]
    /// - `InvalidOperation` if the parent chain loops
    pub fn get_branch_versions(&self, branch_id: &str) -> HistoryResult<Vec<BranchVersion>> {
        check_branch_id(branch_id)?;
        let target = self
            .branch(branch_id)
            .ok_or_else(|| HistoryError::BranchNotFound {
                branch_id: branch_id.to_string(),
            })?;

        let mut collected: BTreeMap<VersionNumber, &Version> = BTreeMap::new();
        let mut visited: BTreeSet<&str> = BTreeSet::new();
        let mut current = target;
        let mut bound = target.current_version_id;

        loop {
            if !visited.insert(current.id.as_str()) {
                return Err(HistoryError::invalid_operation(format!(
                    "Ancestry of branch {} contains a cycle at {}",
                    branch_id, current.id
                )));
            }

            for (n, record) in self.versions.range(..=bound) {
                if let Record::Intact(version) = record {
                    if version.branch_id == current.id {
                        collected.entry(*n).or_insert(version);
                    }
                }
            }

            let (Some(parent_id), Some(fork_point)) =
                (current.parent_branch_id.as_deref(), current.fork_point())
            else {
                break;
            };
            bound = bound.min(fork_point);
            current = match self.branch(parent_id) {
                Some(parent) => parent,
                None => {
                    warn!(
                        target: "verso::history",
                        branch = %current.id,
                        parent = %parent_id,
                        "Parent branch missing, history truncated"
                    );
                    break;
                }
            };
        }

        Ok(collected
            .into_values()
            .map(|version| BranchVersion {
                is_head: version.version == target.current_version_id,
                version: version.clone(),
                branch: target.clone(),
            })
            .collect())
    }

    /// Lowest and highest version number in a branch's effective history
    ///
    /// Used to bound navigation; an empty history yields
    /// `(INITIAL_VERSION, INITIAL_VERSION)`.
    pub fn branch_version_range(
        &self,
        branch_id: &str,
    ) -> HistoryResult<(VersionNumber, VersionNumber)> {
        let versions = self.get_branch_versions(branch_id)?;
        let min = versions.first().map_or(INITIAL_VERSION, |bv| bv.version.version);
        let max = versions.last().map_or(INITIAL_VERSION, |bv| bv.version.version);
        Ok((min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use verso_core::{ErrorCode, MAIN_BRANCH_ID};

    fn doc(text: &str) -> Value {
        json!({"type": "doc", "text": text})
    }

    fn numbers(versions: &[BranchVersion]) -> Vec<VersionNumber> {
        versions.iter().map(|bv| bv.version.version).collect()
    }

    #[test]
    fn test_create_branch_forks_at_version() {
        let mut engine = HistoryEngine::new();
        engine.commit(doc("A")).unwrap();
        engine.commit(doc("B")).unwrap();

        let branch = engine.create_branch(1).unwrap();
        assert!(!branch.is_main);
        assert_eq!(branch.name, "Branch 1");
        assert_eq!(branch.fork_point(), Some(1));
        assert_eq!(branch.current_version_id, 1);
        assert_eq!(branch.parent_branch_id.as_deref(), Some(MAIN_BRANCH_ID));

        assert_eq!(engine.active_branch_id(), branch.id);
        assert_eq!(engine.current_version(), 1);
    }

    #[test]
    fn test_create_branch_names_are_positional() {
        let mut engine = HistoryEngine::new();
        engine.commit(doc("A")).unwrap();
        let first = engine.create_branch(1).unwrap();
        let second = engine.create_branch(1).unwrap();
        assert_eq!(first.name, "Branch 1");
        assert_eq!(second.name, "Branch 2");
        assert_eq!(second.parent_branch_id.as_deref(), Some(first.id.as_str()));
    }

    #[test]
    fn test_create_branch_clears_pending() {
        let mut engine = HistoryEngine::new();
        engine.commit(doc("A")).unwrap();
        engine.record_change(json!({"stepType": "replace"}));

        engine.create_branch(1).unwrap();
        assert!(engine.pending_changes().is_empty());
        assert!(!engine.is_dirty());
    }

    #[test]
    fn test_create_branch_missing_version() {
        let mut engine = HistoryEngine::new();
        engine.commit(doc("A")).unwrap();
        let err = engine.create_branch(7).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidOperation);
    }

    #[test]
    fn test_create_branch_outside_lineage() {
        let mut engine = HistoryEngine::new();
        engine.commit(doc("A")).unwrap();
        engine.commit(doc("B")).unwrap();
        engine.create_branch(1).unwrap();
        engine.commit(doc("C")).unwrap();

        // Version 2 is main's post-fork history, not this branch's
        let err = engine.create_branch(2).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidOperation);
    }

    #[test]
    fn test_commit_after_create_lands_on_new_branch() {
        let mut engine = HistoryEngine::new();
        engine.commit(doc("A")).unwrap();
        engine.commit(doc("B")).unwrap();
        let branch = engine.create_branch(1).unwrap();

        let n = engine.commit(doc("C")).unwrap();
        assert_eq!(n, 3);
        let version = engine.version(n).unwrap();
        assert_eq!(version.branch_id, branch.id);
        assert_eq!(version.parent_version, Some(1));
        assert_eq!(engine.branch(&branch.id).unwrap().current_version_id, 3);
        assert_eq!(engine.branch(MAIN_BRANCH_ID).unwrap().current_version_id, 2);
    }

    #[test]
    fn test_switch_branch() {
        let mut engine = HistoryEngine::new();
        engine.commit(doc("A")).unwrap();
        engine.commit(doc("B")).unwrap();
        let branch = engine.create_branch(1).unwrap();
        engine.commit(doc("C")).unwrap();
        engine.record_change(json!({"stepType": "replace"}));

        engine.switch_branch(MAIN_BRANCH_ID).unwrap();
        assert_eq!(engine.active_branch_id(), MAIN_BRANCH_ID);
        assert_eq!(engine.current_version(), 2);
        assert!(engine.pending_changes().is_empty());

        engine.switch_branch(&branch.id).unwrap();
        assert_eq!(engine.current_version(), 3);
    }

    #[test]
    fn test_switch_branch_errors() {
        let mut engine = HistoryEngine::new();
        engine.commit(doc("A")).unwrap();

        assert_eq!(
            engine.switch_branch("").unwrap_err().code(),
            ErrorCode::InvalidBranch
        );
        assert_eq!(
            engine.switch_branch("nope").unwrap_err().code(),
            ErrorCode::BranchNotFound
        );

        let mut dangling = Branch::fork("dangling", "Branch 1", MAIN_BRANCH_ID, 1);
        dangling.advance_tip(40);
        engine
            .branches
            .insert("dangling".to_string(), Record::Intact(dangling));
        assert_eq!(
            engine.switch_branch("dangling").unwrap_err().code(),
            ErrorCode::InvalidOperation
        );
        assert_eq!(engine.active_branch_id(), MAIN_BRANCH_ID);
    }

    #[test]
    fn test_switch_branch_corrupt_tip_changes_nothing() {
        let mut engine = HistoryEngine::new();
        engine.commit(doc("A")).unwrap();
        let branch = engine.create_branch(1).unwrap();
        engine.commit(doc("B")).unwrap();
        engine.switch_branch(MAIN_BRANCH_ID).unwrap();
        engine.versions.insert(2, Record::Corrupt(json!({"steps": 1})));
        engine.record_change(json!({"stepType": "replace"}));

        assert_eq!(
            engine.switch_branch(&branch.id),
            Err(HistoryError::ContentCorrupted { version: 2 })
        );
        assert_eq!(engine.active_branch_id(), MAIN_BRANCH_ID);
        assert_eq!(engine.current_version(), 1);
        assert_eq!(engine.pending_changes().len(), 1);
        assert!(engine.is_dirty());
    }

    #[test]
    fn test_branch_versions_bounded_at_fork() {
        let mut engine = HistoryEngine::new();
        engine.commit(doc("A")).unwrap();
        engine.commit(doc("B")).unwrap();
        let branch = engine.create_branch(1).unwrap();
        engine.commit(doc("C")).unwrap();
        engine.commit(doc("D")).unwrap();

        let versions = engine.get_branch_versions(&branch.id).unwrap();
        assert_eq!(numbers(&versions), vec![1, 3, 4]);
        assert!(versions.iter().all(|bv| bv.branch.id == branch.id));
        let heads: Vec<_> = versions.iter().filter(|bv| bv.is_head).collect();
        assert_eq!(heads.len(), 1);
        assert_eq!(heads[0].version.version, 4);

        let main = engine.get_branch_versions(MAIN_BRANCH_ID).unwrap();
        assert_eq!(numbers(&main), vec![1, 2]);
    }

    #[test]
    fn test_branch_versions_nested_forks() {
        let mut engine = HistoryEngine::new();
        engine.commit(doc("1")).unwrap();
        engine.commit(doc("2")).unwrap();
        let b1 = engine.create_branch(2).unwrap();
        engine.commit(doc("3")).unwrap();
        engine.commit(doc("4")).unwrap();
        let b2 = engine.create_branch(3).unwrap();
        engine.commit(doc("5")).unwrap();
        engine.switch_branch(MAIN_BRANCH_ID).unwrap();
        engine.commit(doc("6")).unwrap();

        assert_eq!(numbers(&engine.get_branch_versions(&b2.id).unwrap()), vec![1, 2, 3, 5]);
        assert_eq!(numbers(&engine.get_branch_versions(&b1.id).unwrap()), vec![1, 2, 3, 4]);
        assert_eq!(numbers(&engine.get_branch_versions(MAIN_BRANCH_ID).unwrap()), vec![1, 2, 6]);
    }

    #[test]
    fn test_branch_versions_fresh_fork_has_only_inherited_history() {
        let mut engine = HistoryEngine::new();
        engine.commit(doc("A")).unwrap();
        engine.commit(doc("B")).unwrap();
        let branch = engine.create_branch(2).unwrap();

        let versions = engine.get_branch_versions(&branch.id).unwrap();
        assert_eq!(numbers(&versions), vec![1, 2]);
        assert!(versions[1].is_head);
        assert_eq!(engine.branch_version_range(&branch.id).unwrap(), (1, 2));
    }

    #[test]
    fn test_branch_versions_cycle_detected() {
        let mut engine = HistoryEngine::new();
        engine.commit(doc("A")).unwrap();
        let mut a = Branch::fork("a", "Branch 1", "b", 1);
        a.advance_tip(1);
        let b = Branch::fork("b", "Branch 2", "a", 1);
        engine.branches.insert("a".to_string(), Record::Intact(a));
        engine.branches.insert("b".to_string(), Record::Intact(b));

        let err = engine.get_branch_versions("a").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidOperation);
    }

    #[test]
    fn test_branch_version_range_empty() {
        let engine = HistoryEngine::new();
        assert_eq!(
            engine.branch_version_range(MAIN_BRANCH_ID).unwrap(),
            (INITIAL_VERSION, INITIAL_VERSION)
        );
    }

    #[test]
    fn test_all_branches_main_first() {
        let mut engine = HistoryEngine::new();
        engine.commit(doc("A")).unwrap();
        let first = engine.create_branch(1).unwrap();
        let second = engine.create_branch(1).unwrap();

        let ids: Vec<_> = engine.all_branches().iter().map(|b| b.id.clone()).collect();
        assert_eq!(ids[0], MAIN_BRANCH_ID);
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&first.id));
        assert!(ids.contains(&second.id));
    }
}
