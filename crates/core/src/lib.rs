//! Core types for Verso
//!
//! This crate defines the foundational types shared by storage and engine:
//! - Version: immutable, globally numbered content snapshot
//! - Branch: named line of history forking from a parent branch
//! - ChangeRecord: one editing step recorded between versions
//! - BranchVersion: presentation view joining a version with a branch
//! - Record: a loaded slot that is either intact or corrupt
//! - HistoryError / ErrorCode: the error taxonomy
//! - validation: schema predicates over raw persisted JSON
//! - time: timestamp helpers

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod time;
pub mod types;
pub mod validation;

pub use error::{ErrorCode, HistoryError, HistoryResult};
pub use types::{
    Branch, BranchVersion, ChangeRecord, Record, StorageValidationState, Version, VersionNumber,
    INITIAL_VERSION, MAIN_BRANCH_ID, MAIN_BRANCH_NAME, MAX_VERSION, NO_VERSION,
};
pub use validation::{is_valid_branch, is_valid_version};
