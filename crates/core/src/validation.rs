//! Schema validation for persisted records
//!
//! Pure predicates over raw JSON. They decide whether a loaded version or
//! branch entry is well-formed enough to decode; they never interpret the
//! document content itself.
//!
//! All functions are total: any JSON value (including non-objects, missing
//! fields, extra fields) yields an answer, never a panic.

use crate::error::{HistoryError, HistoryResult};
use crate::types::{VersionNumber, INITIAL_VERSION};
use serde_json::Value;

/// Fields of a version record that must be JSON strings
pub const VERSION_REQUIRED_STRINGS: [&str; 2] = ["timestamp", "branchId"];

/// Fields of a branch record that must be JSON strings
pub const BRANCH_REQUIRED_STRINGS: [&str; 4] = ["id", "name", "currentVersionId", "createdAt"];

fn has_string_fields(raw: &Value, fields: &[&str]) -> bool {
    fields
        .iter()
        .all(|field| raw.get(field).map_or(false, Value::is_string))
}

/// Check that a raw version record is well-formed
///
/// Requires string `timestamp` and `branchId`, an array `steps`, and a
/// `content` key. A `null` content is present; a missing key is not.
pub fn is_valid_version(raw: &Value) -> bool {
    let Some(obj) = raw.as_object() else {
        return false;
    };
    has_string_fields(raw, &VERSION_REQUIRED_STRINGS)
        && obj.get("steps").map_or(false, Value::is_array)
        && obj.contains_key("content")
}

/// Check that a raw branch record is well-formed
pub fn is_valid_branch(raw: &Value) -> bool {
    raw.is_object() && has_string_fields(raw, &BRANCH_REQUIRED_STRINGS)
}

/// Check a requested version number against the highest known version
///
/// Numbers below [`INITIAL_VERSION`] are malformed; numbers above `max`
/// are well-formed but absent.
pub fn check_version_number(version: VersionNumber, max: VersionNumber) -> HistoryResult<()> {
    if version < INITIAL_VERSION {
        return Err(HistoryError::InvalidVersion { version });
    }
    if version > max {
        return Err(HistoryError::VersionNotFound { version });
    }
    Ok(())
}

/// Check that a branch id is usable as a lookup key
pub fn check_branch_id(branch_id: &str) -> HistoryResult<()> {
    if branch_id.trim().is_empty() {
        return Err(HistoryError::InvalidBranch {
            branch_id: branch_id.to_string(),
        });
    }
    Ok(())
}
