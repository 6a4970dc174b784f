//! History data model
//!
//! This module defines the records that make up a document's history:
//!
//! - [`Version`]: an immutable snapshot, numbered globally across branches
//! - [`Branch`]: a named line of versions with a fork point and a tip
//! - [`ChangeRecord`]: one editing step recorded between two versions
//! - [`BranchVersion`]: a version presented under a branch (not persisted)
//! - [`Record`]: a loaded slot that is either intact or corrupt
//!
//! ## Persisted field names
//!
//! Records serialize with camelCase keys. Branch version pointers
//! (`parentVersionId`, `currentVersionId`) are persisted as decimal strings,
//! which is also what the schema validator checks for.
//!
//! ## Lenient decoding
//!
//! Whether a slot is corrupt is decided by the schema validator alone. Any
//! record the validator accepts decodes: timestamps that are not RFC 3339
//! are parsed best-effort, steps are kept as raw JSON, and version pointers
//! that are not numbers read as [`NO_VERSION`].

use crate::validation::{is_valid_branch, is_valid_version};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version numbers are positive and globally monotonic
pub type VersionNumber = u64;

/// Number of the first version ever committed
pub const INITIAL_VERSION: VersionNumber = 1;

/// Highest version number the engine allocates or loads
///
/// Matches the largest integer a JSON reader using doubles round-trips.
pub const MAX_VERSION: VersionNumber = (1 << 53) - 1;

/// Pointer value for "no such version" (below [`INITIAL_VERSION`])
pub const NO_VERSION: VersionNumber = 0;

/// Identifier of the root branch
pub const MAIN_BRANCH_ID: &str = "main";

/// Display name of the root branch
pub const MAIN_BRANCH_NAME: &str = "Main";

// =============================================================================
// ChangeRecord
// =============================================================================

/// One editing step produced by the editing surface
///
/// The step payload is opaque to the engine; it is stored and replayed
/// verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    /// Unique id of this change
    pub id: String,
    /// Cursor version when the change was recorded
    pub version: VersionNumber,
    /// When the change was recorded
    pub timestamp: DateTime<Utc>,
    /// Opaque change payload
    pub step: Value,
}

impl ChangeRecord {
    /// Stamp a new change against the given cursor version
    pub fn new(version: VersionNumber, step: Value) -> Self {
        ChangeRecord {
            id: uuid::Uuid::new_v4().to_string(),
            version,
            timestamp: Utc::now(),
            step,
        }
    }

    /// Persisted form, as stored in a version's `steps`
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "version": self.version,
            "timestamp": self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            "step": self.step,
        })
    }
}

// =============================================================================
// Version
// =============================================================================

/// Immutable snapshot of document content
///
/// The version number is the key of the persisted entry, not a field of the
/// record, so it is skipped by serde and filled in on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    /// Global sequence number
    #[serde(skip)]
    pub version: VersionNumber,
    /// Document content snapshot
    pub content: Value,
    /// Changes that produced this version since its parent, as stored
    pub steps: Vec<Value>,
    /// Creation time
    #[serde(with = "lenient_time")]
    pub timestamp: DateTime<Utc>,
    /// Branch this version was committed on
    pub branch_id: String,
    /// Version current on the branch at commit time (None for the first)
    #[serde(default, deserialize_with = "version_id_opt::deserialize")]
    pub parent_version: Option<VersionNumber>,
}

// =============================================================================
// Branch
// =============================================================================

/// A named line of history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    /// Unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Branch this one forked from (None for main)
    #[serde(default, deserialize_with = "lenient_string_opt")]
    pub parent_branch_id: Option<String>,
    /// Fork point (None for main)
    #[serde(default, with = "version_id_opt")]
    pub parent_version_id: Option<VersionNumber>,
    /// Tip of this branch
    #[serde(with = "version_id")]
    pub current_version_id: VersionNumber,
    /// Creation time
    #[serde(with = "lenient_time")]
    pub created_at: DateTime<Utc>,
    /// Exactly one branch is main
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_main: bool,
}

impl Branch {
    /// Create the root branch with its tip at `tip`
    pub fn main(tip: VersionNumber) -> Self {
        Branch {
            id: MAIN_BRANCH_ID.to_string(),
            name: MAIN_BRANCH_NAME.to_string(),
            parent_branch_id: None,
            parent_version_id: None,
            current_version_id: tip,
            created_at: Utc::now(),
            is_main: true,
        }
    }

    /// Create a branch forking from `parent_branch_id` at `fork_point`
    ///
    /// Fork point and tip start out equal.
    pub fn fork(
        id: impl Into<String>,
        name: impl Into<String>,
        parent_branch_id: impl Into<String>,
        fork_point: VersionNumber,
    ) -> Self {
        Branch {
            id: id.into(),
            name: name.into(),
            parent_branch_id: Some(parent_branch_id.into()),
            parent_version_id: Some(fork_point),
            current_version_id: fork_point,
            created_at: Utc::now(),
            is_main: false,
        }
    }

    /// Fork point, if this branch has a parent
    pub fn fork_point(&self) -> Option<VersionNumber> {
        self.parent_version_id
    }

    /// Move the tip to a newly committed version
    pub fn advance_tip(&mut self, version: VersionNumber) {
        self.current_version_id = version;
    }
}

// =============================================================================
// Views
// =============================================================================

/// A version presented under a branch
///
/// Used only for history traversal and presentation; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchVersion {
    /// The version
    pub version: Version,
    /// The branch it is being presented under
    pub branch: Branch,
    /// Whether this version is the branch tip
    pub is_head: bool,
}

/// Outcome of the last storage validation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageValidationState {
    /// Whether every version and branch record passed validation
    pub is_storage_valid: bool,
    /// Highest version number that passed before the first failure
    pub last_valid_version: VersionNumber,
}

impl Default for StorageValidationState {
    fn default() -> Self {
        StorageValidationState {
            is_storage_valid: true,
            last_valid_version: 0,
        }
    }
}

// =============================================================================
// Record
// =============================================================================

/// A loaded slot: either a decoded record or the raw JSON that failed
/// validation
///
/// Corrupt slots stay in the maps so that validation can find them and
/// recovery can discard them; until then they are persisted verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum Record<T> {
    /// Passed the schema validator and decoded cleanly
    Intact(T),
    /// Raw JSON that did not
    Corrupt(Value),
}

impl<T> Record<T> {
    /// Borrow the decoded record, if intact
    pub fn intact(&self) -> Option<&T> {
        match self {
            Record::Intact(value) => Some(value),
            Record::Corrupt(_) => None,
        }
    }

    /// Mutably borrow the decoded record, if intact
    pub fn intact_mut(&mut self) -> Option<&mut T> {
        match self {
            Record::Intact(value) => Some(value),
            Record::Corrupt(_) => None,
        }
    }

    /// Take the decoded record, if intact
    pub fn into_intact(self) -> Option<T> {
        match self {
            Record::Intact(value) => Some(value),
            Record::Corrupt(_) => None,
        }
    }

    /// Check if the slot is intact
    pub fn is_intact(&self) -> bool {
        matches!(self, Record::Intact(_))
    }
}

impl<T: Serialize> Record<T> {
    /// Encode back to persisted JSON (corrupt slots pass through unchanged)
    pub fn encode(&self) -> serde_json::Result<Value> {
        match self {
            Record::Intact(value) => serde_json::to_value(value),
            Record::Corrupt(raw) => Ok(raw.clone()),
        }
    }
}

impl Record<Version> {
    /// Decode a persisted version entry
    pub fn decode(number: VersionNumber, raw: Value) -> Self {
        if !is_valid_version(&raw) {
            return Record::Corrupt(raw);
        }
        match serde_json::from_value::<Version>(raw.clone()) {
            Ok(mut version) => {
                version.version = number;
                Record::Intact(version)
            }
            Err(_) => Record::Corrupt(raw),
        }
    }
}

impl Record<Branch> {
    /// Decode a persisted branch entry
    pub fn decode(raw: Value) -> Self {
        if !is_valid_branch(&raw) {
            return Record::Corrupt(raw);
        }
        match serde_json::from_value::<Branch>(raw.clone()) {
            Ok(branch) => Record::Intact(branch),
            Err(_) => Record::Corrupt(raw),
        }
    }
}

// =============================================================================
// Serde helpers: lenient decoding of validator-accepted records
// =============================================================================

/// Read a version pointer from a decimal string or a JSON number
fn parse_version_id(raw: &Value) -> Option<VersionNumber> {
    match raw {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

/// Version ids persisted as decimal strings; unreadable ids become `NO_VERSION`
mod version_id {
    use super::{parse_version_id, VersionNumber, NO_VERSION};
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(value: &VersionNumber, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<VersionNumber, D::Error> {
        let raw = Value::deserialize(d)?;
        Ok(parse_version_id(&raw).unwrap_or(NO_VERSION))
    }
}

/// Optional version ids; anything unreadable is `None`
mod version_id_opt {
    use super::{parse_version_id, VersionNumber};
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(
        value: &Option<VersionNumber>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => s.serialize_some(&v.to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<VersionNumber>, D::Error> {
        let raw = Value::deserialize(d)?;
        Ok(parse_version_id(&raw))
    }
}

/// Timestamps written as RFC 3339, read best-effort
///
/// Falls back to a few common naive layouts (taken as UTC), then to the
/// Unix epoch.
mod lenient_time {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    const NAIVE_LAYOUTS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = Value::deserialize(d)?;
        Ok(raw.as_str().and_then(parse).unwrap_or(DateTime::<Utc>::UNIX_EPOCH))
    }

    fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
            return Some(t.with_timezone(&Utc));
        }
        if let Some(t) = NAIVE_LAYOUTS
            .iter()
            .find_map(|layout| NaiveDateTime::parse_from_str(raw, layout).ok())
        {
            return Some(t.and_utc());
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|t| t.and_utc())
    }
}

fn lenient_string_opt<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let raw = Value::deserialize(d)?;
    Ok(raw.as_str().map(str::to_string))
}

fn lenient_bool<'de, D: serde::Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    let raw = Value::deserialize(d)?;
    Ok(raw.as_bool().unwrap_or(false))
}
