//! Error types for Verso
//!
//! Every fallible history operation returns a [`HistoryResult`]. Expected
//! conditions (bad version numbers, unknown branches, corrupt records) are
//! values, never panics. We use `thiserror` for automatic `Display` and
//! `Error` trait implementations.
//!
//! Each variant maps onto a stable [`ErrorCode`] that callers can match on
//! or hand to a UI layer without parsing messages.

use crate::types::VersionNumber;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for history operations
pub type HistoryResult<T> = std::result::Result<T, HistoryError>;

/// Stable error codes
///
/// Serialized in `SCREAMING_SNAKE_CASE` so the wire names match the codes
/// reported to the editing surface (`"INVALID_VERSION"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Out-of-range or malformed version number
    InvalidVersion,
    /// Well-formed version number with no record behind it
    VersionNotFound,
    /// Record present but failed schema validation
    ContentCorrupted,
    /// Well-formed branch id with no (intact) record behind it
    BranchNotFound,
    /// Malformed branch id
    InvalidBranch,
    /// Structurally inconsistent request
    InvalidOperation,
    /// Persisted blob unreadable or failed post-load validation
    StorageError,
}

impl ErrorCode {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidVersion => "INVALID_VERSION",
            ErrorCode::VersionNotFound => "VERSION_NOT_FOUND",
            ErrorCode::ContentCorrupted => "CONTENT_CORRUPTED",
            ErrorCode::BranchNotFound => "BRANCH_NOT_FOUND",
            ErrorCode::InvalidBranch => "INVALID_BRANCH",
            ErrorCode::InvalidOperation => "INVALID_OPERATION",
            ErrorCode::StorageError => "STORAGE_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error types for the history engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HistoryError {
    /// Version number below the initial version
    #[error("Invalid version number: {version}")]
    InvalidVersion {
        /// The rejected version number
        version: VersionNumber,
    },

    /// Range request with `from > to`
    #[error("Start version cannot be greater than end version ({from} > {to})")]
    InvalidRange {
        /// Requested lower bound
        from: VersionNumber,
        /// Requested upper bound
        to: VersionNumber,
    },

    /// No version with this number exists
    #[error("Version {version} not found")]
    VersionNotFound {
        /// The missing version number
        version: VersionNumber,
    },

    /// Nothing has ever been committed in this session
    #[error("No content has been committed yet")]
    NoHistory,

    /// The stored record failed schema validation
    #[error("Version {version} content is corrupted")]
    ContentCorrupted {
        /// The corrupt version number
        version: VersionNumber,
    },

    /// No intact branch with this id exists
    #[error("Branch {branch_id} not found")]
    BranchNotFound {
        /// The missing branch id
        branch_id: String,
    },

    /// The branch id itself is malformed
    #[error("Branch {branch_id:?} is invalid")]
    InvalidBranch {
        /// The rejected branch id
        branch_id: String,
    },

    /// Structurally inconsistent request or state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Recovery truncated history but kept a valid prefix
    #[error("Storage recovered up to version {version}")]
    StorageRecovered {
        /// Highest version kept
        version: VersionNumber,
    },

    /// Recovery found nothing worth keeping
    #[error("Storage is corrupted and cannot be recovered")]
    StorageCorrupted {
        /// Whether the document content was reset to empty
        content_reset: bool,
    },

    /// Persisted blob could not be read, parsed, or written
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration file missing, unreadable, or rejected
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl HistoryError {
    /// Create an invalid-operation error
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        HistoryError::InvalidOperation(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        HistoryError::Storage(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        HistoryError::Config(msg.into())
    }

    /// The stable code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            HistoryError::InvalidVersion { .. } | HistoryError::InvalidRange { .. } => {
                ErrorCode::InvalidVersion
            }
            HistoryError::VersionNotFound { .. } | HistoryError::NoHistory => {
                ErrorCode::VersionNotFound
            }
            HistoryError::ContentCorrupted { .. } => ErrorCode::ContentCorrupted,
            HistoryError::BranchNotFound { .. } => ErrorCode::BranchNotFound,
            HistoryError::InvalidBranch { .. } => ErrorCode::InvalidBranch,
            HistoryError::InvalidOperation(_) | HistoryError::Config(_) => {
                ErrorCode::InvalidOperation
            }
            HistoryError::StorageRecovered { .. }
            | HistoryError::StorageCorrupted { .. }
            | HistoryError::Storage(_) => ErrorCode::StorageError,
        }
    }

    /// True when the error means all persisted content was lost
    pub fn is_fatal(&self) -> bool {
        matches!(self, HistoryError::StorageCorrupted { .. })
    }

    /// True when the editing surface must clear its content
    pub fn content_reset(&self) -> bool {
        matches!(
            self,
            HistoryError::StorageCorrupted {
                content_reset: true
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_version() {
        let err = HistoryError::InvalidVersion { version: 0 };
        assert_eq!(err.to_string(), "Invalid version number: 0");
        assert_eq!(err.code(), ErrorCode::InvalidVersion);
    }

    #[test]
    fn test_error_display_range() {
        let err = HistoryError::InvalidRange { from: 5, to: 2 };
        let msg = err.to_string();
        assert!(msg.contains("Start version cannot be greater than end version"));
        assert!(msg.contains("5 > 2"));
        assert_eq!(err.code(), ErrorCode::InvalidVersion);
    }

    #[test]
    fn test_error_display_not_found() {
        let err = HistoryError::VersionNotFound { version: 42 };
        assert_eq!(err.to_string(), "Version 42 not found");
        assert_eq!(HistoryError::NoHistory.code(), ErrorCode::VersionNotFound);
    }

    #[test]
    fn test_error_display_branch() {
        let err = HistoryError::BranchNotFound {
            branch_id: "feature".to_string(),
        };
        assert!(err.to_string().contains("feature"));
        assert_eq!(err.code(), ErrorCode::BranchNotFound);

        let err = HistoryError::InvalidBranch {
            branch_id: String::new(),
        };
        assert_eq!(err.code(), ErrorCode::InvalidBranch);
    }

    #[test]
    fn test_storage_errors_share_code() {
        let recovered = HistoryError::StorageRecovered { version: 2 };
        let corrupted = HistoryError::StorageCorrupted {
            content_reset: true,
        };
        let io = HistoryError::storage("disk full");

        assert_eq!(recovered.code(), ErrorCode::StorageError);
        assert_eq!(corrupted.code(), ErrorCode::StorageError);
        assert_eq!(io.code(), ErrorCode::StorageError);

        assert!(!recovered.is_fatal());
        assert!(corrupted.is_fatal());
        assert!(corrupted.content_reset());
        assert!(!io.content_reset());
        assert_eq!(recovered.to_string(), "Storage recovered up to version 2");
    }

    #[test]
    fn test_error_code_wire_names() {
        let json = serde_json::to_string(&ErrorCode::ContentCorrupted).unwrap();
        assert_eq!(json, "\"CONTENT_CORRUPTED\"");
        assert_eq!(ErrorCode::InvalidOperation.to_string(), "INVALID_OPERATION");
    }

    #[test]
    fn test_error_pattern_matching() {
        let err = HistoryError::invalid_operation("tip points nowhere");

        match err {
            HistoryError::InvalidOperation(msg) => assert_eq!(msg, "tip points nowhere"),
            _ => panic!("Wrong error variant"),
        }
    }
}
